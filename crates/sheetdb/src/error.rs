use thiserror::Error;

use crate::range::RangeParseError;

/// Errors surfaced by a [`crate::SpreadsheetsClient`] implementation.
///
/// The stores never interpret these beyond logging them; they are carried
/// unchanged as the source of [`SheetDbError::Remote`].
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("backend returned status {status}: {message}")]
    Status { status: u16, message: String },
    #[error("transport error: {0}")]
    Transport(String),
    #[error("failed to decode backend response: {0}")]
    Decode(String),
    #[error("invalid range: {0}")]
    InvalidRange(#[from] RangeParseError),
    #[error("spreadsheet not found: {0}")]
    SpreadsheetNotFound(String),
    #[error("table not found: {0}")]
    TableNotFound(String),
}

#[derive(Debug, Error)]
pub enum SheetDbError {
    /// A remote call failed. `operation` names what was being attempted.
    #[error("{operation}: {source}")]
    Remote {
        operation: String,
        #[source]
        source: ClientError,
    },
    #[error("invalid query: {0}")]
    InvalidQuery(String),
}

impl SheetDbError {
    /// The backend error behind a [`SheetDbError::Remote`], if any.
    pub fn client_error(&self) -> Option<&ClientError> {
        match self {
            SheetDbError::Remote { source, .. } => Some(source),
            SheetDbError::InvalidQuery(_) => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, SheetDbError>;

/// Log a failed remote call with its operation prefix and wrap it.
pub(crate) fn remote(operation: String, source: ClientError) -> SheetDbError {
    log::error!("{operation}: {source}");
    SheetDbError::Remote { operation, source }
}
