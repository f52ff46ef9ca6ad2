//! The remote tabular backend, seen only through range reads, writes and appends.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ClientError;

/// A rectangular grid of cell text. Rows may be ragged; missing cells read as `""`.
pub type RawGrid = Vec<Vec<String>>;

/// Descriptive details of a spreadsheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpreadsheetDetails {
    pub spreadsheet_id: String,
    pub title: String,
    pub spreadsheet_url: String,
    /// Table (tab) names in display order.
    pub tables: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteResult {
    pub updated_rows: i64,
    pub updated_columns: i64,
    pub updated_cells: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppendResult {
    /// Where the rows actually landed, e.g. `Users!A7:D8`.
    pub updated_range: String,
    pub updated_rows: i64,
    pub updated_columns: i64,
    pub updated_cells: i64,
}

/// Orientation of the grid returned by a read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MajorDimension {
    #[default]
    Rows,
    Columns,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValueRender {
    FormattedValue,
    UnformattedValue,
    Formula,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DateTimeRender {
    SerialNumber,
    FormattedString,
}

/// Optional read parameters; `None` fields are left to the backend's defaults.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadOptions {
    pub major_dimension: Option<MajorDimension>,
    pub value_render: Option<ValueRender>,
    pub date_time_render: Option<DateTimeRender>,
}

impl ReadOptions {
    pub fn columns() -> Self {
        Self {
            major_dimension: Some(MajorDimension::Columns),
            ..Self::default()
        }
    }
}

/// Range-based access to a remote spreadsheet backend.
///
/// Ranges are sheet-qualified A1 text (`Users!A2:Z10`). Timeouts, retries and
/// authentication are the implementation's business.
#[async_trait]
pub trait SpreadsheetsClient: Send + Sync {
    async fn get_details(&self, spreadsheet_id: &str) -> Result<SpreadsheetDetails, ClientError>;

    /// Read a range. An empty region yields an empty grid.
    async fn get_range(
        &self,
        spreadsheet_id: &str,
        range: &str,
        options: ReadOptions,
    ) -> Result<RawGrid, ClientError>;

    /// Overwrite cells starting at the top-left of `range`.
    async fn write_range(
        &self,
        spreadsheet_id: &str,
        range: &str,
        values: &RawGrid,
    ) -> Result<WriteResult, ClientError>;

    /// Write `values` after the last occupied row of the table `range` points into.
    async fn append_range(
        &self,
        spreadsheet_id: &str,
        range: &str,
        values: &RawGrid,
    ) -> Result<AppendResult, ClientError>;
}
