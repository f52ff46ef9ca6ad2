//! [`SpreadsheetsClient`] over the Google Sheets v4 REST API.
//!
//! Authentication is not handled here: callers pass an OAuth bearer token they
//! obtained elsewhere.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

use crate::client::{
    AppendResult, DateTimeRender, MajorDimension, RawGrid, ReadOptions, SpreadsheetDetails,
    SpreadsheetsClient, ValueRender, WriteResult,
};
use crate::codec::stringify;
use crate::error::ClientError;

pub const DEFAULT_BASE_URL: &str = "https://sheets.googleapis.com";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Builder for [`SheetsApiClient`].
#[derive(Debug, Clone)]
pub struct SheetsApiClientBuilder {
    base_url: String,
    token: Option<String>,
    timeout: Duration,
}

impl Default for SheetsApiClientBuilder {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            token: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl SheetsApiClientBuilder {
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn bearer_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn build(self) -> Result<SheetsApiClient, ClientError> {
        let base_url = Url::parse(&self.base_url).map_err(|e| {
            ClientError::Transport(format!("invalid base url {}: {e}", self.base_url))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(ClientError::Transport(format!(
                "invalid base url {}",
                self.base_url
            )));
        }
        let http = reqwest::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| ClientError::Transport(e.to_string()))?;
        Ok(SheetsApiClient {
            http,
            base_url,
            token: self.token,
        })
    }
}

pub struct SheetsApiClient {
    http: reqwest::Client,
    base_url: Url,
    token: Option<String>,
}

impl SheetsApiClient {
    pub fn builder() -> SheetsApiClientBuilder {
        SheetsApiClientBuilder::default()
    }

    /// A client for the public endpoint authenticated with `token`.
    pub fn new(token: impl Into<String>) -> Result<Self, ClientError> {
        Self::builder().bearer_token(token).build()
    }

    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().push("v4").push("spreadsheets").extend(segments);
        }
        url
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let req = self.http.request(method, url);
        match &self.token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    async fn send<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T, ClientError> {
        let response = req.send().await.map_err(transport)?;
        let response = check_status(response).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| ClientError::Decode(e.to_string()))
    }
}

#[async_trait]
impl SpreadsheetsClient for SheetsApiClient {
    async fn get_details(&self, spreadsheet_id: &str) -> Result<SpreadsheetDetails, ClientError> {
        let url = self.url(&[spreadsheet_id]);
        log::debug!("GET {url}");
        let req = self
            .request(Method::GET, url)
            .query(&[("includeGridData", "false")]);
        let body: SpreadsheetBody = self.send(req).await?;
        Ok(SpreadsheetDetails {
            spreadsheet_id: body.spreadsheet_id.unwrap_or_else(|| spreadsheet_id.to_string()),
            title: body.properties.title,
            spreadsheet_url: body.spreadsheet_url,
            tables: body
                .sheets
                .into_iter()
                .map(|sheet| sheet.properties.title)
                .collect(),
        })
    }

    async fn get_range(
        &self,
        spreadsheet_id: &str,
        range: &str,
        options: ReadOptions,
    ) -> Result<RawGrid, ClientError> {
        let url = self.url(&[spreadsheet_id, "values", range]);
        log::debug!("GET {url}");
        let req = self
            .request(Method::GET, url)
            .query(&read_params(options));
        let body: ValueRangeBody = self.send(req).await?;
        Ok(body
            .values
            .into_iter()
            .map(|row| row.iter().map(cell_text).collect())
            .collect())
    }

    async fn write_range(
        &self,
        spreadsheet_id: &str,
        range: &str,
        values: &RawGrid,
    ) -> Result<WriteResult, ClientError> {
        let url = self.url(&[spreadsheet_id, "values", range]);
        log::debug!("PUT {url} ({} rows)", values.len());
        let req = self
            .request(Method::PUT, url)
            .query(&[("valueInputOption", "USER_ENTERED")])
            .json(&ValuesBody { values });
        let body: UpdateBody = self.send(req).await?;
        Ok(WriteResult {
            updated_rows: body.updated_rows,
            updated_columns: body.updated_columns,
            updated_cells: body.updated_cells,
        })
    }

    async fn append_range(
        &self,
        spreadsheet_id: &str,
        range: &str,
        values: &RawGrid,
    ) -> Result<AppendResult, ClientError> {
        let target = format!("{range}:append");
        let url = self.url(&[spreadsheet_id, "values", &target]);
        log::debug!("POST {url} ({} rows)", values.len());
        let req = self
            .request(Method::POST, url)
            .query(&[("valueInputOption", "USER_ENTERED")])
            .json(&ValuesBody { values });
        let body: AppendBody = self.send(req).await?;
        let updates = body.updates;
        Ok(AppendResult {
            updated_range: updates.updated_range,
            updated_rows: updates.updated_rows,
            updated_columns: updates.updated_columns,
            updated_cells: updates.updated_cells,
        })
    }
}

fn transport(err: reqwest::Error) -> ClientError {
    ClientError::Transport(err.to_string())
}

async fn check_status(response: Response) -> Result<Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response
        .text()
        .await
        .unwrap_or_else(|_| "unknown error".to_string());
    log::debug!("sheets api returned {status}: {message}");
    Err(ClientError::Status {
        status: status.as_u16(),
        message,
    })
}

fn read_params(options: ReadOptions) -> Vec<(&'static str, &'static str)> {
    let mut params = Vec::new();
    if let Some(dim) = options.major_dimension {
        let dim = match dim {
            MajorDimension::Rows => "ROWS",
            MajorDimension::Columns => "COLUMNS",
        };
        params.push(("majorDimension", dim));
    }
    if let Some(render) = options.value_render {
        let render = match render {
            ValueRender::FormattedValue => "FORMATTED_VALUE",
            ValueRender::UnformattedValue => "UNFORMATTED_VALUE",
            ValueRender::Formula => "FORMULA",
        };
        params.push(("valueRenderOption", render));
    }
    if let Some(render) = options.date_time_render {
        let render = match render {
            DateTimeRender::SerialNumber => "SERIAL_NUMBER",
            DateTimeRender::FormattedString => "FORMATTED_STRING",
        };
        params.push(("dateTimeRenderOption", render));
    }
    params
}

// Unformatted reads return JSON numbers and booleans.
fn cell_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => stringify(other),
    }
}

fn unknown_count() -> i64 {
    -1
}

#[derive(serde::Serialize)]
struct ValuesBody<'a> {
    values: &'a RawGrid,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SpreadsheetBody {
    spreadsheet_id: Option<String>,
    #[serde(default)]
    properties: TitleBody,
    #[serde(default)]
    sheets: Vec<SheetBody>,
    #[serde(default)]
    spreadsheet_url: String,
}

#[derive(Deserialize)]
struct SheetBody {
    #[serde(default)]
    properties: TitleBody,
}

#[derive(Deserialize, Default)]
struct TitleBody {
    #[serde(default)]
    title: String,
}

#[derive(Deserialize)]
struct ValueRangeBody {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateBody {
    #[serde(default = "unknown_count")]
    updated_rows: i64,
    #[serde(default = "unknown_count")]
    updated_columns: i64,
    #[serde(default = "unknown_count")]
    updated_cells: i64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(default)]
struct AppendUpdates {
    updated_range: String,
    updated_rows: i64,
    updated_columns: i64,
    updated_cells: i64,
}

impl Default for AppendUpdates {
    fn default() -> Self {
        Self {
            updated_range: String::new(),
            updated_rows: unknown_count(),
            updated_columns: unknown_count(),
            updated_cells: unknown_count(),
        }
    }
}

#[derive(Deserialize)]
struct AppendBody {
    #[serde(default)]
    updates: AppendUpdates,
}
