//! Record-per-row view of a table: row 1 holds column headers, every later
//! row is one record.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::cache::{EntryKind, HeaderCache, TableMeta};
use crate::client::{RawGrid, ReadOptions, SpreadsheetsClient};
use crate::codec::{decode_rows, encode_records, Fields, Record};
use crate::config::StoreConfig;
use crate::error::{remote, Result};
use crate::query::{self, SearchOptions};
use crate::range::{appended_start_row, SheetRange, FIRST_DATA_ROW};

pub const DEFAULT_LIST_LIMIT: i64 = 10;

/// Pagination for [`BasicStore::list`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ListOptions {
    /// Rows to read (default: 10). Nothing is read when `<= 0`.
    pub limit: i64,
    /// Data rows to skip (default: 0).
    pub offset: i64,
}

impl Default for ListOptions {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIST_LIMIT,
            offset: 0,
        }
    }
}

impl ListOptions {
    pub fn new(limit: i64, offset: i64) -> Self {
        Self { limit, offset }
    }
}

/// One record or several, as accepted by [`BasicStore::insert`].
#[derive(Debug, Clone, PartialEq)]
pub enum InsertData {
    One(Fields),
    Many(Vec<Fields>),
}

impl InsertData {
    pub fn into_vec(self) -> Vec<Fields> {
        match self {
            InsertData::One(fields) => vec![fields],
            InsertData::Many(all) => all,
        }
    }
}

impl From<Fields> for InsertData {
    fn from(fields: Fields) -> Self {
        InsertData::One(fields)
    }
}

impl From<Vec<Fields>> for InsertData {
    fn from(all: Vec<Fields>) -> Self {
        InsertData::Many(all)
    }
}

impl From<Record> for InsertData {
    fn from(record: Record) -> Self {
        InsertData::One(record.into_fields())
    }
}

/// Outcome of [`BasicStore::insert`].
///
/// `data` holds the inserted records stamped with their new rows. It is empty
/// when the backend's reported range could not be parsed, even though the
/// rows were written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertResult {
    pub updated_rows: i64,
    pub data: Vec<Record>,
}

/// Typed records over a remote table.
///
/// Headers and metadata are cached per store (see [`HeaderCache`]). Clones
/// share the client and the cache.
#[derive(Clone)]
pub struct BasicStore {
    client: Arc<dyn SpreadsheetsClient>,
    cache: HeaderCache,
    config: StoreConfig,
}

impl BasicStore {
    pub fn new(client: Arc<dyn SpreadsheetsClient>, config: StoreConfig) -> Self {
        let config = config.normalized();
        Self {
            client,
            cache: HeaderCache::new(config.cache_config()),
            config,
        }
    }

    pub fn client(&self) -> &Arc<dyn SpreadsheetsClient> {
        &self.client
    }

    pub fn cache(&self) -> &HeaderCache {
        &self.cache
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    pub async fn get_headers(&self, spreadsheet_id: &str, table: &str) -> Result<Arc<Vec<String>>> {
        self.cache
            .columns(self.client.as_ref(), spreadsheet_id, table, EntryKind::Headers)
            .await
    }

    pub async fn get_meta(&self, spreadsheet_id: &str, table: &str) -> Result<Arc<TableMeta>> {
        self.cache
            .meta(self.client.as_ref(), spreadsheet_id, table, EntryKind::Headers)
            .await
    }

    /// The record on sheet row `row`, or [`Record::not_found`] when the row is empty.
    pub async fn get_by_id(&self, spreadsheet_id: &str, table: &str, row: u32) -> Result<Record> {
        if row == 0 {
            return Ok(Record::not_found());
        }
        let headers = self.get_headers(spreadsheet_id, table).await?;
        let rows = self.read(spreadsheet_id, SheetRange::row(table, row)).await?;
        let offset = i64::from(row) - i64::from(FIRST_DATA_ROW);
        Ok(decode_rows(&headers, &rows, offset)
            .into_iter()
            .next()
            .unwrap_or_else(Record::not_found))
    }

    /// A page of records in sheet order.
    pub async fn list(
        &self,
        spreadsheet_id: &str,
        table: &str,
        options: ListOptions,
    ) -> Result<Vec<Record>> {
        if options.limit <= 0 {
            return Ok(Vec::new());
        }
        let headers = self.get_headers(spreadsheet_id, table).await?;
        let start = clamp_row(i64::from(FIRST_DATA_ROW).saturating_add(options.offset.max(0)));
        let end = clamp_row(i64::from(start).saturating_add(options.limit - 1));
        let rows = self
            .read(spreadsheet_id, SheetRange::rows(table, start, end))
            .await?;
        let offset = i64::from(start) - i64::from(FIRST_DATA_ROW);
        Ok(decode_rows(&headers, &rows, offset))
    }

    /// Sort, filter, query and paginate the first `search_max_rows` data rows.
    ///
    /// Rows past that window are never seen.
    pub async fn search(
        &self,
        spreadsheet_id: &str,
        table: &str,
        options: &SearchOptions,
    ) -> Result<Vec<Record>> {
        let headers = self.get_headers(spreadsheet_id, table).await?;
        let last = FIRST_DATA_ROW.saturating_add(self.config.search_max_rows - 1);
        let range = SheetRange::rows(table, FIRST_DATA_ROW, last);
        let rows = self.read(spreadsheet_id, range).await?;
        let records = decode_rows(&headers, &rows, 0);
        query::apply(records, options)
    }

    /// Append records after the table's last occupied row.
    pub async fn insert(
        &self,
        spreadsheet_id: &str,
        table: &str,
        data: impl Into<InsertData>,
    ) -> Result<InsertResult> {
        let records = data.into().into_vec();
        if records.is_empty() {
            return Ok(InsertResult {
                updated_rows: 0,
                data: Vec::new(),
            });
        }
        let headers = self.get_headers(spreadsheet_id, table).await?;
        let values = encode_records(&headers, &records);

        let range = SheetRange::anchor(table, 1).to_string();
        let res = self
            .client
            .append_range(spreadsheet_id, &range, &values)
            .await
            .map_err(|e| {
                remote(format!("failed to append values to {spreadsheet_id} @ {range}"), e)
            })?;

        let data = match appended_start_row(&res.updated_range) {
            Some(start) => {
                log::debug!("appended {} row(s) at {}", res.updated_rows, res.updated_range);
                let offset = i64::from(start) - i64::from(FIRST_DATA_ROW);
                decode_rows(&headers, &values, offset)
            }
            None => {
                log::warn!(
                    "append to {spreadsheet_id} @ {range} reported unparseable range {:?}; \
                     returning no records",
                    res.updated_range
                );
                Vec::new()
            }
        };

        Ok(InsertResult {
            updated_rows: res.updated_rows,
            data,
        })
    }

    /// Overwrite sheet row `row`. True when the backend reports exactly one row updated.
    pub async fn update(
        &self,
        spreadsheet_id: &str,
        table: &str,
        row: u32,
        record: &Fields,
    ) -> Result<bool> {
        if row == 0 {
            return Ok(false);
        }
        let headers = self.get_headers(spreadsheet_id, table).await?;
        let values = encode_records(&headers, [record]);
        let range = SheetRange::anchor(table, row).to_string();
        let res = self
            .client
            .write_range(spreadsheet_id, &range, &values)
            .await
            .map_err(|e| {
                remote(format!("failed to write values of {spreadsheet_id} @ {range}"), e)
            })?;
        Ok(res.updated_rows == 1)
    }

    async fn read(&self, spreadsheet_id: &str, range: SheetRange) -> Result<RawGrid> {
        let range = range.to_string();
        log::debug!("reading {spreadsheet_id} @ {range}");
        self.client
            .get_range(spreadsheet_id, &range, ReadOptions::default())
            .await
            .map_err(|e| remote(format!("failed to read values of {spreadsheet_id} @ {range}"), e))
    }
}

fn clamp_row(row: i64) -> u32 {
    u32::try_from(row).unwrap_or(u32::MAX)
}
