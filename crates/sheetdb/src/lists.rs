//! Column-per-list view of a table: row 1 holds list titles, the cells below
//! each title are that list's items.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::cache::{EntryKind, HeaderCache, TableMeta};
use crate::client::{ReadOptions, SpreadsheetsClient};
use crate::config::StoreConfig;
use crate::error::{remote, Result};
use crate::range::{SheetRange, FIRST_DATA_ROW};

/// One titled list. Items are raw cell text, top to bottom.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListBundle {
    pub title: String,
    pub items: Vec<String>,
}

#[derive(Clone)]
pub struct ListStore {
    client: Arc<dyn SpreadsheetsClient>,
    cache: HeaderCache,
}

impl ListStore {
    pub fn new(client: Arc<dyn SpreadsheetsClient>, config: StoreConfig) -> Self {
        let config = config.normalized();
        Self {
            client,
            cache: HeaderCache::new(config.cache_config()),
        }
    }

    pub fn client(&self) -> &Arc<dyn SpreadsheetsClient> {
        &self.client
    }

    pub fn cache(&self) -> &HeaderCache {
        &self.cache
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    pub async fn get_titles(&self, spreadsheet_id: &str, table: &str) -> Result<Arc<Vec<String>>> {
        self.cache
            .columns(self.client.as_ref(), spreadsheet_id, table, EntryKind::Titles)
            .await
    }

    pub async fn get_meta(&self, spreadsheet_id: &str, table: &str) -> Result<Arc<TableMeta>> {
        self.cache
            .meta(self.client.as_ref(), spreadsheet_id, table, EntryKind::Titles)
            .await
    }

    /// Every list in title order.
    ///
    /// A title with no column of data gets an empty list; data columns past
    /// the last title are ignored.
    pub async fn get_all(&self, spreadsheet_id: &str, table: &str) -> Result<Vec<ListBundle>> {
        let titles = self.get_titles(spreadsheet_id, table).await?;
        let range = SheetRange::open_rows(table, FIRST_DATA_ROW).to_string();
        log::debug!("reading {spreadsheet_id} @ {range} by columns");
        let mut columns = self
            .client
            .get_range(spreadsheet_id, &range, ReadOptions::columns())
            .await
            .map_err(|e| remote(format!("failed to read values of {spreadsheet_id} @ {range}"), e))?
            .into_iter();

        Ok(titles
            .iter()
            .map(|title| ListBundle {
                title: title.clone(),
                items: columns.next().unwrap_or_default(),
            })
            .collect())
    }
}
