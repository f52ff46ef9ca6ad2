use std::sync::Arc;

use crate::basic::BasicStore;
use crate::client::SpreadsheetsClient;
use crate::config::StoreConfig;
use crate::lists::ListStore;

/// Both store variants over one client.
///
/// Each store keeps its own header cache. Create one per process (or per
/// tenant) and pass it around; [`SheetDb::clear_caches`] releases cached state.
#[derive(Clone)]
pub struct SheetDb {
    basic: BasicStore,
    lists: ListStore,
}

impl SheetDb {
    pub fn new(client: Arc<dyn SpreadsheetsClient>, config: StoreConfig) -> Self {
        Self {
            basic: BasicStore::new(Arc::clone(&client), config.clone()),
            lists: ListStore::new(client, config),
        }
    }

    pub fn basic(&self) -> &BasicStore {
        &self.basic
    }

    pub fn lists(&self) -> &ListStore {
        &self.lists
    }

    pub fn clear_caches(&self) {
        self.basic.clear_cache();
        self.lists.clear_cache();
    }
}
