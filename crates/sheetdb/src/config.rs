use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cache::CacheConfig;

/// Settings shared by [`crate::BasicStore`] and [`crate::ListStore`].
///
/// Deserializes from any serde format; absent fields take their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Header/metadata cache entry lifetime in seconds (default: 45).
    pub cache_ttl_secs: u64,
    /// Max header/metadata cache entries per store (default: 1000).
    pub cache_capacity: usize,
    /// Data rows scanned by `search`, starting at row 2 (default: 999, i.e. `A2:Z1000`).
    pub search_max_rows: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            cache_ttl_secs: 45,
            cache_capacity: 1000,
            search_max_rows: 999,
        }
    }
}

impl StoreConfig {
    /// Clamp degenerate values so every store can rely on them.
    pub fn normalized(mut self) -> Self {
        self.cache_capacity = self.cache_capacity.max(1);
        self.search_max_rows = self.search_max_rows.max(1);
        self
    }

    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig {
            ttl: Duration::from_secs(self.cache_ttl_secs),
            capacity: self.cache_capacity,
        }
    }
}
