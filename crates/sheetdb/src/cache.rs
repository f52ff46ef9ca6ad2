use crate::client::{ReadOptions, SpreadsheetsClient};
use crate::error::{remote, Result};
use crate::range::SheetRange;
use lru::LruCache;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    /// Lifetime of an entry from insertion (default: 45s).
    pub ttl: Duration,
    /// Max number of entries before the least recently used one is evicted (default: 1000).
    pub capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(45),
            capacity: 1000,
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub insertions: u64,
    pub expirations: u64,
    pub evictions: u64,
}

/// What a cache entry holds for its `(spreadsheet, table)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
    /// Column headers of a record table.
    Headers,
    /// Descriptive metadata (spreadsheet details plus columns).
    Meta,
    /// List titles of a list table.
    Titles,
}

impl EntryKind {
    fn tag(self) -> char {
        match self {
            EntryKind::Headers => 'H',
            EntryKind::Meta => 'M',
            EntryKind::Titles => 'T',
        }
    }
}

/// `{spreadsheet_id}:{table}:{kind}`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub spreadsheet_id: String,
    pub table: String,
    pub kind: EntryKind,
}

impl CacheKey {
    pub fn new(spreadsheet_id: &str, table: &str, kind: EntryKind) -> Self {
        Self {
            spreadsheet_id: spreadsheet_id.to_string(),
            table: table.to_string(),
            kind,
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.spreadsheet_id, self.table, self.kind.tag())
    }
}

/// Spreadsheet details joined with the column names of one table.
///
/// For record tables `columns` are the headers; for list tables they are the list titles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableMeta {
    pub spreadsheet_id: String,
    pub title: String,
    pub spreadsheet_url: String,
    pub tables: Vec<String>,
    pub table: String,
    pub columns: Vec<String>,
}

#[derive(Debug, Clone)]
enum CachedValue {
    Columns(Arc<Vec<String>>),
    Meta(Arc<TableMeta>),
}

#[derive(Debug)]
struct Entry {
    value: CachedValue,
    inserted_at: Instant,
}

struct Inner {
    entries: LruCache<String, Entry>,
    stats: CacheStats,
}

/// Read-through cache of table headers/titles and table metadata.
///
/// Entries expire a fixed TTL after insertion and the cache holds at most
/// `capacity` entries, evicting the least recently used one beyond that.
/// Cached values are immutable snapshots, so concurrent misses on the same key
/// may each fetch from the backend; the last insert wins.
#[derive(Clone)]
pub struct HeaderCache {
    config: CacheConfig,
    inner: Arc<Mutex<Inner>>,
}

impl HeaderCache {
    pub fn new(mut config: CacheConfig) -> Self {
        config.capacity = config.capacity.max(1);
        let cap = NonZeroUsize::new(config.capacity).expect("capacity is non-zero");
        let inner = Inner {
            entries: LruCache::new(cap),
            stats: CacheStats::default(),
        };
        Self {
            config,
            inner: Arc::new(Mutex::new(inner)),
        }
    }

    pub fn config(&self) -> CacheConfig {
        self.config
    }

    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .expect("header cache mutex poisoned")
            .entries
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        self.inner.lock().expect("header cache mutex poisoned").stats
    }

    /// Drop every entry. Counters are kept.
    pub fn clear(&self) {
        self.inner
            .lock()
            .expect("header cache mutex poisoned")
            .entries
            .clear();
    }

    /// Ordered column names of `table`, read from its first row on a miss.
    pub async fn columns(
        &self,
        client: &dyn SpreadsheetsClient,
        spreadsheet_id: &str,
        table: &str,
        kind: EntryKind,
    ) -> Result<Arc<Vec<String>>> {
        let key = CacheKey::new(spreadsheet_id, table, kind);
        if let Some(CachedValue::Columns(columns)) = self.get(&key) {
            return Ok(columns);
        }

        let range = SheetRange::header(table).to_string();
        let grid = client
            .get_range(spreadsheet_id, &range, ReadOptions::default())
            .await
            .map_err(|e| {
                remote(format!("failed to read values of {spreadsheet_id} @ {range}"), e)
            })?;
        let columns = Arc::new(grid.into_iter().next().unwrap_or_default());
        self.insert(&key, CachedValue::Columns(Arc::clone(&columns)));
        Ok(columns)
    }

    /// Spreadsheet details plus the columns of `table` (fetched as `columns_kind`).
    pub async fn meta(
        &self,
        client: &dyn SpreadsheetsClient,
        spreadsheet_id: &str,
        table: &str,
        columns_kind: EntryKind,
    ) -> Result<Arc<TableMeta>> {
        let key = CacheKey::new(spreadsheet_id, table, EntryKind::Meta);
        if let Some(CachedValue::Meta(meta)) = self.get(&key) {
            return Ok(meta);
        }

        let details = client
            .get_details(spreadsheet_id)
            .await
            .map_err(|e| remote(format!("failed to read details of {spreadsheet_id}"), e))?;
        let columns = self
            .columns(client, spreadsheet_id, table, columns_kind)
            .await?;
        let meta = Arc::new(TableMeta {
            spreadsheet_id: details.spreadsheet_id,
            title: details.title,
            spreadsheet_url: details.spreadsheet_url,
            tables: details.tables,
            table: table.to_string(),
            columns: columns.as_ref().clone(),
        });
        self.insert(&key, CachedValue::Meta(Arc::clone(&meta)));
        Ok(meta)
    }

    fn get(&self, key: &CacheKey) -> Option<CachedValue> {
        let key = key.to_string();
        let ttl = self.config.ttl;
        let mut inner = self.inner.lock().expect("header cache mutex poisoned");
        let lookup = inner
            .entries
            .get(&key)
            .map(|entry| (entry.inserted_at.elapsed() < ttl).then(|| entry.value.clone()));
        match lookup {
            Some(Some(value)) => {
                inner.stats.hits = inner.stats.hits.saturating_add(1);
                Some(value)
            }
            Some(None) => {
                inner.entries.pop(&key);
                inner.stats.expirations = inner.stats.expirations.saturating_add(1);
                inner.stats.misses = inner.stats.misses.saturating_add(1);
                log::debug!("header cache entry expired: {key}");
                None
            }
            None => {
                inner.stats.misses = inner.stats.misses.saturating_add(1);
                log::debug!("header cache miss: {key}");
                None
            }
        }
    }

    fn insert(&self, key: &CacheKey, value: CachedValue) {
        let key = key.to_string();
        let entry = Entry {
            value,
            inserted_at: Instant::now(),
        };
        let mut inner = self.inner.lock().expect("header cache mutex poisoned");
        inner.stats.insertions = inner.stats.insertions.saturating_add(1);
        if let Some((evicted, _)) = inner.entries.push(key.clone(), entry) {
            if evicted != key {
                inner.stats.evictions = inner.stats.evictions.saturating_add(1);
                log::debug!("header cache evicted {evicted}");
            }
        }
    }
}

impl fmt::Debug for HeaderCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HeaderCache")
            .field("config", &self.config)
            .field("stats", &self.stats())
            .finish()
    }
}
