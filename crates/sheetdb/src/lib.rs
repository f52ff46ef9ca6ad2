//! Record and list stores over remote spreadsheet tables.
//!
//! A table's first row names its columns. [`BasicStore`] treats every later
//! row as a typed record (numbers and booleans are inferred, dotted column
//! names become nested objects) and supports in-process search. [`ListStore`]
//! treats every column as a titled list of items.
//!
//! The remote backend is reached through the [`SpreadsheetsClient`] trait:
//! - [`MemorySpreadsheetsClient`] keeps everything in process
//! - `SheetsApiClient` (feature `http`) talks to the Google Sheets v4 REST API
//!
//! Column headers and table metadata are cached per store with a TTL and a
//! bounded entry count (see [`HeaderCache`]).

mod basic;
mod cache;
mod client;
pub mod codec;
mod config;
mod db;
mod error;
#[cfg(feature = "http")]
pub mod http;
mod lists;
mod memory;
pub mod query;
pub mod range;

pub use basic::{BasicStore, InsertData, InsertResult, ListOptions, DEFAULT_LIST_LIMIT};
pub use cache::{CacheConfig, CacheKey, CacheStats, EntryKind, HeaderCache, TableMeta};
pub use client::{
    AppendResult, DateTimeRender, MajorDimension, RawGrid, ReadOptions, SpreadsheetDetails,
    SpreadsheetsClient, ValueRender, WriteResult,
};
pub use codec::{FieldPath, Fields, Record, NOT_FOUND_ROW, ROW_FIELD};
pub use config::StoreConfig;
pub use db::SheetDb;
pub use error::{ClientError, Result, SheetDbError};
pub use lists::{ListBundle, ListStore};
pub use memory::{ClientCalls, MemorySpreadsheetsClient};
pub use query::{SearchOptions, SortKeys, DEFAULT_SEARCH_LIMIT};

#[cfg(feature = "http")]
pub use http::{SheetsApiClient, SheetsApiClientBuilder};
