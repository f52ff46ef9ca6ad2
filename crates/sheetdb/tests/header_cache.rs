use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use sheetdb::{BasicStore, MemorySpreadsheetsClient, SheetDb, StoreConfig};

const SID: &str = "sheet-1";

fn client() -> MemorySpreadsheetsClient {
    let client = MemorySpreadsheetsClient::new();
    client.put_table(
        SID,
        "users",
        vec![
            vec!["id".to_string(), "name".to_string()],
            vec!["1".to_string(), "ann".to_string()],
        ],
    );
    client.put_table(SID, "colors", vec![vec!["Warm".to_string(), "Cold".to_string()]]);
    client
}

#[tokio::test(start_paused = true)]
async fn headers_are_refetched_after_ttl() {
    let client = client();
    let db = BasicStore::new(Arc::new(client.clone()), StoreConfig::default());

    db.get_headers(SID, "users").await.expect("headers");
    tokio::time::advance(Duration::from_secs(44)).await;
    db.get_headers(SID, "users").await.expect("headers");
    assert_eq!(client.calls().reads, 1);

    tokio::time::advance(Duration::from_secs(2)).await;
    db.get_headers(SID, "users").await.expect("headers");
    assert_eq!(client.calls().reads, 2);

    let stats = db.cache().stats();
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.misses, 2);
    assert_eq!(stats.expirations, 1);
}

#[tokio::test(start_paused = true)]
async fn ttl_follows_config() {
    let client = client();
    let config = StoreConfig {
        cache_ttl_secs: 5,
        ..StoreConfig::default()
    };
    let db = BasicStore::new(Arc::new(client.clone()), config);

    db.get_meta(SID, "users").await.expect("meta");
    tokio::time::advance(Duration::from_secs(6)).await;
    db.get_meta(SID, "users").await.expect("meta");

    assert_eq!(client.calls().details, 2);
    assert_eq!(client.calls().reads, 2);
}

#[tokio::test]
async fn capacity_bounds_entries_per_store() {
    let client = client();
    for table in ["a", "b", "c"] {
        client.put_table(SID, table, vec![vec!["x".to_string()]]);
    }
    let config = StoreConfig {
        cache_capacity: 2,
        ..StoreConfig::default()
    };
    let db = BasicStore::new(Arc::new(client.clone()), config);

    for table in ["a", "b", "c"] {
        db.get_headers(SID, table).await.expect("headers");
    }
    assert_eq!(db.cache().len(), 2);
    assert_eq!(db.cache().stats().evictions, 1);

    db.get_headers(SID, "a").await.expect("headers");
    assert_eq!(client.calls().reads, 4);
}

#[tokio::test]
async fn store_variants_keep_separate_caches() {
    let client = client();
    let db = SheetDb::new(Arc::new(client.clone()), StoreConfig::default());

    db.basic().get_headers(SID, "users").await.expect("headers");
    db.lists().get_titles(SID, "users").await.expect("titles");
    assert_eq!(client.calls().reads, 2);

    let lists = db.lists().get_all(SID, "colors").await.expect("lists");
    assert_eq!(lists.len(), 2);
    assert!(lists.iter().all(|list| list.items.is_empty()));

    db.clear_caches();
    assert!(db.basic().cache().is_empty());
    assert!(db.lists().cache().is_empty());
}
