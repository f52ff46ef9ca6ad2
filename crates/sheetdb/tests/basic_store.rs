use std::sync::Arc;

use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use sheetdb::{
    BasicStore, ClientError, Fields, ListOptions, MemorySpreadsheetsClient, Record, SearchOptions,
    SheetDbError, StoreConfig,
};

const SID: &str = "sheet-1";
const TABLE: &str = "basicdb";

fn grid(rows: &[&[&str]]) -> Vec<Vec<String>> {
    rows.iter()
        .map(|row| row.iter().map(|c| c.to_string()).collect())
        .collect()
}

fn users_client() -> MemorySpreadsheetsClient {
    let client = MemorySpreadsheetsClient::new();
    client.create_spreadsheet(SID, "Development Test Sheet");
    client.put_table(SID, "Sheet1", Vec::new());
    client.put_table(
        SID,
        TABLE,
        grid(&[
            &["id", "name", "email", "isAdmin"],
            &["1", "user1", "user1@example.com", "TRUE"],
            &["2", "user2", "user2@example.com", "FALSE"],
            &["3", "user3", "user3@example.com", "FALSE"],
            &["4", "user4", "user4@example.com", "FALSE"],
        ]),
    );
    client.put_table(SID, "writedb", grid(&[&["id", "name", "email", "isAdmin"]]));
    client
}

fn store(client: &MemorySpreadsheetsClient) -> BasicStore {
    BasicStore::new(Arc::new(client.clone()), StoreConfig::default())
}

fn user(id: i64) -> Record {
    serde_json::from_value(json!({
        "_row": id + 1,
        "id": id,
        "name": format!("user{id}"),
        "email": format!("user{id}@example.com"),
        "isAdmin": id == 1,
    }))
    .expect("valid record")
}

fn fields(value: Value) -> Fields {
    match value {
        Value::Object(map) => map,
        other => panic!("expected object, got {other}"),
    }
}

fn rows(records: &[Record]) -> Vec<i64> {
    records.iter().map(|r| r.row).collect()
}

#[tokio::test]
async fn fetches_headers_and_meta() {
    let client = users_client();
    let db = store(&client);

    let headers = db.get_headers(SID, TABLE).await.expect("headers");
    assert_eq!(*headers, vec!["id", "name", "email", "isAdmin"]);

    let meta = db.get_meta(SID, TABLE).await.expect("meta");
    assert_eq!(
        serde_json::to_value(meta.as_ref()).expect("serialize meta"),
        json!({
            "spreadsheetId": SID,
            "title": "Development Test Sheet",
            "spreadsheetUrl": "memory://spreadsheets/sheet-1",
            "tables": ["Sheet1", "basicdb", "writedb"],
            "table": "basicdb",
            "columns": ["id", "name", "email", "isAdmin"],
        })
    );
}

#[tokio::test]
async fn headers_are_read_once_within_ttl() {
    let client = users_client();
    let db = store(&client);

    db.get_headers(SID, TABLE).await.expect("headers");
    db.list(SID, TABLE, ListOptions::default()).await.expect("list");
    db.get_by_id(SID, TABLE, 2).await.expect("get");
    db.get_meta(SID, TABLE).await.expect("meta");

    let calls = client.calls();
    // One header read, one list read, one row read.
    assert_eq!(calls.reads, 3);
    assert_eq!(calls.details, 1);
}

#[tokio::test]
async fn gets_row_by_position() {
    let client = users_client();
    let db = store(&client);

    assert_eq!(db.get_by_id(SID, TABLE, 3).await.expect("get"), user(2));
}

#[tokio::test]
async fn empty_row_yields_not_found_sentinel() {
    let client = users_client();
    let db = store(&client);

    let record = db.get_by_id(SID, TABLE, 40).await.expect("get");
    assert!(record.is_not_found());
    assert_eq!(
        serde_json::to_value(&record).expect("serialize"),
        json!({"_row": -99})
    );
    assert!(db.get_by_id(SID, TABLE, 0).await.expect("get").is_not_found());
}

#[tokio::test]
async fn lists_with_default_and_explicit_pagination() {
    let client = users_client();
    let db = store(&client);

    let all = db.list(SID, TABLE, ListOptions::default()).await.expect("list");
    assert_eq!(all, vec![user(1), user(2), user(3), user(4)]);

    let first_two = db.list(SID, TABLE, ListOptions::new(2, 0)).await.expect("list");
    assert_eq!(first_two, vec![user(1), user(2)]);

    let page = db.list(SID, TABLE, ListOptions::new(2, 1)).await.expect("list");
    assert_eq!(page, vec![user(2), user(3)]);

    let past_end = db.list(SID, TABLE, ListOptions::new(5, 10)).await.expect("list");
    assert!(past_end.is_empty());
}

#[tokio::test]
async fn non_positive_list_limit_reads_nothing() {
    let client = users_client();
    let db = store(&client);
    db.get_headers(SID, TABLE).await.expect("headers");
    client.reset_calls();

    let none = db.list(SID, TABLE, ListOptions::new(0, 0)).await.expect("list");
    assert!(none.is_empty());
    assert_eq!(client.calls().reads, 0);
}

#[tokio::test]
async fn search_without_options_returns_everything_in_order() {
    let client = users_client();
    let db = store(&client);

    let found = db.search(SID, TABLE, &SearchOptions::default()).await.expect("search");
    assert_eq!(found, vec![user(1), user(2), user(3), user(4)]);
}

#[tokio::test]
async fn search_filters_by_pattern() {
    let client = users_client();
    let db = store(&client);

    let options = SearchOptions::default().with_filter(json!({"id": 2}));
    let found = db.search(SID, TABLE, &options).await.expect("search");
    assert_eq!(found, vec![user(2)]);
}

#[tokio::test]
async fn search_sorts_descending() {
    let client = users_client();
    let db = store(&client);

    let options = SearchOptions::default().with_sort("id").descending();
    let found = db.search(SID, TABLE, &options).await.expect("search");
    assert_eq!(rows(&found), vec![5, 4, 3, 2]);

    let options = SearchOptions::default()
        .with_sort(["isAdmin", "name"])
        .descending();
    let found = db.search(SID, TABLE, &options).await.expect("search");
    assert_eq!(found, vec![user(1), user(4), user(3), user(2)]);
}

#[tokio::test]
async fn search_applies_query_then_pagination() {
    let client = users_client();
    let db = store(&client);

    let options = SearchOptions::default().with_query(json!({"id": {"$gt": 1, "$lte": 3}}));
    let found = db.search(SID, TABLE, &options).await.expect("search");
    assert_eq!(found, vec![user(2), user(3)]);

    let options = SearchOptions::default()
        .with_query(json!({"isAdmin": false}))
        .with_offset(1)
        .with_limit(1);
    let found = db.search(SID, TABLE, &options).await.expect("search");
    assert_eq!(found, vec![user(3)]);
}

#[tokio::test]
async fn search_rejects_unknown_operators() {
    let client = users_client();
    let db = store(&client);

    let options = SearchOptions::default().with_query(json!({"id": {"$regex": "1"}}));
    let err = db.search(SID, TABLE, &options).await.unwrap_err();
    assert!(matches!(err, SheetDbError::InvalidQuery(_)));
}

#[tokio::test]
async fn search_window_is_configurable() {
    let client = users_client();
    let config = StoreConfig {
        search_max_rows: 2,
        ..StoreConfig::default()
    };
    let db = BasicStore::new(Arc::new(client.clone()), config);

    let found = db.search(SID, TABLE, &SearchOptions::default()).await.expect("search");
    assert_eq!(found, vec![user(1), user(2)]);
}

#[tokio::test]
async fn insert_single_record_recovers_its_row() {
    let client = users_client();
    let db = store(&client);

    let data = fields(json!({
        "id": -17,
        "name": "user-17",
        "email": "user-17@example.com",
        "isAdmin": true,
    }));
    let res = db.insert(SID, "writedb", data.clone()).await.expect("insert");
    assert_eq!(res.updated_rows, 1);
    assert_eq!(res.data, vec![Record::with_fields(2, data.clone())]);

    let stored = db.get_by_id(SID, "writedb", 2).await.expect("get");
    assert_eq!(stored, Record::with_fields(2, data));
}

#[tokio::test]
async fn insert_many_records_lands_after_existing_rows() {
    let client = users_client();
    let db = store(&client);

    let batch = vec![
        fields(json!({"id": 5, "name": "user5", "email": "user5@example.com", "isAdmin": false})),
        fields(json!({"id": 6, "name": "user6", "email": "user6@example.com", "isAdmin": true})),
    ];
    let res = db.insert(SID, TABLE, batch.clone()).await.expect("insert");
    assert_eq!(res.updated_rows, 2);
    assert_eq!(rows(&res.data), vec![6, 7]);
    assert_eq!(res.data[0].fields, batch[0]);
    assert_eq!(res.data[1].fields, batch[1]);

    let table = client.table(SID, TABLE).expect("table exists");
    assert_eq!(table[6], vec!["6", "user6", "user6@example.com", "true"]);
}

#[tokio::test]
async fn insert_of_empty_batch_is_a_no_op() {
    let client = users_client();
    let db = store(&client);

    let res = db.insert(SID, TABLE, Vec::<Fields>::new()).await.expect("insert");
    assert_eq!(res.updated_rows, 0);
    assert!(res.data.is_empty());
    assert_eq!(client.calls().appends, 0);
}

#[tokio::test]
async fn update_overwrites_one_row() {
    let client = users_client();
    let db = store(&client);
    db.insert(
        SID,
        "writedb",
        vec![
            fields(json!({"id": 10, "name": "a", "email": "a@example.com", "isAdmin": false})),
            fields(json!({"id": 11, "name": "b", "email": "b@example.com", "isAdmin": false})),
        ],
    )
    .await
    .expect("seed");

    let data = fields(json!({
        "id": 77,
        "name": "updated-user77",
        "email": "user77@example.com",
        "isAdmin": true,
    }));
    assert!(db.update(SID, "writedb", 3, &data).await.expect("update"));

    let page = db
        .list(SID, "writedb", ListOptions::new(1, 1))
        .await
        .expect("list");
    assert_eq!(page, vec![Record::with_fields(3, data)]);
}

#[tokio::test]
async fn update_counts_blank_rows_and_skips_row_zero() {
    let client = users_client();
    let db = store(&client);

    let blank = Fields::new();
    // An all-empty row still counts as one updated row.
    assert!(db.update(SID, TABLE, 2, &blank).await.expect("update"));
    assert!(!db.update(SID, TABLE, 0, &blank).await.expect("update"));
}

#[tokio::test]
async fn remote_failures_carry_operation_context() {
    let client = users_client();
    let db = store(&client);
    db.get_headers(SID, TABLE).await.expect("headers");

    client.fail_next(ClientError::Status {
        status: 503,
        message: "unavailable".into(),
    });
    let err = db.list(SID, TABLE, ListOptions::default()).await.unwrap_err();
    assert_eq!(
        err.to_string(),
        "failed to read values of sheet-1 @ basicdb!A2:Z11: backend returned status 503: unavailable"
    );
    assert!(matches!(
        err.client_error(),
        Some(ClientError::Status { status: 503, .. })
    ));

    let err = db.get_headers(SID, "missing").await.unwrap_err();
    assert!(matches!(err.client_error(), Some(ClientError::TableNotFound(_))));
}

#[tokio::test]
async fn nested_columns_round_trip_through_the_store() {
    let client = MemorySpreadsheetsClient::new();
    client.put_table(SID, "people", grid(&[&["id", "address.city", "address.zip"]]));
    let db = store(&client);

    let person = fields(json!({"id": 1, "address": {"city": "Oslo", "zip": 150}}));
    db.insert(SID, "people", person.clone()).await.expect("insert");

    let found = db
        .search(
            SID,
            "people",
            &SearchOptions::default().with_filter(json!({"address": {"city": "Oslo"}})),
        )
        .await
        .expect("search");
    assert_eq!(found, vec![Record::with_fields(2, person)]);
}

#[tokio::test]
async fn extreme_list_options_do_not_overflow() {
    let client = users_client();
    let db = store(&client);

    let far = db
        .list(SID, TABLE, ListOptions::new(10, i64::MAX))
        .await
        .expect("list");
    assert!(far.is_empty());

    let everything = db
        .list(SID, TABLE, ListOptions::new(i64::MAX, 1))
        .await
        .expect("list");
    assert_eq!(everything, vec![user(2), user(3), user(4)]);

    let both = db
        .list(SID, TABLE, ListOptions::new(i64::MAX, i64::MAX))
        .await
        .expect("list");
    assert!(both.is_empty());
}

#[tokio::test]
async fn list_options_deserialize_from_request_json() {
    let client = users_client();
    let db = store(&client);

    let options: ListOptions =
        serde_json::from_value(json!({"offset": 9223372036854775807_i64})).expect("options");
    assert_eq!(options.limit, 10);
    assert!(db.list(SID, TABLE, options).await.expect("list").is_empty());
}
