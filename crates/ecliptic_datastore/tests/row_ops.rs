//! Row-operation behavior against a live engine.

use ecliptic_datastore::{delete_rows, insert_rows, introspect, select_rows, update_rows};
use ecliptic_schema::{FilterOp, RowFilter, SchemaSnapshot, SortDirection, SortSpec};
use serde_json::{json, Map, Value};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;

async fn items_table() -> (SqlitePool, SchemaSnapshot) {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    sqlx::query(
        r#"CREATE TABLE "items" (
            "_id" INTEGER PRIMARY KEY AUTOINCREMENT,
            "sku" TEXT NOT NULL UNIQUE,
            "label" TEXT,
            "price" REAL
        )"#,
    )
    .execute(&pool)
    .await
    .unwrap();
    let snapshot = introspect(&pool).await.unwrap();
    (pool, snapshot)
}

fn item(sku: &str, label: &str) -> Map<String, Value> {
    let mut row = Map::new();
    row.insert("sku".to_string(), json!(sku));
    row.insert("label".to_string(), json!(label));
    row
}

async fn count(pool: &SqlitePool) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM items")
        .fetch_one(pool)
        .await
        .unwrap()
}

#[tokio::test]
async fn insert_returns_rowids_and_echoed_values() {
    let (pool, snapshot) = items_table().await;

    let result = insert_rows(
        &pool,
        &snapshot,
        "items",
        &[item("sku-1", "first"), item("sku-2", "second")],
    )
    .await
    .unwrap();

    assert_eq!(result.rows.len(), 2);
    assert_eq!(result.rows[0]["_rowid"], json!(1));
    assert_eq!(result.rows[1]["_rowid"], json!(2));
    assert_eq!(result.rows[1]["sku"], json!("sku-2"));
    assert_eq!(count(&pool).await, 2);
}

#[tokio::test]
async fn bulk_insert_rolls_back_as_a_unit() {
    let (pool, snapshot) = items_table().await;
    insert_rows(&pool, &snapshot, "items", &[item("sku-0", "existing")])
        .await
        .unwrap();

    // Row 50 collides with the pre-existing unique sku.
    let mut rows = Vec::new();
    for i in 1..=100 {
        let sku = if i == 50 {
            "sku-0".to_string()
        } else {
            format!("sku-{i}")
        };
        rows.push(item(&sku, "bulk"));
    }

    let err = insert_rows(&pool, &snapshot, "items", &rows).await.unwrap_err();
    assert_eq!(err.status, 500);
    assert_eq!(count(&pool).await, 1, "failed batch must leave no rows behind");
}

#[tokio::test]
async fn insert_validates_against_snapshot() {
    let (pool, snapshot) = items_table().await;

    // Unknown column.
    let mut row = item("sku-1", "x");
    row.insert("ghost".to_string(), json!(1));
    let err = insert_rows(&pool, &snapshot, "items", &[row]).await.unwrap_err();
    assert_eq!(err.status, 400);

    // Missing NOT NULL column without default.
    let mut row = Map::new();
    row.insert("label".to_string(), json!("no sku"));
    let err = insert_rows(&pool, &snapshot, "items", &[row]).await.unwrap_err();
    assert_eq!(err.status, 400);

    // Type mismatch.
    let mut row = item("sku-1", "x");
    row.insert("price".to_string(), json!("not a number"));
    let err = insert_rows(&pool, &snapshot, "items", &[row]).await.unwrap_err();
    assert_eq!(err.status, 400);

    // Ragged column sets.
    let mut short = Map::new();
    short.insert("sku".to_string(), json!("sku-9"));
    let err = insert_rows(&pool, &snapshot, "items", &[item("sku-8", "a"), short])
        .await
        .unwrap_err();
    assert_eq!(err.status, 400);

    assert_eq!(count(&pool).await, 0);
}

#[tokio::test]
async fn update_requires_filters_and_returns_updated_rows() {
    let (pool, snapshot) = items_table().await;
    insert_rows(
        &pool,
        &snapshot,
        "items",
        &[item("sku-1", "old"), item("sku-2", "old"), item("sku-3", "keep")],
    )
    .await
    .unwrap();

    // Empty filter list is refused before any engine mutation.
    let mut values = Map::new();
    values.insert("label".to_string(), json!("new"));
    let err = update_rows(&pool, &snapshot, "items", &[], &values)
        .await
        .unwrap_err();
    assert_eq!(err.status, 400);
    let unchanged: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM items WHERE label = 'old'")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(unchanged, 2);

    let filters = [RowFilter {
        column: "label".to_string(),
        op: FilterOp::Eq,
        value: json!("old"),
    }];
    let result = update_rows(&pool, &snapshot, "items", &filters, &values)
        .await
        .unwrap();
    assert_eq!(result.updated, 2);
    assert_eq!(result.rows.len(), 2);
    // Returned rows reflect the post-update state even though the filter
    // column itself changed.
    assert!(result.rows.iter().all(|r| r["label"] == json!("new")));
    assert!(result.rows.iter().all(|r| r.contains_key("_rowid")));
}

#[tokio::test]
async fn delete_requires_rowids() {
    let (pool, snapshot) = items_table().await;
    insert_rows(&pool, &snapshot, "items", &[item("sku-1", "a"), item("sku-2", "b")])
        .await
        .unwrap();

    let err = delete_rows(&pool, "items", &[]).await.unwrap_err();
    assert_eq!(err.status, 400);
    assert_eq!(count(&pool).await, 2);

    let result = delete_rows(&pool, "items", &[1]).await.unwrap();
    assert_eq!(result.deleted, 1);
    assert_eq!(count(&pool).await, 1);

    // Hostile table names never reach the engine.
    let err = delete_rows(&pool, "items; DROP TABLE items", &[1])
        .await
        .unwrap_err();
    assert_eq!(err.status, 400);
}

#[tokio::test]
async fn pagination_boundary() {
    let (pool, snapshot) = items_table().await;
    let rows: Vec<_> = (1..=51).map(|i| item(&format!("sku-{i}"), "x")).collect();
    insert_rows(&pool, &snapshot, "items", &rows).await.unwrap();

    let page = select_rows(&pool, &snapshot, "items", &[], &[], 50, 0, None)
        .await
        .unwrap();
    assert_eq!(page.data.len(), 50);
    assert!(page.pagination.has_more);
    assert_eq!(page.pagination.page_size, 50);
    assert_eq!(page.pagination.offset, 0);

    let page = select_rows(&pool, &snapshot, "items", &[], &[], 50, 50, None)
        .await
        .unwrap();
    assert_eq!(page.data.len(), 1);
    assert!(!page.pagination.has_more);
}

#[tokio::test]
async fn select_surfaces_rowid_and_respects_filters() {
    let (pool, snapshot) = items_table().await;
    insert_rows(
        &pool,
        &snapshot,
        "items",
        &[item("sku-1", "apple"), item("sku-2", "banana"), item("sku-3", "avocado")],
    )
    .await
    .unwrap();

    let filters = [RowFilter {
        column: "label".to_string(),
        op: FilterOp::Like,
        value: json!("a%"),
    }];
    let sort = [SortSpec {
        column: "label".to_string(),
        direction: SortDirection::Desc,
    }];
    let page = select_rows(
        &pool,
        &snapshot,
        "items",
        &filters,
        &sort,
        10,
        0,
        Some(&["label".to_string()]),
    )
    .await
    .unwrap();

    assert_eq!(page.data.len(), 2);
    assert_eq!(page.data[0]["label"], json!("avocado"));
    assert!(page.data[0].contains_key("_rowid"));
    assert!(!page.data[0].contains_key("sku"));

    // `in` filter over rowids.
    let filters = [RowFilter {
        column: "_rowid".to_string(),
        op: FilterOp::In,
        value: json!([1, 3]),
    }];
    let page = select_rows(&pool, &snapshot, "items", &filters, &[], 10, 0, None)
        .await
        .unwrap();
    assert_eq!(page.data.len(), 2);
}

#[tokio::test]
async fn unknown_tables_and_columns_are_refused() {
    let (pool, snapshot) = items_table().await;

    let err = select_rows(&pool, &snapshot, "ghosts", &[], &[], 10, 0, None)
        .await
        .unwrap_err();
    assert_eq!(err.status, 404);

    let filters = [RowFilter {
        column: "ghost".to_string(),
        op: FilterOp::Eq,
        value: json!(1),
    }];
    let err = select_rows(&pool, &snapshot, "items", &filters, &[], 10, 0, None)
        .await
        .unwrap_err();
    assert_eq!(err.status, 400);
}
