//! Schema-change transactor behavior: file + catalog stay in lockstep.

use ecliptic_catalog::models::DatastoreRow;
use ecliptic_catalog::Catalog;
use ecliptic_datastore::{apply_schema_change, introspect, DatastorePool};
use ecliptic_fault::RollbackStack;
use ecliptic_schema::{DbType, SchemaChange, SchemaSnapshot};

struct Fixture {
    catalog: Catalog,
    pool: DatastorePool,
    datastore: DatastoreRow,
    _dir: tempfile::TempDir,
}

async fn fixture() -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let catalog = Catalog::open_in_memory().await.unwrap();
    let org = catalog.create_organization("alpha").await.unwrap();
    let datastore = catalog
        .create_datastore(&org.id, "abc123", "data", "sqlite")
        .await
        .unwrap();

    let pool = DatastorePool::new(dir.path());
    let mut rollbacks = RollbackStack::new();
    pool.create("abc123", &mut rollbacks).await.unwrap();

    Fixture {
        catalog,
        pool,
        datastore,
        _dir: dir,
    }
}

async fn stored_snapshot(f: &Fixture) -> SchemaSnapshot {
    let row = f
        .catalog
        .datastore(&f.datastore.organization_id, &f.datastore.id)
        .await
        .unwrap();
    serde_json::from_str(&row.schema_json).unwrap()
}

async fn target_ids(f: &Fixture) -> Vec<String> {
    sqlx::query_scalar("SELECT id FROM permission_target WHERE datastore_id = ? ORDER BY id")
        .bind(&f.datastore.id)
        .fetch_all(f.catalog.pool())
        .await
        .unwrap()
}

#[tokio::test]
async fn add_table_syncs_snapshot_and_targets() {
    let f = fixture().await;

    let snapshot = apply_schema_change(
        &f.catalog,
        &f.pool,
        &f.datastore,
        &SchemaChange::AddTable {
            table: "users".to_string(),
        },
    )
    .await
    .unwrap();

    // The new table carries the synthetic autoincrement primary key.
    let id_col = snapshot.table("users").unwrap().column("_id").unwrap();
    assert_eq!(id_col.db_type, DbType::Integer);
    assert!(id_col.autoincrement);

    // Stored snapshot equals a fresh introspection of the file.
    let db = f.pool.open("abc123").await.unwrap();
    assert_eq!(stored_snapshot(&f).await, introspect(&db).await.unwrap());

    let targets = target_ids(&f).await;
    assert!(targets.contains(&"datastore:abc123.table:users".to_string()));
    assert!(targets.contains(&"datastore:abc123.table:users.column:_id".to_string()));
    assert!(targets.contains(&"datastore:abc123.table:users.column:*".to_string()));
}

#[tokio::test]
async fn column_lifecycle_keeps_consistency() {
    let f = fixture().await;
    for op in [
        SchemaChange::AddTable {
            table: "users".to_string(),
        },
        SchemaChange::AddColumn {
            table: "users".to_string(),
            column: "email".to_string(),
            db_type: DbType::Text,
            foreign_key: None,
        },
        SchemaChange::RenameColumn {
            table: "users".to_string(),
            column: "email".to_string(),
            new_name: "contact".to_string(),
        },
    ] {
        apply_schema_change(&f.catalog, &f.pool, &f.datastore, &op)
            .await
            .unwrap();
    }

    let db = f.pool.open("abc123").await.unwrap();
    let fresh = introspect(&db).await.unwrap();
    assert_eq!(stored_snapshot(&f).await, fresh);
    assert!(fresh.table("users").unwrap().column("contact").is_some());
    assert!(fresh.table("users").unwrap().column("email").is_none());

    let targets = target_ids(&f).await;
    assert!(targets.contains(&"datastore:abc123.table:users.column:contact".to_string()));
    assert!(!targets.contains(&"datastore:abc123.table:users.column:email".to_string()));

    apply_schema_change(
        &f.catalog,
        &f.pool,
        &f.datastore,
        &SchemaChange::DropColumn {
            table: "users".to_string(),
            column: "contact".to_string(),
        },
    )
    .await
    .unwrap();
    let targets = target_ids(&f).await;
    assert!(!targets.contains(&"datastore:abc123.table:users.column:contact".to_string()));
}

#[tokio::test]
async fn rename_and_drop_table_follow_through() {
    let f = fixture().await;
    for op in [
        SchemaChange::AddTable {
            table: "users".to_string(),
        },
        SchemaChange::RenameTable {
            table: "users".to_string(),
            new_name: "people".to_string(),
        },
    ] {
        apply_schema_change(&f.catalog, &f.pool, &f.datastore, &op)
            .await
            .unwrap();
    }

    let db = f.pool.open("abc123").await.unwrap();
    let fresh = introspect(&db).await.unwrap();
    assert!(fresh.has_table("people"));
    assert!(!fresh.has_table("users"));
    assert!(target_ids(&f)
        .await
        .contains(&"datastore:abc123.table:people.column:_id".to_string()));

    apply_schema_change(
        &f.catalog,
        &f.pool,
        &f.datastore,
        &SchemaChange::DropTable {
            table: "people".to_string(),
        },
    )
    .await
    .unwrap();

    let fresh = introspect(&db).await.unwrap();
    assert!(fresh.tables.is_empty());
    assert!(!target_ids(&f).await.iter().any(|t| t.contains("table:people")));
    assert_eq!(stored_snapshot(&f).await, fresh);
}

#[tokio::test]
async fn engine_failure_surfaces_without_catalog_mutation() {
    let f = fixture().await;

    // Dropping a table that does not exist fails inside the engine.
    let err = apply_schema_change(
        &f.catalog,
        &f.pool,
        &f.datastore,
        &SchemaChange::DropTable {
            table: "missing".to_string(),
        },
    )
    .await
    .unwrap_err();
    assert_eq!(err.status, 500);
    assert!(err.should_log);
    assert!(stored_snapshot(&f).await.tables.is_empty());
}

#[tokio::test]
async fn catalog_failure_reverts_the_file_mutation() {
    let f = fixture().await;
    apply_schema_change(
        &f.catalog,
        &f.pool,
        &f.datastore,
        &SchemaChange::AddTable {
            table: "users".to_string(),
        },
    )
    .await
    .unwrap();

    // Sabotage the catalog so the target sync cannot commit.
    sqlx::query("DROP TABLE permission_target")
        .execute(f.catalog.pool())
        .await
        .unwrap();

    let err = apply_schema_change(
        &f.catalog,
        &f.pool,
        &f.datastore,
        &SchemaChange::AddColumn {
            table: "users".to_string(),
            column: "email".to_string(),
            db_type: DbType::Text,
            foreign_key: None,
        },
    )
    .await
    .unwrap_err();
    assert_eq!(err.status, 500);

    // The inverse DDL removed the column from the file again.
    let db = f.pool.open("abc123").await.unwrap();
    let fresh = introspect(&db).await.unwrap();
    assert!(fresh.table("users").unwrap().column("email").is_none());
}
