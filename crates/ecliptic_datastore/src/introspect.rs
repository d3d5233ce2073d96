//! Schema introspection of a datastore file.

use std::collections::BTreeMap;

use ecliptic_fault::Result;
use ecliptic_schema::{quote_identifier, ColumnSchema, DbType, ForeignKeyRef, SchemaSnapshot, TableSchema};
use sqlx::SqlitePool;

/// Produce the snapshot of every user table in the file.
///
/// The snapshot is a derived cache; this is its single producer.
pub async fn introspect(pool: &SqlitePool) -> Result<SchemaSnapshot> {
    let tables: Vec<(String, Option<String>)> = sqlx::query_as(
        "SELECT name, sql FROM sqlite_master \
         WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
    )
    .fetch_all(pool)
    .await?;

    let mut snapshot = SchemaSnapshot::default();
    for (table, create_sql) in tables {
        let has_autoincrement = create_sql
            .map(|sql| sql.to_ascii_uppercase().contains("AUTOINCREMENT"))
            .unwrap_or(false);

        let foreign_keys = foreign_keys_of(pool, &table).await?;

        let columns: Vec<(i64, String, String, i64, Option<String>, i64)> =
            sqlx::query_as(&format!(
                "PRAGMA table_info({})",
                quote_identifier(&table)
            ))
            .fetch_all(pool)
            .await?;

        let mut table_schema = TableSchema::default();
        for (cid, name, declared_type, notnull, dflt_value, pk) in columns {
            let db_type = DbType::affinity_of(&declared_type);
            let autoincrement =
                has_autoincrement && pk == 1 && db_type == DbType::Integer;
            table_schema.columns.insert(
                name.clone(),
                ColumnSchema {
                    foreign_key: foreign_keys.get(&name).cloned(),
                    name,
                    order: cid,
                    db_type,
                    dflt_value,
                    notnull: notnull != 0,
                    autoincrement,
                },
            );
        }
        snapshot.tables.insert(table, table_schema);
    }

    Ok(snapshot)
}

async fn foreign_keys_of(
    pool: &SqlitePool,
    table: &str,
) -> Result<BTreeMap<String, ForeignKeyRef>> {
    type FkRow = (i64, i64, String, String, Option<String>, String, String, String);
    let rows: Vec<FkRow> = sqlx::query_as(&format!(
        "PRAGMA foreign_key_list({})",
        quote_identifier(table)
    ))
    .fetch_all(pool)
    .await?;

    let mut out = BTreeMap::new();
    for (_id, _seq, ref_table, from, to, on_update, on_delete, _match) in rows {
        out.insert(
            from,
            ForeignKeyRef {
                table: ref_table,
                // NULL `to` means the referenced table's primary key.
                column: to.unwrap_or_else(|| "_id".to_string()),
                on_update: normalize_action(on_update),
                on_delete: normalize_action(on_delete),
            },
        );
    }
    Ok(out)
}

fn normalize_action(action: String) -> Option<String> {
    if action == "NO ACTION" {
        None
    } else {
        Some(action)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn memory_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        sqlx::query("PRAGMA foreign_keys=ON")
            .execute(&pool)
            .await
            .unwrap();
        pool
    }

    #[tokio::test]
    async fn snapshot_reflects_created_tables() {
        let pool = memory_pool().await;
        sqlx::query(
            r#"CREATE TABLE "users" (
                "_id" INTEGER PRIMARY KEY AUTOINCREMENT,
                "email" TEXT NOT NULL,
                "age" INTEGER DEFAULT 21,
                "score" REAL
            )"#,
        )
        .execute(&pool)
        .await
        .unwrap();

        let snapshot = introspect(&pool).await.unwrap();
        let users = snapshot.table("users").unwrap();

        let id = users.column("_id").unwrap();
        assert_eq!(id.db_type, DbType::Integer);
        assert!(id.autoincrement);
        assert_eq!(id.order, 0);

        let email = users.column("email").unwrap();
        assert_eq!(email.db_type, DbType::Text);
        assert!(email.notnull);
        assert!(!email.autoincrement);

        let age = users.column("age").unwrap();
        assert_eq!(age.dflt_value.as_deref(), Some("21"));

        assert_eq!(users.column("score").unwrap().db_type, DbType::Real);
    }

    #[tokio::test]
    async fn foreign_keys_are_captured() {
        let pool = memory_pool().await;
        sqlx::query(r#"CREATE TABLE "users" ("_id" INTEGER PRIMARY KEY AUTOINCREMENT)"#)
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query(
            r#"CREATE TABLE "posts" (
                "_id" INTEGER PRIMARY KEY AUTOINCREMENT,
                "author_id" INTEGER REFERENCES "users"("_id") ON DELETE CASCADE
            )"#,
        )
        .execute(&pool)
        .await
        .unwrap();

        let snapshot = introspect(&pool).await.unwrap();
        let fk = snapshot
            .table("posts")
            .unwrap()
            .column("author_id")
            .unwrap()
            .foreign_key
            .clone()
            .unwrap();
        assert_eq!(fk.table, "users");
        assert_eq!(fk.column, "_id");
        assert_eq!(fk.on_delete.as_deref(), Some("CASCADE"));
        assert_eq!(fk.on_update, None);
    }

    #[tokio::test]
    async fn empty_file_yields_empty_snapshot() {
        let pool = memory_pool().await;
        let snapshot = introspect(&pool).await.unwrap();
        assert!(snapshot.tables.is_empty());
    }
}
