//! Permission vocabulary reads and target synchronization.
//!
//! Target rows mirror the shape of each datastore file: whenever a schema
//! change alters the existence of a table or column, the target rows change
//! in the same catalog transaction as the schema snapshot.

use ecliptic_fault::Result;
use ecliptic_schema::{escape_like, SchemaChange, TargetType};
use sqlx::{Sqlite, Transaction};

use crate::models::{PermissionActionRow, PermissionTargetRow};
use crate::{now_rfc3339, Catalog};

impl Catalog {
    pub async fn actions(&self) -> Result<Vec<PermissionActionRow>> {
        Ok(
            sqlx::query_as::<_, PermissionActionRow>("SELECT * FROM permission_action ORDER BY id")
                .fetch_all(&self.pool)
                .await?,
        )
    }

    pub async fn allowed_actions_by_type(&self) -> Result<Vec<(String, String)>> {
        Ok(sqlx::query_as::<_, (String, String)>(
            "SELECT target_type, action_id FROM permission_allowed_action_by_type \
             ORDER BY target_type, action_id",
        )
        .fetch_all(&self.pool)
        .await?)
    }

    /// Targets visible to an organization: its own rows plus the global
    /// wildcards.
    pub async fn targets(&self, organization_id: &str) -> Result<Vec<PermissionTargetRow>> {
        Ok(sqlx::query_as::<_, PermissionTargetRow>(
            "SELECT * FROM permission_target \
             WHERE organization_id = ? OR organization_id IS NULL \
             ORDER BY id",
        )
        .bind(organization_id)
        .fetch_all(&self.pool)
        .await?)
    }

    pub async fn target(
        &self,
        organization_id: &str,
        target_id: &str,
    ) -> Result<Option<PermissionTargetRow>> {
        Ok(sqlx::query_as::<_, PermissionTargetRow>(
            "SELECT * FROM permission_target \
             WHERE id = ? AND (organization_id = ? OR organization_id IS NULL)",
        )
        .bind(target_id)
        .bind(organization_id)
        .fetch_optional(&self.pool)
        .await?)
    }

    /// Apply a committed schema change to the catalog: store the fresh
    /// snapshot and synchronize the target rows, atomically.
    pub async fn commit_schema_change(
        &self,
        organization_id: &str,
        datastore_id: &str,
        schema_json: &str,
        op: &SchemaChange,
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "UPDATE datastore SET schema_json = ?, updated_at = ? \
             WHERE organization_id = ? AND id = ?",
        )
        .bind(schema_json)
        .bind(now_rfc3339())
        .bind(organization_id)
        .bind(datastore_id)
        .execute(&mut *tx)
        .await?;

        sync_targets(&mut tx, organization_id, datastore_id, op).await?;

        tx.commit().await?;
        Ok(())
    }
}

async fn insert_target(
    tx: &mut Transaction<'_, Sqlite>,
    organization_id: &str,
    datastore_id: &str,
    target_id: &str,
    target_type: TargetType,
    internal_name: &str,
) -> Result<()> {
    sqlx::query(
        "INSERT INTO permission_target \
         (id, organization_id, datastore_id, target_type, internal_name, created_at) \
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(target_id)
    .bind(organization_id)
    .bind(datastore_id)
    .bind(target_type.as_str())
    .bind(internal_name)
    .bind(now_rfc3339())
    .execute(&mut **tx)
    .await?;
    Ok(())
}

async fn sync_targets(
    tx: &mut Transaction<'_, Sqlite>,
    organization_id: &str,
    datastore_id: &str,
    op: &SchemaChange,
) -> Result<()> {
    match op {
        SchemaChange::AddTable { table } => {
            let prefix = format!("datastore:{datastore_id}.table:{table}");
            insert_target(tx, organization_id, datastore_id, &prefix, TargetType::Table, table)
                .await?;
            // Synthetic primary-key column plus the column wildcard.
            insert_target(
                tx,
                organization_id,
                datastore_id,
                &format!("{prefix}.column:_id"),
                TargetType::Column,
                "_id",
            )
            .await?;
            insert_target(
                tx,
                organization_id,
                datastore_id,
                &format!("{prefix}.column:*"),
                TargetType::Column,
                "*",
            )
            .await?;
        }
        SchemaChange::DropTable { table } => {
            let exact = format!("datastore:{datastore_id}.table:{table}");
            let prefix = format!("{}.%", escape_like(&exact));
            sqlx::query(
                "DELETE FROM permission_target \
                 WHERE organization_id = ? AND datastore_id = ? \
                 AND (id = ? OR id LIKE ? ESCAPE '\\')",
            )
            .bind(organization_id)
            .bind(datastore_id)
            .bind(&exact)
            .bind(&prefix)
            .execute(&mut **tx)
            .await?;
        }
        SchemaChange::AddColumn { table, column, .. } => {
            insert_target(
                tx,
                organization_id,
                datastore_id,
                &format!("datastore:{datastore_id}.table:{table}.column:{column}"),
                TargetType::Column,
                column,
            )
            .await?;
        }
        SchemaChange::DropColumn { table, column } => {
            sqlx::query(
                "DELETE FROM permission_target \
                 WHERE organization_id = ? AND datastore_id = ? AND id = ?",
            )
            .bind(organization_id)
            .bind(datastore_id)
            .bind(format!(
                "datastore:{datastore_id}.table:{table}.column:{column}"
            ))
            .execute(&mut **tx)
            .await?;
        }
        SchemaChange::RenameColumn {
            table,
            column,
            new_name,
        } => {
            sqlx::query(
                "UPDATE permission_target SET id = ?, internal_name = ? \
                 WHERE organization_id = ? AND datastore_id = ? AND id = ?",
            )
            .bind(format!(
                "datastore:{datastore_id}.table:{table}.column:{new_name}"
            ))
            .bind(new_name)
            .bind(organization_id)
            .bind(datastore_id)
            .bind(format!(
                "datastore:{datastore_id}.table:{table}.column:{column}"
            ))
            .execute(&mut **tx)
            .await?;
        }
        SchemaChange::RenameTable { table, new_name } => {
            let old_exact = format!("datastore:{datastore_id}.table:{table}");
            let new_exact = format!("datastore:{datastore_id}.table:{new_name}");
            let old_prefix = format!("{}.%", escape_like(&old_exact));
            // Rewrite the table segment of every target under the table; the
            // table target itself also takes the new display name.
            sqlx::query(
                "UPDATE permission_target SET \
                 id = ? || substr(id, ?), \
                 internal_name = CASE WHEN target_type = 'datastore.table' \
                     THEN ? ELSE internal_name END \
                 WHERE organization_id = ? AND datastore_id = ? \
                 AND (id = ? OR id LIKE ? ESCAPE '\\')",
            )
            .bind(&new_exact)
            .bind(old_exact.len() as i64 + 1)
            .bind(new_name)
            .bind(organization_id)
            .bind(datastore_id)
            .bind(&old_exact)
            .bind(&old_prefix)
            .execute(&mut **tx)
            .await?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use ecliptic_schema::{DbType, SchemaChange};

    use crate::Catalog;

    async fn with_table(catalog: &Catalog, org: &str, ds: &str, table: &str) {
        catalog
            .commit_schema_change(
                org,
                ds,
                r#"{"tables":{}}"#,
                &SchemaChange::AddTable {
                    table: table.to_string(),
                },
            )
            .await
            .unwrap();
    }

    async fn target_ids(catalog: &Catalog, ds: &str) -> Vec<String> {
        sqlx::query_scalar("SELECT id FROM permission_target WHERE datastore_id = ? ORDER BY id")
            .bind(ds)
            .fetch_all(catalog.pool())
            .await
            .unwrap()
    }

    async fn seeded() -> (Catalog, String) {
        let catalog = Catalog::open_in_memory().await.unwrap();
        let org = catalog.create_organization("alpha").await.unwrap();
        catalog
            .create_datastore(&org.id, "abc123", "data", "sqlite")
            .await
            .unwrap();
        (catalog, org.id)
    }

    #[tokio::test]
    async fn add_table_inserts_table_and_synthetic_columns() {
        let (catalog, org) = seeded().await;
        with_table(&catalog, &org, "abc123", "users").await;

        let ids = target_ids(&catalog, "abc123").await;
        assert!(ids.contains(&"datastore:abc123.table:users".to_string()));
        assert!(ids.contains(&"datastore:abc123.table:users.column:_id".to_string()));
        assert!(ids.contains(&"datastore:abc123.table:users.column:*".to_string()));
    }

    #[tokio::test]
    async fn drop_table_removes_only_that_tables_targets() {
        let (catalog, org) = seeded().await;
        with_table(&catalog, &org, "abc123", "users").await;
        with_table(&catalog, &org, "abc123", "users_archive").await;

        catalog
            .commit_schema_change(
                &org,
                "abc123",
                r#"{"tables":{}}"#,
                &SchemaChange::DropTable {
                    table: "users".to_string(),
                },
            )
            .await
            .unwrap();

        let ids = target_ids(&catalog, "abc123").await;
        assert!(!ids.contains(&"datastore:abc123.table:users".to_string()));
        assert!(!ids.contains(&"datastore:abc123.table:users.column:_id".to_string()));
        // The underscore in `users_archive` must not be eaten by the LIKE.
        assert!(ids.contains(&"datastore:abc123.table:users_archive".to_string()));
        assert!(ids.contains(&"datastore:abc123.table:users_archive.column:_id".to_string()));
    }

    #[tokio::test]
    async fn column_lifecycle_targets() {
        let (catalog, org) = seeded().await;
        with_table(&catalog, &org, "abc123", "users").await;

        catalog
            .commit_schema_change(
                &org,
                "abc123",
                r#"{"tables":{}}"#,
                &SchemaChange::AddColumn {
                    table: "users".to_string(),
                    column: "email".to_string(),
                    db_type: DbType::Text,
                    foreign_key: None,
                },
            )
            .await
            .unwrap();
        assert!(target_ids(&catalog, "abc123")
            .await
            .contains(&"datastore:abc123.table:users.column:email".to_string()));

        catalog
            .commit_schema_change(
                &org,
                "abc123",
                r#"{"tables":{}}"#,
                &SchemaChange::RenameColumn {
                    table: "users".to_string(),
                    column: "email".to_string(),
                    new_name: "contact".to_string(),
                },
            )
            .await
            .unwrap();
        let ids = target_ids(&catalog, "abc123").await;
        assert!(!ids.contains(&"datastore:abc123.table:users.column:email".to_string()));
        assert!(ids.contains(&"datastore:abc123.table:users.column:contact".to_string()));

        catalog
            .commit_schema_change(
                &org,
                "abc123",
                r#"{"tables":{}}"#,
                &SchemaChange::DropColumn {
                    table: "users".to_string(),
                    column: "contact".to_string(),
                },
            )
            .await
            .unwrap();
        assert!(!target_ids(&catalog, "abc123")
            .await
            .contains(&"datastore:abc123.table:users.column:contact".to_string()));
    }

    #[tokio::test]
    async fn rename_table_rewrites_every_target_under_it() {
        let (catalog, org) = seeded().await;
        with_table(&catalog, &org, "abc123", "users").await;
        catalog
            .commit_schema_change(
                &org,
                "abc123",
                r#"{"tables":{}}"#,
                &SchemaChange::AddColumn {
                    table: "users".to_string(),
                    column: "email".to_string(),
                    db_type: DbType::Text,
                    foreign_key: None,
                },
            )
            .await
            .unwrap();

        catalog
            .commit_schema_change(
                &org,
                "abc123",
                r#"{"tables":{}}"#,
                &SchemaChange::RenameTable {
                    table: "users".to_string(),
                    new_name: "people".to_string(),
                },
            )
            .await
            .unwrap();

        let ids = target_ids(&catalog, "abc123").await;
        assert!(ids.contains(&"datastore:abc123.table:people".to_string()));
        assert!(ids.contains(&"datastore:abc123.table:people.column:email".to_string()));
        assert!(ids.contains(&"datastore:abc123.table:people.column:_id".to_string()));
        assert!(!ids.iter().any(|id| id.contains("table:users")));

        let name: String = sqlx::query_scalar(
            "SELECT internal_name FROM permission_target WHERE id = 'datastore:abc123.table:people'",
        )
        .fetch_one(catalog.pool())
        .await
        .unwrap();
        assert_eq!(name, "people");
    }

    #[tokio::test]
    async fn schema_json_updates_with_targets() {
        let (catalog, org) = seeded().await;
        let json = r#"{"tables":{"users":{"columns":{}}}}"#;
        catalog
            .commit_schema_change(
                &org,
                "abc123",
                json,
                &SchemaChange::AddTable {
                    table: "users".to_string(),
                },
            )
            .await
            .unwrap();

        let stored = catalog.datastore(&org, "abc123").await.unwrap().schema_json;
        assert_eq!(stored, json);
    }
}
