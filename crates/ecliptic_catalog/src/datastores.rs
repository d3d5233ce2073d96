//! Datastore rows, always scoped to an organization.

use ecliptic_fault::{ErrorEntry, Result};
use ecliptic_schema::TargetType;

use crate::models::DatastoreRow;
use crate::{is_unique_violation, now_rfc3339, Catalog};

fn name_conflict(name: &str) -> ErrorEntry {
    ErrorEntry::conflict(
        "datastore.name_conflict",
        format!("datastore name '{name}' already in use"),
    )
    .with_external("en", "A datastore with this name already exists")
    .with_external("de", "Eine Datenbank mit diesem Namen existiert bereits")
}

fn datastore_missing(id: &str) -> ErrorEntry {
    ErrorEntry::not_found("datastore.not_found", format!("datastore {id} not found"))
        .with_external("en", "Datastore not found")
        .with_external("de", "Datenbank nicht gefunden")
}

impl Catalog {
    pub async fn list_datastores(&self, organization_id: &str) -> Result<Vec<DatastoreRow>> {
        Ok(sqlx::query_as::<_, DatastoreRow>(
            "SELECT * FROM datastore WHERE organization_id = ? ORDER BY created_at, id",
        )
        .bind(organization_id)
        .fetch_all(&self.pool)
        .await?)
    }

    pub async fn datastore(&self, organization_id: &str, id: &str) -> Result<DatastoreRow> {
        sqlx::query_as::<_, DatastoreRow>(
            "SELECT * FROM datastore WHERE organization_id = ? AND id = ?",
        )
        .bind(organization_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| datastore_missing(id))
    }

    /// Insert the datastore row and seed its permission targets in one
    /// transaction. The caller has already created the file (with a rollback
    /// registered), so a failure here leaves no catalog trace.
    pub async fn create_datastore(
        &self,
        organization_id: &str,
        id: &str,
        internal_name: &str,
        provider: &str,
    ) -> Result<DatastoreRow> {
        let now = now_rfc3339();
        let row = DatastoreRow {
            id: id.to_string(),
            organization_id: organization_id.to_string(),
            internal_name: internal_name.to_string(),
            provider: provider.to_string(),
            external_id: id.to_string(),
            schema_json: r#"{"tables":{}}"#.to_string(),
            status: "active".to_string(),
            created_at: now.clone(),
            updated_at: now.clone(),
        };

        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query(
            "INSERT INTO datastore \
             (id, organization_id, internal_name, provider, external_id, schema_json, status, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&row.id)
        .bind(&row.organization_id)
        .bind(&row.internal_name)
        .bind(&row.provider)
        .bind(&row.external_id)
        .bind(&row.schema_json)
        .bind(&row.status)
        .bind(&row.created_at)
        .bind(&row.updated_at)
        .execute(&mut *tx)
        .await;

        if let Err(err) = inserted {
            return Err(if is_unique_violation(&err) {
                name_conflict(internal_name)
            } else {
                err.into()
            });
        }

        // Per-datastore targets: the datastore itself plus its table and
        // column wildcards.
        let targets = [
            (format!("datastore:{id}"), TargetType::Datastore, internal_name),
            (format!("datastore:{id}.table:*"), TargetType::Table, "*"),
            (
                format!("datastore:{id}.table:*.column:*"),
                TargetType::Column,
                "*",
            ),
        ];
        for (target_id, target_type, target_name) in &targets {
            sqlx::query(
                "INSERT INTO permission_target \
                 (id, organization_id, datastore_id, target_type, internal_name, created_at) \
                 VALUES (?, ?, ?, ?, ?, ?)",
            )
            .bind(target_id)
            .bind(organization_id)
            .bind(id)
            .bind(target_type.as_str())
            .bind(target_name)
            .bind(&now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(row)
    }

    pub async fn rename_datastore(
        &self,
        organization_id: &str,
        id: &str,
        internal_name: &str,
    ) -> Result<DatastoreRow> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            "UPDATE datastore SET internal_name = ?, updated_at = ? \
             WHERE organization_id = ? AND id = ?",
        )
        .bind(internal_name)
        .bind(now_rfc3339())
        .bind(organization_id)
        .bind(id)
        .execute(&mut *tx)
        .await;

        match updated {
            Err(err) if is_unique_violation(&err) => return Err(name_conflict(internal_name)),
            Err(err) => return Err(err.into()),
            Ok(result) if result.rows_affected() == 0 => return Err(datastore_missing(id)),
            Ok(_) => {}
        }

        // Keep the datastore target's display name in sync.
        sqlx::query(
            "UPDATE permission_target SET internal_name = ? \
             WHERE organization_id = ? AND datastore_id = ? AND target_type = 'datastore'",
        )
        .bind(internal_name)
        .bind(organization_id)
        .bind(id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        self.datastore(organization_id, id).await
    }

    /// Delete the datastore row and every permission target under it (the
    /// mapping rows cascade). Ordered AFTER the file deletion; a failure
    /// here leaves a dangling catalog row that a retried drop clears, never
    /// a lost file.
    pub async fn delete_datastore(&self, organization_id: &str, id: &str) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM permission_target WHERE organization_id = ? AND datastore_id = ?")
            .bind(organization_id)
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let deleted = sqlx::query("DELETE FROM datastore WHERE organization_id = ? AND id = ?")
            .bind(organization_id)
            .bind(id)
            .execute(&mut *tx)
            .await?;
        if deleted.rows_affected() == 0 {
            return Err(datastore_missing(id));
        }

        tx.commit().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::Catalog;

    async fn seeded() -> (Catalog, String, String) {
        let catalog = Catalog::open_in_memory().await.unwrap();
        let org_a = catalog.create_organization("alpha").await.unwrap();
        let org_b = catalog.create_organization("beta").await.unwrap();
        (catalog, org_a.id, org_b.id)
    }

    #[tokio::test]
    async fn listing_is_organization_scoped() {
        let (catalog, org_a, org_b) = seeded().await;

        catalog
            .create_datastore(&org_a, "ds_alice_1", "alice-data", "sqlite")
            .await
            .unwrap();
        catalog
            .create_datastore(&org_b, "ds_bob_1", "bob-data", "sqlite")
            .await
            .unwrap();
        catalog
            .create_datastore(&org_b, "ds_bob_2", "bob-more", "sqlite")
            .await
            .unwrap();

        let alice = catalog.list_datastores(&org_a).await.unwrap();
        assert_eq!(
            alice.iter().map(|d| d.id.as_str()).collect::<Vec<_>>(),
            vec!["ds_alice_1"]
        );

        let bob = catalog.list_datastores(&org_b).await.unwrap();
        assert_eq!(
            bob.iter().map(|d| d.id.as_str()).collect::<Vec<_>>(),
            vec!["ds_bob_1", "ds_bob_2"]
        );
    }

    #[tokio::test]
    async fn duplicate_name_conflicts_within_org_only() {
        let (catalog, org_a, org_b) = seeded().await;

        catalog
            .create_datastore(&org_a, "ds1", "shared-name", "sqlite")
            .await
            .unwrap();

        let err = catalog
            .create_datastore(&org_a, "ds2", "shared-name", "sqlite")
            .await
            .unwrap_err();
        assert_eq!(err.status, 409);

        // Same name in another organization is fine.
        catalog
            .create_datastore(&org_b, "ds3", "shared-name", "sqlite")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn create_seeds_per_datastore_targets() {
        let (catalog, org_a, _) = seeded().await;
        catalog
            .create_datastore(&org_a, "abc123", "data", "sqlite")
            .await
            .unwrap();

        let ids: Vec<String> = sqlx::query_scalar(
            "SELECT id FROM permission_target WHERE datastore_id = 'abc123' ORDER BY id",
        )
        .fetch_all(catalog.pool())
        .await
        .unwrap();
        assert_eq!(
            ids,
            vec![
                "datastore:abc123",
                "datastore:abc123.table:*",
                "datastore:abc123.table:*.column:*",
            ]
        );
    }

    #[tokio::test]
    async fn delete_removes_row_and_targets() {
        let (catalog, org_a, _) = seeded().await;
        catalog
            .create_datastore(&org_a, "abc123", "data", "sqlite")
            .await
            .unwrap();

        catalog.delete_datastore(&org_a, "abc123").await.unwrap();

        assert_eq!(catalog.datastore(&org_a, "abc123").await.unwrap_err().status, 404);
        let targets: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM permission_target WHERE datastore_id = 'abc123'")
                .fetch_one(catalog.pool())
                .await
                .unwrap();
        assert_eq!(targets, 0);
    }

    #[tokio::test]
    async fn cross_org_access_is_not_found() {
        let (catalog, org_a, org_b) = seeded().await;
        catalog
            .create_datastore(&org_a, "abc123", "data", "sqlite")
            .await
            .unwrap();

        let err = catalog.datastore(&org_b, "abc123").await.unwrap_err();
        assert_eq!(err.status, 404);
        let err = catalog.delete_datastore(&org_b, "abc123").await.unwrap_err();
        assert_eq!(err.status, 404);
    }
}
