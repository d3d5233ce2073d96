//! Catalog schema creation and vocabulary seeding.
//!
//! All CREATE TABLE statements live here - single source of truth.

use ecliptic_fault::Result;
use ecliptic_schema::{Action, TargetType};
use tracing::info;

use crate::{now_rfc3339, Catalog};

/// Global wildcard target paths, seeded once.
const GLOBAL_WILDCARDS: &[(&str, TargetType)] = &[
    ("datastore:*", TargetType::Datastore),
    ("datastore:*.table:*", TargetType::Table),
    ("datastore:*.table:*.column:*", TargetType::Column),
];

impl Catalog {
    pub(crate) async fn apply_pragmas(&self) -> Result<()> {
        for pragma in [
            "PRAGMA foreign_keys=ON",
            "PRAGMA journal_mode=WAL",
            "PRAGMA busy_timeout=5000",
            "PRAGMA synchronous=NORMAL",
            "PRAGMA cache_size=10000",
            "PRAGMA temp_store=MEMORY",
            "PRAGMA mmap_size=268435456",
        ] {
            sqlx::query(pragma).execute(&self.pool).await?;
        }
        Ok(())
    }

    /// Ensure all tables exist and the closed vocabulary is seeded.
    pub(crate) async fn ensure_schema(&self) -> Result<()> {
        self.create_identity_tables().await?;
        self.create_datastore_tables().await?;
        self.create_permission_tables().await?;
        self.seed_vocabulary().await?;
        self.seed_global_wildcards().await?;
        info!("catalog schema verified");
        Ok(())
    }

    async fn create_identity_tables(&self) -> Result<()> {
        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS organization (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                created_at TEXT NOT NULL
            )"#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS user (
                id TEXT PRIMARY KEY,
                email TEXT NOT NULL UNIQUE,
                created_at TEXT NOT NULL
            )"#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS session (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL REFERENCES user(id) ON DELETE CASCADE,
                active_organization_id TEXT NOT NULL REFERENCES organization(id) ON DELETE CASCADE,
                created_at TEXT NOT NULL
            )"#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn create_datastore_tables(&self) -> Result<()> {
        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS datastore (
                id TEXT PRIMARY KEY,
                organization_id TEXT NOT NULL REFERENCES organization(id) ON DELETE CASCADE,
                internal_name TEXT NOT NULL,
                provider TEXT NOT NULL DEFAULT 'sqlite',
                external_id TEXT NOT NULL,
                schema_json TEXT NOT NULL DEFAULT '{"tables":{}}',
                status TEXT NOT NULL DEFAULT 'active',
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                UNIQUE(organization_id, internal_name)
            )"#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS log (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                organization_id TEXT,
                code TEXT NOT NULL,
                internal TEXT NOT NULL,
                params_json TEXT,
                created_at TEXT NOT NULL
            )"#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn create_permission_tables(&self) -> Result<()> {
        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS permission_action (
                id TEXT PRIMARY KEY,
                scope TEXT NOT NULL
            )"#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS permission_allowed_action_by_type (
                target_type TEXT NOT NULL,
                action_id TEXT NOT NULL REFERENCES permission_action(id),
                PRIMARY KEY (target_type, action_id)
            )"#,
        )
        .execute(&self.pool)
        .await?;

        // organization_id / datastore_id are NULL for global wildcard targets.
        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS permission_target (
                id TEXT PRIMARY KEY,
                organization_id TEXT REFERENCES organization(id) ON DELETE CASCADE,
                datastore_id TEXT,
                target_type TEXT NOT NULL,
                internal_name TEXT NOT NULL,
                created_at TEXT NOT NULL
            )"#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS mcp_key (
                id TEXT PRIMARY KEY,
                organization_id TEXT NOT NULL REFERENCES organization(id) ON DELETE CASCADE,
                user_id TEXT NOT NULL REFERENCES user(id) ON DELETE CASCADE,
                name TEXT NOT NULL,
                token_hash TEXT NOT NULL UNIQUE,
                created_at TEXT NOT NULL,
                revoked_at TEXT
            )"#,
        )
        .execute(&self.pool)
        .await?;

        // ON UPDATE CASCADE keeps mappings attached across rename-table, which
        // rewrites target ids in place.
        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS permission_mapping (
                id TEXT PRIMARY KEY,
                organization_id TEXT NOT NULL REFERENCES organization(id) ON DELETE CASCADE,
                mcp_key_id TEXT NOT NULL REFERENCES mcp_key(id) ON DELETE CASCADE,
                action_id TEXT NOT NULL REFERENCES permission_action(id),
                target_id TEXT NOT NULL REFERENCES permission_target(id)
                    ON UPDATE CASCADE ON DELETE CASCADE,
                created_at TEXT NOT NULL,
                UNIQUE(mcp_key_id, action_id, target_id)
            )"#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn seed_vocabulary(&self) -> Result<()> {
        for action in Action::ALL {
            sqlx::query("INSERT OR IGNORE INTO permission_action (id, scope) VALUES (?, ?)")
                .bind(action.as_str())
                .bind(scope_name(*action))
                .execute(&self.pool)
                .await?;
        }

        for target_type in [TargetType::Datastore, TargetType::Table, TargetType::Column] {
            for action in Action::ALL {
                if target_type.allows(*action) {
                    sqlx::query(
                        "INSERT OR IGNORE INTO permission_allowed_action_by_type \
                         (target_type, action_id) VALUES (?, ?)",
                    )
                    .bind(target_type.as_str())
                    .bind(action.as_str())
                    .execute(&self.pool)
                    .await?;
                }
            }
        }

        Ok(())
    }

    async fn seed_global_wildcards(&self) -> Result<()> {
        let now = now_rfc3339();
        for (id, target_type) in GLOBAL_WILDCARDS {
            sqlx::query(
                "INSERT OR IGNORE INTO permission_target \
                 (id, organization_id, datastore_id, target_type, internal_name, created_at) \
                 VALUES (?, NULL, NULL, ?, '*', ?)",
            )
            .bind(id)
            .bind(target_type.as_str())
            .bind(&now)
            .execute(&self.pool)
            .await?;
        }
        Ok(())
    }
}

fn scope_name(action: Action) -> &'static str {
    match action.scope() {
        ecliptic_schema::ActionScope::Global => "global",
        ecliptic_schema::ActionScope::Datastore => "datastore",
        ecliptic_schema::ActionScope::Table => "table",
        ecliptic_schema::ActionScope::Column => "column",
    }
}

#[cfg(test)]
mod tests {
    use crate::Catalog;

    #[tokio::test]
    async fn schema_and_vocabulary_seeded() {
        let catalog = Catalog::open_in_memory().await.unwrap();

        let actions: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM permission_action")
            .fetch_one(catalog.pool())
            .await
            .unwrap();
        assert_eq!(actions, 19);

        let wildcards: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM permission_target WHERE organization_id IS NULL",
        )
        .fetch_one(catalog.pool())
        .await
        .unwrap();
        assert_eq!(wildcards, 3);

        // Column targets only accept column-scoped actions.
        let bad_pair: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM permission_allowed_action_by_type \
             WHERE target_type = 'datastore.table.column' AND action_id = 'datastore.table.drop'",
        )
        .fetch_one(catalog.pool())
        .await
        .unwrap();
        assert_eq!(bad_pair, 0);
    }

    #[tokio::test]
    async fn ensure_schema_is_idempotent() {
        let catalog = Catalog::open_in_memory().await.unwrap();
        catalog.ensure_schema().await.unwrap();
        let actions: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM permission_action")
            .fetch_one(catalog.pool())
            .await
            .unwrap();
        assert_eq!(actions, 19);
    }
}
