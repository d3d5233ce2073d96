//! Central catalog store.
//!
//! One embedded SQLite database (`<data_dir>/ecliptic.db`) holds
//! organizations, users, sessions, datastores, the permission vocabulary and
//! targets, MCP keys and their mappings, and the error log. Every read and
//! write on organization-owned rows carries an `organization_id` predicate;
//! a catalog query without one is a bug.

pub mod models;

mod datastores;
mod keys;
mod logs;
mod permissions;
mod schema;
mod sessions;

use std::path::Path;

use ecliptic_fault::Result;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use tracing::info;

/// Catalog file name inside the data directory.
pub const CATALOG_FILE: &str = "ecliptic.db";

/// Handle to the catalog database. Cheap to clone.
#[derive(Clone)]
pub struct Catalog {
    pool: SqlitePool,
}

impl Catalog {
    /// Open (or create) the catalog under `data_dir`, apply the pragma set,
    /// and ensure the schema and the seeded vocabulary exist.
    pub async fn open(data_dir: &Path) -> Result<Self> {
        tokio::fs::create_dir_all(data_dir).await?;
        let path = data_dir.join(CATALOG_FILE);
        let url = format!("sqlite:{}?mode=rwc", path.display());
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&url)
            .await?;

        let catalog = Self { pool };
        catalog.apply_pragmas().await?;
        catalog.ensure_schema().await?;
        info!(path = %path.display(), "catalog opened");
        Ok(catalog)
    }

    /// In-memory catalog for tests.
    pub async fn open_in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        let catalog = Self { pool };
        catalog.apply_pragmas().await?;
        catalog.ensure_schema().await?;
        Ok(catalog)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close the underlying pool.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

/// RFC 3339 timestamp for catalog rows.
pub(crate) fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Fresh opaque identifier.
pub(crate) fn new_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// Whether an engine error is a UNIQUE constraint violation.
pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .is_some_and(|db| db.kind() == sqlx::error::ErrorKind::UniqueViolation)
}
