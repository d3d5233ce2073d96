//! Process-wide pool of per-datastore connections.
//!
//! Keyed by external file id. The first open creates the connection with the
//! pragma set; later opens return the cached handle. `release` both closes
//! the engine handle and removes the pool entry; `close_all` runs on
//! shutdown.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use ecliptic_fault::{ErrorEntry, Result, RollbackOutcome, RollbackStack};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Directory under the data dir holding the datastore files.
pub const DATASTORES_DIR: &str = "datastores";

#[derive(Clone)]
pub struct DatastorePool {
    dir: PathBuf,
    conns: Arc<Mutex<HashMap<String, SqlitePool>>>,
}

impl DatastorePool {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            dir: data_dir.join(DATASTORES_DIR),
            conns: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Filesystem path of a datastore file.
    pub fn file_path(&self, external_id: &str) -> PathBuf {
        self.dir.join(external_id)
    }

    /// Open an existing datastore file read-write, reusing the cached
    /// connection when present.
    pub async fn open(&self, external_id: &str) -> Result<SqlitePool> {
        self.open_inner(external_id, false).await
    }

    /// Create the datastore file and register a rollback that removes it.
    pub async fn create(
        &self,
        external_id: &str,
        rollbacks: &mut RollbackStack,
    ) -> Result<SqlitePool> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let pool = self.open_inner(external_id, true).await?;

        let this = self.clone();
        let id = external_id.to_string();
        rollbacks.push(format!("delete datastore file {external_id}"), move || {
            async move {
                this.release(&id).await;
                match tokio::fs::remove_file(this.file_path(&id)).await {
                    Ok(()) => RollbackOutcome::ok(),
                    Err(err) => RollbackOutcome::failed(ErrorEntry::engine(format!(
                        "failed to remove datastore file {id}: {err}"
                    ))),
                }
            }
        });

        info!(external_id, "datastore file created");
        Ok(pool)
    }

    async fn open_inner(&self, external_id: &str, create: bool) -> Result<SqlitePool> {
        let mut conns = self.conns.lock().await;
        if let Some(pool) = conns.get(external_id) {
            return Ok(pool.clone());
        }

        let mode = if create { "rwc" } else { "rw" };
        let path = self.file_path(external_id);
        let url = format!("sqlite:{}?mode={mode}", path.display());
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&url)
            .await
            .map_err(|err| {
                ErrorEntry::engine(format!(
                    "failed to open datastore file {}: {err}",
                    path.display()
                ))
            })?;
        apply_pragmas(&pool).await?;

        conns.insert(external_id.to_string(), pool.clone());
        debug!(external_id, "datastore connection opened");
        Ok(pool)
    }

    /// Close the engine handle and drop the pool entry.
    pub async fn release(&self, external_id: &str) {
        let removed = self.conns.lock().await.remove(external_id);
        if let Some(pool) = removed {
            pool.close().await;
            debug!(external_id, "datastore connection released");
        }
    }

    /// Remove a datastore file. Terminal: no rollback restores file content.
    /// An already-missing file is not an error, so a drop whose catalog
    /// deletion failed can be retried to clear the dangling row.
    pub async fn delete_file(&self, external_id: &str) -> Result<()> {
        self.release(external_id).await;
        match tokio::fs::remove_file(self.file_path(external_id)).await {
            Ok(()) => {
                info!(external_id, "datastore file deleted");
                Ok(())
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!(external_id, "datastore file already absent");
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Close every pooled connection. Called on shutdown.
    pub async fn close_all(&self) {
        let mut conns = self.conns.lock().await;
        for (_, pool) in conns.drain() {
            pool.close().await;
        }
    }
}

async fn apply_pragmas(pool: &SqlitePool) -> Result<()> {
    for pragma in [
        "PRAGMA foreign_keys=ON",
        "PRAGMA journal_mode=WAL",
        "PRAGMA busy_timeout=5000",
        "PRAGMA synchronous=NORMAL",
        "PRAGMA cache_size=10000",
        "PRAGMA temp_store=MEMORY",
        "PRAGMA mmap_size=268435456",
    ] {
        sqlx::query(pragma).execute(pool).await?;
    }
    Ok(())
}
