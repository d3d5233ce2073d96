//! Process-wide state.

use std::path::PathBuf;

use ecliptic_catalog::Catalog;
use ecliptic_datastore::DatastorePool;
use ecliptic_fault::Result;
use tracing::info;

/// Service configuration.
#[derive(Debug, Clone)]
pub struct EclipticConfig {
    /// Directory holding `ecliptic.db` and the `datastores/` tree.
    pub data_dir: PathBuf,
}

impl EclipticConfig {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }
}

/// Shared handles for one process: the catalog and the datastore pool.
#[derive(Clone)]
pub struct AppState {
    pub catalog: Catalog,
    pub datastores: DatastorePool,
    pub config: EclipticConfig,
}

impl AppState {
    /// Open the catalog and initialize the pool. Call once at startup.
    pub async fn init(config: EclipticConfig) -> Result<Self> {
        let catalog = Catalog::open(&config.data_dir).await?;
        let datastores = DatastorePool::new(&config.data_dir);
        info!(data_dir = %config.data_dir.display(), "ecliptic state initialized");
        Ok(Self {
            catalog,
            datastores,
            config,
        })
    }

    /// Release every pooled connection. Call once at shutdown.
    pub async fn shutdown(&self) {
        self.datastores.close_all().await;
        self.catalog.close().await;
    }
}
