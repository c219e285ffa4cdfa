use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::api::{run_api, ApiState};
use crate::catalog::{CatalogSource, FileCatalog, StaticCatalog};
use crate::config::{ServerConfig, StoreConfig};
use crate::lifecycle::JobLifecycleService;
use crate::store::{JobStore, MemoryJobStore, SqliteJobStore};

/// Wires the store, catalog and lifecycle service behind the HTTP API.
pub struct Server {
    pub config: ServerConfig,
    pub service: Arc<JobLifecycleService>,
}

impl Server {
    /// Build all components described by `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured store cannot be opened.
    pub async fn new(config: ServerConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let store = open_store(&config.store).await?;
        let catalog = open_catalog(&config);
        let service = Arc::new(JobLifecycleService::new(store, catalog));
        Ok(Self { config, service })
    }

    /// Serve requests until `shutdown` is cancelled.
    pub async fn run(self, shutdown: CancellationToken) -> Result<(), Box<dyn std::error::Error>> {
        let state = ApiState::new(self.service.clone());
        run_api(self.config.listen_addr, state, shutdown).await?;
        Ok(())
    }
}

async fn open_store(config: &StoreConfig) -> Result<Arc<dyn JobStore>, Box<dyn std::error::Error>> {
    match config {
        StoreConfig::Memory => {
            tracing::warn!("Using in-memory job store, records are lost on exit");
            Ok(Arc::new(MemoryJobStore::new()))
        }
        StoreConfig::Sqlite { url } => {
            let store = SqliteJobStore::connect(url).await?;
            tracing::info!("Opened SQLite job store");
            Ok(Arc::new(store))
        }
    }
}

fn open_catalog(config: &ServerConfig) -> Arc<dyn CatalogSource> {
    match config.catalog_path {
        Some(ref path) => {
            tracing::info!(path = %path.display(), "Serving job catalog from file");
            Arc::new(FileCatalog::new(path.clone()))
        }
        None => {
            tracing::warn!("No job catalog configured, serving an empty catalog");
            Arc::new(StaticCatalog::default())
        }
    }
}
