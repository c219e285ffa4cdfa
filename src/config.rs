use std::net::SocketAddr;
use std::path::PathBuf;

/// Where job records are persisted.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum StoreConfig {
    /// Records live in process memory and are lost on exit.
    #[default]
    Memory,
    /// Records live in a SQLite database (e.g., "sqlite://jobtrack.db").
    Sqlite { url: String },
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub listen_addr: SocketAddr,
    pub store: StoreConfig,
    /// JSON file holding the job catalog. When unset the catalog is empty.
    pub catalog_path: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            // SAFETY: This is a hardcoded valid address that will always parse
            listen_addr: "127.0.0.1:5001"
                .parse()
                .expect("default listen address is valid"),
            store: StoreConfig::default(),
            catalog_path: None,
        }
    }
}

impl ServerConfig {
    pub fn new(listen_addr: SocketAddr) -> Self {
        Self {
            listen_addr,
            ..Default::default()
        }
    }

    pub fn with_store(mut self, store: StoreConfig) -> Self {
        self.store = store;
        self
    }

    pub fn with_catalog(mut self, path: impl Into<PathBuf>) -> Self {
        self.catalog_path = Some(path.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_config_default() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.listen_addr.to_string(), "127.0.0.1:5001");
        assert_eq!(cfg.store, StoreConfig::Memory);
        assert!(cfg.catalog_path.is_none());
    }

    #[test]
    fn server_config_new() {
        let addr: SocketAddr = "0.0.0.0:8080".parse().unwrap();
        let cfg = ServerConfig::new(addr);
        assert_eq!(cfg.listen_addr, addr);
        assert_eq!(cfg.store, StoreConfig::Memory);
    }

    #[test]
    fn server_config_builders() {
        let cfg = ServerConfig::default()
            .with_store(StoreConfig::Sqlite {
                url: "sqlite://jobs.db".to_string(),
            })
            .with_catalog("/etc/jobtrack/jobcards.json");
        assert_eq!(
            cfg.store,
            StoreConfig::Sqlite {
                url: "sqlite://jobs.db".to_string()
            }
        );
        assert_eq!(
            cfg.catalog_path,
            Some(PathBuf::from("/etc/jobtrack/jobcards.json"))
        );
    }
}
