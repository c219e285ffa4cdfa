//! Static job catalog.
//!
//! The catalog is reference data supplied from outside the service. It is
//! read, never written.

use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobTemplate {
    pub job_id: String,
    pub part_name: String,
    pub machine_name: String,
}

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Failed to read catalog {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse catalog {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Duplicate jobId in catalog: {0}")]
    DuplicateJobId(String),
}

#[async_trait]
pub trait CatalogSource: Send + Sync {
    async fn templates(&self) -> Result<Vec<JobTemplate>, CatalogError>;
}

/// Catalog held in memory.
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    templates: Vec<JobTemplate>,
}

impl StaticCatalog {
    pub fn new(templates: Vec<JobTemplate>) -> Result<Self, CatalogError> {
        check_unique(&templates)?;
        Ok(Self { templates })
    }
}

#[async_trait]
impl CatalogSource for StaticCatalog {
    async fn templates(&self) -> Result<Vec<JobTemplate>, CatalogError> {
        Ok(self.templates.clone())
    }
}

/// Catalog backed by a JSON array on disk, re-read on every call.
#[derive(Debug, Clone)]
pub struct FileCatalog {
    path: PathBuf,
}

impl FileCatalog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl CatalogSource for FileCatalog {
    async fn templates(&self) -> Result<Vec<JobTemplate>, CatalogError> {
        let data = tokio::fs::read(&self.path)
            .await
            .map_err(|source| CatalogError::Io {
                path: self.path.clone(),
                source,
            })?;
        let templates: Vec<JobTemplate> =
            serde_json::from_slice(&data).map_err(|source| CatalogError::Parse {
                path: self.path.clone(),
                source,
            })?;
        check_unique(&templates)?;
        Ok(templates)
    }
}

fn check_unique(templates: &[JobTemplate]) -> Result<(), CatalogError> {
    let mut seen = std::collections::HashSet::new();
    for template in templates {
        if !seen.insert(template.job_id.as_str()) {
            return Err(CatalogError::DuplicateJobId(template.job_id.clone()));
        }
    }
    Ok(())
}
