//! Job record persistence.
//!
//! The lifecycle service talks to storage only through [`JobStore`]. Every
//! implementation must guarantee that at most one active record exists:
//! `insert` of an active record fails with [`StoreError::ActiveExists`] when
//! another active record is present, and the check and the write happen as one
//! atomic step.

mod memory;
mod sqlite;

pub use memory::MemoryJobStore;
pub use sqlite::SqliteJobStore;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::lifecycle::{JobRecord, RecordFilter, RecordPatch};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("An active record already exists for job {job_id}")]
    ActiveExists { job_id: String },

    #[error("Record not found: {0}")]
    NotFound(Uuid),

    #[error("Record already archived: {0}")]
    Archived(Uuid),

    #[error("Corrupt record: {0}")]
    Corrupt(String),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[async_trait]
pub trait JobStore: Send + Sync {
    /// Persist a new record and return it as stored.
    async fn insert(&self, record: JobRecord) -> StoreResult<JobRecord>;

    /// First record matching `filter`, in store order.
    async fn find_one(&self, filter: &RecordFilter) -> StoreResult<Option<JobRecord>>;

    /// All records matching `filter`, in store order.
    async fn find_many(&self, filter: &RecordFilter) -> StoreResult<Vec<JobRecord>>;

    /// Archive the active record `id`. Archived records are rejected.
    async fn update(&self, id: Uuid, patch: RecordPatch) -> StoreResult<JobRecord>;
}
