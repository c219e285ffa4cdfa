use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{JobStore, StoreError, StoreResult};
use crate::lifecycle::{JobRecord, RecordFilter, RecordPatch};

#[derive(Debug, Default)]
struct Records {
    by_id: HashMap<Uuid, JobRecord>,
    /// Insertion order, used as the store-native order for queries.
    order: Vec<Uuid>,
}

impl Records {
    fn active(&self) -> Option<&JobRecord> {
        self.order
            .iter()
            .filter_map(|id| self.by_id.get(id))
            .find(|r| r.is_active())
    }

    fn matching<'a>(
        &'a self,
        filter: &'a RecordFilter,
    ) -> impl Iterator<Item = &'a JobRecord> + 'a {
        self.order
            .iter()
            .filter_map(move |id| self.by_id.get(id))
            .filter(move |r| filter.matches(r))
    }
}

/// In-process store. All records live until the process exits.
#[derive(Debug, Default)]
pub struct MemoryJobStore {
    records: RwLock<Records>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored records
    pub async fn len(&self) -> usize {
        self.records.read().await.order.len()
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn insert(&self, record: JobRecord) -> StoreResult<JobRecord> {
        let mut records = self.records.write().await;

        if record.is_active() {
            if let Some(active) = records.active() {
                return Err(StoreError::ActiveExists {
                    job_id: active.job_id.clone(),
                });
            }
        }
        if records.by_id.contains_key(&record.id) {
            return Err(StoreError::Corrupt(format!(
                "duplicate record id {}",
                record.id
            )));
        }

        records.order.push(record.id);
        records.by_id.insert(record.id, record.clone());
        Ok(record)
    }

    async fn find_one(&self, filter: &RecordFilter) -> StoreResult<Option<JobRecord>> {
        let records = self.records.read().await;
        let found = records.matching(filter).next().cloned();
        Ok(found)
    }

    async fn find_many(&self, filter: &RecordFilter) -> StoreResult<Vec<JobRecord>> {
        let records = self.records.read().await;
        let found = records.matching(filter).cloned().collect();
        Ok(found)
    }

    async fn update(&self, id: Uuid, patch: RecordPatch) -> StoreResult<JobRecord> {
        let mut records = self.records.write().await;
        let record = records.by_id.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        if !record.is_active() {
            return Err(StoreError::Archived(id));
        }
        record.archive(&patch);
        Ok(record.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::sync::Arc;

    fn record(job_id: &str) -> JobRecord {
        JobRecord::new(
            job_id.to_string(),
            "Bracket".to_string(),
            "CNC-3".to_string(),
            Utc::now(),
        )
    }

    fn patch() -> RecordPatch {
        RecordPatch {
            end_time: Utc::now(),
            duration: "00:00:01".to_string(),
        }
    }

    #[tokio::test]
    async fn insert_rejects_second_active_record() {
        let store = MemoryJobStore::new();
        store.insert(record("J1")).await.unwrap();

        let err = store.insert(record("J2")).await.unwrap_err();
        assert!(matches!(err, StoreError::ActiveExists { ref job_id } if job_id == "J1"));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn insert_allows_new_active_after_archive() {
        let store = MemoryJobStore::new();
        let first = store.insert(record("J1")).await.unwrap();
        store.update(first.id, patch()).await.unwrap();

        store.insert(record("J1")).await.unwrap();
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn update_rejects_archived_record() {
        let store = MemoryJobStore::new();
        let rec = store.insert(record("J1")).await.unwrap();
        store.update(rec.id, patch()).await.unwrap();

        let err = store.update(rec.id, patch()).await.unwrap_err();
        assert!(matches!(err, StoreError::Archived(id) if id == rec.id));
    }

    #[tokio::test]
    async fn update_unknown_id_is_not_found() {
        let store = MemoryJobStore::new();
        let id = Uuid::new_v4();
        let err = store.update(id, patch()).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(missing) if missing == id));
    }

    #[tokio::test]
    async fn find_many_preserves_insertion_order() {
        let store = MemoryJobStore::new();
        for id in ["J1", "J2", "J3"] {
            let rec = store.insert(record(id)).await.unwrap();
            store.update(rec.id, patch()).await.unwrap();
        }

        let ids: Vec<String> = store
            .find_many(&RecordFilter::archived())
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.job_id)
            .collect();
        assert_eq!(ids, vec!["J1", "J2", "J3"]);
    }

    #[tokio::test]
    async fn find_one_filters_by_job_id_and_state() {
        let store = MemoryJobStore::new();
        let done = store.insert(record("J1")).await.unwrap();
        store.update(done.id, patch()).await.unwrap();
        let live = store.insert(record("J1")).await.unwrap();

        let found = store
            .find_one(&RecordFilter::active().with_job_id("J1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, live.id);

        let none = store
            .find_one(&RecordFilter::active().with_job_id("J2"))
            .await
            .unwrap();
        assert!(none.is_none());
    }

    #[tokio::test]
    async fn concurrent_inserts_admit_one_active_record() {
        let store = Arc::new(MemoryJobStore::new());
        let mut handles = Vec::new();
        for i in 0..16 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.insert(record(&format!("J{}", i))).await
            }));
        }

        let mut ok = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                ok += 1;
            }
        }
        assert_eq!(ok, 1);
        assert_eq!(
            store.find_many(&RecordFilter::active()).await.unwrap().len(),
            1
        );
    }
}
