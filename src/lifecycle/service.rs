use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::catalog::{CatalogSource, JobTemplate};
use crate::error::{JobError, Result};
use crate::lifecycle::clock::{Clock, SystemClock};
use crate::lifecycle::duration::{format_between, parse_hhmmss};
use crate::lifecycle::record::{JobRecord, RecordFilter, RecordPatch};
use crate::store::JobStore;

/// Catalog read that degrades instead of failing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateListing {
    pub templates: Vec<JobTemplate>,
    /// True when the catalog could not be read and `templates` is empty.
    pub unavailable: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartJobRequest {
    pub job_id: String,
    pub part_name: String,
    pub machine_name: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StopJobRequest {
    pub job_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStats {
    pub total_jobs: usize,
    pub open_workloads: usize,
    pub archived_jobs: usize,
    pub efficiency: u32,
    pub total_duration_seconds: i64,
    pub average_duration_seconds: i64,
    pub active_job_id: Option<String>,
    pub catalog_unavailable: bool,
}

/// Owns the active-job lifecycle: at most one record is active at a time,
/// and each record is archived at most once.
pub struct JobLifecycleService {
    store: Arc<dyn JobStore>,
    catalog: Arc<dyn CatalogSource>,
    clock: Arc<dyn Clock>,
}

impl JobLifecycleService {
    pub fn new(store: Arc<dyn JobStore>, catalog: Arc<dyn CatalogSource>) -> Self {
        Self::with_clock(store, catalog, Arc::new(SystemClock))
    }

    pub fn with_clock(
        store: Arc<dyn JobStore>,
        catalog: Arc<dyn CatalogSource>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            catalog,
            clock,
        }
    }

    pub async fn list_job_templates(&self) -> TemplateListing {
        match self.catalog.templates().await {
            Ok(templates) => TemplateListing {
                templates,
                unavailable: false,
            },
            Err(e) => {
                tracing::warn!(error = %e, "Job catalog unavailable, serving empty list");
                TemplateListing {
                    templates: Vec::new(),
                    unavailable: true,
                }
            }
        }
    }

    pub async fn start_job(&self, req: StartJobRequest) -> Result<JobRecord> {
        let job_id = required("jobId", &req.job_id)?;
        let part_name = required("partName", &req.part_name)?;
        let machine_name = required("machineName", &req.machine_name)?;

        let record = JobRecord::new(job_id, part_name, machine_name, self.clock.now());
        let record = self.store.insert(record).await.map_err(|e| {
            let err = JobError::from(e);
            if let JobError::Conflict { ref active_job_id } = err {
                tracing::info!(
                    job_id = %req.job_id,
                    active_job_id = %active_job_id,
                    "Start rejected, another job is active"
                );
            }
            err
        })?;

        tracing::info!(
            job_id = %record.job_id,
            record_id = %record.id,
            machine = %record.machine_name,
            "Job started"
        );
        Ok(record)
    }

    pub async fn stop_job(&self, req: StopJobRequest) -> Result<JobRecord> {
        let job_id = required("jobId", &req.job_id)?;

        let active = self
            .store
            .find_one(&RecordFilter::active().with_job_id(job_id.as_str()))
            .await?
            .ok_or_else(|| JobError::NotFound(job_id.clone()))?;

        let end_time = self.clock.now();
        let patch = RecordPatch {
            end_time,
            duration: format_between(active.start_time, end_time),
        };

        let record = self.store.update(active.id, patch).await.map_err(|e| {
            match JobError::from(e) {
                // Lost a race with another stop.
                JobError::NotFound(_) => JobError::NotFound(job_id.clone()),
                other => other,
            }
        })?;

        tracing::info!(
            job_id = %record.job_id,
            record_id = %record.id,
            duration = record.duration.as_deref().unwrap_or_default(),
            "Job stopped"
        );
        Ok(record)
    }

    pub async fn get_active_job(&self) -> Result<Option<JobRecord>> {
        let mut active = self.store.find_many(&RecordFilter::active()).await?;
        if active.len() > 1 {
            tracing::error!(count = active.len(), "Multiple active job records found");
            return Err(JobError::InvariantViolation(format!(
                "{} active job records",
                active.len()
            )));
        }
        Ok(active.pop())
    }

    pub async fn get_completed_jobs(&self) -> Result<Vec<JobRecord>> {
        Ok(self.store.find_many(&RecordFilter::archived()).await?)
    }

    pub async fn job_stats(&self) -> Result<JobStats> {
        let listing = self.list_job_templates().await;
        let completed = self.get_completed_jobs().await?;
        let active = self.get_active_job().await?;
        Ok(compute_stats(&listing, &completed, active.as_ref()))
    }
}

fn required(field: &str, value: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(JobError::Invalid(format!("{} must not be empty", field)));
    }
    Ok(trimmed.to_string())
}

fn compute_stats(
    listing: &TemplateListing,
    completed: &[JobRecord],
    active: Option<&JobRecord>,
) -> JobStats {
    let total_jobs = listing.templates.len();
    let open_workloads = listing
        .templates
        .iter()
        .filter(|t| !completed.iter().any(|c| c.job_id == t.job_id))
        .count();
    let archived_jobs = completed.len();

    let efficiency = if total_jobs == 0 {
        0
    } else {
        ((archived_jobs as f64 / total_jobs as f64) * 100.0).round() as u32
    };

    // Unparseable durations are left out of both the total and the average.
    let durations: Vec<i64> = completed
        .iter()
        .filter_map(|r| r.duration.as_deref().and_then(parse_hhmmss))
        .collect();
    let total_duration_seconds: i64 = durations.iter().sum();
    let average_duration_seconds = if durations.is_empty() {
        0
    } else {
        total_duration_seconds / durations.len() as i64
    };

    JobStats {
        total_jobs,
        open_workloads,
        archived_jobs,
        efficiency,
        total_duration_seconds,
        average_duration_seconds,
        active_job_id: active.map(|r| r.job_id.clone()),
        catalog_unavailable: listing.unavailable,
    }
}
