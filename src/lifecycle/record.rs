use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Active,
    Archived,
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobState::Active => write!(f, "active"),
            JobState::Archived => write!(f, "archived"),
        }
    }
}

/// One start-to-stop run of a catalog job.
///
/// A record is created active and archived exactly once, when `end_time` and
/// `duration` are filled in. Archived records are never mutated again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRecord {
    pub id: Uuid,
    pub job_id: String,
    pub part_name: String,
    pub machine_name: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub duration: Option<String>,
}

impl JobRecord {
    pub fn new(
        job_id: String,
        part_name: String,
        machine_name: String,
        start_time: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            job_id,
            part_name,
            machine_name,
            start_time,
            end_time: None,
            duration: None,
        }
    }

    pub fn state(&self) -> JobState {
        if self.end_time.is_some() {
            JobState::Archived
        } else {
            JobState::Active
        }
    }

    pub fn is_active(&self) -> bool {
        self.state() == JobState::Active
    }

    /// Apply a stop patch in place.
    pub fn archive(&mut self, patch: &RecordPatch) {
        self.end_time = Some(patch.end_time);
        self.duration = Some(patch.duration.clone());
    }
}

/// The single mutation a record ever receives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordPatch {
    pub end_time: DateTime<Utc>,
    pub duration: String,
}

/// Predicate for store lookups. Empty fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordFilter {
    pub job_id: Option<String>,
    pub state: Option<JobState>,
}

impl RecordFilter {
    pub fn active() -> Self {
        Self {
            job_id: None,
            state: Some(JobState::Active),
        }
    }

    pub fn archived() -> Self {
        Self {
            job_id: None,
            state: Some(JobState::Archived),
        }
    }

    pub fn with_job_id(mut self, job_id: impl Into<String>) -> Self {
        self.job_id = Some(job_id.into());
        self
    }

    pub fn matches(&self, record: &JobRecord) -> bool {
        if let Some(ref job_id) = self.job_id {
            if &record.job_id != job_id {
                return false;
            }
        }
        match self.state {
            Some(state) => record.state() == state,
            None => true,
        }
    }
}
