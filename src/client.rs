//! HTTP client for the jobtrack API.
//!
//! The client keeps no state of its own. Whether a job is active is always
//! read back from the server.

use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::catalog::JobTemplate;
use crate::lifecycle::{JobRecord, JobStats};

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Server returned {status}: {message}")]
    Api { status: StatusCode, message: String },
}

impl ClientError {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ClientError::Api { status, .. } => Some(*status),
            ClientError::Transport(e) => e.status(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct JobResponse {
    pub message: String,
    pub job: JobRecord,
}

/// Catalog listing as seen by a client.
#[derive(Debug, Clone)]
pub struct JobCards {
    pub templates: Vec<JobTemplate>,
    pub catalog_unavailable: bool,
}

#[derive(Deserialize)]
struct MessageBody {
    message: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StartBody<'a> {
    job_id: &'a str,
    part_name: &'a str,
    machine_name: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StopBody<'a> {
    job_id: &'a str,
}

#[derive(Debug, Clone)]
pub struct JobTrackClient {
    base_url: String,
    http: reqwest::Client,
}

impl JobTrackClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn job_cards(&self) -> Result<JobCards, ClientError> {
        let response = self.http.get(self.url("/api/jobcards")).send().await?;
        let catalog_unavailable = response
            .headers()
            .get(crate::api::CATALOG_UNAVAILABLE_HEADER)
            .and_then(|v| v.to_str().ok())
            == Some("true");
        let templates = decode(response).await?;
        Ok(JobCards {
            templates,
            catalog_unavailable,
        })
    }

    pub async fn start_job(
        &self,
        job_id: &str,
        part_name: &str,
        machine_name: &str,
    ) -> Result<JobResponse, ClientError> {
        let response = self
            .http
            .post(self.url("/api/jobs/start"))
            .json(&StartBody {
                job_id,
                part_name,
                machine_name,
            })
            .send()
            .await?;
        decode(response).await
    }

    pub async fn stop_job(&self, job_id: &str) -> Result<JobResponse, ClientError> {
        let response = self
            .http
            .post(self.url("/api/jobs/stop"))
            .json(&StopBody { job_id })
            .send()
            .await?;
        decode(response).await
    }

    pub async fn active_job(&self) -> Result<Option<JobRecord>, ClientError> {
        let response = self.http.get(self.url("/api/jobs/active")).send().await?;
        decode(response).await
    }

    pub async fn completed_jobs(&self) -> Result<Vec<JobRecord>, ClientError> {
        let response = self.http.get(self.url("/api/jobs/completed")).send().await?;
        decode(response).await
    }

    pub async fn stats(&self) -> Result<JobStats, ClientError> {
        let response = self.http.get(self.url("/api/jobs/stats")).send().await?;
        decode(response).await
    }
}

async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response.json::<T>().await?);
    }

    let text = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<MessageBody>(&text)
        .map(|b| b.message)
        .unwrap_or(text);
    Err(ClientError::Api { status, message })
}
