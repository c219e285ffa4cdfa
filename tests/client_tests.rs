use std::sync::Arc;

use reqwest::StatusCode;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use jobtrack::api::{router, ApiState};
use jobtrack::catalog::{JobTemplate, StaticCatalog};
use jobtrack::client::{ClientError, JobTrackClient};
use jobtrack::lifecycle::JobLifecycleService;
use jobtrack::store::MemoryJobStore;

/// Serve the API on an ephemeral port and return a client pointed at it
async fn spawn_server() -> (JobTrackClient, CancellationToken) {
    let catalog = StaticCatalog::new(vec![JobTemplate {
        job_id: "J1".to_string(),
        part_name: "Bracket".to_string(),
        machine_name: "CNC-3".to_string(),
    }])
    .unwrap();
    let service = JobLifecycleService::new(Arc::new(MemoryJobStore::new()), Arc::new(catalog));
    let app = router(ApiState::new(Arc::new(service)));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let token = CancellationToken::new();
    let shutdown = token.clone();
    tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await
            .unwrap();
    });

    (JobTrackClient::new(format!("http://{}", addr)), token)
}

#[tokio::test]
async fn test_client_full_lifecycle() {
    let (client, token) = spawn_server().await;

    let cards = client.job_cards().await.unwrap();
    assert_eq!(cards.templates.len(), 1);
    assert!(!cards.catalog_unavailable);

    assert!(client.active_job().await.unwrap().is_none());

    let started = client.start_job("J1", "Bracket", "CNC-3").await.unwrap();
    assert_eq!(started.message, "Job started");
    assert!(started.job.end_time.is_none());

    let active = client.active_job().await.unwrap().unwrap();
    assert_eq!(active.id, started.job.id);

    let stopped = client.stop_job("J1").await.unwrap();
    assert_eq!(stopped.message, "Job stopped");
    assert!(stopped.job.duration.is_some());

    assert!(client.active_job().await.unwrap().is_none());
    let completed = client.completed_jobs().await.unwrap();
    assert_eq!(completed.len(), 1);
    assert_eq!(completed[0].id, started.job.id);

    let stats = client.stats().await.unwrap();
    assert_eq!(stats.archived_jobs, 1);
    assert_eq!(stats.efficiency, 100);

    token.cancel();
}

#[tokio::test]
async fn test_client_surfaces_api_errors() {
    let (client, token) = spawn_server().await;

    let err = client.stop_job("J1").await.unwrap_err();
    assert_eq!(err.status(), Some(StatusCode::NOT_FOUND));
    assert!(
        matches!(err, ClientError::Api { ref message, .. } if message == "Job not found or already stopped")
    );

    client.start_job("J1", "Bracket", "CNC-3").await.unwrap();
    let err = client.start_job("J2", "Housing", "Lathe-1").await.unwrap_err();
    assert_eq!(err.status(), Some(StatusCode::CONFLICT));

    token.cancel();
}

#[tokio::test]
async fn test_client_connection_refused_is_transport_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = JobTrackClient::new(format!("http://{}", addr));
    let err = client.active_job().await.unwrap_err();
    assert!(matches!(err, ClientError::Transport(_)));
}
