use assert_matches::assert_matches;
use rstest::*;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::core::client::store::InMemoryRecordStore;
use crate::core::clock::ManualClock;
use crate::error::ScanError;
use crate::tests::common::*;
use crate::types::job::JobState;
use crate::types::scan::{LaunchMode, ScanConfig};
use crate::worker::service::ScanService;

async fn service(
    count: usize,
    action: Arc<ScriptedAction>,
    clock: Arc<ManualClock>,
) -> (ScanService, Arc<InMemoryRecordStore>) {
    let store = seeded_store(count).await;
    (ScanService::new(store.clone(), registry(action), clock), store)
}

#[rstest]
#[tokio::test]
async fn test_statistics_of_finished_run(scan_config: ScanConfig, clock: Arc<ManualClock>) {
    let action = Arc::new(ScriptedAction::succeeding().error_on("2"));
    let (service, _) = service(5, action, clock).await;

    let job_id = service.start_task(scan_config).await.unwrap();

    let statistics = service.get_statistics(&job_id).await.unwrap();
    assert_eq!((statistics.succeeded, statistics.failed), (2, 1));
    assert_eq!(statistics.progress.state, JobState::Completed);
    assert_eq!(statistics.progress.total, 5);
    assert_eq!(statistics.progress.processed, 3);
    assert!(!service.is_canceled(&job_id).await.unwrap());
}

#[rstest]
#[tokio::test]
async fn test_every_start_creates_a_new_job(scan_config: ScanConfig, clock: Arc<ManualClock>) {
    let (service, _) = service(1, Arc::new(ScriptedAction::succeeding()), clock).await;

    let first = service.start_task(scan_config.clone()).await.unwrap();
    let second = service.start_task(scan_config).await.unwrap();

    assert_ne!(first, second);
    assert_eq!(service.job_ids().await.len(), 2);
    // The second run finds the record already completed
    assert_eq!(service.get_statistics(&second).await.unwrap().succeeded, 0);
}

#[rstest]
#[case::cancel("cancel")]
#[case::is_canceled("is_canceled")]
#[case::statistics("statistics")]
#[case::deactivate("deactivate")]
#[tokio::test]
async fn test_unknown_job_id(#[case] operation: &str, clock: Arc<ManualClock>) {
    let (service, _) = service(0, Arc::new(ScriptedAction::succeeding()), clock).await;
    let id = "00000000-0000-0000-0000-000000000000";

    let error = match operation {
        "cancel" => service.cancel(id).await.err(),
        "is_canceled" => service.is_canceled(id).await.err(),
        "statistics" => service.get_statistics(id).await.err(),
        _ => service.deactivate(id).await.err(),
    };

    assert_matches!(error, Some(ScanError::JobNotFound { id: missing }) if missing == id);
}

#[rstest]
#[tokio::test]
async fn test_configuration_failure_registers_nothing(scan_config: ScanConfig, clock: Arc<ManualClock>) {
    let (service, _) = service(1, Arc::new(ScriptedAction::succeeding()), clock).await;

    let result = service.start_task(scan_config.with_workers(0)).await;

    assert_matches!(result, Err(ScanError::Configuration(_)));
    assert!(service.job_ids().await.is_empty());
}

#[rstest]
#[tokio::test]
async fn test_cancel_stops_further_claims(scan_config: ScanConfig, clock: Arc<ManualClock>) {
    let gate = CancellationToken::new();
    let action = Arc::new(ScriptedAction::succeeding().gated(gate.clone()));
    let (service, store) = service(3, action.clone(), clock).await;

    let job_id = service.start_task(scan_config.with_launch_mode(LaunchMode::Background)).await.unwrap();
    action.entered().await;
    service.cancel(&job_id).await.unwrap();
    gate.cancel();
    service.job(&job_id).await.unwrap().wait_finished().await;

    assert!(service.is_canceled(&job_id).await.unwrap());
    let statistics = service.get_statistics(&job_id).await.unwrap();
    assert_eq!(statistics.progress.state, JobState::Cancelled);
    assert_eq!(statistics.succeeded, 1);
    assert!(started_marker(&read(&store, "2").await).is_none());
}

#[rstest]
#[tokio::test]
async fn test_deactivate_keeps_run_from_completing(scan_config: ScanConfig, clock: Arc<ManualClock>) {
    let gate = CancellationToken::new();
    let action = Arc::new(ScriptedAction::succeeding().gated(gate.clone()));
    let (service, _) = service(1, action.clone(), clock).await;

    let job_id = service.start_task(scan_config.with_launch_mode(LaunchMode::Background)).await.unwrap();
    action.entered().await;
    service.deactivate(&job_id).await.unwrap();
    gate.cancel();
    let job = service.job(&job_id).await.unwrap();
    job.wait_finished().await;

    assert!(!job.is_completed());
    assert_eq!(service.get_statistics(&job_id).await.unwrap().progress.state, JobState::Inactive);
}

#[rstest]
#[tokio::test]
async fn test_shutdown_interrupts_running_jobs(scan_config: ScanConfig, clock: Arc<ManualClock>) {
    let gate = CancellationToken::new();
    let action = Arc::new(ScriptedAction::succeeding().gated(gate.clone()));
    let (service, _) = service(2, action.clone(), clock).await;

    let job_id = service.start_task(scan_config.with_launch_mode(LaunchMode::Background)).await.unwrap();
    action.entered().await;
    service.shutdown();
    let job = service.job(&job_id).await.unwrap();
    job.cancelled().await;
    gate.cancel();
    job.wait_finished().await;

    assert_eq!(job.state(), JobState::Interrupted);
    assert_eq!(job.statistics().succeeded(), 1);
}

#[rstest]
#[tokio::test]
async fn test_discard_finished_keeps_running_jobs(scan_config: ScanConfig, clock: Arc<ManualClock>) {
    let gate = CancellationToken::new();
    let action = Arc::new(ScriptedAction::succeeding().gated(gate.clone()));
    let (service, _) = service(1, action.clone(), clock).await;

    let finished =
        service.start_task(scan_config.clone().with_filter(serde_json::json!({"status": "none"}))).await.unwrap();
    let running = service.start_task(scan_config.with_launch_mode(LaunchMode::Background)).await.unwrap();
    action.entered().await;

    assert_eq!(service.discard_finished().await, 1);
    assert_matches!(service.job(&finished).await.err(), Some(ScanError::JobNotFound { .. }));
    assert!(service.job(&running).await.is_ok());

    gate.cancel();
    service.job(&running).await.unwrap().wait_finished().await;
    assert_eq!(service.discard_finished().await, 1);
    assert!(service.job_ids().await.is_empty());
}
