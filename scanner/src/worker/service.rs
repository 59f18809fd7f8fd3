use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::core::client::action::ActionRegistry;
use crate::core::client::store::RecordStore;
use crate::core::clock::Clock;
use crate::error::{ScanError, ScanResult};
use crate::types::job::ScanJob;
use crate::types::scan::ScanConfig;
use crate::types::statistics::StatisticsSnapshot;
use crate::worker::runner::ScanRunner;

/// Job control surface: starts task scans and routes control requests to them by job id
pub struct ScanService {
    store: Arc<dyn RecordStore>,
    actions: ActionRegistry,
    clock: Arc<dyn Clock>,
    jobs: RwLock<HashMap<String, Arc<ScanJob>>>,
    shutdown: CancellationToken,
}

impl ScanService {
    pub fn new(store: Arc<dyn RecordStore>, actions: ActionRegistry, clock: Arc<dyn Clock>) -> Self {
        Self { store, actions, clock, jobs: RwLock::new(HashMap::new()), shutdown: CancellationToken::new() }
    }

    /// start_task - Starts a new task scan
    /// The job is registered before it runs, so it can be cancelled or inspected while a
    /// synchronous run is still in progress.
    /// # Arguments
    /// * `config` - The run parameters
    /// # Returns
    /// * `String` - The id of the new job
    /// # Errors
    /// * `ScanError::Configuration` - If the run cannot be set up; no job is registered
    /// * `ScanError::Query` - If a synchronous run failed to fetch; the failed job stays registered
    pub async fn start_task(&self, config: ScanConfig) -> ScanResult<String> {
        let runner = ScanRunner::new(config, self.store.clone(), &self.actions, self.clock.clone())?
            .with_interrupt(self.shutdown.child_token());
        let job = runner.job();
        self.jobs.write().await.insert(job.id().to_string(), job.clone());
        debug!(job_id = %job.id(), "Registered task scan job");
        runner.start_task().await
    }

    pub async fn job(&self, job_id: &str) -> ScanResult<Arc<ScanJob>> {
        self.jobs.read().await.get(job_id).cloned().ok_or_else(|| ScanError::JobNotFound { id: job_id.to_string() })
    }

    pub async fn job_ids(&self) -> Vec<String> {
        self.jobs.read().await.keys().cloned().collect()
    }

    /// Stops the job from claiming further records. Records in flight finish normally.
    pub async fn cancel(&self, job_id: &str) -> ScanResult<()> {
        let job = self.job(job_id).await?;
        job.cancel();
        info!(job_id = %job_id, "Task scan cancelled");
        Ok(())
    }

    pub async fn is_canceled(&self, job_id: &str) -> ScanResult<bool> {
        Ok(self.job(job_id).await?.is_canceled())
    }

    pub async fn get_statistics(&self, job_id: &str) -> ScanResult<StatisticsSnapshot> {
        Ok(self.job(job_id).await?.snapshot(self.clock.now()))
    }

    /// Keeps the job from marking itself completed when it ends.
    pub async fn deactivate(&self, job_id: &str) -> ScanResult<()> {
        let job = self.job(job_id).await?;
        job.deactivate();
        info!(job_id = %job_id, "Task scan deactivated");
        Ok(())
    }

    /// Interrupts every running job. Jobs started afterwards are interrupted as soon as they dispatch.
    pub fn shutdown(&self) {
        info!("Interrupting all task scans");
        self.shutdown.cancel();
    }

    /// Drops finished jobs from the registry and returns how many were removed.
    pub async fn discard_finished(&self) -> usize {
        let mut jobs = self.jobs.write().await;
        let before = jobs.len();
        jobs.retain(|_, job| !job.is_finished());
        before - jobs.len()
    }
}
