use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn, Instrument};

use crate::core::client::action::{Action, ActionRegistry};
use crate::core::client::store::RecordStore;
use crate::core::clock::Clock;
use crate::error::ScanResult;
use crate::types::job::ScanJob;
use crate::types::scan::{LaunchMode, ScanConfig};
use crate::worker::claim::{panic_message, ClaimExecutor};
use crate::worker::fetcher::Fetcher;
use crate::worker::partitioner::partition;

/// Drives one task scan: fetch, partition, dispatch to the worker pool, finalize.
#[derive(Clone)]
pub struct ScanRunner {
    config: Arc<ScanConfig>,
    store: Arc<dyn RecordStore>,
    action: Arc<dyn Action>,
    clock: Arc<dyn Clock>,
    job: Arc<ScanJob>,
    interrupt: CancellationToken,
}

impl ScanRunner {
    /// new - Creates a runner and the job it will drive
    /// # Arguments
    /// * `config` - The run parameters
    /// * `store` - The record store to scan
    /// * `actions` - Registry the configured action is resolved from
    /// * `clock` - Source of marker and statistics timestamps
    /// # Errors
    /// * `ScanError::Configuration` - If the parameters are invalid or the action is missing or unknown
    pub fn new(
        config: ScanConfig,
        store: Arc<dyn RecordStore>,
        actions: &ActionRegistry,
        clock: Arc<dyn Clock>,
    ) -> ScanResult<Self> {
        config.validate()?;
        let action = actions.resolve(config.action.as_ref())?;
        let job = Arc::new(ScanJob::new(&config, action.name()));
        Ok(Self { config: Arc::new(config), store, action, clock, job, interrupt: CancellationToken::new() })
    }

    /// Token that interrupts the wait on the worker pool when fired
    pub fn with_interrupt(mut self, interrupt: CancellationToken) -> Self {
        self.interrupt = interrupt;
        self
    }

    pub fn job(&self) -> Arc<ScanJob> {
        self.job.clone()
    }

    /// start_task - Runs the scan according to the configured launch mode
    /// Synchronous runs return once the job is finalized. Background runs return the job id
    /// right away; their failures are only logged, and a panicking run is marked failed.
    /// # Returns
    /// * `String` - The id of the job
    /// # Errors
    /// * `ScanError::Query` - If a synchronous run could not fetch its records
    pub async fn start_task(&self) -> ScanResult<String> {
        let job_id = self.job.id().to_string();
        match self.config.launch_mode {
            LaunchMode::Synchronous => self.perform_task().await?,
            LaunchMode::Background => {
                let runner = self.clone();
                tokio::spawn(async move {
                    match AssertUnwindSafe(runner.perform_task()).catch_unwind().await {
                        Ok(Ok(())) => {}
                        Ok(Err(e)) => warn!(job_id = %runner.job.id(), error = %e, "Background task scan failed"),
                        Err(panic) => {
                            if !runner.job.is_finished() {
                                runner.job.fail(runner.clock.now());
                            }
                            warn!(
                                job_id = %runner.job.id(),
                                panic = %panic_message(panic.as_ref()),
                                "Background task scan panicked"
                            );
                        }
                    }
                }
                .in_current_span());
            }
        }
        Ok(job_id)
    }

    #[instrument(skip_all, fields(job_id = %self.job.id(), collection = %self.job.collection()))]
    pub async fn perform_task(&self) -> ScanResult<()> {
        let statistics = self.job.statistics();
        self.job.start(self.clock.now());
        info!(
            invoker = %self.job.invoker_name(),
            action = %self.job.action_name(),
            workers = self.config.workers,
            "Task scan started"
        );

        statistics.start_query(self.clock.now());
        let fetcher = Fetcher::new(self.store.clone(), self.clock.clone());
        let records = match fetcher.fetch(&self.config.collection, &self.config.filter).await {
            Ok(records) => records,
            Err(e) => {
                let now = self.clock.now();
                statistics.end_query(now);
                self.job.fail(now);
                error!(error = %e, "Task scan query failed");
                return Err(e);
            }
        };
        statistics.end_query(self.clock.now());

        let partitions = partition(records, self.config.workers, self.config.max_records);
        let total: usize = partitions.iter().map(Vec::len).sum();
        statistics.set_to_process(total as u64);
        info!(records = total, partitions = partitions.len(), "Dispatching records to workers");

        let executor = ClaimExecutor::new(
            self.config.clone(),
            self.store.clone(),
            self.action.clone(),
            self.job.clone(),
            self.clock.clone(),
        );
        let mut workers = JoinSet::new();
        for (index, records) in partitions.into_iter().enumerate() {
            let executor = executor.clone();
            workers.spawn(async move { executor.process_partition(index, records).await }.in_current_span());
        }

        let mut interrupted = false;
        loop {
            tokio::select! {
                biased;
                _ = self.interrupt.cancelled(), if !interrupted => {
                    interrupted = true;
                    warn!("Task scan interrupted, letting in-flight records finish");
                    self.job.interrupted();
                }
                joined = workers.join_next() => match joined {
                    None => break,
                    Some(Ok(Ok(()))) => {}
                    Some(Ok(Err(e))) => warn!(error = %e, "Partition aborted"),
                    Some(Err(e)) => warn!(error = %e, "Partition worker panicked"),
                }
            }
        }

        self.job.finish(self.clock.now());
        info!(
            succeeded = statistics.succeeded(),
            failed = statistics.failed(),
            duration_ms = statistics.job_duration_ms(self.clock.now()),
            state = %self.job.state(),
            "Task scan finished"
        );
        Ok(())
    }
}
