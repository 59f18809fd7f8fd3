use chrono::{DateTime, Utc};
use futures::FutureExt;
use serde_json::Value;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::core::client::action::{is_success, Action, ActionBindings, ActionError};
use crate::core::client::store::RecordStore;
use crate::core::clock::Clock;
use crate::error::{ScanError, ScanResult};
use crate::types::job::ScanJob;
use crate::types::record::{format_marker, Record};
use crate::types::scan::ScanConfig;

/// Why a record was left alone
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The record already carries a completion marker
    AlreadyCompleted,
    /// Another worker holds a live claim on the record
    ClaimedElsewhere,
    /// Write conflicts kept happening past the retry policy
    RetriesExhausted,
    /// The job was cancelled before the claim landed
    Cancelled,
}

/// What happened to a single record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    Succeeded,
    Failed,
    Skipped(SkipReason),
    /// Claimed, but the action reported itself inactive
    NotExecuted,
}

enum ClaimOutcome {
    Claimed(Record),
    Skipped(SkipReason),
}

/// Runs the claim / execute / complete protocol over one partition of records.
///
/// Claims and completions are conditional writes on the revision the executor last observed;
/// nothing else guards a record against concurrent scanners.
#[derive(Clone)]
pub struct ClaimExecutor {
    config: Arc<ScanConfig>,
    store: Arc<dyn RecordStore>,
    action: Arc<dyn Action>,
    job: Arc<ScanJob>,
    clock: Arc<dyn Clock>,
}

impl ClaimExecutor {
    pub fn new(
        config: Arc<ScanConfig>,
        store: Arc<dyn RecordStore>,
        action: Arc<dyn Action>,
        job: Arc<ScanJob>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self { config, store, action, job, clock }
    }

    /// process_partition - Processes the records of one partition in order
    /// Cancellation is checked before each record; records already in flight run to the end.
    /// # Arguments
    /// * `partition` - Index of the partition, for logging
    /// * `records` - The records dealt to this partition
    /// # Errors
    /// * `ScanError::Execution` - If the action raised; the rest of the partition is abandoned
    /// * `ScanError::Store` - If the store failed outside of a write conflict
    #[instrument(skip_all, fields(partition = partition, records = records.len()))]
    pub async fn process_partition(&self, partition: usize, records: Vec<Record>) -> ScanResult<()> {
        for record in records {
            if self.job.is_canceled() {
                info!("Job cancelled, leaving the rest of the partition unclaimed");
                break;
            }
            self.process_record(record).await?;
        }
        Ok(())
    }

    /// Claims, executes and completes one record.
    pub async fn process_record(&self, record: Record) -> ScanResult<RecordOutcome> {
        let record_id = record.id.clone();
        let claimed = match self.claim(record).await? {
            ClaimOutcome::Claimed(claimed) => claimed,
            ClaimOutcome::Skipped(reason) => {
                debug!(record_id = %record_id, reason = ?reason, "Record skipped");
                return Ok(RecordOutcome::Skipped(reason));
            }
        };

        if !self.action.is_active() {
            debug!(record_id = %record_id, action = %self.action.name(), "Action inactive, record left claimed");
            return Ok(RecordOutcome::NotExecuted);
        }

        let statistics = self.job.statistics();
        match self.execute(&claimed).await {
            Ok(result) if is_success(&result) => {
                self.mark_completed(&claimed).await?;
                statistics.task_succeeded();
                debug!(record_id = %record_id, "Record completed");
                Ok(RecordOutcome::Succeeded)
            }
            Ok(result) => {
                statistics.task_failed();
                debug!(record_id = %record_id, result = %result, "Action reported failure");
                Ok(RecordOutcome::Failed)
            }
            Err(source) => {
                statistics.task_failed();
                Err(ScanError::Execution {
                    action: self.action.name().to_string(),
                    invoker: self.config.invoker_name.clone(),
                    source,
                })
            }
        }
    }

    /// Returns why `record` must not be claimed at `now`, if anything.
    pub fn check_eligible(&self, record: &Record, now: DateTime<Utc>) -> Option<SkipReason> {
        if record.field(&self.config.completed_field).is_some() {
            return Some(SkipReason::AlreadyCompleted);
        }
        match record.marker(&self.config.started_field) {
            Ok(Some(started)) if now.signed_duration_since(started) < self.config.recovery_timeout_chrono() => {
                Some(SkipReason::ClaimedElsewhere)
            }
            Ok(_) => None,
            Err(e) => {
                warn!(record_id = %record.id, error = %e, "Unreadable claim marker, treating claim as abandoned");
                None
            }
        }
    }

    async fn claim(&self, record: Record) -> ScanResult<ClaimOutcome> {
        if let Some(reason) = self.check_eligible(&record, self.clock.now()) {
            return Ok(ClaimOutcome::Skipped(reason));
        }

        let collection = &self.config.collection;
        let policy = &self.config.claim_retry;
        let observed_started = record.field(&self.config.started_field).cloned();
        let mut current = record;
        let mut conflicts = 0u32;

        loop {
            if self.job.is_canceled() {
                return Ok(ClaimOutcome::Skipped(SkipReason::Cancelled));
            }

            let mut content = current.content.clone();
            self.config.started_field.set(&mut content, Value::String(format_marker(self.clock.now())));

            match self.store.update(collection, &current.id, content, &current.revision).await {
                Ok(claimed) => return Ok(ClaimOutcome::Claimed(claimed)),
                Err(e) if e.is_precondition_failed() => {
                    conflicts += 1;
                    let fresh = self.store.read(collection, &current.id).await?;
                    if fresh.field(&self.config.completed_field).is_some() {
                        return Ok(ClaimOutcome::Skipped(SkipReason::AlreadyCompleted));
                    }
                    if fresh.field(&self.config.started_field) != observed_started.as_ref() {
                        return Ok(ClaimOutcome::Skipped(SkipReason::ClaimedElsewhere));
                    }
                    if policy.is_exhausted(conflicts) {
                        warn!(record_id = %current.id, conflicts = conflicts, "Giving up on claim after repeated write conflicts");
                        return Ok(ClaimOutcome::Skipped(SkipReason::RetriesExhausted));
                    }

                    debug!(record_id = %current.id, conflicts = conflicts, "Claim conflicted with an unrelated write, retrying");
                    let delay = policy.backoff(conflicts);
                    if !delay.is_zero() {
                        tokio::select! {
                            _ = self.job.cancelled() => return Ok(ClaimOutcome::Skipped(SkipReason::Cancelled)),
                            _ = tokio::time::sleep(delay) => {}
                        }
                    }
                    current = fresh;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    async fn execute(&self, record: &Record) -> Result<Value, ActionError> {
        let collection = &self.config.collection;
        let bindings = ActionBindings {
            input: record.content.clone(),
            object_id: record.full_id(collection),
            resource_container: collection.clone(),
            resource_id: record.id.clone(),
        };
        AssertUnwindSafe(self.action.invoke(bindings))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| Err(ActionError::Panicked(panic_message(panic.as_ref()))))
    }

    /// Writes the completion marker on the latest revision of `record`.
    /// A record completed by someone else in the meantime counts as done.
    async fn mark_completed(&self, record: &Record) -> ScanResult<()> {
        let collection = &self.config.collection;
        let policy = &self.config.claim_retry;
        let mut current = self.store.read(collection, &record.id).await?;
        let mut conflicts = 0u32;

        loop {
            if current.field(&self.config.completed_field).is_some() {
                debug!(record_id = %record.id, "Record already marked completed");
                return Ok(());
            }

            let mut content = current.content.clone();
            self.config.completed_field.set(&mut content, Value::String(format_marker(self.clock.now())));

            match self.store.update(collection, &current.id, content, &current.revision).await {
                Ok(_) => return Ok(()),
                Err(e) if e.is_precondition_failed() => {
                    conflicts += 1;
                    if policy.is_exhausted(conflicts) {
                        warn!(record_id = %record.id, conflicts = conflicts, "Could not write completion marker after repeated write conflicts");
                        return Ok(());
                    }
                    tokio::time::sleep(policy.backoff(conflicts)).await;
                    current = self.store.read(collection, &record.id).await?;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
