use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::types::scan::ScanConfig;
use crate::types::statistics::{Progress, RunStatistics, StatisticsSnapshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobState {
    Pending,
    Running,
    Completed,
    Cancelled,
    Interrupted,
    /// Deactivated while running; ended without being marked completed
    Inactive,
    Failed,
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            JobState::Pending => "PENDING",
            JobState::Running => "RUNNING",
            JobState::Completed => "COMPLETED",
            JobState::Cancelled => "CANCELLED",
            JobState::Interrupted => "INTERRUPTED",
            JobState::Inactive => "INACTIVE",
            JobState::Failed => "FAILED",
        };
        f.write_str(name)
    }
}

/// One invocation of a task scan.
///
/// Shared between the runner, its workers and the control surface. Every flag is monotonic:
/// once a job is cancelled, deactivated or interrupted it stays that way.
#[derive(Debug)]
pub struct ScanJob {
    id: String,
    invoker_name: String,
    collection: String,
    action_name: String,
    statistics: RunStatistics,
    cancel_token: CancellationToken,
    finished_token: CancellationToken,
    inactive: AtomicBool,
    interrupted: AtomicBool,
    failed: AtomicBool,
    completed: AtomicBool,
}

impl ScanJob {
    pub fn new(config: &ScanConfig, action_name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            invoker_name: config.invoker_name.clone(),
            collection: config.collection.clone(),
            action_name: action_name.into(),
            statistics: RunStatistics::new(),
            cancel_token: CancellationToken::new(),
            finished_token: CancellationToken::new(),
            inactive: AtomicBool::new(false),
            interrupted: AtomicBool::new(false),
            failed: AtomicBool::new(false),
            completed: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn invoker_name(&self) -> &str {
        &self.invoker_name
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn action_name(&self) -> &str {
        &self.action_name
    }

    pub fn statistics(&self) -> &RunStatistics {
        &self.statistics
    }

    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    pub fn is_canceled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }

    /// Resolves once the job is cancelled (by an operator or an interruption)
    pub async fn cancelled(&self) {
        self.cancel_token.cancelled().await
    }

    /// Prevents the run from marking itself completed. Work in progress continues.
    pub fn deactivate(&self) {
        self.inactive.store(true, Ordering::SeqCst);
    }

    pub fn is_inactive(&self) -> bool {
        self.inactive.load(Ordering::SeqCst)
    }

    /// The wait on the worker pool was interrupted; stop claiming new records.
    pub fn interrupted(&self) {
        self.interrupted.store(true, Ordering::SeqCst);
        self.cancel();
    }

    pub fn is_interrupted(&self) -> bool {
        self.interrupted.load(Ordering::SeqCst)
    }

    pub fn is_completed(&self) -> bool {
        self.completed.load(Ordering::SeqCst)
    }

    pub fn is_finished(&self) -> bool {
        self.finished_token.is_cancelled()
    }

    /// Resolves once the run has been finalized
    pub async fn wait_finished(&self) {
        self.finished_token.cancelled().await
    }

    pub fn start(&self, at: DateTime<Utc>) {
        self.statistics.start_job(at);
    }

    /// Records the end time and marks the job completed unless it was deactivated mid-run.
    pub fn finish(&self, at: DateTime<Utc>) {
        if !self.is_inactive() {
            self.completed.store(true, Ordering::SeqCst);
        }
        self.statistics.end_job(at);
        self.finished_token.cancel();
    }

    /// Ends a run that could not fetch its records or whose pipeline panicked.
    pub fn fail(&self, at: DateTime<Utc>) {
        self.failed.store(true, Ordering::SeqCst);
        self.statistics.start_job(at);
        self.statistics.end_job(at);
        self.finished_token.cancel();
    }

    pub fn state(&self) -> JobState {
        if self.statistics.job_started_at().is_none() {
            return JobState::Pending;
        }
        if !self.is_finished() {
            return JobState::Running;
        }
        if self.failed.load(Ordering::SeqCst) {
            JobState::Failed
        } else if self.is_inactive() {
            JobState::Inactive
        } else if self.is_interrupted() {
            JobState::Interrupted
        } else if self.is_canceled() {
            JobState::Cancelled
        } else {
            JobState::Completed
        }
    }

    pub fn progress(&self) -> Progress {
        let successes = self.statistics.succeeded();
        let failures = self.statistics.failed();
        Progress {
            state: self.state(),
            processed: successes + failures,
            total: self.statistics.to_process(),
            successes,
            failures,
        }
    }

    pub fn snapshot(&self, now: DateTime<Utc>) -> StatisticsSnapshot {
        StatisticsSnapshot {
            succeeded: self.statistics.succeeded(),
            failed: self.statistics.failed(),
            job_duration_ms: self.statistics.job_duration_ms(now),
            query_duration_ms: self.statistics.query_duration_ms(now),
            progress: self.progress(),
        }
    }
}
