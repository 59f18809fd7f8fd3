use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;

use crate::types::job::JobState;

/// Counters and timestamps of one run, shared by every worker of that run
#[derive(Debug, Default)]
pub struct RunStatistics {
    succeeded: AtomicU64,
    failed: AtomicU64,
    to_process: AtomicU64,
    job_started_at: OnceLock<DateTime<Utc>>,
    job_ended_at: OnceLock<DateTime<Utc>>,
    query_started_at: OnceLock<DateTime<Utc>>,
    query_ended_at: OnceLock<DateTime<Utc>>,
}

impl RunStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn task_succeeded(&self) {
        self.succeeded.fetch_add(1, Ordering::SeqCst);
    }

    pub fn task_failed(&self) {
        self.failed.fetch_add(1, Ordering::SeqCst);
    }

    pub fn succeeded(&self) -> u64 {
        self.succeeded.load(Ordering::SeqCst)
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::SeqCst)
    }

    pub fn set_to_process(&self, total: u64) {
        self.to_process.store(total, Ordering::SeqCst);
    }

    pub fn to_process(&self) -> u64 {
        self.to_process.load(Ordering::SeqCst)
    }

    // Start and end times are write-once; a second call keeps the first value.

    pub fn start_job(&self, at: DateTime<Utc>) {
        let _ = self.job_started_at.set(at);
    }

    pub fn end_job(&self, at: DateTime<Utc>) {
        let _ = self.job_ended_at.set(at);
    }

    pub fn start_query(&self, at: DateTime<Utc>) {
        let _ = self.query_started_at.set(at);
    }

    pub fn end_query(&self, at: DateTime<Utc>) {
        let _ = self.query_ended_at.set(at);
    }

    pub fn job_started_at(&self) -> Option<DateTime<Utc>> {
        self.job_started_at.get().copied()
    }

    pub fn job_ended_at(&self) -> Option<DateTime<Utc>> {
        self.job_ended_at.get().copied()
    }

    /// Elapsed job time; a running job is measured up to `now`
    pub fn job_duration_ms(&self, now: DateTime<Utc>) -> i64 {
        duration_ms(self.job_started_at.get(), self.job_ended_at.get(), now)
    }

    pub fn query_duration_ms(&self, now: DateTime<Utc>) -> i64 {
        duration_ms(self.query_started_at.get(), self.query_ended_at.get(), now)
    }
}

fn duration_ms(start: Option<&DateTime<Utc>>, end: Option<&DateTime<Utc>>, now: DateTime<Utc>) -> i64 {
    match start {
        Some(start) => {
            let end = end.copied().unwrap_or(now);
            end.signed_duration_since(*start).num_milliseconds().max(0)
        }
        None => 0,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    pub state: JobState,
    pub processed: u64,
    pub total: u64,
    pub successes: u64,
    pub failures: u64,
}

/// Point-in-time view returned by the job control surface
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatisticsSnapshot {
    pub succeeded: u64,
    pub failed: u64,
    pub job_duration_ms: i64,
    pub query_duration_ms: i64,
    pub progress: Progress,
}
