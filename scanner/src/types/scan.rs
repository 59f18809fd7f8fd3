use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

use crate::error::{ScanError, ScanResult};
use crate::types::field_path::FieldPath;
use crate::utils::constants::{
    DEFAULT_CLAIM_BASE_DELAY_MS, DEFAULT_CLAIM_MAX_ATTEMPTS, DEFAULT_CLAIM_MAX_DELAY_MS, DEFAULT_COMPLETED_FIELD,
    DEFAULT_RECOVERY_TIMEOUT_SECS, DEFAULT_STARTED_FIELD,
};

/// Whether `start_task` waits for the run or hands it to a background task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LaunchMode {
    #[default]
    Synchronous,
    Background,
}

/// Reference to an action registered in the [`ActionRegistry`](crate::core::client::action::ActionRegistry)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionRef {
    pub name: String,
}

impl ActionRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Bounds the claim retry loop that runs after a write conflict
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimRetryPolicy {
    /// `None` retries until the job is cancelled
    pub max_attempts: Option<u32>,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for ClaimRetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: Some(DEFAULT_CLAIM_MAX_ATTEMPTS),
            base_delay: Duration::from_millis(DEFAULT_CLAIM_BASE_DELAY_MS),
            max_delay: Duration::from_millis(DEFAULT_CLAIM_MAX_DELAY_MS),
        }
    }
}

impl ClaimRetryPolicy {
    /// Retries immediately, forever, stopping only on cancellation.
    pub fn unbounded() -> Self {
        Self { max_attempts: None, base_delay: Duration::ZERO, max_delay: Duration::ZERO }
    }

    pub fn is_exhausted(&self, conflicts: u32) -> bool {
        self.max_attempts.is_some_and(|max| conflicts >= max)
    }

    /// Exponential backoff: `base * 2^(conflicts - 1)`, capped at `max_delay`
    pub fn backoff(&self, conflicts: u32) -> Duration {
        if conflicts == 0 || self.base_delay.is_zero() {
            return Duration::ZERO;
        }
        let exponent = (conflicts - 1).min(31);
        self.base_delay.saturating_mul(1u32 << exponent).min(self.max_delay)
    }
}

/// Immutable parameters of one task scan run
#[derive(Debug, Clone)]
pub struct ScanConfig {
    pub invoker_name: String,
    pub collection: String,
    /// Query filter, possibly nested; flattened to dotted keys before the query
    pub filter: Value,
    pub workers: usize,
    pub max_records: Option<usize>,
    pub recovery_timeout: Duration,
    pub started_field: FieldPath,
    pub completed_field: FieldPath,
    pub action: Option<ActionRef>,
    pub launch_mode: LaunchMode,
    pub claim_retry: ClaimRetryPolicy,
}

impl ScanConfig {
    pub fn new(invoker_name: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            invoker_name: invoker_name.into(),
            collection: collection.into(),
            filter: Value::Object(Default::default()),
            workers: 1,
            max_records: None,
            recovery_timeout: Duration::from_secs(DEFAULT_RECOVERY_TIMEOUT_SECS),
            started_field: default_field(DEFAULT_STARTED_FIELD),
            completed_field: default_field(DEFAULT_COMPLETED_FIELD),
            action: None,
            launch_mode: LaunchMode::default(),
            claim_retry: ClaimRetryPolicy::default(),
        }
    }

    pub fn with_filter(mut self, filter: Value) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_max_records(mut self, max_records: Option<usize>) -> Self {
        self.max_records = max_records;
        self
    }

    pub fn with_recovery_timeout(mut self, recovery_timeout: Duration) -> Self {
        self.recovery_timeout = recovery_timeout;
        self
    }

    pub fn with_fields(mut self, started_field: FieldPath, completed_field: FieldPath) -> Self {
        self.started_field = started_field;
        self.completed_field = completed_field;
        self
    }

    pub fn with_action(mut self, action: ActionRef) -> Self {
        self.action = Some(action);
        self
    }

    pub fn with_launch_mode(mut self, launch_mode: LaunchMode) -> Self {
        self.launch_mode = launch_mode;
        self
    }

    pub fn with_claim_retry(mut self, claim_retry: ClaimRetryPolicy) -> Self {
        self.claim_retry = claim_retry;
        self
    }

    pub fn action_name(&self) -> Option<&str> {
        self.action.as_ref().map(|action| action.name.as_str())
    }

    pub fn recovery_timeout_chrono(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.recovery_timeout).unwrap_or(chrono::Duration::MAX)
    }

    /// Rejects parameters that cannot produce a meaningful run.
    pub fn validate(&self) -> ScanResult<()> {
        if self.collection.trim().is_empty() {
            return Err(ScanError::Configuration("target collection must not be empty".to_string()));
        }
        if self.workers == 0 {
            return Err(ScanError::Configuration("worker count must be greater than 0".to_string()));
        }
        if self.recovery_timeout.is_zero() {
            return Err(ScanError::Configuration("recovery timeout must be greater than 0".to_string()));
        }
        if self.started_field == self.completed_field {
            return Err(ScanError::Configuration(format!(
                "started and completed markers share the same field {}",
                self.started_field
            )));
        }
        if !self.filter.is_object() {
            return Err(ScanError::Configuration("query filter must be an object".to_string()));
        }
        Ok(())
    }
}

fn default_field(path: &str) -> FieldPath {
    FieldPath::try_from(path.to_string()).unwrap_or_else(|_| unreachable!("default field paths are valid"))
}
