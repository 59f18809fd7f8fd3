use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use rstest::*;
use serde_json::{json, Map, Value};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;

use crate::core::client::action::{Action, ActionBindings, ActionError, ActionRegistry};
use crate::core::client::store::{InMemoryRecordStore, RecordStore, StoreError};
use crate::core::clock::ManualClock;
use crate::types::record::{Record, Revision};
use crate::types::scan::{ActionRef, ClaimRetryPolicy, ScanConfig};

pub const COLLECTION: &str = "managed/user";
pub const ACTION_NAME: &str = "sync-user";

#[fixture]
pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap()
}

#[fixture]
pub fn clock(now: DateTime<Utc>) -> Arc<ManualClock> {
    Arc::new(ManualClock::new(now))
}

/// Scan parameters against [`COLLECTION`] with a retry policy that never sleeps
#[fixture]
pub fn scan_config() -> ScanConfig {
    ScanConfig::new("test-invoker", COLLECTION).with_action(ActionRef::new(ACTION_NAME)).with_claim_retry(
        ClaimRetryPolicy {
            max_attempts: Some(5),
            base_delay: std::time::Duration::ZERO,
            max_delay: std::time::Duration::ZERO,
        },
    )
}

/// Store holding `count` active users with ids `0..count`
pub async fn seeded_store(count: usize) -> Arc<InMemoryRecordStore> {
    let store = Arc::new(InMemoryRecordStore::new());
    for i in 0..count {
        store.insert(COLLECTION, &i.to_string(), json!({ "name": format!("user-{i}"), "status": "active" })).await;
    }
    store
}

pub async fn read(store: &InMemoryRecordStore, id: &str) -> Record {
    store.read(COLLECTION, id).await.unwrap()
}

pub fn registry(action: Arc<dyn Action>) -> ActionRegistry {
    ActionRegistry::new().with_action(action)
}

/// Action with a scripted result that records every invocation
pub struct ScriptedAction {
    name: String,
    result: Value,
    active: bool,
    error_on: HashSet<String>,
    panic_on: HashSet<String>,
    gate: Option<CancellationToken>,
    entered: CancellationToken,
    invocations: Mutex<Vec<ActionBindings>>,
}

impl ScriptedAction {
    pub fn returning(result: Value) -> Self {
        Self {
            name: ACTION_NAME.to_string(),
            result,
            active: true,
            error_on: HashSet::new(),
            panic_on: HashSet::new(),
            gate: None,
            entered: CancellationToken::new(),
            invocations: Mutex::new(Vec::new()),
        }
    }

    pub fn succeeding() -> Self {
        Self::returning(json!(true))
    }

    /// Raises an action error for the record with this id
    pub fn error_on(mut self, id: &str) -> Self {
        self.error_on.insert(id.to_string());
        self
    }

    pub fn panic_on(mut self, id: &str) -> Self {
        self.panic_on.insert(id.to_string());
        self
    }

    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }

    /// Holds every invocation until `gate` is cancelled
    pub fn gated(mut self, gate: CancellationToken) -> Self {
        self.gate = Some(gate);
        self
    }

    /// Resolves once the first invocation has started
    pub async fn entered(&self) {
        self.entered.cancelled().await
    }

    pub fn invocations(&self) -> Vec<ActionBindings> {
        self.invocations.lock().unwrap().clone()
    }

    pub fn invoked_ids(&self) -> Vec<String> {
        self.invocations().into_iter().map(|bindings| bindings.resource_id).collect()
    }
}

#[async_trait]
impl Action for ScriptedAction {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_active(&self) -> bool {
        self.active
    }

    async fn invoke(&self, bindings: ActionBindings) -> Result<Value, ActionError> {
        let id = bindings.resource_id.clone();
        self.invocations.lock().unwrap().push(bindings);
        self.entered.cancel();
        if let Some(gate) = &self.gate {
            gate.cancelled().await;
        }
        if self.panic_on.contains(&id) {
            panic!("scripted panic on {id}");
        }
        if self.error_on.contains(&id) {
            return Err(ActionError::Failed(format!("scripted error on {id}")));
        }
        Ok(self.result.clone())
    }
}

type Interference = Box<dyn Fn(&mut Value) + Send + Sync>;
type Trigger = Box<dyn Fn(&Value) -> bool + Send + Sync>;

/// Store wrapper that lets a simulated competitor write a record right before an update lands,
/// so the update fails its revision check.
pub struct InterferingStore {
    inner: Arc<InMemoryRecordStore>,
    remaining: AtomicUsize,
    interference: Interference,
    trigger: Trigger,
}

impl InterferingStore {
    /// Interferes with the next `times` updates
    pub fn new(
        inner: Arc<InMemoryRecordStore>,
        times: usize,
        interference: impl Fn(&mut Value) + Send + Sync + 'static,
    ) -> Self {
        Self {
            inner,
            remaining: AtomicUsize::new(times),
            interference: Box::new(interference),
            trigger: Box::new(|_| true),
        }
    }

    /// Only interferes with updates whose new content satisfies `trigger`
    pub fn when(mut self, trigger: impl Fn(&Value) -> bool + Send + Sync + 'static) -> Self {
        self.trigger = Box::new(trigger);
        self
    }

    fn take_turn(&self) -> bool {
        self.remaining.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1)).is_ok()
    }
}

#[async_trait]
impl RecordStore for InterferingStore {
    async fn query(&self, collection: &str, filter: &Map<String, Value>) -> Result<Vec<Record>, StoreError> {
        self.inner.query(collection, filter).await
    }

    async fn read(&self, collection: &str, id: &str) -> Result<Record, StoreError> {
        self.inner.read(collection, id).await
    }

    async fn update(
        &self,
        collection: &str,
        id: &str,
        content: Value,
        expected_revision: &Revision,
    ) -> Result<Record, StoreError> {
        if (self.trigger)(&content) && self.take_turn() {
            let current = self.inner.read(collection, id).await?;
            let mut competing = current.content.clone();
            (self.interference)(&mut competing);
            self.inner.update(collection, id, competing, &current.revision).await?;
        }
        self.inner.update(collection, id, content, expected_revision).await
    }
}

/// Whether `content` carries a completion marker at the default path
pub fn has_completed(content: &Value) -> bool {
    content.pointer("/taskState/completed").is_some_and(|value| !value.is_null())
}

pub fn started_marker(record: &Record) -> Option<&str> {
    record.content.pointer("/taskState/started").and_then(Value::as_str)
}

pub fn completed_marker(record: &Record) -> Option<&str> {
    record.content.pointer("/taskState/completed").and_then(Value::as_str)
}
