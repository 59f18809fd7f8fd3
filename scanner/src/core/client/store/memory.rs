use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use super::{RecordStore, StoreError};
use crate::types::record::{Record, Revision};
use crate::utils::constants::QUERY_PARAMETER_PREFIX;

#[derive(Debug, Clone)]
struct StoredRecord {
    revision: u64,
    content: Value,
}

impl StoredRecord {
    fn to_record(&self, id: &str) -> Record {
        Record::new(id, Revision::new(self.revision.to_string()), self.content.clone())
    }
}

/// Record store kept in process memory.
///
/// Records are ordered by id inside a collection, so queries return a stable order. Every
/// successful update bumps the record's revision by one; updates are compare-and-swap under a
/// single write lock.
#[derive(Debug, Default)]
pub struct InMemoryRecordStore {
    collections: RwLock<HashMap<String, BTreeMap<String, StoredRecord>>>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates or replaces a record, returning it at its new revision.
    pub async fn insert(&self, collection: &str, id: &str, content: Value) -> Record {
        let mut collections = self.collections.write().await;
        let records = collections.entry(collection.to_string()).or_default();
        let revision = records.get(id).map(|existing| existing.revision + 1).unwrap_or(0);
        let stored = StoredRecord { revision, content };
        let record = stored.to_record(id);
        records.insert(id.to_string(), stored);
        record
    }

    pub async fn len(&self, collection: &str) -> usize {
        self.collections.read().await.get(collection).map(BTreeMap::len).unwrap_or(0)
    }

    pub async fn is_empty(&self, collection: &str) -> bool {
        self.len(collection).await == 0
    }

    /// Loads a store from a JSON document shaped `{ collection: { id: content } }`.
    pub async fn load_from_file(path: &Path) -> Result<Self, StoreError> {
        let raw = tokio::fs::read_to_string(path).await?;
        let document: HashMap<String, BTreeMap<String, Value>> = serde_json::from_str(&raw)?;

        let collections = document
            .into_iter()
            .map(|(collection, records)| {
                let records = records
                    .into_iter()
                    .map(|(id, content)| (id, StoredRecord { revision: 0, content }))
                    .collect::<BTreeMap<_, _>>();
                (collection, records)
            })
            .collect::<HashMap<_, _>>();

        debug!(path = %path.display(), collections = collections.len(), "Loaded record store from file");
        Ok(Self { collections: RwLock::new(collections) })
    }

    /// Writes every collection back in the format read by [`Self::load_from_file`].
    pub async fn save_to_file(&self, path: &Path) -> Result<(), StoreError> {
        let document = {
            let collections = self.collections.read().await;
            collections
                .iter()
                .map(|(collection, records)| {
                    let records = records
                        .iter()
                        .map(|(id, stored)| (id.clone(), stored.content.clone()))
                        .collect::<BTreeMap<_, _>>();
                    (collection.clone(), records)
                })
                .collect::<BTreeMap<_, _>>()
        };
        let raw = serde_json::to_string_pretty(&document)?;
        tokio::fs::write(path, raw).await?;
        Ok(())
    }
}

/// Looks up a dotted path (`a.b.c`) inside a record's content.
fn lookup_dotted<'a>(content: &'a Value, dotted: &str) -> Option<&'a Value> {
    dotted.split('.').try_fold(content, |current, key| current.as_object()?.get(key))
}

fn matches_filter(content: &Value, filter: &Map<String, Value>) -> bool {
    filter.iter().filter(|(key, _)| !key.starts_with(QUERY_PARAMETER_PREFIX)).all(|(key, expected)| {
        match (lookup_dotted(content, key), expected) {
            (None, Value::Null) => true,
            (Some(actual), expected) => actual == expected,
            (None, _) => false,
        }
    })
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn query(&self, collection: &str, filter: &Map<String, Value>) -> Result<Vec<Record>, StoreError> {
        let collections = self.collections.read().await;
        let Some(records) = collections.get(collection) else {
            warn!(collection = %collection, "Query against unknown collection");
            return Err(StoreError::QueryFailed {
                collection: collection.to_string(),
                message: "unknown collection".to_string(),
            });
        };

        Ok(records
            .iter()
            .filter(|(_, stored)| matches_filter(&stored.content, filter))
            .map(|(id, stored)| stored.to_record(id))
            .collect())
    }

    async fn read(&self, collection: &str, id: &str) -> Result<Record, StoreError> {
        self.collections
            .read()
            .await
            .get(collection)
            .and_then(|records| records.get(id))
            .map(|stored| stored.to_record(id))
            .ok_or_else(|| StoreError::NotFound { collection: collection.to_string(), id: id.to_string() })
    }

    async fn update(
        &self,
        collection: &str,
        id: &str,
        content: Value,
        expected_revision: &Revision,
    ) -> Result<Record, StoreError> {
        let mut collections = self.collections.write().await;
        let stored = collections
            .get_mut(collection)
            .and_then(|records| records.get_mut(id))
            .ok_or_else(|| StoreError::NotFound { collection: collection.to_string(), id: id.to_string() })?;

        if stored.revision.to_string() != expected_revision.as_str() {
            debug!(
                collection = %collection,
                id = %id,
                expected = %expected_revision,
                current = stored.revision,
                "Update rejected - revision mismatch"
            );
            return Err(StoreError::PreconditionFailed {
                collection: collection.to_string(),
                id: id.to_string(),
                expected: expected_revision.clone(),
            });
        }

        stored.revision += 1;
        stored.content = content;
        Ok(stored.to_record(id))
    }
}
