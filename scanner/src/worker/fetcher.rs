use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

use crate::core::client::store::RecordStore;
use crate::core::clock::Clock;
use crate::error::{ScanError, ScanResult};
use crate::types::record::Record;
use crate::utils::flatten::flatten_json;
use crate::utils::macros::expand_time_macros;

/// Queries the store for every record matching the run's filter
#[derive(Clone)]
pub struct Fetcher {
    store: Arc<dyn RecordStore>,
    clock: Arc<dyn Clock>,
}

impl Fetcher {
    pub fn new(store: Arc<dyn RecordStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// fetch - Returns the full result set of the filter query
    /// The filter is flattened to dotted keys and its time macros are expanded against the clock
    /// before it reaches the store.
    /// # Arguments
    /// * `collection` - The collection to query
    /// * `filter` - The (possibly nested) query filter
    /// # Errors
    /// * `ScanError::Query` - If the store rejects or fails the query
    pub async fn fetch(&self, collection: &str, filter: &Value) -> ScanResult<Vec<Record>> {
        let mut params = flatten_json(filter);
        expand_time_macros(&mut params, self.clock.now());
        let query = Value::Object(params.clone());
        debug!(collection = %collection, filter = %query, "Querying collection");

        let records = self.store.query(collection, &params).await.map_err(ScanError::Query)?;
        debug!(collection = %collection, count = records.len(), "Query returned records");
        Ok(records)
    }
}
