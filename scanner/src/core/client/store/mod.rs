pub mod error;
pub mod memory;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::types::record::{Record, Revision};
pub use error::StoreError;
pub use memory::InMemoryRecordStore;

/// Contract of the resource collection the scanner works against.
///
/// `update` is the only mutation and must behave as a compare-and-swap on the revision: it
/// succeeds only when `expected_revision` is still the stored revision, and fails with
/// [`StoreError::PreconditionFailed`] otherwise.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// query - Returns every record of `collection` matching the flat `filter`
    async fn query(&self, collection: &str, filter: &Map<String, Value>) -> Result<Vec<Record>, StoreError>;

    /// read - Returns the current state of one record
    async fn read(&self, collection: &str, id: &str) -> Result<Record, StoreError>;

    /// update - Replaces the content of a record if its revision is still `expected_revision`
    async fn update(
        &self,
        collection: &str,
        id: &str,
        content: Value,
        expected_revision: &Revision,
    ) -> Result<Record, StoreError>;
}
