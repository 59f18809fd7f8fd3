use thiserror::Error;

use crate::types::record::Revision;

#[derive(Error, Debug)]
pub enum StoreError {
    /// The store is unreachable or rejected the filter
    #[error("Query on {collection} failed: {message}")]
    QueryFailed { collection: String, message: String },

    #[error("Record {collection}/{id} not found")]
    NotFound { collection: String, id: String },

    /// The record changed since `expected` was observed
    #[error("Revision mismatch for {collection}/{id}: expected {expected}")]
    PreconditionFailed { collection: String, id: String, expected: Revision },

    #[error("Failed to (de)serialize store data: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Store IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    pub fn is_precondition_failed(&self) -> bool {
        matches!(self, StoreError::PreconditionFailed { .. })
    }
}
