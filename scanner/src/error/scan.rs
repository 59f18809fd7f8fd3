use thiserror::Error;

use crate::core::client::action::ActionError;
use crate::core::client::store::StoreError;

pub type ScanResult<T> = Result<T, ScanError>;

/// Errors raised by the scan pipeline and the job control surface
#[derive(Error, Debug)]
pub enum ScanError {
    /// Missing or invalid run parameters. Raised before any job exists.
    #[error("Invalid task scanner configuration: {0}")]
    Configuration(String),

    /// The fetch stage could not complete; the whole run is aborted
    #[error("Error during query: {0}")]
    Query(#[source] StoreError),

    /// The store failed outside of the query stage (unreachable, record vanished mid-claim)
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// The action raised instead of returning a result; the current partition is aborted
    #[error("{action} action invoked by {invoker} encountered an error: {source}")]
    Execution {
        action: String,
        invoker: String,
        #[source]
        source: ActionError,
    },

    #[error("Scan job {id} not found")]
    JobNotFound { id: String },
}
