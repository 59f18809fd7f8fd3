pub mod scan;

use thiserror::Error;

pub use scan::{ScanError, ScanResult};

/// Result type for the task-scanner binary
pub type ScannerResult<T> = Result<T, ScannerError>;

/// Top level errors surfaced by the command line entry point
#[derive(Error, Debug)]
pub enum ScannerError {
    #[error("Scan error: {0}")]
    ScanError(#[from] ScanError),

    /// Configuration file could not be loaded or validated
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Store file error: {0}")]
    StoreFileError(String),

    #[error("Scanner Error: {0}")]
    ScannerAnyHowError(#[from] anyhow::Error),

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}
