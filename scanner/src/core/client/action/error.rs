use thiserror::Error;

#[derive(Error, Debug)]
pub enum ActionError {
    #[error("Action failed: {0}")]
    Failed(String),

    /// The action panicked while running
    #[error("Action panicked: {0}")]
    Panicked(String),

    #[error("Failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with status {status}: {stderr}")]
    NonZeroExit { program: String, status: String, stderr: String },

    #[error("{program} timed out after {timeout_ms}ms")]
    Timeout { program: String, timeout_ms: u128 },

    #[error("Action produced invalid output: {0}")]
    InvalidOutput(#[from] serde_json::Error),

    #[error("Action IO error: {0}")]
    Io(#[from] std::io::Error),
}
