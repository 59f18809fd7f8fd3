use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum TypeError {
    #[error("Invalid field path: {0:?}")]
    InvalidFieldPath(String),

    #[error("Invalid timestamp {value:?} at {field}: {reason}")]
    InvalidTimestamp { field: String, value: String, reason: String },
}
