use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReconcileError {
    /// The payment provider could not be reached or answered with an error.
    #[error("Transport error: {0}")]
    Transport(String),
    /// Required setup is missing (API key, linked transaction id, ...).
    #[error("Configuration error: {0}")]
    Configuration(String),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Store error: {0}")]
    Store(String),
    #[error("Notification error: {0}")]
    Notification(String),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Internal error: {0}")]
    Internal(#[from] Box<dyn std::error::Error + Send + Sync>),
}

#[cfg(feature = "storage-rocksdb")]
impl From<rocksdb::Error> for ReconcileError {
    fn from(err: rocksdb::Error) -> Self {
        ReconcileError::Store(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ReconcileError>;
