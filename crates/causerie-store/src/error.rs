use thiserror::Error;

/// Errors produced by the local persistence layer.  Callers treat them as
/// diagnostics: the in-memory contact list stays authoritative for the
/// session even when a write fails.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Could not determine application data directory")]
    NoDataDir,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, StoreError>;
