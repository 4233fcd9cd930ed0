//! Store error types.

use thiserror::Error;

/// Error type for persistence operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// File IO failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization failed.
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}
