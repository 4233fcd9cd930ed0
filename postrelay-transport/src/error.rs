//! Transport error types.

use std::time::Duration;
use thiserror::Error;

// ============================================================================
// Transport Error
// ============================================================================

/// Error type for primary-transport operations.
#[derive(Debug, Error)]
pub enum TransportError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Request timed out.
    #[error("Request timed out after {0} seconds")]
    Timeout(u64),

    /// The sink answered with something that is not a reply object.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// JSON decoding error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Secondary transport error.
    #[error("Companion host error: {0}")]
    Host(#[from] HostError),
}

// ============================================================================
// Host Error
// ============================================================================

/// Error type for companion-process round trips.
#[derive(Debug, Error)]
pub enum HostError {
    /// Companion binary not found.
    #[error("Companion host not found: {0}")]
    NotFound(String),

    /// Failed to spawn the companion process.
    #[error("Failed to spawn companion host: {0}")]
    SpawnFailed(String),

    /// Round trip timed out.
    #[error("Companion host timed out after {0:?}")]
    Timeout(Duration),

    /// The companion closed its pipe without replying.
    #[error("Companion host closed without a reply")]
    ClosedWithoutReply,

    /// A frame exceeded the size ceiling.
    #[error("Frame of {0} bytes exceeds the frame ceiling")]
    FrameTooLarge(u32),

    /// Reply payload was not valid JSON.
    #[error("Invalid reply payload: {0}")]
    InvalidPayload(#[from] serde_json::Error),

    /// IO error on the pipes.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
