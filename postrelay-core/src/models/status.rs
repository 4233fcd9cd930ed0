//! Transport state and status reporting types.

use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Transport State
// ============================================================================

/// Observable state of the transport resilience manager.
///
/// The manager transitions between these states; nothing outside it mutates
/// them. `NativeFallback` means requests are currently satisfied by the
/// secondary transport while HTTP recovery runs in the background.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TransportState {
    /// Nothing has ever worked.
    #[default]
    NoTransport,
    /// HTTP transport known but not currently usable.
    HttpDegraded,
    /// HTTP transport usable.
    HttpReady,
    /// Delivering via the secondary transport; HTTP recovery pending.
    NativeFallback,
}

impl TransportState {
    /// Returns true when the primary HTTP transport is usable.
    pub fn is_http_ready(&self) -> bool {
        matches!(self, Self::HttpReady)
    }

    /// Returns true when some transport is currently delivering.
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::HttpReady | Self::NativeFallback)
    }
}

impl fmt::Display for TransportState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::NoTransport => "no_transport",
            Self::HttpDegraded => "http_degraded",
            Self::HttpReady => "http_ready",
            Self::NativeFallback => "native_fallback",
        };
        write!(f, "{s}")
    }
}

// ============================================================================
// Status Report
// ============================================================================

/// Snapshot of the agent's state, returned to the control surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusReport {
    /// Whether capture is enabled.
    pub capture_enabled: bool,
    /// Posts accepted this session.
    pub session_count: u64,
    /// Posts accepted across all sessions.
    pub all_time_count: u64,
    /// Whether any transport is currently delivering.
    pub connected: bool,
    /// Posts waiting in the pending buffer.
    pub buffered: usize,
    /// Configured sink output directory ("" = sink default).
    pub output_dir: String,
    /// Whether debug log buffering is enabled.
    pub debug_logging: bool,
    /// Whether verbose payload diagnostics are enabled.
    pub verbose_logging: bool,
    /// Whether secondary-transport fallback is permitted.
    pub allow_native_fallback: bool,
    /// Current transport state.
    pub transport_state: TransportState,
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_state_predicates() {
        assert!(!TransportState::NoTransport.is_connected());
        assert!(!TransportState::HttpDegraded.is_connected());
        assert!(TransportState::HttpReady.is_connected());
        assert!(TransportState::NativeFallback.is_connected());
        assert!(TransportState::HttpReady.is_http_ready());
        assert!(!TransportState::NativeFallback.is_http_ready());
    }

    #[test]
    fn test_transport_state_serde_names() {
        let json = serde_json::to_string(&TransportState::NativeFallback).unwrap();
        assert_eq!(json, r#""native_fallback""#);
        let back: TransportState = serde_json::from_str(r#""http_degraded""#).unwrap();
        assert_eq!(back, TransportState::HttpDegraded);
    }
}
