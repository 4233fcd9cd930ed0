//! The inbound command surface.
//!
//! Commands arrive from the control surface or the raw-event source as
//! tagged JSON objects; replies are plain JSON objects. Capture events get
//! no reply — recoverable errors on the capture path never surface to the
//! command layer.

use postrelay_core::{MediaKind, SinkReply, StatusReport};
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ============================================================================
// Commands
// ============================================================================

/// A command accepted by the agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Command {
    /// A raw intercepted payload captured under an endpoint name.
    Capture {
        /// Logical query identifier.
        endpoint: String,
        /// The raw response payload, untouched.
        payload: Value,
    },

    /// Reads current counts, transport state, and configuration flags.
    GetStatus,

    /// Flips the capture-enabled flag. Existing buffers are untouched.
    ToggleCapture,

    /// Enables or disables debug log buffering.
    SetDebug {
        /// New flag value.
        enabled: bool,
    },

    /// Enables or disables verbose payload diagnostics.
    SetVerbose {
        /// New flag value.
        enabled: bool,
    },

    /// Changes the sink output directory, after a path-test round trip.
    SetOutputDir {
        /// New directory ("" resets to the sink default).
        output_dir: String,
    },

    /// Toggles whether secondary-transport fallback is permitted.
    SetTransportPrefs {
        /// New fallback permission.
        allow_native_fallback: bool,
    },

    /// Schedules an immediate bootstrap attempt regardless of backoff.
    ForceRetry,

    /// Answers whether a cached post has downloadable video.
    VideoLookup {
        /// Post id to look up.
        post_id: String,
    },

    /// Probes the sink's media-encoder capability.
    CheckEncoder,

    /// Starts a video download on the sink.
    DownloadStart {
        /// Post id, for in-flight download tracking.
        post_id: Option<String>,
        /// Canonical post URL.
        post_url: String,
        /// Best direct media URL, when known.
        direct_url: Option<String>,
        /// Post creation date, for output naming.
        post_date: Option<String>,
    },

    /// Polls a running download.
    DownloadStatus {
        /// Download id returned by download-start.
        download_id: String,
    },
}

// ============================================================================
// Replies
// ============================================================================

/// Reply to a video-lookup command.
#[derive(Debug, Clone, Default, Serialize)]
pub struct VideoLookupReply {
    /// Whether the cached post has video or animated-gif media.
    pub has_video: bool,
    /// Canonical post URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post_url: Option<String>,
    /// Best direct media URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub direct_url: Option<String>,
    /// Media kind of the matched item.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_type: Option<MediaKind>,
    /// Video duration in milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    /// Post creation date.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post_date: Option<String>,
    /// Download id of an in-flight download for this post, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_download_id: Option<String>,
}

/// A reply from the agent to the control surface.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum CommandReply {
    /// Full status snapshot.
    Status(StatusReport),

    /// Video lookup answer.
    Video(VideoLookupReply),

    /// Pass-through of a sink reply (downloads, encoder probe).
    Sink(SinkReply),

    /// A changed configuration value.
    Setting(Value),

    /// A synchronously surfaced configuration error.
    Error {
        /// Error text for the command issuer.
        error: String,
    },
}

impl CommandReply {
    /// A setting reply from key/value pairs.
    pub fn setting(value: Value) -> Self {
        Self::Setting(value)
    }

    /// The explicit "no transport" result for HTTP-only operations.
    pub fn no_transport() -> Self {
        Self::Sink(SinkReply::rejected("No transport"))
    }
}

// ============================================================================
// Tests
// ============================================================================
