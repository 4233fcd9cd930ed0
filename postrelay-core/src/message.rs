//! The sink message contract.
//!
//! Every outbound delivery is one [`SinkMessage`]. The HTTP daemon and the
//! native companion process accept the same logical messages; this module
//! owns the mapping to each transport's wire shape so the transport layer
//! never inspects message internals.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::models::Post;

// ============================================================================
// Sink Message
// ============================================================================

/// An outbound message to the sink process.
#[derive(Debug, Clone)]
pub enum SinkMessage {
    /// Bulk delivery of captured posts.
    Posts {
        /// The batch to deliver.
        posts: Vec<Post>,
        /// Optional output-directory override.
        output_dir: Option<String>,
    },

    /// Diagnostic log lines.
    Log {
        /// Formatted log lines.
        lines: Vec<String>,
        /// Optional output-directory override.
        output_dir: Option<String>,
    },

    /// Raw-content dump (verbose diagnostics).
    Dump {
        /// Target filename.
        filename: String,
        /// File content.
        content: String,
        /// Optional output-directory override.
        output_dir: Option<String>,
    },

    /// Validates that the sink can write to a directory.
    TestPath {
        /// Directory to validate.
        output_dir: String,
    },

    /// Probes the sink's media-encoder capability.
    CheckEncoder,

    /// Starts a video download on the sink.
    DownloadStart {
        /// Canonical post URL.
        post_url: String,
        /// Best direct media URL, when known.
        direct_url: Option<String>,
        /// Post creation date, for output naming.
        post_date: Option<String>,
        /// Optional output-directory override.
        output_dir: Option<String>,
    },

    /// Polls the status of a running download.
    DownloadStatus {
        /// Download id returned by `DownloadStart`.
        download_id: String,
    },
}

impl SinkMessage {
    /// Short name for logging.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Posts { .. } => "posts",
            Self::Log { .. } => "log",
            Self::Dump { .. } => "dump",
            Self::TestPath { .. } => "test_path",
            Self::CheckEncoder => "check_encoder",
            Self::DownloadStart { .. } => "download_start",
            Self::DownloadStatus { .. } => "download_status",
        }
    }

    /// Whether this message may be delivered over the secondary transport.
    ///
    /// Download control and the encoder probe are HTTP-only: the companion
    /// process cannot track long-running downloads across its one-shot
    /// round trips.
    pub fn supports_native_fallback(&self) -> bool {
        matches!(
            self,
            Self::Posts { .. } | Self::Log { .. } | Self::Dump { .. } | Self::TestPath { .. }
        )
    }

    /// The HTTP route and JSON body for this message.
    pub fn http_route(&self) -> (&'static str, Value) {
        match self {
            Self::Posts { posts, output_dir } => {
                let mut body = json!({ "posts": posts });
                attach_output_dir(&mut body, output_dir.as_deref());
                ("/posts", body)
            }
            Self::Log { lines, output_dir } => {
                let mut body = json!({ "lines": lines });
                attach_output_dir(&mut body, output_dir.as_deref());
                ("/log", body)
            }
            Self::Dump {
                filename,
                content,
                output_dir,
            } => {
                let mut body = json!({ "filename": filename, "content": content });
                attach_output_dir(&mut body, output_dir.as_deref());
                ("/dump", body)
            }
            Self::TestPath { output_dir } => ("/test-path", json!({ "outputDir": output_dir })),
            Self::CheckEncoder => ("/check-encoder", json!({})),
            Self::DownloadStart {
                post_url,
                direct_url,
                post_date,
                output_dir,
            } => {
                let mut body = json!({
                    "postUrl": post_url,
                    "directUrl": direct_url,
                    "postDate": post_date,
                });
                attach_output_dir(&mut body, output_dir.as_deref());
                ("/download-video", body)
            }
            Self::DownloadStatus { download_id } => {
                ("/download-status", json!({ "downloadId": download_id }))
            }
        }
    }

    /// The framed JSON object sent to the native companion process.
    ///
    /// Bulk post delivery is the untyped default; every other kind carries
    /// an explicit `type` tag.
    pub fn native_frame(&self) -> Value {
        match self {
            Self::Posts { posts, output_dir } => {
                let mut frame = json!({ "posts": posts });
                attach_output_dir(&mut frame, output_dir.as_deref());
                frame
            }
            Self::Log { lines, output_dir } => {
                let mut frame = json!({ "type": "LOG", "lines": lines });
                attach_output_dir(&mut frame, output_dir.as_deref());
                frame
            }
            Self::Dump {
                filename,
                content,
                output_dir,
            } => {
                let mut frame = json!({
                    "type": "DUMP",
                    "filename": filename,
                    "content": content,
                });
                attach_output_dir(&mut frame, output_dir.as_deref());
                frame
            }
            Self::TestPath { output_dir } => {
                json!({ "type": "TEST_PATH", "outputDir": output_dir })
            }
            Self::CheckEncoder => json!({ "type": "CHECK_ENCODER" }),
            Self::DownloadStart {
                post_url,
                direct_url,
                post_date,
                output_dir,
            } => {
                let mut frame = json!({
                    "type": "DOWNLOAD_VIDEO",
                    "postUrl": post_url,
                    "directUrl": direct_url,
                    "postDate": post_date,
                });
                attach_output_dir(&mut frame, output_dir.as_deref());
                frame
            }
            Self::DownloadStatus { download_id } => {
                json!({ "type": "DOWNLOAD_STATUS", "downloadId": download_id })
            }
        }
    }
}

fn attach_output_dir(body: &mut Value, output_dir: Option<&str>) {
    if let (Some(dir), Some(obj)) = (output_dir, body.as_object_mut()) {
        if !dir.is_empty() {
            obj.insert("outputDir".to_string(), Value::String(dir.to_string()));
        }
    }
}

// ============================================================================
// Sink Reply
// ============================================================================

/// The sink's uniform reply shape.
///
/// Every route answers `{ok: bool, error?: string}` plus operation-specific
/// fields, which are preserved in `extra` for pass-through to the control
/// surface.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SinkReply {
    /// Whether the sink accepted the message.
    #[serde(default)]
    pub ok: bool,

    /// Error text when `ok` is false.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Download id, for download-start replies.
    #[serde(skip_serializing_if = "Option::is_none", rename = "downloadId")]
    pub download_id: Option<String>,

    /// Download state (`running`, `done`, `error`), for status polls.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,

    /// Any operation-specific fields not modeled above.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SinkReply {
    /// A successful reply with no extra fields.
    pub fn accepted() -> Self {
        Self {
            ok: true,
            ..Self::default()
        }
    }

    /// A rejection with the given error text.
    pub fn rejected(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            error: Some(error.into()),
            ..Self::default()
        }
    }

    /// True when the reply marks a finished (successful or failed) download.
    pub fn download_finished(&self) -> bool {
        matches!(self.status.as_deref(), Some("done") | Some("error"))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_posts_route_carries_output_dir() {
        let msg = SinkMessage::Posts {
            posts: vec![],
            output_dir: Some("/data/capture".to_string()),
        };
        let (path, body) = msg.http_route();
        assert_eq!(path, "/posts");
        assert_eq!(body["outputDir"], "/data/capture");
        assert!(body["posts"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_empty_output_dir_is_omitted() {
        let msg = SinkMessage::Log {
            lines: vec!["line".to_string()],
            output_dir: Some(String::new()),
        };
        let (_, body) = msg.http_route();
        assert!(body.get("outputDir").is_none());
    }

    #[test]
    fn test_fallback_eligibility() {
        let posts = SinkMessage::Posts {
            posts: vec![],
            output_dir: None,
        };
        let download = SinkMessage::DownloadStatus {
            download_id: "d1".to_string(),
        };
        assert!(posts.supports_native_fallback());
        assert!(!download.supports_native_fallback());
        assert!(!SinkMessage::CheckEncoder.supports_native_fallback());
    }

    #[test]
    fn test_native_frame_type_tags() {
        let msg = SinkMessage::TestPath {
            output_dir: "/tmp/out".to_string(),
        };
        assert_eq!(msg.native_frame()["type"], "TEST_PATH");

        let bulk = SinkMessage::Posts {
            posts: vec![],
            output_dir: None,
        };
        assert!(bulk.native_frame().get("type").is_none());
    }

    #[test]
    fn test_reply_parses_extra_fields() {
        let reply: SinkReply = serde_json::from_str(
            r#"{"ok": true, "downloadId": "d42", "progress": 0.5}"#,
        )
        .unwrap();
        assert!(reply.ok);
        assert_eq!(reply.download_id.as_deref(), Some("d42"));
        assert_eq!(reply.extra["progress"], 0.5);
        assert!(!reply.download_finished());

        let done: SinkReply = serde_json::from_str(r#"{"ok": true, "status": "done"}"#).unwrap();
        assert!(done.download_finished());
    }
}
