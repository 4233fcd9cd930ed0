//! Diagnostic log buffering and verbose payload summaries.
//!
//! When debug logging is on, every tracing event is mirrored into an
//! in-memory line buffer that the pipeline periodically flushes to the sink
//! as a diagnostic-log delivery. Disabling debug clears any pending lines.

use chrono::{SecondsFormat, Utc};
use serde_json::Value;
use std::fmt::Write as _;
use std::sync::{Arc, Mutex};
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, Layer};

// ============================================================================
// Diagnostic Buffer
// ============================================================================

#[derive(Debug, Default)]
struct Inner {
    enabled: bool,
    lines: Vec<String>,
}

/// Shared buffer of formatted diagnostic log lines.
#[derive(Debug, Clone, Default)]
pub struct DiagnosticBuffer {
    inner: Arc<Mutex<Inner>>,
}

impl DiagnosticBuffer {
    /// Creates an empty, disabled buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enables or disables buffering. Disabling clears pending lines.
    pub fn set_enabled(&self, enabled: bool) {
        let Ok(mut inner) = self.inner.lock() else {
            return;
        };
        inner.enabled = enabled;
        if !enabled {
            inner.lines.clear();
        }
    }

    /// Whether buffering is enabled.
    pub fn enabled(&self) -> bool {
        self.inner.lock().map(|i| i.enabled).unwrap_or(false)
    }

    /// Appends a line when buffering is enabled.
    pub fn push(&self, line: String) {
        let Ok(mut inner) = self.inner.lock() else {
            return;
        };
        if inner.enabled {
            inner.lines.push(line);
        }
    }

    /// Removes and returns all pending lines.
    pub fn drain(&self) -> Vec<String> {
        self.inner
            .lock()
            .map(|mut i| std::mem::take(&mut i.lines))
            .unwrap_or_default()
    }

    /// Whether any lines are pending.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().map(|i| i.lines.is_empty()).unwrap_or(true)
    }
}

// ============================================================================
// Buffer Layer
// ============================================================================

/// A `tracing-subscriber` layer mirroring events into a [`DiagnosticBuffer`].
pub struct BufferLayer {
    buffer: DiagnosticBuffer,
}

impl BufferLayer {
    /// Creates a layer writing into the given buffer.
    pub fn new(buffer: DiagnosticBuffer) -> Self {
        Self { buffer }
    }
}

impl<S: Subscriber> Layer<S> for BufferLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        if !self.buffer.enabled() {
            return;
        }

        let mut visitor = LineVisitor::default();
        event.record(&mut visitor);

        let line = format!(
            "{} [{}] {}{}",
            Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            event.metadata().level(),
            visitor.message,
            visitor.fields,
        );
        self.buffer.push(line);
    }
}

#[derive(Default)]
struct LineVisitor {
    message: String,
    fields: String,
}

impl Visit for LineVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{value:?}");
        } else {
            let _ = write!(self.fields, " {}={:?}", field.name(), value);
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            let _ = write!(self.fields, " {}={value}", field.name());
        }
    }
}

// ============================================================================
// Shape Summaries
// ============================================================================

/// Maximum depth a shape summary descends.
const SUMMARY_DEPTH: usize = 3;

/// Keys shown per object before eliding.
const SUMMARY_KEYS: usize = 12;

/// Strings longer than this are shown as `str(len)`.
const SUMMARY_STR_LEN: usize = 80;

/// Summarizes the structure of a payload for verbose diagnostics.
///
/// Bounded in depth and width so a multi-megabyte payload reduces to one
/// legible line; long strings are elided to their length.
pub fn summarize_shape(value: &Value) -> String {
    shape(value, 0)
}

fn shape(value: &Value, depth: usize) -> String {
    if depth >= SUMMARY_DEPTH {
        return match value {
            Value::Array(_) => "[…]".to_string(),
            Value::Object(_) => "{…}".to_string(),
            Value::Null => "null".to_string(),
            Value::Bool(_) => "boolean".to_string(),
            Value::Number(_) => "number".to_string(),
            Value::String(_) => "string".to_string(),
        };
    }

    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => {
            if s.len() > SUMMARY_STR_LEN {
                format!("str({})", s.len())
            } else {
                format!("{s:?}")
            }
        }
        Value::Array(items) => {
            if items.is_empty() {
                "[]".to_string()
            } else {
                format!("[{}× {}]", items.len(), shape(&items[0], depth + 1))
            }
        }
        Value::Object(map) => {
            if map.is_empty() {
                return "{}".to_string();
            }
            let mut entries: Vec<String> = map
                .iter()
                .take(SUMMARY_KEYS)
                .map(|(k, v)| format!("{k}: {}", shape(v, depth + 1)))
                .collect();
            if map.len() > SUMMARY_KEYS {
                entries.push(format!("…+{} more", map.len() - SUMMARY_KEYS));
            }
            format!("{{ {} }}", entries.join(", "))
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_buffer_ignores_lines_when_disabled() {
        let buffer = DiagnosticBuffer::new();
        buffer.push("dropped".to_string());
        assert!(buffer.is_empty());

        buffer.set_enabled(true);
        buffer.push("kept".to_string());
        assert_eq!(buffer.drain(), vec!["kept"]);
    }

    #[test]
    fn test_disabling_clears_pending_lines() {
        let buffer = DiagnosticBuffer::new();
        buffer.set_enabled(true);
        buffer.push("pending".to_string());
        buffer.set_enabled(false);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_layer_formats_events() {
        use tracing_subscriber::prelude::*;

        let buffer = DiagnosticBuffer::new();
        buffer.set_enabled(true);
        let subscriber = tracing_subscriber::registry().with(BufferLayer::new(buffer.clone()));

        tracing::subscriber::with_default(subscriber, || {
            tracing::warn!(endpoint = "HomeTimeline", "parse failed");
        });

        let lines = buffer.drain();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains("[WARN]"));
        assert!(lines[0].contains("parse failed"));
        assert!(lines[0].contains("endpoint=HomeTimeline"));
    }

    #[test]
    fn test_shape_summary_bounds_depth() {
        let value = json!({ "a": { "b": { "c": { "d": 1 } } } });
        assert_eq!(summarize_shape(&value), r#"{ a: { b: { c: {…} } } }"#);
    }

    #[test]
    fn test_shape_summary_arrays_and_strings() {
        let value = json!({
            "items": [ { "id": "1" }, { "id": "2" } ],
            "note": "x".repeat(100),
        });
        let summary = summarize_shape(&value);
        assert!(summary.contains(r#"items: [2× { id: "1" }]"#));
        assert!(summary.contains("note: str(100)"));
    }

    #[test]
    fn test_shape_summary_elides_wide_objects() {
        let mut map = serde_json::Map::new();
        for i in 0..15 {
            map.insert(format!("k{i:02}"), json!(i));
        }
        let summary = summarize_shape(&Value::Object(map));
        assert!(summary.contains("…+3 more"));
    }
}
