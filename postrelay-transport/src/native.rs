//! Secondary transport: the native companion process.
//!
//! Each round trip spawns the companion, writes one length-prefixed JSON
//! frame (4-byte little-endian length + UTF-8 payload) to its stdin, and
//! reads one framed reply from its stdout. The child is released after the
//! reply; there is no persistent connection to keep healthy.

use postrelay_core::SinkReply;
use serde_json::{Value, json};
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tracing::{debug, warn};

use crate::credentials::Credentials;
use crate::error::HostError;

/// Default companion binary name, resolved on PATH.
pub const DEFAULT_HOST_PROGRAM: &str = "postrelay-host";

/// Timeout for a delivery round trip.
pub const SEND_TIMEOUT: Duration = Duration::from_secs(8);

/// Timeout for a credential round trip.
pub const TOKEN_TIMEOUT: Duration = Duration::from_secs(5);

/// Ceiling on reply frames. Anything larger is a protocol violation.
const MAX_FRAME_BYTES: u32 = 64 * 1024 * 1024;

// ============================================================================
// Native Host
// ============================================================================

/// Companion-process transport.
#[derive(Debug, Clone)]
pub struct NativeHost {
    program: PathBuf,
}

impl NativeHost {
    /// Creates a transport for an explicit companion binary path.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Locates the default companion binary on PATH.
    pub fn locate() -> Option<Self> {
        which::which(DEFAULT_HOST_PROGRAM).ok().map(Self::new)
    }

    /// Sends one frame and waits for the framed reply.
    pub async fn round_trip(
        &self,
        frame: &Value,
        timeout: Duration,
    ) -> Result<SinkReply, HostError> {
        match tokio::time::timeout(timeout, self.round_trip_inner(frame)).await {
            Ok(result) => result,
            Err(_) => {
                // The child is abandoned (killed on drop); a late reply on
                // the pipe is never read.
                warn!(timeout = ?timeout, "Companion host round trip timed out");
                Err(HostError::Timeout(timeout))
            }
        }
    }

    /// Asks the companion for a credential pair.
    pub async fn request_token(&self, timeout: Duration) -> Option<Credentials> {
        let reply = match self.round_trip(&json!({ "type": "GET_TOKEN" }), timeout).await {
            Ok(reply) => reply,
            Err(e) => {
                debug!(error = %e, "Companion token round trip failed");
                return None;
            }
        };
        if !reply.ok {
            return None;
        }

        let token = reply.extra.get("token").and_then(Value::as_str)?;
        let port = reply.extra.get("port").and_then(Value::as_u64)?;
        let port = u16::try_from(port).ok()?;
        Some(Credentials::new(token, port))
    }

    async fn round_trip_inner(&self, frame: &Value) -> Result<SinkReply, HostError> {
        let mut child = Command::new(&self.program)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    HostError::NotFound(self.program.display().to_string())
                } else {
                    HostError::SpawnFailed(e.to_string())
                }
            })?;

        let mut stdin = child.stdin.take().ok_or(HostError::ClosedWithoutReply)?;
        let mut stdout = child.stdout.take().ok_or(HostError::ClosedWithoutReply)?;

        let payload = serde_json::to_vec(frame)?;
        let len = u32::try_from(payload.len())
            .map_err(|_| HostError::FrameTooLarge(u32::MAX))?;
        stdin.write_all(&len.to_le_bytes()).await?;
        stdin.write_all(&payload).await?;
        stdin.flush().await?;
        drop(stdin);

        let mut len_buf = [0u8; 4];
        if let Err(e) = stdout.read_exact(&mut len_buf).await {
            return if e.kind() == std::io::ErrorKind::UnexpectedEof {
                Err(HostError::ClosedWithoutReply)
            } else {
                Err(HostError::Io(e))
            };
        }
        let reply_len = u32::from_le_bytes(len_buf);
        if reply_len > MAX_FRAME_BYTES {
            return Err(HostError::FrameTooLarge(reply_len));
        }

        let mut reply_buf = vec![0u8; reply_len as usize];
        stdout.read_exact(&mut reply_buf).await?;
        let reply = serde_json::from_slice::<SinkReply>(&reply_buf)?;

        debug!(ok = reply.ok, bytes = reply_len, "Companion host replied");
        Ok(reply)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_program_maps_to_not_found() {
        let host = NativeHost::new("definitely_not_a_real_companion_12345");
        let result = host
            .round_trip(&json!({ "type": "TEST_PATH" }), SEND_TIMEOUT)
            .await;
        assert!(matches!(result, Err(HostError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_round_trip_against_scripted_host() {
        // The script swallows our request frame, then prints a framed
        // `{"ok":true}` reply.
        let reply = br#"{"ok":true}"#;
        let mut framed = Vec::new();
        framed.extend_from_slice(&u32::try_from(reply.len()).unwrap().to_le_bytes());
        framed.extend_from_slice(reply);

        let script = format!(
            "head -c 1000 > /dev/null; printf '{}'",
            framed
                .iter()
                .map(|b| format!("\\{:03o}", b))
                .collect::<String>()
        );
        let dir = std::env::temp_dir().join("postrelay-native-test");
        tokio::fs::create_dir_all(&dir).await.unwrap();
        let path = dir.join("fake-host.sh");
        tokio::fs::write(&path, format!("#!/bin/sh\n{script}\n"))
            .await
            .unwrap();
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = tokio::fs::metadata(&path).await.unwrap().permissions();
            perms.set_mode(0o755);
            tokio::fs::set_permissions(&path, perms).await.unwrap();
        }

        let host = NativeHost::new(&path);
        let reply = host
            .round_trip(&json!({ "type": "TEST_PATH", "outputDir": "/tmp" }), SEND_TIMEOUT)
            .await
            .unwrap();
        assert!(reply.ok);
    }
}
