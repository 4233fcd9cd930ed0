//! The agent: capture handling, delivery pipeline, and command dispatch.

use chrono::Utc;
use postrelay_core::{SinkMessage, StatusReport};
use postrelay_store::{PersistedState, StateStore};
use postrelay_transport::TransportManager;
use postrelay_transport::manager::RECOVERY_TICK_INTERVAL;
use rand::Rng;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use crate::command::{Command, CommandReply, VideoLookupReply};
use crate::diag::{DiagnosticBuffer, summarize_shape};
use crate::ingest::IngestBuffer;

/// Base interval of the scheduled flush.
pub const FLUSH_INTERVAL: Duration = Duration::from_secs(30);

// ============================================================================
// Agent Handle
// ============================================================================

/// One request into the agent task.
pub struct AgentRequest {
    /// The command to run.
    pub command: Command,
    /// Where the reply goes. Capture events reply `None`.
    pub reply: oneshot::Sender<Option<CommandReply>>,
}

/// Cloneable sender half of the agent's command channel.
#[derive(Clone)]
pub struct AgentHandle {
    tx: mpsc::Sender<AgentRequest>,
}

impl AgentHandle {
    /// Sends a command and waits for its reply.
    ///
    /// Returns `None` when the command produces no reply or the agent has
    /// shut down.
    pub async fn request(&self, command: Command) -> Option<CommandReply> {
        let (tx, rx) = oneshot::channel();
        self.tx
            .send(AgentRequest { command, reply: tx })
            .await
            .ok()?;
        rx.await.ok().flatten()
    }
}

// ============================================================================
// Agent
// ============================================================================

/// Orchestrates capture, batching, delivery, and the command surface.
///
/// All state is owned here and mutated only from the single agent task;
/// network round trips and timers are the only suspension points.
pub struct Agent {
    store: StateStore,
    transport: TransportManager,
    buffer: IngestBuffer,
    diagnostics: DiagnosticBuffer,
    capture_enabled: bool,
    output_dir: String,
    debug_logging: bool,
    verbose_logging: bool,
    verbose_dump_endpoint: Option<String>,
    verbose_dump_ids: Vec<String>,
    all_time_count: u64,
    /// Post id → download id for in-flight downloads, so the control
    /// surface can resume polling after reconnecting.
    active_downloads: HashMap<String, String>,
}

impl Agent {
    /// Builds an agent from persisted state.
    pub async fn new(
        store: StateStore,
        mut transport: TransportManager,
        diagnostics: DiagnosticBuffer,
    ) -> Self {
        let state = store.state().await;

        let mut buffer = IngestBuffer::new();
        buffer.restore_seen(state.seen_ids.clone());
        diagnostics.set_enabled(state.debug_logging);
        transport.set_allow_native_fallback(state.allow_native_fallback);

        Self {
            store,
            transport,
            buffer,
            diagnostics,
            capture_enabled: state.capture_enabled,
            output_dir: state.output_dir,
            debug_logging: state.debug_logging,
            verbose_logging: state.verbose_logging,
            verbose_dump_endpoint: state.verbose_dump_endpoint,
            verbose_dump_ids: state.verbose_dump_ids,
            all_time_count: state.all_time_count,
            active_downloads: HashMap::new(),
        }
    }

    /// Creates the command channel.
    pub fn channel(capacity: usize) -> (AgentHandle, mpsc::Receiver<AgentRequest>) {
        let (tx, rx) = mpsc::channel(capacity);
        (AgentHandle { tx }, rx)
    }

    /// Initializes the transport (cached-credential fast path or first
    /// bootstrap).
    pub async fn init(&mut self) {
        self.transport.init().await;
    }

    /// Current status snapshot.
    pub fn status(&self) -> StatusReport {
        StatusReport {
            capture_enabled: self.capture_enabled,
            session_count: self.buffer.session_count(),
            all_time_count: self.all_time_count,
            connected: self.transport.state().is_connected(),
            buffered: self.buffer.buffered(),
            output_dir: self.output_dir.clone(),
            debug_logging: self.debug_logging,
            verbose_logging: self.verbose_logging,
            allow_native_fallback: self.transport.allow_native_fallback(),
            transport_state: self.transport.state(),
        }
    }

    // ========================================================================
    // Driver Loop
    // ========================================================================

    /// Runs the agent until the command channel closes.
    pub async fn run(mut self, mut requests: mpsc::Receiver<AgentRequest>) {
        let mut recovery = tokio::time::interval(RECOVERY_TICK_INTERVAL);
        recovery.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        let mut next_flush = Instant::now() + jittered_flush_delay();

        info!("Agent started");
        loop {
            tokio::select! {
                request = requests.recv() => {
                    match request {
                        Some(AgentRequest { command, reply }) => {
                            let result = self.handle_command(command).await;
                            let _ = reply.send(result);
                        }
                        None => break,
                    }
                }
                _ = recovery.tick() => {
                    self.transport.recovery_tick();
                }
                () = tokio::time::sleep_until(next_flush.into()) => {
                    self.scheduled_flush().await;
                    next_flush = Instant::now() + jittered_flush_delay();
                }
                () = bootstrap_due(self.transport.next_bootstrap_at()) => {
                    self.transport.run_scheduled_bootstrap().await;
                }
            }
        }

        // Best-effort drain before exit; whatever the sink does not take
        // now is lost with the process.
        self.flush().await;
        info!("Agent stopped");
    }

    // ========================================================================
    // Command Dispatch
    // ========================================================================

    /// Runs one command to completion.
    pub async fn handle_command(&mut self, command: Command) -> Option<CommandReply> {
        match command {
            Command::Capture { endpoint, payload } => {
                self.handle_capture(&endpoint, &payload).await;
                None
            }
            Command::GetStatus => Some(CommandReply::Status(self.status())),
            Command::ToggleCapture => {
                self.capture_enabled = !self.capture_enabled;
                self.persist_capture_state().await;
                Some(CommandReply::setting(
                    json!({ "capture_enabled": self.capture_enabled }),
                ))
            }
            Command::SetDebug { enabled } => {
                self.debug_logging = enabled;
                self.diagnostics.set_enabled(enabled);
                self.persist(|s| s.debug_logging = enabled).await;
                Some(CommandReply::setting(json!({ "debug_logging": enabled })))
            }
            Command::SetVerbose { enabled } => {
                self.verbose_logging = enabled;
                self.persist(|s| s.verbose_logging = enabled).await;
                Some(CommandReply::setting(json!({ "verbose_logging": enabled })))
            }
            Command::SetOutputDir { output_dir } => Some(self.set_output_dir(output_dir).await),
            Command::SetTransportPrefs {
                allow_native_fallback,
            } => {
                self.transport.set_allow_native_fallback(allow_native_fallback);
                self.persist(|s| s.allow_native_fallback = allow_native_fallback)
                    .await;
                Some(CommandReply::setting(
                    json!({ "ok": true, "allow_native_fallback": allow_native_fallback }),
                ))
            }
            Command::ForceRetry => {
                self.transport.force_retry();
                Some(CommandReply::setting(json!({ "ok": true })))
            }
            Command::VideoLookup { post_id } => {
                Some(CommandReply::Video(self.video_lookup(&post_id)))
            }
            Command::CheckEncoder => Some(self.passthrough(&SinkMessage::CheckEncoder).await),
            Command::DownloadStart {
                post_id,
                post_url,
                direct_url,
                post_date,
            } => Some(self.download_start(post_id, post_url, direct_url, post_date).await),
            Command::DownloadStatus { download_id } => {
                Some(self.download_status(download_id).await)
            }
        }
    }

    // ========================================================================
    // Capture Path
    // ========================================================================

    /// Normalizes and enqueues a raw capture event. Never fails the caller:
    /// a malformed payload yields zero records and capture continues.
    async fn handle_capture(&mut self, endpoint: &str, payload: &Value) {
        if self.verbose_logging {
            info!(endpoint, shape = %summarize_shape(payload), "Payload shape");
            self.maybe_dump(endpoint, payload).await;
        }
        if !self.capture_enabled {
            return;
        }
        if postrelay_extract::is_ignored_endpoint(endpoint) {
            if self.verbose_logging {
                debug!(endpoint, "Endpoint ignored");
            }
            return;
        }

        let mut posts = postrelay_extract::extract(endpoint, payload);
        if posts.is_empty() {
            return;
        }
        for post in &mut posts {
            post.source_endpoint = Some(endpoint.to_string());
        }

        // Early-warning signal for upstream schema drift.
        let missing_author = posts.iter().filter(|p| p.author.handle.is_none()).count();
        let missing_text = posts.iter().filter(|p| p.text.is_empty()).count();
        info!(
            endpoint,
            count = posts.len(),
            missing_author,
            missing_text,
            "Captured posts"
        );

        let outcome = self.buffer.enqueue(posts);
        if outcome.accepted > 0 {
            self.all_time_count += outcome.accepted as u64;
            self.persist_capture_state().await;
        }
        if outcome.flush_due {
            self.flush().await;
        }
    }

    /// Forwards a raw payload to the sink as a dump when the verbose dump
    /// configuration matches it.
    async fn maybe_dump(&mut self, endpoint: &str, payload: &Value) {
        let by_endpoint = self.verbose_dump_endpoint.as_deref() == Some(endpoint);
        let matched = by_endpoint
            || (!self.verbose_dump_ids.is_empty() && {
                let serialized = payload.to_string();
                self.verbose_dump_ids.iter().any(|id| serialized.contains(id))
            });
        if !matched {
            return;
        }

        let filename = format!("dump-{endpoint}-{}.json", Utc::now().timestamp_millis());
        let content = serde_json::to_string_pretty(payload).unwrap_or_default();
        info!(endpoint, filename = %filename, bytes = content.len(), "Dumping payload");
        let msg = SinkMessage::Dump {
            filename,
            content,
            output_dir: self.output_dir_override(),
        };
        // Dumps are best-effort diagnostics.
        let _ = self.transport.deliver(&msg).await;
    }

    // ========================================================================
    // Flushing
    // ========================================================================

    /// Delivers the pending batch, restoring it at the front of the buffer
    /// on transport failure. An explicit sink rejection is reported but not
    /// retried: the sink refused the data, and resending the same payload
    /// needs operator intervention first.
    pub async fn flush(&mut self) {
        if self.buffer.buffered() > 0 {
            let batch = self.buffer.take_batch();
            let count = batch.len();
            let msg = SinkMessage::Posts {
                posts: batch,
                output_dir: self.output_dir_override(),
            };

            match self.transport.deliver(&msg).await {
                Some(reply) if !reply.ok => {
                    error!(error = ?reply.error, count, "Sink rejected batch");
                }
                Some(_) => {
                    debug!(count, "Batch delivered");
                }
                None => {
                    warn!(count, "Delivery failed, restoring batch to buffer");
                    if let SinkMessage::Posts { posts, .. } = msg {
                        self.buffer.restore_batch(posts);
                    }
                }
            }
        }

        if self.debug_logging {
            self.flush_logs().await;
        }
    }

    /// Fires on the flush interval; only does work when something is
    /// buffered.
    async fn scheduled_flush(&mut self) {
        let logs_pending = self.debug_logging && !self.diagnostics.is_empty();
        if self.buffer.buffered() > 0 || logs_pending {
            self.flush().await;
        }
    }

    /// Delivers buffered diagnostic lines. Log lines are best-effort: a
    /// failed delivery drops them rather than re-buffering reports about
    /// the failure itself.
    async fn flush_logs(&mut self) {
        let lines = self.diagnostics.drain();
        if lines.is_empty() {
            return;
        }
        let msg = SinkMessage::Log {
            lines,
            output_dir: self.output_dir_override(),
        };
        let _ = self.transport.deliver(&msg).await;
    }

    // ========================================================================
    // Configuration Commands
    // ========================================================================

    /// Validates a new output directory against the sink before accepting
    /// it. A rejected path leaves the prior directory unchanged.
    async fn set_output_dir(&mut self, output_dir: String) -> CommandReply {
        if !output_dir.is_empty() {
            let msg = SinkMessage::TestPath {
                output_dir: output_dir.clone(),
            };
            match self.transport.deliver(&msg).await {
                Some(reply) if reply.ok => {}
                Some(reply) => {
                    return CommandReply::Error {
                        error: reply
                            .error
                            .unwrap_or_else(|| "Cannot write to that directory".to_string()),
                    };
                }
                None => {
                    return CommandReply::Error {
                        error: "Sink unreachable for path test".to_string(),
                    };
                }
            }
        }

        self.output_dir = output_dir;
        let accepted = self.output_dir.clone();
        self.persist(move |s| s.output_dir = accepted).await;
        CommandReply::setting(json!({ "output_dir": self.output_dir }))
    }

    // ========================================================================
    // Video & Download Commands
    // ========================================================================

    /// Answers a video lookup from the recent-post cache.
    fn video_lookup(&self, post_id: &str) -> VideoLookupReply {
        let Some(post) = self.buffer.recent(post_id) else {
            return VideoLookupReply::default();
        };
        let Some(media) = post.video_media() else {
            return VideoLookupReply::default();
        };

        VideoLookupReply {
            has_video: true,
            post_url: Some(format!("https://x.com/i/status/{post_id}")),
            direct_url: media.url.clone(),
            media_type: Some(media.kind),
            duration_ms: media.duration_ms,
            post_date: post.created_at.clone(),
            active_download_id: self.active_downloads.get(post_id).cloned(),
        }
    }

    /// Starts a download on the sink and tracks it as in-flight.
    async fn download_start(
        &mut self,
        post_id: Option<String>,
        post_url: String,
        direct_url: Option<String>,
        post_date: Option<String>,
    ) -> CommandReply {
        let msg = SinkMessage::DownloadStart {
            post_url,
            direct_url,
            post_date,
            output_dir: self.output_dir_override(),
        };
        match self.transport.deliver(&msg).await {
            Some(reply) => {
                if reply.ok {
                    if let (Some(post_id), Some(download_id)) =
                        (post_id, reply.download_id.clone())
                    {
                        self.active_downloads.insert(post_id, download_id);
                    }
                }
                CommandReply::Sink(reply)
            }
            None => CommandReply::no_transport(),
        }
    }

    /// Polls a download, dropping it from the in-flight map once finished.
    async fn download_status(&mut self, download_id: String) -> CommandReply {
        let msg = SinkMessage::DownloadStatus {
            download_id: download_id.clone(),
        };
        match self.transport.deliver(&msg).await {
            Some(reply) => {
                if reply.download_finished() {
                    self.active_downloads.retain(|_, did| *did != download_id);
                }
                CommandReply::Sink(reply)
            }
            None => CommandReply::no_transport(),
        }
    }

    /// Pass-through of an HTTP-only sink operation.
    async fn passthrough(&mut self, msg: &SinkMessage) -> CommandReply {
        match self.transport.deliver(msg).await {
            Some(reply) => CommandReply::Sink(reply),
            None => CommandReply::no_transport(),
        }
    }

    // ========================================================================
    // Persistence
    // ========================================================================

    /// Persists counters, dedup snapshot, and the capture flag.
    async fn persist_capture_state(&self) {
        let seen_ids = self.buffer.seen_snapshot();
        let all_time_count = self.all_time_count;
        let capture_enabled = self.capture_enabled;
        self.persist(move |s| {
            s.seen_ids = seen_ids;
            s.all_time_count = all_time_count;
            s.capture_enabled = capture_enabled;
        })
        .await;
    }

    /// Applies a state mutation; persistence failures degrade to a warning.
    async fn persist<F>(&self, mutate: F)
    where
        F: FnOnce(&mut PersistedState),
    {
        if let Err(e) = self.store.update(mutate).await {
            warn!(error = %e, "Failed to persist state");
        }
    }

    fn output_dir_override(&self) -> Option<String> {
        if self.output_dir.is_empty() {
            None
        } else {
            Some(self.output_dir.clone())
        }
    }
}

// ============================================================================
// Timers
// ============================================================================

/// The flush interval plus up to 50% random jitter, so multiple capture
/// sessions do not flush against the daemon in lockstep.
fn jittered_flush_delay() -> Duration {
    FLUSH_INTERVAL + FLUSH_INTERVAL.mul_f64(rand::thread_rng().gen_range(0.0..0.5))
}

/// Pends until the scheduled bootstrap entry is due; pends forever when
/// none is scheduled.
async fn bootstrap_due(at: Option<Instant>) {
    match at {
        Some(at) => tokio::time::sleep_until(at.into()).await,
        None => std::future::pending().await,
    }
}
