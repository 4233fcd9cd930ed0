//! The transport resilience manager.
//!
//! A state machine that discovers, authenticates, health-checks, and fails
//! over between the HTTP daemon and the native companion process. Credential
//! bootstrap retries back off exponentially; a periodic recovery tick makes
//! sure a daemon that comes back up is eventually noticed even when no
//! delivery happens to trigger a retry.

use async_trait::async_trait;
use postrelay_core::{SinkMessage, SinkReply, TransportState};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::backoff::BootstrapBackoff;
use crate::credentials::{CredentialCache, Credentials};
use crate::error::{HostError, TransportError};
use crate::http::HttpSink;
use crate::native::{self, NativeHost};

/// Port the daemon's discovery endpoint listens on when no credential pair
/// is known yet.
pub const DEFAULT_DISCOVERY_PORT: u16 = 17381;

/// Interval of the recovery safety net.
pub const RECOVERY_TICK_INTERVAL: Duration = Duration::from_secs(30);

// ============================================================================
// Transport Seams
// ============================================================================

/// The primary (HTTP daemon) transport seam.
#[async_trait]
pub trait PrimaryTransport: Send + Sync {
    /// Delivers a message with the given credentials.
    async fn send(
        &self,
        msg: &SinkMessage,
        credentials: &Credentials,
    ) -> Result<SinkReply, TransportError>;

    /// Health-probes a daemon port.
    async fn probe(&self, port: u16) -> bool;

    /// Asks the discovery endpoint for a fresh credential pair.
    async fn request_token(&self, port: u16) -> Option<Credentials>;
}

#[async_trait]
impl PrimaryTransport for HttpSink {
    async fn send(
        &self,
        msg: &SinkMessage,
        credentials: &Credentials,
    ) -> Result<SinkReply, TransportError> {
        HttpSink::send(self, msg, credentials).await
    }

    async fn probe(&self, port: u16) -> bool {
        HttpSink::probe(self, port).await
    }

    async fn request_token(&self, port: u16) -> Option<Credentials> {
        HttpSink::request_token(self, port).await
    }
}

/// The secondary (companion process) transport seam.
#[async_trait]
pub trait SecondaryTransport: Send + Sync {
    /// Delivers a message via one companion round trip.
    async fn send(&self, msg: &SinkMessage) -> Result<SinkReply, HostError>;

    /// Asks the companion for a credential pair.
    async fn request_token(&self) -> Option<Credentials>;
}

#[async_trait]
impl SecondaryTransport for NativeHost {
    async fn send(&self, msg: &SinkMessage) -> Result<SinkReply, HostError> {
        self.round_trip(&msg.native_frame(), native::SEND_TIMEOUT).await
    }

    async fn request_token(&self) -> Option<Credentials> {
        NativeHost::request_token(self, native::TOKEN_TIMEOUT).await
    }
}

// ============================================================================
// Transport Manager
// ============================================================================

/// Owns transport selection, credential bootstrap, and backoff scheduling.
///
/// Exposes one `deliver` operation; everything else is lifecycle. All
/// methods run on the single agent task, so the struct holds plain state.
/// The scheduled-bootstrap timer is an explicit entry (`pending_bootstrap`,
/// the next fire time) rather than a self-rescheduling callback: a pending
/// entry suppresses new scheduling requests until the driver fires it, so
/// at most one bootstrap is ever queued.
pub struct TransportManager {
    primary: Box<dyn PrimaryTransport>,
    secondary: Box<dyn SecondaryTransport>,
    cache: Box<dyn CredentialCache>,
    backoff: BootstrapBackoff,
    state: TransportState,
    credentials: Option<Credentials>,
    allow_native_fallback: bool,
    bootstrap_attempt: u32,
    bootstrap_in_flight: bool,
    pending_bootstrap: Option<Instant>,
}

impl TransportManager {
    /// Creates a manager over the given transports and credential cache.
    pub fn new(
        primary: Box<dyn PrimaryTransport>,
        secondary: Box<dyn SecondaryTransport>,
        cache: Box<dyn CredentialCache>,
    ) -> Self {
        Self {
            primary,
            secondary,
            cache,
            backoff: BootstrapBackoff::default(),
            state: TransportState::NoTransport,
            credentials: None,
            allow_native_fallback: true,
            bootstrap_attempt: 0,
            bootstrap_in_flight: false,
            pending_bootstrap: None,
        }
    }

    /// Current transport state.
    pub fn state(&self) -> TransportState {
        self.state
    }

    /// Current credential pair, if verified.
    pub fn credentials(&self) -> Option<&Credentials> {
        self.credentials.as_ref()
    }

    /// Whether fallback to the secondary transport is permitted.
    pub fn allow_native_fallback(&self) -> bool {
        self.allow_native_fallback
    }

    /// Enables or disables secondary-transport fallback.
    ///
    /// Disabling it while currently on fallback forces a degraded-state
    /// transition immediately.
    pub fn set_allow_native_fallback(&mut self, allowed: bool) {
        self.allow_native_fallback = allowed;
        if !allowed && self.state == TransportState::NativeFallback {
            self.set_state(
                TransportState::HttpDegraded,
                "native fallback disabled by user",
            );
        }
    }

    // ========================================================================
    // Initialization
    // ========================================================================

    /// Initializes the transport at process start.
    ///
    /// Fast path: a persisted credential pair that still probes alive starts
    /// the manager directly in `HttpReady` without a bootstrap round trip.
    /// Otherwise one discovery attempt is made before entering the
    /// degraded/backoff cycle.
    pub async fn init(&mut self) {
        if let Some(cached) = self.cache.load().await {
            if self.primary.probe(cached.port).await {
                self.credentials = Some(cached);
                self.set_state(TransportState::HttpReady, "cached credentials accepted");
                return;
            }
            debug!("Cached credentials failed the health probe");
        }

        if let Some(fresh) = self.primary.request_token(self.discovery_port()).await {
            if self.primary.probe(fresh.port).await {
                self.cache.save(&fresh).await;
                self.credentials = Some(fresh);
                self.set_state(TransportState::HttpReady, "credentials from daemon discovery");
                return;
            }
        }

        // Degraded start: capture stays alive, bootstrap runs in background.
        self.set_state(
            TransportState::HttpDegraded,
            "cached credentials unavailable and daemon not reachable",
        );
        self.schedule_bootstrap(Duration::ZERO, "initial bootstrap");
    }

    // ========================================================================
    // Delivery
    // ========================================================================

    /// Delivers a message via the best available transport.
    ///
    /// Returns `None` on transport-level failure (no transport reached, or
    /// the message kind is HTTP-only and HTTP is down). A `Some` reply with
    /// `ok == false` is a sink rejection, which is the caller's concern.
    pub async fn deliver(&mut self, msg: &SinkMessage) -> Option<SinkReply> {
        if let Some(credentials) = self.credentials.clone() {
            match self.primary.send(msg, &credentials).await {
                Ok(reply) => {
                    self.set_state(TransportState::HttpReady, "HTTP delivery succeeded");
                    return Some(reply);
                }
                Err(e) => {
                    self.set_state(
                        TransportState::HttpDegraded,
                        &format!("HTTP delivery failed: {e}"),
                    );
                    self.schedule_bootstrap(Duration::ZERO, "HTTP delivery failure");
                }
            }
        }

        if msg.supports_native_fallback() {
            if !self.allow_native_fallback {
                self.set_state(
                    TransportState::HttpDegraded,
                    "native fallback disabled by user",
                );
                self.schedule_bootstrap(Duration::ZERO, "native fallback disabled");
                return None;
            }
            match self.secondary.send(msg).await {
                Ok(reply) => {
                    self.set_state(
                        TransportState::NativeFallback,
                        "using on-demand native fallback",
                    );
                    // Opportunistically return to HTTP.
                    self.schedule_bootstrap(
                        Duration::ZERO,
                        "attempt return to HTTP after native fallback",
                    );
                    return Some(reply);
                }
                Err(e) => {
                    self.set_state(
                        TransportState::NoTransport,
                        &format!("native fallback failed: {e}"),
                    );
                    return None;
                }
            }
        }

        if !self.state.is_http_ready() {
            self.set_state(
                TransportState::HttpDegraded,
                "HTTP daemon unavailable for this operation",
            );
            self.schedule_bootstrap(Duration::ZERO, "operation requires HTTP transport");
        }
        warn!(kind = msg.kind_name(), "No transport available for this operation");
        None
    }

    // ========================================================================
    // Bootstrap & Scheduling
    // ========================================================================

    /// Next fire time of the scheduled bootstrap, if one is pending.
    pub fn next_bootstrap_at(&self) -> Option<Instant> {
        self.pending_bootstrap
    }

    /// Schedules a bootstrap after `delay`.
    ///
    /// No-op when HTTP is already ready, a bootstrap is in flight, or one
    /// is already scheduled.
    pub fn schedule_bootstrap(&mut self, delay: Duration, reason: &str) {
        if self.state.is_http_ready() || self.bootstrap_in_flight || self.pending_bootstrap.is_some()
        {
            return;
        }
        debug!(delay = ?delay, reason, "Scheduling credential bootstrap");
        self.pending_bootstrap = Some(Instant::now() + delay);
    }

    /// Schedules an immediate bootstrap regardless of any pending backoff
    /// timer (manual retry from the control surface).
    pub fn force_retry(&mut self) {
        if self.state.is_http_ready() || self.bootstrap_in_flight {
            return;
        }
        info!("Manual bootstrap retry requested");
        self.pending_bootstrap = Some(Instant::now());
    }

    /// Fired on a fixed interval by the driver; the safety net that notices
    /// a daemon which became available while no delivery was happening.
    pub fn recovery_tick(&mut self) {
        if !self.state.is_http_ready() {
            self.schedule_bootstrap(Duration::ZERO, "periodic recovery tick");
        }
    }

    /// Consumes the pending timer entry and runs the bootstrap attempt.
    /// The driver calls this once the entry's fire time is reached.
    pub async fn run_scheduled_bootstrap(&mut self) {
        if self.pending_bootstrap.take().is_none() {
            return;
        }
        self.bootstrap("scheduled bootstrap").await;
    }

    /// Attempts to obtain and verify a fresh credential pair.
    ///
    /// No-op when HTTP is already ready or an attempt is in flight.
    pub async fn bootstrap(&mut self, reason: &str) {
        if self.state.is_http_ready() || self.bootstrap_in_flight {
            return;
        }
        self.bootstrap_in_flight = true;
        self.bootstrap_attempt += 1;

        let mut source = "daemon";
        let mut result = self.primary.request_token(self.discovery_port()).await;
        if result.is_none() {
            source = "companion";
            result = self.secondary.request_token().await;
        }

        // A pair is only trusted once it has answered a health probe.
        if let Some(fresh) = result {
            if self.primary.probe(fresh.port).await {
                self.cache.save(&fresh).await;
                self.credentials = Some(fresh);
                self.bootstrap_attempt = 0;
                self.bootstrap_in_flight = false;
                self.set_state(TransportState::HttpReady, reason);
                info!(source, "Credential bootstrap succeeded");
                return;
            }
        }

        let delay = self.backoff.delay_for_attempt(self.bootstrap_attempt);
        self.bootstrap_in_flight = false;
        self.set_state(TransportState::HttpDegraded, reason);
        warn!(
            attempt = self.bootstrap_attempt,
            delay = ?delay,
            "Credential bootstrap failed, retry scheduled"
        );
        self.schedule_bootstrap(delay, "retry after bootstrap failure");
    }

    fn discovery_port(&self) -> u16 {
        self.credentials
            .as_ref()
            .map_or(DEFAULT_DISCOVERY_PORT, |c| c.port)
    }

    fn set_state(&mut self, state: TransportState, reason: &str) {
        if self.state == state {
            return;
        }
        info!(from = %self.state, to = %state, reason, "Transport state changed");
        self.state = state;
    }
}

// ============================================================================
// Tests
// ============================================================================
