//! Primary transport: the local HTTP sink daemon.

use postrelay_core::{SinkMessage, SinkReply};
use reqwest::{Client, header};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use crate::credentials::Credentials;
use crate::error::TransportError;

/// Timeout for delivery requests.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Timeout for the unauthenticated health probe.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(3);

/// Timeout for the credential-discovery round trip.
pub const DISCOVERY_TIMEOUT: Duration = Duration::from_secs(3);

// ============================================================================
// HTTP Sink
// ============================================================================

/// Client for the local HTTP sink daemon.
///
/// All routes live on `127.0.0.1`; delivery requests carry the bootstrap
/// bearer token, the health probe and discovery endpoint do not.
#[derive(Debug, Clone)]
pub struct HttpSink {
    client: Client,
}

impl HttpSink {
    /// Creates a new sink client.
    pub fn new() -> Result<Self, TransportError> {
        let client = Client::builder()
            .user_agent(concat!("postrelay/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }

    /// Delivers a message and parses the sink's uniform reply shape.
    pub async fn send(
        &self,
        msg: &SinkMessage,
        credentials: &Credentials,
    ) -> Result<SinkReply, TransportError> {
        let (path, body) = msg.http_route();
        let url = format!("http://127.0.0.1:{}{path}", credentials.port);
        debug!(kind = msg.kind_name(), %url, "Sending to HTTP sink");

        let response = self
            .client
            .post(&url)
            .timeout(REQUEST_TIMEOUT)
            .header(
                header::AUTHORIZATION,
                format!("Bearer {}", credentials.token),
            )
            .json(&body)
            .send()
            .await
            .map_err(classify)?;

        let reply = response.json::<SinkReply>().await.map_err(classify)?;
        Ok(reply)
    }

    /// Health-probes a daemon port. Any failure is "not alive".
    pub async fn probe(&self, port: u16) -> bool {
        #[derive(Deserialize)]
        struct StatusBody {
            #[serde(default)]
            ok: bool,
        }

        let url = format!("http://127.0.0.1:{port}/status");
        let result = self
            .client
            .get(&url)
            .timeout(PROBE_TIMEOUT)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status);

        match result {
            Ok(response) => response
                .json::<StatusBody>()
                .await
                .map(|body| body.ok)
                .unwrap_or(false),
            Err(e) => {
                debug!(port, error = %e, "Sink probe failed");
                false
            }
        }
    }

    /// Asks the daemon's discovery endpoint for a fresh credential pair.
    pub async fn request_token(&self, port: u16) -> Option<Credentials> {
        #[derive(Deserialize)]
        struct BootstrapBody {
            #[serde(default)]
            ok: bool,
            token: Option<String>,
            port: Option<u16>,
        }

        let url = format!("http://127.0.0.1:{port}/bootstrap-token");
        let body = self
            .client
            .get(&url)
            .timeout(DISCOVERY_TIMEOUT)
            .send()
            .await
            .ok()?
            .json::<BootstrapBody>()
            .await
            .ok()?;

        if body.ok {
            if let (Some(token), Some(port)) = (body.token, body.port) {
                return Some(Credentials::new(token, port));
            }
        }
        None
    }
}

/// Maps reqwest timeouts onto the explicit timeout variant.
fn classify(e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout(REQUEST_TIMEOUT.as_secs())
    } else {
        TransportError::Http(e)
    }
}
