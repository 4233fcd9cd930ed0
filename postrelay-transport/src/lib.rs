// Lint configuration for this crate
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # `PostRelay` Transport
//!
//! Transport selection, credential bootstrap, and failover for sink
//! delivery.
//!
//! Two transports reach the sink: a local HTTP daemon (primary) and a
//! native companion process spoken to over length-prefixed JSON frames
//! (secondary). The [`TransportManager`] owns the state machine that
//! discovers, authenticates, health-checks, and fails over between them,
//! with exponential backoff and periodic recovery probing.
//!
//! ## Key Types
//!
//! - [`TransportManager`] - The resilience state machine
//! - [`HttpSink`] - Primary transport client
//! - [`NativeHost`] - Secondary transport (companion process round trips)
//! - [`Credentials`] / [`CredentialCache`] - Bootstrap credential pair and
//!   its persistence seam
//! - [`BootstrapBackoff`] - Exponential backoff with jitter

pub mod backoff;
pub mod credentials;
pub mod error;
pub mod http;
pub mod manager;
pub mod native;

pub use backoff::BootstrapBackoff;
pub use credentials::{CredentialCache, Credentials, NullCredentialCache};
pub use error::{HostError, TransportError};
pub use http::HttpSink;
pub use manager::{PrimaryTransport, SecondaryTransport, TransportManager};
pub use native::NativeHost;
