// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # `PostRelay` Store
//!
//! Persisted state for the `PostRelay` agent.
//!
//! One JSON file under the platform config directory holds everything that
//! survives a restart: the dedup-set snapshot, the lifetime counter, the
//! capture/diagnostic flags, the output directory, and the cached transport
//! credential pair. Session counters, buffers, and in-flight timers are
//! volatile by design and reset on restart.
//!
//! The [`StateStore`] also implements the transport crate's
//! [`postrelay_transport::CredentialCache`] seam, so a verified credential
//! pair is persisted the moment bootstrap succeeds.

pub mod error;
pub mod persistence;
pub mod state;

pub use error::StoreError;
pub use persistence::{
    default_config_dir, default_state_path, load_json, load_json_or_default, save_json,
};
pub use state::{PersistedState, StateStore};
