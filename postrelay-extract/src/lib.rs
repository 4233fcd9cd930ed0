// Lint configuration for this crate
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # `PostRelay` Extract
//!
//! Schema-tolerant extraction of normalized posts from intercepted timeline
//! payloads.
//!
//! The same logical post entity is reachable through a dozen different
//! nesting paths depending on which query produced the payload. This crate
//! walks those shapes and reduces each candidate to one canonical
//! [`postrelay_core::Post`]. Structural mismatches yield fewer records,
//! never errors: [`extract`] cannot fail its caller.

pub mod endpoints;
mod normalize;
mod timeline;

pub use endpoints::{instruction_path, is_ignored_endpoint};
pub use timeline::extract;
