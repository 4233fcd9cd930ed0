// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # `PostRelay` Core
//!
//! Core types, models, and message contracts for the `PostRelay` capture
//! pipeline.
//!
//! This crate provides the foundational abstractions used across all other
//! `PostRelay` crates, including:
//!
//! - The normalized [`Post`] record and its sub-objects
//! - The sink message contract ([`SinkMessage`], [`SinkReply`])
//! - Transport and status reporting types
//!
//! ## Key Types
//!
//! ### Record Types
//! - [`Post`] - One normalized captured post
//! - [`Author`] - Author identity and statistics (all fields optional)
//! - [`Metrics`] - Engagement counts
//! - [`MediaItem`] / [`MediaKind`] - Attached media
//! - [`LinkEntity`] / [`Mention`] - Entity references
//!
//! ### Sink Contract
//! - [`SinkMessage`] - Outbound delivery messages (bulk posts, logs, dumps,
//!   path tests, capability probes, download control)
//! - [`SinkReply`] - The sink's uniform `{ok, error, ...}` reply shape
//!
//! ### Status
//! - [`TransportState`] - The transport state machine's observable state
//! - [`StatusReport`] - Snapshot returned to the control surface

pub mod message;
pub mod models;

// Re-export model types
pub use models::{
    Author, LinkEntity, MediaItem, MediaKind, Mention, Metrics, Post, StatusReport,
    TransportState,
};

// Re-export sink contract types
pub use message::{SinkMessage, SinkReply};
