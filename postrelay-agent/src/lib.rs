// Lint configuration for this crate
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # `PostRelay` Agent
//!
//! The ingestion and delivery pipeline, plus the inbound command surface.
//!
//! Captured payloads flow through the extractor into the [`IngestBuffer`],
//! which deduplicates and batches them; the [`Agent`] flushes batches
//! through the transport manager on size and timer triggers, restoring
//! undelivered batches to the front of the buffer on transport failure.
//!
//! Everything runs on one logical task. Network round trips and timers are
//! the only suspension points, so the shared buffers need no locking:
//! ordering is guaranteed by run-to-completion per event.

pub mod agent;
pub mod cache;
pub mod command;
pub mod dedup;
pub mod diag;
pub mod ingest;

pub use agent::{Agent, AgentHandle, AgentRequest};
pub use cache::RecentCache;
pub use command::{Command, CommandReply, VideoLookupReply};
pub use dedup::SeenSet;
pub use diag::{BufferLayer, DiagnosticBuffer, summarize_shape};
pub use ingest::{EnqueueOutcome, IngestBuffer};
