//! Domain types and wire parsing for the transmux job-event protocol.
//!
//! This crate is the leaf of the synchronization stack:
//!
//! - [`job`] — the [`JobUpdate`](job::JobUpdate) payload contract plus the
//!   job kind/status enums and the per-kind metadata union.
//! - [`wire`] — envelope parsing for frames received on the push channel
//!   and payload normalization (the server emits both plain JSON objects
//!   and JSON-encoded strings of the same shape).
//! - [`types`] — shared type aliases.

pub mod job;
pub mod types;
pub mod wire;

pub use job::{JobKind, JobMetadata, JobStatus, JobUpdate};
pub use types::Timestamp;
pub use wire::{decode_job_update, parse_frame, EventEnvelope};
