//! Push-channel frame parsing and payload normalization.
//!
//! Frames on the job channel arrive as JSON envelopes of the shape
//! `{"event": "job.updated", "data": ...}`. The `data` member is either
//! a JSON object, or — from older server builds — a JSON-encoded
//! *string* containing the same object. [`decode_job_update`] accepts
//! both and produces a validated [`JobUpdate`].
//!
//! Callers should log decode failures and continue; a malformed frame
//! must never take down the consumer.

use serde::Deserialize;

use crate::job::{JobMetadata, JobUpdate};

/// A raw frame envelope as delivered on the push channel.
#[derive(Debug, Clone, Deserialize)]
pub struct EventEnvelope {
    /// Channel the frame was published on, when the server includes it.
    #[serde(default)]
    pub channel: Option<String>,
    /// Event name, e.g. `"job.updated"`.
    pub event: String,
    /// Event payload, left undecoded until the event name is matched.
    #[serde(default)]
    pub data: serde_json::Value,
}

/// Parse a text frame into an [`EventEnvelope`].
pub fn parse_frame(text: &str) -> Result<EventEnvelope, serde_json::Error> {
    serde_json::from_str(text)
}

/// Wire shape of a job update, before metadata typing and clamping.
#[derive(Debug, Deserialize)]
struct RawJobUpdate {
    job_id: String,
    #[serde(rename = "type")]
    kind: crate::job::JobKind,
    status: crate::job::JobStatus,
    #[serde(default)]
    progress: f32,
    #[serde(default)]
    file_name: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    metadata: Option<serde_json::Value>,
    #[serde(default)]
    timestamp: String,
}

/// Decode an envelope payload into a [`JobUpdate`].
///
/// Accepts either a JSON object or a JSON-encoded string of the same
/// object. Progress is clamped to `0..=100`; metadata is decoded into
/// the kind-specific variant of [`JobMetadata`].
pub fn decode_job_update(data: serde_json::Value) -> Result<JobUpdate, serde_json::Error> {
    // Some producers double-encode the payload as a JSON string.
    let value = match data {
        serde_json::Value::String(inner) => serde_json::from_str(&inner)?,
        other => other,
    };

    let raw: RawJobUpdate = serde_json::from_value(value)?;

    Ok(JobUpdate {
        metadata: raw
            .metadata
            .map(|m| JobMetadata::from_value(raw.kind, m)),
        job_id: raw.job_id,
        kind: raw.kind,
        status: raw.status,
        progress: raw.progress.clamp(0.0, 100.0),
        file_name: raw.file_name,
        error: raw.error,
        timestamp: raw.timestamp,
    })
}
