//! Job domain model: kinds, statuses, metadata, and the update payload.
//!
//! A *job* is a server-tracked unit of work (file conversion, URL or
//! torrent download) identified by a stable `job_id`. The server pushes
//! [`JobUpdate`] events describing the current state of a job; updates
//! for the same `job_id` are idempotent overwrites, not deltas.

use serde::{Deserialize, Serialize};

/// What kind of work a job represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobKind {
    /// A locally uploaded media file being converted.
    File,
    /// A remote URL being fetched and converted.
    Url,
    /// A torrent or magnet download.
    Torrent,
}

impl JobKind {
    /// Wire representation, as used in payloads and query strings.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::File => "file",
            JobKind::Url => "url",
            JobKind::Torrent => "torrent",
        }
    }
}

/// Lifecycle state of a job.
///
/// The full set is a superset across kinds; e.g. `Uploading` only occurs
/// for file jobs and `Downloading` for url/torrent jobs. Consumers treat
/// the status as opaque apart from the terminal/active split.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Uploading,
    Downloading,
    Converting,
    Completed,
    Failed,
}

impl JobStatus {
    /// Whether the job has reached a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// Whether the job is still in flight (the "active set" counted by
    /// the derived metrics reducer).
    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }
}

/// Per-kind job metadata, decoded at the wire boundary.
///
/// The wire carries metadata as a free-form object next to the `type`
/// field; [`JobMetadata::from_value`] picks the variant matching the
/// job's kind. Shapes that do not fit the expected field set are kept
/// verbatim in [`JobMetadata::Other`] rather than dropped.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum JobMetadata {
    File(FileMetadata),
    Url(UrlMetadata),
    Torrent(TorrentMetadata),
    Other(serde_json::Value),
}

/// Metadata attached to file-conversion jobs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FileMetadata {
    pub size_bytes: Option<u64>,
    pub mime_type: Option<String>,
}

/// Metadata attached to URL-fetch jobs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UrlMetadata {
    pub source_url: Option<String>,
}

/// Metadata attached to torrent jobs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TorrentMetadata {
    pub info_hash: Option<String>,
    pub seeders: Option<u32>,
    pub total_peers: Option<u32>,
}

impl JobMetadata {
    /// Decode a raw metadata object according to the job's kind.
    ///
    /// Falls back to [`JobMetadata::Other`] when the value does not
    /// deserialize as the kind's field set (e.g. a non-object value).
    pub fn from_value(kind: JobKind, value: serde_json::Value) -> Self {
        match kind {
            JobKind::File => serde_json::from_value(value.clone())
                .map(JobMetadata::File)
                .unwrap_or(JobMetadata::Other(value)),
            JobKind::Url => serde_json::from_value(value.clone())
                .map(JobMetadata::Url)
                .unwrap_or(JobMetadata::Other(value)),
            JobKind::Torrent => serde_json::from_value(value.clone())
                .map(JobMetadata::Torrent)
                .unwrap_or(JobMetadata::Other(value)),
        }
    }
}

/// A push-channel event describing the current state of one job.
///
/// Immutable once received. `job_id` is the identity key; `progress` is
/// clamped to `0..=100` at the parse boundary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobUpdate {
    pub job_id: String,
    #[serde(rename = "type")]
    pub kind: JobKind,
    pub status: JobStatus,
    pub progress: f32,
    pub file_name: Option<String>,
    pub error: Option<String>,
    pub metadata: Option<JobMetadata>,
    /// Server-side event timestamp, passed through as received.
    pub timestamp: String,
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn terminal_statuses() {
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(!JobStatus::Converting.is_terminal());
        assert!(!JobStatus::Queued.is_terminal());
    }

    #[test]
    fn active_is_complement_of_terminal() {
        for status in [
            JobStatus::Queued,
            JobStatus::Uploading,
            JobStatus::Downloading,
            JobStatus::Converting,
            JobStatus::Completed,
            JobStatus::Failed,
        ] {
            assert_eq!(status.is_active(), !status.is_terminal());
        }
    }

    #[test]
    fn kind_wire_names() {
        assert_eq!(JobKind::File.as_str(), "file");
        assert_eq!(JobKind::Url.as_str(), "url");
        assert_eq!(JobKind::Torrent.as_str(), "torrent");
    }

    #[test]
    fn metadata_decodes_per_kind() {
        let value = serde_json::json!({"info_hash": "deadbeef", "seeders": 12});
        let meta = JobMetadata::from_value(JobKind::Torrent, value);
        match meta {
            JobMetadata::Torrent(t) => {
                assert_eq!(t.info_hash.as_deref(), Some("deadbeef"));
                assert_eq!(t.seeders, Some(12));
                assert_eq!(t.total_peers, None);
            }
            other => panic!("Expected Torrent metadata, got {other:?}"),
        }
    }

    #[test]
    fn metadata_non_object_falls_back_to_other() {
        let meta = JobMetadata::from_value(JobKind::File, serde_json::json!([1, 2, 3]));
        match meta {
            JobMetadata::Other(v) => assert!(v.is_array()),
            other => panic!("Expected Other, got {other:?}"),
        }
    }

    #[test]
    fn metadata_wrong_field_types_fall_back_to_other() {
        // seeders must be numeric; a string shape is kept verbatim.
        let value = serde_json::json!({"seeders": "many"});
        let meta = JobMetadata::from_value(JobKind::Torrent, value);
        assert_matches!(meta, JobMetadata::Other(_));
    }
}
