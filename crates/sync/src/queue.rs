//! Queue reconciliation: one ordered view of everything in flight.
//!
//! [`JobQueue`] merges two inputs into a single ordered list of
//! [`QueueItem`]s: authoritative [`JobUpdate`]s from the push channel,
//! and optimistic temp entries created locally when a submission starts.
//!
//! The merge contract is deliberately asymmetric: an update for a known
//! id overwrites the item **in place at the same position**, while an
//! unknown id is **prepended**. Items the user is watching stay put as
//! they progress; brand-new jobs surface at the top.
//!
//! Temp entries use locally generated `temp-<n>` ids and are never
//! matched to bus updates by content. The authoritative item for a
//! submission arrives separately through the bus, so both can be briefly
//! visible when the push event wins the race against the HTTP response.
//! That window is accepted behavior, not a bug to paper over.

use std::sync::Arc;

use parking_lot::Mutex;
use transmux_core::{JobKind, JobMetadata, JobStatus, JobUpdate, Timestamp};

use crate::bus::{EventBusClient, Subscription};

/// One row of the reconciled queue view.
#[derive(Debug, Clone, PartialEq)]
pub struct QueueItem {
    /// Server `job_id`, or a local `temp-<n>` placeholder.
    pub id: String,
    pub kind: JobKind,
    pub status: JobStatus,
    pub progress: f32,
    pub file_name: Option<String>,
    pub error: Option<String>,
    pub metadata: Option<JobMetadata>,
    /// Set at first observation; never touched by later updates.
    pub created_at: Timestamp,
}

/// Ordered reconciliation of bus events and local submissions.
///
/// Purely transient, in-memory state; share as `Arc<Mutex<JobQueue>>`
/// and feed it from the bus via [`JobQueue::attach`].
#[derive(Debug)]
pub struct JobQueue {
    items: Vec<QueueItem>,
    next_temp: u64,
}

impl Default for JobQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl JobQueue {
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            next_temp: 1,
        }
    }

    /// Merge one authoritative update into the queue.
    ///
    /// A known `job_id` has its mutable fields replaced in place, at the
    /// same index. An unknown `job_id` becomes a new item at index 0
    /// with `created_at` fixed to now.
    pub fn apply_update(&mut self, update: &JobUpdate) {
        if let Some(item) = self.items.iter_mut().find(|i| i.id == update.job_id) {
            item.status = update.status;
            item.progress = update.progress;
            item.file_name = update.file_name.clone();
            item.error = update.error.clone();
            item.metadata = update.metadata.clone();
        } else {
            self.items.insert(
                0,
                QueueItem {
                    id: update.job_id.clone(),
                    kind: update.kind,
                    status: update.status,
                    progress: update.progress,
                    file_name: update.file_name.clone(),
                    error: update.error.clone(),
                    metadata: update.metadata.clone(),
                    created_at: chrono::Utc::now(),
                },
            );
        }
    }

    /// Create an optimistic temp entry for a submission that just
    /// started. Returns its local id.
    pub fn begin_submission(&mut self, kind: JobKind, file_name: impl Into<String>) -> String {
        let id = format!("temp-{}", self.next_temp);
        self.next_temp += 1;
        self.items.insert(
            0,
            QueueItem {
                id: id.clone(),
                kind,
                status: JobStatus::Uploading,
                progress: 0.0,
                file_name: Some(file_name.into()),
                error: None,
                metadata: None,
                created_at: chrono::Utc::now(),
            },
        );
        id
    }

    /// Update upload progress on a temp entry. Independent of the bus.
    pub fn set_submission_progress(&mut self, id: &str, progress: f32) {
        if let Some(item) = self.items.iter_mut().find(|i| i.id == id) {
            item.progress = progress.clamp(0.0, 100.0);
        }
    }

    /// Remove a temp entry after the submission was accepted.
    ///
    /// Unconditional: whether the authoritative item has already arrived
    /// through the bus is irrelevant here.
    pub fn resolve_submission(&mut self, id: &str) {
        self.items.retain(|i| i.id != id);
    }

    /// Flip a temp entry to a terminal failure. It stays in the queue
    /// until explicitly removed.
    pub fn fail_submission(&mut self, id: &str) {
        if let Some(item) = self.items.iter_mut().find(|i| i.id == id) {
            item.status = JobStatus::Failed;
            item.error = Some("Upload failed".into());
        }
    }

    /// Remove an item from the local view.
    ///
    /// Local only — nothing is cancelled server-side.
    pub fn remove(&mut self, id: &str) {
        self.items.retain(|i| i.id != id);
    }

    /// Drop all items in a terminal state.
    pub fn clear_completed(&mut self) {
        self.items.retain(|i| i.status.is_active());
    }

    /// Current queue contents, most-recent-unseen first.
    pub fn items(&self) -> &[QueueItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Feed a shared queue from the bus.
    pub fn attach(queue: &Arc<Mutex<JobQueue>>, bus: &EventBusClient) -> Subscription {
        let queue = Arc::clone(queue);
        bus.on_update(move |update| queue.lock().apply_update(update))
    }
}
