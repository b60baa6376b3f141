//! Derived aggregate counts for secondary UI surfaces.
//!
//! [`ActiveJobCounter`] is the second, independent consumer of the job
//! bus: it seeds a `job_id -> status` map from a one-time REST fetch and
//! then patches it incrementally from the same push channel the queue
//! reconciler listens to. It never reconciles temp submissions — only
//! authoritative `job_id`s reach it.
//!
//! Re-seeding happens on mount, not on reconnect; events missed during a
//! disconnect window are not recovered here any more than they are in
//! the queue.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use transmux_core::{JobKind, JobStatus, JobUpdate};

use crate::bus::{EventBusClient, Subscription};
use crate::submit::{JobApi, JobApiError};

/// Counts jobs of one kind currently in a non-terminal status.
#[derive(Debug)]
pub struct ActiveJobCounter {
    kind: JobKind,
    statuses: HashMap<String, JobStatus>,
}

impl ActiveJobCounter {
    pub fn new(kind: JobKind) -> Self {
        Self {
            kind,
            statuses: HashMap::new(),
        }
    }

    /// The job kind this counter is filtered to.
    pub fn kind(&self) -> JobKind {
        self.kind
    }

    /// One-time population from a REST snapshot.
    ///
    /// Updates for other kinds are ignored, so an unfiltered listing can
    /// be passed as-is.
    pub fn seed(&mut self, jobs: impl IntoIterator<Item = JobUpdate>) {
        for job in jobs {
            self.apply(&job);
        }
    }

    /// Patch the map from one bus event. Upserts when the kind matches,
    /// ignores everything else.
    pub fn apply(&mut self, update: &JobUpdate) {
        if update.kind != self.kind {
            return;
        }
        self.statuses.insert(update.job_id.clone(), update.status);
    }

    /// Number of tracked jobs whose status is in the active set.
    pub fn active_count(&self) -> usize {
        self.statuses.values().filter(|s| s.is_active()).count()
    }

    /// Total number of tracked jobs, terminal ones included.
    pub fn tracked(&self) -> usize {
        self.statuses.len()
    }

    /// Feed a shared counter from the bus.
    pub fn attach(counter: &Arc<Mutex<ActiveJobCounter>>, bus: &EventBusClient) -> Subscription {
        let counter = Arc::clone(counter);
        bus.on_update(move |update| counter.lock().apply(update))
    }

    /// Seed a shared counter from the job listing endpoint.
    pub async fn seed_from_api(
        counter: &Arc<Mutex<ActiveJobCounter>>,
        api: &JobApi,
    ) -> Result<(), JobApiError> {
        let kind = counter.lock().kind();
        let jobs = api.list_jobs(Some(kind)).await?;
        counter.lock().seed(jobs);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn update(job_id: &str, kind: JobKind, status: JobStatus) -> JobUpdate {
        JobUpdate {
            job_id: job_id.into(),
            kind,
            status,
            progress: 0.0,
            file_name: None,
            error: None,
            metadata: None,
            timestamp: "t".into(),
        }
    }

    #[test]
    fn seed_counts_active_jobs_of_kind() {
        let mut counter = ActiveJobCounter::new(JobKind::Torrent);
        counter.seed([
            update("t1", JobKind::Torrent, JobStatus::Downloading),
            update("t2", JobKind::Torrent, JobStatus::Completed),
            update("f1", JobKind::File, JobStatus::Converting),
        ]);

        assert_eq!(counter.active_count(), 1);
        assert_eq!(counter.tracked(), 2);
    }

    #[test]
    fn apply_upserts_by_job_id() {
        let mut counter = ActiveJobCounter::new(JobKind::File);
        counter.apply(&update("a", JobKind::File, JobStatus::Queued));
        counter.apply(&update("b", JobKind::File, JobStatus::Converting));
        assert_eq!(counter.active_count(), 2);

        // Same id transitioning to terminal shrinks the count, not the map.
        counter.apply(&update("a", JobKind::File, JobStatus::Completed));
        assert_eq!(counter.active_count(), 1);
        assert_eq!(counter.tracked(), 2);
    }

    #[test]
    fn other_kinds_are_ignored() {
        let mut counter = ActiveJobCounter::new(JobKind::File);
        counter.apply(&update("u1", JobKind::Url, JobStatus::Downloading));
        counter.apply(&update("t1", JobKind::Torrent, JobStatus::Downloading));

        assert_eq!(counter.active_count(), 0);
        assert_eq!(counter.tracked(), 0);
    }

    #[test]
    fn failed_jobs_are_not_active() {
        let mut counter = ActiveJobCounter::new(JobKind::File);
        counter.apply(&update("a", JobKind::File, JobStatus::Failed));
        assert_eq!(counter.active_count(), 0);
    }
}
