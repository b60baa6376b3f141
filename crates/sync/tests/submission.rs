//! Integration tests for the optimistic submission flow.
//!
//! A scripted fake submitter stands in for the HTTP layer so the tests
//! control when progress ticks fire and how the exchange resolves,
//! including the acknowledged race where the authoritative push event
//! arrives before the HTTP response.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::oneshot;
use transmux_core::{JobKind, JobStatus, JobUpdate};
use transmux_sync::{
    JobApiError, JobQueue, JobSubmitter, ProgressFn, SubmissionAdapter, SubmitResponse,
};

// ---------------------------------------------------------------------------
// Scripted fake submitter
// ---------------------------------------------------------------------------

/// Fake submitter that fires scripted progress ticks, optionally blocks
/// on a gate, then returns a scripted outcome.
struct ScriptedSubmitter {
    progress_ticks: Vec<f32>,
    gate: Mutex<Option<oneshot::Receiver<()>>>,
    outcome: Mutex<Option<Result<SubmitResponse, JobApiError>>>,
}

impl ScriptedSubmitter {
    fn new(
        progress_ticks: Vec<f32>,
        outcome: Result<SubmitResponse, JobApiError>,
    ) -> (Arc<Self>, oneshot::Sender<()>) {
        let (release, gate) = oneshot::channel();
        let submitter = Arc::new(Self {
            progress_ticks,
            gate: Mutex::new(Some(gate)),
            outcome: Mutex::new(Some(outcome)),
        });
        (submitter, release)
    }

    async fn run(
        &self,
        on_progress: Option<ProgressFn>,
    ) -> Result<SubmitResponse, JobApiError> {
        if let Some(on_progress) = on_progress {
            for tick in &self.progress_ticks {
                on_progress(*tick);
            }
        }
        let gate = self.gate.lock().take();
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        self.outcome
            .lock()
            .take()
            .expect("outcome consumed more than once")
    }
}

#[async_trait]
impl JobSubmitter for ScriptedSubmitter {
    async fn submit_file(
        &self,
        _file_name: &str,
        _data: Vec<u8>,
        on_progress: ProgressFn,
    ) -> Result<SubmitResponse, JobApiError> {
        self.run(Some(on_progress)).await
    }

    async fn submit_url(
        &self,
        _url: &str,
        _profile: Option<&str>,
    ) -> Result<SubmitResponse, JobApiError> {
        self.run(None).await
    }
}

fn accepted(job_id: &str) -> Result<SubmitResponse, JobApiError> {
    Ok(SubmitResponse {
        job_id: job_id.into(),
    })
}

fn server_error() -> Result<SubmitResponse, JobApiError> {
    Err(JobApiError::Api {
        status: 500,
        body: "boom".into(),
    })
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }
    panic!("condition not reached within timeout");
}

// ---------------------------------------------------------------------------
// Test: temp entry appears synchronously and tracks progress
// ---------------------------------------------------------------------------

#[tokio::test]
async fn submit_file_prepends_temp_entry_and_tracks_progress() {
    let queue = Arc::new(Mutex::new(JobQueue::new()));
    let (submitter, release) = ScriptedSubmitter::new(vec![45.0], accepted("abc"));
    let adapter = SubmissionAdapter::new(Arc::clone(&queue), submitter);

    let handle = adapter.submit_file("video.mp4", vec![0u8; 128]);

    // Immediately after the call the head item is the uploading temp.
    {
        let queue = queue.lock();
        let head = &queue.items()[0];
        assert_eq!(head.id, handle.temp_id);
        assert_eq!(head.status, JobStatus::Uploading);
        assert_eq!(head.progress, 0.0);
        assert_eq!(head.file_name.as_deref(), Some("video.mp4"));
    }

    // The scripted progress tick lands on the same entry while the
    // exchange is still gated.
    wait_until(|| queue.lock().items()[0].progress == 45.0).await;
    assert!(!queue.lock().is_empty());

    release.send(()).expect("submitter gone");
    handle.finished().await;

    // Success removes the temp entry.
    assert!(queue.lock().is_empty());
}

// ---------------------------------------------------------------------------
// Test: success removes the temp even when the push event won the race
// ---------------------------------------------------------------------------

#[tokio::test]
async fn success_removes_temp_even_when_push_event_arrived_first() {
    let queue = Arc::new(Mutex::new(JobQueue::new()));
    let (submitter, release) = ScriptedSubmitter::new(vec![], accepted("abc"));
    let adapter = SubmissionAdapter::new(Arc::clone(&queue), submitter);

    let handle = adapter.submit_file("video.mp4", vec![1, 2, 3]);
    let temp_id = handle.temp_id.clone();

    // The authoritative update beats the HTTP response: both entries
    // are visible for the duration of the window.
    queue.lock().apply_update(&JobUpdate {
        job_id: "abc".into(),
        kind: JobKind::File,
        status: JobStatus::Converting,
        progress: 10.0,
        file_name: Some("video.mp4".into()),
        error: None,
        metadata: None,
        timestamp: "t".into(),
    });
    assert_eq!(queue.lock().len(), 2);

    release.send(()).expect("submitter gone");
    handle.finished().await;

    // Only the authoritative item remains; the temp is gone.
    let queue = queue.lock();
    assert_eq!(queue.len(), 1);
    assert_eq!(queue.items()[0].id, "abc");
    assert_ne!(queue.items()[0].id, temp_id);
}

// ---------------------------------------------------------------------------
// Test: failure flips the temp entry to a sticky terminal state
// ---------------------------------------------------------------------------

#[tokio::test]
async fn failure_marks_temp_entry_failed_and_keeps_it() {
    let queue = Arc::new(Mutex::new(JobQueue::new()));
    let (submitter, release) = ScriptedSubmitter::new(vec![], server_error());
    let adapter = SubmissionAdapter::new(Arc::clone(&queue), submitter);

    let handle = adapter.submit_file("video.mp4", vec![9u8; 16]);
    let temp_id = handle.temp_id.clone();

    release.send(()).expect("submitter gone");
    handle.finished().await;

    {
        let queue = queue.lock();
        assert_eq!(queue.len(), 1);
        let item = &queue.items()[0];
        assert_eq!(item.id, temp_id);
        assert_eq!(item.status, JobStatus::Failed);
        assert_eq!(item.error.as_deref(), Some("Upload failed"));
    }

    // It stays until explicitly removed.
    queue.lock().remove(&temp_id);
    assert!(queue.lock().is_empty());
}

// ---------------------------------------------------------------------------
// Test: URL submissions use the same optimistic lifecycle
// ---------------------------------------------------------------------------

#[tokio::test]
async fn submit_url_resolves_like_a_file_submission() {
    let queue = Arc::new(Mutex::new(JobQueue::new()));
    let (submitter, release) = ScriptedSubmitter::new(vec![], accepted("dl-1"));
    let adapter = SubmissionAdapter::new(Arc::clone(&queue), submitter);

    let handle = adapter.submit_url("magnet:?xt=urn:btih:deadbeef");

    {
        let queue = queue.lock();
        assert_eq!(queue.items()[0].kind, JobKind::Url);
        assert_eq!(queue.items()[0].status, JobStatus::Uploading);
    }

    release.send(()).expect("submitter gone");
    handle.finished().await;

    assert!(queue.lock().is_empty());
}
