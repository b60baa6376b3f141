//! Job submission: REST wrapper and the optimistic submission flow.
//!
//! [`JobApi`] wraps the collaborator REST endpoints (submit a file or
//! URL, list current jobs) using [`reqwest`]. [`SubmissionAdapter`] sits
//! on top of it and drives the queue's temp-entry lifecycle: prepend an
//! optimistic entry synchronously, feed upload progress into it, then
//! resolve or fail it when the HTTP exchange completes — all independent
//! of push-channel delivery for the same logical job.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use serde::Deserialize;
use transmux_core::{decode_job_update, JobKind, JobUpdate};

use crate::queue::JobQueue;

/// Upload chunk size; each chunk pulled into the request body reports
/// one progress tick.
const UPLOAD_CHUNK_BYTES: usize = 64 * 1024;

/// Progress callback invoked with percent values in `0..=100`.
pub type ProgressFn = Box<dyn Fn(f32) + Send + Sync>;

/// Response returned by the submit endpoint after accepting a job.
#[derive(Debug, Deserialize)]
pub struct SubmitResponse {
    /// Server-assigned job identifier. The authoritative queue item for
    /// it arrives separately over the push channel.
    pub job_id: String,
}

/// Errors from the job REST layer.
#[derive(Debug, thiserror::Error)]
pub enum JobApiError {
    /// The HTTP request itself failed (network, DNS, TLS, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The API returned a non-2xx status code.
    #[error("Job API error ({status}): {body}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },
}

/// The submission surface the adapter depends on.
///
/// [`JobApi`] is the production implementation; tests substitute fakes
/// that drive progress and resolution deterministically.
#[async_trait]
pub trait JobSubmitter: Send + Sync {
    /// Upload a file for conversion, reporting progress per body chunk.
    ///
    /// Progress is best-effort: ticks fire as chunks are handed to the
    /// request body, not as bytes clear the wire, so payloads at or
    /// below the chunk size reach 100 before the response arrives.
    async fn submit_file(
        &self,
        file_name: &str,
        data: Vec<u8>,
        on_progress: ProgressFn,
    ) -> Result<SubmitResponse, JobApiError>;

    /// Submit a URL or magnet link for download/conversion.
    async fn submit_url(
        &self,
        url: &str,
        profile: Option<&str>,
    ) -> Result<SubmitResponse, JobApiError>;
}

/// HTTP client for the job endpoints.
pub struct JobApi {
    client: reqwest::Client,
    api_url: String,
}

impl JobApi {
    /// Create an API client for a base HTTP URL, e.g. `http://host:8100`.
    pub fn new(api_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url: api_url.into(),
        }
    }

    /// Create an API client reusing an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, api_url: impl Into<String>) -> Self {
        Self {
            client,
            api_url: api_url.into(),
        }
    }

    /// List current jobs, optionally filtered by kind.
    ///
    /// Used as the one-time seed for
    /// [`ActiveJobCounter`](crate::metrics::ActiveJobCounter). Entries
    /// that fail to decode are logged and skipped.
    pub async fn list_jobs(&self, kind: Option<JobKind>) -> Result<Vec<JobUpdate>, JobApiError> {
        let mut request = self.client.get(format!("{}/api/jobs", self.api_url));
        if let Some(kind) = kind {
            request = request.query(&[("type", kind.as_str())]);
        }

        let response = request.send().await?;
        let raw: Vec<serde_json::Value> = Self::parse_response(response).await?;

        Ok(raw
            .into_iter()
            .filter_map(|value| match decode_job_update(value) {
                Ok(update) => Some(update),
                Err(e) => {
                    tracing::warn!(error = %e, "Skipping undecodable job in listing");
                    None
                }
            })
            .collect())
    }

    // ---- private helpers ----

    /// Ensure the response has a success status code. Returns the
    /// response unchanged on success, or a [`JobApiError::Api`] with the
    /// status and body text on failure.
    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, JobApiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(JobApiError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    /// Parse a successful JSON response body into the expected type.
    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, JobApiError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }
}

#[async_trait]
impl JobSubmitter for JobApi {
    async fn submit_file(
        &self,
        file_name: &str,
        data: Vec<u8>,
        on_progress: ProgressFn,
    ) -> Result<SubmitResponse, JobApiError> {
        let length = data.len() as u64;
        let total = data.len().max(1) as f32;
        let chunks: Vec<Bytes> = data
            .chunks(UPLOAD_CHUNK_BYTES)
            .map(Bytes::copy_from_slice)
            .collect();

        let mut sent = 0f32;
        let body_stream = futures::stream::iter(chunks.into_iter().map(move |chunk| {
            sent += chunk.len() as f32;
            on_progress((sent / total * 100.0).min(100.0));
            Ok::<Bytes, std::io::Error>(chunk)
        }));

        let part = reqwest::multipart::Part::stream_with_length(
            reqwest::Body::wrap_stream(body_stream),
            length,
        )
        .file_name(file_name.to_string())
        .mime_str("application/octet-stream")?;

        let form = reqwest::multipart::Form::new().part("file", part);

        let response = self
            .client
            .post(format!("{}/api/jobs", self.api_url))
            .multipart(form)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    async fn submit_url(
        &self,
        url: &str,
        profile: Option<&str>,
    ) -> Result<SubmitResponse, JobApiError> {
        let body = serde_json::json!({
            "url": url,
            "profile": profile,
        });

        let response = self
            .client
            .post(format!("{}/api/jobs", self.api_url))
            .json(&body)
            .send()
            .await?;

        Self::parse_response(response).await
    }
}

/// Handle for one in-flight submission.
///
/// The temp entry is already in the queue when the handle is returned;
/// [`finished`](SubmissionHandle::finished) waits until the HTTP
/// exchange has been resolved into the queue.
pub struct SubmissionHandle {
    /// Local placeholder id of the optimistic queue entry.
    pub temp_id: String,
    task: tokio::task::JoinHandle<()>,
}

impl SubmissionHandle {
    /// Wait for the submission's HTTP exchange to resolve.
    pub async fn finished(self) {
        let _ = self.task.await;
    }
}

/// Drives the optimistic submission flow against a shared [`JobQueue`].
pub struct SubmissionAdapter {
    queue: Arc<Mutex<JobQueue>>,
    api: Arc<dyn JobSubmitter>,
}

impl SubmissionAdapter {
    pub fn new(queue: Arc<Mutex<JobQueue>>, api: Arc<dyn JobSubmitter>) -> Self {
        Self { queue, api }
    }

    /// Start a file submission.
    ///
    /// Synchronously prepends the temp entry, then runs the upload in
    /// the background: progress ticks update the same entry by id, HTTP
    /// success removes it (whether or not the authoritative push event
    /// has already arrived), HTTP failure flips it to a terminal
    /// `Failed`. Errors surface on the queue item, never to the caller.
    pub fn submit_file(&self, file_name: &str, data: Vec<u8>) -> SubmissionHandle {
        let temp_id = self
            .queue
            .lock()
            .begin_submission(JobKind::File, file_name);

        let queue = Arc::clone(&self.queue);
        let api = Arc::clone(&self.api);
        let file_name = file_name.to_string();
        let id = temp_id.clone();

        let task = tokio::spawn(async move {
            let progress_queue = Arc::clone(&queue);
            let progress_id = id.clone();
            let on_progress: ProgressFn = Box::new(move |percent| {
                progress_queue
                    .lock()
                    .set_submission_progress(&progress_id, percent);
            });

            let result = api.submit_file(&file_name, data, on_progress).await;
            resolve_into_queue(&queue, &id, result);
        });

        SubmissionHandle { temp_id, task }
    }

    /// Start a URL/magnet submission. Same flow as
    /// [`submit_file`](Self::submit_file) without progress ticks.
    pub fn submit_url(&self, url: &str) -> SubmissionHandle {
        let temp_id = self.queue.lock().begin_submission(JobKind::Url, url);

        let queue = Arc::clone(&self.queue);
        let api = Arc::clone(&self.api);
        let url = url.to_string();
        let id = temp_id.clone();

        let task = tokio::spawn(async move {
            let result = api.submit_url(&url, None).await;
            resolve_into_queue(&queue, &id, result);
        });

        SubmissionHandle { temp_id, task }
    }
}

/// Apply an HTTP outcome to the temp entry.
fn resolve_into_queue(
    queue: &Arc<Mutex<JobQueue>>,
    temp_id: &str,
    result: Result<SubmitResponse, JobApiError>,
) {
    match result {
        Ok(response) => {
            tracing::info!(job_id = %response.job_id, temp_id, "Submission accepted");
            queue.lock().resolve_submission(temp_id);
        }
        Err(e) => {
            tracing::warn!(error = %e, temp_id, "Submission failed");
            queue.lock().fail_submission(temp_id);
        }
    }
}
