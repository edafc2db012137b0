//! Asynchronous job client: submit, poll and resolve generation jobs.

use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use serde_json::Value;
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::classify::classify;
use super::error::JobError;
use super::retry::RetryPolicy;
use super::transport::{
    HttpTransport, Transport, TransportFailure, TransportRequest, REQUEST_TIMEOUT,
};
use super::types::{GenerationRequest, GenerationResult, JobHandle, PollSettings};

/// Placeholder substituted with the job id in [`ClientConfig::fetch_path`].
pub const ID_PLACEHOLDER: &str = "{id}";

/// Connection and policy settings for an [`AsyncJobClient`].
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// Base URL that relative endpoint paths are appended to.
    pub base_url: String,
    /// API key sent as the `key` body field.
    pub api_key: Option<String>,
    /// Status-fetch path, relative to `base_url`, containing `{id}`.
    pub fetch_path: String,
    /// Retry policy for network-layer failures.
    pub retry: RetryPolicy,
    /// Poll settings used by [`AsyncJobClient::run_default`].
    pub poll: PollSettings,
}

impl ClientConfig {
    /// Creates a config with default policies for the given base URL.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: None,
            fetch_path: "/fetch/{id}".to_string(),
            retry: RetryPolicy::default(),
            poll: PollSettings::default(),
        }
    }

    /// Sets the API key.
    #[must_use]
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Sets the status-fetch path template.
    #[must_use]
    pub fn with_fetch_path(mut self, fetch_path: impl Into<String>) -> Self {
        self.fetch_path = fetch_path.into();
        self
    }

    /// Sets the retry policy.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the default poll settings.
    #[must_use]
    pub fn with_poll(mut self, poll: PollSettings) -> Self {
        self.poll = poll;
        self
    }
}

/// Why a single logical call stopped without a body.
enum CallError {
    Job(JobError),
    DeadlineReached,
    Cancelled,
}

/// Bounds on the retry backoff of one logical call.
#[derive(Default, Clone, Copy)]
struct CallLimits<'a> {
    deadline: Option<Instant>,
    cancel: Option<&'a CancellationToken>,
}

impl From<JobError> for CallError {
    fn from(err: JobError) -> Self {
        Self::Job(err)
    }
}

/// Client for the submit / poll / webhook job protocol.
///
/// Holds no per-job state: every [`resolve`](Self::resolve) call owns its
/// handle for the duration of its loop, so independent handles can be
/// resolved concurrently from one client.
#[derive(Clone)]
pub struct AsyncJobClient {
    transport: Arc<dyn Transport>,
    config: ClientConfig,
}

impl AsyncJobClient {
    /// Creates a client over an arbitrary transport.
    pub fn new(transport: Arc<dyn Transport>, config: ClientConfig) -> Self {
        Self { transport, config }
    }

    /// Creates a client over a pooled HTTP transport.
    pub fn with_http(config: ClientConfig) -> Result<Self, JobError> {
        let transport = HttpTransport::new(REQUEST_TIMEOUT).map_err(client_build_error)?;
        Ok(Self::new(Arc::new(transport), config))
    }

    /// Returns the client configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Sends the request once and classifies the immediate response.
    ///
    /// `Pending` results carry the handle to pass to
    /// [`resolve`](Self::resolve).
    pub async fn submit(&self, request: &GenerationRequest) -> Result<GenerationResult, JobError> {
        if request.endpoint().trim().is_empty() {
            return Err(JobError::InvalidRequest(
                "endpoint must not be empty".to_string(),
            ));
        }

        let url = self.url_for(request.endpoint())?;
        let body = self.with_key(request.body());

        info!(
            url = %url,
            track_id = request.tracking_token().unwrap_or(""),
            has_webhook = request.webhook_url().is_some(),
            "Submitting generation request"
        );

        let result = self.call_and_classify(url, body).await?;
        match &result {
            GenerationResult::Success { outputs, .. } => {
                info!(outputs = outputs.len(), "Generation completed immediately");
            }
            GenerationResult::Failure { message, .. } => {
                warn!(message = %message, "Generation request rejected");
            }
            GenerationResult::Pending { handle } => {
                info!(job_id = %handle.id, eta = ?handle.eta, "Generation queued");
            }
        }
        Ok(result)
    }

    /// Polls a pending job until it reaches a terminal state.
    ///
    /// Waits `poll.interval` before each status fetch and gives up with
    /// [`JobError::Timeout`] once `poll.timeout` has elapsed; no wait
    /// extends past that deadline. Cancellation is observed before each
    /// poll, while waiting and during transport backoff, never while a
    /// request is in flight, and yields [`JobError::Cancelled`]. Never
    /// returns `Pending`.
    pub async fn resolve(
        &self,
        handle: &JobHandle,
        poll: PollSettings,
        cancel: &CancellationToken,
    ) -> Result<GenerationResult, JobError> {
        let started = Instant::now();
        // A budget too large to represent is no budget at all.
        let deadline = started.checked_add(poll.timeout);
        let (url, body) = self.fetch_request(handle)?;
        let mut polls = 0u32;

        debug!(
            job_id = %handle.id,
            url = %url,
            interval_ms = poll.interval.as_millis() as u64,
            timeout_ms = poll.timeout.as_millis() as u64,
            "Resolving pending job"
        );

        loop {
            if cancel.is_cancelled() {
                info!(job_id = %handle.id, polls, "Polling cancelled");
                return Err(JobError::Cancelled { polls });
            }

            let now = Instant::now();
            let wait = match deadline {
                Some(deadline) if now >= deadline => return Err(timeout(handle, started, polls)),
                Some(deadline) => poll.interval.min(deadline - now),
                None => poll.interval,
            };
            tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    info!(job_id = %handle.id, polls, "Polling cancelled");
                    return Err(JobError::Cancelled { polls });
                }
                () = sleep(wait) => {}
            }

            if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                return Err(timeout(handle, started, polls));
            }

            polls += 1;
            let limits = CallLimits {
                deadline,
                cancel: Some(cancel),
            };
            let (status, payload) = match self.call(url.clone(), body.clone(), limits).await {
                Ok(reply) => reply,
                Err(CallError::Job(err)) => return Err(err),
                Err(CallError::DeadlineReached) => return Err(timeout(handle, started, polls)),
                Err(CallError::Cancelled) => {
                    info!(job_id = %handle.id, polls, "Polling cancelled during backoff");
                    return Err(JobError::Cancelled { polls });
                }
            };

            match classify_reply(status, &payload)? {
                GenerationResult::Pending { handle: update } => {
                    debug!(
                        job_id = %handle.id,
                        polls,
                        eta = ?update.eta,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "Job still processing"
                    );
                }
                terminal => {
                    info!(
                        job_id = %handle.id,
                        polls,
                        succeeded = matches!(terminal, GenerationResult::Success { .. }),
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "Job reached terminal state"
                    );
                    return Ok(terminal);
                }
            }
        }
    }

    /// Issues a single status fetch for a handle.
    ///
    /// Unlike [`resolve`](Self::resolve) this may return `Pending`.
    pub async fn poll_once(&self, handle: &JobHandle) -> Result<GenerationResult, JobError> {
        let (url, body) = self.fetch_request(handle)?;
        self.call_and_classify(url, body).await
    }

    /// Submits the request and, if it is pending, resolves it.
    pub async fn run(
        &self,
        request: &GenerationRequest,
        poll: PollSettings,
        cancel: &CancellationToken,
    ) -> Result<GenerationResult, JobError> {
        match self.submit(request).await? {
            GenerationResult::Pending { handle } => self.resolve(&handle, poll, cancel).await,
            terminal => Ok(terminal),
        }
    }

    /// [`run`](Self::run) with the configured default poll settings and no
    /// cancellation.
    pub async fn run_default(
        &self,
        request: &GenerationRequest,
    ) -> Result<GenerationResult, JobError> {
        self.run(request, self.config.poll, &CancellationToken::new())
            .await
    }

    /// Resolves independent handles concurrently.
    ///
    /// At most `concurrency` loops run at once. Results come back in input
    /// order, one per handle; a failing handle does not affect the others.
    pub async fn resolve_many(
        &self,
        handles: &[JobHandle],
        poll: PollSettings,
        cancel: &CancellationToken,
        concurrency: usize,
    ) -> Vec<Result<GenerationResult, JobError>> {
        stream::iter(handles)
            .map(|handle| self.resolve(handle, poll, cancel))
            .buffered(concurrency.max(1))
            .collect()
            .await
    }

    /// Resolves an endpoint path or absolute URL against the base URL.
    fn url_for(&self, endpoint: &str) -> Result<String, JobError> {
        let endpoint = endpoint.trim();
        let url = if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
            endpoint.to_string()
        } else {
            format!(
                "{}/{}",
                self.config.base_url.trim_end_matches('/'),
                endpoint.trim_start_matches('/')
            )
        };

        url::Url::parse(&url)
            .map_err(|e| JobError::InvalidRequest(format!("invalid URL {url:?}: {e}")))?;
        Ok(url)
    }

    /// Builds the status-fetch URL and body for a handle.
    fn fetch_request(&self, handle: &JobHandle) -> Result<(String, Value), JobError> {
        if let Some(ref fetch_url) = handle.fetch_url {
            return Ok((self.url_for(fetch_url)?, self.with_key(Value::Object(Default::default()))));
        }

        let template = &self.config.fetch_path;
        if template.contains(ID_PLACEHOLDER) {
            let path = template.replace(ID_PLACEHOLDER, &encode_path_segment(&handle.id)?);
            Ok((self.url_for(&path)?, self.with_key(Value::Object(Default::default()))))
        } else {
            let body = serde_json::json!({ "request_id": handle.id });
            Ok((self.url_for(template)?, self.with_key(body)))
        }
    }

    fn with_key(&self, mut body: Value) -> Value {
        if let (Some(key), Value::Object(map)) = (&self.config.api_key, &mut body) {
            map.insert("key".to_string(), Value::String(key.clone()));
        }
        body
    }

    /// Performs one logical call without a deadline and classifies it.
    async fn call_and_classify(
        &self,
        url: String,
        body: Value,
    ) -> Result<GenerationResult, JobError> {
        match self.call(url, body, CallLimits::default()).await {
            Ok((status, payload)) => classify_reply(status, &payload),
            Err(CallError::Job(err)) => Err(err),
            // Only reachable with a deadline or a token.
            Err(CallError::DeadlineReached | CallError::Cancelled) => Err(JobError::Transport {
                attempts: self.config.retry.attempts(),
                message: "retry budget exhausted".to_string(),
            }),
        }
    }

    /// Performs one logical call, retrying network-layer failures.
    ///
    /// A body that parses as a JSON object is returned whatever the HTTP
    /// status. Non-2xx responses without one are retried; a 2xx response
    /// with an unparseable body is not. Backoff never sleeps past
    /// `limits.deadline` and stops early when `limits.cancel` fires.
    async fn call(
        &self,
        url: String,
        body: Value,
        limits: CallLimits<'_>,
    ) -> Result<(u16, Value), CallError> {
        let policy = self.config.retry;
        let attempts = policy.attempts();
        let request = TransportRequest { url, body };
        let mut attempt = 0u32;

        loop {
            attempt += 1;

            let failure = match self.transport.send(&request).await {
                Ok(response) => {
                    match serde_json::from_str::<Value>(&response.body) {
                        Ok(value) if value.is_object() || response.is_success() => {
                            return Ok((response.status, value));
                        }
                        Err(e) if response.is_success() => {
                            return Err(JobError::UnexpectedResponse(format!(
                                "body is not JSON: {e}"
                            ))
                            .into());
                        }
                        _ => format!(
                            "HTTP {}: {}",
                            response.status,
                            truncate(&response.body, 200)
                        ),
                    }
                }
                Err(e) => e.0,
            };

            if attempt >= attempts {
                warn!(url = %request.url, attempt, error = %failure, "Giving up on request");
                return Err(JobError::Transport {
                    attempts: attempt,
                    message: failure,
                }
                .into());
            }

            let delay = policy.delay_after(attempt);
            if let Some(deadline) = limits.deadline {
                // An unrepresentable wake-up time is past any deadline.
                let wake = Instant::now().checked_add(delay);
                if wake.map_or(true, |wake| wake >= deadline) {
                    return Err(CallError::DeadlineReached);
                }
            }

            warn!(
                url = %request.url,
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %failure,
                "Request failed, retrying"
            );
            match limits.cancel {
                Some(cancel) => tokio::select! {
                    biased;
                    () = cancel.cancelled() => return Err(CallError::Cancelled),
                    () = sleep(delay) => {}
                },
                None => sleep(delay).await,
            }
        }
    }
}

/// Classifies a reply, noting the HTTP status when a non-2xx body has no
/// recognisable shape.
fn classify_reply(status: u16, payload: &Value) -> Result<GenerationResult, JobError> {
    match classify(payload) {
        Err(JobError::UnexpectedResponse(reason)) if !(200..300).contains(&status) => Err(
            JobError::UnexpectedResponse(format!("HTTP {status}: {reason}")),
        ),
        other => other,
    }
}

/// A client that cannot be built is a configuration problem, not a
/// transient one.
fn client_build_error(failure: TransportFailure) -> JobError {
    JobError::InvalidRequest(format!("cannot build HTTP client: {failure}"))
}

/// Percent-encodes a job id as a single path segment so it cannot leave
/// the fetch path.
fn encode_path_segment(id: &str) -> Result<String, JobError> {
    if matches!(id, "" | "." | "..") {
        return Err(JobError::InvalidRequest(format!(
            "job id {id:?} cannot be used in a fetch path"
        )));
    }

    let mut scratch = url::Url::parse("http://localhost/")
        .map_err(|e| JobError::InvalidRequest(format!("cannot encode job id: {e}")))?;
    scratch
        .path_segments_mut()
        .map_err(|()| JobError::InvalidRequest("cannot encode job id".to_string()))?
        .push(id);
    Ok(scratch.path().trim_start_matches('/').to_string())
}

fn timeout(handle: &JobHandle, started: Instant, polls: u32) -> JobError {
    let elapsed: Duration = started.elapsed();
    warn!(
        job_id = %handle.id,
        polls,
        elapsed_ms = elapsed.as_millis() as u64,
        "Job did not finish within the polling budget"
    );
    JobError::Timeout { elapsed, polls }
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max_chars).collect();
        format!("{cut}...")
    }
}
