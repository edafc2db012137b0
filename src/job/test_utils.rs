//! Shared test utilities for the `job` module.

use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::Value;

use crate::job::transport::{Transport, TransportFailure, TransportRequest, TransportResponse};

type Reply = Result<TransportResponse, TransportFailure>;
type Responder = dyn Fn(&TransportRequest, usize) -> Reply + Send + Sync;

/// Builds a 200 response carrying the given JSON.
pub(crate) fn ok_json(body: Value) -> Reply {
    Ok(TransportResponse {
        status: 200,
        body: body.to_string(),
    })
}

/// Builds a response with an arbitrary status and raw body.
pub(crate) fn raw(status: u16, body: &str) -> Reply {
    Ok(TransportResponse {
        status,
        body: body.to_string(),
    })
}

/// Builds a network-layer failure.
pub(crate) fn refused() -> Reply {
    Err(TransportFailure("connection refused".to_string()))
}

/// Mock transport driven by a responder function.
///
/// Every call is recorded, and the number of concurrent calls per URL is
/// tracked so tests can assert that polling for one handle never overlaps.
/// An optional latency is applied inside each call (it honours paused
/// tokio time).
pub(crate) struct ScriptedTransport {
    responder: Box<Responder>,
    latency: Duration,
    state: Arc<Mutex<CallState>>,
}

#[derive(Default)]
struct CallState {
    requests: Vec<TransportRequest>,
    in_flight: HashMap<String, usize>,
    max_in_flight: HashMap<String, usize>,
    calls_per_url: HashMap<String, usize>,
}

impl ScriptedTransport {
    /// Replies are returned in FIFO order; the last one repeats forever.
    pub(crate) fn queue(replies: Vec<Reply>) -> Self {
        let replies = Mutex::new(VecDeque::from(replies));
        Self::from_fn(move |_, _| {
            let mut replies = replies.lock().unwrap();
            if replies.len() > 1 {
                replies.pop_front().unwrap()
            } else {
                replies
                    .front()
                    .cloned()
                    .unwrap_or_else(|| Err(TransportFailure("no more mock responses".to_string())))
            }
        })
    }

    /// Replies are computed from the request and its per-URL call index.
    pub(crate) fn from_fn(
        responder: impl Fn(&TransportRequest, usize) -> Reply + Send + Sync + 'static,
    ) -> Self {
        Self {
            responder: Box::new(responder),
            latency: Duration::ZERO,
            state: Arc::new(Mutex::new(CallState::default())),
        }
    }

    /// Applies a fixed delay inside every call.
    pub(crate) fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Returns a handle for inspecting calls after the transport has been
    /// moved into a client.
    pub(crate) fn handle(&self) -> CallLog {
        CallLog {
            state: self.state.clone(),
        }
    }
}

impl Transport for ScriptedTransport {
    fn send<'a>(
        &'a self,
        request: &'a TransportRequest,
    ) -> Pin<Box<dyn Future<Output = Result<TransportResponse, TransportFailure>> + Send + 'a>>
    {
        Box::pin(async move {
            let index = {
                let mut state = self.state.lock().unwrap();
                state.requests.push(request.clone());
                let in_flight = state.in_flight.entry(request.url.clone()).or_default();
                *in_flight += 1;
                let current = *in_flight;
                let max = state.max_in_flight.entry(request.url.clone()).or_default();
                *max = (*max).max(current);
                let calls = state.calls_per_url.entry(request.url.clone()).or_default();
                *calls += 1;
                *calls - 1
            };

            if !self.latency.is_zero() {
                tokio::time::sleep(self.latency).await;
            }

            let reply = (self.responder)(request, index);

            let mut state = self.state.lock().unwrap();
            if let Some(in_flight) = state.in_flight.get_mut(&request.url) {
                *in_flight -= 1;
            }
            reply
        })
    }
}

/// Shared view of a [`ScriptedTransport`]'s recorded calls.
#[derive(Clone)]
pub(crate) struct CallLog {
    state: Arc<Mutex<CallState>>,
}

impl CallLog {
    /// All recorded requests in call order.
    pub(crate) fn requests(&self) -> Vec<TransportRequest> {
        self.state.lock().unwrap().requests.clone()
    }

    /// Total number of calls.
    pub(crate) fn count(&self) -> usize {
        self.state.lock().unwrap().requests.len()
    }

    /// Number of calls made to URLs ending with `suffix`.
    pub(crate) fn count_matching(&self, suffix: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .requests
            .iter()
            .filter(|r| r.url.ends_with(suffix))
            .count()
    }

    /// Highest number of simultaneous calls seen for any single URL.
    pub(crate) fn max_in_flight_per_url(&self) -> usize {
        self.state
            .lock()
            .unwrap()
            .max_in_flight
            .values()
            .copied()
            .max()
            .unwrap_or(0)
    }
}
