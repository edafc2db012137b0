//! Values exchanged with the generation service.

use std::time::Duration;

use serde::Serialize;
use serde_json::{Map, Value};

/// One unit of generation work, described before any network activity.
///
/// Built once with the `with`-style builder methods and then only read.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    endpoint: String,
    parameters: Map<String, Value>,
    track_id: Option<String>,
    webhook: Option<String>,
}

impl GenerationRequest {
    /// Creates a request for the given endpoint path or absolute URL.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            parameters: Map::new(),
            track_id: None,
            webhook: None,
        }
    }

    /// Adds or replaces a body parameter.
    #[must_use]
    pub fn param(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.parameters.insert(name.into(), value.into());
        self
    }

    /// Replaces the whole parameter map.
    #[must_use]
    pub fn params(mut self, parameters: Map<String, Value>) -> Self {
        self.parameters = parameters;
        self
    }

    /// Sets the caller-chosen token echoed back in webhook notifications.
    #[must_use]
    pub fn track_id(mut self, token: impl Into<String>) -> Self {
        self.track_id = Some(token.into());
        self
    }

    /// Sets the URL the service should notify on completion.
    #[must_use]
    pub fn webhook(mut self, url: impl Into<String>) -> Self {
        self.webhook = Some(url.into());
        self
    }

    /// Endpoint path or URL.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Body parameters as supplied by the caller.
    pub fn parameters(&self) -> &Map<String, Value> {
        &self.parameters
    }

    /// Tracking token, if any.
    pub fn tracking_token(&self) -> Option<&str> {
        self.track_id.as_deref()
    }

    /// Webhook URL, if any.
    pub fn webhook_url(&self) -> Option<&str> {
        self.webhook.as_deref()
    }

    /// Builds the JSON body: the parameters as-is plus `track_id` and
    /// `webhook` when supplied.
    pub fn body(&self) -> Value {
        let mut body = self.parameters.clone();
        if let Some(ref token) = self.track_id {
            body.insert("track_id".to_string(), Value::String(token.clone()));
        }
        if let Some(ref url) = self.webhook {
            body.insert("webhook".to_string(), Value::String(url.clone()));
        }
        Value::Object(body)
    }
}

/// Reference to a job the service is still working on.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobHandle {
    /// Opaque job identifier.
    pub id: String,
    /// Estimated seconds until completion. A hint only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eta: Option<f64>,
    /// Status URL echoed by the service, used instead of the configured
    /// fetch path when present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fetch_url: Option<String>,
}

impl JobHandle {
    /// Creates a handle for an id obtained out of band.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            eta: None,
            fetch_url: None,
        }
    }

    /// Sets an explicit status URL.
    #[must_use]
    pub fn with_fetch_url(mut self, url: impl Into<String>) -> Self {
        self.fetch_url = Some(url.into());
        self
    }
}

/// Classified outcome of a submit, poll or webhook payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum GenerationResult {
    /// The job finished; `outputs` is never empty.
    Success {
        /// Output URLs in the order the service listed them.
        outputs: Vec<String>,
        /// Remaining top-level fields of the payload.
        metadata: Map<String, Value>,
    },
    /// The service declared the job failed.
    Failure {
        /// Remote message or a fixed fallback.
        message: String,
        /// Remote error code, if any.
        #[serde(skip_serializing_if = "Option::is_none")]
        remote_code: Option<String>,
    },
    /// The job is still running.
    Pending {
        /// Handle to poll.
        handle: JobHandle,
    },
}

impl GenerationResult {
    /// First output URL of a success.
    pub fn first_output(&self) -> Option<&str> {
        match self {
            Self::Success { outputs, .. } => outputs.first().map(String::as_str),
            _ => None,
        }
    }

    /// Returns true when no further transitions can happen.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending { .. })
    }

    /// Converts into the output list, turning a remote failure into
    /// [`JobError::Remote`](super::JobError::Remote).
    pub fn into_outputs(self) -> Result<Vec<String>, super::JobError> {
        match self {
            Self::Success { outputs, .. } => Ok(outputs),
            Self::Failure {
                message,
                remote_code,
            } => Err(super::JobError::Remote {
                message,
                remote_code,
            }),
            Self::Pending { handle } => Err(super::JobError::UnexpectedResponse(format!(
                "job {} is still processing",
                handle.id
            ))),
        }
    }
}

/// How often to poll and for how long.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    /// Wait before each status fetch.
    pub interval: Duration,
    /// Total polling budget.
    pub timeout: Duration,
}

impl PollSettings {
    /// Creates poll settings from whole seconds.
    pub fn from_secs(interval_secs: u64, timeout_secs: u64) -> Self {
        Self {
            interval: Duration::from_secs(interval_secs),
            timeout: Duration::from_secs(timeout_secs),
        }
    }
}

impl Default for PollSettings {
    fn default() -> Self {
        Self::from_secs(5, 180)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn body_includes_token_and_webhook_only_when_set() {
        let bare = GenerationRequest::new("/images/text2img").param("prompt", "a cat");
        assert_eq!(bare.body(), json!({"prompt": "a cat"}));

        let full = bare
            .clone()
            .track_id("order-17")
            .webhook("https://example.com/hook");
        assert_eq!(
            full.body(),
            json!({
                "prompt": "a cat",
                "track_id": "order-17",
                "webhook": "https://example.com/hook"
            })
        );
        assert_eq!(full.tracking_token(), Some("order-17"));
    }

    #[test]
    fn failure_into_outputs_is_remote_error() {
        let result = GenerationResult::Failure {
            message: "insufficient balance".to_string(),
            remote_code: None,
        };
        assert_eq!(
            result.into_outputs(),
            Err(super::super::JobError::Remote {
                message: "insufficient balance".to_string(),
                remote_code: None,
            })
        );
    }

    #[test]
    fn result_serializes_with_status_tag() {
        let result = GenerationResult::Pending {
            handle: JobHandle::new("job_1"),
        };
        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            json!({"status": "pending", "handle": {"id": "job_1"}})
        );
    }
}
