//! Job protocol error handling.

use std::time::Duration;

use thiserror::Error;

/// Errors produced while submitting, polling or matching a generation job.
///
/// Every variant is returned as a value so that a caller driving many jobs
/// can keep going after one of them fails. Only [`JobError::Transport`] is
/// ever retried inside the client.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum JobError {
    /// Network-layer failure that persisted through every retry attempt.
    #[error("Transport failed after {attempts} attempt(s): {message}")]
    Transport {
        /// Number of attempts made before giving up.
        attempts: u32,
        /// Description of the last failure.
        message: String,
    },

    /// Body was not a JSON object or carried an unrecognised `status`.
    #[error("Unexpected response from generation service: {0}")]
    UnexpectedResponse(String),

    /// A `success` response had no output URLs.
    #[error("Generation service reported success without any output")]
    EmptyOutput,

    /// A `processing` response had no job id to poll.
    #[error("Generation service reported a pending job without an id")]
    MissingJobId,

    /// The remote service declared the job failed.
    #[error("Generation failed: {message}")]
    Remote {
        /// Message supplied by the remote service.
        message: String,
        /// Remote error code, when one was supplied.
        remote_code: Option<String>,
    },

    /// The polling budget ran out while the job was still processing.
    #[error("Job still processing after {elapsed:?} ({polls} poll(s))")]
    Timeout {
        /// Time spent in the polling loop.
        elapsed: Duration,
        /// Number of status fetches issued.
        polls: u32,
    },

    /// The caller cancelled the polling loop.
    #[error("Polling cancelled after {polls} poll(s)")]
    Cancelled {
        /// Number of status fetches issued before cancellation.
        polls: u32,
    },

    /// A webhook payload did not carry the expected tracking token.
    #[error("Webhook tracking token mismatch: expected {expected:?}, found {found:?}")]
    TokenMismatch {
        /// Token the caller was waiting for.
        expected: String,
        /// Token found in the payload, if any.
        found: Option<String>,
    },

    /// The idempotency store could not record a delivery.
    #[error("Idempotency store failed: {0}")]
    Idempotency(String),

    /// The request could not be sent as built.
    #[error("Invalid generation request: {0}")]
    InvalidRequest(String),

    /// Required endpoint parameters were not supplied.
    #[error("Endpoint {endpoint} is missing required parameter(s): {}", missing.join(", "))]
    MissingParameters {
        /// Endpoint name.
        endpoint: String,
        /// Names of the absent parameters.
        missing: Vec<String>,
    },
}

impl JobError {
    /// Returns true when resubmitting the same call might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_transport_is_retryable() {
        let transport = JobError::Transport {
            attempts: 3,
            message: "connection refused".to_string(),
        };
        assert!(transport.is_retryable());
        assert!(!JobError::EmptyOutput.is_retryable());
        assert!(!JobError::Timeout {
            elapsed: Duration::from_secs(900),
            polls: 90
        }
        .is_retryable());
    }

    #[test]
    fn missing_parameters_lists_names() {
        let err = JobError::MissingParameters {
            endpoint: "text2video".to_string(),
            missing: vec!["prompt".to_string(), "model_id".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "Endpoint text2video is missing required parameter(s): prompt, model_id"
        );
    }
}
