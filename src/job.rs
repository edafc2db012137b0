//! Asynchronous generation job protocol.
//!
//! Every generation endpoint answers a submission in one of three ways:
//! a finished result, a declared failure, or a pending job id. Pending jobs
//! are resolved by polling a status endpoint or by a webhook notification.

pub mod classify;
pub mod client;
pub mod error;
pub mod retry;
pub mod transport;
pub mod types;
pub mod webhook;

#[cfg(test)]
pub(crate) mod test_utils;

pub use classify::{classify, classify_str};
pub use client::{AsyncJobClient, ClientConfig};
pub use error::JobError;
pub use retry::RetryPolicy;
pub use transport::{HttpTransport, Transport, TransportFailure, TransportRequest, TransportResponse};
pub use types::{GenerationRequest, GenerationResult, JobHandle, PollSettings};
pub use webhook::{
    accept_webhook, match_webhook, IdempotencyStore, MemoryIdempotencyStore, WebhookNotification,
};
