//! Matching inbound webhook notifications to submitted requests.
//!
//! Hosting the listener is the caller's business. This module only checks
//! the tracking token, classifies the payload with the same rule as submit
//! and poll responses, and offers an [`IdempotencyStore`] seam for dropping
//! repeated deliveries.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;
use std::time::Duration;

use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::classify::classify;
use super::error::JobError;
use super::types::GenerationResult;

/// A parsed webhook body.
#[derive(Debug, Clone, PartialEq)]
pub struct WebhookNotification {
    payload: Value,
}

impl WebhookNotification {
    /// Wraps an already parsed body.
    pub fn new(payload: Value) -> Self {
        Self { payload }
    }

    /// Parses a raw body.
    pub fn parse(body: &str) -> Result<Self, JobError> {
        serde_json::from_str(body)
            .map(Self::new)
            .map_err(|e| JobError::UnexpectedResponse(format!("webhook body is not JSON: {e}")))
    }

    /// Tracking token echoed by the service, if it is a string.
    pub fn track_id(&self) -> Option<&str> {
        self.payload.get("track_id").and_then(Value::as_str)
    }

    /// The raw payload.
    pub fn payload(&self) -> &Value {
        &self.payload
    }
}

/// Checks the tracking token and classifies a terminal notification.
///
/// A token mismatch wins over whatever the payload says. A `processing`
/// notification is anomalous and reported as
/// [`JobError::UnexpectedResponse`].
pub fn match_webhook(
    notification: &WebhookNotification,
    expected_token: &str,
) -> Result<GenerationResult, JobError> {
    let found = notification.track_id();
    if found != Some(expected_token) {
        return Err(JobError::TokenMismatch {
            expected: expected_token.to_string(),
            found: found.map(str::to_string),
        });
    }

    match classify(notification.payload())? {
        GenerationResult::Pending { handle } => Err(JobError::UnexpectedResponse(format!(
            "webhook for job {} is still processing",
            handle.id
        ))),
        terminal => Ok(terminal),
    }
}

/// Records which tracking tokens have already been delivered.
///
/// Webhooks can be delivered more than once and to any instance behind a
/// load balancer, so production implementations belong in shared storage
/// (a key-value store with a TTL keyed by token).
pub trait IdempotencyStore: Send + Sync {
    /// Marks the token as seen and returns true if it was not seen before.
    fn first_delivery<'a>(
        &'a self,
        token: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<bool, JobError>> + Send + 'a>>;
}

/// In-process [`IdempotencyStore`] with expiring entries.
///
/// Only suitable for a single instance; each store is independent.
pub struct MemoryIdempotencyStore {
    ttl: Duration,
    seen: Mutex<HashMap<String, Instant>>,
}

impl MemoryIdempotencyStore {
    /// Creates a store whose entries expire after `ttl`.
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            seen: Mutex::new(HashMap::new()),
        }
    }

    /// Number of unexpired tokens.
    ///
    /// Fails with [`JobError::Idempotency`] once the store is poisoned, as
    /// [`IdempotencyStore::first_delivery`] does.
    pub fn len(&self) -> Result<usize, JobError> {
        let now = Instant::now();
        let seen = self.seen.lock().map_err(|_| poisoned())?;
        Ok(seen.values().filter(|expiry| **expiry > now).count())
    }

    /// Returns true if no unexpired tokens are held.
    pub fn is_empty(&self) -> Result<bool, JobError> {
        Ok(self.len()? == 0)
    }
}

impl IdempotencyStore for MemoryIdempotencyStore {
    fn first_delivery<'a>(
        &'a self,
        token: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<bool, JobError>> + Send + 'a>> {
        Box::pin(async move {
            let now = Instant::now();
            let mut seen = self
                .seen
                .lock()
                .map_err(|_| poisoned())?;
            seen.retain(|_, expiry| *expiry > now);
            if seen.contains_key(token) {
                return Ok(false);
            }
            seen.insert(token.to_string(), now + self.ttl);
            Ok(true)
        })
    }
}

fn poisoned() -> JobError {
    JobError::Idempotency("store lock poisoned".to_string())
}

/// Matches a notification and drops repeated deliveries.
///
/// Returns `Ok(None)` when the token was already delivered. The token is
/// only recorded once the notification has matched and classified.
pub async fn accept_webhook(
    store: &dyn IdempotencyStore,
    notification: &WebhookNotification,
    expected_token: &str,
) -> Result<Option<GenerationResult>, JobError> {
    let result = match match_webhook(notification, expected_token) {
        Ok(result) => result,
        Err(err) => {
            warn!(expected_token, error = %err, "Rejected webhook notification");
            return Err(err);
        }
    };

    if store.first_delivery(expected_token).await? {
        debug!(track_id = expected_token, "Accepted webhook notification");
        Ok(Some(result))
    } else {
        debug!(track_id = expected_token, "Ignored repeated webhook notification");
        Ok(None)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use proptest::prelude::*;
    use serde_json::json;

    use super::*;

    fn notification(payload: Value) -> WebhookNotification {
        WebhookNotification::new(payload)
    }

    #[test]
    fn matching_success_notification() {
        let n = notification(json!({
            "status": "success",
            "track_id": "order-17",
            "output": ["https://x/a.png"]
        }));
        let result = match_webhook(&n, "order-17").unwrap();
        assert_eq!(result.first_output(), Some("https://x/a.png"));
    }

    #[test]
    fn matching_failure_notification() {
        let n = notification(json!({
            "status": "error",
            "track_id": "order-17",
            "message": "model crashed"
        }));
        assert_eq!(
            match_webhook(&n, "order-17").unwrap(),
            GenerationResult::Failure {
                message: "model crashed".to_string(),
                remote_code: None,
            }
        );
    }

    #[test]
    fn missing_token_is_mismatch() {
        let n = notification(json!({"status": "success", "output": ["u"]}));
        assert_eq!(
            match_webhook(&n, "order-17"),
            Err(JobError::TokenMismatch {
                expected: "order-17".to_string(),
                found: None,
            })
        );
    }

    #[test]
    fn processing_notification_is_unexpected() {
        let n = notification(json!({"status": "processing", "track_id": "t", "id": "j"}));
        assert!(matches!(
            match_webhook(&n, "t"),
            Err(JobError::UnexpectedResponse(_))
        ));
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(matches!(
            WebhookNotification::parse("track_id=t"),
            Err(JobError::UnexpectedResponse(_))
        ));
    }

    proptest! {
        #[test]
        fn mismatched_token_always_rejected(
            expected in "[a-z0-9]{1,16}",
            found in "[a-z0-9]{1,16}",
            status in prop::sample::select(vec!["success", "error", "failed", "processing", "bogus"]),
        ) {
            prop_assume!(expected != found);
            let n = notification(json!({
                "status": status,
                "track_id": found,
                "output": ["https://x/a.png"],
                "id": "j"
            }));
            let is_mismatch = matches!(
                match_webhook(&n, &expected),
                Err(JobError::TokenMismatch { .. })
            );
            prop_assert!(is_mismatch);
        }
    }

    #[tokio::test]
    async fn repeated_delivery_is_dropped() {
        let store = MemoryIdempotencyStore::new(Duration::from_secs(3600));
        let n = notification(json!({
            "status": "success",
            "track_id": "order-17",
            "output": ["https://x/a.png"]
        }));

        let first = accept_webhook(&store, &n, "order-17").await.unwrap();
        let second = accept_webhook(&store, &n, "order-17").await.unwrap();

        assert!(first.is_some());
        assert!(second.is_none());
        assert_eq!(store.len().unwrap(), 1);
    }

    #[tokio::test]
    async fn rejected_notification_is_not_recorded() {
        let store = MemoryIdempotencyStore::new(Duration::from_secs(3600));
        let n = notification(json!({"status": "success", "track_id": "other", "output": ["u"]}));

        assert!(accept_webhook(&store, &n, "order-17").await.is_err());
        assert!(store.is_empty().unwrap());
    }

    #[tokio::test]
    async fn poisoned_store_reports_errors() {
        let store = MemoryIdempotencyStore::new(Duration::from_secs(60));
        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = store.seen.lock().unwrap();
            panic!("writer died holding the lock");
        }));
        assert!(outcome.is_err());

        assert!(matches!(store.len(), Err(JobError::Idempotency(_))));
        assert!(matches!(store.is_empty(), Err(JobError::Idempotency(_))));
        assert!(matches!(
            store.first_delivery("t").await,
            Err(JobError::Idempotency(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn entries_expire_after_ttl() {
        let store = MemoryIdempotencyStore::new(Duration::from_secs(60));
        assert!(store.first_delivery("t").await.unwrap());
        assert!(!store.first_delivery("t").await.unwrap());

        tokio::time::advance(Duration::from_secs(61)).await;
        assert!(store.first_delivery("t").await.unwrap());
    }
}
