//! Three-way classification of service payloads.
//!
//! Submit responses, poll responses and webhook notifications share one
//! shape, so they all go through [`classify`]. The rule is strict: an
//! unknown `status` is an error rather than a guess.

use serde_json::{Map, Value};

use super::error::JobError;
use super::types::{GenerationResult, JobHandle};

/// Message used when a failure payload carries no `message` field.
pub const FALLBACK_FAILURE_MESSAGE: &str = "remote job failed without a message";

/// Classifies a raw response body.
pub fn classify_str(body: &str) -> Result<GenerationResult, JobError> {
    let value: Value = serde_json::from_str(body)
        .map_err(|e| JobError::UnexpectedResponse(format!("body is not JSON: {e}")))?;
    classify(&value)
}

/// Classifies a parsed payload by its `status` field.
pub fn classify(payload: &Value) -> Result<GenerationResult, JobError> {
    let object = payload.as_object().ok_or_else(|| {
        JobError::UnexpectedResponse(format!("expected a JSON object, got {}", kind_of(payload)))
    })?;

    let status = match object.get("status") {
        Some(Value::String(status)) => status.as_str(),
        Some(other) => {
            return Err(JobError::UnexpectedResponse(format!(
                "status is a {}, not a string",
                kind_of(other)
            )))
        }
        None => {
            return Err(JobError::UnexpectedResponse(
                "missing status field".to_string(),
            ))
        }
    };

    match status {
        "success" => success(object),
        "error" | "failed" => Ok(failure(object)),
        "processing" => pending(object),
        other => Err(JobError::UnexpectedResponse(format!(
            "unrecognised status {other:?}"
        ))),
    }
}

fn success(object: &Map<String, Value>) -> Result<GenerationResult, JobError> {
    let items = match object.get("output") {
        Some(Value::Array(items)) if !items.is_empty() => items,
        Some(Value::Array(_)) | Some(Value::Null) | None => return Err(JobError::EmptyOutput),
        Some(other) => {
            return Err(JobError::UnexpectedResponse(format!(
                "output is a {}, not an array",
                kind_of(other)
            )))
        }
    };

    let outputs = items
        .iter()
        .map(|item| {
            item.as_str().map(str::to_string).ok_or_else(|| {
                JobError::UnexpectedResponse(format!(
                    "output entry is a {}, not a URL string",
                    kind_of(item)
                ))
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let metadata = object
        .iter()
        .filter(|(key, _)| !matches!(key.as_str(), "status" | "output"))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();

    Ok(GenerationResult::Success { outputs, metadata })
}

fn failure(object: &Map<String, Value>) -> GenerationResult {
    let message = match object.get("message") {
        Some(Value::String(message)) if !message.is_empty() => message.clone(),
        // Validation errors arrive as an object keyed by field name.
        Some(value @ (Value::Object(_) | Value::Array(_))) => value.to_string(),
        _ => FALLBACK_FAILURE_MESSAGE.to_string(),
    };

    GenerationResult::Failure {
        message,
        remote_code: object.get("code").and_then(scalar_to_string),
    }
}

fn pending(object: &Map<String, Value>) -> Result<GenerationResult, JobError> {
    let id = object
        .get("id")
        .and_then(scalar_to_string)
        .filter(|id| !id.is_empty())
        .ok_or(JobError::MissingJobId)?;

    Ok(GenerationResult::Pending {
        handle: JobHandle {
            id,
            eta: object.get("eta").and_then(Value::as_f64),
            fetch_url: object
                .get("fetch_result")
                .and_then(Value::as_str)
                .filter(|url| !url.is_empty())
                .map(str::to_string),
        },
    })
}

/// Renders a string or integer id; anything else is not an id.
fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) if n.is_i64() || n.is_u64() => Some(n.to_string()),
        _ => None,
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
