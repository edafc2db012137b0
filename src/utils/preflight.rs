//! Preflight validation checks for early failure detection
//!
//! Commands that talk to the generation service call these checks first so
//! that a missing API key or a malformed base URL fails fast with a clear
//! message instead of surfacing as a transport error.

use std::fmt;

use anyhow::{bail, Context, Result};

use crate::job::{ClientConfig, RetryPolicy};

/// Variable holding the API key.
pub const API_KEY_VAR: &str = "OMNI_GEN_API_KEY";
/// Variable overriding the service base URL.
pub const BASE_URL_VAR: &str = "OMNI_GEN_BASE_URL";
/// Variable overriding the transport retry budget.
pub const MAX_ATTEMPTS_VAR: &str = "OMNI_GEN_MAX_ATTEMPTS";
/// Base URL used when none is configured.
pub const DEFAULT_BASE_URL: &str = "https://modelslab.com/api/v6";

/// Result of credential validation
pub struct CredentialInfo {
    /// Service base URL
    pub base_url: String,
    /// API key
    pub api_key: String,
    /// Transport attempts per call
    pub max_attempts: u32,
}

impl fmt::Debug for CredentialInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialInfo")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .field("max_attempts", &self.max_attempts)
            .finish()
    }
}

impl CredentialInfo {
    /// Builds a client configuration from the validated values.
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig::new(self.base_url.clone())
            .with_api_key(self.api_key.clone())
            .with_retry(RetryPolicy::default().with_max_attempts(self.max_attempts))
    }
}

/// Validate credentials are available before talking to the service
///
/// Reads the process environment with fallback to the settings file.
pub fn check_credentials() -> Result<CredentialInfo> {
    use crate::utils::settings::get_env_var;

    credentials_from(|key| get_env_var(key).ok())
}

/// Validates credentials using an arbitrary variable lookup.
pub fn credentials_from(lookup: impl Fn(&str) -> Option<String>) -> Result<CredentialInfo> {
    let api_key = lookup(API_KEY_VAR)
        .filter(|key| !key.trim().is_empty())
        .ok_or_else(|| {
            anyhow::anyhow!(
                "Generation service API key not found.\n\
                 Set {API_KEY_VAR} in the environment or in ~/.omni-gen/settings.json"
            )
        })?;

    let base_url = lookup(BASE_URL_VAR).unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
    let parsed = url::Url::parse(&base_url)
        .with_context(|| format!("{BASE_URL_VAR} is not a valid URL: {base_url}"))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        bail!("{BASE_URL_VAR} must use http or https: {base_url}");
    }

    let max_attempts = match lookup(MAX_ATTEMPTS_VAR) {
        Some(value) => value
            .trim()
            .parse::<u32>()
            .ok()
            .filter(|attempts| *attempts > 0)
            .with_context(|| format!("{MAX_ATTEMPTS_VAR} must be a positive integer: {value}"))?,
        None => RetryPolicy::default().max_attempts,
    };

    Ok(CredentialInfo {
        base_url,
        api_key,
        max_attempts,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn missing_key_fails_fast() {
        let err = credentials_from(lookup(&[])).unwrap_err();
        assert!(err.to_string().contains(API_KEY_VAR));
    }

    #[test]
    fn blank_key_counts_as_missing() {
        assert!(credentials_from(lookup(&[(API_KEY_VAR, "  ")])).is_err());
    }

    #[test]
    fn defaults_apply() {
        let info = credentials_from(lookup(&[(API_KEY_VAR, "k")])).unwrap();
        assert_eq!(info.base_url, DEFAULT_BASE_URL);
        assert_eq!(info.max_attempts, 3);

        let config = info.client_config();
        assert_eq!(config.api_key.as_deref(), Some("k"));
        assert_eq!(config.retry.max_attempts, 3);
    }

    #[test]
    fn overrides_apply() {
        let info = credentials_from(lookup(&[
            (API_KEY_VAR, "k"),
            (BASE_URL_VAR, "http://localhost:8080/api"),
            (MAX_ATTEMPTS_VAR, "5"),
        ]))
        .unwrap();
        assert_eq!(info.base_url, "http://localhost:8080/api");
        assert_eq!(info.max_attempts, 5);
    }

    #[test]
    fn invalid_overrides_are_rejected() {
        assert!(credentials_from(lookup(&[(API_KEY_VAR, "k"), (BASE_URL_VAR, "not a url")])).is_err());
        assert!(credentials_from(lookup(&[(API_KEY_VAR, "k"), (BASE_URL_VAR, "ftp://x")])).is_err());
        assert!(credentials_from(lookup(&[(API_KEY_VAR, "k"), (MAX_ATTEMPTS_VAR, "0")])).is_err());
    }

    #[test]
    fn debug_redacts_key() {
        let info = credentials_from(lookup(&[(API_KEY_VAR, "super-secret")])).unwrap();
        assert!(!format!("{info:?}").contains("super-secret"));
    }
}
