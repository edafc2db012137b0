//! Generate command: submit a request and resolve it.

use anyhow::{bail, Context, Result};
use clap::Parser;
use serde_json::{Map, Value};

use crate::cli::output::print_result;
use crate::job::{AsyncJobClient, GenerationRequest, GenerationResult, PollSettings};
use crate::profiles::{get_profile_registry, MediaProfile};

/// Submits a generation request.
#[derive(Parser)]
pub struct GenerateCommand {
    /// Endpoint name from the catalog (see `config endpoints list`) or a raw path.
    pub endpoint: String,

    /// Request parameter, `key=value` for strings or `key:=json` for raw JSON.
    #[arg(short = 'p', long = "param", value_name = "KEY=VALUE")]
    pub params: Vec<String>,

    /// Tracking token echoed back in webhook notifications.
    #[arg(long)]
    pub track_id: Option<String>,

    /// URL the service should notify on completion.
    #[arg(long)]
    pub webhook: Option<String>,

    /// Prints the pending job instead of polling it.
    #[arg(long)]
    pub no_wait: bool,

    /// Seconds between polls (defaults to the endpoint's media profile).
    #[arg(long, value_name = "SECS")]
    pub poll_interval: Option<u64>,

    /// Polling budget in seconds (defaults to the endpoint's media profile).
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Prints the result as JSON.
    #[arg(long)]
    pub json: bool,
}

impl GenerateCommand {
    /// Executes the generate command.
    pub async fn execute(self) -> Result<()> {
        let registry = get_profile_registry()?;
        let endpoint = registry.resolve(&self.endpoint);
        let params = parse_params(&self.params)?;
        endpoint.validate(&params)?;

        let credentials = crate::utils::check_credentials()?;
        let media = registry
            .media(endpoint.media)
            .with_context(|| format!("No profile for media kind {}", endpoint.media))?;
        let poll = poll_settings(media, self.poll_interval, self.timeout);

        let client = AsyncJobClient::with_http(
            credentials
                .client_config()
                .with_fetch_path(media.fetch_path.clone())
                .with_poll(poll),
        )?;

        let mut request = GenerationRequest::new(endpoint.path.clone()).params(params);
        if let Some(token) = self.track_id {
            request = request.track_id(token);
        }
        if let Some(url) = self.webhook {
            request = request.webhook(url);
        }

        tracing::debug!(
            endpoint = %endpoint.name,
            media = %endpoint.media,
            interval_secs = poll.interval.as_secs(),
            timeout_secs = poll.timeout.as_secs(),
            "Running generate command"
        );

        let result = match client.submit(&request).await? {
            GenerationResult::Pending { handle } if !self.no_wait => {
                eprintln!(
                    "Job {} queued; polling every {}s for up to {}s",
                    handle.id,
                    poll.interval.as_secs(),
                    poll.timeout.as_secs()
                );
                let cancel = crate::cli::cancel_on_ctrl_c();
                client.resolve(&handle, poll, &cancel).await?
            }
            other => other,
        };

        print_result(&result, self.json)?;
        if let GenerationResult::Failure { message, .. } = result {
            bail!("Generation failed: {message}");
        }
        Ok(())
    }
}

/// Applies command-line overrides on top of a media profile.
pub(crate) fn poll_settings(
    media: &MediaProfile,
    interval_secs: Option<u64>,
    timeout_secs: Option<u64>,
) -> PollSettings {
    PollSettings::from_secs(
        interval_secs.unwrap_or(media.poll_interval_secs),
        timeout_secs.unwrap_or(media.timeout_secs),
    )
}

/// Parses `key=value` (string) and `key:=json` (raw JSON) arguments.
pub fn parse_params(args: &[String]) -> Result<Map<String, Value>> {
    let mut params = Map::new();
    for arg in args {
        let (key, value) = if let Some((key, raw)) = arg.split_once(":=") {
            let value = serde_json::from_str(raw)
                .with_context(|| format!("Invalid JSON value for parameter {key}: {raw}"))?;
            (key, value)
        } else if let Some((key, text)) = arg.split_once('=') {
            (key, Value::String(text.to_string()))
        } else {
            bail!("Parameter must be key=value or key:=json, got: {arg}");
        };

        let key = key.trim();
        if key.is_empty() {
            bail!("Parameter name must not be empty: {arg}");
        }
        params.insert(key.to_string(), value);
    }
    Ok(params)
}
