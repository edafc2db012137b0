//! Fetch command: poll a job that was submitted earlier.

use anyhow::{bail, Context, Result};
use clap::Parser;

use crate::cli::generate::poll_settings;
use crate::cli::output::print_result;
use crate::job::{AsyncJobClient, GenerationResult, JobHandle};
use crate::profiles::{get_profile_registry, MediaKind};

/// Polls an existing job until it finishes.
#[derive(Parser)]
pub struct FetchCommand {
    /// Job id returned by the service.
    pub id: String,

    /// Endpoint the job was submitted to; selects its media profile.
    #[arg(long, conflicts_with = "media")]
    pub endpoint: Option<String>,

    /// Media kind of the job (image, video, audio, 3d, deepfake, interior, text).
    #[arg(long)]
    pub media: Option<MediaKind>,

    /// Full fetch URL reported by the service, used instead of the profile path.
    #[arg(long)]
    pub fetch_url: Option<String>,

    /// Polls a single time and prints whatever state the job is in.
    #[arg(long)]
    pub once: bool,

    /// Seconds between polls.
    #[arg(long, value_name = "SECS")]
    pub poll_interval: Option<u64>,

    /// Polling budget in seconds.
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Prints the result as JSON.
    #[arg(long)]
    pub json: bool,
}

impl FetchCommand {
    /// Executes the fetch command.
    pub async fn execute(self) -> Result<()> {
        let registry = get_profile_registry()?;
        let kind = self.media_kind()?;
        let media = registry
            .media(kind)
            .with_context(|| format!("No profile for media kind {kind}"))?;
        let poll = poll_settings(media, self.poll_interval, self.timeout);

        let credentials = crate::utils::check_credentials()?;
        let client = AsyncJobClient::with_http(
            credentials
                .client_config()
                .with_fetch_path(media.fetch_path.clone())
                .with_poll(poll),
        )?;

        let mut handle = JobHandle::new(self.id.trim());
        if let Some(url) = self.fetch_url {
            handle = handle.with_fetch_url(url);
        }

        tracing::debug!(job_id = %handle.id, media = %kind, once = self.once, "Running fetch command");

        let result = if self.once {
            client.poll_once(&handle).await?
        } else {
            let cancel = crate::cli::cancel_on_ctrl_c();
            client.resolve(&handle, poll, &cancel).await?
        };

        print_result(&result, self.json)?;
        if let GenerationResult::Failure { message, .. } = result {
            bail!("Job {} failed: {message}", self.id);
        }
        Ok(())
    }

    fn media_kind(&self) -> Result<MediaKind> {
        if let Some(kind) = self.media {
            return Ok(kind);
        }
        match &self.endpoint {
            Some(name) => Ok(get_profile_registry()?.resolve(name).media),
            None => Ok(MediaKind::Image),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::cli::Cli;

    fn fetch(args: &[&str]) -> FetchCommand {
        let cli = Cli::try_parse_from(args).unwrap();
        match cli.command {
            crate::cli::Commands::Fetch(cmd) => cmd,
            _ => panic!("expected fetch command"),
        }
    }

    #[test]
    fn endpoint_selects_media_profile() {
        let cmd = fetch(&["omni-gen", "fetch", "42", "--endpoint", "text2video"]);
        assert_eq!(cmd.media_kind().unwrap(), MediaKind::Video);
    }

    #[test]
    fn explicit_media_wins() {
        let cmd = fetch(&["omni-gen", "fetch", "42", "--media", "3d", "--once"]);
        assert_eq!(cmd.media_kind().unwrap(), MediaKind::ThreeD);
        assert!(cmd.once);
    }

    #[test]
    fn defaults_to_image() {
        let cmd = fetch(&["omni-gen", "fetch", "42"]);
        assert_eq!(cmd.media_kind().unwrap(), MediaKind::Image);
    }

    #[test]
    fn endpoint_and_media_conflict() {
        let parsed = Cli::try_parse_from([
            "omni-gen",
            "fetch",
            "42",
            "--endpoint",
            "text2img",
            "--media",
            "video",
        ]);
        assert!(parsed.is_err());
    }
}
