//! Webhook payload utilities.

use std::io::Read;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use crate::cli::output::print_result;
use crate::job::{match_webhook, GenerationResult, WebhookNotification};

/// Webhook operations.
#[derive(Parser)]
pub struct WebhookCommand {
    /// Webhook subcommand to execute.
    #[command(subcommand)]
    pub command: WebhookSubcommands,
}

/// Webhook subcommands.
#[derive(Subcommand)]
pub enum WebhookSubcommands {
    /// Verifies a captured webhook body against a tracking token.
    Check(CheckCommand),
}

/// Check command options.
#[derive(Parser)]
pub struct CheckCommand {
    /// File holding the webhook body, or `-` for stdin.
    pub file: PathBuf,

    /// Tracking token the notification must carry.
    #[arg(long)]
    pub token: String,

    /// Prints the result as JSON.
    #[arg(long)]
    pub json: bool,
}

impl WebhookCommand {
    /// Executes the webhook command.
    pub fn execute(self) -> Result<()> {
        match self.command {
            WebhookSubcommands::Check(cmd) => cmd.execute(),
        }
    }
}

impl CheckCommand {
    /// Executes the check command.
    pub fn execute(self) -> Result<()> {
        let body = self.read_body()?;
        let result = check_body(&body, &self.token)?;
        print_result(&result, self.json)?;
        if let GenerationResult::Failure { message, .. } = result {
            bail!("Webhook reports failure: {message}");
        }
        Ok(())
    }

    fn read_body(&self) -> Result<String> {
        if self.file.as_os_str() == "-" {
            let mut body = String::new();
            std::io::stdin()
                .read_to_string(&mut body)
                .context("Failed to read webhook body from stdin")?;
            Ok(body)
        } else {
            std::fs::read_to_string(&self.file)
                .with_context(|| format!("Failed to read {}", self.file.display()))
        }
    }
}

/// Parses a webhook body and matches it against the expected token.
pub fn check_body(body: &str, token: &str) -> Result<GenerationResult> {
    let notification = WebhookNotification::parse(body)?;
    Ok(match_webhook(&notification, token)?)
}
