//! CLI interface for omni-gen.

use anyhow::Result;
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;

pub mod config;
pub mod fetch;
pub mod generate;
pub mod output;
pub mod webhook;

/// omni-gen: submit and resolve asynchronous media generation jobs.
#[derive(Parser)]
#[command(name = "omni-gen")]
#[command(about = "Submit and resolve asynchronous media generation jobs", long_about = None)]
#[command(version)]
pub struct Cli {
    /// The main command to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Main command categories.
#[derive(Subcommand)]
pub enum Commands {
    /// Submits a generation request and waits for its result.
    Generate(generate::GenerateCommand),
    /// Polls an existing job by id.
    Fetch(fetch::FetchCommand),
    /// Webhook payload utilities.
    Webhook(webhook::WebhookCommand),
    /// Endpoint catalog and polling defaults.
    Config(config::ConfigCommand),
}

impl Cli {
    /// Executes the CLI command.
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Generate(cmd) => cmd.execute().await,
            Commands::Fetch(cmd) => cmd.execute().await,
            Commands::Webhook(cmd) => cmd.execute(),
            Commands::Config(cmd) => cmd.execute(),
        }
    }
}

/// Returns a token that is cancelled when the user presses Ctrl-C.
pub(crate) fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupt received, stopping after the current poll");
            trigger.cancel();
        }
    });
    token
}
