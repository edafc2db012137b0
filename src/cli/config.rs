//! Configuration-related CLI commands.

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::cli::output::render_endpoint_table;
use crate::profiles::{get_profile_registry, PROFILES_YAML};

/// Configuration operations.
#[derive(Parser)]
pub struct ConfigCommand {
    /// Configuration subcommand to execute.
    #[command(subcommand)]
    pub command: ConfigSubcommands,
}

/// Configuration subcommands.
#[derive(Subcommand)]
pub enum ConfigSubcommands {
    /// Media profiles and polling defaults.
    Profiles(ProfilesCommand),
    /// Endpoint catalog.
    Endpoints(EndpointsCommand),
}

/// Profiles operations.
#[derive(Parser)]
pub struct ProfilesCommand {
    /// Profiles subcommand to execute.
    #[command(subcommand)]
    pub command: ProfilesSubcommands,
}

/// Profiles subcommands.
#[derive(Subcommand)]
pub enum ProfilesSubcommands {
    /// Shows the embedded profiles.yaml configuration.
    Show(ShowCommand),
}

/// Show command options.
#[derive(Parser)]
pub struct ShowCommand {}

/// Endpoints operations.
#[derive(Parser)]
pub struct EndpointsCommand {
    /// Endpoints subcommand to execute.
    #[command(subcommand)]
    pub command: EndpointsSubcommands,
}

/// Endpoints subcommands.
#[derive(Subcommand)]
pub enum EndpointsSubcommands {
    /// Lists known endpoints with their media kind and required parameters.
    List(ListCommand),
}

/// List command options.
#[derive(Parser)]
pub struct ListCommand {}

impl ConfigCommand {
    /// Executes the config command.
    pub fn execute(self) -> Result<()> {
        match self.command {
            ConfigSubcommands::Profiles(cmd) => cmd.execute(),
            ConfigSubcommands::Endpoints(cmd) => cmd.execute(),
        }
    }
}

impl ProfilesCommand {
    /// Executes the profiles command.
    pub fn execute(self) -> Result<()> {
        match self.command {
            ProfilesSubcommands::Show(show_cmd) => show_cmd.execute(),
        }
    }
}

impl ShowCommand {
    /// Executes the show command.
    pub fn execute(self) -> Result<()> {
        println!("{PROFILES_YAML}");
        Ok(())
    }
}

impl EndpointsCommand {
    /// Executes the endpoints command.
    pub fn execute(self) -> Result<()> {
        match self.command {
            EndpointsSubcommands::List(list_cmd) => list_cmd.execute(),
        }
    }
}

impl ListCommand {
    /// Executes the list command.
    pub fn execute(self) -> Result<()> {
        let registry = get_profile_registry()?;
        println!("{}", render_endpoint_table(registry.endpoints()));
        Ok(())
    }
}
