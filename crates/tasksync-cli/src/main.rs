//! tasksync CLI - Command-line interface for tasksync
//!
//! Provides commands for:
//! - Connecting to and disconnecting from the WebDAV server
//! - Running a sync cycle on demand
//! - Managing tasks in the local store
//! - Viewing the sync log and status
//! - Inspecting configuration

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod output;

use commands::{
    completions::CompletionsCommand,
    config::ConfigCommand,
    connect::{ConnectCommand, DisconnectCommand},
    log::LogCommand,
    status::StatusCommand,
    sync::SyncCommand,
    task::TaskCommand,
    CommandContext,
};
use output::OutputFormat;

#[derive(Debug, Parser)]
#[command(name = "tasksync", version, about = "Local-first task list with WebDAV sync")]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,

    /// Verbose output (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Use alternate config file
    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Verify and save WebDAV connection settings
    Connect(ConnectCommand),
    /// Forget the saved connection
    Disconnect(DisconnectCommand),
    /// Run one sync cycle now
    Sync(SyncCommand),
    /// Manage tasks
    #[command(subcommand)]
    Task(TaskCommand),
    /// Show recent sync log entries
    Log(LogCommand),
    /// Show connection and sync status
    Status(StatusCommand),
    /// View configuration
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Generate shell completions
    Completions(CompletionsCommand),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let ctx = CommandContext::new(OutputFormat::from_flag(cli.json), cli.config.as_deref());

    match cli.command {
        Commands::Connect(cmd) => cmd.execute(&ctx).await,
        Commands::Disconnect(cmd) => cmd.execute(&ctx).await,
        Commands::Sync(cmd) => cmd.execute(&ctx).await,
        Commands::Task(cmd) => cmd.execute(&ctx).await,
        Commands::Log(cmd) => cmd.execute(&ctx).await,
        Commands::Status(cmd) => cmd.execute(&ctx).await,
        Commands::Config(cmd) => cmd.execute(&ctx).await,
        Commands::Completions(cmd) => cmd.execute(&ctx).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn global_flags_apply_after_subcommand() {
        let cli = Cli::try_parse_from(["tasksync", "status", "--json", "-vv"]).unwrap();
        assert!(cli.json);
        assert_eq!(cli.verbose, 2);
        assert!(matches!(cli.command, Commands::Status(_)));
    }

    #[test]
    fn alternate_config_is_captured() {
        let cli =
            Cli::try_parse_from(["tasksync", "--config", "/tmp/alt.yaml", "sync"]).unwrap();
        assert_eq!(cli.config.as_deref(), Some("/tmp/alt.yaml"));
        assert!(matches!(cli.command, Commands::Sync(_)));
    }

    #[test]
    fn task_subcommand_is_required() {
        assert!(Cli::try_parse_from(["tasksync", "task"]).is_err());
    }
}
