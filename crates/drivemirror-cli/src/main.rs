//! DriveMirror CLI - Command-line interface for the mirror engine
//!
//! Provides commands for:
//! - Authentication with Google Drive
//! - Configuring the mirrored folder
//! - Running the full crawl and the incremental change pipeline
//! - Inspecting engine state and the audit trail

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod context;
mod output;

use commands::{
    audit::AuditCommand, auth::AuthCommand, changes::ChangesCommand,
    diagnostics::DiagnosticsCommand, folder::FolderCommand, sync::SyncCommand,
};
use output::OutputFormat;

#[derive(Debug, Parser)]
#[command(name = "drivemirror", version, about = "Mirror a Google Drive folder into a local catalog")]
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
    /// Authentication commands
    #[command(subcommand)]
    Auth(AuthCommand),
    /// Configure the mirrored folder
    #[command(subcommand)]
    Folder(FolderCommand),
    /// Run a full crawl to completion
    Sync(SyncCommand),
    /// Pull or peek the remote changes feed
    #[command(subcommand)]
    Changes(ChangesCommand),
    /// Show a snapshot of the engine state
    Diagnostics(DiagnosticsCommand),
    /// View audit log entries
    Audit(AuditCommand),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup tracing
    let filter = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .init();

    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Human
    };
    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Auth(cmd) => cmd.execute(config_path, format).await,
        Commands::Folder(cmd) => cmd.execute(config_path, format).await,
        Commands::Sync(cmd) => cmd.execute(config_path, format).await,
        Commands::Changes(cmd) => cmd.execute(config_path, format).await,
        Commands::Diagnostics(cmd) => cmd.execute(config_path, format).await,
        Commands::Audit(cmd) => cmd.execute(config_path, format).await,
    }
}
