//! Folder commands - configure the mirrored Drive folder
//!
//! Provides the `drivemirror folder` CLI subcommands which:
//! 1. `set`       - Pins the remote folder whose subtree gets mirrored.
//! 2. `downloads` - Toggles content downloads for the configured mirror.

use std::str::FromStr;

use anyhow::{Context, Result};
use clap::Subcommand;

use drivemirror_core::domain::FolderId;

use crate::context::AppContext;
use crate::output::{get_formatter, OutputFormat};

#[derive(Debug, Subcommand)]
pub enum FolderCommand {
    /// Configure the remote folder to mirror
    Set {
        /// Drive folder id
        folder_id: String,

        /// Display name of the folder
        #[arg(long)]
        name: String,

        /// Full path of the folder in the Drive hierarchy
        #[arg(long, default_value = "/")]
        path: String,
    },
    /// Enable or disable content downloads
    Downloads {
        /// "on" or "off"
        state: String,
    },
}

impl FolderCommand {
    pub async fn execute(&self, config_path: Option<&str>, format: OutputFormat) -> Result<()> {
        let fmt = get_formatter(format == OutputFormat::Json);
        let ctx = AppContext::init(config_path).await?;

        match self {
            FolderCommand::Set {
                folder_id,
                name,
                path,
            } => {
                let folder_id = FolderId::from_str(folder_id).context("Invalid folder id")?;
                let settings = ctx
                    .folder
                    .execute(ctx.user_id, folder_id, name, path)
                    .await
                    .context("Failed to configure folder")?;

                fmt.success(&format!(
                    "Mirroring '{}' ({})",
                    settings.folder_name(),
                    settings.folder_id()
                ));
                fmt.info("Run 'drivemirror sync' to start the crawl.");
                Ok(())
            }
            FolderCommand::Downloads { state } => {
                let enabled = match state.as_str() {
                    "on" => true,
                    "off" => false,
                    other => anyhow::bail!("Invalid state '{}'; expected 'on' or 'off'", other),
                };
                let settings = ctx
                    .folder
                    .set_downloads_enabled(&ctx.user_id, enabled)
                    .await
                    .context("Failed to toggle downloads")?;

                fmt.success(&format!(
                    "Downloads {} for '{}'",
                    if settings.downloads_enabled() {
                        "enabled"
                    } else {
                        "disabled"
                    },
                    settings.folder_name()
                ));
                Ok(())
            }
        }
    }
}
