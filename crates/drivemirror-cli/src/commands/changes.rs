//! Changes commands - drive the incremental change pipeline
//!
//! Provides the `drivemirror changes` CLI subcommands which:
//! 1. `pull` - Drains the remote changes feed, applies the records to the
//!    catalog, and advances the stored cursor.
//! 2. `peek` - Counts pending remote changes without consuming the cursor.

use anyhow::{Context, Result};
use clap::Subcommand;
use tracing::info;

use crate::context::AppContext;
use crate::output::{get_formatter, OutputFormat};

#[derive(Debug, Subcommand)]
pub enum ChangesCommand {
    /// Apply pending remote changes to the catalog
    Pull,
    /// Count pending remote changes without applying them
    Peek,
}

impl ChangesCommand {
    pub async fn execute(&self, config_path: Option<&str>, format: OutputFormat) -> Result<()> {
        let fmt = get_formatter(format == OutputFormat::Json);
        let ctx = AppContext::init(config_path).await?;

        match self {
            ChangesCommand::Pull => {
                let report = match ctx.changes.pull(&ctx.user_id).await {
                    Ok(report) => report,
                    Err(err) => {
                        ctx.audit.log_sync_error(ctx.user_id, &err).await;
                        return Err(anyhow::Error::new(err).context("Changes pull failed"));
                    }
                };

                info!(
                    applied = report.applied,
                    trashed = report.trashed,
                    "Changes pull finished"
                );

                if format == OutputFormat::Json {
                    fmt.print_json(&serde_json::json!({
                        "applied": report.applied,
                        "trashed": report.trashed,
                        "enqueued_folders": report.enqueued_folders,
                        "skipped": report.skipped,
                        "new_cursor": report.new_cursor.to_string(),
                    }));
                    return Ok(());
                }

                if report.applied == 0 && report.trashed == 0 && report.enqueued_folders == 0 {
                    fmt.success("Catalog is up to date");
                } else {
                    fmt.success("Changes applied");
                    fmt.kv("Updated items:", &report.applied.to_string());
                    if report.trashed > 0 {
                        fmt.kv("Moved to trash:", &report.trashed.to_string());
                    }
                    if report.enqueued_folders > 0 {
                        fmt.kv("New folders queued:", &report.enqueued_folders.to_string());
                        fmt.info("Run 'drivemirror sync' to crawl the new folders.");
                    }
                }
                if report.skipped > 0 {
                    fmt.kv("Outside mirror:", &report.skipped.to_string());
                }
                Ok(())
            }
            ChangesCommand::Peek => {
                let pending = ctx
                    .changes
                    .peek(&ctx.user_id)
                    .await
                    .context("Changes peek failed")?;

                if format == OutputFormat::Json {
                    fmt.print_json(&serde_json::json!({ "pending_changes": pending }));
                    return Ok(());
                }

                if pending == 0 {
                    fmt.success("No pending remote changes");
                } else {
                    fmt.success(&format!("{} pending remote change(s)", pending));
                    fmt.info("Run 'drivemirror changes pull' to apply them.");
                }
                Ok(())
            }
        }
    }
}
