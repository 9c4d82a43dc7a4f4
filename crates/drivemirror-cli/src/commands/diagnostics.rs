//! Diagnostics command - point-in-time snapshot of the engine state
//!
//! Provides the `drivemirror diagnostics` CLI command which collects the
//! connection status, crawl state, catalog counts, and a peek at pending
//! remote changes into one report.

use anyhow::{Context, Result};
use clap::Args;

use crate::context::AppContext;
use crate::output::{get_formatter, OutputFormat};

#[derive(Debug, Args)]
pub struct DiagnosticsCommand {}

impl DiagnosticsCommand {
    pub async fn execute(&self, config_path: Option<&str>, format: OutputFormat) -> Result<()> {
        let fmt = get_formatter(format == OutputFormat::Json);
        let ctx = AppContext::init(config_path).await?;

        let snapshot = ctx
            .diagnostics
            .snapshot(&ctx.user_id)
            .await
            .context("Failed to collect diagnostics")?;

        if format == OutputFormat::Json {
            fmt.print_json(&serde_json::to_value(&snapshot)?);
            return Ok(());
        }

        fmt.success("Engine state");
        fmt.kv(
            "Connected:",
            if snapshot.connection.connected {
                "yes"
            } else {
                "no"
            },
        );
        if let Some(reason) = &snapshot.connection.reason {
            fmt.kv("Auth required:", &reason.to_string());
        }
        match (
            &snapshot.connection.dedicated_folder_name,
            &snapshot.connection.dedicated_folder_id,
        ) {
            (Some(name), Some(id)) => fmt.kv("Mirrored folder:", &format!("{} ({})", name, id)),
            _ => fmt.kv("Mirrored folder:", "not configured"),
        }

        match &snapshot.sync_status {
            Some(status) => fmt.kv("Sync status:", &status.to_string()),
            None => fmt.kv("Sync status:", "never armed"),
        }
        if let Some(root) = &snapshot.root_folder_id {
            fmt.kv("Armed root:", root.as_str());
        }
        fmt.kv("Queued folders:", &snapshot.queued_folders.to_string());
        fmt.kv(
            "Change cursor:",
            if snapshot.cursor_initialized {
                "initialized"
            } else {
                "not initialized"
            },
        );
        fmt.kv("Catalog items:", &snapshot.item_count.to_string());
        fmt.kv("Trashed items:", &snapshot.trashed_count.to_string());
        if let Some(at) = snapshot.last_full_scan_at {
            fmt.kv(
                "Last full crawl:",
                &at.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
            );
        }
        if let Some(at) = snapshot.last_changes_at {
            fmt.kv(
                "Last changes pull:",
                &at.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
            );
        }
        match snapshot.pending_changes {
            Some(count) => fmt.kv("Pending changes:", &count.to_string()),
            None => fmt.kv("Pending changes:", "unknown (peek unavailable)"),
        }
        fmt.kv(
            "Catalog database:",
            &ctx.config.storage.db_path.display().to_string(),
        );
        Ok(())
    }
}
