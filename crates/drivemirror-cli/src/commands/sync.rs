//! Sync command - run a full crawl to completion
//!
//! Provides the `drivemirror sync` CLI command which reconciles the
//! crawl state, drives budgeted runner batches until the pending queue
//! drains, and finishes with a changes pull from the captured cursor.

use anyhow::{Context, Result};
use clap::Args;
use tracing::info;

use crate::context::AppContext;
use crate::output::{get_formatter, OutputFormat};

#[derive(Debug, Args)]
pub struct SyncCommand {}

impl SyncCommand {
    pub async fn execute(&self, config_path: Option<&str>, format: OutputFormat) -> Result<()> {
        let fmt = get_formatter(format == OutputFormat::Json);
        let ctx = AppContext::init(config_path).await?;

        fmt.info("Starting full crawl...");
        let started = std::time::Instant::now();

        // Failures are audited inside the orchestrator before they surface
        let report = ctx
            .orchestrator
            .execute(&ctx.user_id)
            .await
            .context("Sync failed")?;

        let elapsed = started.elapsed();
        info!(
            trace_id = %report.trace_id,
            iterations = report.iterations,
            "Sync finished"
        );

        if format == OutputFormat::Json {
            fmt.print_json(&serde_json::json!({
                "trace_id": report.trace_id.to_string(),
                "completed": report.completed,
                "iterations": report.iterations,
                "rearms": report.rearms,
                "folders_processed": report.folders_processed,
                "files_discovered": report.files_discovered,
                "changes_pulled": report.changes_pulled,
                "duration_ms": elapsed.as_millis() as u64,
            }));
            return Ok(());
        }

        if report.completed {
            fmt.success(&format!("Full crawl completed in {:.1}s", elapsed.as_secs_f64()));
        } else {
            fmt.warn("Iteration ceiling reached before the queue drained; run sync again");
        }
        fmt.kv("Folders listed:", &report.folders_processed.to_string());
        fmt.kv("Files discovered:", &report.files_discovered.to_string());
        fmt.kv("Changes applied:", &report.changes_pulled.to_string());
        if report.rearms > 0 {
            fmt.kv("Re-arms:", &report.rearms.to_string());
        }
        fmt.kv("Trace id:", &report.trace_id.to_string());
        Ok(())
    }
}
