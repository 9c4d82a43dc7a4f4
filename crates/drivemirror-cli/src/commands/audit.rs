//! Audit command - view audit log entries
//!
//! Provides the `drivemirror audit` CLI command which:
//! 1. Queries audit log entries with time and action filters
//! 2. Formats entries in a table with timestamp, action, result, and details
//! 3. Supports relative and absolute time parsing for the --since flag

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use clap::Args;
use tracing::info;

use crate::context::AppContext;
use crate::output::{get_formatter, OutputFormat};

#[derive(Debug, Args)]
pub struct AuditCommand {
    /// Show entries since this time (e.g., "1h", "2d", "2026-08-01")
    #[arg(long)]
    pub since: Option<String>,

    /// Filter by action type (substring match)
    #[arg(long)]
    pub action: Option<String>,

    /// Maximum number of entries to show
    #[arg(long, default_value = "50")]
    pub limit: u32,
}

impl AuditCommand {
    pub async fn execute(&self, config_path: Option<&str>, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format == OutputFormat::Json);
        let ctx = AppContext::init(config_path).await?;

        let since = match &self.since {
            Some(since_str) => parse_since(since_str).with_context(|| {
                format!(
                    "Invalid --since value: '{}'. Expected formats: '1h', '30m', '2d', \
                     '1w', '2026-08-01', '2026-08-01T12:00:00'",
                    since_str
                )
            })?,
            // Default: show the last 7 days
            None => Utc::now() - chrono::Duration::days(7),
        };

        let entries = ctx
            .audit
            .since(since, self.limit)
            .await
            .context("Failed to query audit entries")?;

        info!(count = entries.len(), "Retrieved audit entries");

        let filtered: Vec<_> = entries
            .iter()
            .filter(|entry| match &self.action {
                Some(action_filter) => entry.action().to_string().contains(action_filter.as_str()),
                None => true,
            })
            .collect();

        if format == OutputFormat::Json {
            let entries_json: Vec<serde_json::Value> = filtered
                .iter()
                .map(|entry| {
                    serde_json::json!({
                        "timestamp": entry.timestamp().to_rfc3339(),
                        "action": entry.action().to_string(),
                        "user_id": entry.user_id().map(|id| id.to_string()),
                        "success": entry.result().is_success(),
                        "trace_id": entry.trace_id().map(|id| id.to_string()),
                        "duration_ms": entry.duration_ms(),
                        "details": entry.details(),
                    })
                })
                .collect();

            formatter.print_json(&serde_json::json!({
                "since": since.to_rfc3339(),
                "limit": self.limit,
                "count": filtered.len(),
                "entries": entries_json,
            }));
            return Ok(());
        }

        if filtered.is_empty() {
            formatter.info("No audit entries found for the specified criteria.");
            return Ok(());
        }

        formatter.success(&format!("Audit Log ({} entries)", filtered.len()));
        formatter.info("");
        formatter.info("  Timestamp            Action               Result  Details");
        formatter.info("  -------------------- -------------------- ------- -------");

        for entry in &filtered {
            let timestamp = entry.timestamp().format("%Y-%m-%d %H:%M:%S");
            let result = if entry.result().is_success() {
                "OK     "
            } else {
                "FAILED "
            };
            let details = format_details(entry.details());

            formatter.info(&format!(
                "  {} {:<20} {} {}",
                timestamp,
                entry.action().to_string(),
                result,
                details
            ));
        }

        if filtered.len() as u32 >= self.limit {
            formatter.info("");
            formatter.info(&format!(
                "Showing {} entries (limit). Use --limit to show more.",
                self.limit
            ));
        }

        Ok(())
    }
}

/// Parse the --since argument into a DateTime<Utc>
///
/// Supports:
/// - Relative: "1h" (1 hour ago), "30m" (30 minutes), "2d" (2 days), "1w" (1 week)
/// - Absolute date: "2026-08-01"
/// - Absolute datetime: "2026-08-01T12:00:00"
fn parse_since(input: &str) -> Result<DateTime<Utc>> {
    let input = input.trim();

    if let Some(duration) = parse_relative_duration(input) {
        return Ok(Utc::now() - duration);
    }

    if let Ok(date) = NaiveDate::parse_from_str(input, "%Y-%m-%d") {
        let datetime = date
            .and_hms_opt(0, 0, 0)
            .context("Failed to create datetime from date")?;
        return Ok(DateTime::<Utc>::from_naive_utc_and_offset(datetime, Utc));
    }

    if let Ok(datetime) = NaiveDateTime::parse_from_str(input, "%Y-%m-%dT%H:%M:%S") {
        return Ok(DateTime::<Utc>::from_naive_utc_and_offset(datetime, Utc));
    }

    anyhow::bail!(
        "Could not parse '{}' as a time. Use relative (1h, 30m, 2d, 1w) or absolute (2026-08-01) format.",
        input
    )
}

/// Parse relative duration strings like "1h", "30m", "2d", "1w"
fn parse_relative_duration(input: &str) -> Option<chrono::Duration> {
    if input.len() < 2 {
        return None;
    }

    let (num_str, unit) = input.split_at(input.len() - 1);
    let num: i64 = num_str.parse().ok()?;

    match unit {
        "m" => Some(chrono::Duration::minutes(num)),
        "h" => Some(chrono::Duration::hours(num)),
        "d" => Some(chrono::Duration::days(num)),
        "w" => Some(chrono::Duration::weeks(num)),
        _ => None,
    }
}

/// Format audit entry details into a short summary string
fn format_details(details: Option<&serde_json::Value>) -> String {
    let Some(details) = details else {
        return String::new();
    };

    match details {
        serde_json::Value::String(s) => truncate_string(s, 40),
        serde_json::Value::Object(map) => {
            if let Some(message) = map.get("message").and_then(|v| v.as_str()) {
                return truncate_string(message, 40);
            }
            // Fallback: show the first key-value pair
            match map.iter().next() {
                Some((key, value)) => truncate_string(&format!("{}={}", key, value), 40),
                None => String::new(),
            }
        }
        other => truncate_string(&other.to_string(), 40),
    }
}

/// Truncate a string to at most `max` characters with an ellipsis
fn truncate_string(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{}\u{2026}", truncated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_since_relative() {
        let parsed = parse_since("2h").unwrap();
        let now = Utc::now();
        let diff = now - parsed;
        assert!(diff >= chrono::Duration::hours(2));
        assert!(diff < chrono::Duration::hours(2) + chrono::Duration::seconds(5));
    }

    #[test]
    fn test_parse_since_date() {
        let parsed = parse_since("2026-08-01").unwrap();
        assert_eq!(parsed.to_rfc3339(), "2026-08-01T00:00:00+00:00");
    }

    #[test]
    fn test_parse_since_datetime() {
        let parsed = parse_since("2026-08-01T12:30:00").unwrap();
        assert_eq!(parsed.to_rfc3339(), "2026-08-01T12:30:00+00:00");
    }

    #[test]
    fn test_parse_since_rejects_garbage() {
        assert!(parse_since("yesterday").is_err());
        assert!(parse_since("5x").is_err());
    }

    #[test]
    fn test_format_details_prefers_message() {
        let details = serde_json::json!({"message": "refresh rejected", "code": 401});
        assert_eq!(format_details(Some(&details)), "refresh rejected");
    }

    #[test]
    fn test_truncate_string() {
        assert_eq!(truncate_string("short", 10), "short");
        let long = "a".repeat(50);
        let out = truncate_string(&long, 10);
        assert_eq!(out.chars().count(), 10);
        assert!(out.ends_with('\u{2026}'));
    }
}
