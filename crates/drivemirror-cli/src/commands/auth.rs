//! Auth commands - Connect, Disconnect, and Status for Google Drive
//!
//! Provides the `drivemirror auth` CLI subcommands which:
//! 1. `connect`    - Runs the OAuth2 PKCE flow in the browser, stores tokens
//!    in the system keyring, and persists the connection row in SQLite.
//! 2. `disconnect` - Revokes the grant, clears the keyring, and deletes the
//!    connection row.
//! 3. `status`     - Shows connection state and the configured folder.

use anyhow::{Context, Result};
use clap::Subcommand;
use tracing::info;

use drivemirror_audit::ReasonCode;
use drivemirror_core::config::Config;
use drivemirror_gdrive::auth::run_interactive_consent;

use crate::context::AppContext;
use crate::output::{get_formatter, OutputFormat, OutputFormatter};

#[derive(Debug, Subcommand)]
pub enum AuthCommand {
    /// Authenticate with Google Drive via OAuth2
    Connect {
        /// OAuth client id from the Google Cloud console
        #[arg(long)]
        client_id: Option<String>,

        /// Re-prompt for consent even if already granted
        #[arg(long)]
        force: bool,
    },
    /// Revoke the grant and remove stored credentials
    Disconnect,
    /// Check authentication status
    Status,
}

impl AuthCommand {
    pub async fn execute(&self, config_path: Option<&str>, format: OutputFormat) -> Result<()> {
        let fmt = get_formatter(format == OutputFormat::Json);
        match self {
            AuthCommand::Connect { client_id, force } => {
                self.execute_connect(config_path, client_id.as_deref(), *force, &*fmt)
                    .await
            }
            AuthCommand::Disconnect => self.execute_disconnect(config_path, &*fmt).await,
            AuthCommand::Status => self.execute_status(config_path, &*fmt, format).await,
        }
    }

    /// Execute the connect flow:
    /// 1. Pin the client id into the config file if passed on the CLI
    /// 2. Build the consent URL and open the browser
    /// 3. Wait for the loopback callback and exchange the code
    /// 4. Store tokens in the keyring and persist the connection row
    async fn execute_connect(
        &self,
        config_path: Option<&str>,
        cli_client_id: Option<&str>,
        force: bool,
        fmt: &dyn OutputFormatter,
    ) -> Result<()> {
        // Pin a CLI-supplied client id before wiring the context
        if let Some(client_id) = cli_client_id {
            let path = config_path
                .map(std::path::PathBuf::from)
                .unwrap_or_else(Config::default_path);
            let mut config = Config::load_or_default(&path);
            config.auth.client_id = Some(client_id.to_string());
            config.save(&path).context("Failed to save config file")?;
        }

        let ctx = AppContext::init(config_path).await?;

        info!(user_id = %ctx.user_id, force, "Starting OAuth2 connect");
        let consent_url = ctx
            .tokens
            .authorize(force)
            .await
            .context("Failed to build consent URL")?;

        fmt.info("Opening browser for Google Drive consent...");
        let params = match run_interactive_consent(&consent_url).await {
            Ok(params) => params,
            Err(err) => {
                ctx.audit
                    .log_failure(
                        Some(ctx.user_id),
                        ReasonCode::AuthFlowFailed,
                        &err.to_string(),
                    )
                    .await;
                return Err(err.context("Consent flow failed"));
            }
        };

        fmt.info("Exchanging authorization code...");
        let connection = ctx
            .tokens
            .complete_authorization(ctx.user_id, &params.code)
            .await
            .context("Code exchange failed")?;

        fmt.success("Connected to Google Drive");
        fmt.kv("Scopes:", &connection.scopes().join(" "));
        fmt.kv(
            "Token expires:",
            &connection.expires_at().format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        );
        Ok(())
    }

    async fn execute_disconnect(
        &self,
        config_path: Option<&str>,
        fmt: &dyn OutputFormatter,
    ) -> Result<()> {
        let ctx = AppContext::init(config_path).await?;

        ctx.tokens
            .disconnect(&ctx.user_id)
            .await
            .context("Disconnect failed")?;

        fmt.success("Disconnected. Credentials removed from the keyring.");
        Ok(())
    }

    async fn execute_status(
        &self,
        config_path: Option<&str>,
        fmt: &dyn OutputFormatter,
        format: OutputFormat,
    ) -> Result<()> {
        let ctx = AppContext::init(config_path).await?;

        let status = ctx
            .tokens
            .status(&ctx.user_id)
            .await
            .context("Failed to read connection status")?;

        if format == OutputFormat::Json {
            fmt.print_json(&serde_json::json!({
                "connected": status.connected,
                "reason": status.reason.as_ref().map(|r| r.to_string()),
                "folder_id": status.dedicated_folder_id.as_ref().map(|f| f.to_string()),
                "folder_name": status.dedicated_folder_name,
                "downloads_enabled": status.downloads_enabled,
            }));
            return Ok(());
        }

        if status.connected {
            fmt.success("Connected to Google Drive");
        } else {
            match &status.reason {
                Some(reason) => fmt.warn(&format!("Not connected: {}", reason)),
                None => fmt.warn("Not connected"),
            }
        }

        match (&status.dedicated_folder_id, &status.dedicated_folder_name) {
            (Some(id), Some(name)) => {
                fmt.kv("Mirrored folder:", &format!("{} ({})", name, id));
                fmt.kv(
                    "Downloads:",
                    if status.downloads_enabled {
                        "enabled"
                    } else {
                        "disabled"
                    },
                );
            }
            _ => fmt.info("No folder configured. Run 'drivemirror folder set' first."),
        }
        Ok(())
    }
}
