//! Application context - dependency wiring for the CLI commands
//!
//! Builds the adapter stack (SQLite store, Google Drive provider, keyring
//! vault) and the use-case layer from the configuration file. Commands
//! share one context per invocation.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};

use drivemirror_audit::AuditLogger;
use drivemirror_core::config::Config;
use drivemirror_core::domain::UserId;
use drivemirror_core::ports::{ICredentialVault, IDriveProvider, IStateStore};
use drivemirror_core::usecases::{
    DiagnosticsUseCase, IndexFolderUseCase, OrchestrateSyncUseCase, OrchestratorPolicy,
    PullChangesUseCase, RunSyncUseCase, SetFolderUseCase, StartSyncUseCase, TokenManagerUseCase,
};
use drivemirror_gdrive::{DriveAuthConfig, GoogleDriveProvider, KeyringVault};
use drivemirror_store::{DatabasePool, SqliteStateStore};

/// Fully wired dependency graph for one CLI invocation
pub struct AppContext {
    pub config: Config,
    pub user_id: UserId,
    pub tokens: Arc<TokenManagerUseCase>,
    pub folder: Arc<SetFolderUseCase>,
    pub changes: Arc<PullChangesUseCase>,
    pub orchestrator: Arc<OrchestrateSyncUseCase>,
    pub diagnostics: Arc<DiagnosticsUseCase>,
    pub audit: Arc<AuditLogger>,
}

impl AppContext {
    /// Builds the context from the given (or default) config file
    pub async fn init(config_path: Option<&str>) -> Result<Self> {
        let config_path = config_path
            .map(PathBuf::from)
            .unwrap_or_else(Config::default_path);
        let mut config = Config::load_or_default(&config_path);

        let client_id = config.auth.client_id.clone().context(
            "No OAuth client id configured. Set auth.client_id in the config file \
             or pass --client-id to 'drivemirror auth connect'",
        )?;

        // A local identity is minted once and then pinned in the config
        let user_id = match &config.auth.user_id {
            Some(raw) => UserId::from_str(raw).context("Invalid auth.user_id in config")?,
            None => {
                let user_id = UserId::new();
                config.auth.user_id = Some(user_id.to_string());
                config
                    .save(&config_path)
                    .context("Failed to persist generated user id")?;
                user_id
            }
        };

        let pool = DatabasePool::new(Path::new(&config.storage.db_path))
            .await
            .context("Failed to open catalog database")?;
        let store: Arc<dyn IStateStore> = Arc::new(SqliteStateStore::new(pool.pool().clone()));

        let auth_config = DriveAuthConfig::new(client_id)
            .with_redirect_uri(config.auth.redirect_uri.clone())
            .with_scopes(config.auth.scopes.clone());
        let provider: Arc<dyn IDriveProvider> =
            Arc::new(GoogleDriveProvider::new(&auth_config).context("Failed to build provider")?);
        let vault: Arc<dyn ICredentialVault> = Arc::new(KeyringVault::new());

        let tokens = Arc::new(TokenManagerUseCase::new(
            provider.clone(),
            store.clone(),
            vault.clone(),
            config.auth.scopes.clone(),
        ));
        let folder = Arc::new(SetFolderUseCase::new(store.clone()));
        let start = Arc::new(StartSyncUseCase::new(store.clone()));
        let index = Arc::new(IndexFolderUseCase::new(
            provider.clone(),
            store.clone(),
            tokens.clone(),
        ));
        let run = Arc::new(RunSyncUseCase::new(
            provider.clone(),
            store.clone(),
            tokens.clone(),
        ));
        let changes = Arc::new(PullChangesUseCase::new(
            provider.clone(),
            store.clone(),
            tokens.clone(),
        ));

        let policy = OrchestratorPolicy {
            budget_folders: config.sync.budget_folders,
            max_iterations: config.sync.max_iterations,
            run_delay: Duration::from_millis(config.sync.run_delay_ms),
        };
        let orchestrator = Arc::new(OrchestrateSyncUseCase::new(
            start,
            index,
            run,
            changes.clone(),
            store.clone(),
            policy,
        ));
        let diagnostics = Arc::new(DiagnosticsUseCase::new(
            store.clone(),
            tokens.clone(),
            changes.clone(),
        ));
        let audit = Arc::new(AuditLogger::new(store.clone()));

        Ok(Self {
            config,
            user_id,
            tokens,
            folder,
            changes,
            orchestrator,
            diagnostics,
            audit,
        })
    }
}
