//! Configuration module for DriveMirror.
//!
//! Provides typed configuration structs that map to the YAML configuration
//! file, with loading, saving, validation, defaults, and a builder for
//! programmatic use.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration for DriveMirror.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    pub auth: AuthConfig,
    pub storage: StorageConfig,
    pub sync: SyncConfig,
    pub logging: LoggingConfig,
}

/// Authentication / OAuth settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// OAuth client ID. `None` until the user runs `drivemirror auth connect`.
    pub client_id: Option<String>,
    /// Local user identity, generated on the first `auth connect`.
    #[serde(default)]
    pub user_id: Option<String>,
    /// Redirect URI registered for the loopback consent callback.
    pub redirect_uri: String,
    /// OAuth scopes to request.
    pub scopes: Vec<String>,
}

/// Local persistence settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Path to the SQLite catalog database.
    pub db_path: PathBuf,
}

/// Crawl and orchestration settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Folders listed per budgeted runner batch.
    pub budget_folders: u32,
    /// Ceiling on orchestrator iterations per sync command.
    pub max_iterations: u32,
    /// Milliseconds to sleep between orchestrated runner batches.
    pub run_delay_ms: u64,
}

/// Logging / tracing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
}

// ---------------------------------------------------------------------------
// Loading and saving
// ---------------------------------------------------------------------------

impl Config {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Try to load from `path`; fall back to [`Config::default`] on any error.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// Write the configuration as YAML to `path`, creating parent
    /// directories as needed.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/drivemirror/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("drivemirror")
            .join("config.yaml")
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

// Config derives Default because all its fields implement Default.
// (clippy::derivable_impls)

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            user_id: None,
            redirect_uri: "http://127.0.0.1:8913/callback".to_string(),
            scopes: vec!["https://www.googleapis.com/auth/drive.readonly".to_string()],
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("~/.local/share"))
                .join("drivemirror")
                .join("catalog.db"),
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            budget_folders: 5,
            max_iterations: 50,
            run_delay_ms: 500,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"sync.budget_folders"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Valid values for `logging.level`.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

impl Config {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        // --- auth ---
        if self.auth.redirect_uri.is_empty() {
            errors.push(ValidationError {
                field: "auth.redirect_uri".into(),
                message: "must not be empty".into(),
            });
        }
        if self.auth.scopes.is_empty() {
            errors.push(ValidationError {
                field: "auth.scopes".into(),
                message: "at least one scope is required".into(),
            });
        }

        // --- sync ---
        if self.sync.budget_folders == 0 {
            errors.push(ValidationError {
                field: "sync.budget_folders".into(),
                message: "must be greater than 0".into(),
            });
        }
        if self.sync.max_iterations == 0 {
            errors.push(ValidationError {
                field: "sync.max_iterations".into(),
                message: "must be greater than 0".into(),
            });
        }

        // --- logging ---
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            errors.push(ValidationError {
                field: "logging.level".into(),
                message: format!(
                    "invalid level '{}'; valid options: {}",
                    self.logging.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            });
        }

        errors
    }
}

// ---------------------------------------------------------------------------
// ConfigBuilder
// ---------------------------------------------------------------------------

/// Builder for constructing a [`Config`] programmatically.
///
/// Starts from [`Config::default`] and allows selective overrides.
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder initialised with [`Config::default`] values.
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    // --- auth ---

    pub fn auth_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.config.auth.client_id = Some(client_id.into());
        self
    }

    pub fn auth_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.config.auth.user_id = Some(user_id.into());
        self
    }

    pub fn auth_redirect_uri(mut self, redirect_uri: impl Into<String>) -> Self {
        self.config.auth.redirect_uri = redirect_uri.into();
        self
    }

    pub fn auth_scopes(mut self, scopes: Vec<String>) -> Self {
        self.config.auth.scopes = scopes;
        self
    }

    // --- storage ---

    pub fn storage_db_path(mut self, db_path: PathBuf) -> Self {
        self.config.storage.db_path = db_path;
        self
    }

    // --- sync ---

    pub fn sync_budget_folders(mut self, n: u32) -> Self {
        self.config.sync.budget_folders = n;
        self
    }

    pub fn sync_max_iterations(mut self, n: u32) -> Self {
        self.config.sync.max_iterations = n;
        self
    }

    pub fn sync_run_delay_ms(mut self, ms: u64) -> Self {
        self.config.sync.run_delay_ms = ms;
        self
    }

    // --- logging ---

    pub fn logging_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    // --- build ---

    /// Consume the builder and return the finished [`Config`].
    pub fn build(self) -> Config {
        self.config
    }

    /// Build and validate in one step. Returns `Err` with the list of
    /// validation errors if the configuration is invalid.
    pub fn build_validated(self) -> Result<Config, Vec<ValidationError>> {
        let config = self.build();
        let errors = config.validate();
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(errors)
        }
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    // -- Defaults --

    #[test]
    fn default_config_has_sensible_values() {
        let cfg = Config::default();
        assert!(cfg.auth.client_id.is_none());
        assert_eq!(cfg.auth.redirect_uri, "http://127.0.0.1:8913/callback");
        assert_eq!(cfg.auth.scopes.len(), 1);
        assert!(cfg.auth.scopes[0].ends_with("drive.readonly"));
        assert!(cfg.storage.db_path.to_string_lossy().contains("drivemirror"));
        assert_eq!(cfg.sync.budget_folders, 5);
        assert_eq!(cfg.sync.max_iterations, 50);
        assert_eq!(cfg.sync.run_delay_ms, 500);
        assert_eq!(cfg.logging.level, "info");
    }

    #[test]
    fn default_config_passes_validation() {
        let cfg = Config::default();
        let errors = cfg.validate();
        assert!(errors.is_empty(), "unexpected validation errors: {errors:?}");
    }

    // -- Loading --

    #[test]
    fn load_from_yaml_file() {
        let yaml = r#"
auth:
  client_id: "test-client-123"
  redirect_uri: http://127.0.0.1:9000/cb
  scopes:
    - https://www.googleapis.com/auth/drive.readonly
storage:
  db_path: /tmp/test-catalog.db
sync:
  budget_folders: 10
  max_iterations: 25
  run_delay_ms: 250
logging:
  level: debug
"#;
        let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
        tmp.write_all(yaml.as_bytes()).unwrap();
        tmp.flush().unwrap();

        let cfg = Config::load(tmp.path()).expect("load config");
        assert_eq!(cfg.auth.client_id, Some("test-client-123".to_string()));
        assert_eq!(cfg.auth.redirect_uri, "http://127.0.0.1:9000/cb");
        assert_eq!(cfg.storage.db_path, PathBuf::from("/tmp/test-catalog.db"));
        assert_eq!(cfg.sync.budget_folders, 10);
        assert_eq!(cfg.sync.max_iterations, 25);
        assert_eq!(cfg.sync.run_delay_ms, 250);
        assert_eq!(cfg.logging.level, "debug");
    }

    #[test]
    fn load_or_default_returns_default_on_missing_file() {
        let cfg = Config::load_or_default(Path::new("/nonexistent/config.yaml"));
        assert_eq!(cfg.sync.budget_folders, 5);
    }

    #[test]
    fn load_returns_error_on_invalid_yaml() {
        let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
        tmp.write_all(b"not: [valid: yaml: {{{").unwrap();
        tmp.flush().unwrap();

        let result = Config::load(tmp.path());
        assert!(result.is_err());
    }

    #[test]
    fn save_then_load_roundtrips() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("nested").join("config.yaml");

        let cfg = ConfigBuilder::new()
            .auth_client_id("roundtrip-client")
            .sync_budget_folders(7)
            .build();
        cfg.save(&path).expect("save config");

        let loaded = Config::load(&path).expect("reload config");
        assert_eq!(loaded.auth.client_id, Some("roundtrip-client".to_string()));
        assert_eq!(loaded.sync.budget_folders, 7);
    }

    // -- Validation --

    #[test]
    fn validate_catches_empty_redirect_uri() {
        let mut cfg = Config::default();
        cfg.auth.redirect_uri = String::new();
        let errors = cfg.validate();
        assert!(errors.iter().any(|e| e.field == "auth.redirect_uri"));
    }

    #[test]
    fn validate_catches_empty_scopes() {
        let mut cfg = Config::default();
        cfg.auth.scopes = vec![];
        let errors = cfg.validate();
        assert!(errors.iter().any(|e| e.field == "auth.scopes"));
    }

    #[test]
    fn validate_catches_zero_budget() {
        let mut cfg = Config::default();
        cfg.sync.budget_folders = 0;
        let errors = cfg.validate();
        assert!(errors.iter().any(|e| e.field == "sync.budget_folders"));
    }

    #[test]
    fn validate_catches_zero_max_iterations() {
        let mut cfg = Config::default();
        cfg.sync.max_iterations = 0;
        let errors = cfg.validate();
        assert!(errors.iter().any(|e| e.field == "sync.max_iterations"));
    }

    #[test]
    fn validate_catches_invalid_log_level() {
        let mut cfg = Config::default();
        cfg.logging.level = "verbose".to_string();
        let errors = cfg.validate();
        assert!(errors.iter().any(|e| e.field == "logging.level"));
    }

    #[test]
    fn validate_accepts_all_valid_log_levels() {
        for level in VALID_LOG_LEVELS {
            let mut cfg = Config::default();
            cfg.logging.level = level.to_string();
            let errors = cfg.validate();
            assert!(
                !errors.iter().any(|e| e.field == "logging.level"),
                "level '{level}' should be valid"
            );
        }
    }

    // -- Builder --

    #[test]
    fn builder_starts_from_defaults() {
        let cfg = ConfigBuilder::new().build();
        assert_eq!(cfg.sync.budget_folders, 5);
        assert_eq!(cfg.logging.level, "info");
    }

    #[test]
    fn builder_overrides_fields() {
        let cfg = ConfigBuilder::new()
            .auth_client_id("my-client")
            .auth_redirect_uri("http://127.0.0.1:7777/cb")
            .auth_scopes(vec!["scope-a".to_string(), "scope-b".to_string()])
            .storage_db_path(PathBuf::from("/custom/catalog.db"))
            .sync_budget_folders(3)
            .sync_max_iterations(10)
            .sync_run_delay_ms(100)
            .logging_level("trace")
            .build();

        assert_eq!(cfg.auth.client_id, Some("my-client".to_string()));
        assert_eq!(cfg.auth.redirect_uri, "http://127.0.0.1:7777/cb");
        assert_eq!(cfg.auth.scopes.len(), 2);
        assert_eq!(cfg.storage.db_path, PathBuf::from("/custom/catalog.db"));
        assert_eq!(cfg.sync.budget_folders, 3);
        assert_eq!(cfg.sync.max_iterations, 10);
        assert_eq!(cfg.sync.run_delay_ms, 100);
        assert_eq!(cfg.logging.level, "trace");
    }

    #[test]
    fn builder_build_validated_fails_for_invalid_config() {
        let result = ConfigBuilder::new()
            .sync_budget_folders(0)
            .logging_level("nope")
            .build_validated();
        assert!(result.is_err());
        let errors = result.unwrap_err();
        assert!(errors.len() >= 2);
    }

    // -- default_path --

    #[test]
    fn default_path_ends_with_config_yaml() {
        let p = Config::default_path();
        assert!(p.ends_with("drivemirror/config.yaml"));
    }

    // -- ValidationError Display --

    #[test]
    fn validation_error_display() {
        let err = ValidationError {
            field: "sync.budget_folders".into(),
            message: "must be greater than 0".into(),
        };
        assert_eq!(err.to_string(), "sync.budget_folders: must be greater than 0");
    }
}
