//! TOML configuration with serde defaults and environment overrides.
//!
//! Every section is optional in the file; a missing or absent config file
//! yields a fully usable default. Secrets prefer environment variables over
//! the on-disk file.

use crate::error::ConfigError;
use crate::executor::ExecutionSettings;
use crate::routing::{ArbiterSettings, RouteThresholds};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

// ── Top-level config ──────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub registry: RegistryConfig,
    pub execution: ExecutionSettings,
    pub routing: RouteThresholds,
    pub arbiter: ArbiterSettings,
    pub oracle: OracleConfig,
    pub backend: BackendConfig,
    pub notify: NotifyConfig,
}

// ── Sections ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8420
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// SQLite database path. Empty → per-user data directory.
    pub db_path: Option<PathBuf>,
}

impl RegistryConfig {
    /// Resolve the database path, falling back to the platform data dir.
    #[must_use]
    pub fn resolved_db_path(&self) -> PathBuf {
        if let Some(path) = &self.db_path {
            return path.clone();
        }
        ProjectDirs::from("dev", "conductor", "conductor")
            .map(|dirs| dirs.data_dir().join("capabilities.db"))
            .unwrap_or_else(|| PathBuf::from("conductor.db"))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleConfig {
    pub base_url: String,
    pub model: String,
    pub temperature: f64,
    pub timeout_secs: u64,
    /// Prefer `CONDUCTOR_ORACLE_API_KEY` over storing this in the file.
    pub api_key: Option<String>,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            base_url: default_oracle_base_url(),
            model: default_oracle_model(),
            temperature: 0.0,
            timeout_secs: default_oracle_timeout_secs(),
            api_key: None,
        }
    }
}

fn default_oracle_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_oracle_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_oracle_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub base_url: String,
    pub api_key: Option<String>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_backend_base_url(),
            api_key: None,
        }
    }
}

fn default_backend_base_url() -> String {
    "http://127.0.0.1:8790".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifyConfig {
    pub webhook_url: Option<String>,
    pub api_key: Option<String>,
    /// Log notification payloads instead of POSTing them.
    pub dry_run: bool,
    /// Emit an in-progress callback before credential-gated executions.
    pub progress_updates: bool,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            api_key: None,
            dry_run: false,
            progress_updates: default_progress_updates(),
        }
    }
}

fn default_progress_updates() -> bool {
    true
}

// ── Loading ───────────────────────────────────────────────────────

impl Config {
    /// Load from an explicit path, or from the platform config dir, or fall
    /// back to defaults when no file exists. An unreadable or malformed file
    /// is an error; a missing one is not.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = match path {
            Some(path) => Some(path.to_path_buf()),
            None => ProjectDirs::from("dev", "conductor", "conductor")
                .map(|dirs| dirs.config_dir().join("config.toml"))
                .filter(|candidate| candidate.exists()),
        };

        let mut config = match resolved {
            Some(path) => {
                let raw = std::fs::read_to_string(&path)?;
                toml::from_str(&raw)
                    .map_err(|error| ConfigError::Load(format!("{}: {error}", path.display())))?
            }
            None => Self::default(),
        };

        config.apply_env_overrides(|name| std::env::var(name).ok());
        Ok(config.validated())
    }

    /// Environment overrides for secrets and the webhook target. The lookup
    /// is injected so tests never mutate the process environment.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |value: String| {
            let value = value.trim().to_string();
            (!value.is_empty()).then_some(value)
        };
        if let Some(key) = lookup("CONDUCTOR_ORACLE_API_KEY").and_then(non_empty) {
            self.oracle.api_key = Some(key);
        }
        if let Some(key) = lookup("CONDUCTOR_BACKEND_API_KEY").and_then(non_empty) {
            self.backend.api_key = Some(key);
        }
        if let Some(key) = lookup("CONDUCTOR_NOTIFY_API_KEY").and_then(non_empty) {
            self.notify.api_key = Some(key);
        }
        if let Some(url) = lookup("CONDUCTOR_NOTIFY_WEBHOOK_URL").and_then(non_empty) {
            self.notify.webhook_url = Some(url);
        }
    }

    /// Clamp tunables into operational ranges.
    #[must_use]
    pub fn validated(mut self) -> Self {
        self.routing = self.routing.clamped();
        self.arbiter = self.arbiter.clamped();
        self.execution = self.execution.clamped();
        self.oracle.temperature = self.oracle.temperature.clamp(0.0, 2.0);
        self.oracle.timeout_secs = self.oracle.timeout_secs.clamp(3, 300);
        self
    }
}
