//! Global configuration parsing and validation.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::{AppError, Result};

/// Local cache limits.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct CacheConfig {
    /// Maximum total size of all stored keys and values, in bytes.
    #[serde(default = "default_quota_bytes")]
    pub quota_bytes: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            quota_bytes: default_quota_bytes(),
        }
    }
}

/// Timer and transport settings for the sync client.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct SyncConfig {
    /// Period of the automatic push.
    #[serde(default = "default_auto_sync_interval")]
    pub auto_sync_interval_seconds: u64,
    /// Period of the connectivity probe.
    #[serde(default = "default_probe_interval")]
    pub probe_interval_seconds: u64,
    /// Per-request timeout; absent means the transport default.
    #[serde(default)]
    pub request_timeout_seconds: Option<u64>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            auto_sync_interval_seconds: default_auto_sync_interval(),
            probe_interval_seconds: default_probe_interval(),
            request_timeout_seconds: None,
        }
    }
}

/// Companion server settings used by `workboard serve`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct ServerConfig {
    /// Local port the server binds on `127.0.0.1`.
    #[serde(default = "default_http_port")]
    pub http_port: u16,
    /// Age after which backup files are purged.
    #[serde(default = "default_backup_retention_days")]
    pub backup_retention_days: u32,
    /// Period between scheduled backups.
    #[serde(default = "default_backup_interval")]
    pub backup_interval_seconds: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_port: default_http_port(),
            backup_retention_days: default_backup_retention_days(),
            backup_interval_seconds: default_backup_interval(),
        }
    }
}

fn default_server_url() -> String {
    "http://localhost:5000".into()
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_quota_bytes() -> usize {
    5 * 1024 * 1024
}

fn default_auto_sync_interval() -> u64 {
    2 * 60 * 60
}

fn default_probe_interval() -> u64 {
    30
}

fn default_http_port() -> u16 {
    5000
}

fn default_backup_retention_days() -> u32 {
    30
}

fn default_backup_interval() -> u64 {
    60 * 60
}

/// Global configuration parsed from `workboard.toml`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct GlobalConfig {
    /// Base URL of the remote authority.
    #[serde(default = "default_server_url")]
    pub server_url: String,
    /// Directory holding the local cache file and the server's data files.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Local cache limits.
    #[serde(default)]
    pub cache: CacheConfig,
    /// Sync timers and transport.
    #[serde(default)]
    pub sync: SyncConfig,
    /// Companion server.
    #[serde(default)]
    pub server: ServerConfig,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
            data_dir: default_data_dir(),
            cache: CacheConfig::default(),
            sync: SyncConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

impl GlobalConfig {
    /// Load and validate configuration from a TOML file path.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the file cannot be read or contains
    /// invalid TOML, or if validation fails.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|err| AppError::Config(format!("failed to read config: {err}")))?;
        Self::from_toml_str(&raw)
    }

    /// Parse configuration from a TOML string and validate it.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if parsing or validation fails.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let mut config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Re-run validation after overrides have been applied.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` describing the first invalid field.
    pub fn validate(&mut self) -> Result<()> {
        let trimmed = self.server_url.trim().trim_end_matches('/');
        if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
            return Err(AppError::Config(format!(
                "server_url must be an http(s) url, got {:?}",
                self.server_url
            )));
        }
        self.server_url = trimmed.to_owned();

        if self.cache.quota_bytes == 0 {
            return Err(AppError::Config(
                "cache.quota_bytes must be greater than zero".into(),
            ));
        }
        if self.sync.auto_sync_interval_seconds == 0 {
            return Err(AppError::Config(
                "sync.auto_sync_interval_seconds must be greater than zero".into(),
            ));
        }
        if self.sync.probe_interval_seconds == 0 {
            return Err(AppError::Config(
                "sync.probe_interval_seconds must be greater than zero".into(),
            ));
        }
        if self.sync.request_timeout_seconds == Some(0) {
            return Err(AppError::Config(
                "sync.request_timeout_seconds must be greater than zero when set".into(),
            ));
        }
        if self.server.http_port == 0 {
            return Err(AppError::Config(
                "server.http_port must be greater than zero".into(),
            ));
        }
        if self.server.backup_interval_seconds == 0 {
            return Err(AppError::Config(
                "server.backup_interval_seconds must be greater than zero".into(),
            ));
        }
        Ok(())
    }

    /// Path of the client's local cache file.
    #[must_use]
    pub fn cache_path(&self) -> PathBuf {
        self.data_dir.join("local-storage.json")
    }

    /// Scheduled backup period.
    #[must_use]
    pub fn backup_interval(&self) -> Duration {
        Duration::from_secs(self.server.backup_interval_seconds)
    }

    /// Automatic push period.
    #[must_use]
    pub fn auto_sync_interval(&self) -> Duration {
        Duration::from_secs(self.sync.auto_sync_interval_seconds)
    }

    /// Connectivity probe period.
    #[must_use]
    pub fn probe_interval(&self) -> Duration {
        Duration::from_secs(self.sync.probe_interval_seconds)
    }

    /// Explicit request timeout, if configured.
    #[must_use]
    pub fn request_timeout(&self) -> Option<Duration> {
        self.sync.request_timeout_seconds.map(Duration::from_secs)
    }
}
