// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon configuration: a TOML file with serde defaults.

use serde::Deserialize;
use sky_engine::{ProgressPolicy, RunnerConfig};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("reading config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parsing config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("auth requires both username and password (or neither)")]
    AuthIncomplete,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Production,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub environment: Environment,
    /// When set, daemon logs also go to rolling files in this directory.
    pub log_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { path: PathBuf::from("skysync.db") }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Empty ⇒ plaintext config storage (development only).
    pub encryption_key: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RunnerSection {
    /// Worker pool size; `None` means the CPU count.
    pub workers: Option<usize>,
    pub persist_interval_ms: u64,
    pub publish_interval_ms: u64,
    pub log_batch_size: usize,
    pub log_flush_interval_ms: u64,
}

impl Default for RunnerSection {
    fn default() -> Self {
        let policy = ProgressPolicy::default();
        Self {
            workers: None,
            persist_interval_ms: policy.persist_interval.as_millis() as u64,
            publish_interval_ms: policy.publish_interval.as_millis() as u64,
            log_batch_size: policy.log_batch_size,
            log_flush_interval_ms: policy.log_flush_interval.as_millis() as u64,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WatcherSection {
    /// Quiet period before a realtime task activates.
    pub debounce_ms: u64,
}

impl Default for WatcherSection {
    fn default() -> Self {
        Self { debounce_ms: 2_000 }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub app: AppConfig,
    pub database: DatabaseConfig,
    pub security: SecurityConfig,
    pub auth: AuthConfig,
    pub runner: RunnerSection,
    pub watcher: WatcherSection,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;
        let config: Config = toml::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Both-or-neither credentials; everything else has usable defaults.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.auth.username.is_some() != self.auth.password.is_some() {
            return Err(ConfigError::AuthIncomplete);
        }
        Ok(())
    }

    pub fn runner_config(&self) -> RunnerConfig {
        let defaults = RunnerConfig::default();
        RunnerConfig {
            workers: self.runner.workers.unwrap_or(defaults.workers),
            policy: ProgressPolicy {
                persist_interval: Duration::from_millis(self.runner.persist_interval_ms),
                publish_interval: Duration::from_millis(self.runner.publish_interval_ms),
                log_batch_size: self.runner.log_batch_size.max(1),
                log_flush_interval: Duration::from_millis(self.runner.log_flush_interval_ms),
            },
        }
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.watcher.debounce_ms)
    }

    /// Lock file guarding single-instance startup, next to the database.
    pub fn lock_path(&self) -> PathBuf {
        self.database.path.with_extension("lock")
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
