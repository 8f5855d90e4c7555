// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Server configuration: compiled-in defaults, overridden by environment
//! variables, overridden by a `--config` JSON file, overridden last by
//! explicit CLI flags.

use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_bind_address")]
    pub bind_address: IpAddr,
    #[serde(default = "default_auth_port")]
    pub auth_port: u16,
    #[serde(default = "default_acct_port")]
    pub acct_port: u16,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_acct_interim_interval")]
    pub acct_interim_interval: u64,
    #[serde(default = "default_stale_session_multiplier")]
    pub stale_session_multiplier: u64,
    #[serde(default = "default_max_inactive_sessions")]
    pub max_inactive_sessions: i64,
    #[serde(default = "default_radius_log_retention")]
    pub radius_log_retention: i64,
    #[serde(default = "default_session_buffer_flush_interval")]
    pub session_buffer_flush_interval: u64,
    #[serde(default = "default_cleanup_interval")]
    pub dead_session_cleanup_interval: u64,
    #[serde(default = "default_inactive_cleanup_interval")]
    pub inactive_session_cleanup_interval: u64,
    #[serde(default = "default_cleanup_interval")]
    pub log_retention_interval: u64,
    #[serde(default = "default_cleanup_interval")]
    pub stats_sample_interval: u64,
    #[serde(default = "default_database_path")]
    pub database_path: String,
}

fn default_bind_address() -> IpAddr {
    "0.0.0.0".parse().unwrap()
}
fn default_auth_port() -> u16 {
    1812
}
fn default_acct_port() -> u16 {
    1813
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_acct_interim_interval() -> u64 {
    600
}
fn default_stale_session_multiplier() -> u64 {
    5
}
fn default_max_inactive_sessions() -> i64 {
    100
}
fn default_radius_log_retention() -> i64 {
    10_000
}
fn default_session_buffer_flush_interval() -> u64 {
    5
}
fn default_cleanup_interval() -> u64 {
    300
}
fn default_inactive_cleanup_interval() -> u64 {
    3600
}
fn default_database_path() -> String {
    "radius.db".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            auth_port: default_auth_port(),
            acct_port: default_acct_port(),
            log_level: default_log_level(),
            acct_interim_interval: default_acct_interim_interval(),
            stale_session_multiplier: default_stale_session_multiplier(),
            max_inactive_sessions: default_max_inactive_sessions(),
            radius_log_retention: default_radius_log_retention(),
            session_buffer_flush_interval: default_session_buffer_flush_interval(),
            dead_session_cleanup_interval: default_cleanup_interval(),
            inactive_session_cleanup_interval: default_inactive_cleanup_interval(),
            log_retention_interval: default_cleanup_interval(),
            stats_sample_interval: default_cleanup_interval(),
            database_path: default_database_path(),
        }
    }
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io(e.to_string()))?;
        serde_json::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let content = serde_json::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| ConfigError::Io(e.to_string()))
    }

    /// Overlay `RADIUS_*`-style environment variables on top of whatever
    /// values are already present (file or default), matching §6's table.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("BIND_ADDRESS") {
            if let Ok(ip) = v.parse() {
                self.bind_address = ip;
            }
        }
        if let Ok(v) = std::env::var("AUTH_PORT") {
            if let Ok(port) = v.parse() {
                self.auth_port = port;
            }
        }
        if let Ok(v) = std::env::var("ACCT_PORT") {
            if let Ok(port) = v.parse() {
                self.acct_port = port;
            }
        }
        if let Ok(v) = std::env::var("LOG_LEVEL") {
            self.log_level = v;
        }
        if let Ok(v) = std::env::var("ACCT_INTERIM_INTERVAL") {
            if let Ok(n) = v.parse() {
                self.acct_interim_interval = n;
            }
        }
        if let Ok(v) = std::env::var("STALE_SESSION_MULTIPLIER") {
            if let Ok(n) = v.parse() {
                self.stale_session_multiplier = n;
            }
        }
        if let Ok(v) = std::env::var("MAX_INACTIVE_SESSIONS") {
            if let Ok(n) = v.parse() {
                self.max_inactive_sessions = n;
            }
        }
        if let Ok(v) = std::env::var("RADIUS_LOG_RETENTION") {
            if let Ok(n) = v.parse() {
                self.radius_log_retention = n;
            }
        }
        if let Ok(v) = std::env::var("SESSION_BUFFER_FLUSH_INTERVAL") {
            if let Ok(n) = v.parse() {
                self.session_buffer_flush_interval = n;
            }
        }
    }

    pub fn acct_interim_interval(&self) -> Duration {
        Duration::from_secs(self.acct_interim_interval)
    }

    pub fn stale_session_threshold(&self) -> Duration {
        Duration::from_secs(self.acct_interim_interval * self.stale_session_multiplier)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.auth_port == 0 {
            return Err(ConfigError::InvalidValue("auth_port cannot be 0".into()));
        }
        if self.acct_port == 0 {
            return Err(ConfigError::InvalidValue("acct_port cannot be 0".into()));
        }
        if self.auth_port == self.acct_port {
            return Err(ConfigError::InvalidValue(
                "auth_port and acct_port must differ".into(),
            ));
        }
        if self.acct_interim_interval == 0 {
            return Err(ConfigError::InvalidValue(
                "acct_interim_interval cannot be 0".into(),
            ));
        }
        if self.session_buffer_flush_interval == 0 {
            return Err(ConfigError::InvalidValue(
                "session_buffer_flush_interval cannot be 0".into(),
            ));
        }
        if self.stale_session_multiplier == 0 {
            return Err(ConfigError::InvalidValue(
                "stale_session_multiplier cannot be 0".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub enum ConfigError {
    Io(String),
    Parse(String),
    InvalidValue(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(s) => write!(f, "I/O error: {s}"),
            Self::Parse(s) => write!(f, "parse error: {s}"),
            Self::InvalidValue(s) => write!(f, "invalid value: {s}"),
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn same_ports_rejected() {
        let mut config = Config::default();
        config.acct_port = config.auth_port;
        assert!(config.validate().is_err());
    }

    #[test]
    fn round_trips_through_json() {
        let config = Config::default();
        let json = serde_json::to_string(&config).unwrap();
        let parsed: Config = serde_json::from_str(&json).unwrap();
        assert_eq!(config.auth_port, parsed.auth_port);
    }

    #[test]
    fn env_override_takes_precedence_over_default() {
        std::env::set_var("AUTH_PORT", "18120");
        let mut config = Config::default();
        config.apply_env_overrides();
        assert_eq!(config.auth_port, 18120);
        std::env::remove_var("AUTH_PORT");
    }

    #[test]
    fn round_trips_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("radiusd.json");

        let mut config = Config::default();
        config.auth_port = 11812;
        config.database_path = "custom.db".to_string();
        config.to_file(&path).unwrap();

        let loaded = Config::from_file(&path).unwrap();
        assert_eq!(loaded.auth_port, 11812);
        assert_eq!(loaded.database_path, "custom.db");
    }

    #[test]
    fn from_file_surfaces_io_error_for_missing_path() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.json");
        assert!(matches!(Config::from_file(&missing), Err(ConfigError::Io(_))));
    }
}
