//! Environment-driven configuration, loaded and validated once at startup.

use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    pub bind_addr: String,
    pub transcoding_dir: PathBuf,
    pub temp_dir: PathBuf,

    pub max_sessions: usize,
    pub max_disk_gb: u64,

    pub cleanup: CleanupConfig,
    pub security: SecurityConfig,
    pub monitoring: MonitoringConfig,

    pub progress_poll_interval: Duration,
    pub environment: Environment,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CleanupConfig {
    pub interval: Duration,
    pub retention_hours: u64,
    pub extended_retention_hours: u64,
    pub large_file_threshold_mb: u64,
    pub orphan_grace_period: Duration,
    pub batch_cap: usize,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub allowed_origins: Vec<String>,
    pub rate_limit_requests_per_minute: u32,
    pub rate_limit_burst: u32,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MonitoringConfig {
    pub metrics_enabled: bool,
    pub log_level: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum Environment {
    Development,
    Testing,
    Production,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let environment = match env::var("ENVIRONMENT")
            .unwrap_or_else(|_| "development".to_string())
            .to_lowercase()
            .as_str()
        {
            "production" | "prod" => Environment::Production,
            "testing" | "test" => Environment::Testing,
            _ => Environment::Development,
        };

        let config = Self {
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string()),
            transcoding_dir: env::var("TRANSCODING_DIR")
                .unwrap_or_else(|_| "/viewra-data/transcoding".to_string())
                .into(),
            temp_dir: env::var("TEMP_DIR").unwrap_or_else(|_| "/tmp/playback-core".to_string()).into(),

            max_sessions: parse_env("MAX_SESSIONS", 10),
            max_disk_gb: parse_env("MAX_DISK_GB", 50),

            cleanup: CleanupConfig {
                interval: Duration::from_secs(parse_env("CLEANUP_INTERVAL", 30)),
                retention_hours: parse_env("RETENTION_HOURS", 24),
                extended_retention_hours: parse_env("EXTENDED_RETENTION_HOURS", 48),
                large_file_threshold_mb: parse_env("LARGE_FILE_MB", 500),
                orphan_grace_period: Duration::from_secs(parse_env("ORPHAN_GRACE_SECONDS", 300)),
                batch_cap: parse_env("CLEANUP_BATCH_CAP", 200),
            },

            security: SecurityConfig {
                allowed_origins: env::var("ALLOWED_ORIGINS")
                    .unwrap_or_else(|_| "*".to_string())
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .collect(),
                rate_limit_requests_per_minute: parse_env("RATE_LIMIT_RPM", 600),
                rate_limit_burst: parse_env("RATE_LIMIT_BURST", 60),
            },

            monitoring: MonitoringConfig {
                metrics_enabled: parse_env("METRICS_ENABLED", true),
                log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            },

            progress_poll_interval: Duration::from_millis(parse_env("PROGRESS_POLL_INTERVAL_MS", 1000)),
            environment,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_sessions == 0 {
            return Err(ConfigError::InvalidMaxSessions);
        }
        if self.max_disk_gb == 0 {
            return Err(ConfigError::InvalidDiskBudget);
        }
        if self.cleanup.retention_hours == 0 {
            return Err(ConfigError::InvalidRetention);
        }
        if self.cleanup.extended_retention_hours < self.cleanup.retention_hours {
            return Err(ConfigError::InvalidRetention);
        }
        Ok(())
    }

    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }

    pub fn max_disk_bytes(&self) -> u64 {
        self.max_disk_gb * 1024 * 1024 * 1024
    }

    pub fn large_file_threshold_bytes(&self) -> u64 {
        self.cleanup.large_file_threshold_mb * 1024 * 1024
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("MAX_SESSIONS must be greater than zero")]
    InvalidMaxSessions,
    #[error("MAX_DISK_GB must be greater than zero")]
    InvalidDiskBudget,
    #[error("RETENTION_HOURS must be greater than zero")]
    InvalidRetention,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        let cfg = Config {
            bind_addr: "0.0.0.0:8080".into(),
            transcoding_dir: "/tmp/t".into(),
            temp_dir: "/tmp/tt".into(),
            max_sessions: 10,
            max_disk_gb: 50,
            cleanup: CleanupConfig {
                interval: Duration::from_secs(30),
                retention_hours: 24,
                extended_retention_hours: 48,
                large_file_threshold_mb: 500,
                orphan_grace_period: Duration::from_secs(300),
                batch_cap: 200,
            },
            security: SecurityConfig {
                allowed_origins: vec!["*".to_string()],
                rate_limit_requests_per_minute: 600,
                rate_limit_burst: 60,
            },
            monitoring: MonitoringConfig { metrics_enabled: true, log_level: "info".into() },
            progress_poll_interval: Duration::from_millis(1000),
            environment: Environment::Development,
        };
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.max_disk_bytes(), 50 * 1024 * 1024 * 1024);
    }

    #[test]
    fn rejects_extended_retention_shorter_than_standard() {
        let cfg = Config {
            bind_addr: "0.0.0.0:8080".into(),
            transcoding_dir: "/tmp/t".into(),
            temp_dir: "/tmp/tt".into(),
            max_sessions: 10,
            max_disk_gb: 50,
            cleanup: CleanupConfig {
                interval: Duration::from_secs(30),
                retention_hours: 48,
                extended_retention_hours: 24,
                large_file_threshold_mb: 500,
                orphan_grace_period: Duration::from_secs(300),
                batch_cap: 200,
            },
            security: SecurityConfig {
                allowed_origins: vec!["*".to_string()],
                rate_limit_requests_per_minute: 600,
                rate_limit_burst: 60,
            },
            monitoring: MonitoringConfig { metrics_enabled: true, log_level: "info".into() },
            progress_poll_interval: Duration::from_millis(1000),
            environment: Environment::Development,
        };
        assert!(matches!(cfg.validate(), Err(ConfigError::InvalidRetention)));
    }
}
