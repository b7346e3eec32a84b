//! Health snapshot narrowed from a generic service checklist
//! (database/redis/grpc) to the three things that actually determine
//! whether this core can serve playback: disk budget, provider
//! availability, and session capacity.

use crate::config::Config;
use crate::file_manager::FileManager;
use crate::provider::registry::ProviderRegistry;
use crate::session::manager::SessionManager;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceHealth {
    pub name: String,
    pub status: HealthStatus,
    pub detail: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemHealth {
    pub overall_status: HealthStatus,
    pub services: Vec<ServiceHealth>,
}

pub struct HealthMonitor {
    config: Arc<Config>,
    registry: Arc<ProviderRegistry>,
    manager: Arc<SessionManager>,
    files: Arc<FileManager>,
}

impl HealthMonitor {
    pub fn new(
        config: Arc<Config>,
        registry: Arc<ProviderRegistry>,
        manager: Arc<SessionManager>,
        files: Arc<FileManager>,
    ) -> Self {
        Self { config, registry, manager, files }
    }

    pub async fn check(&self) -> SystemHealth {
        let mut services = Vec::new();

        let providers = self.registry.list().await;
        services.push(if providers.is_empty() {
            ServiceHealth { name: "providers".into(), status: HealthStatus::Unhealthy, detail: "no providers registered".into() }
        } else {
            ServiceHealth {
                name: "providers".into(),
                status: HealthStatus::Healthy,
                detail: format!("{} provider(s) registered", providers.len()),
            }
        });

        let active = self.manager.active_count().await;
        services.push(if active >= self.config.max_sessions {
            ServiceHealth {
                name: "sessions".into(),
                status: HealthStatus::Degraded,
                detail: format!("{active}/{} sessions active, at capacity", self.config.max_sessions),
            }
        } else {
            ServiceHealth {
                name: "sessions".into(),
                status: HealthStatus::Healthy,
                detail: format!("{active}/{} sessions active", self.config.max_sessions),
            }
        });

        let usage = self.files.dir_size(self.files.transcoding_dir()).await.unwrap_or(0);
        let budget = self.config.max_disk_bytes();
        let ratio = if budget > 0 { usage as f64 / budget as f64 } else { 0.0 };
        services.push(if ratio >= 1.0 {
            ServiceHealth { name: "disk".into(), status: HealthStatus::Unhealthy, detail: format!("usage {usage}B exceeds budget {budget}B") }
        } else if ratio >= 0.9 {
            ServiceHealth { name: "disk".into(), status: HealthStatus::Degraded, detail: format!("usage at {:.0}% of budget", ratio * 100.0) }
        } else {
            ServiceHealth { name: "disk".into(), status: HealthStatus::Healthy, detail: format!("usage at {:.0}% of budget", ratio * 100.0) }
        });

        let overall_status = if services.iter().any(|s| s.status == HealthStatus::Unhealthy) {
            HealthStatus::Unhealthy
        } else if services.iter().any(|s| s.status == HealthStatus::Degraded) {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        };

        SystemHealth { overall_status, services }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitoring::Metrics;
    use crate::provider::software::SoftwareProvider;
    use crate::session::store::SessionStore;
    use std::time::Duration;
    use tempfile::tempdir;

    fn test_config(dir: &std::path::Path) -> Arc<Config> {
        Arc::new(Config {
            bind_addr: "127.0.0.1:0".into(),
            transcoding_dir: dir.to_path_buf(),
            temp_dir: dir.to_path_buf(),
            max_sessions: 10,
            max_disk_gb: 50,
            cleanup: crate::config::CleanupConfig {
                interval: Duration::from_secs(30),
                retention_hours: 24,
                extended_retention_hours: 48,
                large_file_threshold_mb: 500,
                orphan_grace_period: Duration::from_secs(300),
                batch_cap: 200,
            },
            security: crate::config::SecurityConfig {
                allowed_origins: vec!["*".into()],
                rate_limit_requests_per_minute: 600,
                rate_limit_burst: 60,
            },
            monitoring: crate::config::MonitoringConfig { metrics_enabled: false, log_level: "info".into() },
            progress_poll_interval: Duration::from_millis(20),
            environment: crate::config::Environment::Testing,
        })
    }

    #[tokio::test]
    async fn unhealthy_with_no_providers() {
        let dir = tempdir().unwrap();
        let config = test_config(dir.path());
        let registry = Arc::new(ProviderRegistry::new());
        let store = Arc::new(SessionStore::new());
        let manager = SessionManager::new(store, registry.clone(), config.clone(), Arc::new(Metrics::new()));
        let files = Arc::new(FileManager::new(dir.path().to_path_buf()));

        let monitor = HealthMonitor::new(config, registry, manager, files);
        let health = monitor.check().await;
        assert_eq!(health.overall_status, HealthStatus::Unhealthy);
    }

    #[tokio::test]
    async fn healthy_with_provider_registered_and_capacity_free() {
        let dir = tempdir().unwrap();
        let config = test_config(dir.path());
        let registry = Arc::new(ProviderRegistry::new());
        registry.register(Arc::new(SoftwareProvider::new(10))).await;
        let store = Arc::new(SessionStore::new());
        let manager = SessionManager::new(store, registry.clone(), config.clone(), Arc::new(Metrics::new()));
        let files = Arc::new(FileManager::new(dir.path().to_path_buf()));

        let monitor = HealthMonitor::new(config, registry, manager, files);
        let health = monitor.check().await;
        assert_eq!(health.overall_status, HealthStatus::Healthy);
    }
}
