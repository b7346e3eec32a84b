//! Periodic reclamation of finished session directories.
//!
//! A ticking background task that walks everything it owns and evicts by
//! age, with a second, stricter pass when the disk budget is blown.

use crate::config::Config;
use crate::file_manager::FileManager;
use crate::session::manager::SessionManager;
use crate::session::SessionStatus;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CleanupStats {
    pub total_runs: u64,
    pub sessions_removed_last_run: u64,
    pub bytes_reclaimed_last_run: u64,
    pub last_run_unix: Option<i64>,
}

pub struct CleanupService {
    config: Arc<Config>,
    manager: Arc<SessionManager>,
    files: Arc<FileManager>,
    total_runs: AtomicU64,
    removed_last_run: AtomicU64,
    bytes_last_run: AtomicU64,
    last_run_unix: std::sync::atomic::AtomicI64,
}

impl CleanupService {
    pub fn new(config: Arc<Config>, manager: Arc<SessionManager>, files: Arc<FileManager>) -> Arc<Self> {
        Arc::new(Self {
            config,
            manager,
            files,
            total_runs: AtomicU64::new(0),
            removed_last_run: AtomicU64::new(0),
            bytes_last_run: AtomicU64::new(0),
            last_run_unix: std::sync::atomic::AtomicI64::new(0),
        })
    }

    pub fn spawn(self: &Arc<Self>) {
        let this = self.clone();
        let interval = this.config.cleanup.interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                if let Err(e) = this.run_once().await {
                    warn!(error = %e, "cleanup pass failed");
                }
                if let Err(e) = this.reclaim_to_budget().await {
                    warn!(error = %e, "emergency reclamation failed");
                }
            }
        });
    }

    /// One sweep: orphan directories with no session row get a grace
    /// period, terminal sessions past their retention window (extended for
    /// large outputs) are removed, capped at `batch_cap` removals so a
    /// single tick never stalls the event loop on a slow disk.
    pub async fn run_once(&self) -> crate::error::Result<CleanupStats> {
        let now = Utc::now();
        let mut removed = 0u64;
        let mut bytes = 0u64;
        let batch_cap = self.config.cleanup.batch_cap;

        for session in self.manager.list() {
            if removed as usize >= batch_cap {
                break;
            }
            if !session.status.is_terminal() {
                continue;
            }

            let idle = now.signed_duration_since(session.last_accessed);
            let size = self.files.dir_size(&session.directory_path).await.unwrap_or(0);
            let is_large = size >= self.config.large_file_threshold_bytes();
            let retention_hours =
                if is_large { self.config.cleanup.extended_retention_hours } else { self.config.cleanup.retention_hours };

            if idle.num_hours() < retention_hours as i64 {
                continue;
            }

            if let Err(e) = tokio::fs::remove_dir_all(&session.directory_path).await {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!(session_id = %session.id, error = %e, "failed to remove session directory");
                    continue;
                }
            }
            self.manager.store().remove(session.id);
            removed += 1;
            bytes += size;
        }

        self.sweep_orphans(&mut removed, &mut bytes, batch_cap).await?;

        self.total_runs.fetch_add(1, Ordering::Relaxed);
        self.removed_last_run.store(removed, Ordering::Relaxed);
        self.bytes_last_run.store(bytes, Ordering::Relaxed);
        self.last_run_unix.store(now.timestamp(), Ordering::Relaxed);

        if removed > 0 {
            info!(removed, bytes, "cleanup pass reclaimed session directories");
        }

        Ok(self.stats())
    }

    /// Directories under `transcoding_dir` that a provider created but this
    /// process has no session row for (crash between `create_dir_all` and
    /// the row being inserted, or a stale row evicted by a prior restart)
    /// are removed once they are older than `orphan_grace_period`.
    async fn sweep_orphans(&self, removed: &mut u64, bytes: &mut u64, batch_cap: usize) -> crate::error::Result<()> {
        let known: std::collections::HashSet<String> = self
            .manager
            .list()
            .into_iter()
            .filter_map(|s| s.directory_path.file_name().map(|n| n.to_string_lossy().to_string()))
            .collect();

        let mut entries = match tokio::fs::read_dir(self.files.transcoding_dir()).await {
            Ok(e) => e,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        };

        while let Some(entry) = entries.next_entry().await? {
            if *removed as usize >= batch_cap {
                break;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            if known.contains(&name) {
                continue;
            }
            let metadata = entry.metadata().await?;
            if !metadata.is_dir() {
                continue;
            }
            let modified = metadata.modified().unwrap_or(std::time::SystemTime::now());
            let age = modified.elapsed().unwrap_or_default();
            if age < self.config.cleanup.orphan_grace_period {
                continue;
            }
            let size = self.files.dir_size(&entry.path()).await.unwrap_or(0);
            if tokio::fs::remove_dir_all(entry.path()).await.is_ok() {
                *removed += 1;
                *bytes += size;
            }
        }
        Ok(())
    }

    /// Emergency reclamation triggered when the disk budget is blown:
    /// removes terminal sessions oldest-first, ignoring retention, and if
    /// that still isn't enough starts stopping the longest-idle running
    /// sessions until usage drops back under budget or nothing is left.
    ///
    /// Figures into the same "last run" counters as `run_once`, since a
    /// caller always runs the two back to back as one logical cleanup pass.
    pub async fn reclaim_to_budget(&self) -> crate::error::Result<CleanupStats> {
        let mut usage = self.files.dir_size(self.files.transcoding_dir()).await?;
        let budget = self.config.max_disk_bytes();
        if usage <= budget {
            return Ok(self.stats());
        }

        warn!(usage, budget, "disk budget exceeded, starting emergency reclamation");

        let mut terminal: Vec<_> = self.manager.list().into_iter().filter(|s| s.status.is_terminal()).collect();
        terminal.sort_by_key(|s| s.last_accessed);
        let (removed_terminal, bytes_terminal) = self.evict_oldest_first(terminal, &mut usage, budget, false).await;

        let mut removed = removed_terminal;
        let mut bytes = bytes_terminal;

        if usage > budget {
            let mut running: Vec<_> =
                self.manager.list().into_iter().filter(|s| s.status == SessionStatus::Running).collect();
            running.sort_by_key(|s| s.last_accessed);
            let (removed_running, bytes_running) = self.evict_oldest_first(running, &mut usage, budget, true).await;
            removed += removed_running;
            bytes += bytes_running;
        }

        self.removed_last_run.fetch_add(removed, Ordering::Relaxed);
        self.bytes_last_run.fetch_add(bytes, Ordering::Relaxed);
        self.total_runs.fetch_add(1, Ordering::Relaxed);
        self.last_run_unix.store(Utc::now().timestamp(), Ordering::Relaxed);
        Ok(self.stats())
    }

    /// Removes sessions from `candidates` (already sorted oldest-first)
    /// until `usage` drops to `budget` or the list is exhausted. When
    /// `stop_first` is set each candidate is still running and is stopped
    /// before its directory is removed.
    async fn evict_oldest_first(
        &self,
        candidates: Vec<crate::session::TranscodeSession>,
        usage: &mut u64,
        budget: u64,
        stop_first: bool,
    ) -> (u64, u64) {
        let mut removed = 0u64;
        let mut bytes = 0u64;
        for session in candidates {
            if *usage <= budget {
                break;
            }
            if stop_first {
                warn!(session_id = %session.id, "stopping running session to reclaim disk budget");
                if self.manager.stop(session.id).await.is_err() {
                    continue;
                }
            }
            let size = self.files.dir_size(&session.directory_path).await.unwrap_or(0);
            if tokio::fs::remove_dir_all(&session.directory_path).await.is_ok() {
                self.manager.store().remove(session.id);
                *usage = usage.saturating_sub(size);
                removed += 1;
                bytes += size;
            }
        }
        (removed, bytes)
    }

    pub fn stats(&self) -> CleanupStats {
        CleanupStats {
            total_runs: self.total_runs.load(Ordering::Relaxed),
            sessions_removed_last_run: self.removed_last_run.load(Ordering::Relaxed),
            bytes_reclaimed_last_run: self.bytes_last_run.load(Ordering::Relaxed),
            last_run_unix: {
                let v = self.last_run_unix.load(Ordering::Relaxed);
                if v == 0 { None } else { Some(v) }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CodecOptions, DeviceProfile, Resolution, TranscodeRequest};
    use crate::monitoring::Metrics;
    use crate::provider::registry::ProviderRegistry;
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
                retention_hours: 0,
                extended_retention_hours: 0,
                large_file_threshold_mb: 500,
                orphan_grace_period: Duration::from_secs(0),
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

    fn request() -> TranscodeRequest {
        TranscodeRequest {
            input_path: "/media/a.mkv".into(),
            media_id: "m1".into(),
            codec_opts: CodecOptions::default(),
            seek_start: None,
            subtitle: None,
            device: DeviceProfile {
                user_agent: "test".into(),
                supported_video_codecs: vec!["h264".into()],
                supported_audio_codecs: vec!["aac".into()],
                supported_containers: vec!["dash".into()],
                max_resolution: Resolution::R1080p,
                max_bitrate_kbps: 6000,
                supports_hevc: false,
                supports_av1: false,
                supports_hdr: false,
                client_ip: "127.0.0.1".into(),
            },
            environment: Default::default(),
            session_id: None,
        }
    }

    #[tokio::test]
    async fn removes_stopped_session_past_retention() {
        let dir = tempdir().unwrap();
        let config = test_config(dir.path());
        let registry = Arc::new(ProviderRegistry::new());
        registry.register(Arc::new(SoftwareProvider::new(10))).await;
        let store = Arc::new(SessionStore::new());
        let manager = SessionManager::new(store, registry, config.clone(), Arc::new(Metrics::new()));
        let files = Arc::new(FileManager::new(dir.path().to_path_buf()));

        let session = manager.start(request()).await.unwrap();
        manager.stop(session.id).await.unwrap();

        let cleanup = CleanupService::new(config, manager.clone(), files);
        let stats = cleanup.run_once().await.unwrap();
        assert_eq!(stats.sessions_removed_last_run, 1);
        assert!(manager.get(session.id).is_err());
    }

    #[tokio::test]
    async fn running_sessions_are_never_swept() {
        let dir = tempdir().unwrap();
        let config = test_config(dir.path());
        let registry = Arc::new(ProviderRegistry::new());
        registry.register(Arc::new(SoftwareProvider::new(10))).await;
        let store = Arc::new(SessionStore::new());
        let manager = SessionManager::new(store, registry, config.clone(), Arc::new(Metrics::new()));
        let files = Arc::new(FileManager::new(dir.path().to_path_buf()));

        let session = manager.start(request()).await.unwrap();
        let cleanup = CleanupService::new(config, manager.clone(), files);
        cleanup.run_once().await.unwrap();
        assert!(manager.get(session.id).is_ok());
    }

    #[tokio::test]
    async fn reclaim_to_budget_stops_running_session_when_no_terminal_ones_remain() {
        let dir = tempdir().unwrap();
        let mut config_inner = (*test_config(dir.path())).clone();
        config_inner.max_disk_gb = 0;
        let config = Arc::new(config_inner);
        let registry = Arc::new(ProviderRegistry::new());
        registry.register(Arc::new(SoftwareProvider::new(10))).await;
        let store = Arc::new(SessionStore::new());
        let manager = SessionManager::new(store, registry, config.clone(), Arc::new(Metrics::new()));
        let files = Arc::new(FileManager::new(dir.path().to_path_buf()));

        let session = manager.start(request()).await.unwrap();
        tokio::fs::write(session.directory_path.join("chunk.bin"), vec![0u8; 4096]).await.unwrap();

        let cleanup = CleanupService::new(config, manager.clone(), files);
        let stats = cleanup.reclaim_to_budget().await.unwrap();
        assert_eq!(stats.sessions_removed_last_run, 1);
        assert!(manager.get(session.id).is_err());
    }

    #[tokio::test]
    async fn reclaim_to_budget_is_a_noop_under_budget() {
        let dir = tempdir().unwrap();
        let config = test_config(dir.path());
        let registry = Arc::new(ProviderRegistry::new());
        registry.register(Arc::new(SoftwareProvider::new(10))).await;
        let store = Arc::new(SessionStore::new());
        let manager = SessionManager::new(store, registry, config.clone(), Arc::new(Metrics::new()));
        let files = Arc::new(FileManager::new(dir.path().to_path_buf()));

        let session = manager.start(request()).await.unwrap();
        let cleanup = CleanupService::new(config, manager.clone(), files);
        cleanup.reclaim_to_budget().await.unwrap();
        assert!(manager.get(session.id).is_ok());
    }
}
