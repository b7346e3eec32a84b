//! Orchestrates the session lifecycle.
//!
//! `SessionStore` is the durable record; `SessionManager` layers a hot map
//! of in-flight `TranscodeHandle`s on top of it — a split between what is
//! running right now and the job history a caller polls by id. Only hot
//! map mutations are held under the lock; provider I/O and the actual
//! encode run outside it.

use super::store::SessionStore;
use super::{SessionResult, SessionStatus, TranscodeSession};
use crate::config::Config;
use crate::error::{AppError, Result};
use crate::eventbus::{EventBus, SessionEvent};
use crate::model::TranscodeRequest;
use crate::monitoring::Metrics;
use crate::provider::registry::ProviderRegistry;
use crate::provider::{ProgressSnapshot, ProviderAdapter, TranscodeHandle};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

struct RunningJob {
    handle: Arc<TranscodeHandle>,
    provider: Arc<dyn ProviderAdapter>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SessionStats {
    pub total: usize,
    pub pending: usize,
    pub running: usize,
    pub completed: usize,
    pub failed: usize,
    pub stopped: usize,
}

pub struct SessionManager {
    store: Arc<SessionStore>,
    registry: Arc<ProviderRegistry>,
    config: Arc<Config>,
    hot: Mutex<HashMap<Uuid, RunningJob>>,
    events: Arc<EventBus>,
    metrics: Arc<Metrics>,
}

impl SessionManager {
    pub fn new(store: Arc<SessionStore>, registry: Arc<ProviderRegistry>, config: Arc<Config>, metrics: Arc<Metrics>) -> Arc<Self> {
        Arc::new(Self { store, registry, config, hot: Mutex::new(HashMap::new()), events: EventBus::new(), metrics })
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    /// Selects a provider, creates the output directory, starts the worker
    /// and registers a supervisor that copies progress/outcome back into
    /// the durable store until the session reaches a terminal state.
    pub async fn start(self: &Arc<Self>, request: TranscodeRequest) -> Result<TranscodeSession> {
        let request = request.with_defaults();
        let provider = self.registry.select(&request).await?;
        let info = provider.info();

        let id = Uuid::new_v4();
        let dir_name = TranscodeSession::dir_name(&request.codec_opts.container, &info.id, id);
        let directory_path = self.config.transcoding_dir.join(&dir_name);
        if let Err(e) = tokio::fs::create_dir_all(&directory_path).await {
            // ENOSPC: directory creation failed because the volume is full.
            if e.raw_os_error() == Some(28) {
                return Err(AppError::DiskFull { message: e.to_string() });
            }
            return Err(e.into());
        }

        let mut request = request;
        request.session_id = Some(id.to_string());

        let now = chrono::Utc::now();
        let session = TranscodeSession {
            id,
            provider_id: info.id.clone(),
            status: SessionStatus::Pending,
            request: request.clone(),
            progress: ProgressSnapshot::default(),
            result: None,
            hardware_hint: info.hardware_accel,
            start_time: now,
            end_time: None,
            last_accessed: now,
            directory_path: directory_path.clone(),
            created_at: now,
            updated_at: now,
        };
        self.store.insert(session);

        let handle = match provider.start(&request, &directory_path).await {
            Ok(h) => h,
            Err(e) => {
                let _ = tokio::fs::remove_dir_all(&directory_path).await;
                self.store.update(id, |s| s.status = SessionStatus::Failed)?;
                return Err(AppError::ProviderStart { message: e.to_string() });
            }
        };
        let handle = Arc::new(handle);

        self.store.update(id, |s| s.status = SessionStatus::Running)?;
        self.hot.lock().await.insert(id, RunningJob { handle: handle.clone(), provider: provider.clone() });
        self.events.publish(SessionEvent::Started { session_id: id, provider_id: info.id.clone() });

        self.spawn_supervisor(id, handle);

        self.store.get(id)
    }

    fn spawn_supervisor(self: &Arc<Self>, id: Uuid, handle: Arc<TranscodeHandle>) {
        let this = self.clone();
        let poll_interval = this.config.progress_poll_interval;
        tokio::spawn(async move {
            loop {
                if handle.is_finished() {
                    break;
                }
                let snapshot = handle.progress.read().clone();
                let _ = this.store.update(id, |s| {
                    s.progress = snapshot;
                    s.last_accessed = chrono::Utc::now();
                });
                tokio::time::sleep(poll_interval).await;
            }

            let outcome = handle.take_outcome();
            let final_status = match &outcome {
                Some(Ok(_)) => SessionStatus::Completed,
                Some(Err(_)) => SessionStatus::Failed,
                None => SessionStatus::Failed,
            };

            let update = this.store.update(id, |s| {
                // A concurrent `stop()` may already have moved this session to
                // `Stopped` — that transition wins, we never overwrite it.
                if s.status == SessionStatus::Running {
                    s.status = final_status;
                }
                if let Some(Ok(result)) = &outcome {
                    s.result = Some(SessionResult::from(result.clone()));
                }
                s.end_time = Some(chrono::Utc::now());
            });

            if let Err(e) = update {
                warn!(session_id = %id, error = %e, "failed to persist terminal session state");
            } else {
                match &outcome {
                    Some(Ok(_)) => {
                        this.metrics.record_session_completed();
                        this.events.publish(SessionEvent::Completed { session_id: id });
                    }
                    Some(Err(message)) => {
                        this.metrics.record_session_failed();
                        this.events.publish(SessionEvent::Failed { session_id: id, message: message.clone() });
                    }
                    None => {
                        this.metrics.record_session_failed();
                        this.events.publish(SessionEvent::Failed {
                            session_id: id,
                            message: "provider exited without an outcome".into(),
                        });
                    }
                }
            }
            this.hot.lock().await.remove(&id);
            info!(session_id = %id, status = ?final_status, "transcode session finished");
        });
    }

    /// Idempotent: stopping an already-terminal session is a success no-op
    /// signalled via `AppError::SessionTerminal`, not an error.
    pub async fn stop(&self, id: Uuid) -> Result<TranscodeSession> {
        let current = self.store.get(id)?;
        if current.status.is_terminal() {
            return Err(AppError::SessionTerminal { session_id: id.to_string() });
        }

        let job = self.hot.lock().await.remove(&id);
        if let Some(job) = job {
            job.provider.stop(&job.handle).await;
        }

        let session = self.store.update(id, |s| {
            s.status = SessionStatus::Stopped;
            s.end_time = Some(chrono::Utc::now());
        })?;
        self.events.publish(SessionEvent::Stopped { session_id: id });
        Ok(session)
    }

    /// Reads a session, touching `last_accessed` at most once per second so
    /// a client polling or streaming rapidly doesn't turn every request into
    /// a store write.
    pub fn get(&self, id: Uuid) -> Result<TranscodeSession> {
        let session = self.store.get(id)?;
        let now = chrono::Utc::now();
        if now.signed_duration_since(session.last_accessed) >= chrono::Duration::seconds(1) {
            if let Ok(touched) = self.store.update(id, |s| s.last_accessed = now) {
                return Ok(touched);
            }
        }
        Ok(session)
    }

    pub fn list(&self) -> Vec<TranscodeSession> {
        self.store.list()
    }

    pub fn list_by_media(&self, media_id: &str) -> Vec<TranscodeSession> {
        self.store.list_by_media(media_id)
    }

    pub async fn progressive_receiver(&self, id: Uuid) -> Option<flume::Receiver<bytes::Bytes>> {
        self.hot.lock().await.get(&id).and_then(|job| job.handle.progressive_output.clone())
    }

    pub async fn active_count(&self) -> usize {
        self.hot.lock().await.len()
    }

    pub fn stats(&self) -> SessionStats {
        let mut stats = SessionStats::default();
        for session in self.store.list() {
            stats.total += 1;
            match session.status {
                SessionStatus::Pending => stats.pending += 1,
                SessionStatus::Running => stats.running += 1,
                SessionStatus::Completed => stats.completed += 1,
                SessionStatus::Failed => stats.failed += 1,
                SessionStatus::Stopped => stats.stopped += 1,
            }
        }
        stats
    }
}
