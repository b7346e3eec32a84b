//! Provider (transcoder backend) contract.
//!
//! An adapter is anything that can start, monitor and stop a transcoding
//! worker and report what it supports. Concrete adapters live in
//! `software.rs` / `hardware.rs`; `registry.rs` holds the process-wide
//! mapping from provider id to adapter.

pub mod hardware;
pub mod registry;
pub mod software;

use crate::error::Result;
use crate::model::TranscodeRequest;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderInfo {
    pub id: String,
    pub display_name: String,
    pub priority: i32,
    pub supported_containers: Vec<String>,
    pub supported_codecs: Vec<String>,
    pub supported_resolutions: Vec<String>,
    pub max_concurrent_sessions: usize,
    pub hardware_accel: bool,
    pub supports_streaming_output: bool,
    pub supports_subtitle_burn_in: bool,
    pub supports_multi_audio: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProgressSnapshot {
    pub percent: f32,
    pub fps: f32,
    pub speed: f32,
    pub eta_seconds: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscodeOutcome {
    pub bytes_produced: u64,
    pub duration_seconds: f64,
}

/// A live worker started by an adapter. Dropping the handle does not stop
/// the worker — callers must go through `ProviderAdapter::stop`; the
/// handle only carries enough state for `progress`/`stop` to act on it.
pub struct TranscodeHandle {
    pub provider_id: String,
    pub session_id: String,
    pub cancel: CancellationToken,
    pub progress: Arc<parking_lot::RwLock<ProgressSnapshot>>,
    pub outcome: Arc<parking_lot::RwLock<Option<std::result::Result<TranscodeOutcome, String>>>>,
    /// Present only for progressive (non-adaptive) output: the ordered byte
    /// stream DeliveryHTTP copies into the HTTP response body. Adaptive
    /// (dash/hls) adapters write into `out_dir` instead and leave this
    /// `None`.
    pub progressive_output: Option<flume::Receiver<bytes::Bytes>>,
}

impl TranscodeHandle {
    pub fn is_finished(&self) -> bool {
        self.outcome.read().is_some()
    }

    pub fn take_outcome(&self) -> Option<std::result::Result<TranscodeOutcome, String>> {
        self.outcome.read().clone()
    }
}

#[async_trait]
pub trait ProviderAdapter: Send + Sync + std::fmt::Debug {
    fn info(&self) -> ProviderInfo;

    /// Whether this adapter can service `req`, with a human-readable reason
    /// either way — the registry surfaces the reason in `ErrNoProvider`.
    fn supports(&self, req: &TranscodeRequest) -> (bool, String);

    /// Current count of sessions this adapter is actively running, used by
    /// the registry to enforce `max_concurrent_sessions`.
    fn active_sessions(&self) -> usize;

    /// Start a worker writing into `out_dir`. Must honor cancellation of the
    /// returned handle's token by terminating the worker and releasing any
    /// temporary resources within a bounded grace period.
    async fn start(&self, req: &TranscodeRequest, out_dir: &Path) -> Result<TranscodeHandle>;

    fn progress(&self, handle: &TranscodeHandle) -> ProgressSnapshot {
        handle.progress.read().clone()
    }

    /// Synchronous, idempotent termination.
    async fn stop(&self, handle: &TranscodeHandle);
}
