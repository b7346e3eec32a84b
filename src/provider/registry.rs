//! Process-wide provider registry: a value constructed at startup and
//! passed by reference, with concurrent mutation through a small lock
//! rather than package-init side effects.
//!
//! Generalized from a single hard-coded transcoding engine to a pluggable
//! set of adapters registered by id.

use super::ProviderAdapter;
use crate::error::{AppError, Result};
use crate::model::TranscodeRequest;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Default)]
pub struct ProviderRegistry {
    adapters: RwLock<HashMap<String, Arc<dyn ProviderAdapter>>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self { adapters: RwLock::new(HashMap::new()) }
    }

    /// Idempotent: registering the same id twice replaces the prior
    /// adapter rather than erroring.
    pub async fn register(&self, adapter: Arc<dyn ProviderAdapter>) {
        let id = adapter.info().id;
        self.adapters.write().await.insert(id, adapter);
    }

    pub async fn unregister(&self, id: &str) {
        self.adapters.write().await.remove(id);
    }

    pub async fn list(&self) -> Vec<super::ProviderInfo> {
        self.adapters.read().await.values().map(|a| a.info()).collect()
    }

    pub async fn get(&self, id: &str) -> Option<Arc<dyn ProviderAdapter>> {
        self.adapters.read().await.get(id).cloned()
    }

    /// Selection algorithm:
    /// 1. filter by `supports`
    /// 2. filter by concurrency headroom
    /// 3. tie-break by priority desc, then load asc
    pub async fn select(&self, req: &TranscodeRequest) -> Result<Arc<dyn ProviderAdapter>> {
        let adapters = self.adapters.read().await;
        let mut candidates: Vec<Arc<dyn ProviderAdapter>> = Vec::new();
        let mut reasons: Vec<String> = Vec::new();

        for adapter in adapters.values() {
            let (supported, reason) = adapter.supports(req);
            if !supported {
                reasons.push(format!("{}: {reason}", adapter.info().id));
                continue;
            }
            let info = adapter.info();
            if adapter.active_sessions() >= info.max_concurrent_sessions {
                reasons.push(format!("{}: at capacity", info.id));
                continue;
            }
            candidates.push(adapter.clone());
        }

        candidates.sort_by(|a, b| {
            let ia = a.info();
            let ib = b.info();
            ib.priority
                .cmp(&ia.priority)
                .then_with(|| a.active_sessions().cmp(&b.active_sessions()))
        });

        candidates.into_iter().next().ok_or_else(|| AppError::NoProvider {
            reason: if reasons.is_empty() {
                "no providers registered".to_string()
            } else {
                reasons.join("; ")
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::software::SoftwareProvider;

    fn sample_request() -> TranscodeRequest {
        use crate::model::{CodecOptions, DeviceProfile, Resolution};
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
    async fn selects_registered_provider() {
        let registry = ProviderRegistry::new();
        registry.register(Arc::new(SoftwareProvider::new(10))).await;
        let selected = registry.select(&sample_request()).await.unwrap();
        assert_eq!(selected.info().id, "software");
    }

    #[tokio::test]
    async fn fails_with_no_providers() {
        let registry = ProviderRegistry::new();
        let err = registry.select(&sample_request()).await.unwrap_err();
        assert!(matches!(err, AppError::NoProvider { .. }));
    }

    #[tokio::test]
    async fn registration_is_idempotent_per_id() {
        let registry = ProviderRegistry::new();
        registry.register(Arc::new(SoftwareProvider::new(10))).await;
        registry.register(Arc::new(SoftwareProvider::new(5))).await;
        assert_eq!(registry.list().await.len(), 1);
    }
}
