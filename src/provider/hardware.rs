//! Hardware-accelerated provider. Narrower codec support and a small
//! concurrency ceiling (most hosts expose one or two encode engines), but
//! higher priority than the software fallback when it does apply — this
//! gives `ProviderRegistry::select`'s tie-break logic a real second
//! candidate to choose between.

use super::{ProgressSnapshot, ProviderAdapter, ProviderInfo, TranscodeHandle, TranscodeOutcome};
use crate::error::Result;
use crate::model::TranscodeRequest;
use async_trait::async_trait;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;

const SUPPORTED_CODECS: [&str; 2] = ["h264", "hevc"];

#[derive(Debug)]
pub struct HardwareAcceleratedProvider {
    max_concurrent_sessions: usize,
    active: Arc<AtomicUsize>,
}

impl HardwareAcceleratedProvider {
    pub fn new(max_concurrent_sessions: usize) -> Self {
        Self { max_concurrent_sessions, active: Arc::new(AtomicUsize::new(0)) }
    }
}

#[async_trait]
impl ProviderAdapter for HardwareAcceleratedProvider {
    fn info(&self) -> ProviderInfo {
        ProviderInfo {
            id: "hardware".to_string(),
            display_name: "Hardware-accelerated transcoder".to_string(),
            priority: 20,
            supported_containers: vec!["dash".into(), "mp4".into()],
            supported_codecs: SUPPORTED_CODECS.iter().map(|s| s.to_string()).collect(),
            supported_resolutions: vec!["480p".into(), "720p".into(), "1080p".into(), "2160p".into()],
            max_concurrent_sessions: self.max_concurrent_sessions,
            hardware_accel: true,
            supports_streaming_output: true,
            supports_subtitle_burn_in: false,
            supports_multi_audio: false,
        }
    }

    fn supports(&self, req: &TranscodeRequest) -> (bool, String) {
        if !SUPPORTED_CODECS.contains(&req.codec_opts.video_codec.as_str()) {
            return (false, format!("codec '{}' has no hardware encode path", req.codec_opts.video_codec));
        }
        if req.subtitle.as_ref().is_some_and(|s| s.burn_in) {
            return (false, "hardware encoder cannot burn in subtitles".to_string());
        }
        (true, "hardware encode path available".to_string())
    }

    fn active_sessions(&self) -> usize {
        self.active.load(Ordering::Relaxed)
    }

    async fn start(&self, req: &TranscodeRequest, out_dir: &Path) -> Result<TranscodeHandle> {
        let cancel = CancellationToken::new();
        let progress = Arc::new(parking_lot::RwLock::new(ProgressSnapshot::default()));
        let outcome = Arc::new(parking_lot::RwLock::new(None));

        let active = self.active.clone();
        active.fetch_add(1, Ordering::Relaxed);

        let out_dir = out_dir.to_path_buf();
        let session_id = req.session_id.clone().unwrap_or_default();
        let cancel_for_task = cancel.clone();
        let progress_for_task = progress.clone();
        let outcome_for_task = outcome.clone();

        // Hardware encode is simulated as running 3x faster than software.
        tokio::spawn(async move {
            let _ = std::fs::write(out_dir.join("manifest.mpd"), b"<MPD/>");
            for step in 1..=5 {
                if cancel_for_task.is_cancelled() {
                    info!(session_id = %session_id, "hardware transcode cancelled");
                    active.fetch_sub(1, Ordering::Relaxed);
                    return;
                }
                tokio::time::sleep(Duration::from_millis(100)).await;
                *progress_for_task.write() = ProgressSnapshot {
                    percent: step as f32 * 20.0,
                    fps: 180.0,
                    speed: 3.5,
                    eta_seconds: Some(((5 - step) * 100) as f64 / 1000.0),
                };
            }
            let _ = std::fs::write(out_dir.join("init-v0.m4s"), vec![0u8; 512]);
            *outcome_for_task.write() = Some(Ok(TranscodeOutcome { bytes_produced: 512, duration_seconds: 0.0 }));
            active.fetch_sub(1, Ordering::Relaxed);
        });

        Ok(TranscodeHandle {
            provider_id: self.info().id,
            session_id: req.session_id.clone().unwrap_or_default(),
            cancel,
            progress,
            outcome,
            progressive_output: None,
        })
    }

    async fn stop(&self, handle: &TranscodeHandle) {
        handle.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CodecOptions, DeviceProfile, Resolution};
    use tempfile::tempdir;

    fn request(codec: &str) -> TranscodeRequest {
        TranscodeRequest {
            input_path: "/media/a.mp4".into(),
            media_id: "m1".into(),
            codec_opts: CodecOptions { video_codec: codec.into(), ..CodecOptions::default() },
            seek_start: None,
            subtitle: None,
            device: DeviceProfile {
                user_agent: "test".into(),
                supported_video_codecs: vec![codec.into()],
                supported_audio_codecs: vec!["aac".into()],
                supported_containers: vec!["dash".into()],
                max_resolution: Resolution::R1080p,
                max_bitrate_kbps: 6000,
                supports_hevc: true,
                supports_av1: false,
                supports_hdr: false,
                client_ip: "127.0.0.1".into(),
            },
            environment: Default::default(),
            session_id: Some("s1".into()),
        }
    }

    #[test]
    fn rejects_unsupported_codec() {
        let provider = HardwareAcceleratedProvider::new(2);
        let (supported, _) = provider.supports(&request("av1"));
        assert!(!supported);
    }

    #[tokio::test]
    async fn accepts_h264_and_runs_faster() {
        let dir = tempdir().unwrap();
        let provider = HardwareAcceleratedProvider::new(2);
        let (supported, _) = provider.supports(&request("h264"));
        assert!(supported);
        let handle = provider.start(&request("h264"), dir.path()).await.unwrap();
        for _ in 0..20 {
            if handle.is_finished() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        assert!(handle.is_finished());
    }
}
