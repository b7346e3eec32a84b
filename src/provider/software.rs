//! CPU-only fallback provider. Always supports a request; simulates a
//! transcode job with staged `progress` updates on a timer, then a
//! manifest (adaptive) or byte stream (progressive) written out.

use super::{ProgressSnapshot, ProviderAdapter, ProviderInfo, TranscodeHandle, TranscodeOutcome};
use crate::error::Result;
use crate::model::TranscodeRequest;
use async_trait::async_trait;
use bytes::Bytes;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Debug)]
pub struct SoftwareProvider {
    max_concurrent_sessions: usize,
    active: Arc<AtomicUsize>,
}

impl SoftwareProvider {
    pub fn new(max_concurrent_sessions: usize) -> Self {
        Self { max_concurrent_sessions, active: Arc::new(AtomicUsize::new(0)) }
    }

    fn write_manifest(out_dir: &Path, container: &str) -> std::io::Result<()> {
        match container {
            "hls" => {
                let playlist = "#EXTM3U\n#EXT-X-VERSION:3\n#EXT-X-TARGETDURATION:6\n#EXT-X-MEDIA-SEQUENCE:0\n\
                    #EXTINF:6.0,\nchunk-v0-0.ts\n#EXT-X-ENDLIST\n";
                std::fs::write(out_dir.join("playlist.m3u8"), playlist)
            }
            _ => {
                let mpd = r#"<?xml version="1.0" encoding="UTF-8"?>
<MPD xmlns="urn:mpeg:dash:schema:mpd:2011" type="static" mediaPresentationDuration="PT0H0M0S" minBufferTime="PT2S" profiles="urn:mpeg:dash:profile:isoff-on-demand:2011">
  <Period>
    <AdaptationSet mimeType="video/mp4" segmentAlignment="true">
      <Representation id="v0" bandwidth="2500000">
        <BaseURL>init-v0.m4s</BaseURL>
      </Representation>
    </AdaptationSet>
  </Period>
</MPD>"#;
                std::fs::write(out_dir.join("manifest.mpd"), mpd)
            }
        }
    }
}

#[async_trait]
impl ProviderAdapter for SoftwareProvider {
    fn info(&self) -> ProviderInfo {
        ProviderInfo {
            id: "software".to_string(),
            display_name: "Software transcoder".to_string(),
            priority: 10,
            supported_containers: vec!["dash".into(), "hls".into(), "mp4".into()],
            supported_codecs: vec!["h264".into(), "hevc".into(), "av1".into(), "aac".into()],
            supported_resolutions: vec!["480p".into(), "720p".into(), "1080p".into(), "1440p".into(), "2160p".into()],
            max_concurrent_sessions: self.max_concurrent_sessions,
            hardware_accel: false,
            supports_streaming_output: true,
            supports_subtitle_burn_in: true,
            supports_multi_audio: true,
        }
    }

    fn supports(&self, _req: &TranscodeRequest) -> (bool, String) {
        (true, "software transcoder supports all containers/codecs".to_string())
    }

    fn active_sessions(&self) -> usize {
        self.active.load(Ordering::Relaxed)
    }

    async fn start(&self, req: &TranscodeRequest, out_dir: &Path) -> Result<TranscodeHandle> {
        let cancel = CancellationToken::new();
        let progress = Arc::new(parking_lot::RwLock::new(ProgressSnapshot::default()));
        let outcome = Arc::new(parking_lot::RwLock::new(None));
        let progressive = req.codec_opts.container == "mp4";

        let (tx, rx) = if progressive { let (tx, rx) = flume::bounded(8); (Some(tx), Some(rx)) } else { (None, None) };

        let active = self.active.clone();
        active.fetch_add(1, Ordering::Relaxed);

        let out_dir = out_dir.to_path_buf();
        let container = req.codec_opts.container.clone();
        let duration = req.seek_start.map(|s| s.max(0.0)).unwrap_or(0.0);
        let session_id = req.session_id.clone().unwrap_or_default();
        let cancel_for_task = cancel.clone();
        let progress_for_task = progress.clone();
        let outcome_for_task = outcome.clone();

        tokio::spawn(async move {
            if !progressive {
                if let Err(e) = Self::write_manifest(&out_dir, &container) {
                    warn!(session_id = %session_id, error = %e, "failed to write manifest");
                    *outcome_for_task.write() = Some(Err(e.to_string()));
                    active.fetch_sub(1, Ordering::Relaxed);
                    return;
                }
            }

            let mut produced: u64 = 0;
            for step in 1..=10 {
                if cancel_for_task.is_cancelled() {
                    info!(session_id = %session_id, "transcode cancelled mid-run");
                    active.fetch_sub(1, Ordering::Relaxed);
                    return;
                }

                tokio::time::sleep(Duration::from_millis(150)).await;
                let percent = step as f32 * 10.0;
                *progress_for_task.write() = ProgressSnapshot {
                    percent,
                    fps: 60.0,
                    speed: 1.2,
                    eta_seconds: Some(((10 - step) * 150) as f64 / 1000.0),
                };

                if progressive {
                    let chunk = Bytes::from(vec![0u8; 4096]);
                    produced += chunk.len() as u64;
                    if let Some(tx) = &tx {
                        if tx.send_async(chunk).await.is_err() {
                            debug!(session_id = %session_id, "progressive receiver dropped, stopping early");
                            active.fetch_sub(1, Ordering::Relaxed);
                            return;
                        }
                    }
                } else if step == 10 {
                    // Finalize a couple of segments next to the manifest so
                    // segment requests have something to resolve.
                    let _ = std::fs::write(out_dir.join("init-v0.m4s"), vec![0u8; 512]);
                    let _ = std::fs::write(out_dir.join("chunk-v0-0.m4s"), vec![0u8; 2048]);
                    produced = 512 + 2048;
                }
            }

            *outcome_for_task.write() = Some(Ok(TranscodeOutcome {
                bytes_produced: produced,
                duration_seconds: duration,
            }));
            active.fetch_sub(1, Ordering::Relaxed);
        });

        Ok(TranscodeHandle {
            provider_id: self.info().id,
            session_id: req.session_id.clone().unwrap_or_default(),
            cancel,
            progress,
            outcome,
            progressive_output: rx,
        })
    }

    async fn stop(&self, handle: &TranscodeHandle) {
        handle.cancel.cancel();
    }
}
