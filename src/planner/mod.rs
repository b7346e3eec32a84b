//! Pure playback-compatibility decision engine.
//!
//! `Planner` holds no state and does no I/O; it is a thin namespace around
//! `decide`, kept as a unit struct with plain associated functions rather
//! than an instantiated service.

use crate::error::{AppError, Result};
use crate::model::{CodecOptions, DeviceProfile, MediaFile, Resolution, TranscodeRequest};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PlaybackDecision {
    Direct {
        media_path: String,
        reason: String,
    },
    Transcode {
        request: TranscodeRequest,
        reason: String,
    },
}

impl PlaybackDecision {
    pub fn reason(&self) -> &str {
        match self {
            PlaybackDecision::Direct { reason, .. } => reason,
            PlaybackDecision::Transcode { reason, .. } => reason,
        }
    }

    pub fn should_transcode(&self) -> bool {
        matches!(self, PlaybackDecision::Transcode { .. })
    }
}

/// Browsers and embedded web clients that cannot demux Matroska natively.
/// Anything not in this set is assumed to be a native/app client with wider
/// container support.
fn is_browser_like(user_agent: &str) -> bool {
    let ua = user_agent.to_lowercase();
    ["mozilla", "chrome", "safari", "edg/", "firefox"]
        .iter()
        .any(|needle| ua.contains(needle))
        && !ua.contains("electron")
}

fn container_supported(media: &MediaFile, device: &DeviceProfile) -> bool {
    if device.supports_container(&media.container) {
        return true;
    }
    // Matroska is the canonical "browsers can't play this" case; everything
    // else falls back to the device's declared support.
    if media.container.eq_ignore_ascii_case("mkv") && is_browser_like(&device.user_agent) {
        return false;
    }
    device.supported_containers.is_empty()
}

pub struct Planner;

impl Planner {
    /// Evaluate compatibility rules in order; first match wins.
    pub fn decide(media: &MediaFile, device: &DeviceProfile) -> Result<PlaybackDecision> {
        if media.container.is_empty() || media.video_codec.is_empty() || media.audio_codec.is_empty() {
            return Err(AppError::MediaUnknown { media_id: media.id.clone() });
        }

        // Rule 1: container incompatibility.
        if !container_supported(media, device) {
            return Ok(Self::transcode(
                media,
                device,
                format!(
                    "container '{}' is not supported by this client",
                    media.container
                ),
            ));
        }

        // Rule 2: codec incompatibility (HEVC/AV1 gated on capability flags).
        if !device.supports_video_codec(&media.video_codec) {
            return Ok(Self::transcode(
                media,
                device,
                format!("video codec '{}' is not supported by this client", media.video_codec),
            ));
        }
        if !device.supports_audio_codec(&media.audio_codec) {
            return Ok(Self::transcode(
                media,
                device,
                format!("audio codec '{}' is not supported by this client", media.audio_codec),
            ));
        }

        // Rule 3: bitrate overrun (> 10% over device max).
        if media.bitrate_kbps as f64 > device.max_bitrate_kbps as f64 * 1.10 {
            return Ok(Self::transcode(
                media,
                device,
                format!(
                    "source bitrate {}kbps exceeds device max {}kbps by more than 10%",
                    media.bitrate_kbps, device.max_bitrate_kbps
                ),
            ));
        }

        // Rule 4: resolution overrun (strictly higher than device max).
        if media.resolution > device.max_resolution {
            return Ok(Self::transcode(
                media,
                device,
                format!(
                    "source resolution {} exceeds device max {}",
                    media.resolution.as_label(),
                    device.max_resolution.as_label()
                ),
            ));
        }

        Ok(PlaybackDecision::Direct {
            media_path: media.path.clone(),
            reason: "source is directly compatible with this client".to_string(),
        })
    }

    fn target_codec(device: &DeviceProfile) -> &'static str {
        if device.supports_av1 {
            "av1"
        } else if device.supports_hevc {
            "hevc"
        } else {
            "h264"
        }
    }

    fn target_container(device: &DeviceProfile, requested_hls: bool) -> &'static str {
        if requested_hls {
            "hls"
        } else if !device.supported_containers.is_empty() {
            "dash"
        } else {
            "mp4"
        }
    }

    fn target_resolution(media: &MediaFile, device: &DeviceProfile) -> Resolution {
        media.resolution.clone().min(device.max_resolution.clone())
    }

    fn target_bitrate_kbps(media: &MediaFile, device: &DeviceProfile, resolution: &Resolution) -> u32 {
        let capped = media.bitrate_kbps.min(device.max_bitrate_kbps);
        capped.max(resolution.bitrate_floor_kbps())
    }

    fn transcode(media: &MediaFile, device: &DeviceProfile, reason: String) -> PlaybackDecision {
        let requested_hls = device.user_agent.to_lowercase().contains("hls");
        let resolution = Self::target_resolution(media, device);
        let bitrate = Self::target_bitrate_kbps(media, device, &resolution);

        let request = TranscodeRequest {
            input_path: media.path.clone(),
            media_id: media.id.clone(),
            codec_opts: CodecOptions {
                video_codec: Self::target_codec(device).to_string(),
                audio_codec: "aac".to_string(),
                container: Self::target_container(device, requested_hls).to_string(),
                bitrate_kbps: bitrate,
                quality: 23,
                preset: "fast".to_string(),
            },
            seek_start: None,
            subtitle: None,
            device: device.clone(),
            environment: std::collections::HashMap::from([
                ("resolution".to_string(), resolution.as_label().to_string()),
                ("priority".to_string(), "normal".to_string()),
            ]),
            session_id: None,
        }
        .with_defaults();

        PlaybackDecision::Transcode { request, reason: format!("{reason} (target {}x{}kbps)", resolution.as_label(), bitrate) }
    }
}
