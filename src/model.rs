//! Upstream-supplied facts the planner reasons over: the media asset and
//! the requesting device. Both are plain data — the core never mutates or
//! persists either.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub enum Resolution {
    R480p,
    R720p,
    R1080p,
    R1440p,
    R2160p,
}

impl Resolution {
    pub fn as_label(&self) -> &'static str {
        match self {
            Resolution::R480p => "480p",
            Resolution::R720p => "720p",
            Resolution::R1080p => "1080p",
            Resolution::R1440p => "1440p",
            Resolution::R2160p => "2160p",
        }
    }

    pub fn parse(label: &str) -> Option<Self> {
        match label {
            "480p" => Some(Resolution::R480p),
            "720p" => Some(Resolution::R720p),
            "1080p" => Some(Resolution::R1080p),
            "1440p" => Some(Resolution::R1440p),
            "2160p" => Some(Resolution::R2160p),
            _ => None,
        }
    }

    /// Floor bitrate in kbps used when the planner clamps a transcode
    /// target.
    pub fn bitrate_floor_kbps(&self) -> u32 {
        match self {
            Resolution::R480p => 800,
            Resolution::R720p => 1_500,
            Resolution::R1080p => 2_500,
            Resolution::R1440p => 5_000,
            Resolution::R2160p => 8_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaFile {
    pub id: String,
    pub path: String,
    pub container: String,
    pub video_codec: String,
    pub audio_codec: String,
    pub resolution: Resolution,
    /// seconds
    pub duration: f64,
    pub size_bytes: u64,
    /// kbps; derived upstream from size/duration, not re-derived here.
    pub bitrate_kbps: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceProfile {
    pub user_agent: String,
    pub supported_video_codecs: Vec<String>,
    pub supported_audio_codecs: Vec<String>,
    pub supported_containers: Vec<String>,
    pub max_resolution: Resolution,
    pub max_bitrate_kbps: u32,
    pub supports_hevc: bool,
    pub supports_av1: bool,
    pub supports_hdr: bool,
    pub client_ip: String,
}

impl DeviceProfile {
    pub fn supports_container(&self, container: &str) -> bool {
        self.supported_containers.iter().any(|c| c.eq_ignore_ascii_case(container))
    }

    pub fn supports_video_codec(&self, codec: &str) -> bool {
        if codec.eq_ignore_ascii_case("hevc") || codec.eq_ignore_ascii_case("h265") {
            return self.supports_hevc;
        }
        if codec.eq_ignore_ascii_case("av1") {
            return self.supports_av1;
        }
        self.supported_video_codecs.iter().any(|c| c.eq_ignore_ascii_case(codec))
    }

    pub fn supports_audio_codec(&self, codec: &str) -> bool {
        self.supported_audio_codecs.iter().any(|c| c.eq_ignore_ascii_case(codec))
    }
}

/// Encode parameters for a transcode job — container, codecs, bitrate,
/// quality/preset knobs. Separated from `TranscodeRequest` because the
/// planner, the registry, and the session row each only care about part of
/// the request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodecOptions {
    pub video_codec: String,
    pub audio_codec: String,
    pub container: String,
    pub bitrate_kbps: u32,
    pub quality: u32,
    pub preset: String,
}

impl Default for CodecOptions {
    fn default() -> Self {
        Self {
            video_codec: "h264".to_string(),
            audio_codec: "aac".to_string(),
            container: "dash".to_string(),
            bitrate_kbps: 2_500,
            quality: 23,
            preset: "fast".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubtitleConfig {
    pub language: String,
    pub burn_in: bool,
    pub stream_index: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscodeRequest {
    pub input_path: String,
    pub media_id: String,
    pub codec_opts: CodecOptions,
    pub seek_start: Option<f64>,
    pub subtitle: Option<SubtitleConfig>,
    pub device: DeviceProfile,
    pub environment: std::collections::HashMap<String, String>,
    pub session_id: Option<String>,
}

impl TranscodeRequest {
    /// Fills in defaults for any field the caller left at its type default.
    pub fn with_defaults(mut self) -> Self {
        if self.codec_opts.container.is_empty() {
            self.codec_opts.container = "dash".to_string();
        }
        if self.codec_opts.video_codec.is_empty() {
            self.codec_opts.video_codec = "h264".to_string();
        }
        if self.codec_opts.audio_codec.is_empty() {
            self.codec_opts.audio_codec = "aac".to_string();
        }
        if self.codec_opts.preset.is_empty() {
            self.codec_opts.preset = "fast".to_string();
        }
        if self.codec_opts.quality == 0 {
            self.codec_opts.quality = 23;
        }
        self
    }
}
