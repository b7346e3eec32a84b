//! `/decide` and `/seek-ahead`.

use super::sessions::StartResponse;
use crate::error::{AppError, Result};
use crate::model::{DeviceProfile, MediaFile, TranscodeRequest};
use crate::planner::{Planner, PlaybackDecision};
use crate::AppState;
use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct DecideRequest {
    pub media_path: String,
    pub device_profile: DeviceProfile,
}

#[derive(Debug, Serialize)]
pub struct MediaInfo {
    pub id: String,
    pub container: String,
    pub video_codec: String,
    pub audio_codec: String,
    pub resolution: String,
    pub duration: f64,
    pub size_bytes: u64,
}

impl From<&MediaFile> for MediaInfo {
    fn from(m: &MediaFile) -> Self {
        Self {
            id: m.id.clone(),
            container: m.container.clone(),
            video_codec: m.video_codec.clone(),
            audio_codec: m.audio_codec.clone(),
            resolution: m.resolution.as_label().to_string(),
            duration: m.duration,
            size_bytes: m.size_bytes,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DecideResponse {
    pub should_transcode: bool,
    pub reason: String,
    pub stream_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub direct_play_url: Option<String>,
    pub media_info: MediaInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcode_params: Option<TranscodeRequest>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

/// `POST /decide`. Never starts a session — `/start` does that. When a
/// transcode is called for but no provider can currently take it, this
/// degrades to the direct URL with `warning` set rather than failing the
/// request.
pub async fn decide(State(state): State<AppState>, Json(body): Json<DecideRequest>) -> Result<Json<DecideResponse>> {
    let media = state
        .media
        .lookup(&body.media_path)
        .await
        .ok_or_else(|| AppError::MediaNotFound { media_id: body.media_path.clone() })?;

    let decision = Planner::decide(&media, &body.device_profile)?;
    let media_info = MediaInfo::from(&media);
    let direct_url = format!("/api/media/files/{}/stream", media.id);

    let response = match decision {
        PlaybackDecision::Direct { reason, .. } => DecideResponse {
            should_transcode: false,
            reason,
            stream_url: direct_url.clone(),
            direct_play_url: Some(direct_url),
            media_info,
            transcode_params: None,
            warning: None,
        },
        PlaybackDecision::Transcode { request, reason } => match state.registry.select(&request).await {
            Ok(_) => DecideResponse {
                should_transcode: true,
                reason,
                stream_url: "/api/playback/start".to_string(),
                direct_play_url: None,
                media_info,
                transcode_params: Some(request),
                warning: None,
            },
            Err(e) => {
                warn!(media_id = %media.id, error = %e, "transcode required but no provider available, falling back to direct");
                DecideResponse {
                    should_transcode: false,
                    reason,
                    stream_url: direct_url.clone(),
                    direct_play_url: Some(direct_url),
                    media_info,
                    transcode_params: Some(request),
                    warning: Some(e.to_string()),
                }
            }
        },
    };

    Ok(Json(response))
}

#[derive(Debug, Deserialize)]
pub struct SeekAheadRequest {
    pub session_id: Uuid,
    pub seek_position: f64,
}

/// `POST /seek-ahead`. Clones the original session's request with a new
/// seek start and starts an independent session; the original is
/// untouched.
pub async fn seek_ahead(State(state): State<AppState>, Json(body): Json<SeekAheadRequest>) -> Result<Json<StartResponse>> {
    let original = state.manager.get(body.session_id)?;
    let mut request: TranscodeRequest = original.request.clone();
    request.seek_start = Some(body.seek_position);
    request.session_id = None;

    let session = state.manager.start(request).await?;
    Ok(Json(StartResponse::from(&session)))
}
