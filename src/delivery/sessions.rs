//! Session CRUD: `/start`, `/session/:id`, `/sessions`, `/stats`.

use crate::error::{AppError, Result};
use crate::model::TranscodeRequest;
use crate::session::manager::SessionStats;
use crate::session::{SessionStatus, TranscodeSession};
use crate::AppState;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Serialize)]
pub struct StartResponse {
    pub id: Uuid,
    pub status: SessionStatus,
    pub manifest_url: String,
    pub provider: String,
}

impl From<&TranscodeSession> for StartResponse {
    fn from(s: &TranscodeSession) -> Self {
        Self { id: s.id, status: s.status, manifest_url: super::manifest_url_for(s), provider: s.provider_id.clone() }
    }
}

/// `POST /start`. Body is a `TranscodeRequest`; defaults are applied by
/// `SessionManager::start`, not here.
pub async fn start(State(state): State<AppState>, Json(request): Json<TranscodeRequest>) -> Result<Json<StartResponse>> {
    let session = state.manager.start(request).await?;
    state.metrics.record_session_started();
    Ok(Json(StartResponse::from(&session)))
}

/// `GET /session/:id`
pub async fn get_session(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<TranscodeSession>> {
    Ok(Json(state.manager.get(id)?))
}

/// `DELETE /session/:id`. Stopping an already-terminal session is reported
/// as a 200 no-op, per `AppError::SessionTerminal`'s status mapping.
pub async fn stop_session(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<TranscodeSession>> {
    match state.manager.stop(id).await {
        Ok(session) => {
            state.metrics.record_session_stopped();
            Ok(Json(session))
        }
        Err(AppError::SessionTerminal { .. }) => Ok(Json(state.manager.get(id)?)),
        Err(e) => Err(e),
    }
}

/// `GET /sessions` — optionally filtered by `?media_id=`.
pub async fn list_sessions(
    State(state): State<AppState>,
    axum::extract::Query(params): axum::extract::Query<std::collections::HashMap<String, String>>,
) -> Json<Vec<TranscodeSession>> {
    let sessions = match params.get("media_id") {
        Some(media_id) => state.manager.list_by_media(media_id),
        None => state.manager.list(),
    };
    Json(sessions)
}

/// `GET /stats`
pub async fn stats(State(state): State<AppState>) -> Json<SessionStats> {
    Json(state.manager.stats())
}

pub async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Json(serde_json::json!({ "error": "route not found" })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CodecOptions, DeviceProfile, Resolution};
    use crate::provider::{ProgressSnapshot, TranscodeOutcome};
    use chrono::Utc;

    fn sample_session() -> TranscodeSession {
        TranscodeSession {
            id: Uuid::nil(),
            provider_id: "software".into(),
            status: SessionStatus::Running,
            request: TranscodeRequest {
                input_path: "/a.mkv".into(),
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
            },
            progress: ProgressSnapshot::default(),
            result: Some(crate::session::SessionResult::from(TranscodeOutcome { bytes_produced: 10, duration_seconds: 1.0 })),
            hardware_hint: false,
            start_time: Utc::now(),
            end_time: None,
            last_accessed: Utc::now(),
            directory_path: "/tmp/x".into(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn start_response_points_at_manifest() {
        let session = sample_session();
        let resp = StartResponse::from(&session);
        assert_eq!(resp.manifest_url, super::super::manifest_url_for(&session));
    }
}
