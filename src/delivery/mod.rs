//! HTTP delivery layer. One `Router` assembled from the four handler
//! groups, mounted under `/api/playback`.

pub mod admin;
pub mod decision;
pub mod sessions;
pub mod stream;

use crate::session::TranscodeSession;
use crate::AppState;
use axum::routing::{get, post};
use axum::Router;

/// Manifest URL returned in session envelopes: adaptive output serves
/// `manifest.mpd`/`playlist.m3u8` depending on container, progressive
/// output is read straight off `/stream/:id`.
pub fn manifest_url_for(session: &TranscodeSession) -> String {
    if session.is_progressive() {
        format!("/api/playback/stream/{}", session.id)
    } else if session.request.codec_opts.container.eq_ignore_ascii_case("hls") {
        format!("/api/playback/stream/{}/playlist.m3u8", session.id)
    } else {
        format!("/api/playback/stream/{}/manifest.mpd", session.id)
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/decide", post(decision::decide))
        .route("/seek-ahead", post(decision::seek_ahead))
        .route("/start", post(sessions::start))
        .route("/sessions", get(sessions::list_sessions))
        .route("/stats", get(sessions::stats))
        .route("/session/:id", get(sessions::get_session).delete(sessions::stop_session))
        .route("/stream/:id", get(stream::progressive))
        .route("/stream/:id/manifest.mpd", get(stream::manifest))
        .route("/stream/:id/playlist.m3u8", get(stream::playlist))
        .route("/stream/:id/:segment_file", get(stream::segment))
        .route("/health", get(admin::health).head(admin::health))
        .route("/metrics", get(admin::metrics))
        .route("/plugins/refresh", post(admin::refresh_plugins))
        .route("/cleanup/run", post(admin::run_cleanup))
        .route("/cleanup/stats", get(admin::cleanup_stats))
        .fallback(sessions::not_found)
        .with_state(state)
}
