//! End-to-end HTTP surface test: builds a real `AppState` with the
//! software provider registered, drives it through axum's `Router`
//! without a bound socket, and exercises decide → start → poll → stream →
//! stop the way a client actually would.

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use playback_core::cleanup::CleanupService;
use playback_core::config::{CleanupConfig, Config, Environment, MonitoringConfig, SecurityConfig};
use playback_core::delivery::build_router;
use playback_core::file_manager::FileManager;
use playback_core::media::StaticMediaLookup;
use playback_core::model::{CodecOptions, DeviceProfile, MediaFile, Resolution};
use playback_core::monitoring::{HealthMonitor, Metrics};
use playback_core::provider::registry::ProviderRegistry;
use playback_core::provider::software::SoftwareProvider;
use playback_core::rate_limit::build_limiter;
use playback_core::session::manager::SessionManager;
use playback_core::session::store::SessionStore;
use playback_core::AppState;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

fn test_config(dir: &std::path::Path) -> Arc<Config> {
    Arc::new(Config {
        bind_addr: "127.0.0.1:0".into(),
        transcoding_dir: dir.to_path_buf(),
        temp_dir: dir.to_path_buf(),
        max_sessions: 10,
        max_disk_gb: 50,
        cleanup: CleanupConfig {
            interval: Duration::from_secs(3600),
            retention_hours: 24,
            extended_retention_hours: 48,
            large_file_threshold_mb: 500,
            orphan_grace_period: Duration::from_secs(300),
            batch_cap: 200,
        },
        security: SecurityConfig { allowed_origins: vec!["*".into()], rate_limit_requests_per_minute: 6000, rate_limit_burst: 600 },
        monitoring: MonitoringConfig { metrics_enabled: false, log_level: "info".into() },
        progress_poll_interval: Duration::from_millis(20),
        environment: Environment::Testing,
    })
}

async fn test_state(dir: &std::path::Path) -> AppState {
    let config = test_config(dir);
    let registry = Arc::new(ProviderRegistry::new());
    registry.register(Arc::new(SoftwareProvider::new(10))).await;
    let store = Arc::new(SessionStore::new());
    let metrics = Arc::new(Metrics::new());
    let manager = SessionManager::new(store, registry.clone(), config.clone(), metrics.clone());
    let files = Arc::new(FileManager::new(config.transcoding_dir.clone()));
    let cleanup = CleanupService::new(config.clone(), manager.clone(), files.clone());
    let media = Arc::new(StaticMediaLookup::new());
    media.register(MediaFile {
        id: "m1".into(),
        path: "/library/movie.mkv".into(),
        container: "mkv".into(),
        video_codec: "hevc".into(),
        audio_codec: "aac".into(),
        resolution: Resolution::R1080p,
        duration: 3600.0,
        size_bytes: 4_000_000_000,
        bitrate_kbps: 8000,
    });
    let health = Arc::new(HealthMonitor::new(config.clone(), registry.clone(), manager.clone(), files.clone()));
    let rate_limiter = Arc::new(build_limiter(config.security.rate_limit_requests_per_minute, config.security.rate_limit_burst));

    AppState { config, registry, manager, files, cleanup, metrics, media, health, rate_limiter }
}

fn device_profile_no_hevc() -> DeviceProfile {
    DeviceProfile {
        user_agent: "Mozilla/5.0 (Chrome)".into(),
        supported_video_codecs: vec!["h264".into()],
        supported_audio_codecs: vec!["aac".into()],
        supported_containers: vec!["dash".into(), "hls".into()],
        max_resolution: Resolution::R1080p,
        max_bitrate_kbps: 6000,
        supports_hevc: false,
        supports_av1: false,
        supports_hdr: false,
        client_ip: "127.0.0.1".into(),
    }
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), 10 * 1024 * 1024).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn decide_reports_transcode_needed_for_incompatible_client() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(dir.path()).await;
    let app = build_router(state);

    let body = json!({ "media_path": "/library/movie.mkv", "device_profile": device_profile_no_hevc() }).to_string();
    let request = Request::builder()
        .method("POST")
        .uri("/decide")
        .header("content-type", "application/json")
        .body(Body::from(body))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let value = json_body(response).await;
    assert_eq!(value["should_transcode"], true);
    assert!(value["transcode_params"].is_object());
}

#[tokio::test]
async fn health_reports_unhealthy_before_disk_budget_but_healthy_with_provider() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(dir.path()).await;
    let app = build_router(state);

    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let value = json_body(response).await;
    assert_eq!(value["overall_status"], "Healthy");
}

#[tokio::test]
async fn full_session_lifecycle_start_poll_stop() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(dir.path()).await;
    let app = build_router(state);

    let start_body = json!({
        "input_path": "/library/movie.mkv",
        "media_id": "m1",
        "codec_opts": CodecOptions { container: "dash".into(), ..CodecOptions::default() },
        "seek_start": null,
        "subtitle": null,
        "device": device_profile_no_hevc(),
        "environment": {},
        "session_id": null,
    })
    .to_string();

    let request = Request::builder()
        .method("POST")
        .uri("/start")
        .header("content-type", "application/json")
        .body(Body::from(start_body))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let started = json_body(response).await;
    let id = started["id"].as_str().unwrap().to_string();
    assert_eq!(started["status"], "Running");

    let request = Request::builder().uri(format!("/session/{id}")).body(Body::empty()).unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let request = Request::builder().method("DELETE").uri(format!("/session/{id}")).body(Body::empty()).unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let stopped = json_body(response).await;
    assert_eq!(stopped["status"], "Stopped");

    let request = Request::builder().method("DELETE").uri(format!("/session/{id}")).body(Body::empty()).unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn unknown_session_returns_404() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(dir.path()).await;
    let app = build_router(state);

    let missing = uuid::Uuid::new_v4();
    let request = Request::builder().uri(format!("/session/{missing}")).body(Body::empty()).unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn segment_path_traversal_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(dir.path()).await;
    let app = build_router(state);

    let id = uuid::Uuid::new_v4();
    let request = Request::builder().uri(format!("/stream/{id}/../../etc/passwd")).body(Body::empty()).unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert!(response.status() == StatusCode::BAD_REQUEST || response.status() == StatusCode::NOT_FOUND);
}
