use playback_core::{
    cleanup::CleanupService,
    config::Config,
    delivery,
    file_manager::FileManager,
    media::StaticMediaLookup,
    middleware::{logging::request_logging_middleware, rate_limit::rate_limit_middleware, security::security_headers_middleware},
    monitoring::{HealthMonitor, Metrics},
    provider::{hardware::HardwareAcceleratedProvider, registry::ProviderRegistry, software::SoftwareProvider},
    rate_limit::build_limiter,
    session::{manager::SessionManager, store::SessionStore},
    AppState,
};
use axum::http::{header, HeaderValue, Method};
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tower::ServiceBuilder;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    init_logging()?;

    info!("starting playback core");

    let config = Arc::new(Config::from_env().map_err(|e| format!("configuration error: {e}"))?);
    info!(environment = ?config.environment, "configuration loaded");

    let state = build_app_state(config.clone()).await?;
    state.cleanup.spawn();

    let app = create_router(state);

    let addr: SocketAddr = config.bind_addr.parse().map_err(|e| format!("invalid BIND_ADDR: {e}"))?;
    info!(%addr, transcoding_dir = ?config.transcoding_dir, "listening");

    let listener = tokio::net::TcpListener::bind(&addr).await.map_err(|e| format!("could not bind: {e}"))?;
    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await.map_err(|e| format!("server error: {e}"))?;

    info!("shut down cleanly");
    Ok(())
}

fn init_logging() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let default_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "playback_core=info,tower_http=info".to_string());
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
    Ok(())
}

async fn build_app_state(config: Arc<Config>) -> std::result::Result<AppState, Box<dyn std::error::Error>> {
    tokio::fs::create_dir_all(&config.transcoding_dir).await?;

    let registry = Arc::new(ProviderRegistry::new());
    registry.register(Arc::new(SoftwareProvider::new(config.max_sessions))).await;
    registry.register(Arc::new(HardwareAcceleratedProvider::new((config.max_sessions / 2).max(1)))).await;

    let store = Arc::new(SessionStore::new());
    let metrics = Arc::new(Metrics::new());
    let manager = SessionManager::new(store, registry.clone(), config.clone(), metrics.clone());
    let files = Arc::new(FileManager::new(config.transcoding_dir.clone()));
    let cleanup = CleanupService::new(config.clone(), manager.clone(), files.clone());
    let media = Arc::new(StaticMediaLookup::new());
    let health = Arc::new(HealthMonitor::new(config.clone(), registry.clone(), manager.clone(), files.clone()));
    let rate_limiter = Arc::new(build_limiter(config.security.rate_limit_requests_per_minute, config.security.rate_limit_burst));

    Ok(AppState { config, registry, manager, files, cleanup, metrics, media, health, rate_limiter })
}

/// The delivery router already carries its own `AppState` (nested routers
/// resolve their state before mounting), so the middleware stack wraps it
/// from the outside using `from_fn_with_state` rather than a second
/// `with_state` call.
fn create_router(state: AppState) -> Router {
    let cors = if state.config.security.allowed_origins.iter().any(|o| o == "*") {
        warn!("CORS configured for all origins, not recommended for production");
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
            .allow_headers(Any)
            .expose_headers([header::CONTENT_RANGE, header::CONTENT_LENGTH, header::ACCEPT_RANGES])
    } else {
        let origins: std::result::Result<Vec<HeaderValue>, _> =
            state.config.security.allowed_origins.iter().map(|o| o.parse::<HeaderValue>()).collect();
        match origins {
            Ok(origins) => {
                let mut layer = CorsLayer::new()
                    .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
                    .allow_headers([header::CONTENT_TYPE])
                    .expose_headers([header::CONTENT_RANGE, header::CONTENT_LENGTH, header::ACCEPT_RANGES]);
                for origin in origins {
                    layer = layer.allow_origin(AllowOrigin::exact(origin));
                }
                layer
            }
            Err(e) => {
                error!(error = %e, "invalid ALLOWED_ORIGINS entry, falling back to same-origin only");
                CorsLayer::new()
            }
        }
    };

    let middleware_stack = ServiceBuilder::new()
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .layer(CompressionLayer::new())
        .layer(cors)
        .layer(axum::middleware::from_fn_with_state(state.clone(), security_headers_middleware))
        .layer(axum::middleware::from_fn_with_state(state.clone(), rate_limit_middleware))
        .layer(axum::middleware::from_fn_with_state(state.clone(), request_logging_middleware));

    Router::new().nest("/api/playback", delivery::build_router(state)).layer(middleware_stack)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received Ctrl+C, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}
