//! Operational endpoints: `/health`, `/plugins/refresh`, `/cleanup/run`,
//! `/cleanup/stats`.

use crate::cleanup::CleanupStats;
use crate::error::Result;
use crate::provider::ProviderInfo;
use crate::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;

/// `GET /health`. Liveness + readiness in one: 200 when healthy or
/// degraded, 503 when unhealthy, so a load balancer can drain the instance
/// without a separate readiness probe.
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let system = state.health.check().await;
    let status = match system.overall_status {
        crate::monitoring::health::HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::OK,
    };
    (status, Json(system))
}

#[derive(Debug, Serialize)]
pub struct PluginsResponse {
    pub providers: Vec<ProviderInfo>,
}

/// `POST /plugins/refresh`. Providers are registered explicitly at startup —
/// there is no filesystem plugin discovery — so this is a read-back of the
/// current registry rather than a rescan.
pub async fn refresh_plugins(State(state): State<AppState>) -> Json<PluginsResponse> {
    Json(PluginsResponse { providers: state.registry.list().await })
}

/// `POST /cleanup/run`. Forces an out-of-band sweep, e.g. for an operator
/// reclaiming disk ahead of the next scheduled tick.
pub async fn run_cleanup(State(state): State<AppState>) -> Result<Json<CleanupStats>> {
    state.cleanup.run_once().await?;
    Ok(Json(state.cleanup.reclaim_to_budget().await?))
}

/// `GET /cleanup/stats`
pub async fn cleanup_stats(State(state): State<AppState>) -> Json<CleanupStats> {
    Json(state.cleanup.stats())
}

/// `GET /metrics`
pub async fn metrics(State(state): State<AppState>) -> Json<crate::monitoring::metrics::MetricsSnapshot> {
    Json(state.metrics.snapshot())
}
