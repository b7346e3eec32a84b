//! Per-client token-bucket rate limiting via `governor`, keyed by client IP.

use crate::AppState;
use axum::{
    extract::{Request, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};
use tracing::warn;

pub async fn rate_limit_middleware(State(state): State<AppState>, request: Request, next: Next) -> Result<Response, StatusCode> {
    let client_ip = extract_client_ip(request.headers());

    if state.rate_limiter.check_key(&client_ip).is_err() {
        warn!(client_ip = %client_ip, "rate limit exceeded");
        state.metrics.increment_rate_limited();
        return Err(StatusCode::TOO_MANY_REQUESTS);
    }

    Ok(next.run(request).await)
}

fn extract_client_ip(headers: &HeaderMap) -> String {
    if let Some(forwarded_for) = headers.get("x-forwarded-for") {
        if let Ok(forwarded_str) = forwarded_for.to_str() {
            if let Some(first_ip) = forwarded_str.split(',').next() {
                return first_ip.trim().to_string();
            }
        }
    }
    if let Some(real_ip) = headers.get("x-real-ip") {
        if let Ok(ip_str) = real_ip.to_str() {
            return ip_str.to_string();
        }
    }
    "unknown".to_string()
}
