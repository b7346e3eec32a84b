//! Structured request logging: assigns a request id, extracts the client
//! IP out of proxy headers, flags suspicious paths, and records
//! success/failure counters on the way out.

use crate::AppState;
use axum::{
    extract::{Request, State},
    http::{HeaderMap, HeaderName, Method, StatusCode, Uri},
    middleware::Next,
    response::Response,
};
use std::time::Instant;
use tracing::{error, info, warn};
use uuid::Uuid;

pub async fn request_logging_middleware(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let uri = request.uri().clone();
    let headers = request.headers().clone();
    let request_id = Uuid::new_v4();
    let client_ip = extract_client_ip(&headers);

    request.headers_mut().insert(HeaderName::from_static("x-request-id"), request_id.to_string().parse().unwrap());

    info!(request_id = %request_id, method = %method, uri = %uri, client_ip = %client_ip, "request started");

    let response = next.run(request).await;
    let status = response.status();
    let duration = start.elapsed();

    state.metrics.increment_requests();
    if status.is_success() {
        state.metrics.increment_successful();
    } else {
        state.metrics.increment_failed();
    }

    if is_suspicious_request(&method, &uri, &headers, status) {
        warn!(request_id = %request_id, method = %method, uri = %uri, client_ip = %client_ip, status = %status, "suspicious request");
    }

    if status.is_server_error() {
        error!(request_id = %request_id, status = %status, duration_ms = duration.as_millis(), "request finished with server error");
    } else if status.is_client_error() {
        warn!(request_id = %request_id, status = %status, duration_ms = duration.as_millis(), "request finished with client error");
    } else {
        info!(request_id = %request_id, status = %status, duration_ms = duration.as_millis(), "request finished");
    }

    response
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
    if let Some(forwarded) = headers.get("forwarded") {
        if let Ok(forwarded_str) = forwarded.to_str() {
            for directive in forwarded_str.split(';') {
                if let Some(for_part) = directive.strip_prefix("for=") {
                    return for_part.trim_matches('"').to_string();
                }
            }
        }
    }
    "unknown".to_string()
}

fn is_suspicious_request(_method: &Method, uri: &Uri, headers: &HeaderMap, status: StatusCode) -> bool {
    let path = uri.path();
    let query = uri.query().unwrap_or("");

    if contains_dangerous_patterns(path) || contains_dangerous_patterns(query) {
        return true;
    }

    if path.contains("/.well-known/") || path.contains("/admin") || path.contains("/wp-admin") || path.contains("/phpmyadmin") {
        return true;
    }

    if let Some(user_agent) = headers.get("user-agent") {
        if let Ok(ua_str) = user_agent.to_str() {
            let ua_lower = ua_str.to_lowercase();
            if ua_lower.contains("bot") && !ua_lower.contains("googlebot") && !ua_lower.contains("bingbot") {
                return true;
            }
        }
    }

    if status == StatusCode::NOT_FOUND && (path.contains("admin") || path.contains("config") || path.contains("backup")) {
        return true;
    }

    false
}

fn contains_dangerous_patterns(input: &str) -> bool {
    let patterns = ["../", "..\\", "..%2f", "..%5c", "%2e%2e%2f", "%2e%2e%5c", "etc/passwd", "/proc/", "/sys/"];
    let input_lower = input.to_lowercase();
    patterns.iter().any(|&p| input_lower.contains(p))
}
