//! Request validation and response security headers: rejects requests
//! carrying dangerous or injection-style patterns before they reach a
//! handler, and stamps every response with a fixed security header set.

use crate::AppState;
use axum::{
    extract::{Request, State},
    http::{HeaderName, HeaderValue, StatusCode},
    middleware::Next,
    response::Response,
};
use tracing::warn;

pub async fn security_headers_middleware(State(_state): State<AppState>, request: Request, next: Next) -> Result<Response, StatusCode> {
    validate_request_security(&request)?;
    let mut response = next.run(request).await;
    add_security_headers(&mut response);
    Ok(response)
}

fn validate_request_security(request: &Request) -> Result<(), StatusCode> {
    let uri = request.uri();
    let path = uri.path();
    let query = uri.query().unwrap_or("");

    if contains_dangerous_patterns(path) || contains_dangerous_patterns(query) {
        warn!(path = %path, query = %query, "path traversal attempt rejected at the edge");
        return Err(StatusCode::BAD_REQUEST);
    }

    if contains_injection_patterns(path) || contains_injection_patterns(query) {
        warn!(path = %path, query = %query, "injection attempt rejected at the edge");
        return Err(StatusCode::BAD_REQUEST);
    }

    for (name, value) in request.headers().iter() {
        if value.len() > 8192 {
            warn!(header = %name, size = value.len(), "oversized header rejected");
            return Err(StatusCode::BAD_REQUEST);
        }
    }

    Ok(())
}

fn contains_dangerous_patterns(input: &str) -> bool {
    let patterns = ["../", "..\\", "..%2f", "..%5c", "%2e%2e%2f", "%2e%2e%5c", "etc/passwd", "/proc/", "/sys/", "%00"];
    let input_lower = input.to_lowercase();
    patterns.iter().any(|&p| input_lower.contains(p))
}

fn contains_injection_patterns(input: &str) -> bool {
    let patterns = [
        "union select",
        "drop table",
        "insert into",
        "delete from",
        "<script",
        "javascript:",
        "onload=",
        "onerror=",
        "document.cookie",
    ];
    let input_lower = input.to_lowercase();
    patterns.iter().any(|&p| input_lower.contains(p))
}

fn add_security_headers(response: &mut Response) {
    let headers = response.headers_mut();
    headers.insert(HeaderName::from_static("x-content-type-options"), HeaderValue::from_static("nosniff"));
    headers.insert(HeaderName::from_static("x-frame-options"), HeaderValue::from_static("DENY"));
    headers.insert(
        HeaderName::from_static("referrer-policy"),
        HeaderValue::from_static("strict-origin-when-cross-origin"),
    );
    headers.insert(
        HeaderName::from_static("permissions-policy"),
        HeaderValue::from_static("camera=(), microphone=(), geolocation=()"),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_path_traversal() {
        assert!(contains_dangerous_patterns("../etc/passwd"));
        assert!(!contains_dangerous_patterns("chunk-v0-0.m4s"));
    }

    #[test]
    fn detects_script_injection() {
        assert!(contains_injection_patterns("<script>alert(1)</script>"));
        assert!(!contains_injection_patterns("Mozilla/5.0"));
    }
}
