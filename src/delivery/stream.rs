//! Manifest/segment/progressive byte delivery.
//!
//! The progressive handler binds the adapter's channel directly to the
//! response body: axum's `Body::from_stream` over a
//! `flume::Receiver`-backed `Stream` hands bytes to the client as the
//! provider produces them, with no intermediate buffering.

use crate::error::{AppError, Result};
use crate::session::SessionStatus;
use crate::AppState;
use axum::body::{Body, Bytes};
use axum::extract::{Path, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use futures_util::Stream;
use once_cell::sync::Lazy;
use regex::Regex;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tracing::warn;
use uuid::Uuid;

static SEGMENT_NAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9._-]+\.(m4s|ts)$").unwrap());

fn parse_id(id: &str) -> Result<Uuid> {
    Uuid::parse_str(id).map_err(|_| AppError::SessionNotFound { session_id: id.to_string() })
}

/// `GET /stream/:id/manifest.mpd`
pub async fn manifest(State(state): State<AppState>, Path(id): Path<String>) -> Result<Response> {
    serve_named_file(&state, &id, "manifest.mpd").await
}

/// `GET /stream/:id/playlist.m3u8`
pub async fn playlist(State(state): State<AppState>, Path(id): Path<String>) -> Result<Response> {
    serve_named_file(&state, &id, "playlist.m3u8").await
}

async fn serve_named_file(state: &AppState, id: &str, filename: &str) -> Result<Response> {
    let session_id = parse_id(id)?;
    let session = state.manager.get(session_id)?;
    if !matches!(session.status, SessionStatus::Running | SessionStatus::Completed) {
        return Err(AppError::SegmentNotFound { session_id: id.to_string(), filename: filename.to_string() });
    }

    let path = state.files.resolve(&session.directory_path, filename)?;
    let bytes = tokio::fs::read(&path)
        .await
        .map_err(|_| AppError::SegmentNotFound { session_id: id.to_string(), filename: filename.to_string() })?;
    state.metrics.add_bytes_served(bytes.len() as u64);

    Ok((
        [
            (header::CONTENT_TYPE, state.files.content_type_for(filename)),
            (header::CACHE_CONTROL, "no-cache".to_string()),
            (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*".to_string()),
        ],
        bytes,
    )
        .into_response())
}

/// `GET /stream/:id/:segmentFile` — retries up to 3x200ms to accommodate a
/// segment still being written by the adapter.
pub async fn segment(State(state): State<AppState>, Path((id, segment_file)): Path<(String, String)>) -> Result<Response> {
    if !SEGMENT_NAME.is_match(&segment_file) {
        return Err(AppError::PathTraversal { filename: segment_file });
    }

    let session_id = parse_id(&id)?;
    let session = state.manager.get(session_id)?;
    let path = state.files.resolve(&session.directory_path, &segment_file)?;

    let mut attempt = 0;
    let bytes = loop {
        match tokio::fs::read(&path).await {
            Ok(b) => break b,
            Err(_) if attempt < 3 => {
                attempt += 1;
                tokio::time::sleep(Duration::from_millis(200)).await;
            }
            Err(_) => return Err(AppError::SegmentNotFound { session_id: id, filename: segment_file }),
        }
    };
    state.metrics.add_bytes_served(bytes.len() as u64);

    Ok((
        [
            (header::CONTENT_TYPE, state.files.content_type_for(&segment_file)),
            (header::CACHE_CONTROL, "public, max-age=3600".to_string()),
            (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*".to_string()),
            (header::ACCEPT_RANGES, "bytes".to_string()),
        ],
        bytes,
    )
        .into_response())
}

/// `GET /stream/:id` — progressive MP4. Dropping the response body (client
/// disconnect) stops the session via `ProgressiveBodyStream::drop`.
pub async fn progressive(State(state): State<AppState>, Path(id): Path<String>) -> Result<Response> {
    let session_id = parse_id(&id)?;
    let session = state.manager.get(session_id)?;
    if session.status.is_terminal() && session.status != SessionStatus::Completed {
        return Err(AppError::SessionNotFound { session_id: id });
    }

    let receiver = state
        .manager
        .progressive_receiver(session_id)
        .await
        .ok_or(AppError::SegmentNotFound { session_id: id.clone(), filename: "<progressive>".to_string() })?;

    let stream = ProgressiveBodyStream {
        inner: Box::pin(receiver.into_stream()),
        manager: state.manager.clone(),
        session_id,
        done: false,
    };
    let body = Body::from_stream(stream);

    Ok((
        [
            (header::CONTENT_TYPE, state.files.content_type_for("output.mp4")),
            (header::ACCEPT_RANGES, "bytes".to_string()),
            (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*".to_string()),
        ],
        body,
    )
        .into_response())
}

struct ProgressiveBodyStream {
    inner: Pin<Box<dyn Stream<Item = Bytes> + Send>>,
    manager: Arc<crate::session::manager::SessionManager>,
    session_id: Uuid,
    done: bool,
}

impl Stream for ProgressiveBodyStream {
    type Item = std::result::Result<Bytes, std::io::Error>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        match self.inner.as_mut().poll_next(cx) {
            Poll::Ready(Some(chunk)) => Poll::Ready(Some(Ok(chunk))),
            Poll::Ready(None) => {
                self.done = true;
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl Drop for ProgressiveBodyStream {
    fn drop(&mut self) {
        if self.done {
            return;
        }
        let manager = self.manager.clone();
        let session_id = self.session_id;
        tokio::spawn(async move {
            if let Err(e) = manager.stop(session_id).await {
                if !matches!(e, AppError::SessionTerminal { .. }) {
                    warn!(session_id = %session_id, error = %e, "failed to stop session after client disconnect");
                }
            }
        });
    }
}
