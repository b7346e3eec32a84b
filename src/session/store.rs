//! Durable record of every session.
//!
//! In-memory, process-wide map keyed by session id, using the same
//! sharded-lock shape as a `DashMap`-backed cache. A session row is the
//! single source of truth `Get`/`List` read
//! from; the hot map in `SessionManager` only overlays the freshest
//! in-flight status on top of it.

use super::{SessionStatus, TranscodeSession};
use crate::error::{AppError, Result};
use dashmap::DashMap;
use uuid::Uuid;

#[derive(Default)]
pub struct SessionStore {
    rows: DashMap<Uuid, TranscodeSession>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self { rows: DashMap::new() }
    }

    pub fn insert(&self, session: TranscodeSession) {
        self.rows.insert(session.id, session);
    }

    pub fn get(&self, id: Uuid) -> Result<TranscodeSession> {
        self.rows
            .get(&id)
            .map(|r| r.clone())
            .ok_or_else(|| AppError::SessionNotFound { session_id: id.to_string() })
    }

    pub fn try_get(&self, id: Uuid) -> Option<TranscodeSession> {
        self.rows.get(&id).map(|r| r.clone())
    }

    /// Applies `f` to the row and persists the mutation, enforcing the
    /// monotonic status transition table before committing.
    pub fn update(&self, id: Uuid, f: impl FnOnce(&mut TranscodeSession)) -> Result<TranscodeSession> {
        let mut entry = self
            .rows
            .get_mut(&id)
            .ok_or_else(|| AppError::SessionNotFound { session_id: id.to_string() })?;
        let previous_status = entry.status;
        let mut candidate = entry.clone();
        f(&mut candidate);
        if candidate.status != previous_status && !previous_status.can_transition_to(candidate.status) {
            return Err(AppError::Internal(format!(
                "illegal session transition {previous_status:?} -> {:?}",
                candidate.status
            )));
        }
        candidate.updated_at = chrono::Utc::now();
        *entry = candidate.clone();
        Ok(candidate)
    }

    pub fn remove(&self, id: Uuid) -> Option<TranscodeSession> {
        self.rows.remove(&id).map(|(_, v)| v)
    }

    pub fn list(&self) -> Vec<TranscodeSession> {
        self.rows.iter().map(|r| r.clone()).collect()
    }

    pub fn list_by_media(&self, media_id: &str) -> Vec<TranscodeSession> {
        self.rows.iter().filter(|r| r.request.media_id == media_id).map(|r| r.clone()).collect()
    }

    pub fn list_by_status(&self, status: SessionStatus) -> Vec<TranscodeSession> {
        self.rows.iter().filter(|r| r.status == status).map(|r| r.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
