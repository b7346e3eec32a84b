//! Authoritative session entity, `TranscodeSession`.

pub mod manager;
pub mod store;

use crate::model::TranscodeRequest;
use crate::provider::{ProgressSnapshot, TranscodeOutcome};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SessionStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Stopped,
}

impl SessionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionStatus::Completed | SessionStatus::Failed | SessionStatus::Stopped)
    }

    /// Enforces a monotonic transition table:
    /// `pending -> running -> {completed|failed|stopped}`, `running -> stopped`.
    /// No resurrection out of a terminal state.
    pub fn can_transition_to(&self, next: SessionStatus) -> bool {
        use SessionStatus::*;
        match (self, next) {
            (Pending, Running) => true,
            (Pending, Failed) => true,
            (Pending, Stopped) => true,
            (Running, Completed) => true,
            (Running, Failed) => true,
            (Running, Stopped) => true,
            (a, b) if *a == b => true,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionResult {
    pub bytes_produced: u64,
    pub duration_seconds: f64,
}

impl From<TranscodeOutcome> for SessionResult {
    fn from(o: TranscodeOutcome) -> Self {
        Self { bytes_produced: o.bytes_produced, duration_seconds: o.duration_seconds }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscodeSession {
    pub id: Uuid,
    pub provider_id: String,
    pub status: SessionStatus,
    pub request: TranscodeRequest,
    pub progress: ProgressSnapshot,
    pub result: Option<SessionResult>,
    pub hardware_hint: bool,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub last_accessed: DateTime<Utc>,
    pub directory_path: PathBuf,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TranscodeSession {
    /// Directory naming: `<container>_<provider>_<id>` for adaptive
    /// output. `software_<provider>_<id>` is NOT a special
    /// case of the provider id — it is the literal prefix used whenever the
    /// chosen container is progressive (`mp4`).
    pub fn dir_name(container: &str, provider_id: &str, id: Uuid) -> String {
        if container == "mp4" {
            format!("software_{provider_id}_{id}")
        } else {
            format!("{container}_{provider_id}_{id}")
        }
    }

    pub fn is_progressive(&self) -> bool {
        self.request.codec_opts.container == "mp4"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directory_naming_matches_spec() {
        let id = Uuid::nil();
        assert_eq!(TranscodeSession::dir_name("dash", "software", id), format!("dash_software_{id}"));
        assert_eq!(TranscodeSession::dir_name("mp4", "software", id), format!("software_software_{id}"));
    }

    #[test]
    fn status_transitions_are_monotonic() {
        assert!(SessionStatus::Pending.can_transition_to(SessionStatus::Running));
        assert!(SessionStatus::Running.can_transition_to(SessionStatus::Stopped));
        assert!(!SessionStatus::Completed.can_transition_to(SessionStatus::Running));
        assert!(!SessionStatus::Stopped.can_transition_to(SessionStatus::Pending));
    }
}
