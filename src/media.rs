//! The core's only collaboration point with library ingestion: a
//! read-only lookup from media id/path to the facts the planner needs.
//! Library ingestion itself is out of scope.

use crate::model::MediaFile;
use async_trait::async_trait;

#[async_trait]
pub trait MediaLookup: Send + Sync {
    async fn lookup(&self, media_path: &str) -> Option<MediaFile>;
}

/// In-memory lookup keyed by `path`, registered at startup. Stands in for
/// the real upstream callback a hosting application would supply; good
/// enough to drive the decision/start endpoints end-to-end in tests and in
/// a standalone deployment of this core.
pub struct StaticMediaLookup {
    entries: dashmap::DashMap<String, MediaFile>,
}

impl StaticMediaLookup {
    pub fn new() -> Self {
        Self { entries: dashmap::DashMap::new() }
    }

    pub fn register(&self, media: MediaFile) {
        self.entries.insert(media.path.clone(), media);
    }
}

impl Default for StaticMediaLookup {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MediaLookup for StaticMediaLookup {
    async fn lookup(&self, media_path: &str) -> Option<MediaFile> {
        self.entries.get(media_path).map(|r| r.clone())
    }
}
