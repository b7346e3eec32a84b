pub mod cleanup;
pub mod config;
pub mod delivery;
pub mod error;
pub mod eventbus;
pub mod file_manager;
pub mod media;
pub mod middleware;
pub mod model;
pub mod monitoring;
pub mod planner;
pub mod provider;
pub mod rate_limit;
pub mod session;

pub use config::Config;
pub use error::{AppError, Result};

use crate::cleanup::CleanupService;
use crate::file_manager::FileManager;
use crate::media::MediaLookup;
use crate::monitoring::{HealthMonitor, Metrics};
use crate::provider::registry::ProviderRegistry;
use crate::rate_limit::ClientRateLimiter;
use crate::session::manager::SessionManager;
use std::sync::Arc;

/// Shared handle every handler and middleware function takes as its axum
/// `State`. Construction order in `main.rs` mirrors the dependency graph
/// below: config first, then the registry, then the session layer built on
/// top of it, then the services (cleanup, health) that watch the session
/// layer from outside.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub registry: Arc<ProviderRegistry>,
    pub manager: Arc<SessionManager>,
    pub files: Arc<FileManager>,
    pub cleanup: Arc<CleanupService>,
    pub metrics: Arc<Metrics>,
    pub media: Arc<dyn MediaLookup>,
    pub health: Arc<HealthMonitor>,
    pub rate_limiter: Arc<ClientRateLimiter>,
}
