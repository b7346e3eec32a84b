//! Observability surface: counters and a health snapshot are ambient
//! infrastructure, carried regardless of which playback features are
//! enabled, not something bolted on only when asked for.

pub mod health;
pub mod metrics;

pub use health::HealthMonitor;
pub use metrics::Metrics;
