//! Request/session counters: one atomic counter per event, a `start_time`
//! for uptime, snapshotted into JSON on demand rather than pushed anywhere.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug)]
struct Counters {
    total_requests: AtomicU64,
    successful_requests: AtomicU64,
    failed_requests: AtomicU64,
    rate_limited_requests: AtomicU64,
    sessions_started: AtomicU64,
    sessions_completed: AtomicU64,
    sessions_failed: AtomicU64,
    sessions_stopped: AtomicU64,
    bytes_served: AtomicU64,
}

impl Counters {
    fn new() -> Self {
        Self {
            total_requests: AtomicU64::new(0),
            successful_requests: AtomicU64::new(0),
            failed_requests: AtomicU64::new(0),
            rate_limited_requests: AtomicU64::new(0),
            sessions_started: AtomicU64::new(0),
            sessions_completed: AtomicU64::new(0),
            sessions_failed: AtomicU64::new(0),
            sessions_stopped: AtomicU64::new(0),
            bytes_served: AtomicU64::new(0),
        }
    }
}

#[derive(Clone)]
pub struct Metrics {
    counters: Arc<Counters>,
    start_time: Instant,
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub uptime_seconds: u64,
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub rate_limited_requests: u64,
    pub sessions_started: u64,
    pub sessions_completed: u64,
    pub sessions_failed: u64,
    pub sessions_stopped: u64,
    pub bytes_served: u64,
    pub requests_per_second: f64,
}

impl Metrics {
    pub fn new() -> Self {
        Self { counters: Arc::new(Counters::new()), start_time: Instant::now() }
    }

    pub fn increment_requests(&self) {
        self.counters.total_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_successful(&self) {
        self.counters.successful_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_failed(&self) {
        self.counters.failed_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_rate_limited(&self) {
        self.counters.rate_limited_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_session_started(&self) {
        self.counters.sessions_started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_session_completed(&self) {
        self.counters.sessions_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_session_failed(&self) {
        self.counters.sessions_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_session_stopped(&self) {
        self.counters.sessions_stopped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_bytes_served(&self, bytes: u64) {
        self.counters.bytes_served.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let uptime = self.start_time.elapsed().as_secs();
        let total_requests = self.counters.total_requests.load(Ordering::Relaxed);
        MetricsSnapshot {
            uptime_seconds: uptime,
            total_requests,
            successful_requests: self.counters.successful_requests.load(Ordering::Relaxed),
            failed_requests: self.counters.failed_requests.load(Ordering::Relaxed),
            rate_limited_requests: self.counters.rate_limited_requests.load(Ordering::Relaxed),
            sessions_started: self.counters.sessions_started.load(Ordering::Relaxed),
            sessions_completed: self.counters.sessions_completed.load(Ordering::Relaxed),
            sessions_failed: self.counters.sessions_failed.load(Ordering::Relaxed),
            sessions_stopped: self.counters.sessions_stopped.load(Ordering::Relaxed),
            bytes_served: self.counters.bytes_served.load(Ordering::Relaxed),
            requests_per_second: if uptime > 0 { total_requests as f64 / uptime as f64 } else { 0.0 },
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
