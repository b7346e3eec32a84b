//! Token-bucket construction shared between `AppState` and the rate-limit
//! middleware — kept out of `middleware::rate_limit` so the limiter type
//! has one definition callers can reference without a cycle.

use governor::state::keyed::DefaultKeyedStateStore;
use governor::{Quota, RateLimiter};
use std::num::NonZeroU32;

pub type ClientRateLimiter = RateLimiter<String, DefaultKeyedStateStore<String>, governor::clock::DefaultClock>;

pub fn build_limiter(requests_per_minute: u32, burst: u32) -> ClientRateLimiter {
    let rpm = NonZeroU32::new(requests_per_minute.max(1)).unwrap();
    let burst = NonZeroU32::new(burst.max(1)).unwrap();
    let quota = Quota::per_minute(rpm).allow_burst(burst);
    RateLimiter::keyed(quota)
}
