use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use std::num::NonZeroU32;
use std::sync::Arc;

/// Rate limiter configuration for outbound broker calls
#[derive(Debug, Clone, Copy)]
pub struct RateLimiterConfig {
    /// Maximum requests per minute
    pub requests_per_minute: u32,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            requests_per_minute: 200, // Alpaca allows 200 requests per minute per account
        }
    }
}

/// Shared limiter, one per broker account
pub type BrokerRateLimiter = Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>;

/// Create a new rate limiter. A zero budget is raised to one request per minute.
pub fn create_rate_limiter(config: RateLimiterConfig) -> BrokerRateLimiter {
    let per_minute = NonZeroU32::new(config.requests_per_minute).unwrap_or(NonZeroU32::MIN);
    Arc::new(RateLimiter::direct(Quota::per_minute(per_minute)))
}

/// Wait until the limiter admits one more request
pub async fn acquire(limiter: &BrokerRateLimiter) {
    if limiter.check().is_err() {
        tracing::debug!("Broker rate limit reached, waiting for capacity");
        limiter.until_ready().await;
    }
}
