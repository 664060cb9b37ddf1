//! Read limiter cleanup (every 5 minutes)

use crate::middleware::read_limit::ReadRateLimiter;

pub async fn run(limiter: &ReadRateLimiter) -> usize {
    let evicted = limiter.cleanup().await;
    if evicted > 0 {
        let remaining = limiter.tracked_keys().await;
        tracing::debug!(
            evicted,
            remaining,
            "Read limiter cleanup: evicted stale windows"
        );
    }
    evicted
}
