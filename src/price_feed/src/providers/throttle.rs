use std::num::NonZeroU32;

use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use nonzero_ext::nonzero;

pub const DEFAULT_REQUESTS_PER_MINUTE: u32 = 60;

/// Client-side request budget shared by all calls made through one provider.
pub struct RequestThrottle {
    limiter: DefaultDirectRateLimiter,
}

impl RequestThrottle {
    /// A budget of `requests` per minute; `0` falls back to the default.
    pub fn per_minute(requests: u32) -> Self {
        let quota = NonZeroU32::new(requests).unwrap_or(nonzero!(60u32));
        Self {
            limiter: RateLimiter::direct(Quota::per_minute(quota)),
        }
    }

    /// Waits until the next request may be sent.
    pub async fn acquire(&self) {
        self.limiter.until_ready().await;
    }
}

impl Default for RequestThrottle {
    fn default() -> Self {
        Self::per_minute(DEFAULT_REQUESTS_PER_MINUTE)
    }
}
