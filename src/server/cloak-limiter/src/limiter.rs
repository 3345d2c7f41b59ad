//! Rate limiter trait.

use std::time::Duration;

use async_trait::async_trait;

/// Outcome of a single [`RateLimiter::consume`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    /// Whether the attempt is within quota.
    pub accepted: bool,
    /// Attempts left in the current window after this one.
    pub remaining: u32,
    /// How long to wait before the next attempt is accepted (zero when accepted).
    pub retry_after: Duration,
}

impl RateLimitDecision {
    /// An accepted attempt.
    pub fn accepted(remaining: u32) -> Self {
        Self {
            accepted: true,
            remaining,
            retry_after: Duration::ZERO,
        }
    }

    /// A rejected attempt.
    pub fn rejected(retry_after: Duration) -> Self {
        Self {
            accepted: false,
            remaining: 0,
            retry_after,
        }
    }

    /// `retry_after` in whole seconds, rounded up, at least one.
    ///
    /// Suitable for the `Retry-After` header: waiting this long always
    /// covers the exact duration.
    pub fn retry_after_secs(&self) -> u64 {
        let secs = self.retry_after.as_secs();
        let secs = if self.retry_after.subsec_nanos() > 0 {
            secs + 1
        } else {
            secs
        };
        secs.max(1)
    }
}

/// Trait for rate limiting policies.
///
/// Implementations must serialize updates for the same client key and must
/// not make different keys wait on each other beyond brief bookkeeping.
#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Records one attempt for `client_key` and decides whether it is allowed.
    ///
    /// # Arguments
    ///
    /// * `client_key` - Identity of the caller, usually its IP address
    async fn consume(&self, client_key: &str) -> RateLimitDecision;

    /// Returns the name of this limiter for logging/debugging.
    fn name(&self) -> &'static str;
}
