//! Rate limiter error types.

use thiserror::Error;

/// Errors that can occur while configuring a rate limiter.
#[derive(Debug, Error)]
pub enum LimiterError {
    /// Quota must allow at least one attempt.
    #[error("invalid limit: {0}")]
    InvalidLimit(u32),

    /// Window must be longer than zero.
    #[error("invalid window: must be greater than zero")]
    InvalidWindow,
}
