//! # Cloak Limiter
//!
//! Per-client throttling of signature verification.
//!
//! Verification is the only operation an attacker can use to test guessed
//! signatures, so it is the only one gated. Each client key (normally the
//! peer IP address) gets a bounded number of attempts per window.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod fixed_window;
pub mod limiter;

pub use error::LimiterError;
pub use fixed_window::{FixedWindowConfig, FixedWindowLimiter};
pub use limiter::{RateLimitDecision, RateLimiter};
