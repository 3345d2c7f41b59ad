//! Fixed-window rate limiter.
//!
//! The first attempt from a client opens a window of length `window`. Up to
//! `limit` attempts are accepted inside it; later ones are rejected with the
//! time left until the window closes. The first attempt after that opens a
//! fresh window.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::{LimiterError, RateLimitDecision, RateLimiter};

/// Configuration for [`FixedWindowLimiter`].
#[derive(Debug, Clone, Copy)]
pub struct FixedWindowConfig {
    /// Accepted attempts per window.
    pub limit: u32,
    /// Window length.
    pub window: Duration,
}

impl Default for FixedWindowConfig {
    fn default() -> Self {
        Self {
            limit: 10,
            window: Duration::from_secs(60),
        }
    }
}

#[derive(Debug)]
struct Window {
    started: Instant,
    count: u32,
    // Set by `prune` once the window is no longer in the map.
    evicted: bool,
}

/// Per-client fixed-window limiter.
///
/// Each client has its own mutex; the map lock is only held to look up or
/// insert a client.
pub struct FixedWindowLimiter {
    config: FixedWindowConfig,
    windows: RwLock<HashMap<String, Arc<Mutex<Window>>>>,
}

impl FixedWindowLimiter {
    /// Creates a new limiter.
    pub fn new(config: FixedWindowConfig) -> Result<Self, LimiterError> {
        if config.limit == 0 {
            return Err(LimiterError::InvalidLimit(config.limit));
        }
        if config.window.is_zero() {
            return Err(LimiterError::InvalidWindow);
        }

        Ok(Self {
            config,
            windows: RwLock::new(HashMap::new()),
        })
    }

    /// Returns the limiter configuration.
    pub fn config(&self) -> FixedWindowConfig {
        self.config
    }

    async fn window_for(&self, client_key: &str) -> Arc<Mutex<Window>> {
        if let Some(window) = self.windows.read().await.get(client_key) {
            return window.clone();
        }

        let mut windows = self.windows.write().await;
        windows
            .entry(client_key.to_string())
            .or_insert_with(|| {
                Arc::new(Mutex::new(Window {
                    started: Instant::now(),
                    count: 0,
                    evicted: false,
                }))
            })
            .clone()
    }

    /// Drops the windows of clients whose window has fully elapsed.
    ///
    /// Returns the number of clients removed.
    pub async fn prune(&self) -> usize {
        let now = Instant::now();
        let mut windows = self.windows.write().await;
        let before = windows.len();

        // A window locked right now is in use; keep it.
        windows.retain(|_, window| match window.try_lock() {
            Ok(mut w) => {
                let keep = now.duration_since(w.started) < self.config.window;
                w.evicted = !keep;
                keep
            },
            Err(_) => true,
        });

        let removed = before - windows.len();
        if removed > 0 {
            debug!(removed, remaining = windows.len(), "Pruned rate limit windows");
        }
        removed
    }

    /// Number of clients currently tracked.
    pub async fn tracked_clients(&self) -> usize {
        self.windows.read().await.len()
    }

    /// Spawns a task calling [`FixedWindowLimiter::prune`] once per window.
    pub fn spawn_pruning(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.config.window);
            // The first tick fires immediately.
            interval.tick().await;
            loop {
                interval.tick().await;
                self.prune().await;
            }
        })
    }

    /// Counts one attempt against `window`.
    ///
    /// Returns `None` when `prune` evicted the window after it was looked up;
    /// the caller must fetch the current one from the map.
    async fn consume_in(
        &self,
        window: &Mutex<Window>,
        client_key: &str,
    ) -> Option<RateLimitDecision> {
        let mut window = window.lock().await;
        if window.evicted {
            return None;
        }
        let now = Instant::now();

        let elapsed = now.duration_since(window.started);
        if elapsed >= self.config.window {
            window.started = now;
            window.count = 0;
        }

        if window.count >= self.config.limit {
            let retry_after = self.config.window - now.duration_since(window.started);
            warn!(
                client = client_key,
                retry_after_ms = retry_after.as_millis() as u64,
                "Verification rate limit exceeded"
            );
            return Some(RateLimitDecision::rejected(retry_after));
        }

        window.count += 1;
        let remaining = self.config.limit - window.count;
        debug!(client = client_key, remaining, "Verification attempt accepted");
        Some(RateLimitDecision::accepted(remaining))
    }
}

#[async_trait]
impl RateLimiter for FixedWindowLimiter {
    async fn consume(&self, client_key: &str) -> RateLimitDecision {
        loop {
            let window = self.window_for(client_key).await;
            if let Some(decision) = self.consume_in(&window, client_key).await {
                return decision;
            }
        }
    }

    fn name(&self) -> &'static str {
        "fixed-window"
    }
}
