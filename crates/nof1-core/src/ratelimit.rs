//! Fixed-window request throttling, keyed by caller identity.
//!
//! Expensive endpoints (the full correlation scan in particular) get a
//! per-user budget per window. The clock is injected so tests can steer it;
//! production uses [`RateLimiter::new`] with the system clock.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use log::debug;

/// Default budget: scans per user per window.
pub const DEFAULT_MAX_REQUESTS: u32 = 10;

/// Default window length in minutes.
pub const DEFAULT_WINDOW_MINUTES: i64 = 1;

struct Window {
    started_at: DateTime<Utc>,
    count: u32,
}

/// Per-key fixed-window counter.
///
/// A key's first request opens a window; requests inside it count against
/// the budget, and the first request after it expires opens a fresh one.
pub struct RateLimiter {
    max_requests: u32,
    window: Duration,
    clock: Box<dyn Fn() -> DateTime<Utc> + Send + Sync>,
    windows: Mutex<HashMap<String, Window>>,
}

impl RateLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self::with_clock(max_requests, window, Utc::now)
    }

    pub fn with_clock(
        max_requests: u32,
        window: Duration,
        clock: impl Fn() -> DateTime<Utc> + Send + Sync + 'static,
    ) -> Self {
        Self {
            max_requests,
            window,
            clock: Box::new(clock),
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Record one request for `key`. Returns `true` if it fits the budget.
    pub fn check(&self, key: &str) -> bool {
        let now = (self.clock)();
        let mut windows = self.windows.lock().unwrap();
        let entry = windows.entry(key.to_string()).or_insert(Window {
            started_at: now,
            count: 0,
        });
        if now - entry.started_at >= self.window {
            entry.started_at = now;
            entry.count = 0;
        }
        if entry.count >= self.max_requests {
            debug!("rate limit hit for {key}: {} in window", entry.count);
            return false;
        }
        entry.count += 1;
        true
    }

    /// Drop all tracked windows.
    pub fn reset(&self) {
        self.windows.lock().unwrap().clear();
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(
            DEFAULT_MAX_REQUESTS,
            Duration::minutes(DEFAULT_WINDOW_MINUTES),
        )
    }
}
