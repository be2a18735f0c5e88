//! Sliding-window request budget per provider.
//!
//! A provider may be called at most `max_requests` times in any trailing
//! `window` interval. The check and the record happen under one lock so
//! concurrent workers cannot overshoot the budget.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::time::{Duration, Instant};
use tracing::warn;

/// Sliding-window rate limiter.
#[derive(Debug)]
pub struct RateLimiter {
    /// Maximum requests per window.
    max_requests: u32,
    /// Window size.
    window: Duration,
    /// Timestamps of requests inside the window.
    timestamps: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    /// Create a new rate limiter.
    ///
    /// # Arguments
    /// * `max_requests` - Maximum requests per window
    /// * `window_secs` - Window size in seconds
    pub fn new(max_requests: u32, window_secs: u64) -> Self {
        Self::with_window(max_requests, Duration::from_secs(window_secs))
    }

    pub fn with_window(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            timestamps: Mutex::new(VecDeque::with_capacity(max_requests as usize)),
        }
    }

    /// Reserve one request slot if the budget allows it.
    ///
    /// Returns false without recording anything when the window is full.
    pub fn try_acquire(&self) -> bool {
        let now = Instant::now();
        let mut timestamps = self.timestamps.lock();
        Self::evict(&mut timestamps, now, self.window);

        if timestamps.len() >= self.max_requests as usize {
            return false;
        }
        timestamps.push_back(now);

        if timestamps.len() == self.max_requests as usize {
            warn!(
                count = timestamps.len(),
                max = self.max_requests,
                "Request budget exhausted for current window"
            );
        }
        true
    }

    /// Check whether a request could be made now.
    pub fn can_send(&self) -> bool {
        self.current_count() < self.max_requests
    }

    /// Requests recorded in the current window.
    pub fn current_count(&self) -> u32 {
        let mut timestamps = self.timestamps.lock();
        Self::evict(&mut timestamps, Instant::now(), self.window);
        timestamps.len() as u32
    }

    /// Get remaining capacity.
    pub fn remaining_capacity(&self) -> u32 {
        self.max_requests.saturating_sub(self.current_count())
    }

    pub fn max_requests(&self) -> u32 {
        self.max_requests
    }

    /// Reset rate limiter state.
    pub fn reset(&self) {
        self.timestamps.lock().clear();
    }

    fn evict(timestamps: &mut VecDeque<Instant>, now: Instant, window: Duration) {
        let Some(cutoff) = now.checked_sub(window) else {
            return;
        };
        while timestamps.front().is_some_and(|&t| t <= cutoff) {
            timestamps.pop_front();
        }
    }
}
