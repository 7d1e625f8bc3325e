//! Fixed-window rate limiter for upstream API calls.

use parking_lot::Mutex;
use std::time::Duration;
use tokio::time::Instant;

struct Window {
    started: Instant,
    count: u32,
}

/// Counts requests in fixed windows. When the window is exhausted callers
/// get back how long to wait until it resets.
pub struct RateLimiter {
    max_requests: u32,
    window: Duration,
    state: Mutex<Window>,
}

impl RateLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            state: Mutex::new(Window {
                started: Instant::now(),
                count: 0,
            }),
        }
    }

    /// Claim a slot in the current window. On a full window, returns the
    /// seconds remaining until it resets (rounded up).
    pub fn try_acquire(&self) -> Result<(), u64> {
        let mut state = self.state.lock();
        let now = Instant::now();

        if now.duration_since(state.started) >= self.window {
            state.started = now;
            state.count = 0;
        }

        if state.count >= self.max_requests {
            let remaining = self.window - now.duration_since(state.started);
            return Err(remaining.as_secs_f64().ceil() as u64);
        }

        state.count += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{advance, Duration};

    #[tokio::test(start_paused = true)]
    async fn exhausted_window_reports_wait() {
        let limiter = RateLimiter::new(10, Duration::from_secs(60));

        for _ in 0..10 {
            assert!(limiter.try_acquire().is_ok());
        }

        let wait = limiter.try_acquire().unwrap_err();
        assert!(wait > 0 && wait <= 60, "wait was {wait}");
    }

    #[tokio::test(start_paused = true)]
    async fn window_resets_after_expiry() {
        let limiter = RateLimiter::new(10, Duration::from_secs(60));

        for _ in 0..10 {
            assert!(limiter.try_acquire().is_ok());
        }
        assert!(limiter.try_acquire().is_err());

        advance(Duration::from_secs(60)).await;
        assert!(limiter.try_acquire().is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn wait_shrinks_as_window_ages() {
        let limiter = RateLimiter::new(1, Duration::from_secs(60));
        assert!(limiter.try_acquire().is_ok());

        advance(Duration::from_secs(45)).await;
        let wait = limiter.try_acquire().unwrap_err();
        assert!(wait <= 15, "wait was {wait}");
    }
}
