//! Per-key sliding-window rate limiting.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

const WINDOW: Duration = Duration::from_secs(60);
const SWEEP_INTERVAL: Duration = Duration::from_secs(300);

#[derive(Debug, Default)]
struct SlidingWindow {
    hits: Vec<Instant>,
}

impl SlidingWindow {
    // Drops entries older than the window, then admits if under the limit.
    fn allow(&mut self, limit: usize) -> (usize, bool) {
        let cutoff = Instant::now() - WINDOW;
        self.hits.retain(|t| *t > cutoff);

        if self.hits.len() >= limit {
            return (0, false);
        }
        self.hits.push(Instant::now());
        (limit - self.hits.len(), true)
    }

    fn idle_since(&self, cutoff: Instant) -> bool {
        match self.hits.last() {
            Some(last) => *last < cutoff,
            None => true,
        }
    }
}

/// Sliding one-minute window per key, with a background sweeper evicting
/// idle windows. Keys are API keys when present, else remote addresses.
pub struct RateLimiter {
    limit: usize,
    windows: Mutex<HashMap<String, Arc<Mutex<SlidingWindow>>>>,
}

impl RateLimiter {
    pub fn new(limit_per_minute: usize) -> Self {
        Self {
            limit: limit_per_minute,
            windows: Mutex::new(HashMap::new()),
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Returns (remaining, admitted) for one request under `key`.
    pub fn allow(&self, key: &str) -> (usize, bool) {
        let window = self.window(key);
        let mut window = window.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        window.allow(self.limit)
    }

    fn window(&self, key: &str) -> Arc<Mutex<SlidingWindow>> {
        let mut windows = self
            .windows
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        windows
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(SlidingWindow::default())))
            .clone()
    }

    /// Evicts windows with no activity in the last minute.
    pub fn sweep(&self) {
        let cutoff = Instant::now() - WINDOW;
        let mut windows = self
            .windows
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        windows.retain(|_, window| {
            let window = window.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            !window.idle_since(cutoff)
        });
    }

    /// Spawns the periodic sweeper. The task stops when the limiter is
    /// dropped by every other holder.
    pub fn spawn_sweeper(self: &Arc<Self>) {
        let limiter = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                match limiter.upgrade() {
                    Some(limiter) => limiter.sweep(),
                    None => break,
                }
            }
        });
    }

    #[cfg(test)]
    fn tracked_keys(&self) -> usize {
        self.windows
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admits_until_limit_then_rejects() {
        let limiter = RateLimiter::new(3);
        assert_eq!(limiter.allow("k"), (2, true));
        assert_eq!(limiter.allow("k"), (1, true));
        assert_eq!(limiter.allow("k"), (0, true));
        assert_eq!(limiter.allow("k"), (0, false));
    }

    #[test]
    fn keys_are_independent() {
        let limiter = RateLimiter::new(1);
        assert!(limiter.allow("a").1);
        assert!(limiter.allow("b").1);
        assert!(!limiter.allow("a").1);
    }

    #[test]
    fn sweep_drops_only_idle_windows() {
        let limiter = RateLimiter::new(5);
        limiter.allow("active");
        assert_eq!(limiter.tracked_keys(), 1);

        // A freshly used window survives the sweep.
        limiter.sweep();
        assert_eq!(limiter.tracked_keys(), 1);
    }
}
