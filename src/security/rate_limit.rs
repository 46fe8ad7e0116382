//! Per-key sliding-window rate limiter.
//!
//! Buckets live in process memory only. Several instances of the site each keep
//! their own table, so limits are per instance rather than global.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use std::sync::Mutex;

use crate::config::RateBudget;

/// Key shared by every client whose address cannot be determined.
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Outcome of a single admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub allowed: bool,
    /// Requests still admissible in the current window.
    pub remaining: u32,
    /// Seconds until the next request would be admitted; 0 when allowed.
    pub retry_after_secs: u64,
}

/// Admission history for one key.
struct Bucket {
    /// Admissions still inside the window, oldest first. Never longer than the limit.
    admitted: VecDeque<Instant>,
    last_seen: Instant,
    window: Duration,
}

impl Bucket {
    fn new(now: Instant, window: Duration) -> Self {
        Self {
            admitted: VecDeque::new(),
            last_seen: now,
            window,
        }
    }

    fn try_acquire(&mut self, limit: u32, window: Duration, now: Instant) -> Decision {
        self.last_seen = now;
        self.window = window;

        while let Some(&oldest) = self.admitted.front() {
            if now.saturating_duration_since(oldest) >= window {
                self.admitted.pop_front();
            } else {
                break;
            }
        }
        // A shrunken limit leaves surplus history behind.
        while self.admitted.len() > limit as usize {
            self.admitted.pop_front();
        }

        let used = self.admitted.len() as u32;
        if used < limit {
            self.admitted.push_back(now);
            return Decision {
                allowed: true,
                remaining: limit - used - 1,
                retry_after_secs: 0,
            };
        }

        let retry_after = match self.admitted.front() {
            Some(&oldest) => (oldest + window).saturating_duration_since(now),
            None => window,
        };
        Decision {
            allowed: false,
            remaining: 0,
            retry_after_secs: ceil_secs(retry_after).max(1),
        }
    }

    fn is_stale(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.last_seen) > self.window * 2
    }
}

fn ceil_secs(duration: Duration) -> u64 {
    let secs = duration.as_secs();
    if duration.subsec_nanos() > 0 {
        secs + 1
    } else {
        secs
    }
}

/// Shared bucket table. Construct one per application and hand it out via `Arc`.
pub struct RateLimiter {
    buckets: DashMap<String, Bucket>,
    cleanup_interval: Duration,
    last_cleanup: Mutex<Instant>,
}

impl RateLimiter {
    pub fn new(cleanup_interval: Duration) -> Self {
        Self {
            buckets: DashMap::new(),
            cleanup_interval,
            last_cleanup: Mutex::new(Instant::now()),
        }
    }

    /// Check and consume one request for `key` against `budget`.
    pub fn check(&self, key: &str, budget: RateBudget) -> Decision {
        self.check_at(key, budget, Instant::now())
    }

    /// Same as [`check`](Self::check) with an explicit clock reading.
    pub fn check_at(&self, key: &str, budget: RateBudget, now: Instant) -> Decision {
        self.cleanup(now);

        let limit = budget.limit.max(1);
        let window = Duration::from_secs(budget.window_secs.max(1));
        let key = if key.is_empty() { UNKNOWN_CLIENT } else { key };

        let mut bucket = self
            .buckets
            .entry(key.to_string())
            .or_insert_with(|| Bucket::new(now, window));
        bucket.try_acquire(limit, window, now)
    }

    /// Number of tracked keys.
    pub fn tracked_keys(&self) -> usize {
        self.buckets.len()
    }

    /// Evict buckets untouched for more than twice their window. Runs at most
    /// once per cleanup interval.
    fn cleanup(&self, now: Instant) {
        {
            let mut last = match self.last_cleanup.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            if now.saturating_duration_since(*last) < self.cleanup_interval {
                return;
            }
            *last = now;
        }

        let before = self.buckets.len();
        self.buckets.retain(|_, bucket| !bucket.is_stale(now));
        let evicted = before.saturating_sub(self.buckets.len());
        if evicted > 0 {
            tracing::debug!(evicted, remaining = self.buckets.len(), "Evicted stale rate-limit buckets");
        }
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(Duration::from_secs(60))
    }
}
