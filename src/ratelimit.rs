//! Sliding-window limiter for outbound vulnerability-database queries.
//!
//! The limiter keeps the send times of recent requests. Before each request it
//! drops entries older than the window. If the window is full, it computes how
//! long the caller must wait until the oldest relevant entry expires.
//!
//! Time comes from a [`Clock`] so tests can drive window expiry with a
//! [`ManualClock`] instead of sleeping.
//!
//! # Example
//!
//! ```
//! use depscan::ratelimit::{RateLimitConfig, RateLimiter};
//!
//! let limiter = RateLimiter::new(RateLimitConfig::anonymous());
//! let admission = limiter.admit();
//! assert!(admission.immediate);
//! ```

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Source of the current time.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// The real monotonic clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<Instant>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Mutex::new(Instant::now()),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Request budget: at most `capacity` requests per `window_secs`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    pub capacity: usize,
    pub window_secs: u64,
}

impl RateLimitConfig {
    /// Budget for unauthenticated NVD access: 5 requests per 30 seconds.
    pub const fn anonymous() -> Self {
        Self {
            capacity: 5,
            window_secs: 30,
        }
    }

    /// Budget when an API key is attached: 50 requests per 30 seconds.
    pub const fn with_key() -> Self {
        Self {
            capacity: 50,
            window_secs: 30,
        }
    }

    /// Picks the preset matching whether a credential is available.
    pub fn for_credential(has_key: bool) -> Self {
        if has_key {
            Self::with_key()
        } else {
            Self::anonymous()
        }
    }

    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self::anonymous()
    }
}

/// Outcome of an admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Admission {
    /// True when the request may be sent right away.
    pub immediate: bool,
    /// How long to wait before sending. Zero when `immediate`.
    pub wait: Duration,
}

#[derive(Debug)]
struct RateLimitWindow {
    timestamps: VecDeque<Instant>,
    capacity: usize,
    window: Duration,
}

impl RateLimitWindow {
    fn prune(&mut self, now: Instant) {
        // Entries scheduled in the future have zero age and are kept.
        while let Some(oldest) = self.timestamps.front() {
            if now.saturating_duration_since(*oldest) >= self.window {
                self.timestamps.pop_front();
            } else {
                break;
            }
        }
    }

    fn admit(&mut self, now: Instant) -> Admission {
        self.prune(now);

        let mut wait = Duration::ZERO;
        if self.capacity > 0 && self.timestamps.len() >= self.capacity {
            // With concurrent callers more entries than capacity may be
            // pending; the slot frees when the entry `capacity` places back
            // from the newest expires.
            let blocking = self.timestamps[self.timestamps.len() - self.capacity];
            let age = now.saturating_duration_since(blocking);
            let until_expiry = if blocking > now {
                self.window + blocking.duration_since(now)
            } else {
                self.window.saturating_sub(age)
            };
            wait = until_expiry;
        }

        self.timestamps.push_back(now + wait);

        Admission {
            immediate: wait.is_zero(),
            wait,
        }
    }
}

/// Shared sliding-window limiter.
///
/// Admission checks are serialized by an internal mutex, so one limiter can be
/// shared by concurrent workers.
pub struct RateLimiter {
    window: Mutex<RateLimitWindow>,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: RateLimitConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            window: Mutex::new(RateLimitWindow {
                timestamps: VecDeque::with_capacity(config.capacity),
                capacity: config.capacity,
                window: config.window(),
            }),
            clock,
        }
    }

    /// Checks the window and records the time the request will be sent.
    ///
    /// The caller must wait for [`Admission::wait`] before sending.
    pub fn admit(&self) -> Admission {
        let now = self.clock.now();
        let mut window = self.window.lock().unwrap_or_else(PoisonError::into_inner);
        let admission = window.admit(now);
        debug!(
            in_window = window.timestamps.len(),
            capacity = window.capacity,
            wait_ms = admission.wait.as_millis() as u64,
            "rate limiter admission"
        );
        admission
    }

    /// Admits a request, sleeping until it may be sent.
    pub async fn acquire(&self) {
        let admission = self.admit();
        if !admission.immediate {
            info!(
                wait_secs = admission.wait.as_secs_f64(),
                "rate limit reached, waiting"
            );
            tokio::time::sleep(admission.wait).await;
        }
    }

    /// Number of requests currently counted against the window.
    pub fn in_flight(&self) -> usize {
        let now = self.clock.now();
        let mut window = self.window.lock().unwrap_or_else(PoisonError::into_inner);
        window.prune(now);
        window.timestamps.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(capacity: usize, window_secs: u64) -> (RateLimiter, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        let limiter = RateLimiter::with_clock(
            RateLimitConfig {
                capacity,
                window_secs,
            },
            clock.clone(),
        );
        (limiter, clock)
    }

    #[test]
    fn test_sixth_admission_waits_until_window_expires() {
        let (limiter, clock) = limiter(5, 30);

        for _ in 0..5 {
            let admission = limiter.admit();
            assert!(admission.immediate);
            assert_eq!(admission.wait, Duration::ZERO);
        }

        let sixth = limiter.admit();
        assert!(!sixth.immediate);
        assert_eq!(sixth.wait, Duration::from_secs(30));

        clock.advance(Duration::from_secs(31));
        assert!(limiter.admit().immediate);
    }

    #[test]
    fn test_wait_shrinks_as_time_passes() {
        let (limiter, clock) = limiter(2, 30);

        limiter.admit();
        clock.advance(Duration::from_secs(10));
        limiter.admit();
        clock.advance(Duration::from_secs(5));

        let admission = limiter.admit();
        assert_eq!(admission.wait, Duration::from_secs(15));
    }

    #[test]
    fn test_old_entries_are_pruned() {
        let (limiter, clock) = limiter(3, 30);

        limiter.admit();
        limiter.admit();
        assert_eq!(limiter.in_flight(), 2);

        clock.advance(Duration::from_secs(30));
        assert_eq!(limiter.in_flight(), 0);
    }

    #[test]
    fn test_pending_requests_queue_behind_each_other() {
        let (limiter, _clock) = limiter(1, 30);

        assert!(limiter.admit().immediate);
        assert_eq!(limiter.admit().wait, Duration::from_secs(30));
        assert_eq!(limiter.admit().wait, Duration::from_secs(60));
    }

    #[test]
    fn test_presets() {
        assert_eq!(RateLimitConfig::for_credential(false).capacity, 5);
        assert_eq!(RateLimitConfig::for_credential(true).capacity, 50);
        assert_eq!(RateLimitConfig::default().window_secs, 30);
    }

    #[tokio::test(start_paused = true)]
    async fn test_acquire_sleeps_for_wait() {
        let limiter = RateLimiter::new(RateLimitConfig {
            capacity: 1,
            window_secs: 30,
        });

        let start = tokio::time::Instant::now();
        limiter.acquire().await;
        assert_eq!(start.elapsed(), Duration::ZERO);

        limiter.acquire().await;
        assert!(start.elapsed() >= Duration::from_secs(29));
    }
}
