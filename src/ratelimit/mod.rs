//! Sliding-window admission gate for outbound calls.
//!
//! A [`RateLimiter`] admits at most `ceiling` calls in any trailing window
//! (60 seconds by default). When the window is full the caller is suspended
//! until the oldest admission leaves the window; nothing is ever rejected.
//!
//! Two admission modes exist:
//! - [`RateLimiter::acquire`] waits once and then admits unconditionally. If
//!   several callers wake together they may all admit into the same freed
//!   slot, so the window can briefly exceed the ceiling.
//! - [`RateLimiter::acquire_exclusive`] holds the limiter for the whole
//!   prune/wait/record sequence and re-checks after waking, so the ceiling
//!   is never exceeded and waiters are admitted in arrival order.

use std::collections::VecDeque;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::error::ResilienceError;

/// Length of the default admission window.
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(60);

/// Snapshot of a limiter's window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitStatus {
    /// Admissions still inside the window.
    pub used: u32,
    /// Admissions left before callers start waiting.
    pub available: u32,
    /// The configured ceiling.
    pub limit: u32,
    /// Time until the oldest admission leaves the window; zero when empty.
    pub reset_in: Duration,
}

impl RateLimitStatus {
    pub fn reset_in_ms(&self) -> u64 {
        self.reset_in.as_millis() as u64
    }
}

/// Window-based admission gate. Share it behind an `Arc` per logical channel.
#[derive(Debug)]
pub struct RateLimiter {
    ceiling: u32,
    window: Duration,
    admissions: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    /// Creates a limiter admitting `ceiling` calls per minute.
    pub fn new(ceiling: u32) -> Result<Self, ResilienceError> {
        Self::with_window(ceiling, DEFAULT_WINDOW)
    }

    /// Creates a limiter with a custom window length.
    pub fn with_window(ceiling: u32, window: Duration) -> Result<Self, ResilienceError> {
        if ceiling == 0 {
            return Err(ResilienceError::ZeroCeiling);
        }
        if window.is_zero() {
            return Err(ResilienceError::ZeroWindow);
        }
        Ok(Self {
            ceiling,
            window,
            admissions: Mutex::new(VecDeque::with_capacity(ceiling as usize)),
        })
    }

    pub fn ceiling(&self) -> u32 {
        self.ceiling
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Waits until admission is safe, then records the admission.
    ///
    /// Waits at most once. The lock is released while waiting, so other
    /// callers can still read the status or be admitted.
    pub async fn acquire(&self) {
        let wait = {
            let mut admissions = self.admissions.lock().await;
            let now = Instant::now();
            self.prune(&mut admissions, now);
            self.wait_for_slot(&admissions, now)
        };

        if let Some(wait) = wait {
            warn!(
                ceiling = self.ceiling,
                wait_ms = wait.as_millis() as u64,
                "Rate limit reached. Waiting {}s",
                wait.as_secs_f64().ceil() as u64
            );
            tokio::time::sleep(wait).await;
        }

        let mut admissions = self.admissions.lock().await;
        admissions.push_back(Instant::now());
        debug!(used = admissions.len(), ceiling = self.ceiling, "admitted call");
    }

    /// Waits until a slot is free and records the admission without ever exceeding the ceiling.
    pub async fn acquire_exclusive(&self) {
        let mut admissions = self.admissions.lock().await;
        loop {
            let now = Instant::now();
            self.prune(&mut admissions, now);

            match self.wait_for_slot(&admissions, now) {
                None => {
                    admissions.push_back(now);
                    debug!(used = admissions.len(), ceiling = self.ceiling, "admitted call");
                    return;
                }
                Some(wait) => {
                    warn!(
                        ceiling = self.ceiling,
                        wait_ms = wait.as_millis() as u64,
                        "Rate limit reached. Holding admission for {}ms",
                        wait.as_millis()
                    );
                    tokio::time::sleep(wait).await;
                }
            }
        }
    }

    /// Returns the current window snapshot.
    pub async fn status(&self) -> RateLimitStatus {
        let mut admissions = self.admissions.lock().await;
        let now = Instant::now();
        self.prune(&mut admissions, now);

        let used = admissions.len() as u32;
        let reset_in = admissions
            .front()
            .map(|oldest| self.window.saturating_sub(now.saturating_duration_since(*oldest)))
            .unwrap_or(Duration::ZERO);

        RateLimitStatus {
            used,
            available: self.ceiling.saturating_sub(used),
            limit: self.ceiling,
            reset_in,
        }
    }

    /// Drops admissions that are a full window old or older.
    fn prune(&self, admissions: &mut VecDeque<Instant>, now: Instant) {
        while let Some(oldest) = admissions.front() {
            if now.saturating_duration_since(*oldest) < self.window {
                break;
            }
            admissions.pop_front();
        }
    }

    /// How long to wait for the oldest admission to expire, if the window is full.
    fn wait_for_slot(&self, admissions: &VecDeque<Instant>, now: Instant) -> Option<Duration> {
        if (admissions.len() as u32) < self.ceiling {
            return None;
        }
        admissions
            .front()
            .map(|oldest| self.window.saturating_sub(now.saturating_duration_since(*oldest)))
            .filter(|wait| !wait.is_zero())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_zero_ceiling_rejected() {
        assert_eq!(RateLimiter::new(0).unwrap_err(), ResilienceError::ZeroCeiling);
        assert_eq!(
            RateLimiter::with_window(1, Duration::ZERO).unwrap_err(),
            ResilienceError::ZeroWindow
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_fresh_limiter_status() {
        let limiter = RateLimiter::new(5).unwrap();
        let status = limiter.status().await;
        assert_eq!(
            status,
            RateLimitStatus {
                used: 0,
                available: 5,
                limit: 5,
                reset_in: Duration::ZERO,
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_admissions_fill_window() {
        let limiter = RateLimiter::new(2).unwrap();
        limiter.acquire().await;
        limiter.acquire().await;

        let status = limiter.status().await;
        assert_eq!(status.used, 2);
        assert_eq!(status.available, 0);
        assert_eq!(status.reset_in, Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn test_third_acquire_waits_for_oldest_to_expire() {
        let limiter = RateLimiter::new(2).unwrap();
        let start = Instant::now();
        limiter.acquire().await;
        limiter.acquire().await;

        tokio::time::advance(Duration::from_secs(10)).await;
        limiter.acquire().await;

        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(60), "{:?}", elapsed);
        assert!(elapsed < Duration::from_secs(61), "{:?}", elapsed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_old_admissions_are_pruned() {
        let limiter = RateLimiter::new(3).unwrap();
        limiter.acquire().await;
        tokio::time::advance(Duration::from_secs(61)).await;

        let status = limiter.status().await;
        assert_eq!(status.used, 0);
        assert_eq!(status.available, 3);
        assert_eq!(status.reset_in, Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_in_tracks_oldest_admission() {
        let limiter = RateLimiter::new(3).unwrap();
        limiter.acquire().await;
        tokio::time::advance(Duration::from_secs(15)).await;
        limiter.acquire().await;

        let status = limiter.status().await;
        assert_eq!(status.used, 2);
        assert_eq!(status.reset_in, Duration::from_secs(45));
        assert_eq!(status.reset_in_ms(), 45_000);
    }

    #[tokio::test(start_paused = true)]
    async fn test_admission_exactly_one_window_old_is_pruned() {
        let limiter = RateLimiter::new(1).unwrap();
        limiter.acquire().await;
        tokio::time::advance(Duration::from_secs(60)).await;

        let start = Instant::now();
        limiter.acquire().await;
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_wait_can_overfill_window() {
        let limiter = Arc::new(RateLimiter::new(1).unwrap());
        limiter.acquire().await;

        let a = tokio::spawn({
            let limiter = limiter.clone();
            async move { limiter.acquire().await }
        });
        let b = tokio::spawn({
            let limiter = limiter.clone();
            async move { limiter.acquire().await }
        });
        a.await.unwrap();
        b.await.unwrap();

        // both waiters woke for the same freed slot
        assert_eq!(limiter.status().await.used, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exclusive_acquire_never_exceeds_ceiling() {
        let limiter = Arc::new(RateLimiter::new(1).unwrap());
        let start = Instant::now();
        limiter.acquire_exclusive().await;

        let a = tokio::spawn({
            let limiter = limiter.clone();
            async move { limiter.acquire_exclusive().await }
        });
        let b = tokio::spawn({
            let limiter = limiter.clone();
            async move { limiter.acquire_exclusive().await }
        });
        a.await.unwrap();
        b.await.unwrap();

        // the second waiter needed a second full window
        assert!(start.elapsed() >= Duration::from_secs(120));
        assert_eq!(limiter.status().await.used, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_custom_window() {
        let limiter = RateLimiter::with_window(1, Duration::from_secs(1)).unwrap();
        let start = Instant::now();
        limiter.acquire().await;
        limiter.acquire().await;
        assert!(start.elapsed() >= Duration::from_secs(1));
        assert_eq!(limiter.window(), Duration::from_secs(1));
        assert_eq!(limiter.ceiling(), 1);
    }
}
