//! Clock and progress ticker.
//! Wall-clock time is only used to compute the delay; elapsed progress is
//! measured on tokio's monotonic clock so it never goes backwards.

use std::time::Duration;

use chrono::{DateTime, Utc};
use delaysend_core::types::ProgressSample;
use tokio::time::{Instant, Interval, MissedTickBehavior};

/// Source of "now" for computing remaining delays.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// The system wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// `max(0, scheduled_at - now)`.
pub fn remaining_delay(scheduled_at: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    (scheduled_at - now).to_std().unwrap_or(Duration::ZERO)
}

/// Periodic progress signal for one waiting task.
///
/// The first tick fires one period after creation, so a task whose deadline
/// has already passed never observes a tick.
pub struct Ticker {
    message_id: i64,
    started: Instant,
    total: Duration,
    interval: Interval,
    last_elapsed: u64,
}

impl Ticker {
    pub fn new(message_id: i64, period: Duration, total: Duration) -> Self {
        let started = Instant::now();
        let mut interval = tokio::time::interval_at(started + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        Self {
            message_id,
            started,
            total,
            interval,
            last_elapsed: 0,
        }
    }

    /// Wait for the next tick and produce a sample.
    pub async fn tick(&mut self) -> ProgressSample {
        self.interval.tick().await;
        self.sample()
    }

    /// Current progress, clamped to the total and never below the previous
    /// sample.
    pub fn sample(&mut self) -> ProgressSample {
        let total_millis = self.total.as_millis() as u64;
        let elapsed = self.started.elapsed().as_millis() as u64;
        let elapsed_millis = elapsed.min(total_millis).max(self.last_elapsed);
        self.last_elapsed = elapsed_millis;
        ProgressSample {
            message_id: self.message_id,
            elapsed_millis,
            total_millis,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remaining_delay_never_negative() {
        let now = Utc::now();
        assert_eq!(remaining_delay(now - chrono::Duration::seconds(5), now), Duration::ZERO);
        assert_eq!(remaining_delay(now, now), Duration::ZERO);
        assert_eq!(
            remaining_delay(now + chrono::Duration::milliseconds(1500), now),
            Duration::from_millis(1500)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticks_are_monotonic_and_clamped() {
        let mut ticker = Ticker::new(1, Duration::from_millis(100), Duration::from_millis(250));
        let mut last = 0;
        for _ in 0..5 {
            let sample = ticker.tick().await;
            assert!(sample.elapsed_millis >= last);
            assert!(sample.elapsed_millis <= sample.total_millis);
            last = sample.elapsed_millis;
        }
        assert_eq!(last, 250);
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_tick_waits_one_period() {
        let start = Instant::now();
        let mut ticker = Ticker::new(1, Duration::from_millis(100), Duration::from_secs(1));
        let sample = ticker.tick().await;
        assert!(start.elapsed() >= Duration::from_millis(100));
        assert!((100..=101).contains(&sample.elapsed_millis));
    }
}
