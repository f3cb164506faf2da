//! Time sources for expiry evaluation.
//!
//! Every lifecycle operation reads the time through a [`Clock`] so that
//! expiry and "days remaining" can be tested without waiting on the wall
//! clock.

use chrono::{DateTime, Duration, Utc};
use std::sync::{Mutex, PoisonError};

/// Seconds in one day.
pub const SECS_PER_DAY: i64 = 24 * 60 * 60;

/// A source of the current UTC time.
pub trait Clock: Send + Sync {
    /// Returns the current time.
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

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    /// Creates a clock frozen at `start`.
    #[must_use]
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// Moves the clock forward (or backward, for negative durations).
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now += by;
    }

    /// Moves the clock forward by whole days.
    pub fn advance_days(&self, days: i64) {
        self.advance(Duration::days(days));
    }

    /// Jumps to an absolute time.
    pub fn set(&self, to: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner) = to;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Whole days from `now` until `until`, rounded toward negative infinity.
///
/// A license expiring in 36 hours has 1 day left; one that expired
/// 1 hour ago has -1.
#[must_use]
pub fn days_between(now: DateTime<Utc>, until: DateTime<Utc>) -> i64 {
    (until - now).num_seconds().div_euclid(SECS_PER_DAY)
}
