//! Settable clock for testing token expiry.

use std::sync::RwLock;

use chrono::{DateTime, TimeZone, Utc};

use crate::auth::Clock;

/// Clock frozen at a settable instant.
///
/// Share one instance (via `Arc`) between the code under test and the
/// test body, then advance it to simulate expiry without sleeping.
#[derive(Debug)]
pub struct FixedClock {
    now: RwLock<DateTime<Utc>>,
}

impl FixedClock {
    /// Create a clock frozen at the given instant.
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: RwLock::new(now),
        }
    }

    /// Create a clock frozen at a unix timestamp in seconds.
    pub fn at_unix(timestamp: i64) -> Self {
        Self::new(Utc.timestamp_opt(timestamp, 0).unwrap())
    }

    /// Move the clock to the given instant.
    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.write().unwrap_or_else(|e| e.into_inner()) = now;
    }

    /// Advance the clock by whole seconds (negative moves it back).
    pub fn advance_secs(&self, secs: i64) {
        let mut now = self.now.write().unwrap_or_else(|e| e.into_inner());
        *now += chrono::Duration::seconds(secs);
    }
}

impl Default for FixedClock {
    fn default() -> Self {
        Self::at_unix(1_700_000_000)
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.read().unwrap_or_else(|e| e.into_inner())
    }
}
