//! Time as an injected capability.
//!
//! Token expiry depends on wall-clock time; injecting the clock lets tests
//! simulate expiry deterministically instead of sleeping.

use chrono::{DateTime, Utc};

pub trait Clock: Send + Sync {
    /// Current time.
    fn now(&self) -> DateTime<Utc>;

    /// Current time as a unix timestamp in seconds.
    fn now_unix(&self) -> i64 {
        self.now().timestamp()
    }
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
