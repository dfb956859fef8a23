//! Time source used for cache expiry.

use crate::Timestamp;
use chrono::Utc;

/// Source of the current time.
///
/// The filename cache stamps entries and checks their age through this
/// trait so expiry can be driven deterministically in tests.
pub trait Clock: Send + Sync + std::fmt::Debug {
    fn now(&self) -> Timestamp;
}

/// Wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Utc::now()
    }
}
