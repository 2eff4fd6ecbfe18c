//! Test clock — deterministic `Clock` implementation for tests.

use chrono::{DateTime, Duration, Utc};
use siteline_core::clock::Clock;

/// A clock that always returns a fixed point in time, so audit stamps and
/// envelope timestamps are assertable.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl FixedClock {
    /// The same clock moved forward by `duration`. Handy for asserting
    /// that a later command touches only the modification stamps.
    #[must_use]
    pub fn advanced(self, duration: Duration) -> Self {
        Self(self.0 + duration)
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}
