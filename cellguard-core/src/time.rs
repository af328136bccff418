//! Clock abstraction for the staleness bookkeeping
//!
//! The engine itself never reads a clock; callers stamp each arriving
//! sample with a [`Timestamp`] from whatever source the platform has (an
//! RTC, a monotonic tick counter, or the host clock). Staleness math only
//! needs deltas, so a monotonic source is enough.

/// Timestamp in milliseconds (epoch or boot, source-dependent)
pub type Timestamp = u64;

/// Source of timestamps for sample stamping
pub trait TimeSource {
    /// Current timestamp in milliseconds
    fn now(&self) -> Timestamp;
}

/// Host clock (requires std)
#[cfg(feature = "std")]
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

#[cfg(feature = "std")]
impl TimeSource for SystemClock {
    fn now(&self) -> Timestamp {
        use std::time::{SystemTime, UNIX_EPOCH};

        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as Timestamp
    }
}

/// Fixed, manually advanced clock for tests
#[derive(Debug, Clone)]
pub struct FixedClock {
    timestamp: Timestamp,
}

impl FixedClock {
    /// Start the clock at a timestamp
    pub fn new(timestamp: Timestamp) -> Self {
        Self { timestamp }
    }

    /// Move the clock forward
    pub fn advance(&mut self, ms: u64) {
        self.timestamp += ms;
    }
}

impl TimeSource for FixedClock {
    fn now(&self) -> Timestamp {
        self.timestamp
    }
}
