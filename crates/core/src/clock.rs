// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Clock abstraction so cooldown/rate-limit/heartbeat timing is testable.

use std::sync::Arc;
use std::time::{Duration, Instant};

/// A source of the current time, abstracted so tests can control it.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;

    /// Wall-clock timestamp in milliseconds since the Unix epoch.
    fn now_millis(&self) -> i64;
}

/// Real wall-clock time.
#[derive(Debug, Clone, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn now_millis(&self) -> i64 {
        match std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH) {
            Ok(d) => d.as_millis() as i64,
            Err(_) => 0,
        }
    }
}

/// A clock that only advances when told to, for deterministic tests of
/// cooldowns, rate limits and sweep intervals.
pub struct FakeClock {
    base: Instant,
    offset: parking_lot::Mutex<Duration>,
    millis: parking_lot::Mutex<i64>,
}

impl FakeClock {
    pub fn new() -> Self {
        Self { base: Instant::now(), offset: parking_lot::Mutex::new(Duration::ZERO), millis: parking_lot::Mutex::new(0) }
    }

    pub fn advance(&self, by: Duration) {
        *self.offset.lock() += by;
        *self.millis.lock() += by.as_millis() as i64;
    }

    pub fn set_millis(&self, millis: i64) {
        *self.millis.lock() = millis;
    }
}

impl Default for FakeClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for FakeClock {
    fn now(&self) -> Instant {
        self.base + *self.offset.lock()
    }

    fn now_millis(&self) -> i64 {
        *self.millis.lock()
    }
}

pub type SharedClock = Arc<dyn Clock>;

pub fn system_clock() -> SharedClock {
    Arc::new(SystemClock)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fake_clock_advances_on_demand() {
        let clock = FakeClock::new();
        let t0 = clock.now();
        clock.advance(Duration::from_secs(5));
        assert_eq!(clock.now() - t0, Duration::from_secs(5));
    }

    #[test]
    fn fake_clock_millis_is_independent_of_instant_base() {
        let clock = FakeClock::new();
        clock.set_millis(1_000);
        clock.advance(Duration::from_secs(1));
        assert_eq!(clock.now_millis(), 2_000);
    }
}
