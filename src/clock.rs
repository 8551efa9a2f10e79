// Copyright (C) 2024 Matthew Waters <matthew@centricular.com>
//
// Licensed under the MIT license <LICENSE-MIT> or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Monotonic time sources used for delays, flashing and display timeouts

use std::cell::Cell;
use std::rc::Rc;
use std::time::{Duration, Instant};

/// A monotonic time source
pub trait Clock {
    /// The time elapsed since an arbitrary, fixed origin
    fn now(&self) -> Duration;
}

/// A [`Clock`] backed by [`Instant`]
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    start: Instant,
}

impl SystemClock {
    /// Construct a new [`SystemClock`] with its origin at the current instant
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.start.elapsed()
    }
}

/// A [`Clock`] that only moves when told to.  Clones share the same time.
///
/// # Examples
/// ```
/// # use cea_caption_decoder::*;
/// # use std::time::Duration;
/// let clock = ManualClock::default();
/// let shared = clock.clone();
/// clock.advance(Duration::from_millis(250));
/// assert_eq!(shared.now(), Duration::from_millis(250));
/// ```
#[derive(Debug, Default, Clone)]
pub struct ManualClock(Rc<Cell<Duration>>);

impl ManualClock {
    /// Move the clock forward by `duration`
    pub fn advance(&self, duration: Duration) {
        self.0.set(self.0.get() + duration);
    }

    /// Set the current time
    pub fn set(&self, now: Duration) {
        self.0.set(now);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        self.0.get()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::tests::*;

    #[test]
    fn system_clock_monotonic() {
        test_init_log();
        let clock = SystemClock::new();
        let first = clock.now();
        let second = clock.now();
        assert!(second >= first);
    }

    #[test]
    fn manual_clock_set() {
        test_init_log();
        let clock = ManualClock::default();
        assert_eq!(clock.now(), Duration::ZERO);
        clock.set(Duration::from_secs(3));
        clock.advance(Duration::from_secs(1));
        assert_eq!(clock.now(), Duration::from_secs(4));
    }
}
