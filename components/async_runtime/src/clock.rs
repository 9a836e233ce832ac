//! Monotonic time sources for macrotask due-times.
//!
//! The scheduler never reads wall-clock time on its own: the host hands it a
//! [`Clock`]. [`ManualClock`] is a virtual clock for tests and headless runs,
//! [`SystemClock`] follows `Instant` and blocks in [`Clock::wait_until`].

use std::cell::Cell;
use std::fmt;
use std::time::{Duration, Instant};

/// A monotonic time source, measured as elapsed time since the clock's origin.
pub trait Clock {
    /// Current time. Never decreases.
    fn now(&self) -> Duration;

    /// Blocks (or jumps) until `now() >= deadline`.
    ///
    /// Called by [`Scheduler::drain_all`](crate::Scheduler::drain_all) when
    /// the earliest macrotask is not yet due.
    fn wait_until(&self, deadline: Duration);
}

/// A virtual clock that only moves when told to.
///
/// # Examples
///
/// ```
/// use async_runtime::{Clock, ManualClock};
/// use std::time::Duration;
///
/// let clock = ManualClock::new();
/// clock.advance(Duration::from_millis(100));
/// clock.advance_to(Duration::from_millis(50)); // never goes backward
/// assert_eq!(clock.now(), Duration::from_millis(100));
/// ```
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Cell<Duration>,
}

impl ManualClock {
    /// Creates a clock at time zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves the clock forward by `by`, stopping at `Duration::MAX`.
    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get().saturating_add(by));
    }

    /// Moves the clock to `to`, unless it is already past it.
    pub fn advance_to(&self, to: Duration) {
        if to > self.now.get() {
            self.now.set(to);
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        self.now.get()
    }

    fn wait_until(&self, deadline: Duration) {
        self.advance_to(deadline);
    }
}

/// A clock backed by [`Instant`], starting at zero when created.
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    /// Creates a clock whose origin is now.
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SystemClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SystemClock")
            .field("elapsed", &self.origin.elapsed())
            .finish()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }

    fn wait_until(&self, deadline: Duration) {
        let now = self.now();
        if deadline > now {
            std::thread::sleep(deadline - now);
        }
    }
}
