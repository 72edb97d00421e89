//! Wall-clock and boot-relative time sources.
//!
//! Native fixes carry two notions of time: a wall-clock timestamp that the
//! user or the OS may adjust at any moment, and an elapsed-since-boot value
//! from a monotonic clock. The [`Clock`] trait exposes both for the current
//! instant so the normalizer can translate boot-relative capture times into
//! epoch milliseconds.

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Instant;

/// Source of the current time.
pub trait Clock: Send + Sync {
    /// Current wall-clock time in epoch milliseconds.
    fn now_millis(&self) -> i64;

    /// Milliseconds elapsed on the monotonic boot clock.
    fn since_boot_millis(&self) -> i64;

    /// Epoch milliseconds at which the boot clock read zero.
    fn boot_time_millis(&self) -> i64 {
        self.now_millis() - self.since_boot_millis()
    }
}

/// Clock backed by the system wall clock and a monotonic [`Instant`].
///
/// The monotonic origin is the moment the clock was created, which is the
/// closest portable stand-in for the device boot instant.
#[derive(Debug)]
pub struct SystemClock {
    origin: Instant,
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemClock {
    /// Create a new system clock anchored at the current instant.
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }

    fn since_boot_millis(&self) -> i64 {
        self.origin.elapsed().as_millis() as i64
    }
}

/// Manually driven clock for tests and simulations.
///
/// Wall-clock and boot time advance together through [`ManualClock::advance`];
/// [`ManualClock::set_wall_clock`] moves only the wall clock, which is how a
/// user adjusting the device time looks to the normalizer.
#[derive(Debug)]
pub struct ManualClock {
    now_ms: AtomicI64,
    since_boot_ms: AtomicI64,
}

impl ManualClock {
    /// Create a clock reading `now_ms` epoch milliseconds and `since_boot_ms`
    /// on the boot clock.
    pub fn new(now_ms: i64, since_boot_ms: i64) -> Self {
        Self {
            now_ms: AtomicI64::new(now_ms),
            since_boot_ms: AtomicI64::new(since_boot_ms),
        }
    }

    /// Advance both clocks by `ms` milliseconds.
    pub fn advance(&self, ms: i64) {
        self.now_ms.fetch_add(ms, Ordering::SeqCst);
        self.since_boot_ms.fetch_add(ms, Ordering::SeqCst);
    }

    /// Jump the wall clock without touching the boot clock.
    pub fn set_wall_clock(&self, now_ms: i64) {
        self.now_ms.store(now_ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> i64 {
        self.now_ms.load(Ordering::SeqCst)
    }

    fn since_boot_millis(&self) -> i64 {
        self.since_boot_ms.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_advance() {
        let clock = ManualClock::new(1_000_000, 5_000);
        assert_eq!(clock.boot_time_millis(), 995_000);

        clock.advance(250);
        assert_eq!(clock.now_millis(), 1_000_250);
        assert_eq!(clock.since_boot_millis(), 5_250);
        assert_eq!(clock.boot_time_millis(), 995_000);
    }

    #[test]
    fn test_wall_clock_jump_moves_boot_time() {
        let clock = ManualClock::new(1_000_000, 5_000);
        clock.set_wall_clock(2_000_000);
        assert_eq!(clock.since_boot_millis(), 5_000);
        assert_eq!(clock.boot_time_millis(), 1_995_000);
    }

    #[test]
    fn test_system_clock_is_monotonic() {
        let clock = SystemClock::new();
        let a = clock.since_boot_millis();
        let b = clock.since_boot_millis();
        assert!(b >= a);
        assert!(clock.now_millis() > 0);
    }
}
