// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Monotonic nanosecond clock (conc.core/CK1).
//!
//! Deadlines are computed as `created_at_nanos + timeout_nanos` against this
//! clock, never against wall-clock time, so they are immune to clock step
//! adjustments. Injectable so tests can run deterministically instead of
//! against real elapsed time.

use std::sync::OnceLock;
use std::time::Instant;

/// A monotonic nanosecond time source.
pub trait Clock: Send + Sync {
    /// Current reading, in nanoseconds, relative to an arbitrary but fixed
    /// epoch. Only meaningful relative to other readings from the same
    /// `Clock`.
    fn now_nanos(&self) -> u64;
}

/// The real wall clock, backed by `std::time::Instant`. Nanoseconds are
/// measured from the first call to `now_nanos` on any `SystemClock`
/// instance in the process (there is exactly one underlying epoch; each
/// `SystemClock` value is just a cheap handle to it).
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

fn epoch() -> Instant {
    static EPOCH: OnceLock<Instant> = OnceLock::new();
    *EPOCH.get_or_init(Instant::now)
}

impl Clock for SystemClock {
    fn now_nanos(&self) -> u64 {
        epoch().elapsed().as_nanos() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn monotonic_non_decreasing() {
        let clock = SystemClock;
        let a = clock.now_nanos();
        std::thread::sleep(std::time::Duration::from_millis(1));
        let b = clock.now_nanos();
        assert!(b >= a);
    }

    #[test]
    fn distinct_handles_share_epoch() {
        let a = SystemClock.now_nanos();
        let b = SystemClock.now_nanos();
        assert!(b >= a);
    }
}
