//! Monotonic logical clock for per-device timestamps.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// A wall-clock-seeded logical clock that never moves backwards.
///
/// Timestamps are unix milliseconds, bumped by one when the wall clock
/// stalls or steps back. This gives each device strictly increasing
/// `created_at`/`updated_at` values, which the conflict resolver and the
/// FIFO replay order depend on.
#[derive(Debug, Default)]
pub struct LogicalClock {
    last: AtomicU64,
}

impl LogicalClock {
    /// Creates a clock starting from the current wall time.
    pub fn new() -> Self {
        Self {
            last: AtomicU64::new(0),
        }
    }

    /// Creates a clock that will never return a value at or below `floor`.
    ///
    /// Used when reopening a persisted log so new timestamps stay ahead
    /// of everything already journaled.
    pub fn starting_after(floor: u64) -> Self {
        Self {
            last: AtomicU64::new(floor),
        }
    }

    /// Returns the next timestamp, strictly greater than all previous ones.
    pub fn next(&self) -> u64 {
        let wall = wall_millis();
        let mut prev = self.last.load(Ordering::Relaxed);
        loop {
            let candidate = wall.max(prev + 1);
            match self.last.compare_exchange_weak(
                prev,
                candidate,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => return candidate,
                Err(observed) => prev = observed,
            }
        }
    }
}

fn wall_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn strictly_increasing() {
        let clock = LogicalClock::new();
        let mut prev = 0;
        for _ in 0..1000 {
            let t = clock.next();
            assert!(t > prev);
            prev = t;
        }
    }

    #[test]
    fn respects_floor() {
        let floor = wall_millis() + 1_000_000;
        let clock = LogicalClock::starting_after(floor);
        assert!(clock.next() > floor);
    }

    #[test]
    fn concurrent_ticks_are_unique() {
        let clock = Arc::new(LogicalClock::new());
        let mut handles = Vec::new();
        for _ in 0..4 {
            let clock = Arc::clone(&clock);
            handles.push(thread::spawn(move || {
                (0..250).map(|_| clock.next()).collect::<Vec<_>>()
            }));
        }

        let mut all: Vec<u64> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        let len = all.len();
        all.sort_unstable();
        all.dedup();
        assert_eq!(all.len(), len);
    }
}
