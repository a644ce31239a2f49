//! Lock-free counters updated by the pacing loop and by waiters.
//!
//! All counters use `Ordering::Relaxed`: they are diagnostics, and nothing
//! synchronizes through them.

use std::sync::atomic::{AtomicU64, Ordering};

/// Counter snapshot returned by [`PacerCounters::snapshot`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CounterSnapshot {
    /// Loop cycles run (each cycle marks one frame ready)
    pub cycles: u64,
    /// Cycles where signaling took longer than the interval
    pub overrun_cycles: u64,
    /// Cycles that proceeded without sleeping
    pub spin_cycles: u64,
    /// Frames consumed through `wait_for_frame`
    pub frames_taken: u64,
    /// Waits released because the pacer stopped
    pub cancelled_waits: u64,
}

impl CounterSnapshot {
    /// Fraction of cycles that overran (0.0 to 1.0).
    #[must_use]
    pub fn overrun_rate(&self) -> f64 {
        if self.cycles == 0 {
            0.0
        } else {
            self.overrun_cycles as f64 / self.cycles as f64
        }
    }
}

/// Atomic counters shared between the pacer, its loop thread and waiters.
#[derive(Debug, Default)]
pub struct PacerCounters {
    cycles: AtomicU64,
    overrun_cycles: AtomicU64,
    spin_cycles: AtomicU64,
    frames_taken: AtomicU64,
    cancelled_waits: AtomicU64,
}

impl PacerCounters {
    /// Create zeroed counters.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            cycles: AtomicU64::new(0),
            overrun_cycles: AtomicU64::new(0),
            spin_cycles: AtomicU64::new(0),
            frames_taken: AtomicU64::new(0),
            cancelled_waits: AtomicU64::new(0),
        }
    }

    /// Record one loop cycle.
    #[inline]
    pub fn record_cycle(&self, overran: bool, slept: bool) {
        self.cycles.fetch_add(1, Ordering::Relaxed);
        if overran {
            self.overrun_cycles.fetch_add(1, Ordering::Relaxed);
        }
        if !slept {
            self.spin_cycles.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record a frame consumed by a waiter.
    #[inline]
    pub fn inc_frame_taken(&self) {
        self.frames_taken.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a wait released by shutdown.
    #[inline]
    pub fn inc_cancelled_wait(&self) {
        self.cancelled_waits.fetch_add(1, Ordering::Relaxed);
    }

    /// Read all counters.
    #[must_use]
    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            cycles: self.cycles.load(Ordering::Relaxed),
            overrun_cycles: self.overrun_cycles.load(Ordering::Relaxed),
            spin_cycles: self.spin_cycles.load(Ordering::Relaxed),
            frames_taken: self.frames_taken.load(Ordering::Relaxed),
            cancelled_waits: self.cancelled_waits.load(Ordering::Relaxed),
        }
    }

    /// Zero all counters.
    pub fn reset(&self) {
        self.cycles.store(0, Ordering::Relaxed);
        self.overrun_cycles.store(0, Ordering::Relaxed);
        self.spin_cycles.store(0, Ordering::Relaxed);
        self.frames_taken.store(0, Ordering::Relaxed);
        self.cancelled_waits.store(0, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_record_cycle() {
        let counters = PacerCounters::new();
        counters.record_cycle(false, true);
        counters.record_cycle(true, true);
        counters.record_cycle(true, false);

        let snapshot = counters.snapshot();
        assert_eq!(snapshot.cycles, 3);
        assert_eq!(snapshot.overrun_cycles, 2);
        assert_eq!(snapshot.spin_cycles, 1);
        assert!((snapshot.overrun_rate() - 2.0 / 3.0).abs() < 1e-10);
    }

    #[test]
    fn test_overrun_rate_empty() {
        assert!(CounterSnapshot::default().overrun_rate().abs() < f64::EPSILON);
    }

    #[test]
    fn test_concurrent_increments() {
        let counters = Arc::new(PacerCounters::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let counters = Arc::clone(&counters);
                thread::spawn(move || {
                    for _ in 0..1_000 {
                        counters.inc_frame_taken();
                        counters.inc_cancelled_wait();
                    }
                })
            })
            .collect();

        for handle in handles {
            assert!(handle.join().is_ok(), "Thread should not panic");
        }

        let snapshot = counters.snapshot();
        assert_eq!(snapshot.frames_taken, 4_000);
        assert_eq!(snapshot.cancelled_waits, 4_000);
    }

    #[test]
    fn test_reset() {
        let counters = PacerCounters::new();
        counters.record_cycle(true, false);
        counters.inc_frame_taken();
        counters.reset();

        assert_eq!(counters.snapshot(), CounterSnapshot::default());
    }
}
