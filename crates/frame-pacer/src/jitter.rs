//! Frame period jitter tracking.
//!
//! The pacing loop records the measured time between consecutive frame
//! starts against the interval it was aiming for. Jitter is the absolute
//! difference; a period is *late* when it ran more than half an interval over.

use std::time::Duration;

use crate::config::DEFAULT_JITTER_SAMPLES;
use crate::correction::duration_ns;

/// Summary produced by [`PeriodJitter::report`].
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct JitterReport {
    /// Periods recorded
    pub total_periods: u64,
    /// Periods longer than 1.5x their target
    pub late_periods: u64,
    /// Most recent jitter sample (ns)
    pub last_jitter_ns: u64,
    /// Largest jitter observed (ns)
    pub max_jitter_ns: u64,
    /// Median jitter over retained samples (ns)
    pub p50_jitter_ns: u64,
    /// 95th percentile jitter over retained samples (ns)
    pub p95_jitter_ns: u64,
    /// 99th percentile jitter over retained samples (ns)
    pub p99_jitter_ns: u64,
    /// Root-mean-square jitter over all periods (ns)
    pub rms_jitter_ns: f64,
}

impl JitterReport {
    /// Fraction of periods that were late (0.0 to 1.0).
    #[must_use]
    pub fn late_rate(&self) -> f64 {
        if self.total_periods == 0 {
            0.0
        } else {
            self.late_periods as f64 / self.total_periods as f64
        }
    }
}

/// Period jitter collector backed by a bounded ring buffer.
///
/// `record_period` is O(1) and does not allocate once the buffer is full.
/// Percentiles reuse a scratch buffer and run in O(n) on the retained samples.
#[derive(Debug, Clone)]
pub struct PeriodJitter {
    total_periods: u64,
    late_periods: u64,
    max_jitter_ns: u64,
    last_jitter_ns: u64,

    /// Running sum of squared jitter for RMS
    jitter_sum_squared: f64,

    samples: Vec<u64>,
    max_samples: usize,
    next_sample_index: usize,
    scratch: Vec<u64>,
}

impl Default for PeriodJitter {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_JITTER_SAMPLES)
    }
}

impl PeriodJitter {
    /// Create a collector with the default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a collector retaining up to `max_samples` samples.
    #[must_use]
    pub fn with_capacity(max_samples: usize) -> Self {
        Self {
            total_periods: 0,
            late_periods: 0,
            max_jitter_ns: 0,
            last_jitter_ns: 0,
            jitter_sum_squared: 0.0,
            samples: Vec::with_capacity(max_samples),
            max_samples,
            next_sample_index: 0,
            scratch: Vec::with_capacity(max_samples),
        }
    }

    /// Record one measured period against the interval it targeted.
    ///
    /// A non-positive `expected_ns` (collapsed interval) counts the whole
    /// period as jitter and never marks it late.
    pub fn record_period(&mut self, actual: Duration, expected_ns: i64) {
        let actual_ns = duration_ns(actual);
        let expected_ns = expected_ns.max(0);
        let jitter_ns = actual_ns.abs_diff(expected_ns);
        let late = expected_ns > 0 && actual_ns > expected_ns.saturating_add(expected_ns / 2);

        self.total_periods = self.total_periods.saturating_add(1);
        if late {
            self.late_periods = self.late_periods.saturating_add(1);
        }
        self.max_jitter_ns = self.max_jitter_ns.max(jitter_ns);
        self.last_jitter_ns = jitter_ns;
        self.jitter_sum_squared += (jitter_ns as f64).powi(2);

        if self.max_samples == 0 {
            return;
        }

        if self.samples.len() < self.max_samples {
            self.samples.push(jitter_ns);
        } else if let Some(slot) = self.samples.get_mut(self.next_sample_index) {
            *slot = jitter_ns;
            self.next_sample_index = (self.next_sample_index + 1) % self.max_samples;
        }
    }

    /// Jitter at `percentile` (0.0 to 1.0) over retained samples, 0 when empty.
    pub fn percentile_jitter_ns(&mut self, percentile: f64) -> u64 {
        if self.samples.is_empty() {
            return 0;
        }

        let percentile = if percentile.is_finite() {
            percentile.clamp(0.0, 1.0)
        } else {
            1.0
        };

        self.scratch.clear();
        self.scratch.extend_from_slice(&self.samples);

        let len = self.scratch.len();
        let index = ((len as f64 * percentile) as usize).min(len.saturating_sub(1));
        let (_, value, _) = self.scratch.select_nth_unstable(index);
        *value
    }

    /// Root-mean-square jitter in nanoseconds.
    #[must_use]
    pub fn rms_jitter_ns(&self) -> f64 {
        if self.total_periods == 0 {
            return 0.0;
        }
        (self.jitter_sum_squared / self.total_periods as f64).sqrt()
    }

    /// Number of retained samples.
    #[must_use]
    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    /// Summarize all recorded periods.
    pub fn report(&mut self) -> JitterReport {
        JitterReport {
            total_periods: self.total_periods,
            late_periods: self.late_periods,
            last_jitter_ns: self.last_jitter_ns,
            max_jitter_ns: self.max_jitter_ns,
            p50_jitter_ns: self.percentile_jitter_ns(0.50),
            p95_jitter_ns: self.percentile_jitter_ns(0.95),
            p99_jitter_ns: self.percentile_jitter_ns(0.99),
            rms_jitter_ns: self.rms_jitter_ns(),
        }
    }

    /// Clear all recorded data, keeping capacity.
    pub fn reset(&mut self) {
        self.total_periods = 0;
        self.late_periods = 0;
        self.max_jitter_ns = 0;
        self.last_jitter_ns = 0;
        self.jitter_sum_squared = 0.0;
        self.samples.clear();
        self.next_sample_index = 0;
        self.scratch.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MS: i64 = 1_000_000;

    #[test]
    fn test_record_on_time_period() {
        let mut jitter = PeriodJitter::new();
        jitter.record_period(Duration::from_millis(16), 16 * MS);

        let report = jitter.report();
        assert_eq!(report.total_periods, 1);
        assert_eq!(report.late_periods, 0);
        assert_eq!(report.last_jitter_ns, 0);
    }

    #[test]
    fn test_early_and_late_jitter_are_absolute() {
        let mut jitter = PeriodJitter::new();
        jitter.record_period(Duration::from_millis(15), 16 * MS);
        jitter.record_period(Duration::from_millis(17), 16 * MS);

        let report = jitter.report();
        assert_eq!(report.max_jitter_ns, 1_000_000);
        assert_eq!(report.late_periods, 0);
        assert!((report.rms_jitter_ns - 1_000_000.0).abs() < 1.0);
    }

    #[test]
    fn test_late_period_threshold() {
        let mut jitter = PeriodJitter::new();
        jitter.record_period(Duration::from_millis(24), 16 * MS);
        jitter.record_period(Duration::from_millis(25), 16 * MS);

        let report = jitter.report();
        assert_eq!(report.late_periods, 1);
        assert!((report.late_rate() - 0.5).abs() < 1e-10);
    }

    #[test]
    fn test_collapsed_interval_never_late() {
        let mut jitter = PeriodJitter::new();
        jitter.record_period(Duration::from_micros(3), -5 * MS);

        let report = jitter.report();
        assert_eq!(report.late_periods, 0);
        assert_eq!(report.last_jitter_ns, 3_000);
    }

    #[test]
    fn test_percentiles() {
        let mut jitter = PeriodJitter::with_capacity(100);
        for i in 0..100u64 {
            jitter.record_period(Duration::from_nanos(16_000_000 + i * 1_000), 16 * MS);
        }

        let report = jitter.report();
        assert!(report.p50_jitter_ns <= report.p95_jitter_ns);
        assert!(report.p95_jitter_ns <= report.p99_jitter_ns);
        assert!(report.p99_jitter_ns >= 97_000, "p99 was {}", report.p99_jitter_ns);
        assert!(report.p99_jitter_ns <= report.max_jitter_ns);
    }

    #[test]
    fn test_ring_buffer_keeps_latest() {
        let mut jitter = PeriodJitter::with_capacity(3);
        for i in 1..=5u64 {
            jitter.record_period(Duration::from_nanos(i * 1_000), 0);
        }

        assert_eq!(jitter.sample_count(), 3);
        let mut retained = jitter.samples.clone();
        retained.sort_unstable();
        assert_eq!(retained, vec![3_000, 4_000, 5_000]);
    }

    #[test]
    fn test_zero_capacity() {
        let mut jitter = PeriodJitter::with_capacity(0);
        jitter.record_period(Duration::from_millis(20), 16 * MS);

        assert_eq!(jitter.sample_count(), 0);
        let report = jitter.report();
        assert_eq!(report.total_periods, 1);
        assert_eq!(report.p99_jitter_ns, 0);
    }

    #[test]
    fn test_reset() {
        let mut jitter = PeriodJitter::new();
        jitter.record_period(Duration::from_millis(40), 16 * MS);
        jitter.reset();

        assert_eq!(jitter.report(), JitterReport::default());
    }
}
