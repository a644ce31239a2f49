//! Drift correction for the pacing loop.
//!
//! The loop measures how long signaling a frame took and feeds that into a
//! [`DriftCorrector`], which decides the interval used for the next cycle.
//! Two policies are supported, see [`CorrectionPolicy`].

use std::time::Duration;

use crate::config::{CorrectionConfig, CorrectionPolicy, MAX_CORRECTION_FRACTION};

/// Convert a duration to signed nanoseconds, saturating at `i64::MAX`.
#[inline]
pub(crate) fn duration_ns(duration: Duration) -> i64 {
    i64::try_from(duration.as_nanos()).unwrap_or(i64::MAX)
}

/// Outcome of one correction step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Correction {
    /// Interval the cycle was measured against, in nanoseconds.
    pub interval_ns: i64,
    /// `interval - frame_duration`; the loop sleeps only when positive.
    pub sleep_ns: i64,
    /// `frame_duration - interval`; positive means the cycle overran.
    pub overrun_ns: i64,
    /// Interval to use for the next cycle, in nanoseconds.
    pub next_interval_ns: i64,
    /// The bounded offset hit its clamp this cycle.
    pub saturated: bool,
}

impl Correction {
    /// Sleep required before the next cycle, if any.
    #[inline]
    #[must_use]
    pub fn sleep(&self) -> Option<Duration> {
        u64::try_from(self.sleep_ns)
            .ok()
            .filter(|ns| *ns > 0)
            .map(Duration::from_nanos)
    }

    /// Whether signaling took longer than the interval.
    #[inline]
    #[must_use]
    pub fn overran(&self) -> bool {
        self.overrun_ns > 0
    }
}

/// Adaptive interval correction.
///
/// Under [`CorrectionPolicy::Bounded`] the nominal interval never changes
/// here; overruns against it feed an offset that is recomputed every cycle as
/// `offset * decay + gain * overrun` and clamped to half the nominal interval.
/// Only overruns feed the offset, so the effective interval stays within
/// `[nominal / 2, nominal]`.
///
/// Under [`CorrectionPolicy::Cumulative`] each overrun is subtracted from the
/// interval for good. Nothing stops the interval from reaching zero or going
/// negative; [`is_collapsed`](Self::is_collapsed) reports when it has.
#[derive(Debug, Clone)]
pub struct DriftCorrector {
    policy: CorrectionPolicy,

    /// Share of each overrun folded into the offset
    gain: f64,

    /// Share of the previous offset kept each cycle
    decay: f64,

    /// Interval derived from the target frame rate
    nominal_ns: i64,

    /// Bounded correction offset
    offset_ns: f64,

    /// Effective interval for the next cycle
    interval_ns: i64,

    /// Cycles observed since the last reset
    sample_count: u64,
}

impl DriftCorrector {
    /// Create a corrector for `nominal` using `config`.
    ///
    /// Gains are normalized, so out-of-range values are clamped rather than rejected.
    #[must_use]
    pub fn new(nominal: Duration, config: &CorrectionConfig) -> Self {
        let mut config = config.clone();
        config.normalize();

        let nominal_ns = duration_ns(nominal).max(1);
        Self {
            policy: config.policy,
            gain: config.gain,
            decay: config.decay,
            nominal_ns,
            offset_ns: 0.0,
            interval_ns: nominal_ns,
            sample_count: 0,
        }
    }

    /// Feed one measured signaling duration.
    ///
    /// Sleep and overrun are computed against the current interval; the
    /// correction then determines the interval for the next cycle.
    pub fn observe(&mut self, frame_duration: Duration) -> Correction {
        let frame_ns = duration_ns(frame_duration);
        let interval_ns = self.interval_ns;
        let sleep_ns = interval_ns.saturating_sub(frame_ns);
        let overrun_ns = frame_ns.saturating_sub(interval_ns);
        let mut saturated = false;

        match self.policy {
            CorrectionPolicy::Cumulative => {
                if overrun_ns > 0 {
                    self.interval_ns = self.interval_ns.saturating_sub(overrun_ns);
                }
            }
            CorrectionPolicy::Bounded => {
                let excess_ns = frame_ns.saturating_sub(self.nominal_ns).max(0);
                let bound = self.offset_bound_ns();
                let raw = self.offset_ns * self.decay + self.gain * excess_ns as f64;

                saturated = raw.abs() > bound;
                self.offset_ns = raw.clamp(-bound, bound);
                self.interval_ns = self
                    .nominal_ns
                    .saturating_sub(self.offset_ns.round() as i64);
            }
        }

        self.sample_count = self.sample_count.saturating_add(1);

        Correction {
            interval_ns,
            sleep_ns,
            overrun_ns,
            next_interval_ns: self.interval_ns,
            saturated,
        }
    }

    /// Largest magnitude the bounded offset may take.
    fn offset_bound_ns(&self) -> f64 {
        self.nominal_ns as f64 * MAX_CORRECTION_FRACTION
    }

    /// Effective interval in nanoseconds (may be `<= 0` under the cumulative policy).
    #[inline]
    #[must_use]
    pub fn interval_ns(&self) -> i64 {
        self.interval_ns
    }

    /// Effective interval in whole milliseconds, truncated toward zero.
    #[inline]
    #[must_use]
    pub fn interval_ms(&self) -> i64 {
        self.interval_ns / 1_000_000
    }

    /// Effective interval as a `Duration`, or `None` once it has collapsed.
    #[must_use]
    pub fn interval(&self) -> Option<Duration> {
        u64::try_from(self.interval_ns)
            .ok()
            .filter(|ns| *ns > 0)
            .map(Duration::from_nanos)
    }

    /// Nominal interval in nanoseconds.
    #[inline]
    #[must_use]
    pub fn nominal_ns(&self) -> i64 {
        self.nominal_ns
    }

    /// Current bounded offset in nanoseconds (always 0 under the cumulative policy).
    #[inline]
    #[must_use]
    pub fn offset_ns(&self) -> f64 {
        self.offset_ns
    }

    /// Active policy.
    #[inline]
    #[must_use]
    pub fn policy(&self) -> CorrectionPolicy {
        self.policy
    }

    /// Number of cycles observed since the last reset.
    #[inline]
    #[must_use]
    pub fn sample_count(&self) -> u64 {
        self.sample_count
    }

    /// The interval has reached zero or below and the loop can no longer sleep.
    #[inline]
    #[must_use]
    pub fn is_collapsed(&self) -> bool {
        self.interval_ns <= 0
    }

    /// Retarget to a new nominal interval and clear all accumulated correction.
    pub fn set_nominal(&mut self, nominal: Duration) {
        self.nominal_ns = duration_ns(nominal).max(1);
        self.reset();
    }

    /// Clear accumulated correction.
    pub fn reset(&mut self) {
        self.offset_ns = 0.0;
        self.interval_ns = self.nominal_ns;
        self.sample_count = 0;
    }
}
