//! Property-based tests for drift correction, jitter tracking and interval math.

use frame_pacer::{
    CorrectionConfig, DriftCorrector, PacerConfig, PeriodJitter, interval_ms_for_fps,
};
use proptest::prelude::*;
use quickcheck_macros::quickcheck;
use std::time::Duration;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    /// Under the bounded policy the effective interval never leaves
    /// `[nominal / 2, nominal]`, whatever the signaling cost.
    #[test]
    fn prop_bounded_interval_stays_in_range(
        nominal_ms in 1u64..=1_000,
        frames_us in proptest::collection::vec(0u64..5_000_000, 1..200),
        gain in 0.0f64..=1.0,
        decay in 0.0f64..=1.0,
    ) {
        let nominal_ns = (nominal_ms * 1_000_000) as i64;
        let config = CorrectionConfig::bounded().with_gains(gain, decay);
        let mut corrector = DriftCorrector::new(Duration::from_millis(nominal_ms), &config);

        for frame_us in frames_us {
            let correction = corrector.observe(Duration::from_micros(frame_us));
            prop_assert!(correction.next_interval_ns >= nominal_ns / 2,
                "interval {} below half of nominal {}", correction.next_interval_ns, nominal_ns);
            prop_assert!(correction.next_interval_ns <= nominal_ns,
                "interval {} above nominal {}", correction.next_interval_ns, nominal_ns);
            prop_assert!(!corrector.is_collapsed());
        }
    }

    /// Sleep plus overrun always account for the whole interval.
    #[test]
    fn prop_sleep_and_overrun_partition_interval(
        nominal_ms in 1u64..=100,
        frame_us in 0u64..200_000,
    ) {
        let mut corrector = DriftCorrector::new(
            Duration::from_millis(nominal_ms),
            &CorrectionConfig::default(),
        );
        let correction = corrector.observe(Duration::from_micros(frame_us));
        let frame_ns = (frame_us * 1_000) as i64;

        prop_assert_eq!(correction.sleep_ns, correction.interval_ns - frame_ns);
        prop_assert_eq!(correction.overrun_ns, -correction.sleep_ns);
        prop_assert_eq!(correction.sleep().is_some(), correction.sleep_ns > 0);
    }

    /// The cumulative policy never lengthens the interval.
    #[test]
    fn prop_cumulative_interval_is_non_increasing(
        nominal_ms in 1u64..=100,
        frames_us in proptest::collection::vec(0u64..200_000, 1..100),
    ) {
        let mut corrector = DriftCorrector::new(
            Duration::from_millis(nominal_ms),
            &CorrectionConfig::cumulative(),
        );

        let mut previous = corrector.interval_ns();
        for frame_us in frames_us {
            let correction = corrector.observe(Duration::from_micros(frame_us));
            prop_assert!(correction.next_interval_ns <= previous);
            if !correction.overran() {
                prop_assert_eq!(correction.next_interval_ns, previous);
            }
            previous = correction.next_interval_ns;
        }
    }

    /// Valid frame rates always produce a configuration that validates.
    #[test]
    fn prop_positive_fps_config_is_valid(fps in 1u32..=u32::MAX) {
        let config = PacerConfig::with_fps(fps);
        prop_assert!(config.validate().is_ok());
        prop_assert!(config.nominal_interval_ms() >= 1);
    }
}

#[quickcheck]
fn interval_is_at_least_one_ms(fps: u32) -> bool {
    interval_ms_for_fps(fps) >= 1
}

#[quickcheck]
fn interval_matches_integer_division(fps: u16) -> bool {
    let fps = u32::from(fps.clamp(1, 1_000));
    interval_ms_for_fps(fps) == u64::from(1_000 / fps)
}

#[quickcheck]
fn interval_is_non_increasing_in_fps(a: u32, b: u32) -> bool {
    let (low, high) = if a <= b { (a, b) } else { (b, a) };
    interval_ms_for_fps(low.max(1)) >= interval_ms_for_fps(high.max(1))
}

#[quickcheck]
fn jitter_percentiles_are_ordered(periods_us: Vec<u32>) {
    let mut jitter = PeriodJitter::with_capacity(256);
    for period_us in &periods_us {
        jitter.record_period(Duration::from_micros(u64::from(*period_us)), 16_000_000);
    }

    let report = jitter.report();
    assert_eq!(report.total_periods, periods_us.len() as u64);
    assert!(report.p50_jitter_ns <= report.p95_jitter_ns);
    assert!(report.p95_jitter_ns <= report.p99_jitter_ns);
    assert!(report.p99_jitter_ns <= report.max_jitter_ns);
    assert!(report.late_periods <= report.total_periods);
}
