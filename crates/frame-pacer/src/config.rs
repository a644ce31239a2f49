//! Pacer configuration: target frame rate, drift-correction policy and loop thread settings.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{PacerError, PacerResult};

/// Default target frame rate.
pub const DEFAULT_FPS: u32 = 60;

/// Default name of the pacing thread.
pub const DEFAULT_THREAD_NAME: &str = "frame-pacer";

/// Default number of period samples retained for jitter percentiles.
pub const DEFAULT_JITTER_SAMPLES: usize = 1_024;

/// Upper bound on retained jitter samples.
pub const MAX_JITTER_SAMPLES: usize = 1_000_000;

/// Bound on the correction offset as a fraction of the nominal interval.
pub const MAX_CORRECTION_FRACTION: f64 = 0.5;

/// Nominal frame interval in whole milliseconds for `fps`.
///
/// Integer division as in `1000 / fps` (60 fps gives 16 ms). The result is
/// floored at 1 ms so rates above 1000 fps never produce a zero interval.
#[must_use]
pub fn interval_ms_for_fps(fps: u32) -> u64 {
    (1_000 / u64::from(fps.max(1))).max(1)
}

/// How the loop compensates for signaling overhead that exceeds the interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrectionPolicy {
    /// Decaying offset clamped to half the nominal interval either way.
    #[default]
    Bounded,
    /// Every overrun is permanently subtracted from the interval, with no
    /// floor and no decay. Sustained overruns collapse the interval to zero
    /// or below and the loop degenerates into a busy spin.
    Cumulative,
}

impl std::fmt::Display for CorrectionPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CorrectionPolicy::Bounded => write!(f, "bounded"),
            CorrectionPolicy::Cumulative => write!(f, "cumulative"),
        }
    }
}

/// Drift-correction tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorrectionConfig {
    /// Correction policy.
    pub policy: CorrectionPolicy,

    /// Fraction of each overrun added to the offset [0.0, 1.0].
    pub gain: f64,

    /// Fraction of the previous offset retained each cycle [0.0, 1.0].
    pub decay: f64,
}

impl Default for CorrectionConfig {
    fn default() -> Self {
        Self {
            policy: CorrectionPolicy::Bounded,
            gain: 1.0,
            decay: 0.5,
        }
    }
}

impl CorrectionConfig {
    /// Bounded correction with default gains.
    #[must_use]
    pub fn bounded() -> Self {
        Self::default()
    }

    /// Cumulative (unbounded) correction.
    #[must_use]
    pub fn cumulative() -> Self {
        Self {
            policy: CorrectionPolicy::Cumulative,
            ..Self::default()
        }
    }

    /// Set gain and decay.
    #[must_use]
    pub fn with_gains(mut self, gain: f64, decay: f64) -> Self {
        self.gain = gain;
        self.decay = decay;
        self
    }

    /// Clamp gains into range, replacing non-finite values with defaults.
    pub fn normalize(&mut self) {
        let defaults = Self::default();
        self.gain = if self.gain.is_finite() {
            self.gain.clamp(0.0, 1.0)
        } else {
            defaults.gain
        };
        self.decay = if self.decay.is_finite() {
            self.decay.clamp(0.0, 1.0)
        } else {
            defaults.decay
        };
    }

    /// Check gains are finite and within [0.0, 1.0].
    #[must_use]
    pub fn is_valid(&self) -> bool {
        let unit = 0.0..=1.0;
        unit.contains(&self.gain) && unit.contains(&self.decay)
    }
}

/// Frame pacer configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PacerConfig {
    /// Target frame rate (frames per second).
    pub target_fps: u32,

    /// Drift-correction tuning.
    pub correction: CorrectionConfig,

    /// Name given to the pacing thread.
    pub thread_name: String,

    /// Period samples retained for jitter percentiles.
    pub jitter_samples: usize,
}

impl Default for PacerConfig {
    fn default() -> Self {
        Self {
            target_fps: DEFAULT_FPS,
            correction: CorrectionConfig::default(),
            thread_name: DEFAULT_THREAD_NAME.to_string(),
            jitter_samples: DEFAULT_JITTER_SAMPLES,
        }
    }
}

impl PacerConfig {
    /// Default configuration at `fps`.
    #[must_use]
    pub fn with_fps(fps: u32) -> Self {
        Self {
            target_fps: fps,
            ..Self::default()
        }
    }

    /// Nominal interval in whole milliseconds.
    #[must_use]
    pub fn nominal_interval_ms(&self) -> u64 {
        interval_ms_for_fps(self.target_fps)
    }

    /// Nominal interval as a `Duration`.
    #[must_use]
    pub fn nominal_interval(&self) -> Duration {
        Duration::from_millis(self.nominal_interval_ms())
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`PacerError::InvalidConfiguration`] if any value is out of range.
    pub fn validate(&self) -> PacerResult {
        if self.target_fps == 0 {
            return Err(PacerError::invalid_configuration(
                "target_fps must be greater than 0",
            ));
        }
        if self.thread_name.is_empty() {
            return Err(PacerError::invalid_configuration(
                "thread_name must not be empty",
            ));
        }
        if self.thread_name.contains('\0') {
            return Err(PacerError::invalid_configuration(
                "thread_name must not contain NUL bytes",
            ));
        }
        if !self.correction.is_valid() {
            return Err(PacerError::invalid_configuration(
                "correction gain and decay must be within [0.0, 1.0]",
            ));
        }
        if self.jitter_samples > MAX_JITTER_SAMPLES {
            return Err(PacerError::invalid_configuration(format!(
                "jitter_samples must be at most {MAX_JITTER_SAMPLES}"
            )));
        }
        Ok(())
    }

    /// Create a configuration builder.
    #[must_use]
    pub fn builder() -> PacerConfigBuilder {
        PacerConfigBuilder::default()
    }
}

/// Builder for `PacerConfig`.
#[derive(Debug, Default)]
pub struct PacerConfigBuilder {
    config: PacerConfig,
}

impl PacerConfigBuilder {
    /// Set the target frame rate.
    #[must_use]
    pub fn target_fps(mut self, fps: u32) -> Self {
        self.config.target_fps = fps;
        self
    }

    /// Set the drift-correction configuration.
    #[must_use]
    pub fn correction(mut self, correction: CorrectionConfig) -> Self {
        self.config.correction = correction;
        self
    }

    /// Set the correction policy, keeping the current gains.
    #[must_use]
    pub fn correction_policy(mut self, policy: CorrectionPolicy) -> Self {
        self.config.correction.policy = policy;
        self
    }

    /// Set the pacing thread name.
    #[must_use]
    pub fn thread_name(mut self, name: impl Into<String>) -> Self {
        self.config.thread_name = name.into();
        self
    }

    /// Set the number of retained jitter samples.
    #[must_use]
    pub fn jitter_samples(mut self, samples: usize) -> Self {
        self.config.jitter_samples = samples;
        self
    }

    /// Build the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn build(self) -> PacerResult<PacerConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
