//! Ambient pressure tracking from the same sensor that sees the gestures.
//!
//! Absolute pressure drifts by hundreds of pascal with weather and altitude,
//! more than a weak gesture, so the baseline has to be tracked. Without a
//! second reference sensor, the filter relies on gestures being large and
//! brief compared to drift: each reading is weighted by how close it is to
//! the current estimate, so a sip or puff barely moves the baseline while
//! slow drift is followed. Large deviations keep a small weight, which lets
//! a badly bootstrapped estimate still converge within minutes.

use serde::{Deserialize, Serialize};

use crate::config::ConfigError;

/// Estimate used until the first reading arrives.
pub const INITIAL_ESTIMATE_PA: f64 = 97_500.0;

/// Below this many observations the estimate snaps to the next reading.
const BOOTSTRAP_OBSERVATIONS: u32 = 10;
/// Observation credit granted when snapping.
const BOOTSTRAP_CREDIT: u32 = 100;
/// Cap on the observation count, so the estimate never stops adapting.
const OBSERVATION_LIMIT: u32 = 2_000;
/// Upper bound on the weight of a single reading.
const MAX_WEIGHT: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Width of the window (Pa) around the estimate inside which readings
    /// are trusted at full weight. Past it, weight falls off as 1/deviation.
    pub expected_variance_pa: f64,
}

impl FilterConfig {
    /// A non-positive variance would give readings negative weights.
    pub fn validate(&self) -> Result<(), ConfigError> {
        // Written so that NaN fails too.
        if !(self.expected_variance_pa > 0.0) {
            return Err(ConfigError::NotPositive {
                field: "expected_variance_pa",
            });
        }
        Ok(())
    }
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            expected_variance_pa: 100.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AmbientReferenceFilter {
    config: FilterConfig,
    estimate: f64,
    observation_count: u32,
}

impl AmbientReferenceFilter {
    pub const fn new(config: FilterConfig) -> Self {
        Self {
            config,
            estimate: INITIAL_ESTIMATE_PA,
            observation_count: 0,
        }
    }

    /// Fold one pressure reading (Pa) into the estimate.
    pub fn update(&mut self, reading: f64) {
        if self.observation_count < BOOTSTRAP_OBSERVATIONS {
            self.estimate = reading;
            self.observation_count += BOOTSTRAP_CREDIT;
        }

        let diff = self.estimate - reading;
        let attenuation = libm::fabs(diff) / self.config.expected_variance_pa;
        // A reading equal to the estimate carries no information.
        if attenuation == 0.0 {
            return;
        }
        let weight = libm::fmin(MAX_WEIGHT, 1.0 / attenuation);

        let count = self.observation_count as f64;
        self.estimate = (self.estimate * count + reading * weight) / (count + weight);
        self.observation_count = (self.observation_count + 1).min(OBSERVATION_LIMIT);
    }

    /// Current ambient estimate in pascal.
    ///
    /// Meaningless until [`update`](Self::update) has run at least once.
    pub const fn estimate(&self) -> f64 {
        self.estimate
    }

    pub const fn observation_count(&self) -> u32 {
        self.observation_count
    }

    pub const fn config(&self) -> &FilterConfig {
        &self.config
    }
}

impl Default for AmbientReferenceFilter {
    fn default() -> Self {
        Self::new(FilterConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_variance_must_be_positive() {
        assert_eq!(FilterConfig::default().validate(), Ok(()));
        for variance in [0.0, -100.0, f64::NAN] {
            let config = FilterConfig {
                expected_variance_pa: variance,
            };
            assert!(config.validate().is_err(), "accepted {variance}");
        }
    }

    #[test]
    fn test_first_reading_snaps_estimate() {
        let mut filter = AmbientReferenceFilter::default();
        assert_eq!(filter.estimate(), INITIAL_ESTIMATE_PA);

        filter.update(101_325.0);
        assert_eq!(filter.estimate(), 101_325.0);
        assert_eq!(filter.observation_count(), BOOTSTRAP_CREDIT);
    }

    #[test]
    fn test_constant_reading_converges() {
        let mut filter = AmbientReferenceFilter::default();
        for _ in 0..20 {
            filter.update(99_000.0);
        }
        assert!((filter.estimate() - 99_000.0).abs() < 1e-9);
    }

    #[test]
    fn test_identical_reading_is_discarded() {
        let mut filter = AmbientReferenceFilter::default();
        filter.update(100_000.0);
        let count = filter.observation_count();

        filter.update(100_000.0);
        assert_eq!(filter.observation_count(), count);
    }

    #[test]
    fn test_gesture_barely_moves_estimate() {
        let mut filter = AmbientReferenceFilter::default();
        filter.update(100_000.0);

        // One second of a strong puff at 10 ms cadence.
        for _ in 0..100 {
            filter.update(100_800.0);
        }
        assert!(filter.estimate() - 100_000.0 < 100.0);
    }

    #[test]
    fn test_slow_drift_is_followed() {
        let mut filter = AmbientReferenceFilter::default();
        filter.update(100_000.0);

        let mut reading = 100_000.0;
        for _ in 0..3_000 {
            reading += 0.05;
            filter.update(reading);
        }
        assert!((filter.estimate() - reading).abs() < 20.0);
    }

    #[test]
    fn test_misbootstrapped_estimate_converges() {
        let mut filter = AmbientReferenceFilter::default();
        // Filter wakes up during a puff.
        filter.update(100_600.0);
        for i in 0..20_000 {
            let noise = if i % 2 == 0 { 2.0 } else { -2.0 };
            filter.update(100_000.0 + noise);
        }
        assert!((filter.estimate() - 100_000.0).abs() < 10.0);
    }

    #[test]
    fn test_observation_count_saturates() {
        let mut filter = AmbientReferenceFilter::default();
        for i in 0..5_000 {
            filter.update(100_000.0 + (i % 7) as f64);
        }
        assert_eq!(filter.observation_count(), OBSERVATION_LIMIT);
    }
}
