use serde::{Deserialize, Serialize};
use thiserror_no_std::Error;

use crate::input::{ClassifierConfig, FilterConfig};
use crate::sensors::bmp280::SensorSettings;

/// All tunables of the input pipeline.
///
/// Every section falls back to its defaults when missing, so a partial
/// document like `{"classifier": {"weak_thresh_pa": 350.0}}` is valid.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Default)]
#[serde(default)]
pub struct InputConfig {
    pub sensor: SensorSettings,
    pub filter: FilterConfig,
    pub classifier: ClassifierConfig,
}

impl InputConfig {
    /// Check every section; the first problem found is reported.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.filter.validate()?;
        self.classifier.validate()
    }
}

/// A tunable outside the range the pipeline can work with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{field} must be a positive number")]
    NotPositive { field: &'static str },

    /// The release threshold `weak_thresh_pa - weak_hysteresis_pa` must lie
    /// in `(0, weak_thresh_pa]`, otherwise held actions never release.
    #[error("weak_hysteresis_pa must be at least 0 and below weak_thresh_pa")]
    HysteresisOutOfRange,

    #[error("strong_thresh_pa must not be below weak_thresh_pa")]
    StrongBelowWeak,

    #[error("short_min_time_ms must not exceed long_min_time_ms")]
    ShortExceedsLong,
}
