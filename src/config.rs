//! Training configuration, passed by value to every trainer constructor

use serde::{Deserialize, Serialize};

use crate::train::ConfigError;

/// Which metric trainers report as their error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorMode {
    /// Mean of the squared differences over every output of every sample.
    Mse,
    /// Square root of `Mse`.
    Rms,
}

impl Default for ErrorMode {
    fn default() -> Self {
        ErrorMode::Mse
    }
}

/// Learning rate and momentum of plain backpropagation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackpropParams {
    pub learning_rate: f64,
    pub momentum: f64,
}

impl Default for BackpropParams {
    fn default() -> Self {
        Self {
            learning_rate: 0.7,
            momentum: 0.3,
        }
    }
}

/// Step sizes of resilient propagation.
///
/// Every per-weight step starts at `initial_update` and stays in `[delta_min, max_step]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RpropParams {
    pub initial_update: f64,
    pub max_step: f64,
    pub delta_min: f64,
}

impl Default for RpropParams {
    fn default() -> Self {
        Self {
            initial_update: 0.1,
            max_step: 50.0,
            delta_min: 1e-6,
        }
    }
}

/// Levenberg-Marquardt settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LmaParams {
    /// Re-estimate the error and weight-decay scales every epoch (MacKay's evidence framework).
    pub bayesian: bool,
    /// Damping the first epoch starts from.
    pub initial_lambda: f64,
}

impl Default for LmaParams {
    fn default() -> Self {
        Self {
            bayesian: false,
            initial_lambda: 0.1,
        }
    }
}

/// Multi-threaded propagation settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MultiParams {
    /// Worker count, `0` picks one per hardware thread.
    pub threads: usize,
    /// Below this many samples per worker the trainer runs single-threaded.
    pub min_per_thread: usize,
}

impl Default for MultiParams {
    fn default() -> Self {
        Self {
            threads: 0,
            min_per_thread: 1000,
        }
    }
}

/// Everything a trainer reads from outside: error metric, zero tolerance and the
/// settings of each algorithm.
///
/// # Examples
/// ```
/// # use flatprop::config::{ErrorMode, TrainingConfig};
/// let config = TrainingConfig::from_json(r#"{ "error_mode": "rms", "rprop": { "max_step": 10.0 } }"#).unwrap();
/// assert_eq!(config.error_mode, ErrorMode::Rms);
/// assert_eq!(config.rprop.max_step, 10.0);
/// assert_eq!(config.rprop.initial_update, 0.1);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub error_mode: ErrorMode,
    /// Magnitudes below this are treated as zero.
    pub zero_tolerance: f64,
    pub backprop: BackpropParams,
    pub rprop: RpropParams,
    pub lma: LmaParams,
    pub multi: MultiParams,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            error_mode: ErrorMode::default(),
            zero_tolerance: 1e-17,
            backprop: BackpropParams::default(),
            rprop: RpropParams::default(),
            lma: LmaParams::default(),
            multi: MultiParams::default(),
        }
    }
}

impl TrainingConfig {
    /// Parses a JSON document; missing fields keep their defaults.
    ///
    /// # Returns
    /// * `Ok(TrainingConfig)` if the document parses and the values pass `TrainingConfig::validate`;
    /// * `Err(ConfigError)` otherwise.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: TrainingConfig =
            serde_json::from_str(json).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> String {
        // Only plain numbers and enums inside, serialization can't fail
        serde_json::to_string_pretty(self).unwrap_or_default()
    }

    /// Checks that every value is usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.zero_tolerance >= 0.0 && self.zero_tolerance.is_finite()) {
            return Err(ConfigError::InvalidParameter("zero_tolerance", self.zero_tolerance));
        }

        let BackpropParams {
            learning_rate,
            momentum,
        } = self.backprop;
        if !(learning_rate >= 0.0 && learning_rate.is_finite()) {
            return Err(ConfigError::InvalidParameter("backprop.learning_rate", learning_rate));
        }
        if !(momentum >= 0.0 && momentum.is_finite()) {
            return Err(ConfigError::InvalidParameter("backprop.momentum", momentum));
        }

        let RpropParams {
            initial_update,
            max_step,
            delta_min,
        } = self.rprop;
        if !(delta_min > 0.0 && delta_min.is_finite()) {
            return Err(ConfigError::InvalidParameter("rprop.delta_min", delta_min));
        }
        if !(max_step >= delta_min && max_step.is_finite()) {
            return Err(ConfigError::InvalidParameter("rprop.max_step", max_step));
        }
        if !(delta_min..=max_step).contains(&initial_update) {
            return Err(ConfigError::InvalidParameter("rprop.initial_update", initial_update));
        }

        if !(self.lma.initial_lambda > 0.0 && self.lma.initial_lambda.is_finite()) {
            return Err(ConfigError::InvalidParameter(
                "lma.initial_lambda",
                self.lma.initial_lambda,
            ));
        }

        if self.multi.min_per_thread == 0 {
            return Err(ConfigError::InvalidParameter("multi.min_per_thread", 0.0));
        }

        Ok(())
    }
}
