use std::{error::Error, fmt};

use crate::feedforward::SizeMismatch;

/// Problems found while building a trainer. Training never starts after one of these.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    Parse(String),
    InvalidParameter(&'static str, f64),
    /// The algorithm needs a given number of output neurons.
    OutputCount(SizeMismatch),
    /// Inputs (`.0`) or ideals (`.1`) of the training set don't fit the network.
    DataShape(SizeMismatch, SizeMismatch),
    EmptyTrainingSet,
    /// The multi-threaded trainer needs random access to the training set.
    NotIndexable,
    /// A worker's accumulator layout differs from the master's.
    IncongruentWorker(usize),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self {
            ConfigError::Parse(reason) => write!(f, "Can't parse configuration: {}", reason),
            ConfigError::InvalidParameter(name, value) => {
                write!(f, "Invalid value {} for {}!", value, name)
            }
            ConfigError::OutputCount(SizeMismatch { expected, got }) => write!(
                f,
                "This algorithm needs exactly {} output neuron(s), but the network has {}!",
                expected, got
            ),
            ConfigError::DataShape(inputs, ideals) => write!(
                f,
                "Training set doesn't fit the network: expected {} input(s) and {} ideal(s), \
                but got {} and {}!",
                inputs.expected, ideals.expected, inputs.got, ideals.got
            ),
            ConfigError::EmptyTrainingSet => write!(f, "Training set is empty!"),
            ConfigError::NotIndexable => write!(
                f,
                "Multi-threaded training needs an indexable training set!"
            ),
            ConfigError::IncongruentWorker(worker) => write!(
                f,
                "Gradient accumulators of worker {} don't match the master network!",
                worker
            ),
        }
    }
}

impl Error for ConfigError {}

/// Numeric failures of the per-sample hot path.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NumericError {
    /// The forward pass produced NaN or infinity at this output neuron.
    NonFiniteOutput { index: usize },
    /// Backpropagation produced NaN or infinity at this neuron.
    NonFiniteGradient { neuron: usize },
}

impl fmt::Display for NumericError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self {
            NumericError::NonFiniteOutput { index } => {
                write!(f, "Network output {} is not a finite number!", index)
            }
            NumericError::NonFiniteGradient { neuron } => {
                write!(f, "Delta of neuron {} is not a finite number!", neuron)
            }
        }
    }
}

impl Error for NumericError {}

/// Error structure for trainers.
#[derive(Debug, Clone, PartialEq)]
pub enum TrainError {
    Config(ConfigError),
    Numeric(NumericError),
    Unsupported(&'static str),
    BadContinuation(&'static str),
}

impl fmt::Display for TrainError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self {
            TrainError::Config(err) => write!(f, "{}", err),
            TrainError::Numeric(err) => write!(f, "{}", err),
            TrainError::Unsupported(what) => write!(f, "{} is not supported!", what),
            TrainError::BadContinuation(reason) => {
                write!(f, "Can't resume training: {}!", reason)
            }
        }
    }
}

impl Error for TrainError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            TrainError::Config(err) => Some(err),
            TrainError::Numeric(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ConfigError> for TrainError {
    fn from(err: ConfigError) -> Self {
        TrainError::Config(err)
    }
}

impl From<NumericError> for TrainError {
    fn from(err: NumericError) -> Self {
        TrainError::Numeric(err)
    }
}
