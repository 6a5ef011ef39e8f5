//! Gradient-based training of flat networks: backpropagation, resilient propagation,
//! Levenberg-Marquardt and multi-threaded resilient propagation.
//!
//! Every trainer takes ownership of a `Net` and a training set, runs one epoch per
//! `Train::iteration` call, and gives the network back through `teardown`.

mod error;
mod error_calc;
mod gradient;
mod gradient_map;
mod jacobian;
mod lma;
mod multi;
mod propagation;
mod update;

pub use error::*;
pub use error_calc::ErrorCalculation;
pub use gradient::GradientWorker;
pub use gradient_map::{Accumulator, AccumulatorKind, GradientMap};
pub use jacobian::JacobianChainRule;
pub use lma::{LevenbergMarquardt, LAMBDA_MAX, SCALE_LAMBDA};
pub use multi::MultiPropagation;
pub use propagation::{Backpropagation, Propagation, ResilientPropagation};
pub use update::{Momentum, Rprop, TrainingContinuation, UpdateRule, NEGATIVE_ETA, POSITIVE_ETA};

use log::debug;

use crate::data::TrainingSet;
use crate::feedforward::{Net, SizeMismatch};

/// Common interface of all trainers.
pub trait Train {
    /// Runs exactly one epoch, updating the network's weights and the error.
    fn iteration(&mut self) -> Result<(), TrainError>;

    /// Error of the most recent epoch, in the configured `ErrorMode`.
    fn error(&self) -> f64;

    /// Number of epochs run so far.
    fn iterations(&self) -> usize;

    /// Whether `pause` can produce a state to resume from.
    fn can_continue(&self) -> bool;

    fn pause(&self) -> Result<TrainingContinuation, TrainError>;

    fn resume(&mut self, state: TrainingContinuation) -> Result<(), TrainError>;

    fn net(&self) -> &Net;

    /// Runs epochs until the error drops below `target_error` or `max_epochs` epochs ran.
    ///
    /// # Returns
    /// The number of epochs run by this call.
    fn train_until(&mut self, target_error: f64, max_epochs: usize) -> Result<usize, TrainError> {
        for epoch in 1..=max_epochs {
            self.iteration()?;
            if self.error() < target_error {
                debug!(
                    "target error {} reached after {} epoch(s): {}",
                    target_error,
                    epoch,
                    self.error()
                );
                return Ok(epoch);
            }
        }
        Ok(max_epochs)
    }
}

/// Checks that a training set is usable with a network.
pub(crate) fn check_training_set<S>(net: &Net, training: &S) -> Result<(), ConfigError>
where
    S: TrainingSet + ?Sized,
{
    if training.is_empty() {
        return Err(ConfigError::EmptyTrainingSet);
    }
    if training.input_size() != net.input_count() || training.ideal_size() != net.output_count() {
        return Err(ConfigError::DataShape(
            SizeMismatch {
                expected: net.input_count(),
                got: training.input_size(),
            },
            SizeMismatch {
                expected: net.output_count(),
                got: training.ideal_size(),
            },
        ));
    }
    Ok(())
}
