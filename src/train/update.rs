use serde::{Deserialize, Serialize};

use super::TrainError;
use crate::config::{BackpropParams, RpropParams};

/// Step size growth after two gradients of the same sign.
pub const POSITIVE_ETA: f64 = 1.2;
/// Step size shrink after a gradient sign flip.
pub const NEGATIVE_ETA: f64 = 0.5;

/// State a propagation trainer needs to pick up training where it stopped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TrainingContinuation {
    Backpropagation {
        last_delta: Vec<f64>,
    },
    Resilient {
        last_gradients: Vec<f64>,
        update_values: Vec<f64>,
    },
}

/// Turns one pass worth of accumulated gradients into a weight change.
pub trait UpdateRule: Send {
    /// Algorithm name, for logs.
    fn name(&self) -> &'static str;

    /// Updates `weights` in place from `gradients` (see `GradientWorker` for their sign).
    fn update(&mut self, gradients: &[f64], weights: &mut [f64]);

    fn pause(&self) -> TrainingContinuation;

    fn resume(&mut self, state: TrainingContinuation) -> Result<(), TrainError>;
}

/// Backpropagation with momentum:
/// `delta = gradient * learning_rate + last_delta * momentum`.
#[derive(Debug, Clone)]
pub struct Momentum {
    learning_rate: f64,
    momentum: f64,
    last_delta: Box<[f64]>,
}

impl Momentum {
    pub fn new(params: BackpropParams, weight_count: usize) -> Self {
        Self {
            learning_rate: params.learning_rate,
            momentum: params.momentum,
            last_delta: vec![0.0; weight_count].into_boxed_slice(),
        }
    }

    pub fn last_delta(&self) -> &[f64] {
        &self.last_delta
    }
}

impl UpdateRule for Momentum {
    fn name(&self) -> &'static str {
        "backpropagation"
    }

    fn update(&mut self, gradients: &[f64], weights: &mut [f64]) {
        for ((w, &g), last) in weights
            .iter_mut()
            .zip(gradients.iter())
            .zip(self.last_delta.iter_mut())
        {
            let delta = g * self.learning_rate + *last * self.momentum;
            *w += delta;
            *last = delta;
        }
    }

    fn pause(&self) -> TrainingContinuation {
        TrainingContinuation::Backpropagation {
            last_delta: self.last_delta.to_vec(),
        }
    }

    fn resume(&mut self, state: TrainingContinuation) -> Result<(), TrainError> {
        match state {
            TrainingContinuation::Backpropagation { last_delta } => {
                if last_delta.len() != self.last_delta.len() {
                    return Err(TrainError::BadContinuation("wrong number of weights"));
                }
                self.last_delta = last_delta.into_boxed_slice();
                Ok(())
            }
            _ => Err(TrainError::BadContinuation(
                "state belongs to another algorithm",
            )),
        }
    }
}

/// Resilient propagation: each weight moves by its own step size, which only depends on
/// the sign history of its gradient.
#[derive(Debug, Clone)]
pub struct Rprop {
    params: RpropParams,
    zero_tolerance: f64,
    update_values: Box<[f64]>,
    last_gradients: Box<[f64]>,
}

impl Rprop {
    pub fn new(params: RpropParams, zero_tolerance: f64, weight_count: usize) -> Self {
        Self {
            params,
            zero_tolerance,
            update_values: vec![params.initial_update; weight_count].into_boxed_slice(),
            last_gradients: vec![0.0; weight_count].into_boxed_slice(),
        }
    }

    /// `0` for magnitudes below the zero tolerance, `±1` otherwise.
    fn sign(&self, value: f64) -> f64 {
        if value.abs() < self.zero_tolerance {
            0.0
        } else if value > 0.0 {
            1.0
        } else {
            -1.0
        }
    }

    /// Computes the change of weight `i` and updates its step state.
    fn weight_delta(&mut self, i: usize, gradient: f64) -> f64 {
        let change = self.sign(gradient * self.last_gradients[i]);

        if change > 0.0 {
            let step = (self.update_values[i] * POSITIVE_ETA).min(self.params.max_step);
            self.update_values[i] = step;
            self.last_gradients[i] = gradient;
            self.sign(gradient) * step
        } else if change < 0.0 {
            self.update_values[i] =
                (self.update_values[i] * NEGATIVE_ETA).max(self.params.delta_min);
            // Next iteration sees no sign change, so the step isn't shrunk twice for one oscillation
            self.last_gradients[i] = 0.0;
            0.0
        } else {
            self.last_gradients[i] = gradient;
            self.sign(gradient) * self.update_values[i]
        }
    }

    pub fn update_values(&self) -> &[f64] {
        &self.update_values
    }

    pub fn last_gradients(&self) -> &[f64] {
        &self.last_gradients
    }

    pub fn params(&self) -> RpropParams {
        self.params
    }
}

impl UpdateRule for Rprop {
    fn name(&self) -> &'static str {
        "resilient propagation"
    }

    fn update(&mut self, gradients: &[f64], weights: &mut [f64]) {
        for (i, (w, &g)) in weights.iter_mut().zip(gradients.iter()).enumerate() {
            *w += self.weight_delta(i, g);
        }
    }

    fn pause(&self) -> TrainingContinuation {
        TrainingContinuation::Resilient {
            last_gradients: self.last_gradients.to_vec(),
            update_values: self.update_values.to_vec(),
        }
    }

    fn resume(&mut self, state: TrainingContinuation) -> Result<(), TrainError> {
        match state {
            TrainingContinuation::Resilient {
                last_gradients,
                update_values,
            } => {
                if last_gradients.len() != self.last_gradients.len()
                    || update_values.len() != self.update_values.len()
                {
                    return Err(TrainError::BadContinuation("wrong number of weights"));
                }
                let RpropParams {
                    max_step,
                    delta_min,
                    ..
                } = self.params;
                if update_values
                    .iter()
                    .any(|v| !(delta_min..=max_step).contains(v))
                {
                    return Err(TrainError::BadContinuation("step size out of bounds"));
                }
                self.last_gradients = last_gradients.into_boxed_slice();
                self.update_values = update_values.into_boxed_slice();
                Ok(())
            }
            _ => Err(TrainError::BadContinuation(
                "state belongs to another algorithm",
            )),
        }
    }
}
