use serde::{Deserialize, Serialize};

/// Activation function of a layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Activation {
    Linear,
    Sigmoid,
    Tanh,
    Relu,
}

impl Activation {
    /// Applies the function to a neuron's weighted sum.
    pub fn activate(self, sum: f64) -> f64 {
        match self {
            Activation::Linear => sum,
            Activation::Sigmoid => 1.0 / (1.0 + (-sum).exp()),
            Activation::Tanh => sum.tanh(),
            Activation::Relu => sum.max(0.0),
        }
    }

    /// Derivative of the function at `sum`.
    ///
    /// Sigmoid and tanh are expressed in terms of their own `output`
    /// (`s * (1 - s)` and `1 - t^2`), which is already captured by the forward pass.
    ///
    /// # Arguments
    /// * `sum` - neuron's weighted sum (pre-activation);
    /// * `output` - neuron's activation, `self.activate(sum)`.
    pub fn derivative(self, sum: f64, output: f64) -> f64 {
        match self {
            Activation::Linear => 1.0,
            Activation::Sigmoid => output * (1.0 - output),
            Activation::Tanh => 1.0 - output * output,
            Activation::Relu => {
                if sum > 0.0 {
                    1.0
                } else {
                    0.0
                }
            }
        }
    }
}
