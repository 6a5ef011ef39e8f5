use std::ops::Range;

use super::{error_calc::ErrorCalculation, NumericError};
use crate::config::ErrorMode;
use crate::data::TrainingSet;
use crate::feedforward::Net;

/// Walks the network from the output layer back to the first hidden layer.
///
/// On entry, `deltas` must hold the deltas of the output layer. For every coefficient,
/// `sink(position, value)` receives `delta(to-neuron) * output(from-neuron)` for weights and
/// `delta(to-neuron)` for biases; deltas of the earlier layers are filled in on the way.
///
/// # Arguments
/// * `net` - the network whose coefficients are being differentiated;
/// * `sums` - weighted sums of all neurons, as captured by `Net::compute_layers`;
/// * `outputs` - activations of all neurons, as captured by `Net::compute_layers`;
/// * `deltas` - mutable per-neuron buffer, same size as `sums`;
/// * `sink` - receives every coefficient's value.
pub(crate) fn backward_pass<F>(
    net: &Net,
    sums: &[f64],
    outputs: &[f64],
    deltas: &mut [f64],
    mut sink: F,
) -> Result<(), NumericError>
where
    F: FnMut(usize, f64),
{
    for l in (1..net.layers.len()).rev() {
        let layer = &net.layers[l];
        let prev_layer = &net.layers[l - 1];
        let from = prev_layer.size;
        let this_start = net.layer_index[l];
        let prev_start = net.layer_index[l - 1];
        let block = net.weight_index[l];

        let prev_outputs = &outputs[prev_start..this_start];

        for j in 0..layer.size {
            let delta = deltas[this_start + j];
            if !delta.is_finite() {
                return Err(NumericError::NonFiniteGradient {
                    neuron: this_start + j,
                });
            }

            let row = block + j * from;
            for (k, &out) in prev_outputs.iter().enumerate() {
                sink(row + k, delta * out);
            }
            if layer.has_bias {
                sink(block + layer.size * from + j, delta);
            }
        }

        // Input layer has no deltas
        if l > 1 {
            let (prev_deltas, this_deltas) = deltas.split_at_mut(this_start);
            let this_deltas = &this_deltas[..layer.size];
            let weights = &net.weights[block..block + layer.size * from];

            for (k, prev_delta) in prev_deltas[prev_start..].iter_mut().enumerate() {
                let propagated: f64 = weights
                    .chunks_exact(from)
                    .zip(this_deltas.iter())
                    .map(|(row, d)| row[k] * d)
                    .sum();
                let neuron = prev_start + k;
                *prev_delta = propagated
                    * prev_layer
                        .activation
                        .derivative(sums[neuron], outputs[neuron]);
            }
        }
    }

    Ok(())
}

/// Computes and accumulates the error gradient of every coefficient, one training pair at a time.
///
/// Gradients point in the direction that *decreases* the error: for an output neuron,
/// `delta = (ideal - actual) * activation'(sum)`, and a coefficient's gradient is
/// `delta(to-neuron) * output(from-neuron)` summed over the pass. Weight update rules add
/// positive multiples of it.
///
/// Buffers are sized from the network once and reused for every pair.
#[derive(Debug, Clone)]
pub struct GradientWorker {
    sums: Box<[f64]>,
    outputs: Box<[f64]>,
    deltas: Box<[f64]>,
    gradients: Box<[f64]>,
    errors: ErrorCalculation,
}

impl GradientWorker {
    pub fn new(net: &Net, mode: ErrorMode) -> Self {
        let neurons = net.neuron_count();

        Self {
            sums: vec![0.0; neurons].into_boxed_slice(),
            outputs: vec![0.0; neurons].into_boxed_slice(),
            deltas: vec![0.0; neurons].into_boxed_slice(),
            gradients: vec![0.0; net.weight_count()].into_boxed_slice(),
            errors: ErrorCalculation::new(mode),
        }
    }

    /// Adds the gradient contribution of one pair. The network is not modified.
    ///
    /// # Arguments
    /// * `net` - the network, sizes must match the ones given to `GradientWorker::new`;
    /// * `input` - activations of input neurons;
    /// * `ideal` - desired activations of output neurons.
    ///
    /// # Returns
    /// * `Ok(())` if the forward and backward passes stayed finite;
    /// * `Err(NumericError)` otherwise; the accumulated gradients are then partially updated.
    pub fn process(&mut self, net: &Net, input: &[f64], ideal: &[f64]) -> Result<(), NumericError> {
        net.compute_layers(input, &mut self.sums, &mut self.outputs);

        let output_start = net.layer_index[net.layers.len() - 1];
        let output_layer = &net.layers[net.layers.len() - 1];
        let actual = &self.outputs[output_start..];

        for (index, (&a, (&s, (&i, d)))) in actual
            .iter()
            .zip(
                self.sums[output_start..]
                    .iter()
                    .zip(ideal.iter().zip(self.deltas[output_start..].iter_mut())),
            )
            .enumerate()
        {
            if !a.is_finite() {
                return Err(NumericError::NonFiniteOutput { index });
            }
            *d = (i - a) * output_layer.activation.derivative(s, a);
        }
        self.errors.update_error(actual, ideal);

        let gradients = &mut self.gradients;
        backward_pass(net, &self.sums, &self.outputs, &mut self.deltas, |position, value| {
            gradients[position] += value
        })
    }

    /// Processes pairs `range` of `training`, in order.
    pub fn run<S>(
        &mut self,
        net: &Net,
        training: &S,
        range: Range<usize>,
    ) -> Result<(), NumericError>
    where
        S: TrainingSet + ?Sized,
    {
        for index in range {
            let (input, ideal) = training.pair(index);
            self.process(net, input, ideal)?;
        }
        Ok(())
    }

    /// Zeroes gradients and error, ready for a new pass.
    pub fn reset(&mut self) {
        for g in self.gradients.iter_mut() {
            *g = 0.0;
        }
        self.errors.reset();
    }

    /// Gradients accumulated since the last reset.
    pub fn gradients(&self) -> &[f64] {
        &self.gradients
    }

    pub(crate) fn gradients_mut(&mut self) -> &mut [f64] {
        &mut self.gradients
    }

    /// Error of the pairs processed since the last reset.
    pub fn error(&self) -> f64 {
        self.errors.calculate()
    }
}
