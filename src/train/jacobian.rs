use nalgebra::{DMatrix, DVector};

use super::{gradient::backward_pass, NumericError};
use crate::data::TrainingSet;
use crate::feedforward::Net;

/// Jacobian of a single-output network over a whole training set, computed with the chain rule.
///
/// Row `i` holds the derivative of the network output for sample `i` with respect to every
/// coefficient, columns indexed like `Net::weights`. The matching entry of the row error
/// vector is `ideal - actual` for that sample.
#[derive(Debug, Clone)]
pub struct JacobianChainRule {
    jacobian: DMatrix<f64>,
    row_errors: DVector<f64>,
    sums: Box<[f64]>,
    outputs: Box<[f64]>,
    deltas: Box<[f64]>,
}

impl JacobianChainRule {
    /// Allocates a Jacobian of `rows` samples for `net`.
    pub fn new(net: &Net, rows: usize) -> Self {
        let neurons = net.neuron_count();

        Self {
            jacobian: DMatrix::zeros(rows, net.weight_count()),
            row_errors: DVector::zeros(rows),
            sums: vec![0.0; neurons].into_boxed_slice(),
            outputs: vec![0.0; neurons].into_boxed_slice(),
            deltas: vec![0.0; neurons].into_boxed_slice(),
        }
    }

    /// Fills the Jacobian and the row errors from the current weights of `net`.
    ///
    /// `training` must have as many samples as rows given to `JacobianChainRule::new`,
    /// and `net` a single output neuron.
    ///
    /// # Returns
    /// * `Ok(sse)`, half the sum of the squared row errors;
    /// * `Err(NumericError)` if an output or a delta is not finite.
    pub fn calculate<S>(&mut self, net: &Net, training: &S) -> Result<f64, NumericError>
    where
        S: TrainingSet + ?Sized,
    {
        debug_assert_eq!(net.output_count(), 1);
        debug_assert_eq!(training.len(), self.jacobian.nrows());

        let last = net.layers.len() - 1;
        let output = net.layer_index[last];
        let activation = net.layers[last].activation;
        let mut sse = 0.0;

        for row in 0..training.len() {
            let (input, ideal) = training.pair(row);
            net.compute_layers(input, &mut self.sums, &mut self.outputs);

            let actual = self.outputs[output];
            if !actual.is_finite() {
                return Err(NumericError::NonFiniteOutput { index: 0 });
            }
            let error = ideal[0] - actual;
            self.row_errors[row] = error;
            sse += error * error;

            self.deltas[output] = activation.derivative(self.sums[output], actual);

            let jacobian = &mut self.jacobian;
            backward_pass(
                net,
                &self.sums,
                &self.outputs,
                &mut self.deltas,
                |position, value| jacobian[(row, position)] = value,
            )?;
        }

        Ok(sse / 2.0)
    }

    pub fn jacobian(&self) -> &DMatrix<f64> {
        &self.jacobian
    }

    pub fn row_errors(&self) -> &DVector<f64> {
        &self.row_errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::BasicTrainingSet;
    use crate::feedforward::{Activation, Layer};

    fn net() -> Net {
        let mut net = Net::with_seed(
            &[
                Layer::input(2),
                Layer::new(3, Activation::Sigmoid, true),
                Layer::new(1, Activation::Tanh, true),
            ],
            5,
        )
        .unwrap();
        // Non-zero biases, so their columns are exercised
        for (i, w) in net.weights_mut()[6..9].iter_mut().enumerate() {
            *w = 0.2 * i as f64 - 0.3;
        }
        net
    }

    fn set() -> BasicTrainingSet {
        BasicTrainingSet::from_pairs(
            vec![
                (vec![0.5, -0.5], vec![0.3]),
                (vec![1.0, 0.2], vec![-0.1]),
                (vec![-0.8, 0.9], vec![0.7]),
            ],
            2,
            1,
        )
        .unwrap()
    }

    #[test]
    fn matches_finite_differences() {
        let mut net = net();
        let set = set();
        let mut chain = JacobianChainRule::new(&net, set.len());
        chain.calculate(&net, &set).unwrap();

        let h = 1e-6;
        let mut output = [0.0];
        for row in 0..set.len() {
            let (input, _) = set.pair(row);
            for col in 0..net.weight_count() {
                let original = net.weights()[col];
                net.weights_mut()[col] = original + h;
                net.process(input, &mut output).unwrap();
                let plus = output[0];
                net.weights_mut()[col] = original - h;
                net.process(input, &mut output).unwrap();
                let minus = output[0];
                net.weights_mut()[col] = original;

                let numeric = (plus - minus) / (2.0 * h);
                assert!(
                    (chain.jacobian()[(row, col)] - numeric).abs() < 1e-6,
                    "J[{}][{}]: {} vs {}",
                    row,
                    col,
                    chain.jacobian()[(row, col)],
                    numeric
                );
            }
        }
    }

    #[test]
    fn row_errors_and_sse() {
        let mut net = net();
        let set = set();
        let mut chain = JacobianChainRule::new(&net, set.len());
        let sse = chain.calculate(&net, &set).unwrap();

        let mut output = [0.0];
        let mut expected = 0.0;
        for row in 0..set.len() {
            let (input, ideal) = set.pair(row);
            net.process(input, &mut output).unwrap();
            assert!((chain.row_errors()[row] - (ideal[0] - output[0])).abs() < 1e-12);
            expected += (ideal[0] - output[0]).powi(2);
        }
        assert!((sse - expected / 2.0).abs() < 1e-12);
    }

    #[test]
    fn evaluation_is_idempotent() {
        let net = net();
        let set = set();
        let mut chain = JacobianChainRule::new(&net, set.len());

        let first_sse = chain.calculate(&net, &set).unwrap();
        let first = chain.jacobian().clone();
        let second_sse = chain.calculate(&net, &set).unwrap();
        assert_eq!(&first, chain.jacobian());
        assert_eq!(first_sse, second_sse);
    }
}
