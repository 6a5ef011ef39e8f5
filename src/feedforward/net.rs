use rand::{prelude::Distribution, rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::{error::Error, fmt, mem};

use super::activation::Activation;

/// Description of one layer of a network.
///
/// For the input layer only `size` matters, see `Layer::input`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Layer {
    /// The number of neurons in the layer.
    pub size: usize,
    /// Activation applied to every neuron of the layer.
    pub activation: Activation,
    /// Whether every neuron of the layer owns a bias coefficient.
    pub has_bias: bool,
}

impl Layer {
    /// Returns an input layer of `size` neurons.
    pub fn input(size: usize) -> Layer {
        Layer {
            size,
            activation: Activation::Linear,
            has_bias: false,
        }
    }

    /// Returns a computing layer.
    pub fn new(size: usize, activation: Activation, has_bias: bool) -> Layer {
        Layer {
            size,
            activation,
            has_bias,
        }
    }

    /// Number of coefficients of this layer's block when fed by `from` neurons.
    fn coeffs_count(&self, from: usize) -> usize {
        self.size * from + if self.has_bias { self.size } else { 0 }
    }
}

/// Neural network structure, with all weights stored in one flat array.
///
/// Cloning a `Net` gives a network with the same topology and a copy of its weights.
#[derive(Debug, Clone)]
pub struct Net {
    /// Layers, from input to output.
    pub(crate) layers: Box<[Layer]>,

    /// Offset of each layer's first neuron in per-neuron buffers.
    ///
    /// Has `layers.len() + 1` entries, the last one is the total neuron count,
    /// so neurons of layer `l` live at `layer_index[l]..layer_index[l + 1]`.
    pub(crate) layer_index: Box<[usize]>,

    /// Offset of each layer's coefficient block in `weights`, same convention as
    /// `layer_index`. The input layer owns an empty block.
    pub(crate) weight_index: Box<[usize]>,

    /// Array of coefficients (weights & biases).
    ///
    /// We will store all coefficients of all layers here altogether:
    /// `weights = [layer_1][layer_2] ... [layer_N]`
    /// `layer = [weights][biases]`
    /// where `[weights]` is row-major, one row of `size_{l-1}` weights per neuron,
    /// and `[biases]` is present only if the layer has bias.
    pub(crate) weights: Box<[f64]>,

    /// Buffer for calculating activations in `Net::process`.
    ///
    /// When processing, we only need to know activations of previous layer, so we can use two buffers:
    /// `[old activations] & [coefficients] -> calc -> [new activations]`
    /// joined together, each the size of the biggest layer.
    pub(crate) buffer: Box<[f64]>,
}

impl Net {
    /// Returns network for given layers.
    /// It will have random weights from range [-1,1] and zero biases, unless coefficients are given.
    ///
    /// # Arguments
    /// * `layers` - layer descriptions, from input to output;
    /// * `coefficients` - slice of all coefficients (optional), laid out as described in `Net::weights`.
    ///
    /// # Returns
    /// * `Ok(Net)` if geometry is valid and amount of coefficients is right, or no coefficients provided;
    /// * `Err(NewNetError)` otherwise.
    ///
    /// # Examples
    /// * Using random coefficients
    /// ```
    /// # use flatprop::feedforward::{Activation, Layer, Net};
    /// let net = Net::new(
    ///     &[Layer::input(10), Layer::new(20, Activation::Tanh, true), Layer::new(3, Activation::Sigmoid, true)],
    ///     None,
    /// ).unwrap();
    /// assert_eq!(net.weight_count(), 20 * 10 + 20 + 3 * 20 + 3);
    /// ```
    /// * Using given coefficients
    /// ```
    /// # use flatprop::feedforward::{Activation, Layer, Net};
    /// let coefficients = [0.27, 0.3, 7.5, 0.0, 1.1];
    /// let net = Net::new(
    ///     &[Layer::input(2), Layer::new(1, Activation::Sigmoid, true), Layer::new(1, Activation::Linear, true)],
    ///     Some(Box::new(coefficients)),
    /// ).unwrap();
    /// ```
    pub fn new(layers: &[Layer], coefficients: Option<Box<[f64]>>) -> Result<Net, NewNetError> {
        let mut net = Net::with_zeros(layers)?;

        if let Some(coeffs) = coefficients {
            if coeffs.len() != net.weights.len() {
                return Err(NewNetError::BadCoefficients(SizeMismatch {
                    expected: net.weights.len(),
                    got: coeffs.len(),
                }));
            }
            net.weights = coeffs;
        } else {
            net.randomize(&mut rand::thread_rng());
        }

        Ok(net)
    }

    /// Same as `Net::new` without coefficients, but draws weights from a generator seeded
    /// with `seed`, so two calls give the same network.
    pub fn with_seed(layers: &[Layer], seed: u64) -> Result<Net, NewNetError> {
        let mut net = Net::with_zeros(layers)?;
        net.randomize(&mut StdRng::seed_from_u64(seed));
        Ok(net)
    }

    fn with_zeros(layers: &[Layer]) -> Result<Net, NewNetError> {
        if layers.len() < 2 {
            return Err(NewNetError::BadGeometry(layers.len()));
        }
        if let Some(empty) = layers.iter().position(|layer| layer.size == 0) {
            return Err(NewNetError::EmptyLayer(empty));
        }

        //   Calculating offsets

        let mut layer_index = Vec::with_capacity(layers.len() + 1);
        let mut weight_index = Vec::with_capacity(layers.len() + 1);
        let mut neurons_total = 0;
        let mut coeffs_total = 0;
        // Biggest non-input layer, it has to fit into each half of Net::buffer
        let mut max_layer_size = 0;

        for (l, layer) in layers.iter().enumerate() {
            layer_index.push(neurons_total);
            weight_index.push(coeffs_total);
            neurons_total += layer.size;
            if l > 0 {
                coeffs_total += layer.coeffs_count(layers[l - 1].size);
                max_layer_size = max_layer_size.max(layer.size);
            }
        }
        layer_index.push(neurons_total);
        weight_index.push(coeffs_total);

        Ok(Net {
            layers: layers.to_owned().into_boxed_slice(),
            layer_index: layer_index.into_boxed_slice(),
            weight_index: weight_index.into_boxed_slice(),
            weights: vec![0.0; coeffs_total].into_boxed_slice(),
            buffer: vec![0.0; max_layer_size * 2].into_boxed_slice(),
        })
    }

    /// Redraws every weight uniformly from [-1,1] and sets every bias to zero.
    pub fn randomize<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        let weights_between = rand::distributions::Uniform::from(-1.0..=1.0);

        for l in 1..self.layers.len() {
            let from = self.layers[l - 1].size;
            let block = &mut self.weights[self.weight_index[l]..self.weight_index[l + 1]];
            let (weights, biases) = block.split_at_mut(self.layers[l].size * from);
            for w in weights.iter_mut() {
                *w = weights_between.sample(rng);
            }
            for b in biases.iter_mut() {
                *b = 0.0;
            }
        }
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn input_count(&self) -> usize {
        self.layers[0].size
    }

    pub fn output_count(&self) -> usize {
        self.layers[self.layers.len() - 1].size
    }

    /// Total number of weights and biases.
    pub fn weight_count(&self) -> usize {
        self.weights.len()
    }

    /// Total number of neurons, input layer included.
    pub fn neuron_count(&self) -> usize {
        self.layer_index[self.layers.len()]
    }

    /// Offset of the first neuron of layer `l` in per-neuron buffers.
    pub fn layer_index(&self, l: usize) -> usize {
        self.layer_index[l]
    }

    /// Offset of the coefficient block of layer `l` in the weight vector.
    pub fn weight_index(&self, l: usize) -> usize {
        self.weight_index[l]
    }

    /// Position in the weight vector of the weight connecting neuron `from` of layer `l - 1`
    /// to neuron `to` of layer `l`.
    pub fn weight_position(&self, l: usize, to: usize, from: usize) -> usize {
        self.weight_index[l] + to * self.layers[l - 1].size + from
    }

    /// Position in the weight vector of the bias of neuron `to` of layer `l`, if it has one.
    pub fn bias_position(&self, l: usize, to: usize) -> Option<usize> {
        if self.layers[l].has_bias {
            Some(self.weight_index[l] + self.layers[l].size * self.layers[l - 1].size + to)
        } else {
            None
        }
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    pub fn weights_mut(&mut self) -> &mut [f64] {
        &mut self.weights
    }

    /// Exports layers and coefficients from network.
    ///
    /// # Returns
    /// `(layers, coefficients)`.
    pub fn export(&self) -> (&[Layer], &[f64]) {
        (&self.layers, &self.weights)
    }

    /// Copies the weight vector into a free-standing array.
    pub fn to_array(&self) -> Vec<f64> {
        self.weights.to_vec()
    }

    /// Overwrites the weight vector from a free-standing array.
    ///
    /// # Returns
    /// * `Ok(())` if `array` has one entry per coefficient;
    /// * `Err(SizeMismatch)` otherwise, leaving the weights untouched.
    pub fn from_array(&mut self, array: &[f64]) -> Result<(), SizeMismatch> {
        if array.len() != self.weights.len() {
            return Err(SizeMismatch {
                expected: self.weights.len(),
                got: array.len(),
            });
        }
        self.weights.copy_from_slice(array);
        Ok(())
    }

    /// Calculates weighted sums and activations of one layer.
    ///
    /// # Arguments
    /// * `layer` - the layer being computed;
    /// * `coeffs` - coefficient block of the layer (see `Net::weights` documentation);
    /// * `prev` - activations of previous layer;
    /// * `sums` - mutable slice for the weighted sums of the layer (optional);
    /// * `outputs` - mutable slice for the activations of the layer.
    pub(crate) fn forward_layer(
        layer: &Layer,
        coeffs: &[f64],
        prev: &[f64],
        mut sums: Option<&mut [f64]>,
        outputs: &mut [f64],
    ) {
        let from = prev.len();
        let (weights, biases) = coeffs.split_at(layer.size * from);

        for (j, (row, output)) in weights
            .chunks_exact(from)
            .zip(outputs[..layer.size].iter_mut())
            .enumerate()
        {
            let mut sum: f64 = row.iter().zip(prev.iter()).map(|(w, a)| w * a).sum();
            if layer.has_bias {
                sum += biases[j];
            }
            if let Some(sums) = sums.as_deref_mut() {
                sums[j] = sum;
            }
            *output = layer.activation.activate(sum);
        }
    }

    /// Calculates output of the network using given input.
    ///
    /// # Arguments
    /// * `inputs` - Slice that holds activations of input neurons;
    /// * `outputs` - Mutable slice that will be filled with activations of output neurons.
    ///
    /// # Returns
    /// * `Ok(())` if amount of inputs and size of the outputs is right;
    /// * `Err(ProcessError)` otherwise.
    ///
    /// # Examples
    /// ```
    /// # use flatprop::feedforward::{Activation, Layer, Net};
    /// let mut net = Net::new(
    ///     &[Layer::input(10), Layer::new(20, Activation::Tanh, true), Layer::new(3, Activation::Sigmoid, true)],
    ///     None,
    /// ).unwrap();
    /// let inputs = [1.0; 10];
    /// let mut outputs = [0.0, 0.0, 0.0];
    /// net.process(&inputs, &mut outputs).unwrap();
    /// ```
    pub fn process(&mut self, inputs: &[f64], outputs: &mut [f64]) -> Result<(), ProcessError> {
        let mut buffer = mem::take(&mut self.buffer);
        let result = self.process_with(inputs, outputs, &mut buffer);
        self.buffer = buffer;
        result
    }

    /// Same as `Net::process`, but borrows the network and works in a caller's `buffer`
    /// of `Net::buffer_size` values, so a shared network can serve inference.
    pub fn process_with(
        &self,
        inputs: &[f64],
        outputs: &mut [f64],
        buffer: &mut [f64],
    ) -> Result<(), ProcessError> {
        if inputs.len() != self.input_count() {
            return Err(ProcessError::BadInputs(SizeMismatch {
                expected: self.input_count(),
                got: inputs.len(),
            }));
        }
        if outputs.len() != self.output_count() {
            return Err(ProcessError::BadOutputs(SizeMismatch {
                expected: self.output_count(),
                got: outputs.len(),
            }));
        }
        if buffer.len() != self.buffer_size() {
            return Err(ProcessError::BadBuffer(SizeMismatch {
                expected: self.buffer_size(),
                got: buffer.len(),
            }));
        }

        // Splitting the buffer in two, see Net::buffer documentation
        let half = buffer.len() / 2;
        let (mut old_buffer, mut buffer) = buffer.split_at_mut(half);
        let last = self.layers.len() - 1;

        for l in 1..=last {
            let layer = &self.layers[l];
            let coeffs = &self.weights[self.weight_index[l]..self.weight_index[l + 1]];
            let prev: &[f64] = if l == 1 {
                inputs
            } else {
                &old_buffer[..self.layers[l - 1].size]
            };

            if l == last {
                Net::forward_layer(layer, coeffs, prev, None, outputs);
            } else {
                Net::forward_layer(layer, coeffs, prev, None, &mut buffer[..layer.size]);
                mem::swap(&mut old_buffer, &mut buffer);
            }
        }

        Ok(())
    }

    /// Length of the scratch buffer `Net::process_with` needs.
    pub fn buffer_size(&self) -> usize {
        self.buffer.len()
    }

    /// Forward pass that keeps every layer: used by gradient and Jacobian calculation.
    ///
    /// `sums` and `outputs` must have `Net::neuron_count` entries. Layer `l` is written to
    /// `layer_index(l)..layer_index(l + 1)`; the input layer is copied into both buffers.
    pub(crate) fn compute_layers(&self, inputs: &[f64], sums: &mut [f64], outputs: &mut [f64]) {
        debug_assert_eq!(inputs.len(), self.input_count());
        debug_assert_eq!(sums.len(), self.neuron_count());
        debug_assert_eq!(outputs.len(), self.neuron_count());

        sums[..inputs.len()].copy_from_slice(inputs);
        outputs[..inputs.len()].copy_from_slice(inputs);

        for l in 1..self.layers.len() {
            let start = self.layer_index[l];
            let end = self.layer_index[l + 1];
            let (before, current) = outputs.split_at_mut(start);
            Net::forward_layer(
                &self.layers[l],
                &self.weights[self.weight_index[l]..self.weight_index[l + 1]],
                &before[self.layer_index[l - 1]..],
                Some(&mut sums[start..end]),
                &mut current[..end - start],
            );
        }
    }
}

/// Error structure for `Net::new`
#[derive(Debug, Clone)]
pub enum NewNetError {
    BadGeometry(usize),
    EmptyLayer(usize),
    BadCoefficients(SizeMismatch),
}

impl fmt::Display for NewNetError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self {
            NewNetError::BadGeometry(length) => write!(
                f,
                "Net must have at least two layers (input and output), \
                but got {} layer(s)!",
                length
            ),
            NewNetError::EmptyLayer(index) => {
                write!(f, "Layer {} has no neurons!", index)
            }
            NewNetError::BadCoefficients(SizeMismatch { expected, got }) => write!(
                f,
                "Expected {} coefficients because of provided layers, but got {}!",
                expected, got
            ),
        }
    }
}

impl Error for NewNetError {}

/// Error structure for `Net::process`
#[derive(Debug, Clone)]
pub enum ProcessError {
    BadInputs(SizeMismatch),
    BadOutputs(SizeMismatch),
    BadBuffer(SizeMismatch),
}

impl fmt::Display for ProcessError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self {
            ProcessError::BadInputs(SizeMismatch { expected, got }) => {
                write!(f, "Expected {} input(s), but got {}!", expected, got)
            }
            ProcessError::BadOutputs(SizeMismatch { expected, got }) => {
                write!(f, "Expected {} output(s), but got {}!", expected, got)
            }
            ProcessError::BadBuffer(SizeMismatch { expected, got }) => {
                write!(f, "Expected a buffer of {} value(s), but got {}!", expected, got)
            }
        }
    }
}

impl Error for ProcessError {}

/// Error structure for collections size mismatch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SizeMismatch {
    pub expected: usize,
    pub got: usize,
}

impl fmt::Display for SizeMismatch {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "Expected {} values, but got {}!",
            self.expected, self.got
        )
    }
}

impl Error for SizeMismatch {}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_two_one() -> Vec<Layer> {
        vec![
            Layer::input(2),
            Layer::new(2, Activation::Sigmoid, true),
            Layer::new(1, Activation::Linear, false),
        ]
    }

    #[test]
    fn offsets_follow_layout() {
        let net = Net::new(&two_two_one(), None).unwrap();

        assert_eq!(net.weight_count(), 2 * 2 + 2 + 2);
        assert_eq!(net.neuron_count(), 5);
        assert_eq!(net.layer_index(2), 4);
        assert_eq!(net.weight_index(2), 6);
        assert_eq!(net.weight_position(1, 1, 0), 2);
        assert_eq!(net.bias_position(1, 1), Some(5));
        assert_eq!(net.bias_position(2, 0), None);
        assert_eq!(net.weight_position(2, 0, 1), 7);
    }

    #[test]
    fn rejects_bad_geometry() {
        assert!(matches!(
            Net::new(&[Layer::input(3)], None),
            Err(NewNetError::BadGeometry(1))
        ));
        assert!(matches!(
            Net::new(&[Layer::input(3), Layer::new(0, Activation::Tanh, true)], None),
            Err(NewNetError::EmptyLayer(1))
        ));
        assert!(matches!(
            Net::new(&two_two_one(), Some(Box::new([0.0; 3]))),
            Err(NewNetError::BadCoefficients(SizeMismatch { expected: 8, got: 3 }))
        ));
    }

    #[test]
    fn process_matches_hand_computation() {
        // hidden: h0 = s(1*x0 + 2*x1 + 0.5), h1 = s(-1*x0 + 0*x1 - 0.5); out = 3*h0 - 2*h1
        let coeffs = [1.0, 2.0, -1.0, 0.0, 0.5, -0.5, 3.0, -2.0];
        let mut net = Net::new(&two_two_one(), Some(Box::new(coeffs))).unwrap();

        let sigmoid = |x: f64| 1.0 / (1.0 + (-x).exp());
        let (x0, x1) = (0.3, -0.8);
        let expected = 3.0 * sigmoid(x0 + 2.0 * x1 + 0.5) - 2.0 * sigmoid(-x0 - 0.5);

        let mut outputs = [0.0];
        net.process(&[x0, x1], &mut outputs).unwrap();
        assert!((outputs[0] - expected).abs() < 1e-12);

        let mut sums = vec![0.0; net.neuron_count()];
        let mut all = vec![0.0; net.neuron_count()];
        net.compute_layers(&[x0, x1], &mut sums, &mut all);
        assert_eq!(all[4], outputs[0]);
        assert_eq!(all[0], x0);
        assert!((sums[2] - (x0 + 2.0 * x1 + 0.5)).abs() < 1e-12);
    }

    #[test]
    fn process_checks_sizes() {
        let mut net = Net::new(&two_two_one(), None).unwrap();
        let mut outputs = [0.0];
        assert!(matches!(
            net.process(&[1.0], &mut outputs),
            Err(ProcessError::BadInputs(_))
        ));
        let mut outputs = [0.0; 2];
        assert!(matches!(
            net.process(&[1.0, 2.0], &mut outputs),
            Err(ProcessError::BadOutputs(_))
        ));
        let mut outputs = [0.0];
        assert!(matches!(
            net.process_with(&[1.0, 2.0], &mut outputs, &mut [0.0; 1]),
            Err(ProcessError::BadBuffer(SizeMismatch { expected: 4, got: 1 }))
        ));
    }

    #[test]
    fn shared_network_processes_like_owned_one() {
        let mut net = Net::with_seed(
            &[
                Layer::input(2),
                Layer::new(5, Activation::Tanh, true),
                Layer::new(3, Activation::Relu, false),
                Layer::new(2, Activation::Sigmoid, true),
            ],
            3,
        )
        .unwrap();
        let mut buffer = vec![0.0; net.buffer_size()];

        for inputs in [[0.1, -0.4], [2.0, 0.5], [-1.0, -1.0]] {
            let mut shared = [0.0; 2];
            let mut owned = [0.0; 2];
            net.process_with(&inputs, &mut shared, &mut buffer).unwrap();
            net.process(&inputs, &mut owned).unwrap();
            assert_eq!(shared, owned);
        }
    }

    #[test]
    fn seeded_networks_are_reproducible_and_biases_start_at_zero() {
        let a = Net::with_seed(&two_two_one(), 7).unwrap();
        let b = Net::with_seed(&two_two_one(), 7).unwrap();
        assert_eq!(a.weights(), b.weights());
        assert_eq!(a.weights()[4..6], [0.0, 0.0]);
        assert!(a.weights().iter().all(|w| (-1.0..=1.0).contains(w)));
    }

    #[test]
    fn array_round_trip_keeps_length_invariant() {
        let mut net = Net::new(&two_two_one(), None).unwrap();
        let mut array = net.to_array();
        array[0] = 42.0;
        net.from_array(&array).unwrap();
        assert_eq!(net.weights()[0], 42.0);
        assert_eq!(
            net.from_array(&array[1..]),
            Err(SizeMismatch { expected: 8, got: 7 })
        );
    }

    #[test]
    fn clone_shares_topology_not_weights() {
        let net = Net::new(&two_two_one(), None).unwrap();
        let mut clone = net.clone();
        clone.weights_mut()[0] += 1.0;
        assert_eq!(clone.layers(), net.layers());
        assert_ne!(clone.weights()[0], net.weights()[0]);
    }
}
