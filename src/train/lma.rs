use log::{debug, info, warn};
use nalgebra::{DMatrix, DVector, Dyn, LU};

use super::{
    check_training_set, jacobian::JacobianChainRule, update::TrainingContinuation, ConfigError,
    Train, TrainError,
};
use crate::config::{ErrorMode, TrainingConfig};
use crate::data::TrainingSet;
use crate::feedforward::{Net, SizeMismatch};

/// Factor lambda is multiplied by after a rejected step and divided by after an epoch.
pub const SCALE_LAMBDA: f64 = 10.0;
/// The damping search gives up once lambda reaches this value.
pub const LAMBDA_MAX: f64 = 1e25;

/// Levenberg-Marquardt trainer for networks with exactly one output neuron.
///
/// Every epoch solves `(βJᵗJ + (λ + α)I) Δ = βJᵗe - αw` for the weight change, raising
/// the damping `λ` until the objective `β·SSE + α·SSW` decreases. With Bayesian
/// regularization enabled, `α` and `β` are re-estimated after each epoch, otherwise they
/// stay at `0` and `1` (plain least squares).
pub struct LevenbergMarquardt<S> {
    net: Net,
    training: S,
    mode: ErrorMode,
    bayesian: bool,
    chain: JacobianChainRule,

    hessian: DMatrix<f64>,
    diagonal: DVector<f64>,
    gradient: DVector<f64>,
    /// Weights at the start of the epoch.
    snapshot: DVector<f64>,
    output: [f64; 1],

    lambda: f64,
    alpha: f64,
    beta: f64,
    sse: f64,
    error: f64,
    iterations: usize,
}

impl<S: TrainingSet> LevenbergMarquardt<S> {
    /// Builds a Levenberg-Marquardt trainer using `config.lma` and `config.error_mode`.
    ///
    /// # Returns
    /// * `Ok(LevenbergMarquardt)` if `net` has a single output and the set fits it;
    /// * `Err(TrainError::Config)` otherwise.
    ///
    /// # Examples
    /// ```
    /// # use flatprop::config::TrainingConfig;
    /// # use flatprop::data::BasicTrainingSet;
    /// # use flatprop::feedforward::{Activation, Layer, Net};
    /// # use flatprop::train::{LevenbergMarquardt, TrainError};
    /// let net = Net::new(&[Layer::input(2), Layer::new(2, Activation::Sigmoid, true)], None).unwrap();
    /// let set = BasicTrainingSet::new(2, 2, vec![0.0, 1.0], vec![1.0, 0.0]).unwrap();
    /// assert!(matches!(
    ///     LevenbergMarquardt::new(net, set, &TrainingConfig::default()),
    ///     Err(TrainError::Config(_))
    /// ));
    /// ```
    pub fn new(net: Net, training: S, config: &TrainingConfig) -> Result<Self, TrainError> {
        config.validate()?;
        if net.output_count() != 1 {
            return Err(ConfigError::OutputCount(SizeMismatch {
                expected: 1,
                got: net.output_count(),
            })
            .into());
        }
        check_training_set(&net, &training)?;

        let weights = net.weight_count();
        info!(
            "levenberg-marquardt{} over {} weight(s) and {} sample(s)",
            if config.lma.bayesian { " (bayesian)" } else { "" },
            weights,
            training.len()
        );

        Ok(Self {
            chain: JacobianChainRule::new(&net, training.len()),
            hessian: DMatrix::zeros(weights, weights),
            diagonal: DVector::zeros(weights),
            gradient: DVector::zeros(weights),
            snapshot: DVector::zeros(weights),
            output: [0.0],
            net,
            training,
            mode: config.error_mode,
            bayesian: config.lma.bayesian,
            lambda: config.lma.initial_lambda,
            alpha: 0.0,
            beta: 1.0,
            sse: 0.0,
            error: 0.0,
            iterations: 0,
        })
    }

    /// Half the sum of squared errors after the last epoch.
    pub fn sum_squared_errors(&self) -> f64 {
        self.sse
    }

    pub fn lambda(&self) -> f64 {
        self.lambda
    }

    /// Weight decay scale, `0` unless Bayesian regularization is on.
    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    /// Error scale, `1` unless Bayesian regularization is on.
    pub fn beta(&self) -> f64 {
        self.beta
    }

    /// Frees training buffers, consuming the trainer, and returns contained `Net` back.
    pub fn teardown(self) -> Net {
        self.net
    }

    /// Half the sum of squared errors of the current weights, infinite if an output isn't finite.
    fn current_sse(&mut self) -> f64 {
        let mut sse = 0.0;
        for index in 0..self.training.len() {
            let (input, ideal) = self.training.pair(index);
            // Sizes were checked at construction
            if self.net.process(input, &mut self.output).is_err() || !self.output[0].is_finite() {
                return f64::INFINITY;
            }
            let error = ideal[0] - self.output[0];
            sse += error * error;
        }
        sse / 2.0
    }

    fn sum_squared_weights(&self) -> f64 {
        self.net.weights().iter().map(|w| w * w).sum()
    }

    /// Configured error metric of a half sum of squared errors.
    fn metric(&self, sse: f64) -> f64 {
        let mse = 2.0 * sse / self.training.len() as f64;
        match self.mode {
            ErrorMode::Mse => mse,
            ErrorMode::Rms => mse.sqrt(),
        }
    }

    /// MacKay's evidence update of `alpha` and `beta`, from the last accepted decomposition.
    fn update_scales(&mut self, decomposition: Option<LU<f64, Dyn, Dyn>>, ssw: f64) {
        let inverse = match decomposition.and_then(|lu| lu.try_inverse()) {
            Some(inverse) => inverse,
            None => {
                warn!("no invertible hessian this epoch, keeping alpha and beta");
                return;
            }
        };
        if self.sse <= 0.0 {
            debug!("zero error, keeping alpha and beta");
            return;
        }

        let weights = self.net.weight_count() as f64;
        let samples = self.training.len() as f64;
        let trace = inverse.trace();

        let gamma = weights - self.alpha * trace;
        self.alpha = weights / (2.0 * ssw + trace);
        self.beta = ((samples - gamma) / (2.0 * self.sse)).abs();
    }
}

impl<S: TrainingSet> Train for LevenbergMarquardt<S> {
    fn iteration(&mut self) -> Result<(), TrainError> {
        self.snapshot.copy_from_slice(self.net.weights());

        self.sse = self.chain.calculate(&self.net, &self.training)?;
        let mut ssw = self.sum_squared_weights();

        let jacobian = self.chain.jacobian();
        self.hessian.gemm_tr(self.beta, jacobian, jacobian, 0.0);
        self.gradient
            .gemv_tr(self.beta, jacobian, self.chain.row_errors(), 0.0);
        self.gradient.axpy(-self.alpha, &self.snapshot, 1.0);
        self.diagonal.copy_from(&self.hessian.diagonal());

        let objective = self.beta * self.sse + self.alpha * ssw;
        let mut current = objective + 1.0;
        let mut decomposition = None;

        self.lambda /= SCALE_LAMBDA;
        while current >= objective && self.lambda < LAMBDA_MAX {
            self.lambda *= SCALE_LAMBDA;

            let damping = self.lambda + self.alpha;
            for (i, &d) in self.diagonal.iter().enumerate() {
                self.hessian[(i, i)] = d + damping;
            }

            let lu = self.hessian.clone().lu();
            let delta = match lu.solve(&self.gradient) {
                Some(delta) if delta.iter().all(|d| d.is_finite()) => delta,
                // Singular at this damping, retry with a larger one
                _ => continue,
            };

            for ((w, s), d) in self
                .net
                .weights_mut()
                .iter_mut()
                .zip(self.snapshot.iter())
                .zip(delta.iter())
            {
                *w = s + d;
            }
            decomposition = Some(lu);

            self.sse = self.current_sse();
            ssw = self.sum_squared_weights();
            current = self.beta * self.sse + self.alpha * ssw;
        }

        if current >= objective {
            warn!(
                "lambda reached {:e} without decreasing the objective {}",
                self.lambda, objective
            );
        }
        self.lambda /= SCALE_LAMBDA;

        if self.bayesian {
            self.update_scales(decomposition, ssw);
        }

        self.error = self.metric(self.sse);
        self.iterations += 1;
        debug!(
            "levenberg-marquardt epoch {}: error {}, lambda {:e}",
            self.iterations, self.error, self.lambda
        );

        Ok(())
    }

    fn error(&self) -> f64 {
        self.error
    }

    fn iterations(&self) -> usize {
        self.iterations
    }

    fn can_continue(&self) -> bool {
        false
    }

    fn pause(&self) -> Result<TrainingContinuation, TrainError> {
        Err(TrainError::Unsupported("pausing levenberg-marquardt"))
    }

    fn resume(&mut self, _state: TrainingContinuation) -> Result<(), TrainError> {
        Err(TrainError::Unsupported("resuming levenberg-marquardt"))
    }

    fn net(&self) -> &Net {
        &self.net
    }
}
