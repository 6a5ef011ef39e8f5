use log::{debug, info};

use super::{
    check_training_set, gradient::GradientWorker, update::TrainingContinuation, Momentum, Rprop,
    Train, TrainError, UpdateRule,
};
use crate::config::TrainingConfig;
use crate::data::TrainingSet;
use crate::feedforward::Net;

/// Batch propagation trainer: every epoch accumulates the gradient over the whole training
/// set, then lets its `UpdateRule` change the weights once.
///
/// Training procedure will look like this:
/// * One builds a trainer with `Backpropagation::new` or `ResilientPropagation::new`,
/// which consumes the `Net`.
/// * Every `Train::iteration` call runs one epoch; `Train::error` gives the error measured
/// during that epoch's pass, before the weights were updated.
/// * Once finished training, one can use `Propagation::teardown` to free all the additional buffers
/// and get the `Net` back.
pub struct Propagation<S, U> {
    net: Net,
    training: S,
    rule: U,
    worker: GradientWorker,
    error: f64,
    iterations: usize,
}

/// Backpropagation with learning rate and momentum.
pub type Backpropagation<S> = Propagation<S, Momentum>;

/// Resilient propagation (RPROP).
pub type ResilientPropagation<S> = Propagation<S, Rprop>;

impl<S: TrainingSet> Propagation<S, Momentum> {
    /// Builds a backpropagation trainer using `config.backprop`.
    ///
    /// # Examples
    /// ```
    /// # use flatprop::config::TrainingConfig;
    /// # use flatprop::data::BasicTrainingSet;
    /// # use flatprop::feedforward::{Activation, Layer, Net};
    /// # use flatprop::train::{Backpropagation, Train};
    /// let net = Net::new(&[Layer::input(2), Layer::new(1, Activation::Sigmoid, true)], None).unwrap();
    /// let set = BasicTrainingSet::new(2, 1, vec![0.0, 1.0, 1.0, 0.0], vec![1.0, 0.0]).unwrap();
    /// let mut trainer = Backpropagation::new(net, set, &TrainingConfig::default()).unwrap();
    /// trainer.iteration().unwrap();
    /// assert_eq!(trainer.iterations(), 1);
    /// ```
    pub fn new(net: Net, training: S, config: &TrainingConfig) -> Result<Self, TrainError> {
        let rule = Momentum::new(config.backprop, net.weight_count());
        Propagation::with_rule(net, training, config, rule)
    }
}

impl<S: TrainingSet> Propagation<S, Rprop> {
    /// Builds a resilient propagation trainer using `config.rprop` and `config.zero_tolerance`.
    pub fn new(net: Net, training: S, config: &TrainingConfig) -> Result<Self, TrainError> {
        let rule = Rprop::new(config.rprop, config.zero_tolerance, net.weight_count());
        Propagation::with_rule(net, training, config, rule)
    }
}

impl<S: TrainingSet, U: UpdateRule> Propagation<S, U> {
    /// Builds a trainer around any update rule.
    ///
    /// # Returns
    /// * `Ok(Propagation)` if `config` is valid and the training set is non-empty and fits the network;
    /// * `Err(TrainError::Config)` otherwise.
    pub fn with_rule(
        net: Net,
        training: S,
        config: &TrainingConfig,
        rule: U,
    ) -> Result<Self, TrainError> {
        config.validate()?;
        check_training_set(&net, &training)?;

        info!(
            "{} over {} weight(s) and {} sample(s)",
            rule.name(),
            net.weight_count(),
            training.len()
        );

        Ok(Self {
            worker: GradientWorker::new(&net, config.error_mode),
            net,
            training,
            rule,
            error: 0.0,
            iterations: 0,
        })
    }

    /// Gradients accumulated by the last epoch.
    pub fn gradients(&self) -> &[f64] {
        self.worker.gradients()
    }

    pub fn rule(&self) -> &U {
        &self.rule
    }

    /// Frees training buffers, consuming the trainer, and returns contained `Net` back.
    pub fn teardown(self) -> Net {
        self.net
    }
}

impl<S: TrainingSet, U: UpdateRule> Train for Propagation<S, U> {
    fn iteration(&mut self) -> Result<(), TrainError> {
        self.worker.reset();
        self.worker
            .run(&self.net, &self.training, 0..self.training.len())?;

        self.rule
            .update(self.worker.gradients(), self.net.weights_mut());

        self.error = self.worker.error();
        self.iterations += 1;
        debug!(
            "{} epoch {}: error {}",
            self.rule.name(),
            self.iterations,
            self.error
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
        true
    }

    fn pause(&self) -> Result<TrainingContinuation, TrainError> {
        Ok(self.rule.pause())
    }

    fn resume(&mut self, state: TrainingContinuation) -> Result<(), TrainError> {
        self.rule.resume(state)
    }

    fn net(&self) -> &Net {
        &self.net
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{BasicTrainingSet, SequentialTrainingSet};
    use crate::feedforward::{Activation, Layer};
    use crate::train::ConfigError;

    fn and_set() -> BasicTrainingSet {
        BasicTrainingSet::from_pairs(
            vec![
                (vec![0.0, 0.0], vec![0.0]),
                (vec![0.0, 1.0], vec![0.0]),
                (vec![1.0, 0.0], vec![0.0]),
                (vec![1.0, 1.0], vec![1.0]),
            ],
            2,
            1,
        )
        .unwrap()
    }

    fn perceptron() -> Net {
        Net::with_seed(
            &[Layer::input(2), Layer::new(1, Activation::Sigmoid, true)],
            11,
        )
        .unwrap()
    }

    #[test]
    fn backpropagation_learns_and() {
        let mut trainer =
            Backpropagation::new(perceptron(), and_set(), &TrainingConfig::default()).unwrap();

        trainer.iteration().unwrap();
        let first = trainer.error();
        for _ in 0..2000 {
            trainer.iteration().unwrap();
        }
        assert!(trainer.error() < first);
        assert!(trainer.error() < 0.05, "error {}", trainer.error());
    }

    #[test]
    fn update_uses_gradient_of_the_epoch() {
        let config = TrainingConfig::default();
        let net = perceptron();
        let before = net.to_array();
        let mut trainer = Backpropagation::new(net, and_set(), &config).unwrap();

        trainer.iteration().unwrap();
        let gradients = trainer.gradients().to_vec();
        let after = trainer.teardown().to_array();

        // First epoch has no momentum term yet
        for ((b, a), g) in before.iter().zip(after.iter()).zip(gradients.iter()) {
            assert!((a - (b + g * config.backprop.learning_rate)).abs() < 1e-12);
        }
    }

    #[test]
    fn rejects_sets_that_do_not_fit() {
        let set = BasicTrainingSet::new(3, 1, vec![0.0; 3], vec![0.0]).unwrap();
        let err = ResilientPropagation::new(perceptron(), set, &TrainingConfig::default());
        assert!(matches!(
            err,
            Err(TrainError::Config(ConfigError::DataShape(_, _)))
        ));

        let empty = BasicTrainingSet::new(2, 1, vec![], vec![]).unwrap();
        let err = ResilientPropagation::new(perceptron(), empty, &TrainingConfig::default());
        assert!(matches!(
            err,
            Err(TrainError::Config(ConfigError::EmptyTrainingSet))
        ));
    }

    #[test]
    fn accepts_sequential_sets() {
        let mut trainer = ResilientPropagation::new(
            perceptron(),
            SequentialTrainingSet(and_set()),
            &TrainingConfig::default(),
        )
        .unwrap();
        trainer.iteration().unwrap();
        assert!(trainer.error() > 0.0);
    }

    #[test]
    fn pause_and_resume_continue_identically() {
        let config = TrainingConfig::default();
        let mut a = ResilientPropagation::new(perceptron(), and_set(), &config).unwrap();
        for _ in 0..5 {
            a.iteration().unwrap();
        }
        let state = a.pause().unwrap();

        let mut b = ResilientPropagation::new(a.net().clone(), and_set(), &config).unwrap();
        b.resume(state).unwrap();

        a.iteration().unwrap();
        b.iteration().unwrap();
        assert_eq!(a.net().weights(), b.net().weights());
        assert!(a.can_continue());
    }

    #[test]
    fn train_until_stops_at_target() {
        let mut trainer =
            ResilientPropagation::new(perceptron(), and_set(), &TrainingConfig::default())
                .unwrap();
        let epochs = trainer.train_until(0.01, 5000).unwrap();
        assert!(epochs < 5000);
        assert!(trainer.error() < 0.01);
        assert_eq!(trainer.iterations(), epochs);
    }
}
