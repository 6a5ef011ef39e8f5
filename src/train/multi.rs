use std::ops::Range;

use log::{debug, info, warn};
use rayon::prelude::*;

use super::{
    check_training_set, gradient::GradientWorker, update::TrainingContinuation, ConfigError,
    GradientMap, ResilientPropagation, Rprop, Train, TrainError, UpdateRule,
};
use crate::config::TrainingConfig;
use crate::data::TrainingSet;
use crate::feedforward::Net;

/// One partition of the training set, with a private copy of the network.
struct Worker {
    net: Net,
    gradient: GradientWorker,
    range: Range<usize>,
}

struct Parallel<S> {
    net: Net,
    training: S,
    rule: Rprop,
    workers: Vec<Worker>,
    map: GradientMap,
    pool: rayon::ThreadPool,
    gradients: Box<[f64]>,
    error: f64,
    iterations: usize,
}

enum Mode<S> {
    /// Too few samples per thread, plain resilient propagation does the work.
    Fallback(ResilientPropagation<S>),
    Parallel(Parallel<S>),
}

/// Multi-threaded resilient propagation.
///
/// The training set is split into contiguous ranges, one per worker. Every epoch each worker
/// copies the master weights, accumulates the gradients of its range in parallel, and once
/// all of them are done the `GradientMap` sums their gradients into the master's, which
/// then takes a single RPROP step.
///
/// When the set has fewer than `config.multi.min_per_thread` samples per thread, or a single
/// thread is requested, the trainer runs plain `ResilientPropagation` instead.
pub struct MultiPropagation<S> {
    mode: Mode<S>,
}

/// Splits `0..len` into `parts` contiguous ranges whose sizes differ by at most one.
fn partition(len: usize, parts: usize) -> Vec<Range<usize>> {
    let base = len / parts;
    let remainder = len % parts;

    let mut start = 0;
    (0..parts)
        .map(|i| {
            let end = start + base + if i < remainder { 1 } else { 0 };
            let range = start..end;
            start = end;
            range
        })
        .collect()
}

impl<S: TrainingSet> MultiPropagation<S> {
    /// Builds a multi-threaded trainer using `config.multi`, `config.rprop` and `config.error_mode`.
    ///
    /// # Returns
    /// * `Ok(MultiPropagation)` if the set is indexable, non-empty and fits the network;
    /// * `Err(TrainError::Config)` otherwise.
    ///
    /// # Examples
    /// ```
    /// # use flatprop::config::TrainingConfig;
    /// # use flatprop::data::BasicTrainingSet;
    /// # use flatprop::feedforward::{Activation, Layer, Net};
    /// # use flatprop::train::{MultiPropagation, Train};
    /// let net = Net::new(&[Layer::input(1), Layer::new(1, Activation::Tanh, true)], None).unwrap();
    /// let set = BasicTrainingSet::new(1, 1, vec![0.5; 50], vec![0.1; 50]).unwrap();
    /// let mut config = TrainingConfig::default();
    /// config.multi.threads = 8;
    ///
    /// let mut trainer = MultiPropagation::new(net, set, &config).unwrap();
    /// assert!(trainer.is_fallback());
    /// trainer.iteration().unwrap();
    /// ```
    pub fn new(net: Net, training: S, config: &TrainingConfig) -> Result<Self, TrainError> {
        config.validate()?;
        if !training.is_indexable() {
            return Err(ConfigError::NotIndexable.into());
        }
        check_training_set(&net, &training)?;

        let threads = match config.multi.threads {
            0 => rayon::current_num_threads(),
            threads => threads,
        };
        let samples = training.len();

        if threads <= 1 || samples / threads < config.multi.min_per_thread {
            info!(
                "{} sample(s) over {} thread(s) is below {} per thread, training single-threaded",
                samples, threads, config.multi.min_per_thread
            );
            return Self::fallback(net, training, config);
        }

        let pool = match rayon::ThreadPoolBuilder::new().num_threads(threads).build() {
            Ok(pool) => pool,
            Err(err) => {
                warn!("can't start {} worker thread(s): {}", threads, err);
                return Self::fallback(net, training, config);
            }
        };

        let workers: Vec<Worker> = partition(samples, threads)
            .into_iter()
            .map(|range| Worker {
                net: net.clone(),
                gradient: GradientWorker::new(&net, config.error_mode),
                range,
            })
            .collect();
        let map = {
            let clones: Vec<&Net> = workers.iter().map(|w| &w.net).collect();
            GradientMap::new(&net, &clones)?
        };

        info!(
            "multi-threaded resilient propagation over {} weight(s), {} sample(s) split in {} partition(s) of ~{}",
            net.weight_count(),
            samples,
            threads,
            samples / threads
        );

        Ok(Self {
            mode: Mode::Parallel(Parallel {
                rule: Rprop::new(config.rprop, config.zero_tolerance, net.weight_count()),
                gradients: vec![0.0; net.weight_count()].into_boxed_slice(),
                net,
                training,
                workers,
                map,
                pool,
                error: 0.0,
                iterations: 0,
            }),
        })
    }

    fn fallback(net: Net, training: S, config: &TrainingConfig) -> Result<Self, TrainError> {
        Ok(Self {
            mode: Mode::Fallback(ResilientPropagation::new(net, training, config)?),
        })
    }

    /// Whether training runs single-threaded.
    pub fn is_fallback(&self) -> bool {
        matches!(self.mode, Mode::Fallback(_))
    }

    /// Number of partitions, `1` when falling back.
    pub fn thread_count(&self) -> usize {
        match &self.mode {
            Mode::Fallback(_) => 1,
            Mode::Parallel(parallel) => parallel.workers.len(),
        }
    }

    /// Sample ranges handled by each worker, empty when falling back.
    pub fn partitions(&self) -> Vec<Range<usize>> {
        match &self.mode {
            Mode::Fallback(_) => Vec::new(),
            Mode::Parallel(parallel) => parallel.workers.iter().map(|w| w.range.clone()).collect(),
        }
    }

    /// The map merging worker gradients, `None` when falling back.
    pub fn gradient_map(&self) -> Option<&GradientMap> {
        match &self.mode {
            Mode::Fallback(_) => None,
            Mode::Parallel(parallel) => Some(&parallel.map),
        }
    }

    /// Gradients of the whole set accumulated by the last epoch.
    pub fn gradients(&self) -> &[f64] {
        match &self.mode {
            Mode::Fallback(trainer) => trainer.gradients(),
            Mode::Parallel(parallel) => &parallel.gradients,
        }
    }

    /// Frees training buffers and worker threads, consuming the trainer, and returns contained `Net` back.
    pub fn teardown(self) -> Net {
        match self.mode {
            Mode::Fallback(trainer) => trainer.teardown(),
            Mode::Parallel(parallel) => parallel.net,
        }
    }
}

impl<S: TrainingSet> Parallel<S> {
    fn iteration(&mut self) -> Result<(), TrainError> {
        for worker in self.workers.iter_mut() {
            worker.net.weights_mut().copy_from_slice(self.net.weights());
            worker.gradient.reset();
        }

        let training = &self.training;
        let workers = &mut self.workers;
        // Returns once every worker is done
        self.pool.install(|| {
            workers.par_iter_mut().try_for_each(|worker| {
                worker
                    .gradient
                    .run(&worker.net, training, worker.range.clone())
            })
        })?;

        let error = self.workers.iter().map(|w| w.gradient.error()).sum::<f64>()
            / self.workers.len() as f64;

        for g in self.gradients.iter_mut() {
            *g = 0.0;
        }
        let mut sources: Vec<&mut [f64]> = self
            .workers
            .iter_mut()
            .map(|w| w.gradient.gradients_mut())
            .collect();
        self.map.merge(&mut self.gradients, &mut sources);

        self.rule.update(&self.gradients, self.net.weights_mut());

        self.error = error;
        self.iterations += 1;
        debug!(
            "multi-threaded resilient propagation epoch {}: error {}",
            self.iterations, self.error
        );

        Ok(())
    }
}

impl<S: TrainingSet> Train for MultiPropagation<S> {
    fn iteration(&mut self) -> Result<(), TrainError> {
        match &mut self.mode {
            Mode::Fallback(trainer) => trainer.iteration(),
            Mode::Parallel(parallel) => parallel.iteration(),
        }
    }

    fn error(&self) -> f64 {
        match &self.mode {
            Mode::Fallback(trainer) => trainer.error(),
            Mode::Parallel(parallel) => parallel.error,
        }
    }

    fn iterations(&self) -> usize {
        match &self.mode {
            Mode::Fallback(trainer) => trainer.iterations(),
            Mode::Parallel(parallel) => parallel.iterations,
        }
    }

    fn can_continue(&self) -> bool {
        true
    }

    fn pause(&self) -> Result<TrainingContinuation, TrainError> {
        match &self.mode {
            Mode::Fallback(trainer) => trainer.pause(),
            Mode::Parallel(parallel) => Ok(parallel.rule.pause()),
        }
    }

    fn resume(&mut self, state: TrainingContinuation) -> Result<(), TrainError> {
        match &mut self.mode {
            Mode::Fallback(trainer) => trainer.resume(state),
            Mode::Parallel(parallel) => parallel.rule.resume(state),
        }
    }

    fn net(&self) -> &Net {
        match &self.mode {
            Mode::Fallback(trainer) => trainer.net(),
            Mode::Parallel(parallel) => &parallel.net,
        }
    }
}
