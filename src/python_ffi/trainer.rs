use pyo3::prelude::*;

use super::net::{to_py_layers, Net, PyLayer};
use crate::config::TrainingConfig;
use crate::data::{BasicTrainingSet, DataError};
use crate::feedforward::Net as InnerNet;
use crate::train::{
    Backpropagation, ConfigError, LevenbergMarquardt, MultiPropagation, ResilientPropagation,
    Train, TrainError, TrainingContinuation,
};
use crate::{Impl_to_PyErr, MakeConsumable};

/// Every trainer the bindings can build, over an in-memory set.
pub(super) enum AnyTrainer {
    Backprop(Backpropagation<BasicTrainingSet>),
    Rprop(ResilientPropagation<BasicTrainingSet>),
    Lma(LevenbergMarquardt<BasicTrainingSet>),
    Multi(MultiPropagation<BasicTrainingSet>),
}

impl AnyTrainer {
    fn as_train(&self) -> &dyn Train {
        match self {
            AnyTrainer::Backprop(t) => t,
            AnyTrainer::Rprop(t) => t,
            AnyTrainer::Lma(t) => t,
            AnyTrainer::Multi(t) => t,
        }
    }

    fn as_train_mut(&mut self) -> &mut dyn Train {
        match self {
            AnyTrainer::Backprop(t) => t,
            AnyTrainer::Rprop(t) => t,
            AnyTrainer::Lma(t) => t,
            AnyTrainer::Multi(t) => t,
        }
    }

    fn teardown(self) -> InnerNet {
        match self {
            AnyTrainer::Backprop(t) => t.teardown(),
            AnyTrainer::Rprop(t) => t.teardown(),
            AnyTrainer::Lma(t) => t.teardown(),
            AnyTrainer::Multi(t) => t.teardown(),
        }
    }
}

MakeConsumable!(ConsumableTrainer, AnyTrainer, Trainer);

type Build = fn(InnerNet, BasicTrainingSet, &TrainingConfig) -> Result<AnyTrainer, TrainError>;

#[pyclass]
pub struct Trainer {
    pub(super) trainer: ConsumableTrainer,
    pub(super) outputs_buffer: Box<[f64]>,
    pub(super) process_buffer: Box<[f64]>,
}

impl Trainer {
    /// Builds a trainer over a copy of `net`; `net` is consumed only if that succeeds.
    fn build(
        net: &mut Net,
        samples: Vec<(Vec<f64>, Vec<f64>)>,
        config_json: Option<&str>,
        build: Build,
    ) -> PyResult<Trainer> {
        let config = match config_json {
            Some(json) => TrainingConfig::from_json(json)?,
            None => TrainingConfig::default(),
        };
        let inner = net.net.get_ref()?.clone();
        let process_buffer = vec![0.0; inner.buffer_size()].into_boxed_slice();
        let training =
            BasicTrainingSet::from_pairs(samples, inner.input_count(), inner.output_count())?;

        let trainer = build(inner, training, &config)?;
        net.net.release()?;

        Ok(Trainer {
            trainer: ConsumableTrainer::acquire(trainer),
            outputs_buffer: net.outputs_buffer.clone(),
            process_buffer,
        })
    }
}

#[pymethods]
impl Trainer {
    #[staticmethod]
    #[args(config_json = "None")]
    pub fn backprop(
        mut net: PyRefMut<Net>,
        samples: Vec<(Vec<f64>, Vec<f64>)>,
        config_json: Option<&str>,
    ) -> PyResult<Trainer> {
        Trainer::build(&mut net, samples, config_json, |net, set, config| {
            Ok(AnyTrainer::Backprop(Backpropagation::new(net, set, config)?))
        })
    }

    #[staticmethod]
    #[args(config_json = "None")]
    pub fn rprop(
        mut net: PyRefMut<Net>,
        samples: Vec<(Vec<f64>, Vec<f64>)>,
        config_json: Option<&str>,
    ) -> PyResult<Trainer> {
        Trainer::build(&mut net, samples, config_json, |net, set, config| {
            Ok(AnyTrainer::Rprop(ResilientPropagation::new(net, set, config)?))
        })
    }

    #[staticmethod]
    #[args(config_json = "None")]
    pub fn lma(
        mut net: PyRefMut<Net>,
        samples: Vec<(Vec<f64>, Vec<f64>)>,
        config_json: Option<&str>,
    ) -> PyResult<Trainer> {
        Trainer::build(&mut net, samples, config_json, |net, set, config| {
            Ok(AnyTrainer::Lma(LevenbergMarquardt::new(net, set, config)?))
        })
    }

    #[staticmethod]
    #[args(config_json = "None")]
    pub fn mprop(
        mut net: PyRefMut<Net>,
        samples: Vec<(Vec<f64>, Vec<f64>)>,
        config_json: Option<&str>,
    ) -> PyResult<Trainer> {
        Trainer::build(&mut net, samples, config_json, |net, set, config| {
            Ok(AnyTrainer::Multi(MultiPropagation::new(net, set, config)?))
        })
    }

    pub fn layers(&self) -> PyResult<Vec<PyLayer>> {
        to_py_layers(self.trainer.get_ref()?.as_train().net().layers())
    }

    pub fn export_net(&self) -> PyResult<(Vec<PyLayer>, Vec<f64>)> {
        let (layers, coeffs) = self.trainer.get_ref()?.as_train().net().export();
        Ok((to_py_layers(layers)?, coeffs.to_owned()))
    }

    /// Runs the current network without training it.
    pub fn process(&mut self, inputs: Vec<f64>) -> PyResult<Vec<f64>> {
        let net = self.trainer.get_ref()?.as_train().net();
        net.process_with(&inputs, &mut self.outputs_buffer, &mut self.process_buffer)?;
        Ok(self.outputs_buffer.to_vec())
    }

    /// Runs one epoch and returns its error.
    pub fn iteration(&mut self) -> PyResult<f64> {
        let trainer = self.trainer.get_ref_mut()?.as_train_mut();
        trainer.iteration()?;
        Ok(trainer.error())
    }

    pub fn error(&self) -> PyResult<f64> {
        Ok(self.trainer.get_ref()?.as_train().error())
    }

    pub fn iterations(&self) -> PyResult<usize> {
        Ok(self.trainer.get_ref()?.as_train().iterations())
    }

    /// Runs epochs until the error drops below `target_error` or `max_epochs` ran.
    pub fn train_until(&mut self, target_error: f64, max_epochs: usize) -> PyResult<usize> {
        Ok(self
            .trainer
            .get_ref_mut()?
            .as_train_mut()
            .train_until(target_error, max_epochs)?)
    }

    pub fn can_continue(&self) -> PyResult<bool> {
        Ok(self.trainer.get_ref()?.as_train().can_continue())
    }

    /// Training state as a JSON document, for `resume`.
    pub fn pause(&self) -> PyResult<String> {
        let state = self.trainer.get_ref()?.as_train().pause()?;
        serde_json::to_string(&state)
            .map_err(|err| TrainError::from(ConfigError::Parse(err.to_string())).into())
    }

    pub fn resume(&mut self, state: &str) -> PyResult<()> {
        let state: TrainingContinuation = serde_json::from_str(state)
            .map_err(|err| TrainError::from(ConfigError::Parse(err.to_string())))?;
        Ok(self.trainer.get_ref_mut()?.as_train_mut().resume(state)?)
    }

    pub fn teardown(&mut self) -> PyResult<Net> {
        Ok(Net::wrap(self.trainer.release()?.teardown()))
    }
}

Impl_to_PyErr!(for TrainError, ConfigError, DataError);
