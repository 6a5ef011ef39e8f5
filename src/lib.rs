//! Training core for flat feedforward networks.
//!
//! A `feedforward::Net` keeps every weight and bias in one flat array. Trainers in `train`
//! (backpropagation, resilient propagation, Levenberg-Marquardt and multi-threaded resilient
//! propagation) take ownership of a network and a `data::TrainingSet`, and run one epoch
//! per `train::Train::iteration` call.
//!
//! ```
//! use flatprop::config::TrainingConfig;
//! use flatprop::data::BasicTrainingSet;
//! use flatprop::feedforward::{Activation, Layer, Net};
//! use flatprop::train::{ResilientPropagation, Train};
//!
//! let net = Net::with_seed(
//!     &[Layer::input(2), Layer::new(4, Activation::Tanh, true), Layer::new(1, Activation::Sigmoid, true)],
//!     42,
//! ).unwrap();
//! let xor = BasicTrainingSet::new(
//!     2, 1,
//!     vec![0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 1.0, 1.0],
//!     vec![0.0, 1.0, 1.0, 0.0],
//! ).unwrap();
//!
//! let mut trainer = ResilientPropagation::new(net, xor, &TrainingConfig::default()).unwrap();
//! trainer.train_until(0.01, 100).unwrap();
//! let net = trainer.teardown();
//! ```

pub mod config;
pub mod data;
pub mod feedforward;
pub mod train;

#[cfg(feature = "python")]
pub mod python_ffi;
