//! Feedforward neural network stored as one flat array of coefficients

mod activation;
mod net;

pub use activation::*;
pub use net::*;
