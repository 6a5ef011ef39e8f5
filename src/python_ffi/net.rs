use pyo3::{exceptions::PyValueError, prelude::*};
use serde_json::Value;

use crate::feedforward::{
    Activation, Layer, Net as InnerNet, NewNetError, ProcessError, SizeMismatch,
};
use crate::{Impl_to_PyErr, MakeConsumable};

MakeConsumable!(ConsumableNet, InnerNet, Net);

/// Layer description as seen from Python: `(size, activation name, has_bias)`.
pub(super) type PyLayer = (usize, String, bool);

pub(super) fn to_py_layers(layers: &[Layer]) -> PyResult<Vec<PyLayer>> {
    layers[1..]
        .iter()
        .map(|layer| match serde_json::to_value(layer.activation) {
            Ok(Value::String(name)) => Ok((layer.size, name, layer.has_bias)),
            _ => Err(PyValueError::new_err(format!(
                "Can't name activation function {:?}!",
                layer.activation
            ))),
        })
        .collect()
}

#[pyclass]
pub struct Net {
    pub(super) net: ConsumableNet,
    pub(super) outputs_buffer: Box<[f64]>,
}

impl Net {
    pub(super) fn wrap(net: InnerNet) -> Self {
        let outputs_buffer = vec![0.0; net.output_count()].into_boxed_slice();
        Self {
            net: ConsumableNet::acquire(net),
            outputs_buffer,
        }
    }
}

#[pymethods]
impl Net {
    /// `Net(inputs, layers, coefficients=None)`, where `layers` lists the computing layers.
    #[new]
    pub fn new(
        inputs: usize,
        layers: Vec<PyLayer>,
        coefficients: Option<Vec<f64>>,
    ) -> PyResult<Self> {
        let mut all = Vec::with_capacity(layers.len() + 1);
        all.push(Layer::input(inputs));
        for (size, name, has_bias) in layers {
            let activation: Activation = serde_json::from_value(Value::String(name.clone()))
                .map_err(|_| {
                    PyValueError::new_err(format!("Unknown activation function {:?}!", name))
                })?;
            all.push(Layer::new(size, activation, has_bias));
        }

        let net = InnerNet::new(&all, coefficients.map(|v| v.into_boxed_slice()))?;
        Ok(Net::wrap(net))
    }

    pub fn input_count(&self) -> PyResult<usize> {
        Ok(self.net.get_ref()?.input_count())
    }

    pub fn layers(&self) -> PyResult<Vec<PyLayer>> {
        to_py_layers(self.net.get_ref()?.layers())
    }

    pub fn export(&self) -> PyResult<(Vec<PyLayer>, Vec<f64>)> {
        let (layers, coeffs) = self.net.get_ref()?.export();
        Ok((to_py_layers(layers)?, coeffs.to_owned()))
    }

    pub fn set_weights(&mut self, coefficients: Vec<f64>) -> PyResult<()> {
        Ok(self.net.get_ref_mut()?.from_array(&coefficients)?)
    }

    pub fn process(&mut self, inputs: Vec<f64>) -> PyResult<Vec<f64>> {
        self.net
            .get_ref_mut()?
            .process(inputs.as_ref(), &mut self.outputs_buffer)?;
        Ok(self.outputs_buffer.to_vec())
    }
}

Impl_to_PyErr!(for NewNetError, ProcessError, SizeMismatch);
