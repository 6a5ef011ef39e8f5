//! Python FFI
//!
//! Built with the `python` feature, as module `flatprop` with classes `Net` and `Trainer`.
use pyo3::prelude::*;

mod gen_macros;
pub mod net;
pub mod trainer;

#[pymodule]
fn flatprop(_py: Python, m: &PyModule) -> PyResult<()> {
    m.add_class::<net::Net>()?;
    m.add_class::<trainer::Trainer>()?;
    Ok(())
}
