// Select the BLAS/LAPACK backend used by `ndarray-linalg` and `lapack`
extern crate blas_src;

mod errors;
pub use errors::Error;
mod config;
pub use config::{ForwardModelSettings, Kcsd2dConfig, LookupTableTuning};
mod basis;
pub use basis::BasisType;
pub mod grid;
pub mod forward_model;
pub mod lookup_table;
pub mod kernel;
pub mod solver;
pub use solver::EstimationMode;
pub mod cross_validation;
mod kcsd2d;
pub use kcsd2d::Kcsd2d;

#[cfg(feature = "python")]
mod python;
#[cfg(feature = "python")]
use pyo3::prelude::*;

/// A Python module implemented in Rust; bindings added here
#[cfg(feature = "python")]
#[pymodule]
fn kcsd_rs(_py: Python, m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<python::PyKcsd2d>()?;

    Ok(())
}
