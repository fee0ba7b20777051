use crate::basis::BasisType;
use crate::config::Kcsd2dConfig;
use crate::errors::Error;
use crate::kcsd2d::Kcsd2d;
use ndarray::{Array1, Array2, Array3};
use numpy::IntoPyArray; // converting to python data types
use numpy::PyArrayMethods; // used in to convert python data into ndarray
use numpy::{PyArray1, PyArray2, PyArray3};
use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;
use pyo3::types::PyDict;

impl From<Error> for PyErr {
    fn from(error: Error) -> Self {
        return PyValueError::new_err(error.to_string());
    }
}

/// Python class `KCSD2D(ele_pos, pots, src_type="gauss", **params)`
///
/// Recognised `params`: `sigma`, `n_src_init` (or `n_srcs_init`), `R_init`, `h`, `xmin`, `xmax`,
/// `ymin`, `ymax`, `ext` (both axes) or `ext_x` and `ext_y`, `gdX`, `gdY`, `lambd`.
#[pyclass(name = "KCSD2D")]
pub struct PyKcsd2d {
    inner: Kcsd2d,
}

/// Python accessible methods
#[pymethods]
impl PyKcsd2d {
    #[new]
    #[pyo3(signature = (ele_pos, pots, src_type="gauss", **params))]
    pub fn new(
        py: Python,
        ele_pos: &Bound<'_, PyArray2<f64>>,
        pots: &Bound<'_, PyArray2<f64>>,
        src_type: &str,
        params: Option<&Bound<'_, PyDict>>,
    ) -> PyResult<Self> {
        // Change Python types into Rust types
        let electrode_positions: Array2<f64> = ele_pos.to_owned_array();
        let potentials: Array2<f64> = pots.to_owned_array();
        let config: Kcsd2dConfig = config_from_params(params)?;
        let basis: BasisType = src_type.parse()?;

        let inner: Kcsd2d = py.allow_threads(|| Kcsd2d::new(electrode_positions, potentials, basis, config))?;
        return Ok(PyKcsd2d { inner });
    }

    /// Estimated CSD ("CSD") or potential ("POT"), shape = (n_x, n_y, n_time)
    #[pyo3(signature = (estimate="CSD"))]
    pub fn values(&self, py: Python, estimate: &str) -> PyResult<Py<PyArray3<f64>>> {
        let values: Array3<f64> = py.allow_threads(|| self.inner.values_by_name(estimate))?;
        return Ok(values.into_pyarray(py).into());
    }

    /// Leave-one-out search over `Rs` and `lambdas`; adopts and returns the best `(R, lambda)`
    #[allow(non_snake_case)]
    #[pyo3(signature = (lambdas=None, Rs=None))]
    pub fn cross_validate(&mut self, py: Python, lambdas: Option<&Bound<'_, PyArray1<f64>>>, Rs: Option<&Bound<'_, PyArray1<f64>>>) -> PyResult<(f64, f64)> {
        let lambdas: Option<Array1<f64>> = lambdas.map(|lambdas| lambdas.to_owned_array());
        let rs: Option<Array1<f64>> = Rs.map(|rs| rs.to_owned_array());

        let inner: &mut Kcsd2d = &mut self.inner;
        let best: (f64, f64) = py.allow_threads(|| inner.cross_validate(rs.as_ref(), lambdas.as_ref()))?;
        return Ok(best);
    }

    #[pyo3(name = "update_R")]
    pub fn update_r(&mut self, py: Python, r: f64) -> PyResult<()> {
        let inner: &mut Kcsd2d = &mut self.inner;
        py.allow_threads(|| inner.update_r(r))?;
        return Ok(());
    }

    pub fn update_lambda(&mut self, lambd: f64) -> PyResult<()> {
        self.inner.update_lambda(lambd)?;
        return Ok(());
    }

    #[getter(R)]
    pub fn get_r(&self) -> f64 {
        return self.inner.r();
    }

    #[getter]
    pub fn get_lambd(&self) -> f64 {
        return self.inner.lambda();
    }

    #[getter]
    pub fn get_src_type(&self) -> String {
        return self.inner.basis().name().to_string();
    }

    #[getter]
    pub fn get_dist_max(&self) -> f64 {
        return self.inner.dist_max();
    }

    /// x coordinates of the estimation grid
    #[getter]
    pub fn get_estm_x(&self, py: Python) -> Py<PyArray1<f64>> {
        return self.inner.estimation_grid().x.clone().into_pyarray(py).into();
    }

    /// y coordinates of the estimation grid
    #[getter]
    pub fn get_estm_y(&self, py: Python) -> Py<PyArray1<f64>> {
        return self.inner.estimation_grid().y.clone().into_pyarray(py).into();
    }

    /// Leave-one-out errors of the last cross-validation, shape = (n_R, n_lambda)
    #[getter]
    pub fn get_cv_errors(&self, py: Python) -> Option<Py<PyArray2<f64>>> {
        return self
            .inner
            .cross_validation()
            .map(|result| result.errors.clone().into_pyarray(py).into());
    }
}

/// Keyword arguments understood by `KCSD2D`
#[derive(Clone, Copy, Debug, PartialEq)]
enum Param {
    Sigma,
    NSrcInit,
    RInit,
    H,
    XMin,
    XMax,
    YMin,
    YMax,
    Ext,
    ExtX,
    ExtY,
    GdX,
    GdY,
    Lambd,
}

impl Param {
    fn from_key(key: &str) -> Option<Self> {
        let param: Param = match key {
            "sigma" => Param::Sigma,
            "n_src_init" | "n_srcs_init" => Param::NSrcInit,
            "R_init" => Param::RInit,
            "h" => Param::H,
            "xmin" => Param::XMin,
            "xmax" => Param::XMax,
            "ymin" => Param::YMin,
            "ymax" => Param::YMax,
            "ext" => Param::Ext,
            "ext_x" => Param::ExtX,
            "ext_y" => Param::ExtY,
            "gdX" => Param::GdX,
            "gdY" => Param::GdY,
            "lambd" => Param::Lambd,
            _ => return None,
        };
        return Some(param);
    }
}

/// Named keyword arguments into a `Kcsd2dConfig`, unknown names are an error
fn config_from_params(params: Option<&Bound<'_, PyDict>>) -> PyResult<Kcsd2dConfig> {
    let mut config: Kcsd2dConfig = Kcsd2dConfig::default();
    let params: &Bound<'_, PyDict> = match params {
        Some(params) => params,
        None => return Ok(config),
    };

    for (key, value) in params.iter() {
        let key: String = key.extract()?;
        let param: Param = Param::from_key(&key).ok_or_else(|| {
            PyValueError::new_err(format!(
                "unknown parameter \"{}\", available are: sigma, n_src_init, n_srcs_init, R_init, h, xmin, xmax, ymin, ymax, ext, ext_x, ext_y, gdX, gdY, lambd",
                key
            ))
        })?;
        match param {
            Param::Sigma => config.sigma = value.extract()?,
            Param::NSrcInit => config.n_src_init = value.extract()?,
            Param::RInit => config.r_init = value.extract()?,
            Param::H => config.h = value.extract()?,
            Param::XMin => config.x_min = Some(value.extract()?),
            Param::XMax => config.x_max = Some(value.extract()?),
            Param::YMin => config.y_min = Some(value.extract()?),
            Param::YMax => config.y_max = Some(value.extract()?),
            Param::Ext => config = config.with_ext(value.extract()?),
            Param::ExtX => config.ext_x = value.extract()?,
            Param::ExtY => config.ext_y = value.extract()?,
            Param::GdX => config.gd_x = Some(value.extract()?),
            Param::GdY => config.gd_y = Some(value.extract()?),
            Param::Lambd => config.lambd = value.extract()?,
        }
    }

    return Ok(config);
}

#[test]
fn test_param_from_key() {
    assert_eq!(Param::from_key("n_src_init"), Some(Param::NSrcInit));
    assert_eq!(Param::from_key("n_srcs_init"), Some(Param::NSrcInit));
    assert_eq!(Param::from_key("ext"), Some(Param::Ext));
    assert_eq!(Param::from_key("ext_x"), Some(Param::ExtX));
    assert_eq!(Param::from_key("ext_y"), Some(Param::ExtY));
    assert_eq!(Param::from_key("R_init"), Some(Param::RInit));
    assert_eq!(Param::from_key("r_init"), None);
    assert_eq!(Param::from_key("unknown"), None);
}
