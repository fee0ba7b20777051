use std::fmt;

/// The failures the estimator can produce
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// Bad electrode/potential shapes, bad spacing, empty grids, bad hyper-parameters
    ConfigurationError { reason: String },
    /// Unsupported basis function name
    InvalidBasisType { basis_type: String },
    /// The fast kernel inversion failed; recovered inside the solver by the robust inversion
    SingularMatrix { reason: String },
    /// Both inversion strategies failed, or a numerical integration did not converge
    NumericalFailure { reason: String },
    /// `values` called with something other than "CSD" or "POT"
    InvalidEstimationMode { mode: String },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::ConfigurationError { reason } => write!(f, "configuration error: {}", reason),
            Error::InvalidBasisType { basis_type } => {
                write!(f, "invalid basis type \"{}\", available are: gauss, step, gauss_lim", basis_type)
            }
            Error::SingularMatrix { reason } => write!(f, "singular matrix: {}", reason),
            Error::NumericalFailure { reason } => write!(f, "numerical failure: {}", reason),
            Error::InvalidEstimationMode { mode } => {
                write!(f, "invalid estimation mode \"{}\", pass either CSD or POT", mode)
            }
        }
    }
}

impl std::error::Error for Error {}

impl From<ndarray_interp::BuilderError> for Error {
    fn from(error: ndarray_interp::BuilderError) -> Self {
        return Error::NumericalFailure {
            reason: format!("lookup table spline: {}", error),
        };
    }
}

impl From<ndarray_interp::InterpolateError> for Error {
    fn from(error: ndarray_interp::InterpolateError) -> Self {
        return Error::NumericalFailure {
            reason: format!("lookup table interpolation: {}", error),
        };
    }
}

pub(crate) fn configuration_error(reason: impl Into<String>) -> Error {
    return Error::ConfigurationError { reason: reason.into() };
}

#[test]
fn test_error_display() {
    let error: Error = Error::InvalidBasisType {
        basis_type: "unknown".to_string(),
    };
    assert!(error.to_string().contains("\"unknown\""));

    // A spline needs more than one knot
    let builder_error: ndarray_interp::BuilderError = ndarray_interp::interp1d::Interp1D::builder(ndarray::array![1.0])
        .strategy(ndarray_interp::interp1d::cubic_spline::CubicSpline::new())
        .build()
        .unwrap_err();
    let error: Error = builder_error.into();
    assert!(matches!(error, Error::NumericalFailure { .. }));
}
