use crate::errors::Error;
use ndarray::Array1;
use std::fmt;
use std::str::FromStr;

// Global constants
const PI: f64 = std::f64::consts::PI;

/// Shape of the basis sources which the CSD is expanded into
///
/// All shapes are radially symmetric about their centre and parameterised by a radius `r`.
///
/// * `Gauss` - smooth bump, a Gaussian with `r` equal to three standard deviations
/// * `Step` - flat top, 1.0 inside the disc of radius `r`, 0.0 outside
/// * `GaussLim` - truncated bump, the `Gauss` shape cut to zero at `r`
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum BasisType {
    #[default]
    Gauss,
    Step,
    GaussLim,
}

impl BasisType {
    pub const ALL: [BasisType; 3] = [BasisType::Gauss, BasisType::Step, BasisType::GaussLim];

    /// Value of the basis source centred on (`x_centre`, `y_centre`) at the point (`x`, `y`)
    ///
    /// # Arguments
    /// * `x`, `y` - evaluation point
    /// * `x_centre`, `y_centre` - centre of the basis source
    /// * `r` - radius of the basis source
    ///
    /// # Returns
    /// * source density at (`x`, `y`); the value at the centre is `r / (6 pi)` for `Gauss` and
    ///   `GaussLim`, and `1.0` for `Step`
    ///
    /// # Examples
    /// ```
    /// use kcsd_rs::BasisType;
    ///
    /// let r: f64 = 0.3;
    /// assert_eq!(BasisType::Step.value(0.1, 0.1, 0.0, 0.0, r), 1.0);
    /// assert_eq!(BasisType::Step.value(0.3, 0.3, 0.0, 0.0, r), 0.0);
    /// assert!(BasisType::Gauss.value(0.3, 0.3, 0.0, 0.0, r) > 0.0);
    /// assert_eq!(BasisType::GaussLim.value(0.3, 0.3, 0.0, 0.0, r), 0.0);
    /// ```
    pub fn value(&self, x: f64, y: f64, x_centre: f64, y_centre: f64, r: f64) -> f64 {
        let distance_sq: f64 = (x - x_centre).powi(2) + (y - y_centre).powi(2);
        match self {
            BasisType::Gauss => gauss(distance_sq, r),
            BasisType::Step => {
                if distance_sq <= r.powi(2) {
                    1.0
                } else {
                    0.0
                }
            }
            BasisType::GaussLim => {
                if distance_sq < r.powi(2) {
                    gauss(distance_sq, r)
                } else {
                    0.0
                }
            }
        }
    }

    /// Values of a single basis source at many points
    pub fn value_array1(&self, x: &Array1<f64>, y: &Array1<f64>, x_centre: f64, y_centre: f64, r: f64) -> Array1<f64> {
        let values: Array1<f64> = x
            .iter()
            .zip(y.iter())
            .map(|(&x_point, &y_point)| self.value(x_point, y_point, x_centre, y_centre, r))
            .collect();
        return values;
    }

    /// The name used to select this basis, e.g. from Python
    pub fn name(&self) -> &'static str {
        match self {
            BasisType::Gauss => "gauss",
            BasisType::Step => "step",
            BasisType::GaussLim => "gauss_lim",
        }
    }
}

impl fmt::Display for BasisType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for BasisType {
    type Err = Error;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name {
            "gauss" => Ok(BasisType::Gauss),
            "step" => Ok(BasisType::Step),
            "gauss_lim" => Ok(BasisType::GaussLim),
            _ => Err(Error::InvalidBasisType {
                basis_type: name.to_string(),
            }),
        }
    }
}

/// Gaussian with `three_stdev` = three standard deviations, scaled by `stdev / (2 pi)`
fn gauss(distance_sq: f64, three_stdev: f64) -> f64 {
    let stdev: f64 = three_stdev / 3.0;
    let height: f64 = stdev / (2.0 * PI);
    return height * (-distance_sq / (2.0 * stdev.powi(2))).exp();
}

#[test]
fn test_basis_from_str() {
    for basis in BasisType::ALL {
        let parsed: BasisType = basis.name().parse().unwrap();
        assert_eq!(parsed, basis);
    }

    let result: Result<BasisType, Error> = "unknown".parse();
    assert_eq!(
        result,
        Err(Error::InvalidBasisType {
            basis_type: "unknown".to_string()
        })
    );
}

#[test]
fn test_basis_centre_values() {
    use approx::assert_abs_diff_eq;

    let r: f64 = 0.45;
    let (x_c, y_c): (f64, f64) = (1.2, -0.7);
    assert_abs_diff_eq!(BasisType::Gauss.value(x_c, y_c, x_c, y_c, r), r / (6.0 * PI), epsilon = 1e-15);
    assert_abs_diff_eq!(BasisType::GaussLim.value(x_c, y_c, x_c, y_c, r), r / (6.0 * PI), epsilon = 1e-15);
    assert_eq!(BasisType::Step.value(x_c, y_c, x_c, y_c, r), 1.0);
}

#[test]
fn test_basis_radial_symmetry_and_support() {
    use approx::assert_abs_diff_eq;

    let r: f64 = 0.8;
    for basis in BasisType::ALL {
        // Same distance in different directions gives the same value
        let v1: f64 = basis.value(0.3, 0.4, 0.0, 0.0, r);
        let v2: f64 = basis.value(-0.5, 0.0, 0.0, 0.0, r);
        let v3: f64 = basis.value(0.0, -0.5, 0.0, 0.0, r);
        assert_abs_diff_eq!(v1, v2, epsilon = 1e-15);
        assert_abs_diff_eq!(v1, v3, epsilon = 1e-15);
    }

    // Truncated shapes vanish outside `r`, the Gaussian keeps a small tail (4.5 standard deviations at 1.5 r)
    assert_eq!(BasisType::Step.value(0.81, 0.0, 0.0, 0.0, r), 0.0);
    assert_eq!(BasisType::GaussLim.value(0.0, 0.81, 0.0, 0.0, r), 0.0);
    let tail_ratio: f64 = BasisType::Gauss.value(1.2, 0.0, 0.0, 0.0, r) / BasisType::Gauss.value(0.0, 0.0, 0.0, 0.0, r);
    assert_abs_diff_eq!(tail_ratio, (-10.125_f64).exp(), epsilon = 1e-12);
}
