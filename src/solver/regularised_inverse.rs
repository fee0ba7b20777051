use crate::errors::{Error, configuration_error};
use lapack::*;
use log::{debug, warn};
use ndarray::{Array1, Array2, ShapeBuilder};
use ndarray_linalg::SVD;

/// Inverse of `k_pot + lambda * I`
///
/// # Arguments
/// * `k_pot` - square kernel matrix, shape = (n_electrodes, n_electrodes)
/// * `lambda` - ridge regularisation strength
///
/// # Returns
/// * `Array2<f64>` - shape = (n_electrodes, n_electrodes)
///
/// # Algorithm
/// The fast LU inversion is tried first. If it reports a singular matrix, the SVD pseudo-inverse
/// is used instead. If that also fails the error is `Error::NumericalFailure`.
///
/// # Examples
/// ```
/// use kcsd_rs::solver::regularised_inverse;
/// use ndarray::{Array2, array};
///
/// let k_pot: Array2<f64> = array![[2.0, 0.0], [0.0, 4.0]];
/// let k_inv: Array2<f64> = regularised_inverse(&k_pot, 0.0).unwrap();
/// assert!((k_inv[[0, 0]] - 0.5).abs() < 1e-15);
/// assert!((k_inv[[1, 1]] - 0.25).abs() < 1e-15);
/// ```
pub fn regularised_inverse(k_pot: &Array2<f64>, lambda: f64) -> Result<Array2<f64>, Error> {
    let n: usize = k_pot.nrows();
    if k_pot.ncols() != n {
        return Err(configuration_error(format!("kernel matrix must be square, got {:?}", k_pot.dim())));
    }
    if !lambda.is_finite() || k_pot.iter().any(|value: &f64| !value.is_finite()) {
        return Err(Error::NumericalFailure {
            reason: format!("cannot invert a kernel matrix with non-finite entries (lambda={})", lambda),
        });
    }

    let regularised: Array2<f64> = k_pot + &(lambda * Array2::<f64>::eye(n));

    match inverse_lu(&regularised) {
        Ok(inverse) => return Ok(inverse),
        Err(Error::SingularMatrix { reason }) => {
            debug!("regularised_inverse: LU inversion failed ({}), falling back to the SVD pseudo-inverse", reason);
            let inverse: Array2<f64> = inverse_svd(&regularised).map_err(|error: Error| {
                warn!("regularised_inverse: SVD pseudo-inverse failed: {}", error);
                Error::NumericalFailure {
                    reason: format!("LU inversion failed ({}), then {}", reason, error),
                }
            })?;
            return Ok(inverse);
        }
        Err(error) => return Err(error),
    }
}

/// Inverse by LU decomposition with partial pivoting, LAPACK `dgesv` on `a * x = I`
///
/// Fails with `Error::SingularMatrix` for an exactly singular matrix or a non-finite result.
pub fn inverse_lu(a: &Array2<f64>) -> Result<Array2<f64>, Error> {
    let n_usize: usize = a.nrows();
    if n_usize == 0 {
        return Ok(Array2::zeros((0, 0)));
    }
    let n: i32 = n_usize as i32;

    // Convert A to column-major layout for LAPACK; the identity is the same in both layouts
    let mut a_vec: Vec<f64> = a.t().iter().cloned().collect();
    let mut b_vec: Vec<f64> = Array2::<f64>::eye(n_usize).iter().cloned().collect();
    let mut ipiv: Vec<i32> = vec![0; n_usize];
    let mut info: i32 = 0;

    unsafe {
        dgesv(
            n,          // `n` the order of the matrix `a`
            n,          // `nrhs` the number of right hand sides, i.e. the number of columns of `b`
            &mut a_vec, // `a` on exit, the LU factors
            n,          // `lda` the leading dimension of `a`
            &mut ipiv,  // `ipiv` pivot indices
            &mut b_vec, // `b` on exit, the solution
            n,          // `ldb` the leading dimension of `b`
            &mut info,  // `info`
        );
    }

    if info < 0 {
        return Err(Error::NumericalFailure {
            reason: format!("dgesv: argument {} had an illegal value", -info),
        });
    }
    if info > 0 {
        return Err(Error::SingularMatrix {
            reason: format!("dgesv: U({}, {}) is exactly zero", info, info),
        });
    }

    let inverse: Array2<f64> = Array2::from_shape_vec((n_usize, n_usize).f(), b_vec).map_err(|error| Error::NumericalFailure {
        reason: format!("dgesv: {}", error),
    })?;
    if inverse.iter().any(|value: &f64| !value.is_finite()) {
        return Err(Error::SingularMatrix {
            reason: "dgesv: inverse has non-finite entries".to_string(),
        });
    }

    return Ok(inverse);
}

/// Moore-Penrose pseudo-inverse by singular value decomposition
///
/// Singular values below `n * epsilon * s_max` are treated as zero.
pub fn inverse_svd(a: &Array2<f64>) -> Result<Array2<f64>, Error> {
    let n: usize = a.nrows();
    if n == 0 {
        return Ok(Array2::zeros((0, 0)));
    }

    let (u, s, v_t): (Option<Array2<f64>>, Array1<f64>, Option<Array2<f64>>) = a.svd(true, true).map_err(|error| Error::NumericalFailure {
        reason: format!("SVD: {}", error),
    })?;
    let (u, v_t): (Array2<f64>, Array2<f64>) = match (u, v_t) {
        (Some(u), Some(v_t)) => (u, v_t),
        _ => {
            return Err(Error::NumericalFailure {
                reason: "SVD: singular vectors were not computed".to_string(),
            });
        }
    };

    let s_max: f64 = s.iter().cloned().fold(0.0, f64::max);
    if !(s_max.is_finite() && s_max > 0.0) {
        return Err(Error::NumericalFailure {
            reason: format!("SVD: largest singular value is {}", s_max),
        });
    }
    let cutoff: f64 = n as f64 * f64::EPSILON * s_max;
    let s_inv: Array1<f64> = s.mapv(|s_value: f64| if s_value > cutoff { 1.0 / s_value } else { 0.0 });

    // pinv = V * diag(1 / s) * U^T
    let v_scaled: Array2<f64> = &v_t.t() * &s_inv;
    let inverse: Array2<f64> = v_scaled.dot(&u.t());

    return Ok(inverse);
}

#[test]
fn test_inverse_lu() {
    use approx::assert_abs_diff_eq;

    let a: Array2<f64> = ndarray::array![[4.0, 1.0, 0.5], [1.0, 3.0, 0.2], [0.5, 0.2, 2.0]];
    let a_inv: Array2<f64> = inverse_lu(&a).unwrap();
    let identity: Array2<f64> = a.dot(&a_inv);
    for i_row in 0..3 {
        for i_column in 0..3 {
            let expected: f64 = if i_row == i_column { 1.0 } else { 0.0 };
            assert_abs_diff_eq!(identity[[i_row, i_column]], expected, epsilon = 1e-14);
        }
    }

    // Non-symmetric, checks the column-major conversion
    let a: Array2<f64> = ndarray::array![[1.0, 2.0], [0.0, 1.0]];
    let a_inv: Array2<f64> = inverse_lu(&a).unwrap();
    assert_abs_diff_eq!(a_inv, ndarray::array![[1.0, -2.0], [0.0, 1.0]], epsilon = 1e-15);
}

#[test]
fn test_regularised_inverse_singular_falls_back_to_svd() {
    use approx::assert_abs_diff_eq;

    let k_pot: Array2<f64> = ndarray::array![[1.0, 1.0], [1.0, 1.0]];
    assert!(matches!(inverse_lu(&k_pot), Err(Error::SingularMatrix { .. })));

    // The pseudo-inverse of [[1, 1], [1, 1]] is itself divided by 4
    let k_inv: Array2<f64> = regularised_inverse(&k_pot, 0.0).unwrap();
    assert_abs_diff_eq!(k_inv, ndarray::array![[0.25, 0.25], [0.25, 0.25]], epsilon = 1e-14);

    // With regularisation the LU inversion succeeds
    let k_inv: Array2<f64> = regularised_inverse(&k_pot, 1.0).unwrap();
    let expected: Array2<f64> = ndarray::array![[2.0, -1.0], [-1.0, 2.0]] / 3.0;
    assert_abs_diff_eq!(k_inv, expected, epsilon = 1e-14);
}

#[test]
fn test_regularised_inverse_failures() {
    let k_pot: Array2<f64> = ndarray::array![[1.0, f64::NAN], [0.0, 1.0]];
    assert!(matches!(regularised_inverse(&k_pot, 0.1), Err(Error::NumericalFailure { .. })));

    let k_pot: Array2<f64> = Array2::zeros((2, 2));
    assert!(matches!(regularised_inverse(&k_pot, 0.0), Err(Error::NumericalFailure { .. })));

    let k_pot: Array2<f64> = Array2::zeros((2, 3));
    assert!(matches!(regularised_inverse(&k_pot, 0.0), Err(Error::ConfigurationError { .. })));
}
