use crate::errors::{Error, configuration_error};
use crate::solver::regularised_inverse;
use log::warn;
use ndarray::{Array1, Array2, Axis};
use ndarray_linalg::Norm;
use rayon::prelude::*;

/// Leave-one-out prediction error of the kernel regression for one regularisation strength
///
/// # Arguments
/// * `k_pot` - kernel matrix, shape = (n_electrodes, n_electrodes)
/// * `potentials` - measured potentials, shape = (n_electrodes, n_time)
/// * `lambda` - ridge regularisation strength
///
/// # Returns
/// * sum over the held-out electrodes `i` of `||V_est[i, :] - V[i, :]||_2`, where `V_est[i, :]`
///   is predicted from all the other electrodes; `f64::INFINITY` if any training matrix cannot be
///   inverted
///
/// # Algorithm
/// For every fold `i`: `beta = (K[train, train] + lambda * I)^-1 * V[train, :]` and
/// `V_est[i, :] = K[i, train] * beta`.
/// Folds are evaluated in parallel and summed in electrode order.
pub fn leave_one_out_error(k_pot: &Array2<f64>, potentials: &Array2<f64>, lambda: f64) -> Result<f64, Error> {
    let n_electrodes: usize = k_pot.nrows();
    if n_electrodes < 2 {
        return Err(configuration_error(format!(
            "leave-one-out cross-validation needs at least 2 electrodes, got {}",
            n_electrodes
        )));
    }
    if k_pot.ncols() != n_electrodes || potentials.nrows() != n_electrodes {
        return Err(configuration_error(format!(
            "inconsistent shapes: k_pot {:?}, potentials {:?}",
            k_pot.dim(),
            potentials.dim()
        )));
    }

    let fold_errors: Vec<Result<f64, Error>> = (0..n_electrodes)
        .into_par_iter() // Use Rayon to create a parallel iterator
        .map(|i_test: usize| fold_error(k_pot, potentials, lambda, i_test))
        .collect();

    let mut error_total: f64 = 0.0;
    for (i_test, fold_error) in fold_errors.into_iter().enumerate() {
        match fold_error {
            Ok(error) => error_total += error,
            Err(Error::NumericalFailure { reason }) => {
                warn!("leave_one_out_error: fold {} with lambda={} cannot be solved: {}", i_test, lambda, reason);
                return Ok(f64::INFINITY);
            }
            Err(error) => return Err(error),
        }
    }

    return Ok(error_total);
}

fn fold_error(k_pot: &Array2<f64>, potentials: &Array2<f64>, lambda: f64, i_test: usize) -> Result<f64, Error> {
    let n_electrodes: usize = k_pot.nrows();
    let indices_train: Vec<usize> = (0..n_electrodes).filter(|&i_electrode: &usize| i_electrode != i_test).collect();

    let k_train: Array2<f64> = k_pot.select(Axis(0), &indices_train).select(Axis(1), &indices_train);
    let k_test: Array1<f64> = k_pot.row(i_test).select(Axis(0), &indices_train);
    let potentials_train: Array2<f64> = potentials.select(Axis(0), &indices_train);

    let k_inv: Array2<f64> = regularised_inverse(&k_train, lambda)?;
    let beta: Array2<f64> = k_inv.dot(&potentials_train);
    let potentials_estimated: Array1<f64> = k_test.dot(&beta);

    let residual: Array1<f64> = potentials_estimated - potentials.row(i_test);
    return Ok(residual.norm_l2());
}

#[test]
fn test_leave_one_out_error_uncoupled_electrodes() {
    use approx::assert_abs_diff_eq;

    // Electrodes which do not see each other predict zero, the error is the norm of each row
    let k_pot: Array2<f64> = Array2::eye(3);
    let potentials: Array2<f64> = ndarray::array![[3.0, 4.0], [1.0, 0.0], [0.0, -2.0]];
    let error: f64 = leave_one_out_error(&k_pot, &potentials, 1e-3).unwrap();
    assert_abs_diff_eq!(error, 5.0 + 1.0 + 2.0, epsilon = 1e-12);
}

#[test]
fn test_leave_one_out_error_two_electrodes() {
    use approx::assert_abs_diff_eq;

    // With two electrodes each fold is a scalar problem:
    // v_est_0 = k_01 / (k_11 + lambda) * v_1
    let k_pot: Array2<f64> = ndarray::array![[2.0, 1.0], [1.0, 4.0]];
    let potentials: Array2<f64> = ndarray::array![[1.0], [2.0]];
    let lambda: f64 = 0.5;
    let error: f64 = leave_one_out_error(&k_pot, &potentials, lambda).unwrap();

    let error_0: f64 = (1.0 / (4.0 + lambda) * 2.0 - 1.0_f64).abs();
    let error_1: f64 = (1.0 / (2.0 + lambda) * 1.0 - 2.0_f64).abs();
    assert_abs_diff_eq!(error, error_0 + error_1, epsilon = 1e-12);
}

#[test]
fn test_leave_one_out_error_failures() {
    // A zero training matrix cannot be inverted by either method
    let k_pot: Array2<f64> = Array2::zeros((2, 2));
    let potentials: Array2<f64> = ndarray::array![[1.0], [2.0]];
    assert_eq!(leave_one_out_error(&k_pot, &potentials, 0.0), Ok(f64::INFINITY));

    let k_pot: Array2<f64> = Array2::eye(1);
    let potentials: Array2<f64> = ndarray::array![[1.0]];
    assert!(matches!(leave_one_out_error(&k_pot, &potentials, 0.0), Err(Error::ConfigurationError { .. })));
}
