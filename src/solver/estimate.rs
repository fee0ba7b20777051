use super::regularised_inverse;
use crate::errors::{Error, configuration_error};
use ndarray::{Array1, Array2, Array3};
use rayon::prelude::*;

/// Reconstruct the CSD (or potential) on the estimation grid
///
/// # Arguments
/// * `k_pot` - kernel matrix, shape = (n_electrodes, n_electrodes)
/// * `cross` - cross kernel matrix, `k_interp_cross` for CSD or `k_interp_pot` for the potential,
///   shape = (n_x * n_y, n_electrodes)
/// * `potentials` - measured potentials, shape = (n_electrodes, n_time)
/// * `lambda` - ridge regularisation strength
/// * `n_x`, `n_y` - estimation grid size
///
/// # Returns
/// * `Array3<f64>` - shape = (n_x, n_y, n_time)
///
/// # Algorithm
/// For every time column `t`: `beta = (k_pot + lambda * I)^-1 * V[:, t]`, then
/// `estimate[:, t] = cross * beta`, reshaped to the grid.
pub fn estimate(k_pot: &Array2<f64>, cross: &Array2<f64>, potentials: &Array2<f64>, lambda: f64, n_x: usize, n_y: usize) -> Result<Array3<f64>, Error> {
    let n_electrodes: usize = k_pot.nrows();
    let n_time: usize = potentials.ncols();
    if cross.ncols() != n_electrodes || potentials.nrows() != n_electrodes {
        return Err(configuration_error(format!(
            "inconsistent shapes: k_pot {:?}, cross {:?}, potentials {:?}",
            k_pot.dim(),
            cross.dim(),
            potentials.dim()
        )));
    }
    if cross.nrows() != n_x * n_y {
        return Err(configuration_error(format!(
            "cross kernel has {} rows, the estimation grid has {} x {} points",
            cross.nrows(),
            n_x,
            n_y
        )));
    }

    let k_inv: Array2<f64> = regularised_inverse(k_pot, lambda)?;

    let columns: Vec<Array1<f64>> = (0..n_time)
        .into_par_iter() // Use Rayon to create a parallel iterator
        .map(|i_time: usize| {
            let beta: Array1<f64> = k_inv.dot(&potentials.column(i_time));
            cross.dot(&beta)
        })
        .collect();

    // Collect the time columns into the (n_x, n_y, n_time) result
    let mut estimation: Array3<f64> = Array3::zeros((n_x, n_y, n_time));
    for (i_time, column) in columns.into_iter().enumerate() {
        for i_x in 0..n_x {
            for i_y in 0..n_y {
                estimation[[i_x, i_y, i_time]] = column[i_x * n_y + i_y];
            }
        }
    }

    return Ok(estimation);
}

#[test]
fn test_estimate_layout() {
    use approx::assert_abs_diff_eq;

    // Two electrodes, k_pot = 2 * I
    let k_pot: Array2<f64> = ndarray::array![[2.0, 0.0], [0.0, 2.0]];
    // Grid of 2 x 3 points
    let cross: Array2<f64> = ndarray::array![[1.0, 0.0], [0.0, 1.0], [1.0, 1.0], [2.0, 0.0], [0.0, 2.0], [1.0, -1.0]];
    let potentials: Array2<f64> = ndarray::array![[2.0, 4.0], [6.0, -2.0]];

    let estimation: Array3<f64> = estimate(&k_pot, &cross, &potentials, 0.0, 2, 3).unwrap();
    assert_eq!(estimation.dim(), (2, 3, 2));

    // beta = V / 2
    let beta_0: [f64; 2] = [1.0, 3.0];
    let beta_1: [f64; 2] = [2.0, -1.0];
    for i_x in 0..2 {
        for i_y in 0..3 {
            let i_point: usize = i_x * 3 + i_y;
            let expected_0: f64 = cross[[i_point, 0]] * beta_0[0] + cross[[i_point, 1]] * beta_0[1];
            let expected_1: f64 = cross[[i_point, 0]] * beta_1[0] + cross[[i_point, 1]] * beta_1[1];
            assert_abs_diff_eq!(estimation[[i_x, i_y, 0]], expected_0, epsilon = 1e-14);
            assert_abs_diff_eq!(estimation[[i_x, i_y, 1]], expected_1, epsilon = 1e-14);
        }
    }

    // Regularisation shrinks the weights
    let estimation_regularised: Array3<f64> = estimate(&k_pot, &cross, &potentials, 2.0, 2, 3).unwrap();
    assert_abs_diff_eq!(estimation_regularised[[0, 0, 0]], 0.5 * estimation[[0, 0, 0]], epsilon = 1e-14);
}

#[test]
fn test_estimate_shape_errors() {
    let k_pot: Array2<f64> = Array2::eye(2);
    let cross: Array2<f64> = Array2::zeros((6, 2));
    let potentials: Array2<f64> = Array2::zeros((3, 1));
    assert!(matches!(estimate(&k_pot, &cross, &potentials, 0.0, 2, 3), Err(Error::ConfigurationError { .. })));

    let potentials: Array2<f64> = Array2::zeros((2, 1));
    assert!(matches!(estimate(&k_pot, &cross, &potentials, 0.0, 3, 3), Err(Error::ConfigurationError { .. })));
}
