use super::leave_one_out_error;
use crate::basis::BasisType;
use crate::config::Kcsd2dConfig;
use crate::errors::{Error, configuration_error};
use crate::grid::SourceGrid;
use crate::kernel::ElectrodeKernel;
use log::{debug, info};
use ndarray::{Array1, Array2};
use rayon::prelude::*;
use std::time::{Duration, Instant};

/// Everything a cross-validation sweep reads, borrowed from the engine
#[derive(Clone, Copy, Debug)]
pub struct CrossValidationInputs<'a> {
    /// shape = (n_electrodes, 2)
    pub electrode_positions: &'a Array2<f64>,
    /// shape = (n_electrodes, n_time)
    pub potentials: &'a Array2<f64>,
    pub source_grid: &'a SourceGrid,
    pub basis: BasisType,
    pub config: &'a Kcsd2dConfig,
}

/// Outcome of a cross-validation sweep
#[derive(Clone, Debug, PartialEq)]
pub struct CrossValidationResult {
    pub best_r: f64,
    pub best_lambda: f64,
    /// Leave-one-out error of the winner
    pub cv_error: f64,
    pub rs: Array1<f64>,
    pub lambdas: Array1<f64>,
    /// Leave-one-out error of every candidate, shape = (n_r, n_lambda)
    pub errors: Array2<f64>,
}

/// 25 regularisation strengths, log-spaced from 1e-2 down to 1e-25
pub fn default_lambdas() -> Array1<f64> {
    return Array1::logspace(10.0, -2.0, -25.0, 25);
}

/// Leave-one-out grid search over source radii and regularisation strengths
///
/// # Arguments
/// * `inputs` - electrodes, potentials, source grid, basis and configuration
/// * `rs` - candidate source radii, used as given (not snapped to the source lattice)
/// * `lambdas` - candidate regularisation strengths
///
/// # Returns
/// * `CrossValidationResult` with the candidate of smallest error; ties keep the earliest
///   candidate in (r, then lambda) order, and a NaN error never wins over a number
///
/// # Algorithm
/// Every radius gets its own lookup table and electrode kernel, built in parallel; then for each
/// lambda the summed leave-one-out error is computed with `leave_one_out_error`.
/// Nothing is shared between radii, so the sweep does not touch the engine's own kernel.
pub fn cross_validate(inputs: &CrossValidationInputs, rs: &Array1<f64>, lambdas: &Array1<f64>) -> Result<CrossValidationResult, Error> {
    validate_candidates(inputs, rs, lambdas)?;

    let timing_start: Instant = Instant::now();

    let n_r: usize = rs.len();
    let n_lambda: usize = lambdas.len();

    let error_rows: Vec<Array1<f64>> = (0..n_r)
        .into_par_iter() // Use Rayon to create a parallel iterator
        .map(|i_r: usize| -> Result<Array1<f64>, Error> {
            let r: f64 = rs[i_r];
            let electrode_kernel: ElectrodeKernel = ElectrodeKernel::for_radius(inputs.electrode_positions, inputs.source_grid, inputs.basis, r, inputs.config)?;

            let mut error_row: Array1<f64> = Array1::zeros(n_lambda);
            for (i_lambda, &lambda) in lambdas.iter().enumerate() {
                error_row[i_lambda] = leave_one_out_error(&electrode_kernel.k_pot, inputs.potentials, lambda)?;
            }
            debug!("cross_validate: r={}, errors={}", r, error_row);

            Ok(error_row)
        })
        .collect::<Result<Vec<Array1<f64>>, Error>>()?;

    // Collect the rows into the error table
    let mut errors: Array2<f64> = Array2::zeros((n_r, n_lambda));
    for (i_r, error_row) in error_rows.into_iter().enumerate() {
        errors.row_mut(i_r).assign(&error_row);
    }

    let (i_r_best, i_lambda_best): (usize, usize) = argmin_row_major(&errors);

    let duration: Duration = timing_start.elapsed();
    info!(
        "cross_validate: {} radii x {} lambdas, best r={}, lambda={}, error={}, time elapsed: {:?}",
        n_r,
        n_lambda,
        rs[i_r_best],
        lambdas[i_lambda_best],
        errors[[i_r_best, i_lambda_best]],
        duration
    );

    return Ok(CrossValidationResult {
        best_r: rs[i_r_best],
        best_lambda: lambdas[i_lambda_best],
        cv_error: errors[[i_r_best, i_lambda_best]],
        rs: rs.to_owned(),
        lambdas: lambdas.to_owned(),
        errors,
    });
}

fn validate_candidates(inputs: &CrossValidationInputs, rs: &Array1<f64>, lambdas: &Array1<f64>) -> Result<(), Error> {
    if rs.is_empty() {
        return Err(configuration_error("no candidate radii to cross-validate"));
    }
    if lambdas.is_empty() {
        return Err(configuration_error("no candidate lambdas to cross-validate"));
    }
    if let Some(r) = rs.iter().find(|r: &&f64| !(r.is_finite() && **r > 0.0)) {
        return Err(configuration_error(format!("candidate radii must be positive, got {}", r)));
    }
    if let Some(lambda) = lambdas.iter().find(|lambda: &&f64| !(lambda.is_finite() && **lambda >= 0.0)) {
        return Err(configuration_error(format!("candidate lambdas must be non-negative, got {}", lambda)));
    }

    let n_electrodes: usize = inputs.electrode_positions.nrows();
    if n_electrodes < 2 {
        return Err(configuration_error(format!(
            "leave-one-out cross-validation needs at least 2 electrodes, got {}",
            n_electrodes
        )));
    }
    if inputs.potentials.nrows() != n_electrodes {
        return Err(configuration_error(format!(
            "{} electrodes but {} rows of potentials",
            n_electrodes,
            inputs.potentials.nrows()
        )));
    }
    return Ok(());
}

/// Position of the smallest error, scanning rows first; earliest wins ties
fn argmin_row_major(errors: &Array2<f64>) -> (usize, usize) {
    let mut best: (usize, usize) = (0, 0);
    let mut error_best: f64 = errors[[0, 0]];
    for ((i_r, i_lambda), &error) in errors.indexed_iter() {
        if error < error_best || (error_best.is_nan() && !error.is_nan()) {
            best = (i_r, i_lambda);
            error_best = error;
        }
    }
    return best;
}

#[test]
fn test_default_lambdas() {
    use approx::assert_relative_eq;

    let lambdas: Array1<f64> = default_lambdas();
    assert_eq!(lambdas.len(), 25);
    assert_relative_eq!(lambdas[0], 1e-2, max_relative = 1e-12);
    assert_relative_eq!(lambdas[24], 1e-25, max_relative = 1e-12);
    assert!(lambdas.windows(2).into_iter().all(|pair| pair[1] < pair[0]));
}

#[test]
fn test_argmin_row_major() {
    let errors: Array2<f64> = ndarray::array![[3.0, 1.0, 2.0], [1.0, 5.0, 1.0]];
    assert_eq!(argmin_row_major(&errors), (0, 1));

    let errors: Array2<f64> = ndarray::array![[f64::NAN, 4.0], [f64::INFINITY, 2.0]];
    assert_eq!(argmin_row_major(&errors), (1, 1));

    let errors: Array2<f64> = ndarray::array![[f64::INFINITY, f64::NAN]];
    assert_eq!(argmin_row_major(&errors), (0, 0));
}

#[cfg(test)]
fn small_problem(n_per_axis: usize) -> (Array2<f64>, SourceGrid, Kcsd2dConfig) {
    use crate::grid::build_grids;

    let n_electrodes: usize = n_per_axis * n_per_axis;
    let mut electrode_positions: Array2<f64> = Array2::zeros((n_electrodes, 2));
    for i_x in 0..n_per_axis {
        for i_y in 0..n_per_axis {
            electrode_positions[[i_x * n_per_axis + i_y, 0]] = i_x as f64 / (n_per_axis - 1) as f64;
            electrode_positions[[i_x * n_per_axis + i_y, 1]] = i_y as f64 / (n_per_axis - 1) as f64;
        }
    }
    let mut config: Kcsd2dConfig = Kcsd2dConfig::default().with_spacing(0.1, 0.1);
    config.n_src_init = 100;
    config.r_init = 0.3;
    let (_estimation_grid, source_grid) = build_grids(&electrode_positions, &config).unwrap();

    return (electrode_positions, source_grid, config);
}

#[test]
fn test_cross_validate_single_candidate() {
    let _ = env_logger::builder().is_test(true).try_init();

    let (electrode_positions, source_grid, config): (Array2<f64>, SourceGrid, Kcsd2dConfig) = small_problem(3);
    let potentials: Array2<f64> = Array2::from_shape_fn((9, 1), |(i_electrode, _)| (i_electrode as f64).sin());
    let inputs: CrossValidationInputs = CrossValidationInputs {
        electrode_positions: &electrode_positions,
        potentials: &potentials,
        source_grid: &source_grid,
        basis: BasisType::Gauss,
        config: &config,
    };

    let result: CrossValidationResult = cross_validate(&inputs, &ndarray::array![0.37], &ndarray::array![0.123]).unwrap();
    assert_eq!(result.best_r, 0.37);
    assert_eq!(result.best_lambda, 0.123);
    assert_eq!(result.errors.dim(), (1, 1));
    assert_eq!(result.cv_error, result.errors[[0, 0]]);
}

#[test]
fn test_cross_validate_grid_and_representable_field() {
    let (electrode_positions, source_grid, config): (Array2<f64>, SourceGrid, Kcsd2dConfig) = small_problem(5);

    // Potential of a single basis source in the middle of the grid: exactly the kind of field the
    // kernel can represent
    let r: f64 = source_grid.r;
    let electrode_kernel: ElectrodeKernel = ElectrodeKernel::for_radius(&electrode_positions, &source_grid, BasisType::Gauss, r, &config).unwrap();
    let i_source: usize = (source_grid.n_x() / 2) * source_grid.n_y() + source_grid.n_y() / 2;
    let potentials: Array2<f64> = electrode_kernel.b_pot.row(i_source).to_owned().insert_axis(ndarray::Axis(1));
    let inputs: CrossValidationInputs = CrossValidationInputs {
        electrode_positions: &electrode_positions,
        potentials: &potentials,
        source_grid: &source_grid,
        basis: BasisType::Gauss,
        config: &config,
    };

    let rs: Array1<f64> = ndarray::array![0.5 * r, r];
    let mut lambdas: Array1<f64> = default_lambdas();
    lambdas[0] = 1e3;
    let result: CrossValidationResult = cross_validate(&inputs, &rs, &lambdas).unwrap();

    assert_eq!(result.errors.dim(), (2, 25));
    assert!(result.best_r == rs[0] || result.best_r == rs[1]);
    assert!(result.best_lambda < 1e3);
    for &error in result.errors.iter() {
        assert!(result.cv_error <= error || error.is_nan());
    }

    // A huge lambda predicts ~0 everywhere, the best lambda does much better
    let error_shrunk: f64 = result.errors[[1, 0]];
    let potentials_norm: f64 = potentials.iter().map(|value: &f64| value.abs()).sum();
    assert!((error_shrunk - potentials_norm).abs() < 0.05 * potentials_norm);
    assert!(result.cv_error < 0.5 * error_shrunk);
}

#[test]
fn test_leave_one_out_error_decreases_with_electrode_density() {
    // The source lattice only depends on the electrode bounding box, so every layout below sees the
    // same field: the potential of the middle basis source
    let lambda: f64 = 1e-6;
    let mut relative_errors: Vec<f64> = Vec::new();
    for n_per_axis in [4, 6, 8] {
        let (electrode_positions, source_grid, config): (Array2<f64>, SourceGrid, Kcsd2dConfig) = small_problem(n_per_axis);
        let r: f64 = source_grid.r;
        let electrode_kernel: ElectrodeKernel =
            ElectrodeKernel::for_radius(&electrode_positions, &source_grid, BasisType::Gauss, r, &config).unwrap();
        let i_source: usize = (source_grid.n_x() / 2) * source_grid.n_y() + source_grid.n_y() / 2;
        let potentials: Array2<f64> = electrode_kernel.b_pot.row(i_source).to_owned().insert_axis(ndarray::Axis(1));

        let error: f64 = leave_one_out_error(&electrode_kernel.k_pot, &potentials, lambda).unwrap();
        let potentials_norm: f64 = potentials.iter().map(|value: &f64| value.abs()).sum();
        relative_errors.push(error / potentials_norm);
    }

    assert!(relative_errors[1] < relative_errors[0], "{:?}", relative_errors);
    assert!(relative_errors[2] < relative_errors[1], "{:?}", relative_errors);
    assert!(relative_errors[2] < 0.25, "{:?}", relative_errors);
}

#[test]
fn test_cross_validate_rejects_bad_candidates() {
    let (electrode_positions, source_grid, config): (Array2<f64>, SourceGrid, Kcsd2dConfig) = small_problem(2);
    let potentials: Array2<f64> = Array2::ones((4, 1));
    let inputs: CrossValidationInputs = CrossValidationInputs {
        electrode_positions: &electrode_positions,
        potentials: &potentials,
        source_grid: &source_grid,
        basis: BasisType::Step,
        config: &config,
    };

    let empty: Array1<f64> = Array1::zeros(0);
    assert!(matches!(cross_validate(&inputs, &empty, &default_lambdas()), Err(Error::ConfigurationError { .. })));
    assert!(matches!(cross_validate(&inputs, &ndarray::array![0.3], &empty), Err(Error::ConfigurationError { .. })));
    assert!(matches!(
        cross_validate(&inputs, &ndarray::array![-0.3], &default_lambdas()),
        Err(Error::ConfigurationError { .. })
    ));
    assert!(matches!(
        cross_validate(&inputs, &ndarray::array![0.3], &ndarray::array![f64::NAN]),
        Err(Error::ConfigurationError { .. })
    ));
}
