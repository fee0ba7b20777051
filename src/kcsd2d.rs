use crate::basis::BasisType;
use crate::config::Kcsd2dConfig;
use crate::cross_validation::{CrossValidationInputs, CrossValidationResult, cross_validate, default_lambdas};
use crate::errors::{Error, configuration_error};
use crate::grid::{EstimationGrid, SourceGrid, build_grids};
use crate::kernel::KernelConfiguration;
use crate::solver::{EstimationMode, estimate};
use log::info;
use ndarray::{Array1, Array2, Array3};
use std::time::{Duration, Instant};

/// Kernel current source density estimation in 2D
///
/// Owns the electrodes, the measured potentials, the grids and the kernel of the current
/// source radius. Changing the radius builds a new kernel; changing lambda only affects the
/// next call to `values`.
///
/// # Examples
/// ```no_run
/// use kcsd_rs::{EstimationMode, Kcsd2d, Kcsd2dConfig};
/// use ndarray::{Array2, Array3, array};
///
/// let electrode_positions: Array2<f64> = array![[0.0, 0.0], [0.0, 1.0], [1.0, 0.0], [1.0, 1.0], [0.5, 0.5]];
/// let potentials: Array2<f64> = array![[-1.0], [-1.0], [0.0], [0.0], [1.0]];
/// let config: Kcsd2dConfig = Kcsd2dConfig::default().with_spacing(0.05, 0.05);
///
/// let mut kcsd: Kcsd2d = Kcsd2d::with_basis_name(electrode_positions, potentials, "gauss", config).unwrap();
/// let (r, lambda): (f64, f64) = kcsd.cross_validate(None, None).unwrap();
/// let csd: Array3<f64> = kcsd.values(EstimationMode::Csd).unwrap();
/// assert_eq!(csd.dim(), (21, 21, 1));
/// ```
#[derive(Clone, Debug)]
pub struct Kcsd2d {
    electrode_positions: Array2<f64>,
    potentials: Array2<f64>,
    config: Kcsd2dConfig,
    estimation_grid: EstimationGrid,
    source_grid: SourceGrid,
    kernel: KernelConfiguration,
    lambda: f64,
    cross_validation: Option<CrossValidationResult>,
}

impl Kcsd2d {
    /// Build the grids, the lookup table and the kernel matrices
    ///
    /// # Arguments
    /// * `electrode_positions` - shape = (n_electrodes, 2)
    /// * `potentials` - shape = (n_electrodes, n_time)
    /// * `basis` - shape of the basis sources
    /// * `config` - see `Kcsd2dConfig`
    ///
    /// # Returns
    /// * `Error::ConfigurationError` for inconsistent shapes, non-finite data or a bad `config`;
    ///   these are checked before anything is built
    pub fn new(electrode_positions: Array2<f64>, potentials: Array2<f64>, basis: BasisType, config: Kcsd2dConfig) -> Result<Self, Error> {
        validate_measurements(&electrode_positions, &potentials)?;
        config.validate()?;

        return Self::build(electrode_positions, potentials, basis, config);
    }

    /// Same as `new`, with the basis selected by name: "gauss", "step" or "gauss_lim"
    ///
    /// The measurements and `config` are checked before the name is parsed.
    pub fn with_basis_name(electrode_positions: Array2<f64>, potentials: Array2<f64>, basis_name: &str, config: Kcsd2dConfig) -> Result<Self, Error> {
        validate_measurements(&electrode_positions, &potentials)?;
        config.validate()?;
        let basis: BasisType = basis_name.parse()?;

        return Self::build(electrode_positions, potentials, basis, config);
    }

    /// Grids and kernel for already validated inputs
    fn build(electrode_positions: Array2<f64>, potentials: Array2<f64>, basis: BasisType, config: Kcsd2dConfig) -> Result<Self, Error> {
        let timing_start: Instant = Instant::now();

        let (estimation_grid, source_grid): (EstimationGrid, SourceGrid) = build_grids(&electrode_positions, &config)?;
        let r: f64 = source_grid.r;
        let kernel: KernelConfiguration = KernelConfiguration::build(&electrode_positions, &estimation_grid, &source_grid, basis, r, &config)?;
        let lambda: f64 = config.lambd;

        let duration: Duration = timing_start.elapsed();
        info!(
            "Kcsd2d::new: {} electrodes, {} time samples, basis={}, r={}, time elapsed: {:?}",
            electrode_positions.nrows(),
            potentials.ncols(),
            basis,
            r,
            duration
        );

        return Ok(Kcsd2d {
            electrode_positions,
            potentials,
            config,
            estimation_grid,
            source_grid,
            kernel,
            lambda,
            cross_validation: None,
        });
    }

    /// CSD or potential on the estimation grid, shape = (n_x, n_y, n_time)
    pub fn values(&self, mode: EstimationMode) -> Result<Array3<f64>, Error> {
        let cross: &Array2<f64> = match mode {
            EstimationMode::Csd => &self.kernel.matrices.k_interp_cross,
            EstimationMode::Pot => &self.kernel.matrices.k_interp_pot,
        };

        return estimate(
            &self.kernel.matrices.k_pot,
            cross,
            &self.potentials,
            self.lambda,
            self.estimation_grid.n_x(),
            self.estimation_grid.n_y(),
        );
    }

    /// `values` with the mode given as "CSD" or "POT"
    pub fn values_by_name(&self, mode: &str) -> Result<Array3<f64>, Error> {
        let mode: EstimationMode = mode.parse()?;
        return self.values(mode);
    }

    /// Choose the source radius and lambda by leave-one-out cross-validation, and adopt them
    ///
    /// # Arguments
    /// * `rs` - candidate radii, default is the current radius only
    /// * `lambdas` - candidate lambdas, default is `cross_validation::default_lambdas()`
    ///
    /// # Returns
    /// * `(r, lambda)` of the winner; the kernel is only rebuilt if the radius changed
    pub fn cross_validate(&mut self, rs: Option<&Array1<f64>>, lambdas: Option<&Array1<f64>>) -> Result<(f64, f64), Error> {
        let rs: Array1<f64> = match rs {
            Some(rs) => rs.to_owned(),
            None => Array1::from(vec![self.kernel.r]),
        };
        let lambdas: Array1<f64> = match lambdas {
            Some(lambdas) => lambdas.to_owned(),
            None => default_lambdas(),
        };

        let inputs: CrossValidationInputs = CrossValidationInputs {
            electrode_positions: &self.electrode_positions,
            potentials: &self.potentials,
            source_grid: &self.source_grid,
            basis: self.kernel.basis,
            config: &self.config,
        };
        let result: CrossValidationResult = cross_validate(&inputs, &rs, &lambdas)?;

        if result.best_r != self.kernel.r {
            self.kernel = self.build_kernel(result.best_r)?;
        }
        self.lambda = result.best_lambda;
        let best: (f64, f64) = (result.best_r, result.best_lambda);
        self.cross_validation = Some(result);

        return Ok(best);
    }

    /// Change the source radius, rebuilding the lookup table and every kernel matrix
    pub fn update_r(&mut self, r: f64) -> Result<(), Error> {
        if !(r.is_finite() && r > 0.0) {
            return Err(configuration_error(format!("source radius must be positive, got {}", r)));
        }
        self.kernel = self.build_kernel(r)?;
        return Ok(());
    }

    /// Change the regularisation strength used by the next `values`
    pub fn update_lambda(&mut self, lambda: f64) -> Result<(), Error> {
        if !(lambda.is_finite() && lambda >= 0.0) {
            return Err(configuration_error(format!("lambda must be non-negative, got {}", lambda)));
        }
        self.lambda = lambda;
        return Ok(());
    }

    fn build_kernel(&self, r: f64) -> Result<KernelConfiguration, Error> {
        return KernelConfiguration::build(
            &self.electrode_positions,
            &self.estimation_grid,
            &self.source_grid,
            self.kernel.basis,
            r,
            &self.config,
        );
    }

    pub fn r(&self) -> f64 {
        return self.kernel.r;
    }

    pub fn lambda(&self) -> f64 {
        return self.lambda;
    }

    pub fn basis(&self) -> BasisType {
        return self.kernel.basis;
    }

    pub fn dist_max(&self) -> f64 {
        return self.kernel.dist_max;
    }

    pub fn config(&self) -> &Kcsd2dConfig {
        return &self.config;
    }

    pub fn electrode_positions(&self) -> &Array2<f64> {
        return &self.electrode_positions;
    }

    pub fn potentials(&self) -> &Array2<f64> {
        return &self.potentials;
    }

    pub fn estimation_grid(&self) -> &EstimationGrid {
        return &self.estimation_grid;
    }

    pub fn source_grid(&self) -> &SourceGrid {
        return &self.source_grid;
    }

    pub fn kernel(&self) -> &KernelConfiguration {
        return &self.kernel;
    }

    /// Result of the last `cross_validate`, if any
    pub fn cross_validation(&self) -> Option<&CrossValidationResult> {
        return self.cross_validation.as_ref();
    }
}

/// Shapes and values of the electrodes and potentials
fn validate_measurements(electrode_positions: &Array2<f64>, potentials: &Array2<f64>) -> Result<(), Error> {
    let n_electrodes: usize = electrode_positions.nrows();
    if n_electrodes == 0 {
        return Err(configuration_error("at least one electrode is needed"));
    }
    if electrode_positions.ncols() != 2 {
        return Err(configuration_error(format!(
            "electrode positions must have shape (n_electrodes, 2), got {:?}",
            electrode_positions.dim()
        )));
    }
    if potentials.nrows() != n_electrodes {
        return Err(configuration_error(format!(
            "{} electrodes but {} rows of potentials",
            n_electrodes,
            potentials.nrows()
        )));
    }
    if potentials.ncols() == 0 {
        return Err(configuration_error("potentials need at least one time sample"));
    }
    if electrode_positions.iter().any(|value: &f64| !value.is_finite()) {
        return Err(configuration_error("electrode positions must be finite"));
    }
    if potentials.iter().any(|value: &f64| !value.is_finite()) {
        return Err(configuration_error("potentials must be finite"));
    }
    return Ok(());
}

#[cfg(test)]
fn seven_electrodes() -> (Array2<f64>, Array2<f64>, Kcsd2dConfig) {
    let electrode_positions: Array2<f64> = ndarray::array![[-0.2, -0.2], [0.0, 0.0], [0.0, 1.0], [1.0, 0.0], [1.0, 1.0], [0.5, 0.5], [1.2, 1.2]];
    let potentials: Array2<f64> = ndarray::array![[-1.0], [-1.0], [-1.0], [0.0], [0.0], [1.0], [-1.5]];
    let config: Kcsd2dConfig = Kcsd2dConfig::default().with_bounds(-2.0, 2.0, -2.0, 2.0).with_spacing(0.05, 0.05);
    return (electrode_positions, potentials, config);
}

#[test]
fn test_seven_electrodes_end_to_end() {
    let _ = env_logger::builder().is_test(true).try_init();

    let (electrode_positions, potentials, config): (Array2<f64>, Array2<f64>, Kcsd2dConfig) = seven_electrodes();
    let mut kcsd: Kcsd2d = Kcsd2d::with_basis_name(electrode_positions, potentials, "gauss", config).unwrap();

    assert_eq!(kcsd.basis(), BasisType::Gauss);
    assert_eq!(kcsd.estimation_grid().n_x(), 81);
    assert_eq!(kcsd.estimation_grid().n_y(), 81);
    assert_eq!(kcsd.lambda(), 0.0);

    let csd: Array3<f64> = kcsd.values(EstimationMode::Csd).unwrap();
    assert_eq!(csd.dim(), (81, 81, 1));
    assert!(csd.iter().all(|value: &f64| value.is_finite()));

    // No hidden state: the same call gives the same bits
    let csd_again: Array3<f64> = kcsd.values_by_name("CSD").unwrap();
    assert_eq!(csd, csd_again);

    let (r, lambda): (f64, f64) = kcsd.cross_validate(None, None).unwrap();
    assert!(r > 0.0);
    assert!(lambda > 0.0 && lambda < 1.0);
    assert_eq!(kcsd.r(), r);
    assert_eq!(kcsd.lambda(), lambda);

    let cross_validation: &CrossValidationResult = kcsd.cross_validation().unwrap();
    assert_eq!(cross_validation.errors.dim(), (1, 25));
    assert_eq!(cross_validation.best_lambda, lambda);

    let csd: Array3<f64> = kcsd.values(EstimationMode::Csd).unwrap();
    assert_eq!(csd.dim(), (81, 81, 1));
    let potential: Array3<f64> = kcsd.values(EstimationMode::Pot).unwrap();
    assert_eq!(potential.dim(), (81, 81, 1));
}

#[test]
fn test_update_r_and_lambda() {
    use approx::assert_abs_diff_eq;

    let electrode_positions: Array2<f64> = ndarray::array![[0.0, 0.0], [0.0, 1.0], [1.0, 0.0], [1.0, 1.0], [0.5, 0.5]];
    let potentials: Array2<f64> = ndarray::array![[-1.0, 0.5], [-1.0, 0.5], [0.0, 0.5], [0.0, 0.5], [1.0, 0.5]];
    let mut config: Kcsd2dConfig = Kcsd2dConfig::default().with_spacing(0.1, 0.1);
    config.n_src_init = 100;
    config.r_init = 0.3;
    let mut kcsd: Kcsd2d = Kcsd2d::new(electrode_positions, potentials, BasisType::Step, config).unwrap();

    let source_grid_ds: f64 = kcsd.source_grid().ds;
    assert_abs_diff_eq!(kcsd.r(), 3.0 * source_grid_ds, epsilon = 1e-12);
    let csd: Array3<f64> = kcsd.values(EstimationMode::Csd).unwrap();
    assert_eq!(csd.dim(), (11, 11, 2));

    // lambda only changes the solve
    let k_pot: Array2<f64> = kcsd.kernel().matrices.k_pot.clone();
    kcsd.update_lambda(1e-3).unwrap();
    assert_eq!(kcsd.kernel().matrices.k_pot, k_pot);
    let csd_regularised: Array3<f64> = kcsd.values(EstimationMode::Csd).unwrap();
    assert_ne!(csd, csd_regularised);

    // r rebuilds the kernel, not snapped
    kcsd.update_r(0.25).unwrap();
    assert_eq!(kcsd.r(), 0.25);
    assert_eq!(kcsd.kernel().lookup_table.r, 0.25);
    assert_abs_diff_eq!(kcsd.dist_max(), kcsd.source_grid().dist_max(0.25), epsilon = 1e-15);
    assert_ne!(kcsd.kernel().matrices.k_pot, k_pot);

    assert!(matches!(kcsd.update_r(0.0), Err(Error::ConfigurationError { .. })));
    assert!(matches!(kcsd.update_lambda(-1.0), Err(Error::ConfigurationError { .. })));
    assert_eq!(kcsd.lambda(), 1e-3);
}

#[test]
fn test_cross_validate_adopts_winner() {
    let electrode_positions: Array2<f64> = ndarray::array![[0.0, 0.0], [0.0, 1.0], [1.0, 0.0], [1.0, 1.0], [0.5, 0.5], [0.2, 0.7]];
    let potentials: Array2<f64> = ndarray::array![[-1.0], [-1.0], [0.0], [0.0], [1.0], [0.3]];
    let mut config: Kcsd2dConfig = Kcsd2dConfig::default().with_spacing(0.1, 0.1);
    config.n_src_init = 100;
    let mut kcsd: Kcsd2d = Kcsd2d::new(electrode_positions, potentials, BasisType::Gauss, config).unwrap();

    // Single candidates are always chosen
    let (r, lambda): (f64, f64) = kcsd.cross_validate(Some(&ndarray::array![0.4]), Some(&ndarray::array![0.05])).unwrap();
    assert_eq!((r, lambda), (0.4, 0.05));
    assert_eq!(kcsd.r(), 0.4);
    assert_eq!(kcsd.kernel().r, 0.4);
    assert_eq!(kcsd.lambda(), 0.05);

    // Several radii: the winner is one of them and the kernel follows it
    let rs: Array1<f64> = ndarray::array![0.2, 0.4, 0.6];
    let (r, _lambda): (f64, f64) = kcsd.cross_validate(Some(&rs), None).unwrap();
    assert!(rs.iter().any(|&candidate| candidate == r));
    assert_eq!(kcsd.kernel().r, r);
    assert_eq!(kcsd.cross_validation().unwrap().errors.dim(), (3, 25));
}

#[test]
fn test_construction_errors() {
    // Unknown basis
    let (electrode_positions, potentials, config): (Array2<f64>, Array2<f64>, Kcsd2dConfig) = seven_electrodes();
    let result: Result<Kcsd2d, Error> = Kcsd2d::with_basis_name(electrode_positions, potentials, "unknown", config);
    assert_eq!(
        result.err(),
        Some(Error::InvalidBasisType {
            basis_type: "unknown".to_string()
        })
    );

    // 7 electrodes, 6 rows of potentials
    let (electrode_positions, potentials, config): (Array2<f64>, Array2<f64>, Kcsd2dConfig) = seven_electrodes();
    let potentials: Array2<f64> = potentials.slice(ndarray::s![0..6, ..]).to_owned();
    let result: Result<Kcsd2d, Error> = Kcsd2d::with_basis_name(electrode_positions, potentials, "gauss", config);
    assert!(matches!(result, Err(Error::ConfigurationError { .. })));

    // Wrong number of coordinates
    let electrode_positions: Array2<f64> = Array2::zeros((3, 3));
    let potentials: Array2<f64> = Array2::zeros((3, 1));
    let result: Result<Kcsd2d, Error> = Kcsd2d::new(electrode_positions, potentials, BasisType::Gauss, Kcsd2dConfig::default());
    assert!(matches!(result, Err(Error::ConfigurationError { .. })));

    // No time samples
    let (electrode_positions, _potentials, config): (Array2<f64>, Array2<f64>, Kcsd2dConfig) = seven_electrodes();
    let result: Result<Kcsd2d, Error> = Kcsd2d::new(electrode_positions, Array2::zeros((7, 0)), BasisType::Gauss, config);
    assert!(matches!(result, Err(Error::ConfigurationError { .. })));

    // Non-finite potentials
    let (electrode_positions, mut potentials, config): (Array2<f64>, Array2<f64>, Kcsd2dConfig) = seven_electrodes();
    potentials[[3, 0]] = f64::NAN;
    let result: Result<Kcsd2d, Error> = Kcsd2d::new(electrode_positions, potentials, BasisType::Gauss, config);
    assert!(matches!(result, Err(Error::ConfigurationError { .. })));
}

#[test]
fn test_with_basis_name_checks_inputs_before_the_name() {
    // Bad measurements and an unknown basis: the measurements are reported
    let (electrode_positions, potentials, config): (Array2<f64>, Array2<f64>, Kcsd2dConfig) = seven_electrodes();
    let potentials: Array2<f64> = potentials.slice(ndarray::s![0..6, ..]).to_owned();
    let result: Result<Kcsd2d, Error> = Kcsd2d::with_basis_name(electrode_positions, potentials, "unknown", config);
    assert!(matches!(result, Err(Error::ConfigurationError { .. })));

    // Bad config and an unknown basis: the config is reported
    let (electrode_positions, potentials, mut config): (Array2<f64>, Array2<f64>, Kcsd2dConfig) = seven_electrodes();
    config.sigma = -1.0;
    let result: Result<Kcsd2d, Error> = Kcsd2d::with_basis_name(electrode_positions, potentials, "unknown", config);
    assert!(matches!(result, Err(Error::ConfigurationError { .. })));

    // Valid inputs build the same engine through both constructors
    let (electrode_positions, potentials, config): (Array2<f64>, Array2<f64>, Kcsd2dConfig) = seven_electrodes();
    let by_name: Kcsd2d = Kcsd2d::with_basis_name(electrode_positions.clone(), potentials.clone(), "step", config.clone()).unwrap();
    let by_type: Kcsd2d = Kcsd2d::new(electrode_positions, potentials, BasisType::Step, config).unwrap();
    assert_eq!(by_name.basis(), BasisType::Step);
    assert_eq!(by_name.r(), by_type.r());
    assert_eq!(by_name.kernel().matrices.k_pot, by_type.kernel().matrices.k_pot);
}

#[test]
fn test_values_by_name_rejects_unknown_mode() {
    let electrode_positions: Array2<f64> = ndarray::array![[0.0, 0.0], [1.0, 1.0]];
    let potentials: Array2<f64> = ndarray::array![[1.0], [-1.0]];
    let mut config: Kcsd2dConfig = Kcsd2dConfig::default().with_spacing(0.25, 0.25);
    config.n_src_init = 25;
    config.r_init = 0.3;
    let kcsd: Kcsd2d = Kcsd2d::new(electrode_positions, potentials, BasisType::GaussLim, config).unwrap();

    assert_eq!(
        kcsd.values_by_name("CURRENT").err(),
        Some(Error::InvalidEstimationMode {
            mode: "CURRENT".to_string()
        })
    );
    assert_eq!(kcsd.values_by_name("POT").unwrap().dim(), (5, 5, 1));
}
