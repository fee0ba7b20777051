use crate::config::Kcsd2dConfig;
use crate::errors::{Error, configuration_error};
use ndarray::{Array1, Array2, Axis};
use ndarray_stats::QuantileExt;

/// Regular mesh of points where the CSD (or potential) is estimated
///
/// Points are stored as two axes; the flattened point index is `i_x * n_y + i_y`.
#[derive(Clone, Debug, PartialEq)]
pub struct EstimationGrid {
    pub x: Array1<f64>,
    pub y: Array1<f64>,
    pub d_x: f64,
    pub d_y: f64,
}

impl EstimationGrid {
    /// Build the estimation grid
    ///
    /// # Arguments
    /// * `electrode_positions` - shape = (n_electrodes, 2)
    /// * `config` - bounds (`x_min`, `x_max`, `y_min`, `y_max`) and spacings (`gd_x`, `gd_y`);
    ///   missing bounds default to the electrode bounding box, missing spacings to 1% of the span
    ///
    /// # Returns
    /// * `EstimationGrid` with `round(span / spacing) + 1` points along each axis
    pub fn new(electrode_positions: &Array2<f64>, config: &Kcsd2dConfig) -> Result<Self, Error> {
        let (x_min, x_max, d_x): (f64, f64, f64) = axis_extent(electrode_positions, 0, config.x_min, config.x_max, config.gd_x, "x")?;
        let (y_min, y_max, d_y): (f64, f64, f64) = axis_extent(electrode_positions, 1, config.y_min, config.y_max, config.gd_y, "y")?;

        let n_x: usize = ((x_max - x_min) / d_x).round() as usize + 1;
        let n_y: usize = ((y_max - y_min) / d_y).round() as usize + 1;

        let x: Array1<f64> = Array1::linspace(x_min, x_max, n_x);
        let y: Array1<f64> = Array1::linspace(y_min, y_max, n_y);

        return Ok(EstimationGrid { x, y, d_x, d_y });
    }

    pub fn n_x(&self) -> usize {
        return self.x.len();
    }

    pub fn n_y(&self) -> usize {
        return self.y.len();
    }

    pub fn n_points(&self) -> usize {
        return self.n_x() * self.n_y();
    }

    pub fn x_min(&self) -> f64 {
        return self.x[0];
    }

    pub fn x_max(&self) -> f64 {
        return self.x[self.n_x() - 1];
    }

    pub fn y_min(&self) -> f64 {
        return self.y[0];
    }

    pub fn y_max(&self) -> f64 {
        return self.y[self.n_y() - 1];
    }

    /// Flattened coordinates of every grid point, shape = (n_x * n_y, 2)
    pub fn points(&self) -> Array2<f64> {
        let n_y: usize = self.n_y();
        let mut points: Array2<f64> = Array2::zeros((self.n_points(), 2));
        for (i_x, &x) in self.x.iter().enumerate() {
            for (i_y, &y) in self.y.iter().enumerate() {
                points[[i_x * n_y + i_y, 0]] = x;
                points[[i_x * n_y + i_y, 1]] = y;
            }
        }
        return points;
    }
}

/// Bounds and spacing along one axis
fn axis_extent(
    electrode_positions: &Array2<f64>,
    i_axis: usize,
    min_override: Option<f64>,
    max_override: Option<f64>,
    spacing_override: Option<f64>,
    axis_name: &str,
) -> Result<(f64, f64, f64), Error> {
    let electrode_coordinates = electrode_positions.index_axis(Axis(1), i_axis);

    let axis_min: f64 = match min_override {
        Some(value) => value,
        None => *electrode_coordinates
            .min()
            .map_err(|error| configuration_error(format!("electrode {} positions: {}", axis_name, error)))?,
    };
    let axis_max: f64 = match max_override {
        Some(value) => value,
        None => *electrode_coordinates
            .max()
            .map_err(|error| configuration_error(format!("electrode {} positions: {}", axis_name, error)))?,
    };

    let span: f64 = axis_max - axis_min;
    if span < 0.0 {
        return Err(configuration_error(format!(
            "estimation bounds along {} are inverted: min={}, max={}",
            axis_name, axis_min, axis_max
        )));
    }

    let spacing: f64 = spacing_override.unwrap_or(0.01 * span);
    if !(spacing.is_finite() && spacing > 0.0) {
        return Err(configuration_error(format!(
            "grid spacing along {} must be positive, got {} (span={})",
            axis_name, spacing, span
        )));
    }

    return Ok((axis_min, axis_max, spacing));
}

#[test]
fn test_estimation_grid_from_spacing() {
    use approx::assert_abs_diff_eq;

    let electrode_positions: Array2<f64> = ndarray::array![[0.0, 0.0], [1.0, 1.0]];
    let config: Kcsd2dConfig = Kcsd2dConfig::default().with_bounds(-2.0, 2.0, -2.0, 2.0).with_spacing(0.05, 0.05);
    let grid: EstimationGrid = EstimationGrid::new(&electrode_positions, &config).unwrap();

    assert_eq!(grid.n_x(), 81);
    assert_eq!(grid.n_y(), 81);
    assert_abs_diff_eq!(grid.x_min(), -2.0, epsilon = 1e-12);
    assert_abs_diff_eq!(grid.y_max(), 2.0, epsilon = 1e-12);
    assert_abs_diff_eq!(grid.x[1] - grid.x[0], 0.05, epsilon = 1e-12);

    // Flattened ordering is `i_x * n_y + i_y`
    let points: Array2<f64> = grid.points();
    assert_eq!(points.dim(), (81 * 81, 2));
    assert_abs_diff_eq!(points[[81 + 2, 0]], grid.x[1], epsilon = 1e-15);
    assert_abs_diff_eq!(points[[81 + 2, 1]], grid.y[2], epsilon = 1e-15);
}

#[test]
fn test_estimation_grid_defaults_to_electrode_box() {
    use approx::assert_abs_diff_eq;

    let electrode_positions: Array2<f64> = ndarray::array![[0.1, 0.2], [0.9, 0.2], [0.5, 0.7]];
    let grid: EstimationGrid = EstimationGrid::new(&electrode_positions, &Kcsd2dConfig::default()).unwrap();

    // 1% spacing gives 101 points per axis
    assert_eq!(grid.n_x(), 101);
    assert_eq!(grid.n_y(), 101);
    assert_abs_diff_eq!(grid.x_min(), 0.1, epsilon = 1e-12);
    assert_abs_diff_eq!(grid.x_max(), 0.9, epsilon = 1e-12);
    assert_abs_diff_eq!(grid.y_min(), 0.2, epsilon = 1e-12);
    assert_abs_diff_eq!(grid.y_max(), 0.7, epsilon = 1e-12);
    assert_abs_diff_eq!(grid.d_x, 0.008, epsilon = 1e-12);
}

#[test]
fn test_estimation_grid_degenerate_axis() {
    // All electrodes on a horizontal line: default y spacing is zero
    let electrode_positions: Array2<f64> = ndarray::array![[0.0, 0.5], [1.0, 0.5]];
    let result: Result<EstimationGrid, Error> = EstimationGrid::new(&electrode_positions, &Kcsd2dConfig::default());
    assert!(matches!(result, Err(Error::ConfigurationError { .. })));

    // Inverted bounds
    let config: Kcsd2dConfig = Kcsd2dConfig::default().with_bounds(1.0, 0.0, 0.0, 1.0);
    let result: Result<EstimationGrid, Error> = EstimationGrid::new(&electrode_positions, &config);
    assert!(matches!(result, Err(Error::ConfigurationError { .. })));
}
