use super::EstimationGrid;
use crate::errors::{Error, configuration_error};
use ndarray::{Array1, Array2};

/// Regular mesh of basis source centres, all sharing the radius `r`
///
/// The flattened source index is `i_x * n_y + i_y`.
#[derive(Clone, Debug, PartialEq)]
pub struct SourceGrid {
    pub x: Array1<f64>,
    pub y: Array1<f64>,
    /// Distance between neighbouring sources, the same along both axes
    pub ds: f64,
    /// Radius of the basis sources, snapped to a whole number of `ds`
    pub r: f64,
}

impl SourceGrid {
    /// Place the basis sources over the estimation area
    ///
    /// # Arguments
    /// * `estimation_grid` - the area of interest
    /// * `n_src_init` - requested number of sources, the actual number is close to it
    /// * `ext_x`, `ext_y` - margin added on each side of the estimation area
    /// * `r_init` - requested source radius
    ///
    /// # Algorithm
    /// 1. Extend the estimation area by the margins: `lx_ext`, `ly_ext`.
    /// 2. A source "owns" a square cell of edge `sqrt(lx_ext * ly_ext / n_src_init)`; the number of
    ///    sources along each axis is the number of cells needed to cover that axis.
    /// 3. The source spacing `ds` is set by the x axis, and the y axis is re-centred with the same spacing.
    /// 4. `r = round(r_init / ds) * ds`, at least one `ds`.
    pub fn new(estimation_grid: &EstimationGrid, n_src_init: usize, ext_x: f64, ext_y: f64, r_init: f64) -> Result<Self, Error> {
        if n_src_init == 0 {
            return Err(configuration_error("`n_src_init` must be at least 1"));
        }

        let lx: f64 = estimation_grid.x_max() - estimation_grid.x_min();
        let ly: f64 = estimation_grid.y_max() - estimation_grid.y_min();
        let lx_ext: f64 = lx + 2.0 * ext_x;
        let ly_ext: f64 = ly + 2.0 * ext_y;
        if !(lx_ext > 0.0 && ly_ext > 0.0) {
            return Err(configuration_error(format!(
                "the area covered by the basis sources must be positive, got {} x {}",
                lx_ext, ly_ext
            )));
        }

        let cell_edge: f64 = (lx_ext * ly_ext / n_src_init as f64).sqrt();
        let n_x: usize = (lx_ext / cell_edge).ceil() as usize;
        let n_y: usize = (ly_ext / cell_edge).ceil() as usize;
        if n_x < 2 || n_y < 2 {
            return Err(configuration_error(format!(
                "need at least 2 basis sources along each axis, got {} x {}; increase `n_src_init`",
                n_x, n_y
            )));
        }

        let ds: f64 = lx_ext / (n_x - 1) as f64;
        let lx_covered: f64 = (n_x - 1) as f64 * ds;
        let ly_covered: f64 = (n_y - 1) as f64 * ds;
        let ext_x_covered: f64 = (lx_covered - lx) / 2.0;
        let ext_y_covered: f64 = (ly_covered - ly) / 2.0;

        let x: Array1<f64> = Array1::linspace(estimation_grid.x_min() - ext_x_covered, estimation_grid.x_max() + ext_x_covered, n_x);
        let y: Array1<f64> = Array1::linspace(estimation_grid.y_min() - ext_y_covered, estimation_grid.y_max() + ext_y_covered, n_y);

        let n_ds: f64 = (r_init / ds).round().max(1.0);
        let r: f64 = n_ds * ds;

        return Ok(SourceGrid { x, y, ds, r });
    }

    pub fn n_x(&self) -> usize {
        return self.x.len();
    }

    pub fn n_y(&self) -> usize {
        return self.y.len();
    }

    pub fn n_sources(&self) -> usize {
        return self.n_x() * self.n_y();
    }

    /// Flattened source centres, shape = (n_sources, 2)
    pub fn centres(&self) -> Array2<f64> {
        let n_y: usize = self.n_y();
        let mut centres: Array2<f64> = Array2::zeros((self.n_sources(), 2));
        for (i_x, &x) in self.x.iter().enumerate() {
            for (i_y, &y) in self.y.iter().enumerate() {
                centres[[i_x * n_y + i_y, 0]] = x;
                centres[[i_x * n_y + i_y, 1]] = y;
            }
        }
        return centres;
    }

    /// Largest centre-to-point distance the lookup table has to cover for sources of radius `r`
    ///
    /// The diagonal of the source area extended by `r`.
    pub fn dist_max(&self, r: f64) -> f64 {
        let lx: f64 = self.x[self.n_x() - 1] - self.x[0] + r;
        let ly: f64 = self.y[self.n_y() - 1] - self.y[0] + r;
        return (lx.powi(2) + ly.powi(2)).sqrt();
    }
}

#[test]
fn test_source_grid_square_area() {
    use crate::config::Kcsd2dConfig;
    use approx::assert_abs_diff_eq;

    let electrode_positions: Array2<f64> = ndarray::array![[0.0, 0.0], [1.0, 1.0]];
    let config: Kcsd2dConfig = Kcsd2dConfig::default().with_bounds(-2.0, 2.0, -2.0, 2.0).with_spacing(0.05, 0.05);
    let estimation_grid: EstimationGrid = EstimationGrid::new(&electrode_positions, &config).unwrap();

    let source_grid: SourceGrid = SourceGrid::new(&estimation_grid, 1000, 0.0, 0.0, 1.0).unwrap();

    // cell edge = sqrt(16 / 1000) = 0.1265 => ceil(4 / 0.1265) = 32 sources per axis
    assert_eq!(source_grid.n_x(), 32);
    assert_eq!(source_grid.n_y(), 32);
    assert_eq!(source_grid.n_sources(), 1024);
    assert_abs_diff_eq!(source_grid.ds, 4.0 / 31.0, epsilon = 1e-12);
    assert_abs_diff_eq!(source_grid.x[0], -2.0, epsilon = 1e-12);
    assert_abs_diff_eq!(source_grid.y[31], 2.0, epsilon = 1e-12);

    // r snapped to a whole number of `ds`: round(1.0 / 0.129) = 8
    assert_abs_diff_eq!(source_grid.r, 8.0 * 4.0 / 31.0, epsilon = 1e-12);

    let dist_max: f64 = source_grid.dist_max(source_grid.r);
    assert_abs_diff_eq!(dist_max, 2.0_f64.sqrt() * (4.0 + source_grid.r), epsilon = 1e-12);
}

#[test]
fn test_source_grid_margin_and_minimum_radius() {
    use crate::config::Kcsd2dConfig;
    use approx::assert_abs_diff_eq;

    let electrode_positions: Array2<f64> = ndarray::array![[0.0, 0.0], [1.0, 0.5]];
    let estimation_grid: EstimationGrid = EstimationGrid::new(&electrode_positions, &Kcsd2dConfig::default()).unwrap();
    let source_grid: SourceGrid = SourceGrid::new(&estimation_grid, 200, 0.25, 0.25, 1e-6).unwrap();

    // The x axis extends exactly by the margin
    assert_abs_diff_eq!(source_grid.x[0], -0.25, epsilon = 1e-12);
    assert_abs_diff_eq!(source_grid.x[source_grid.n_x() - 1], 1.25, epsilon = 1e-12);
    // Both axes share the spacing
    assert_abs_diff_eq!(source_grid.y[1] - source_grid.y[0], source_grid.ds, epsilon = 1e-12);
    // A tiny requested radius still gives one source spacing
    assert_abs_diff_eq!(source_grid.r, source_grid.ds, epsilon = 1e-15);

    let centres: Array2<f64> = source_grid.centres();
    assert_eq!(centres.nrows(), source_grid.n_sources());
    assert_abs_diff_eq!(centres[[source_grid.n_y(), 0]], source_grid.x[1], epsilon = 1e-15);
}

#[test]
fn test_source_grid_too_few_sources() {
    use crate::config::Kcsd2dConfig;

    let electrode_positions: Array2<f64> = ndarray::array![[0.0, 0.0], [1.0, 1.0]];
    let estimation_grid: EstimationGrid = EstimationGrid::new(&electrode_positions, &Kcsd2dConfig::default()).unwrap();
    let result: Result<SourceGrid, Error> = SourceGrid::new(&estimation_grid, 1, 0.0, 0.0, 0.1);
    assert!(matches!(result, Err(Error::ConfigurationError { .. })));
}
