use super::{EstimationGrid, SourceGrid};
use crate::config::Kcsd2dConfig;
use crate::errors::Error;
use log::debug;
use ndarray::Array2;

/// Build the estimation grid and the basis source grid
///
/// # Arguments
/// * `electrode_positions` - shape = (n_electrodes, 2)
/// * `config` - estimation bounds and spacing, `n_src_init`, margins `ext_x`/`ext_y` and `r_init`
///
/// # Returns
/// * `(EstimationGrid, SourceGrid)`; the source radius in `SourceGrid::r` is `r_init` snapped to
///   the source lattice
///
/// # Examples
/// ```
/// use kcsd_rs::Kcsd2dConfig;
/// use kcsd_rs::grid::{EstimationGrid, SourceGrid, build_grids};
/// use ndarray::{Array2, array};
///
/// let electrode_positions: Array2<f64> = array![[0.0, 0.0], [0.0, 1.0], [1.0, 0.0], [1.0, 1.0]];
/// let config: Kcsd2dConfig = Kcsd2dConfig::default().with_spacing(0.1, 0.1);
///
/// let (estimation_grid, source_grid): (EstimationGrid, SourceGrid) = build_grids(&electrode_positions, &config).unwrap();
/// assert_eq!(estimation_grid.n_points(), 11 * 11);
/// assert!(source_grid.n_sources() >= 1000);
/// ```
pub fn build_grids(electrode_positions: &Array2<f64>, config: &Kcsd2dConfig) -> Result<(EstimationGrid, SourceGrid), Error> {
    let estimation_grid: EstimationGrid = EstimationGrid::new(electrode_positions, config)?;
    let source_grid: SourceGrid = SourceGrid::new(&estimation_grid, config.n_src_init, config.ext_x, config.ext_y, config.r_init)?;

    debug!(
        "build_grids: estimation grid {}x{}, source grid {}x{}, ds={}, r={}",
        estimation_grid.n_x(),
        estimation_grid.n_y(),
        source_grid.n_x(),
        source_grid.n_y(),
        source_grid.ds,
        source_grid.r
    );

    return Ok((estimation_grid, source_grid));
}
