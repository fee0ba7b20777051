use super::{ElectrodeKernel, KernelMatrices};
use crate::basis::BasisType;
use crate::config::Kcsd2dConfig;
use crate::errors::Error;
use crate::grid::{EstimationGrid, SourceGrid};
use crate::lookup_table::DistanceLookupTable;
use log::debug;
use ndarray::Array2;

/// Everything which depends on the source radius and shape
///
/// Immutable: changing `r` or `basis` means building a new one.
#[derive(Clone, Debug, PartialEq)]
pub struct KernelConfiguration {
    pub basis: BasisType,
    pub r: f64,
    pub dist_max: f64,
    pub lookup_table: DistanceLookupTable,
    pub matrices: KernelMatrices,
}

impl KernelConfiguration {
    /// Tabulate the forward model for radius `r` and assemble all kernel matrices
    ///
    /// # Arguments
    /// * `electrode_positions` - shape = (n_electrodes, 2)
    /// * `estimation_grid`, `source_grid` - from `grid::build_grids`
    /// * `basis` - shape of the sources
    /// * `r` - source radius
    /// * `config` - `h`, `sigma` and the lookup table / integration settings
    pub fn build(
        electrode_positions: &Array2<f64>,
        estimation_grid: &EstimationGrid,
        source_grid: &SourceGrid,
        basis: BasisType,
        r: f64,
        config: &Kcsd2dConfig,
    ) -> Result<Self, Error> {
        let lookup_table: DistanceLookupTable = build_lookup_table(source_grid, basis, r, config)?;
        let dist_max: f64 = lookup_table.dist_max;
        let matrices: KernelMatrices = KernelMatrices::assemble(source_grid, electrode_positions, estimation_grid, &lookup_table, basis, r);

        return Ok(KernelConfiguration {
            basis,
            r,
            dist_max,
            lookup_table,
            matrices,
        });
    }
}

impl ElectrodeKernel {
    /// Tabulate the forward model for radius `r` and assemble only the electrode-side kernel
    pub fn for_radius(electrode_positions: &Array2<f64>, source_grid: &SourceGrid, basis: BasisType, r: f64, config: &Kcsd2dConfig) -> Result<Self, Error> {
        let lookup_table: DistanceLookupTable = build_lookup_table(source_grid, basis, r, config)?;
        return Ok(ElectrodeKernel::assemble(source_grid, electrode_positions, &lookup_table));
    }
}

fn build_lookup_table(source_grid: &SourceGrid, basis: BasisType, r: f64, config: &Kcsd2dConfig) -> Result<DistanceLookupTable, Error> {
    let dist_max: f64 = source_grid.dist_max(r);
    debug!("build_lookup_table: basis={}, r={}, dist_max={}", basis, r, dist_max);

    let lookup_table: DistanceLookupTable =
        DistanceLookupTable::build(r, dist_max, basis, config.h, config.sigma, &config.lookup, &config.forward_model)?;
    return Ok(lookup_table);
}

#[test]
fn test_kernel_configuration_build() {
    use crate::grid::build_grids;
    use approx::assert_abs_diff_eq;

    let electrode_positions: Array2<f64> = ndarray::array![[0.0, 0.0], [1.0, 0.0], [0.0, 1.0], [1.0, 1.0]];
    let mut config: Kcsd2dConfig = Kcsd2dConfig::default().with_spacing(0.2, 0.2);
    config.n_src_init = 49;
    config.r_init = 0.3;
    let (estimation_grid, source_grid): (EstimationGrid, SourceGrid) = build_grids(&electrode_positions, &config).unwrap();

    let kernel: KernelConfiguration =
        KernelConfiguration::build(&electrode_positions, &estimation_grid, &source_grid, BasisType::GaussLim, source_grid.r, &config).unwrap();

    assert_eq!(kernel.basis, BasisType::GaussLim);
    assert_eq!(kernel.r, source_grid.r);
    let span: f64 = 1.0 + source_grid.r;
    assert_abs_diff_eq!(kernel.dist_max, 2.0_f64.sqrt() * span, epsilon = 1e-12);
    assert_eq!(kernel.lookup_table.r, source_grid.r);
    assert_eq!(kernel.matrices.n_points(), 36);
    assert_eq!(kernel.matrices.n_electrodes(), 4);

    // The electrode-only kernel is the same as the full one's electrode part
    let electrode_kernel: ElectrodeKernel = ElectrodeKernel::for_radius(&electrode_positions, &source_grid, BasisType::GaussLim, source_grid.r, &config).unwrap();
    assert_eq!(electrode_kernel.k_pot, kernel.matrices.k_pot);
    assert_eq!(electrode_kernel.b_pot, kernel.matrices.b_pot);
}
