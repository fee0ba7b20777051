use super::distance_matrix;
use crate::basis::BasisType;
use crate::grid::{EstimationGrid, SourceGrid};
use crate::lookup_table::DistanceLookupTable;
use log::info;
use ndarray::{Array1, Array2};
use rayon::prelude::*;
use std::time::{Duration, Instant};

/// Electrode-side kernel, all that cross-validation needs
#[derive(Clone, Debug, PartialEq)]
pub struct ElectrodeKernel {
    /// Potential generated by each basis source at each electrode, shape = (n_sources, n_electrodes)
    pub b_pot: Array2<f64>,
    /// `b_pot^T * b_pot`, shape = (n_electrodes, n_electrodes)
    pub k_pot: Array2<f64>,
}

impl ElectrodeKernel {
    /// # Arguments
    /// * `source_grid` - basis source centres
    /// * `electrode_positions` - shape = (n_electrodes, 2)
    /// * `lookup_table` - forward model for the sources' radius and shape
    pub fn assemble(source_grid: &SourceGrid, electrode_positions: &Array2<f64>, lookup_table: &DistanceLookupTable) -> Self {
        let distances: Array2<f64> = distance_matrix(&source_grid.centres(), electrode_positions);
        let b_pot: Array2<f64> = lookup_table.lookup_array(&distances);
        let k_pot: Array2<f64> = b_pot.t().dot(&b_pot);

        return ElectrodeKernel { b_pot, k_pot };
    }

    pub fn n_electrodes(&self) -> usize {
        return self.k_pot.nrows();
    }
}

/// Kernel matrices of one (basis, radius) configuration
#[derive(Clone, Debug, PartialEq)]
pub struct KernelMatrices {
    /// shape = (n_sources, n_electrodes)
    pub b_pot: Array2<f64>,
    /// shape = (n_electrodes, n_electrodes), symmetric
    pub k_pot: Array2<f64>,
    /// Maps electrode weights onto the CSD at the estimation points, shape = (n_points, n_electrodes)
    pub k_interp_cross: Array2<f64>,
    /// Maps electrode weights onto the potential at the estimation points, shape = (n_points, n_electrodes)
    pub k_interp_pot: Array2<f64>,
}

impl KernelMatrices {
    /// Assemble all kernel matrices
    ///
    /// # Arguments
    /// * `source_grid` - basis source centres
    /// * `electrode_positions` - shape = (n_electrodes, 2)
    /// * `estimation_grid` - where the CSD and potential are reconstructed
    /// * `lookup_table` - forward model for radius `r` and `basis`
    /// * `basis` - shape of the sources
    /// * `r` - source radius
    ///
    /// # Algorithm
    /// With `b_src[p, s]` the value of source `s` at estimation point `p` and `b_interp_pot[p, s]`
    /// the potential of source `s` at point `p`:
    /// * `k_interp_cross = b_src * b_pot`
    /// * `k_interp_pot = b_interp_pot * b_pot`
    ///
    /// Both products are computed one estimation point at a time, so neither (n_points, n_sources)
    /// matrix is stored.
    pub fn assemble(
        source_grid: &SourceGrid,
        electrode_positions: &Array2<f64>,
        estimation_grid: &EstimationGrid,
        lookup_table: &DistanceLookupTable,
        basis: BasisType,
        r: f64,
    ) -> Self {
        let timing_start: Instant = Instant::now();

        let electrode_kernel: ElectrodeKernel = ElectrodeKernel::assemble(source_grid, electrode_positions, lookup_table);
        let b_pot: &Array2<f64> = &electrode_kernel.b_pot;

        let points: Array2<f64> = estimation_grid.points();
        let centres: Array2<f64> = source_grid.centres();
        let n_points: usize = points.nrows();
        let n_sources: usize = centres.nrows();
        let n_electrodes: usize = electrode_positions.nrows();

        let rows: Vec<(Array1<f64>, Array1<f64>)> = (0..n_points)
            .into_par_iter() // Use Rayon to create a parallel iterator
            .map(|i_point: usize| {
                let x_point: f64 = points[[i_point, 0]];
                let y_point: f64 = points[[i_point, 1]];

                let mut b_src_row: Array1<f64> = Array1::zeros(n_sources);
                let mut b_interp_pot_row: Array1<f64> = Array1::zeros(n_sources);
                for i_source in 0..n_sources {
                    let x_centre: f64 = centres[[i_source, 0]];
                    let y_centre: f64 = centres[[i_source, 1]];
                    b_src_row[i_source] = basis.value(x_point, y_point, x_centre, y_centre, r);
                    let distance: f64 = ((x_point - x_centre).powi(2) + (y_point - y_centre).powi(2)).sqrt();
                    b_interp_pot_row[i_source] = lookup_table.lookup(distance);
                }

                (b_src_row.dot(b_pot), b_interp_pot_row.dot(b_pot))
            })
            .collect();

        // Collect the rows into matrices
        let mut k_interp_cross: Array2<f64> = Array2::zeros((n_points, n_electrodes));
        let mut k_interp_pot: Array2<f64> = Array2::zeros((n_points, n_electrodes));
        for (i_point, (cross_row, pot_row)) in rows.into_iter().enumerate() {
            k_interp_cross.row_mut(i_point).assign(&cross_row);
            k_interp_pot.row_mut(i_point).assign(&pot_row);
        }

        let duration: Duration = timing_start.elapsed();
        info!(
            "KernelMatrices::assemble: {} sources, {} electrodes, {} estimation points, time elapsed: {:?}",
            n_sources, n_electrodes, n_points, duration
        );

        return KernelMatrices {
            b_pot: electrode_kernel.b_pot,
            k_pot: electrode_kernel.k_pot,
            k_interp_cross,
            k_interp_pot,
        };
    }

    pub fn n_electrodes(&self) -> usize {
        return self.k_pot.nrows();
    }

    pub fn n_points(&self) -> usize {
        return self.k_interp_cross.nrows();
    }
}

#[cfg(test)]
fn small_lookup_table(source_grid: &SourceGrid, basis: BasisType) -> DistanceLookupTable {
    use crate::config::{ForwardModelSettings, LookupTableTuning};

    let r: f64 = source_grid.r;
    return DistanceLookupTable::build(
        r,
        source_grid.dist_max(r),
        basis,
        1.0,
        1.0,
        &LookupTableTuning::default(),
        &ForwardModelSettings::default(),
    )
    .unwrap();
}

#[test]
fn test_k_pot_is_symmetric() {
    use crate::config::Kcsd2dConfig;
    use crate::grid::build_grids;
    use approx::assert_abs_diff_eq;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    let _ = env_logger::builder().is_test(true).try_init();

    // Random electrode layout
    let mut rng: StdRng = StdRng::seed_from_u64(7);
    let n_electrodes: usize = 12;
    let mut electrode_positions: Array2<f64> = Array2::zeros((n_electrodes, 2));
    for i_electrode in 0..n_electrodes {
        electrode_positions[[i_electrode, 0]] = rng.random_range(0.0..1.0);
        electrode_positions[[i_electrode, 1]] = rng.random_range(0.0..1.0);
    }

    let mut config: Kcsd2dConfig = Kcsd2dConfig::default().with_bounds(0.0, 1.0, 0.0, 1.0).with_spacing(0.1, 0.1);
    config.n_src_init = 100;
    config.r_init = 0.2;
    let (_estimation_grid, source_grid): (EstimationGrid, SourceGrid) = build_grids(&electrode_positions, &config).unwrap();
    let lookup_table: DistanceLookupTable = small_lookup_table(&source_grid, BasisType::Gauss);

    let electrode_kernel: ElectrodeKernel = ElectrodeKernel::assemble(&source_grid, &electrode_positions, &lookup_table);
    assert_eq!(electrode_kernel.b_pot.dim(), (source_grid.n_sources(), n_electrodes));
    assert_eq!(electrode_kernel.n_electrodes(), n_electrodes);

    let k_pot: &Array2<f64> = &electrode_kernel.k_pot;
    for i_row in 0..n_electrodes {
        assert!(k_pot[[i_row, i_row]] > 0.0);
        for i_column in 0..n_electrodes {
            assert_abs_diff_eq!(k_pot[[i_row, i_column]], k_pot[[i_column, i_row]], epsilon = 1e-12 * k_pot[[i_row, i_row]]);
        }
    }
}

#[test]
fn test_kernel_matrices_assemble() {
    use crate::config::Kcsd2dConfig;
    use crate::grid::build_grids;
    use approx::assert_relative_eq;

    let electrode_positions: Array2<f64> = ndarray::array![[0.2, 0.2], [0.8, 0.3], [0.5, 0.9]];
    let mut config: Kcsd2dConfig = Kcsd2dConfig::default().with_bounds(0.0, 1.0, 0.0, 1.0).with_spacing(0.25, 0.25);
    config.n_src_init = 64;
    config.r_init = 0.3;
    let (estimation_grid, source_grid): (EstimationGrid, SourceGrid) = build_grids(&electrode_positions, &config).unwrap();
    let lookup_table: DistanceLookupTable = small_lookup_table(&source_grid, BasisType::Step);

    let matrices: KernelMatrices = KernelMatrices::assemble(
        &source_grid,
        &electrode_positions,
        &estimation_grid,
        &lookup_table,
        BasisType::Step,
        source_grid.r,
    );

    assert_eq!(matrices.n_electrodes(), 3);
    assert_eq!(matrices.n_points(), 25);
    assert_eq!(matrices.k_interp_pot.dim(), (25, 3));

    // Explicit sum for the centre point of the estimation grid, flattened index 2 * 5 + 2
    let centres: Array2<f64> = source_grid.centres();
    let i_point: usize = 12;
    for i_electrode in 0..3 {
        let mut cross_expected: f64 = 0.0;
        let mut pot_expected: f64 = 0.0;
        for i_source in 0..source_grid.n_sources() {
            let d_x: f64 = 0.5 - centres[[i_source, 0]];
            let d_y: f64 = 0.5 - centres[[i_source, 1]];
            let b_pot: f64 = matrices.b_pot[[i_source, i_electrode]];
            cross_expected += BasisType::Step.value(0.5, 0.5, centres[[i_source, 0]], centres[[i_source, 1]], source_grid.r) * b_pot;
            pot_expected += lookup_table.lookup((d_x.powi(2) + d_y.powi(2)).sqrt()) * b_pot;
        }
        assert_relative_eq!(matrices.k_interp_cross[[i_point, i_electrode]], cross_expected, max_relative = 1e-12);
        assert_relative_eq!(matrices.k_interp_pot[[i_point, i_electrode]], pot_expected, max_relative = 1e-12);
    }
}
