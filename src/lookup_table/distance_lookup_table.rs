use crate::basis::BasisType;
use crate::config::{ForwardModelSettings, LookupTableTuning};
use crate::errors::{Error, configuration_error};
use crate::forward_model::potential_at_distance;
use log::info;
use ndarray::{Array1, Array2};
use ndarray_interp::interp1d::cubic_spline::{BoundaryCondition, CubicSpline};
use ndarray_interp::interp1d::Interp1D;
use rayon::prelude::*;
use std::time::{Duration, Instant};

/// Potential of a basis source tabulated against the distance from its centre
///
/// The table has `density` entries evenly spread over `[0, dist_max]`; entry `i` is the potential
/// at distance `i / density * dist_max`.
#[derive(Clone, Debug, PartialEq)]
pub struct DistanceLookupTable {
    pub values: Array1<f64>,
    pub dist_max: f64,
    pub r: f64,
    pub basis: BasisType,
    /// Table positions where the forward model was evaluated
    pub sparse_indices: Array1<f64>,
}

impl DistanceLookupTable {
    /// Tabulate the forward model for sources of radius `r`
    ///
    /// # Arguments
    /// * `r` - source radius
    /// * `dist_max` - largest distance the table has to cover
    /// * `basis` - shape of the sources
    /// * `h` - slice thickness
    /// * `sigma` - conductivity
    /// * `tuning` - where to sample the forward model
    /// * `settings` - integration tolerances
    ///
    /// # Algorithm
    /// The forward model is expensive, so it is only evaluated at the positions returned by
    /// `sparse_indices` (in parallel), then a not-a-knot cubic spline through those samples is
    /// evaluated at every integer table position.
    ///
    /// # Examples
    /// ```
    /// use kcsd_rs::lookup_table::DistanceLookupTable;
    /// use kcsd_rs::{BasisType, ForwardModelSettings, LookupTableTuning};
    ///
    /// let table: DistanceLookupTable =
    ///     DistanceLookupTable::build(0.5, 4.0, BasisType::Step, 1.0, 1.0, &LookupTableTuning::default(), &ForwardModelSettings::default()).unwrap();
    /// assert_eq!(table.values.len(), 100);
    /// assert_eq!(table.lookup(0.0), table.values[0]);
    /// ```
    pub fn build(
        r: f64,
        dist_max: f64,
        basis: BasisType,
        h: f64,
        sigma: f64,
        tuning: &LookupTableTuning,
        settings: &ForwardModelSettings,
    ) -> Result<Self, Error> {
        if !(r.is_finite() && r > 0.0) {
            return Err(configuration_error(format!("source radius must be positive, got {}", r)));
        }
        if !(dist_max.is_finite() && dist_max > 0.0) {
            return Err(configuration_error(format!("`dist_max` must be positive, got {}", dist_max)));
        }
        tuning.validate()?;
        settings.validate()?;

        let timing_start: Instant = Instant::now();

        let density: usize = tuning.density;
        let sparse_indices: Array1<f64> = Self::sparse_indices(r, dist_max, tuning);
        let sparse_values: Vec<f64> = sparse_indices
            .as_slice()
            .ok_or_else(|| Error::NumericalFailure {
                reason: "lookup table sample positions are not contiguous".to_string(),
            })?
            .par_iter() // Use Rayon to create a parallel iterator
            .map(|&index: &f64| {
                let distance: f64 = index / density as f64 * dist_max;
                potential_at_distance(distance, r, h, sigma, basis, settings)
            })
            .collect::<Result<Vec<f64>, Error>>()?;

        let table_positions: Array1<f64> = Array1::range(0.0, density as f64, 1.0);
        let values: Array1<f64> = Interp1D::builder(Array1::from(sparse_values))
            .x(sparse_indices.clone())
            .strategy(CubicSpline::new().boundary(BoundaryCondition::NotAKnot))
            .build()?
            .interp_array(&table_positions)?;

        let duration: Duration = timing_start.elapsed();
        info!(
            "DistanceLookupTable::build: basis={}, r={}, dist_max={}, {} forward model samples, time elapsed: {:?}",
            basis,
            r,
            dist_max,
            sparse_indices.len(),
            duration
        );

        return Ok(DistanceLookupTable {
            values,
            dist_max,
            r,
            basis,
            sparse_indices,
        });
    }

    /// Table positions where the forward model is sampled, strictly increasing, from 0 to `density`
    ///
    /// Sampling is coarse (`dense_step`) up to `border1`, fine (`denser_step`) between `border1`
    /// and `border2`, and sparse (`sparse_step`) after `border2`. The points 0, `border1`,
    /// `border2` and `density` are always kept; a regular point closer than half a `denser_step`
    /// to an already kept point is dropped.
    pub fn sparse_indices(r: f64, dist_max: f64, tuning: &LookupTableTuning) -> Array1<f64> {
        let density: f64 = tuning.density as f64;
        let border1: f64 = (tuning.border1_ratio * r / dist_max * density).clamp(0.0, density);
        let border2: f64 = (tuning.border2_ratio * r / dist_max * density).clamp(0.0, density);
        let merge_distance: f64 = 0.5 * tuning.denser_step;

        // Explicit points, in order of priority
        let mut kept: Vec<f64> = Vec::new();
        for point in [0.0, density, border1, border2] {
            if kept.iter().all(|&other: &f64| (other - point).abs() >= merge_distance) {
                kept.push(point);
            }
        }

        // Regular points
        let mut regular: Vec<f64> = Vec::new();
        let mut point: f64 = 0.0;
        while point < border1 {
            regular.push(point);
            point += tuning.dense_step;
        }
        let mut point: f64 = border1;
        while point < border2 {
            regular.push(point);
            point += tuning.denser_step;
        }
        let mut point: f64 = border2 + tuning.sparse_step;
        while point < density {
            regular.push(point);
            point += tuning.sparse_step;
        }
        for point in regular {
            if kept.iter().all(|&other: &f64| (other - point).abs() >= merge_distance) {
                kept.push(point);
            }
        }

        kept.sort_by(|a: &f64, b: &f64| a.total_cmp(b));
        return Array1::from(kept);
    }

    pub fn density(&self) -> usize {
        return self.values.len();
    }

    /// Table index nearest to `distance`, clamped to the table
    fn index(&self, distance: f64) -> usize {
        let density: usize = self.density();
        let position: f64 = (density as f64 * distance / self.dist_max).round();
        if !(position > 0.0) {
            // Negative and NaN distances
            return 0;
        }
        return (position as usize).min(density - 1);
    }

    /// Potential at `distance` from a source centre, nearest table entry
    pub fn lookup(&self, distance: f64) -> f64 {
        return self.values[self.index(distance)];
    }

    /// `lookup` applied to every element
    pub fn lookup_array(&self, distances: &Array2<f64>) -> Array2<f64> {
        return distances.mapv(|distance: f64| self.lookup(distance));
    }
}

#[test]
fn test_sparse_indices() {
    // r / dist_max = 0.1 => border1 = 9, border2 = 13
    let tuning: LookupTableTuning = LookupTableTuning::default();
    let sparse_indices: Array1<f64> = DistanceLookupTable::sparse_indices(1.0, 10.0, &tuning);

    let expected: Vec<f64> = vec![
        0.0, 3.0, 6.0, 9.0, 10.0, 11.0, 12.0, 13.0, 22.0, 31.0, 40.0, 49.0, 58.0, 67.0, 76.0, 85.0, 94.0, 100.0,
    ];
    assert_eq!(sparse_indices.len(), expected.len());
    for (i_point, &point) in expected.iter().enumerate() {
        assert!((sparse_indices[i_point] - point).abs() < 1e-9, "{:?}", sparse_indices);
    }
}

#[test]
fn test_sparse_indices_merge_close_points() {
    // r / dist_max = 0.0278 => border1 = 2.5, border2 = 3.61; the fine point 3.5 is merged into border2
    let tuning: LookupTableTuning = LookupTableTuning::default();
    let sparse_indices: Array1<f64> = DistanceLookupTable::sparse_indices(1.0, 36.0, &tuning);

    for i_point in 1..sparse_indices.len() {
        assert!(sparse_indices[i_point] - sparse_indices[i_point - 1] >= 0.5 * tuning.denser_step);
    }
    assert_eq!(sparse_indices[0], 0.0);
    assert_eq!(sparse_indices[sparse_indices.len() - 1], 100.0);
    assert!(sparse_indices.iter().any(|&point| (point - 2.5).abs() < 1e-9));
    assert!(sparse_indices.iter().any(|&point| (point - 2.5 / 0.9 * 1.3).abs() < 1e-9));
    assert!(!sparse_indices.iter().any(|&point| (point - 3.5).abs() < 1e-9));
}

#[test]
fn test_lookup_table_build_and_lookup() {
    use approx::assert_relative_eq;

    let _ = env_logger::builder().is_test(true).try_init();

    let r: f64 = 0.5;
    let dist_max: f64 = 5.0;
    let settings: ForwardModelSettings = ForwardModelSettings::default();
    let table: DistanceLookupTable =
        DistanceLookupTable::build(r, dist_max, BasisType::Gauss, 1.0, 1.0, &LookupTableTuning::default(), &settings).unwrap();

    assert_eq!(table.density(), 100);
    assert_eq!(table.lookup(0.0), table.values[0]);
    assert_eq!(table.lookup(dist_max), table.values[99]);
    assert_eq!(table.lookup(10.0 * dist_max), table.values[99]);
    assert_eq!(table.lookup(-1.0), table.values[0]);
    assert_eq!(table.lookup(f64::NAN), table.values[0]);

    // The spline goes through the forward model at the sampled positions
    let potential_at_zero: f64 = potential_at_distance(0.0, r, 1.0, 1.0, BasisType::Gauss, &settings).unwrap();
    assert_relative_eq!(table.values[0], potential_at_zero, max_relative = 1e-12);
    assert!((table.sparse_indices[7] - 13.0).abs() < 1e-9);
    let potential_at_border2: f64 = potential_at_distance(table.sparse_indices[7] / 100.0 * dist_max, r, 1.0, 1.0, BasisType::Gauss, &settings).unwrap();
    assert_relative_eq!(table.values[13], potential_at_border2, max_relative = 1e-9);

    // Nearest entry
    assert_eq!(table.lookup(0.26), table.values[5]);
    assert_eq!(table.lookup(0.24), table.values[5]);

    // Positive and decaying over the table
    assert!(table.values.iter().all(|&value| value > 0.0));
    assert!(table.values[0] > table.values[50]);
    assert!(table.values[50] > table.values[99]);

    let distances: Array2<f64> = ndarray::array![[0.0, 0.26], [dist_max, -3.0]];
    let potentials: Array2<f64> = table.lookup_array(&distances);
    assert_eq!(potentials[[0, 1]], table.values[5]);
    assert_eq!(potentials[[1, 0]], table.values[99]);
    assert_eq!(potentials[[1, 1]], table.values[0]);
}

#[test]
fn test_lookup_table_rejects_bad_radius() {
    let result: Result<DistanceLookupTable, Error> = DistanceLookupTable::build(
        0.0,
        5.0,
        BasisType::Step,
        1.0,
        1.0,
        &LookupTableTuning::default(),
        &ForwardModelSettings::default(),
    );
    assert!(matches!(result, Err(Error::ConfigurationError { .. })));
}
