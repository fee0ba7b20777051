use super::quadrature::{QuadratureResult, integrate_adaptive};
use crate::basis::BasisType;
use crate::config::ForwardModelSettings;
use crate::errors::Error;
use std::f64::consts::PI;

/// Potential generated by one basis source, at a point in the slice plane
///
/// # Arguments
/// * `x` - distance between the source centre and the point; the point is placed at `(x, 0)`
/// * `r` - source radius
/// * `h` - thickness of the slice
/// * `sigma` - conductivity of the medium
/// * `basis` - shape of the source
/// * `settings` - integration tolerances
///
/// # Returns
/// * `potential = 1 / (2 pi sigma) * integral_{[-r, r]^2} asinh(h / d) * basis(x', y') dx' dy'`, where
///   `d = max(|(x, 0) - (x', y')|, distance_floor)`
///
/// # Algorithm
/// Nested 1D adaptive Gauss-Kronrod integrations: the outer one along x', the inner one along y'.
/// The inner integrals are converged ten times tighter than the outer one, otherwise their
/// error looks like roughness in the outer integrand and stalls its refinement.
///
/// # Examples
/// ```
/// use kcsd_rs::forward_model::potential_at_distance;
/// use kcsd_rs::{BasisType, ForwardModelSettings};
///
/// let settings: ForwardModelSettings = ForwardModelSettings::default();
/// let near: f64 = potential_at_distance(0.0, 0.5, 1.0, 1.0, BasisType::Step, &settings).unwrap();
/// let far: f64 = potential_at_distance(3.0, 0.5, 1.0, 1.0, BasisType::Step, &settings).unwrap();
/// assert!(near > far);
/// assert!(far > 0.0);
/// ```
pub fn potential_at_distance(x: f64, r: f64, h: f64, sigma: f64, basis: BasisType, settings: &ForwardModelSettings) -> Result<f64, Error> {
    let distance_floor: f64 = settings.distance_floor;
    let outer_tolerance: f64 = settings.relative_tolerance;
    let inner_tolerance: f64 = 0.1 * settings.relative_tolerance;
    let max_subintervals: usize = settings.max_subintervals;

    // Integral along y' for a fixed x'
    let integral_along_y = |x_prime: f64| -> Result<f64, Error> {
        let integrand = |y_prime: f64| -> Result<f64, Error> {
            let distance: f64 = ((x - x_prime).powi(2) + y_prime.powi(2)).sqrt().max(distance_floor);
            return Ok((h / distance).asinh() * basis.value(x_prime, y_prime, 0.0, 0.0, r));
        };
        let inner: QuadratureResult = integrate_adaptive(integrand, -r, r, 0.0, inner_tolerance, max_subintervals)?;
        return Ok(inner.value);
    };

    let outer: QuadratureResult = integrate_adaptive(integral_along_y, -r, r, 0.0, outer_tolerance, max_subintervals)?;

    let potential: f64 = outer.value / (2.0 * PI * sigma);
    if !potential.is_finite() {
        return Err(Error::NumericalFailure {
            reason: format!("potential at distance {} is not finite (r={}, h={}, sigma={})", x, r, h, sigma),
        });
    }

    return Ok(potential);
}

#[test]
fn test_potential_far_field_step_source() {
    use approx::assert_relative_eq;

    // Far from a small disc the source looks like a point charge of strength pi * r^2
    let r: f64 = 0.1;
    let h: f64 = 1.0;
    let x: f64 = 5.0;
    let settings: ForwardModelSettings = ForwardModelSettings::default();

    let potential: f64 = potential_at_distance(x, r, h, 1.0, BasisType::Step, &settings).unwrap();
    let potential_expected: f64 = (h / x).asinh() * PI * r.powi(2) / (2.0 * PI);
    assert_relative_eq!(potential, potential_expected, max_relative = 2e-2);
}

#[test]
fn test_potential_decreases_with_distance() {
    let settings: ForwardModelSettings = ForwardModelSettings::default();
    let r: f64 = 0.5;

    for basis in BasisType::ALL {
        let distances: [f64; 5] = [0.0, 0.5 * r, 2.0 * r, 4.0 * r, 10.0 * r];
        let potentials: Vec<f64> = distances
            .iter()
            .map(|&distance| potential_at_distance(distance, r, 1.0, 1.0, basis, &settings).unwrap())
            .collect();

        for i_distance in 1..potentials.len() {
            assert!(
                potentials[i_distance] < potentials[i_distance - 1],
                "{} potential is not decreasing: {:?}",
                basis,
                potentials
            );
        }
        assert!(potentials[potentials.len() - 1] > 0.0);
    }
}

#[test]
fn test_potential_scales_with_conductivity() {
    use approx::assert_relative_eq;

    let settings: ForwardModelSettings = ForwardModelSettings::default();
    let potential_sigma_1: f64 = potential_at_distance(0.3, 0.5, 1.0, 1.0, BasisType::Gauss, &settings).unwrap();
    let potential_sigma_4: f64 = potential_at_distance(0.3, 0.5, 1.0, 4.0, BasisType::Gauss, &settings).unwrap();
    assert_relative_eq!(potential_sigma_1, 4.0 * potential_sigma_4, max_relative = 1e-12);
}

#[test]
fn test_potential_integration_budget_exhausted() {
    let settings: ForwardModelSettings = ForwardModelSettings {
        relative_tolerance: 1e-9,
        distance_floor: 1e-5,
        max_subintervals: 2,
    };
    let result: Result<f64, Error> = potential_at_distance(0.0, 0.5, 1.0, 1.0, BasisType::Step, &settings);
    assert!(matches!(result, Err(Error::NumericalFailure { .. })));
}
