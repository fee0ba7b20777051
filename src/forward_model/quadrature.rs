use crate::errors::Error;

// Gauss-Kronrod 7/15 point rule on [-1, 1], abscissae in decreasing order, the last one is the centre.
// Odd indices of `KRONROD_NODES` are the Gauss nodes.
const KRONROD_NODES: [f64; 8] = [
    0.991455371120812639206854697526329,
    0.949107912342758524526189684047851,
    0.864864423359769072789712788640926,
    0.741531185599394439863864773280788,
    0.586087235467691130294144845693013,
    0.405845151377397166906606412076961,
    0.207784955007898467600689403773245,
    0.000000000000000000000000000000000,
];
const KRONROD_WEIGHTS: [f64; 8] = [
    0.022935322010529224963732008058970,
    0.063092092629978553290700663189204,
    0.104790010322250183839876322541518,
    0.140653259715525918745189590510238,
    0.169004726639267902826583426598550,
    0.190350578064785409913256402421014,
    0.204432940075298892414161999234649,
    0.209482141084727828012999174891714,
];
const GAUSS_WEIGHTS: [f64; 4] = [
    0.129484966168869693270611432679082,
    0.279705391489276667901467771423780,
    0.381830050505118944950369775488975,
    0.417959183673469387755102040816327,
];

/// Result of an adaptive integration
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct QuadratureResult {
    pub value: f64,
    pub error_estimate: f64,
    pub n_subintervals: usize,
}

struct Subinterval {
    a: f64,
    b: f64,
    value: f64,
    error_estimate: f64,
}

/// Globally adaptive Gauss-Kronrod (G7/K15) integration of `f` over [`a`, `b`]
///
/// # Arguments
/// * `f` - integrand; it may itself fail, e.g. when it is an inner integral of a double integral
/// * `a`, `b` - integration limits
/// * `absolute_tolerance`, `relative_tolerance` - converged when the summed error estimate is below
///   `max(absolute_tolerance, relative_tolerance * |value|)`
/// * `max_subintervals` - budget of bisections
///
/// # Returns
/// * `QuadratureResult`, or `Error::NumericalFailure` if the budget is exhausted above tolerance,
///   the sub-intervals can no longer be split, or the integrand is not finite
///
/// # Algorithm
/// The error of each sub-interval is estimated by `|K15 - G7|`. While the total error is above
/// tolerance, the sub-interval with the largest error is bisected.
/// The integrand is never evaluated at `a` or `b`, so integrable end-point singularities are fine.
///
/// # Examples
/// ```
/// use kcsd_rs::forward_model::quadrature::{QuadratureResult, integrate_adaptive};
///
/// let result: QuadratureResult = integrate_adaptive(|x: f64| Ok(x.sin()), 0.0, std::f64::consts::PI, 0.0, 1e-10, 50).unwrap();
/// assert!((result.value - 2.0).abs() < 1e-10);
/// ```
pub fn integrate_adaptive<F>(f: F, a: f64, b: f64, absolute_tolerance: f64, relative_tolerance: f64, max_subintervals: usize) -> Result<QuadratureResult, Error>
where
    F: Fn(f64) -> Result<f64, Error>,
{
    if !(a.is_finite() && b.is_finite()) {
        return Err(Error::NumericalFailure {
            reason: format!("integration limits must be finite, got [{}, {}]", a, b),
        });
    }
    if a == b {
        return Ok(QuadratureResult {
            value: 0.0,
            error_estimate: 0.0,
            n_subintervals: 1,
        });
    }

    let (value, error_estimate): (f64, f64) = gauss_kronrod_15(&f, a, b)?;
    let mut subintervals: Vec<Subinterval> = vec![Subinterval { a, b, value, error_estimate }];

    loop {
        let total_value: f64 = subintervals.iter().map(|subinterval| subinterval.value).sum();
        let total_error: f64 = subintervals.iter().map(|subinterval| subinterval.error_estimate).sum();
        if !(total_value.is_finite() && total_error.is_finite()) {
            return Err(Error::NumericalFailure {
                reason: format!("integral over [{}, {}] is not finite", a, b),
            });
        }

        let tolerance: f64 = absolute_tolerance.max(relative_tolerance * total_value.abs());
        if total_error <= tolerance {
            return Ok(QuadratureResult {
                value: total_value,
                error_estimate: total_error,
                n_subintervals: subintervals.len(),
            });
        }

        if subintervals.len() >= max_subintervals {
            return Err(Error::NumericalFailure {
                reason: format!(
                    "integral over [{}, {}] did not converge in {} sub-intervals: value={}, error estimate={}, tolerance={}",
                    a, b, max_subintervals, total_value, total_error, tolerance
                ),
            });
        }

        // Bisect the worst sub-interval
        let mut i_worst: usize = 0;
        for (i_subinterval, subinterval) in subintervals.iter().enumerate() {
            if subinterval.error_estimate > subintervals[i_worst].error_estimate {
                i_worst = i_subinterval;
            }
        }
        let worst: Subinterval = subintervals.swap_remove(i_worst);
        let middle: f64 = 0.5 * (worst.a + worst.b);
        if middle <= worst.a.min(worst.b) || middle >= worst.a.max(worst.b) {
            return Err(Error::NumericalFailure {
                reason: format!("integral over [{}, {}] cannot be refined further near {}", a, b, middle),
            });
        }

        let (value_left, error_left): (f64, f64) = gauss_kronrod_15(&f, worst.a, middle)?;
        let (value_right, error_right): (f64, f64) = gauss_kronrod_15(&f, middle, worst.b)?;
        subintervals.push(Subinterval {
            a: worst.a,
            b: middle,
            value: value_left,
            error_estimate: error_left,
        });
        subintervals.push(Subinterval {
            a: middle,
            b: worst.b,
            value: value_right,
            error_estimate: error_right,
        });
    }
}

/// One application of the 15 point Kronrod rule, with the embedded 7 point Gauss rule for the error
fn gauss_kronrod_15<F>(f: &F, a: f64, b: f64) -> Result<(f64, f64), Error>
where
    F: Fn(f64) -> Result<f64, Error>,
{
    let centre: f64 = 0.5 * (a + b);
    let half_length: f64 = 0.5 * (b - a);

    let f_centre: f64 = f(centre)?;
    let mut kronrod_sum: f64 = KRONROD_WEIGHTS[7] * f_centre;
    let mut gauss_sum: f64 = GAUSS_WEIGHTS[3] * f_centre;
    for i_node in 0..7 {
        let d_x: f64 = half_length * KRONROD_NODES[i_node];
        let f_pair: f64 = f(centre - d_x)? + f(centre + d_x)?;
        kronrod_sum += KRONROD_WEIGHTS[i_node] * f_pair;
        if i_node % 2 == 1 {
            gauss_sum += GAUSS_WEIGHTS[i_node / 2] * f_pair;
        }
    }

    let value: f64 = kronrod_sum * half_length;
    let error_estimate: f64 = ((kronrod_sum - gauss_sum) * half_length).abs();
    return Ok((value, error_estimate));
}

#[test]
fn test_integrate_polynomial_exactly() {
    use approx::assert_abs_diff_eq;

    // K15 integrates polynomials up to degree 22 exactly, a single interval is enough
    let result: QuadratureResult = integrate_adaptive(|x: f64| Ok(3.0 * x.powi(2) - x + 1.0), -1.0, 2.0, 0.0, 1e-12, 1).unwrap();
    assert_abs_diff_eq!(result.value, 8.0 + 1.0 - 1.5 + 3.0, epsilon = 1e-12);
    assert_eq!(result.n_subintervals, 1);
}

#[test]
fn test_integrate_log_singularity() {
    use approx::assert_abs_diff_eq;

    // Integrable singularity at the end point and in the interior
    let result: QuadratureResult = integrate_adaptive(|x: f64| Ok(x.ln()), 0.0, 1.0, 0.0, 1e-8, 200).unwrap();
    assert_abs_diff_eq!(result.value, -1.0, epsilon = 1e-7);

    let result: QuadratureResult = integrate_adaptive(|x: f64| Ok(x.abs().max(1e-300).ln()), -1.0, 1.0, 0.0, 1e-6, 200).unwrap();
    assert_abs_diff_eq!(result.value, -2.0, epsilon = 1e-5);
}

#[test]
fn test_integrate_discontinuity() {
    use approx::assert_abs_diff_eq;

    let step = |x: f64| -> Result<f64, Error> { if x < 0.3 { Ok(1.0) } else { Ok(0.0) } };
    let result: QuadratureResult = integrate_adaptive(step, 0.0, 1.0, 0.0, 1e-4, 200).unwrap();
    assert_abs_diff_eq!(result.value, 0.3, epsilon = 1e-4);
}

#[test]
fn test_integrate_failures() {
    // Budget too small for the requested accuracy
    let step = |x: f64| -> Result<f64, Error> { if x < 0.3 { Ok(1.0) } else { Ok(0.0) } };
    let result: Result<QuadratureResult, Error> = integrate_adaptive(step, 0.0, 1.0, 0.0, 1e-8, 3);
    assert!(matches!(result, Err(Error::NumericalFailure { .. })));

    // Non-finite integrand
    let result: Result<QuadratureResult, Error> = integrate_adaptive(|x: f64| Ok(1.0 / (x - 0.5)), 0.0, 1.0, 0.0, 1e-2, 50);
    assert!(matches!(result, Err(Error::NumericalFailure { .. })));

    // Failures of the integrand are passed through
    let failing = |_x: f64| -> Result<f64, Error> {
        Err(Error::NumericalFailure {
            reason: "inner".to_string(),
        })
    };
    let result: Result<QuadratureResult, Error> = integrate_adaptive(failing, 0.0, 1.0, 0.0, 1e-2, 50);
    assert_eq!(
        result,
        Err(Error::NumericalFailure {
            reason: "inner".to_string()
        })
    );
}
