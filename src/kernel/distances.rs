use ndarray::{Array1, Array2};
use rayon::prelude::*;

/// Euclidean distances between two sets of 2D points
///
/// # Arguments
/// * `points_a` - shape = (n_a, 2)
/// * `points_b` - shape = (n_b, 2)
///
/// # Returns
/// * `Array2<f64>` - shape = (n_a, n_b)
pub fn distance_matrix(points_a: &Array2<f64>, points_b: &Array2<f64>) -> Array2<f64> {
    let n_a: usize = points_a.nrows();
    let n_b: usize = points_b.nrows();

    let rows: Vec<Array1<f64>> = (0..n_a)
        .into_par_iter() // Use Rayon to create a parallel iterator
        .map(|i_a: usize| {
            let x_a: f64 = points_a[[i_a, 0]];
            let y_a: f64 = points_a[[i_a, 1]];
            let row: Array1<f64> = (0..n_b)
                .map(|i_b: usize| ((x_a - points_b[[i_b, 0]]).powi(2) + (y_a - points_b[[i_b, 1]]).powi(2)).sqrt())
                .collect();
            row
        })
        .collect();

    // Collect the rows into a matrix
    let mut distances: Array2<f64> = Array2::zeros((n_a, n_b));
    for (i_a, row) in rows.into_iter().enumerate() {
        distances.row_mut(i_a).assign(&row);
    }

    return distances;
}

#[test]
fn test_distance_matrix() {
    use approx::assert_abs_diff_eq;

    let points_a: Array2<f64> = ndarray::array![[0.0, 0.0], [1.0, 1.0], [-1.0, 2.0]];
    let points_b: Array2<f64> = ndarray::array![[3.0, 4.0], [0.0, 0.0]];
    let distances: Array2<f64> = distance_matrix(&points_a, &points_b);

    assert_eq!(distances.dim(), (3, 2));
    assert_abs_diff_eq!(distances[[0, 0]], 5.0, epsilon = 1e-15);
    assert_abs_diff_eq!(distances[[0, 1]], 0.0, epsilon = 1e-15);
    assert_abs_diff_eq!(distances[[1, 1]], 2.0_f64.sqrt(), epsilon = 1e-15);
    assert_abs_diff_eq!(distances[[2, 0]], 2.0 * 5.0_f64.sqrt(), epsilon = 1e-15);
}
