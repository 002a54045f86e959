use linfa::Float;
use ndarray::{ArrayBase, Data, Ix2};
use ndarray_stats::DeviationExt;
use rayon::prelude::*;

/// Smallest euclidean distance between two distinct rows of `x`.
///
/// Returns `F::infinity()` when `x` has less than two rows.
pub fn min_pairwise_distance<F: Float>(x: &ArrayBase<impl Data<Elem = F> + Sync, Ix2>) -> F {
    let n = x.nrows();
    (0..n)
        .into_par_iter()
        .map(|i| {
            ((i + 1)..n)
                .map(|j| F::cast(x.row(i).l2_dist(&x.row(j)).unwrap()))
                .fold(F::infinity(), F::min)
        })
        .reduce(F::infinity, F::min)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn test_min_pairwise_distance() {
        let x = array![[1f64, 0., 0.], [0., 1., 0.], [0., 2., 0.], [3., 4., 5.]];
        assert_abs_diff_eq!(min_pairwise_distance(&x), 1., epsilon = 1e-12);
    }

    #[test]
    fn test_min_pairwise_distance_single_row() {
        let x = array![[1f64, 2.]];
        assert!(min_pairwise_distance(&x).is_infinite());
    }
}
