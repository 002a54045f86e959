//! Assembly of a batch of exactly `q` points from a population search result.
use crate::errors::{BboError, Result};
use log::debug;
use ndarray::{concatenate, Array2, ArrayView1, Axis};
use ndarray_rand::rand::seq::index::sample;
use ndarray_rand::rand::Rng;

/// Two points closer than this (max norm) are considered equal
pub const SET_DIFFERENCE_TOL: f64 = 1e-10;

fn same_point(a: &ArrayView1<f64>, b: &ArrayView1<f64>, tol: f64) -> bool {
    a.iter().zip(b.iter()).all(|(u, v)| (u - v).abs() < tol)
}

/// Rows of `pop_x` matching no row of `pareto_x`, in `pop_x` order
pub fn set_difference(pop_x: &Array2<f64>, pareto_x: &Array2<f64>, tol: f64) -> Array2<f64> {
    let kept: Vec<usize> = pop_x
        .rows()
        .into_iter()
        .enumerate()
        .filter(|(_, x)| !pareto_x.rows().into_iter().any(|p| same_point(x, &p, tol)))
        .map(|(i, _)| i)
        .collect();
    pop_x.select(Axis(0), &kept)
}

/// Batch of exactly `q` points.
///
/// * `q` points drawn without replacement from `pareto_x` when it holds at least `q` points,
/// * otherwise all of `pareto_x`, then up to `q - |pareto_x|` points drawn without
///   replacement from `diff_x`, then the remaining quota from `random_fill`.
pub fn assemble_batch<R: Rng, F>(
    pareto_x: &Array2<f64>,
    diff_x: &Array2<f64>,
    q: usize,
    rng: &mut R,
    random_fill: F,
) -> Result<Array2<f64>>
where
    F: FnOnce(usize) -> Result<Array2<f64>>,
{
    let p = pareto_x.nrows();
    if p >= q {
        let idx = sample(rng, p, q).into_vec();
        return Ok(pareto_x.select(Axis(0), &idx));
    }

    let mut parts = vec![pareto_x.to_owned()];
    let quota = (q - p).min(diff_x.nrows());
    if quota > 0 {
        let idx = sample(rng, diff_x.nrows(), quota).into_vec();
        parts.push(diff_x.select(Axis(0), &idx));
    }
    let remaining = q - p - quota;
    if remaining > 0 {
        let random_x = random_fill(remaining)?;
        if random_x.nrows() != remaining {
            return Err(BboError::InvalidValue(format!(
                "random fill returned {} points, {remaining} expected",
                random_x.nrows()
            )));
        }
        parts.push(random_x);
    }
    debug!("Batch assembly: {p} pareto, {quota} diversity, {remaining} random points");

    let views: Vec<_> = parts.iter().map(|a| a.view()).collect();
    concatenate(Axis(0), &views).map_err(|e| BboError::InvalidValue(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use ndarray_rand::rand::SeedableRng;
    use rand_xoshiro::Xoshiro256Plus;

    fn contains(set: &Array2<f64>, x: &ArrayView1<f64>) -> bool {
        set.rows().into_iter().any(|r| same_point(&r, x, 1e-12))
    }

    fn no_random(_: usize) -> Result<Array2<f64>> {
        panic!("random fill should not be called")
    }

    #[test]
    fn test_set_difference() {
        let pop = array![[0., 0.], [1., 1.], [2., 2.], [1., 1. + 1e-12]];
        let pareto = array![[1., 1.]];
        let diff = set_difference(&pop, &pareto, SET_DIFFERENCE_TOL);
        assert_eq!(diff, array![[0., 0.], [2., 2.]]);
    }

    #[test]
    fn test_batch_from_large_pareto_set() {
        let mut rng = Xoshiro256Plus::seed_from_u64(0);
        let pareto = array![[0.], [1.], [2.], [3.], [4.]];
        let diff = array![[10.]];
        let batch = assemble_batch(&pareto, &diff, 3, &mut rng, no_random).unwrap();
        assert_eq!(batch.nrows(), 3);
        assert!(batch.rows().into_iter().all(|x| contains(&pareto, &x)));
        // sampled without replacement
        let diff_self = set_difference(&batch, &batch.slice(ndarray::s![..1, ..]).to_owned(), 1e-12);
        assert_eq!(diff_self.nrows(), 2);
    }

    #[test]
    fn test_batch_with_diversity_fill() {
        let mut rng = Xoshiro256Plus::seed_from_u64(1);
        let pareto = array![[0., 0.]];
        let diff = array![[1., 1.], [2., 2.], [3., 3.]];
        let batch = assemble_batch(&pareto, &diff, 3, &mut rng, no_random).unwrap();
        assert_eq!(batch.row(0), pareto.row(0));
        assert!(contains(&diff, &batch.row(1)));
        assert!(contains(&diff, &batch.row(2)));
        assert_ne!(batch.row(1), batch.row(2));
    }

    #[test]
    fn test_batch_with_random_fill() {
        let mut rng = Xoshiro256Plus::seed_from_u64(2);
        let pareto = array![[0., 0.], [5., 5.]];
        let diff = array![[1., 1.]];
        let batch = assemble_batch(&pareto, &diff, 6, &mut rng, |n| {
            Ok(Array2::from_elem((n, 2), -1.))
        })
        .unwrap();
        assert_eq!(batch.nrows(), 6);
        assert_eq!(batch.slice(ndarray::s![..2, ..]), pareto);
        assert_eq!(batch.row(2), diff.row(0));
        assert!(batch
            .slice(ndarray::s![3.., ..])
            .iter()
            .all(|&v| v == -1.));
    }

    #[test]
    fn test_empty_pareto_and_diff() {
        let mut rng = Xoshiro256Plus::seed_from_u64(3);
        let empty = Array2::<f64>::zeros((0, 2));
        let batch = assemble_batch(&empty, &empty, 2, &mut rng, |n| {
            Ok(Array2::from_elem((n, 2), 0.5))
        })
        .unwrap();
        assert_eq!(batch, Array2::from_elem((2, 2), 0.5));
        let bad = assemble_batch(&empty, &empty, 2, &mut rng, |_| Ok(Array2::zeros((1, 2))));
        assert!(bad.is_err());
    }
}
