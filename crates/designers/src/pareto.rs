//! Non-dominated sorting and crowding distance (Deb et al., 2002).
//!
//! Objective values are given row-wise, one row per solution, every
//! objective being maximized.
use ndarray::{Array2, ArrayView1};
use std::cmp::Ordering;

/// Returns `true` if `a` Pareto-dominates `b`: at least as good on every
/// objective and strictly better on one.
pub(crate) fn dominates(a: &ArrayView1<f64>, b: &ArrayView1<f64>) -> bool {
    let mut strictly_better = false;
    for (av, bv) in a.iter().zip(b.iter()) {
        if av < bv {
            return false;
        }
        if av > bv {
            strictly_better = true;
        }
    }
    strictly_better
}

/// Fast non-dominated sorting, `fronts[0]` holds the Pareto front.
///
/// Complexity: O(M * N^2) where M = objectives, N = solutions.
pub(crate) fn fast_non_dominated_sort(values: &Array2<f64>) -> Vec<Vec<usize>> {
    let n = values.nrows();
    // solutions dominated by i
    let mut dominated_by: Vec<Vec<usize>> = vec![Vec::new(); n];
    // number of solutions dominating i
    let mut domination_count = vec![0usize; n];

    for i in 0..n {
        for j in (i + 1)..n {
            let (vi, vj) = (values.row(i), values.row(j));
            if dominates(&vi, &vj) {
                dominated_by[i].push(j);
                domination_count[j] += 1;
            } else if dominates(&vj, &vi) {
                dominated_by[j].push(i);
                domination_count[i] += 1;
            }
        }
    }

    let mut fronts = Vec::new();
    let mut current: Vec<usize> = (0..n).filter(|&i| domination_count[i] == 0).collect();
    while !current.is_empty() {
        let mut next = Vec::new();
        for &p in current.iter() {
            for &q in dominated_by[p].iter() {
                domination_count[q] -= 1;
                if domination_count[q] == 0 {
                    next.push(q);
                }
            }
        }
        fronts.push(current);
        current = next;
    }
    fronts
}

/// Crowding distance of the solutions of one front, in `front` order.
/// Boundary solutions get `f64::INFINITY`.
pub(crate) fn crowding_distance(front: &[usize], values: &Array2<f64>) -> Vec<f64> {
    let n = front.len();
    if n <= 2 {
        return vec![f64::INFINITY; n];
    }
    let mut distances = vec![0.; n];
    for obj in 0..values.ncols() {
        let val = |pos: usize| values[[front[pos], obj]];
        let mut sorted: Vec<usize> = (0..n).collect();
        sorted.sort_by(|&a, &b| val(a).partial_cmp(&val(b)).unwrap_or(Ordering::Equal));

        distances[sorted[0]] = f64::INFINITY;
        distances[sorted[n - 1]] = f64::INFINITY;
        let range = val(sorted[n - 1]) - val(sorted[0]);
        if range > 0. {
            for i in 1..(n - 1) {
                distances[sorted[i]] += (val(sorted[i + 1]) - val(sorted[i - 1])) / range;
            }
        }
    }
    distances
}

/// Non-domination rank and crowding distance of every solution
pub(crate) fn rank_and_crowding(values: &Array2<f64>) -> (Vec<usize>, Vec<f64>) {
    let n = values.nrows();
    let mut rank = vec![0; n];
    let mut crowding = vec![0.; n];
    for (r, front) in fast_non_dominated_sort(values).iter().enumerate() {
        for (&idx, cd) in front.iter().zip(crowding_distance(front, values)) {
            rank[idx] = r;
            crowding[idx] = cd;
        }
    }
    (rank, crowding)
}
