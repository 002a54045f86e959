use crate::utils::min_pairwise_distance;
use crate::SamplingMethod;
use linfa::Float;
use ndarray::{s, Array, Array1, Array2, ArrayBase, Data, Ix2};
use ndarray_rand::{
    rand::seq::SliceRandom, rand::Rng, rand::SeedableRng, rand_distr::Uniform, RandomExt,
};
use rand_xoshiro::Xoshiro256Plus;
use std::sync::{Arc, RwLock};

#[cfg(feature = "serializable")]
use serde::{Deserialize, Serialize};

/// Kinds of Latin Hypercube design
#[derive(Clone, Debug, Default, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serializable", derive(Serialize, Deserialize))]
pub enum LhsKind {
    /// Each point is drawn uniformly inside its stratum
    Classic,
    /// Each point sits at the middle of its stratum
    Centered,
    /// Best of several classic designs with respect to the minimal
    /// distance between points
    #[default]
    Maximin,
}

/// Latin Hypercube sampling: every axis is cut into `ns` strata of equal width
/// and each stratum holds exactly one of the `ns` points.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serializable", derive(Serialize, Deserialize))]
pub struct Lhs<F: Float, R: Rng> {
    xlimits: Array2<F>,
    kind: LhsKind,
    /// Number of candidate designs drawn by [LhsKind::Maximin]
    maximin_iters: usize,
    rng: Arc<RwLock<R>>,
}

impl<F: Float> Lhs<F, Xoshiro256Plus> {
    /// LHS over `xlimits` seeded from system entropy.
    ///
    /// ```
    /// use bbo_doe::{Lhs, SamplingMethod};
    /// use ndarray::arr2;
    ///
    /// let x = Lhs::new(&arr2(&[[0.0, 1.0], [5.0, 10.0]])).sample(10);
    /// assert_eq!(x.nrows(), 10);
    /// ```
    pub fn new(xlimits: &ArrayBase<impl Data<Elem = F>, Ix2>) -> Self {
        Self::new_with_rng(xlimits, Xoshiro256Plus::from_entropy())
    }
}

impl<F: Float, R: Rng> SamplingMethod<F> for Lhs<F, R> {
    fn sampling_space(&self) -> &Array2<F> {
        &self.xlimits
    }

    fn normalized_sample(&self, ns: usize) -> Array2<F> {
        let doe = match self.kind {
            LhsKind::Classic => self.strata(ns, false),
            LhsKind::Centered => self.strata(ns, true),
            LhsKind::Maximin => self.maximin(ns),
        };
        doe.mapv(F::cast)
    }
}

impl<F: Float, R: Rng> Lhs<F, R> {
    /// LHS over `xlimits` driven by `rng`.
    ///
    /// **Panics** if `xlimits` does not have exactly 2 columns.
    pub fn new_with_rng(xlimits: &ArrayBase<impl Data<Elem = F>, Ix2>, rng: R) -> Self {
        assert_eq!(
            xlimits.ncols(),
            2,
            "xlimits must be a (nx, 2) array of [lower, upper] bounds"
        );
        Lhs {
            xlimits: xlimits.to_owned(),
            kind: LhsKind::default(),
            maximin_iters: 5,
            rng: Arc::new(RwLock::new(rng)),
        }
    }

    /// Sets the kind of LHS
    pub fn kind(mut self, kind: LhsKind) -> Self {
        self.kind = kind;
        self
    }

    /// Sets the number of candidate designs compared by [LhsKind::Maximin]
    pub fn maximin_iters(mut self, iters: usize) -> Self {
        self.maximin_iters = iters.max(1);
        self
    }

    /// Replaces the random generator
    pub fn with_rng<R2: Rng>(self, rng: R2) -> Lhs<F, R2> {
        Lhs {
            xlimits: self.xlimits,
            kind: self.kind,
            maximin_iters: self.maximin_iters,
            rng: Arc::new(RwLock::new(rng)),
        }
    }

    /// One point per stratum on every axis, strata shuffled independently per axis.
    fn strata(&self, ns: usize, centered: bool) -> Array2<f64> {
        let nx = self.xlimits.nrows();
        let cuts = Array::linspace(0., 1., ns + 1);
        let lower = cuts.slice(s![..ns]).to_owned();
        let width = &cuts.slice(s![1..]) - &lower;

        let mut rng = self.rng.write().unwrap();
        let mut doe = Array2::zeros((ns, nx));
        for mut col in doe.columns_mut() {
            let mut points: Array1<f64> = if centered {
                &lower + &(&width * 0.5)
            } else {
                let u = Array1::random_using(ns, Uniform::new(0., 1.), &mut *rng);
                &lower + &(&width * &u)
            };
            if let Some(points) = points.as_slice_mut() {
                points.shuffle(&mut *rng);
            }
            col.assign(&points);
        }
        doe
    }

    fn maximin(&self, ns: usize) -> Array2<f64> {
        let mut best = self.strata(ns, false);
        let mut best_dist = min_pairwise_distance(&best);
        for _ in 1..self.maximin_iters {
            let candidate = self.strata(ns, false);
            let dist = min_pairwise_distance(&candidate);
            if dist > best_dist {
                best = candidate;
                best_dist = dist;
            }
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::arr2;

    fn assert_latin(x: &Array2<f64>) {
        let ns = x.nrows();
        for col in x.columns() {
            let mut strata: Vec<usize> = col
                .iter()
                .map(|v| ((v * ns as f64).floor() as usize).min(ns - 1))
                .collect();
            strata.sort_unstable();
            assert_eq!(strata, (0..ns).collect::<Vec<_>>());
        }
    }

    #[test]
    fn test_classic_lhs_is_latin() {
        let xlimits = arr2(&[[0., 1.], [0., 1.], [0., 1.]]);
        let x = Lhs::new(&xlimits)
            .kind(LhsKind::Classic)
            .with_rng(Xoshiro256Plus::seed_from_u64(42))
            .sample(7);
        assert_latin(&x);
    }

    #[test]
    fn test_centered_lhs() {
        let xlimits = arr2(&[[5., 10.], [0., 1.]]);
        let x = Lhs::new(&xlimits)
            .kind(LhsKind::Centered)
            .with_rng(Xoshiro256Plus::seed_from_u64(0))
            .sample(5);
        let mut first: Vec<f64> = x.column(0).to_vec();
        first.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert_abs_diff_eq!(
            Array1::from(first),
            Array1::from(vec![5.5, 6.5, 7.5, 8.5, 9.5]),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_maximin_not_worse_than_classic() {
        let xlimits = arr2(&[[0., 1.], [0., 1.]]);
        let maximin = Lhs::new(&xlimits)
            .maximin_iters(20)
            .with_rng(Xoshiro256Plus::seed_from_u64(3))
            .normalized_sample(10);
        assert_latin(&maximin);
        assert!(min_pairwise_distance(&maximin) > 0.);
    }

    #[test]
    fn test_lhs_seeded_is_reproducible() {
        let xlimits = arr2(&[[-1., 1.]]);
        let a = Lhs::new(&xlimits)
            .with_rng(Xoshiro256Plus::seed_from_u64(11))
            .sample(6);
        let b = Lhs::new(&xlimits)
            .with_rng(Xoshiro256Plus::seed_from_u64(11))
            .sample(6);
        assert_eq!(a, b);
    }
}
