use std::sync::{Arc, RwLock};

use crate::SamplingMethod;
use linfa::Float;
use ndarray::{Array, Array2, ArrayBase, Data, Ix2};
use ndarray_rand::{rand::Rng, rand::SeedableRng, rand_distr::Uniform, RandomExt};
use rand_xoshiro::Xoshiro256Plus;

#[cfg(feature = "serializable")]
use serde::{Deserialize, Serialize};

type SharedRng<R> = Arc<RwLock<R>>;

/// Uniform sampling of the box: every component is drawn independently.
///
/// The generator is shared between clones, so two clones never replay the same
/// sequence of points.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serializable", derive(Serialize, Deserialize))]
pub struct Random<F: Float, R: Rng> {
    xlimits: Array2<F>,
    rng: SharedRng<R>,
}

impl<F: Float> Random<F, Xoshiro256Plus> {
    /// Uniform sampler over `xlimits` seeded from system entropy.
    ///
    /// ```
    /// use bbo_doe::{Random, SamplingMethod};
    /// use ndarray::arr2;
    ///
    /// let x = Random::new(&arr2(&[[0.0, 1.0], [5.0, 10.0]])).sample(4);
    /// assert_eq!(x.dim(), (4, 2));
    /// ```
    pub fn new(xlimits: &ArrayBase<impl Data<Elem = F>, Ix2>) -> Self {
        Self::new_with_rng(xlimits, Xoshiro256Plus::from_entropy())
    }
}

impl<F: Float, R: Rng> Random<F, R> {
    /// Uniform sampler over `xlimits` driven by `rng`.
    ///
    /// **Panics** if `xlimits` does not have exactly 2 columns.
    pub fn new_with_rng(xlimits: &ArrayBase<impl Data<Elem = F>, Ix2>, rng: R) -> Self {
        assert_eq!(
            xlimits.ncols(),
            2,
            "xlimits must be a (nx, 2) array of [lower, upper] bounds"
        );
        Random {
            xlimits: xlimits.to_owned(),
            rng: Arc::new(RwLock::new(rng)),
        }
    }

    /// Replaces the random generator.
    pub fn with_rng<R2: Rng>(self, rng: R2) -> Random<F, R2> {
        Random {
            xlimits: self.xlimits,
            rng: Arc::new(RwLock::new(rng)),
        }
    }
}

impl<F: Float, R: Rng> SamplingMethod<F> for Random<F, R> {
    fn sampling_space(&self) -> &Array2<F> {
        &self.xlimits
    }

    fn normalized_sample(&self, ns: usize) -> Array2<F> {
        let mut rng = self.rng.write().unwrap();
        Array::random_using((ns, self.xlimits.nrows()), Uniform::new(0., 1.), &mut *rng)
            .mapv(F::cast)
    }
}
