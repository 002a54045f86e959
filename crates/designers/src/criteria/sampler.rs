use bbo_gp::{GaussianProcess, Result};
use linfa_linalg::cholesky::*;
use ndarray::{s, Array, Array1, Array2, ArrayView2};
use ndarray_rand::rand::SeedableRng;
use ndarray_rand::rand_distr::StandardNormal;
use ndarray_rand::RandomExt;
use rand_xoshiro::Xoshiro256Plus;

const JITTERS: [f64; 4] = [1e-9, 1e-8, 1e-6, 1e-4];

/// Monte Carlo sampler of the joint posterior of a batch of points.
///
/// Standard normal base samples are drawn once from a seed, so a given batch
/// always gets the same posterior samples (common random numbers) and the
/// MC estimate is a deterministic smooth function of the batch.
#[derive(Clone, Debug)]
pub(crate) struct McSampler {
    seed: u64,
    /// `(mc_samples, q)` standard normal draws
    base: Array2<f64>,
}

impl McSampler {
    pub fn new(mc_samples: usize, q: usize, seed: u64) -> Self {
        McSampler {
            seed,
            base: draw(mc_samples, q, seed),
        }
    }

    pub fn mc_samples(&self) -> usize {
        self.base.nrows()
    }

    /// Posterior mean `(q,)` and samples `(mc_samples, q)` at the batch `x`
    pub fn posterior_samples(
        &self,
        model: &GaussianProcess,
        x: &ArrayView2<f64>,
    ) -> Result<(Array1<f64>, Array2<f64>)> {
        let q = x.nrows();
        let (mean, cov) = model.predict_cov(x)?;
        let chol = lower_factor(&cov);
        let z = if q <= self.base.ncols() {
            self.base.slice(s![.., ..q]).to_owned()
        } else {
            draw(self.mc_samples(), q, self.seed)
        };
        let samples = z.dot(&chol.t()) + &mean;
        Ok((mean, samples))
    }
}

fn draw(mc_samples: usize, q: usize, seed: u64) -> Array2<f64> {
    let mut rng = Xoshiro256Plus::seed_from_u64(seed);
    Array::random_using((mc_samples, q), StandardNormal, &mut rng)
}

/// Lower cholesky factor of a covariance matrix, jittered when not numerically
/// positive definite, diagonal std otherwise.
fn lower_factor(cov: &Array2<f64>) -> Array2<f64> {
    for jitter in JITTERS {
        let mut k = cov.to_owned();
        k.diag_mut().mapv_inplace(|v| v + jitter);
        if let Ok(l) = k.cholesky() {
            return l;
        }
    }
    Array2::from_diag(&cov.diag().mapv(|v| v.max(0.).sqrt()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn test_base_samples_are_reused() {
        let sampler = McSampler::new(64, 3, 11);
        assert_eq!(sampler.mc_samples(), 64);
        let again = McSampler::new(64, 3, 11);
        assert_eq!(sampler.base, again.base);
    }

    #[test]
    fn test_lower_factor_of_singular_cov() {
        let cov = array![[1., 1.], [1., 1.]];
        let l = lower_factor(&cov);
        assert_abs_diff_eq!(l.dot(&l.t()), cov, epsilon = 1e-3);
    }
}
