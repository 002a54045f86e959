use crate::errors::{GpError, Result};
use crate::kernels::{CovarianceKernel, Kernel};
use crate::mean_models::{MeanFunction, MeanModel};
use crate::optimization::{
    optimize_params_adam, optimize_params_slsqp, AdamParams, SlsqpParams,
};
use crate::parameters::{GpParams, GpValidParams, MllOptimizer};
use crate::utils::InputScaler;

use linfa::prelude::{DatasetBase, Fit};
use linfa_linalg::{cholesky::*, triangular::*};
use log::{debug, warn};
use ndarray::{Array1, Array2, ArrayBase, Axis, Data, Ix1, Ix2};
use ndarray_rand::rand::SeedableRng;
use rand_xoshiro::Xoshiro256Plus;
use rayon::prelude::*;
use std::fmt;
use std::time::Instant;

/// Default number of random restarts of the likelihood optimization
pub const GP_OPTIM_N_START: usize = 3;
/// Default max number of likelihood evaluations of one SLSQP run
pub const GP_SLSQP_MAX_EVAL: usize = 200;
/// Default observation noise variance lower bound
pub const GP_NOISE_LOWER_BOUND: f64 = 1e-4;
/// Diagonal jitter added on top of the noise before factorization
pub const GP_JITTER: f64 = 1e-8;

const LOG_NOISE_BOUNDS: (f64, f64) = (-18., 0.7);
const LOG_NOISE_INIT: f64 = -4.6;

/// Position of each module's hyperparameters in the flat vector optimized
/// by maximum likelihood: `[mean..., kernel..., log(noise - noise_lower_bound)]`
#[derive(Clone, Copy, Debug)]
struct HyperLayout {
    n_mean: usize,
    n_kernel: usize,
}

impl HyperLayout {
    fn new(mean: &MeanModel, kernel: &Kernel, nx: usize) -> Self {
        HyperLayout {
            n_mean: mean.n_params(nx),
            n_kernel: kernel.n_params(nx),
        }
    }

    fn len(&self) -> usize {
        self.n_mean + self.n_kernel + 1
    }

    fn split<'a>(&self, theta: &'a [f64]) -> (&'a [f64], &'a [f64], f64) {
        let (mean, rest) = theta.split_at(self.n_mean);
        let (kernel, noise) = rest.split_at(self.n_kernel);
        (mean, kernel, noise[0])
    }
}

/// Cholesky factorization of the training covariance at given hyperparameters
struct Factorization {
    nll: f64,
    noise: f64,
    chol: Array2<f64>,
    alpha: Array2<f64>,
}

/// Negative log marginal likelihood of the (scaled) training data
///
/// nll = 1/2 r' K^-1 r + 1/2 log|K| + n/2 log(2 pi) with r = y - m(x)
fn marginal_likelihood(
    params: &GpValidParams,
    layout: &HyperLayout,
    xt: &Array2<f64>,
    yt: &Array1<f64>,
    theta: &[f64],
) -> Result<Factorization> {
    let (mean_p, kernel_p, log_noise) = layout.split(theta);
    let noise = params.noise_lower_bound() + log_noise.exp();

    let mut k = params.kernel().value(xt, xt, kernel_p);
    k.diag_mut().mapv_inplace(|v| v + noise + GP_JITTER);
    let chol = k.cholesky()?;

    let r = (yt - &params.mean().value(xt, mean_p)).insert_axis(Axis(1));
    let z = chol.solve_triangular(&r, UPLO::Lower)?;
    let alpha = chol.t().solve_triangular(&z, UPLO::Upper)?;

    let n = xt.nrows() as f64;
    let nll = 0.5 * z.mapv(|v| v * v).sum()
        + chol.diag().mapv(f64::ln).sum()
        + 0.5 * n * (2. * std::f64::consts::PI).ln();
    if !nll.is_finite() {
        return Err(GpError::LikelihoodComputationError(format!(
            "non finite likelihood {nll}"
        )));
    }
    Ok(Factorization {
        nll,
        noise,
        chol,
        alpha,
    })
}

/// Gaussian process regression model
///
/// The prior is `f ~ GP(m(x), k(x, x'))` with mean and kernel modules chosen
/// through [GpParams], observations are `y = f(x) + e` with `e ~ N(0, noise)`.
/// Hyperparameters (mean, kernel and noise) are fitted by maximizing the
/// marginal likelihood.
///
/// Inputs are mapped onto the unit hypercube before entering the modules,
/// targets are used as given (callers standardize them beforehand).
///
/// ```no_run
/// use bbo_gp::GaussianProcess;
/// use linfa::prelude::*;
/// use ndarray::{arr1, arr2};
///
/// let xt = arr2(&[[0.0], [5.0], [10.0], [15.0], [18.0], [20.0], [25.0]]);
/// let yt = arr1(&[0.0, 1.0, 1.5, 0.9, 1.0, 0.0, -1.0]);
/// let gp = GaussianProcess::params()
///     .seed(Some(42))
///     .fit(&Dataset::new(xt, yt))
///     .expect("GP fitted");
/// let (mean, variance) = gp.predict_valvar(&arr2(&[[1.0], [7.0]])).expect("prediction");
/// ```
#[derive(Clone, Debug)]
pub struct GaussianProcess {
    /// Optimal flat hyperparameter vector
    hyperparameters: Array1<f64>,
    /// Observation noise variance
    noise: f64,
    /// Negative log marginal likelihood at the optimum
    likelihood: f64,
    /// Input normalization
    scaler: InputScaler,
    /// Scaled training inputs
    xt: Array2<f64>,
    /// Lower cholesky factor of the training covariance
    chol: Array2<f64>,
    /// K^-1 (y - m(x)) as a (n, 1) array
    alpha: Array2<f64>,
    /// Training data (inputs, targets)
    training_data: (Array2<f64>, Array1<f64>),
    /// Parameters used to fit this model
    params: GpValidParams,
}

impl fmt::Display for GaussianProcess {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "GP(mean={}, kernel={}, noise={:.2e}, nll={:.4})",
            self.params.mean(),
            self.params.kernel(),
            self.noise,
            self.likelihood
        )
    }
}

impl GaussianProcess {
    /// Gp parameters constructor with constant mean and Matern 5/2 kernel
    pub fn params() -> GpParams {
        GpParams::new(MeanModel::default(), Kernel::default())
    }

    fn layout(&self) -> HyperLayout {
        HyperLayout::new(self.params.mean(), self.params.kernel(), self.xt.ncols())
    }

    /// Posterior mean of the latent function at the `(n, nx)` points `x`
    pub fn predict(&self, x: &ArrayBase<impl Data<Elem = f64>, Ix2>) -> Result<Array1<f64>> {
        let xs = self.scaler.transform(x);
        let theta = self.hyperparameters.to_vec();
        let (mean_p, kernel_p, _) = self.layout().split(&theta);
        let ks = self.params.kernel().value(&xs, &self.xt, kernel_p);
        let correction = ks.dot(&self.alpha).remove_axis(Axis(1));
        Ok(self.params.mean().value(&xs, mean_p) + correction)
    }

    /// Posterior variance of the latent function at the `(n, nx)` points `x`
    pub fn predict_var(&self, x: &ArrayBase<impl Data<Elem = f64>, Ix2>) -> Result<Array1<f64>> {
        Ok(self.predict_valvar(x)?.1)
    }

    /// Posterior mean and variance of the latent function at the `(n, nx)` points `x`
    pub fn predict_valvar(
        &self,
        x: &ArrayBase<impl Data<Elem = f64>, Ix2>,
    ) -> Result<(Array1<f64>, Array1<f64>)> {
        let xs = self.scaler.transform(x);
        let theta = self.hyperparameters.to_vec();
        let (mean_p, kernel_p, _) = self.layout().split(&theta);
        let kernel = self.params.kernel();

        let ks = kernel.value(&xs, &self.xt, kernel_p);
        let mean = self.params.mean().value(&xs, mean_p) + ks.dot(&self.alpha).remove_axis(Axis(1));
        let v = self.chol.solve_triangular(&ks.t().to_owned(), UPLO::Lower)?;
        let var = (kernel.diag(&xs, kernel_p) - v.mapv(|e| e * e).sum_axis(Axis(0)))
            .mapv(|e| e.max(0.));
        Ok((mean, var))
    }

    /// Joint posterior of the latent function at the `(q, nx)` points `x`:
    /// mean vector `(q,)` and covariance matrix `(q, q)`
    pub fn predict_cov(
        &self,
        x: &ArrayBase<impl Data<Elem = f64>, Ix2>,
    ) -> Result<(Array1<f64>, Array2<f64>)> {
        let xs = self.scaler.transform(x);
        let theta = self.hyperparameters.to_vec();
        let (mean_p, kernel_p, _) = self.layout().split(&theta);
        let kernel = self.params.kernel();

        let ks = kernel.value(&xs, &self.xt, kernel_p);
        let mean = self.params.mean().value(&xs, mean_p) + ks.dot(&self.alpha).remove_axis(Axis(1));
        let v = self.chol.solve_triangular(&ks.t().to_owned(), UPLO::Lower)?;
        let mut cov = kernel.value(&xs, &xs, kernel_p) - v.t().dot(&v);
        // symmetrize and clip the roundoff on the diagonal
        let sym = (&cov + &cov.t()) * 0.5;
        cov.assign(&sym);
        cov.diag_mut().mapv_inplace(|e| e.max(0.));
        Ok((mean, cov))
    }

    /// Optimal flat hyperparameter vector `[mean..., kernel..., raw noise]`
    pub fn hyperparameters(&self) -> &Array1<f64> {
        &self.hyperparameters
    }

    /// Observation noise variance
    pub fn noise(&self) -> f64 {
        self.noise
    }

    /// Negative log marginal likelihood at the optimum
    pub fn likelihood(&self) -> f64 {
        self.likelihood
    }

    /// Input and output dimensions
    pub fn dims(&self) -> (usize, usize) {
        (self.xt.ncols(), 1)
    }

    /// Training data (inputs, targets)
    pub fn training_data(&self) -> &(Array2<f64>, Array1<f64>) {
        &self.training_data
    }

    /// Parameters used to fit the model
    pub fn params_used(&self) -> &GpValidParams {
        &self.params
    }
}

impl<D: Data<Elem = f64>> Fit<ArrayBase<D, Ix2>, ArrayBase<D, Ix1>, GpError> for GpValidParams {
    type Object = GaussianProcess;

    /// Fit GP hyperparameters using maximum likelihood
    fn fit(
        &self,
        dataset: &DatasetBase<ArrayBase<D, Ix2>, ArrayBase<D, Ix1>>,
    ) -> Result<Self::Object> {
        let x = dataset.records();
        let y = dataset.targets();

        if x.nrows() == 0 {
            return Err(GpError::InvalidValueError(
                "cannot fit a GP without training points".to_string(),
            ));
        }
        if x.nrows() != y.len() {
            return Err(GpError::InvalidValueError(format!(
                "inputs ({}) and targets ({}) should have the same number of rows",
                x.nrows(),
                y.len()
            )));
        }
        if x.iter().chain(y.iter()).any(|v| !v.is_finite()) {
            return Err(GpError::InvalidValueError(
                "training data should be finite".to_string(),
            ));
        }

        let nx = x.ncols();
        let scaler = match self.input_bounds() {
            Some(bounds) if bounds.nrows() != nx => {
                return Err(GpError::InvalidValueError(format!(
                    "input bounds dimension ({}) should match inputs dimension ({nx})",
                    bounds.nrows()
                )))
            }
            Some(bounds) => InputScaler::from_bounds(bounds),
            None => InputScaler::from_data(x),
        };
        let xt = scaler.transform(x);
        let yt = y.to_owned();

        let layout = HyperLayout::new(self.mean(), self.kernel(), nx);
        let mut bounds = self.mean().param_bounds(nx);
        bounds.extend(self.kernel().param_bounds(nx));
        bounds.push(LOG_NOISE_BOUNDS);

        let mut rng = match self.seed() {
            Some(seed) => Xoshiro256Plus::seed_from_u64(seed),
            None => Xoshiro256Plus::from_entropy(),
        };
        let mut starts = Vec::with_capacity(self.n_start() + 1);
        let mut theta0 = self.mean().init_params(nx, &mut rng);
        theta0.extend(self.kernel().init_params(nx, &mut rng));
        theta0.push(LOG_NOISE_INIT);
        starts.push(theta0);
        for _ in 0..self.n_start() {
            let mut theta = self.mean().random_params(nx, &mut rng);
            theta.extend(self.kernel().random_params(nx, &mut rng));
            theta.push(rng_log_noise(&mut rng));
            starts.push(theta);
        }
        debug_assert!(starts.iter().all(|s| s.len() == layout.len()));

        let objfn = |theta: &[f64]| -> f64 {
            match marginal_likelihood(self, &layout, &xt, &yt, theta) {
                Ok(f) => f.nll,
                Err(_) => f64::INFINITY,
            }
        };
        let optimize = |theta0: &Vec<f64>| -> (f64, Array1<f64>) {
            match self.mll_optimizer() {
                MllOptimizer::QuasiNewton => optimize_params_slsqp(
                    objfn,
                    theta0,
                    &bounds,
                    SlsqpParams {
                        max_eval: self.max_eval(),
                        ..SlsqpParams::default()
                    },
                ),
                MllOptimizer::Adam => optimize_params_adam(
                    objfn,
                    theta0,
                    &bounds,
                    AdamParams::new(self.lr().unwrap_or(0.01), self.epochs().unwrap_or(1)),
                ),
            }
        };

        let now = Instant::now();
        let best = |a: (f64, Array1<f64>), b: (f64, Array1<f64>)| if b.0 < a.0 { b } else { a };
        let worst = || (f64::INFINITY, Array1::zeros(layout.len()));
        let (nll, theta) = if self.parallel() {
            starts.par_iter().map(optimize).reduce(worst, best)
        } else {
            starts.iter().map(optimize).fold(worst(), best)
        };
        debug!(
            "GP likelihood optimization ({}, {} starts) nll={nll} in {}ms",
            self.mll_optimizer(),
            starts.len(),
            now.elapsed().as_millis()
        );

        let theta = if nll.is_finite() {
            theta
        } else {
            warn!("GP likelihood optimization failed, fall back to initial hyperparameters");
            Array1::from(starts[0].clone())
        };
        let fact = marginal_likelihood(self, &layout, &xt, &yt, &theta.to_vec())?;

        Ok(GaussianProcess {
            hyperparameters: theta,
            noise: fact.noise,
            likelihood: fact.nll,
            scaler,
            xt,
            chol: fact.chol,
            alpha: fact.alpha,
            training_data: (x.to_owned(), yt),
            params: self.clone(),
        })
    }
}

fn rng_log_noise<R: ndarray_rand::rand::Rng>(rng: &mut R) -> f64 {
    rng.gen_range(-9.0..-2.0)
}
