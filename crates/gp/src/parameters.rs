use crate::errors::{GpError, Result};
use crate::kernels::Kernel;
use crate::mean_models::MeanModel;
use crate::{GP_NOISE_LOWER_BOUND, GP_OPTIM_N_START, GP_SLSQP_MAX_EVAL};
use linfa::ParamGuard;
use ndarray::Array2;
#[cfg(feature = "serializable")]
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Strategy used to maximize the marginal likelihood
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serializable", derive(Serialize, Deserialize))]
pub enum MllOptimizer {
    /// SLSQP on the negative log marginal likelihood with finite difference gradients
    #[default]
    #[cfg_attr(
        feature = "serializable",
        serde(rename = "quasi-newton", alias = "l-bfgs", alias = "lbfgs")
    )]
    QuasiNewton,
    /// Fixed number of Adam steps with a given learning rate
    #[cfg_attr(feature = "serializable", serde(rename = "adam"))]
    Adam,
}

impl fmt::Display for MllOptimizer {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            MllOptimizer::QuasiNewton => write!(f, "quasi-newton"),
            MllOptimizer::Adam => write!(f, "adam"),
        }
    }
}

impl FromStr for MllOptimizer {
    type Err = GpError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "quasi-newton" | "l-bfgs" | "lbfgs" => Ok(MllOptimizer::QuasiNewton),
            "adam" => Ok(MllOptimizer::Adam),
            _ => Err(GpError::InvalidModuleError(format!(
                "unknown likelihood optimizer `{s}`, expected one of: quasi-newton, l-bfgs, adam"
            ))),
        }
    }
}

/// A set of validated GP parameters.
#[derive(Clone, Debug, PartialEq)]
pub struct GpValidParams {
    /// Mean module m(x)
    pub(crate) mean: MeanModel,
    /// Covariance module k(x, x')
    pub(crate) kernel: Kernel,
    /// Likelihood maximization strategy
    pub(crate) mll_optimizer: MllOptimizer,
    /// Adam learning rate
    pub(crate) lr: Option<f64>,
    /// Adam number of steps
    pub(crate) epochs: Option<usize>,
    /// Number of random restarts on top of the default starting point
    pub(crate) n_start: usize,
    /// Max number of likelihood evaluations of one SLSQP run
    pub(crate) max_eval: usize,
    /// Observation noise variance lower bound
    pub(crate) noise_lower_bound: f64,
    /// Input box mapped onto the unit hypercube, training data min/max otherwise
    pub(crate) input_bounds: Option<Array2<f64>>,
    /// Seed of the restart points generator
    pub(crate) seed: Option<u64>,
    /// Run restarts on the rayon thread pool
    pub(crate) parallel: bool,
}

impl Default for GpValidParams {
    fn default() -> GpValidParams {
        GpValidParams {
            mean: MeanModel::default(),
            kernel: Kernel::default(),
            mll_optimizer: MllOptimizer::default(),
            lr: None,
            epochs: None,
            n_start: GP_OPTIM_N_START,
            max_eval: GP_SLSQP_MAX_EVAL,
            noise_lower_bound: GP_NOISE_LOWER_BOUND,
            input_bounds: None,
            seed: None,
            parallel: false,
        }
    }
}

impl GpValidParams {
    /// Get mean model
    pub fn mean(&self) -> &MeanModel {
        &self.mean
    }

    /// Get kernel k(x, x')
    pub fn kernel(&self) -> &Kernel {
        &self.kernel
    }

    /// Get likelihood optimizer
    pub fn mll_optimizer(&self) -> MllOptimizer {
        self.mll_optimizer
    }

    /// Get Adam learning rate
    pub fn lr(&self) -> Option<f64> {
        self.lr
    }

    /// Get Adam number of steps
    pub fn epochs(&self) -> Option<usize> {
        self.epochs
    }

    /// Get the number of random restarts
    pub fn n_start(&self) -> usize {
        self.n_start
    }

    /// Get the max number of likelihood evaluations of one SLSQP run
    pub fn max_eval(&self) -> usize {
        self.max_eval
    }

    /// Get observation noise lower bound
    pub fn noise_lower_bound(&self) -> f64 {
        self.noise_lower_bound
    }

    /// Get input box
    pub fn input_bounds(&self) -> Option<&Array2<f64>> {
        self.input_bounds.as_ref()
    }

    /// Get restart generator seed
    pub fn seed(&self) -> Option<u64> {
        self.seed
    }

    /// Whether restarts run in parallel
    pub fn parallel(&self) -> bool {
        self.parallel
    }
}

#[derive(Clone, Debug)]
/// The set of hyperparameters that can be specified for the execution of
/// the [GP algorithm](struct.GaussianProcess.html).
pub struct GpParams(GpValidParams);

impl GpParams {
    /// A constructor for GP parameters given mean and kernel modules
    pub fn new(mean: MeanModel, kernel: Kernel) -> GpParams {
        Self(GpValidParams {
            mean,
            kernel,
            ..Default::default()
        })
    }

    /// Set mean model.
    pub fn mean(mut self, mean: MeanModel) -> Self {
        self.0.mean = mean;
        self
    }

    /// Set kernel.
    pub fn kernel(mut self, kernel: Kernel) -> Self {
        self.0.kernel = kernel;
        self
    }

    /// Set the likelihood maximization strategy.
    pub fn mll_optimizer(mut self, mll_optimizer: MllOptimizer) -> Self {
        self.0.mll_optimizer = mll_optimizer;
        self
    }

    /// Set Adam learning rate, required by [MllOptimizer::Adam].
    pub fn lr(mut self, lr: Option<f64>) -> Self {
        self.0.lr = lr;
        self
    }

    /// Set Adam number of steps, required by [MllOptimizer::Adam].
    pub fn epochs(mut self, epochs: Option<usize>) -> Self {
        self.0.epochs = epochs;
        self
    }

    /// Set the number of random restarts of the likelihood optimization
    pub fn n_start(mut self, n_start: usize) -> Self {
        self.0.n_start = n_start;
        self
    }

    /// Set the max number of likelihood evaluations of one SLSQP run
    pub fn max_eval(mut self, max_eval: usize) -> Self {
        self.0.max_eval = max_eval;
        self
    }

    /// Set the lower bound of the observation noise variance
    pub fn noise_lower_bound(mut self, noise_lower_bound: f64) -> Self {
        self.0.noise_lower_bound = noise_lower_bound;
        self
    }

    /// Set the input box as a `(nx, 2)` array of `[lower, upper]` bounds
    pub fn input_bounds(mut self, input_bounds: Option<Array2<f64>>) -> Self {
        self.0.input_bounds = input_bounds;
        self
    }

    /// Set the seed of the restart points generator
    pub fn seed(mut self, seed: Option<u64>) -> Self {
        self.0.seed = seed;
        self
    }

    /// Run restarts on the rayon thread pool
    pub fn parallel(mut self, parallel: bool) -> Self {
        self.0.parallel = parallel;
        self
    }
}

impl From<GpValidParams> for GpParams {
    fn from(valid: GpValidParams) -> Self {
        GpParams(valid)
    }
}

impl ParamGuard for GpParams {
    type Checked = GpValidParams;
    type Error = GpError;

    fn check_ref(&self) -> Result<&Self::Checked> {
        let params = &self.0;
        if params.mll_optimizer == MllOptimizer::Adam {
            match params.lr {
                Some(lr) if lr.is_finite() && lr > 0. => (),
                _ => {
                    return Err(GpError::InvalidValueError(
                        "adam likelihood optimizer requires a positive `lr`".to_string(),
                    ))
                }
            }
            match params.epochs {
                Some(epochs) if epochs > 0 => (),
                _ => {
                    return Err(GpError::InvalidValueError(
                        "adam likelihood optimizer requires `epochs` >= 1".to_string(),
                    ))
                }
            }
        }
        if !(params.noise_lower_bound.is_finite() && params.noise_lower_bound > 0.) {
            return Err(GpError::InvalidValueError(format!(
                "noise lower bound should be positive, got {}",
                params.noise_lower_bound
            )));
        }
        if params.max_eval == 0 {
            return Err(GpError::InvalidValueError(
                "`max_eval` should be >= 1".to_string(),
            ));
        }
        if let Some(bounds) = &params.input_bounds {
            if bounds.ncols() != 2 || bounds.rows().into_iter().any(|b| !(b[0] <= b[1])) {
                return Err(GpError::InvalidValueError(
                    "input bounds should be a (nx, 2) array with lower <= upper".to_string(),
                ));
            }
        }
        Ok(&self.0)
    }

    fn check(self) -> Result<Self::Checked> {
        self.check_ref()?;
        Ok(self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::GaussianProcess;
    use ndarray::array;

    #[test]
    fn test_adam_requires_lr_and_epochs() {
        let params = GaussianProcess::params().mll_optimizer(MllOptimizer::Adam);
        assert!(matches!(
            params.clone().check(),
            Err(GpError::InvalidValueError(_))
        ));
        let params = params.lr(Some(0.05));
        assert!(params.clone().check().is_err());
        assert!(params.epochs(Some(20)).check().is_ok());
    }

    #[test]
    fn test_bad_input_bounds() {
        let params = GaussianProcess::params().input_bounds(Some(array![[1., 0.]]));
        assert!(params.check().is_err());
    }

    #[test]
    fn test_mll_optimizer_names() {
        assert_eq!(
            "l-bfgs".parse::<MllOptimizer>().unwrap(),
            MllOptimizer::QuasiNewton
        );
        assert_eq!("adam".parse::<MllOptimizer>().unwrap(), MllOptimizer::Adam);
        assert!("sgd".parse::<MllOptimizer>().is_err());
    }
}
