//! Acquisition functions scoring a batch of candidate points from the
//! posterior of a fitted surrogate. Every criterion is maximized.
mod ei;
mod pi;
mod sampler;
mod ucb;

pub use ei::{ExpectedImprovement, LogExpectedImprovement};
pub use pi::{ProbabilityOfImprovement, PI_TAU};
pub use ucb::UpperConfidenceBound;

use crate::errors::{BboError, Result};
use crate::types::AcqfType;
use bbo_gp::GaussianProcess;
use ndarray::{ArrayBase, ArrayView2, Data, Ix2};
use sampler::McSampler;
use std::sync::Arc;

/// Default number of Monte Carlo samples of batch criteria
pub const MC_SAMPLES: usize = 256;
/// Default exploration weight of UCB
pub const UCB_BETA: f64 = 0.2;
/// Default seed of the Monte Carlo base samples
pub const MC_SEED: u64 = 0;

/// A criterion scoring a `(q, d)` batch of candidate points, the larger the
/// more promising.
pub trait AcquisitionFunction: Send + Sync {
    /// Name of the criterion
    fn name(&self) -> &'static str;

    /// Criterion value of the batch `x`
    fn value(&self, x: &ArrayView2<f64>) -> f64;
}

impl std::fmt::Debug for dyn AcquisitionFunction {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Settings shared by acquisition functions
#[derive(Clone, Debug)]
pub struct AcqfParams {
    /// Batch size the Monte Carlo base samples are drawn for
    pub q: usize,
    /// Number of Monte Carlo samples
    pub mc_samples: usize,
    /// UCB exploration weight
    pub ucb_beta: f64,
    /// Seed of the Monte Carlo base samples
    pub seed: u64,
}

impl Default for AcqfParams {
    fn default() -> Self {
        AcqfParams {
            q: 1,
            mc_samples: MC_SAMPLES,
            ucb_beta: UCB_BETA,
            seed: MC_SEED,
        }
    }
}

/// Mean and standard deviation of the latent function at a single point
pub(crate) fn marginal_posterior(model: &GaussianProcess, x: &ArrayView2<f64>) -> Option<(f64, f64)> {
    model
        .predict_valvar(x)
        .ok()
        .map(|(mu, var)| (mu[0], var[0].max(0.).sqrt()))
}

/// Build the `acqf_type` criterion from a `model` fitted on `(train_x, train_y)`,
/// labels being maximized.
pub fn acqf_factory(
    acqf_type: AcqfType,
    model: Arc<GaussianProcess>,
    train_x: &ArrayBase<impl Data<Elem = f64>, Ix2>,
    train_y: &ArrayBase<impl Data<Elem = f64>, Ix2>,
    params: &AcqfParams,
) -> Result<Box<dyn AcquisitionFunction>> {
    if train_x.ncols() != model.dims().0 {
        return Err(BboError::InvalidValue(format!(
            "training inputs dimension {} does not match the model input dimension {}",
            train_x.ncols(),
            model.dims().0
        )));
    }
    if train_y.ncols() != 1 || train_y.nrows() != train_x.nrows() || train_y.is_empty() {
        return Err(BboError::InvalidValue(format!(
            "training labels should be a ({}, 1) array, got {:?}",
            train_x.nrows(),
            train_y.dim()
        )));
    }
    let best_f = train_y.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let sampler = McSampler::new(params.mc_samples, params.q, params.seed);
    let acqf: Box<dyn AcquisitionFunction> = match acqf_type {
        AcqfType::QEi => Box::new(ExpectedImprovement::new(model, best_f, sampler)),
        AcqfType::QLogEi => Box::new(LogExpectedImprovement::new(model, best_f, sampler)),
        AcqfType::QPi => Box::new(ProbabilityOfImprovement::new(model, best_f, sampler)),
        AcqfType::QUcb => Box::new(UpperConfidenceBound::new(model, params.ucb_beta, sampler)),
    };
    Ok(acqf)
}
