use crate::criteria::sampler::McSampler;
use crate::criteria::{marginal_posterior, AcquisitionFunction};
use crate::utils::{log_ei_helper, log_mean_exp, log_softplus, norm_cdf, norm_pdf};
use bbo_gp::GaussianProcess;
use ndarray::ArrayView2;
use std::sync::Arc;

/// Temperature of the softplus smoothing the improvement
const TAU_RELU: f64 = 1e-6;
/// Temperature of the smooth max over the batch
const TAU_MAX: f64 = 1e-2;

/// Expected improvement over the best observed label.
///
/// Closed form for a single point, otherwise `E[max_j (f_j - best_f)^+]`
/// estimated with fixed base samples.
#[derive(Clone, Debug)]
pub struct ExpectedImprovement {
    model: Arc<GaussianProcess>,
    best_f: f64,
    sampler: McSampler,
}

impl ExpectedImprovement {
    pub(crate) fn new(model: Arc<GaussianProcess>, best_f: f64, sampler: McSampler) -> Self {
        ExpectedImprovement {
            model,
            best_f,
            sampler,
        }
    }
}

impl AcquisitionFunction for ExpectedImprovement {
    fn name(&self) -> &'static str {
        "qEI"
    }

    fn value(&self, x: &ArrayView2<f64>) -> f64 {
        if x.nrows() == 1 {
            return match marginal_posterior(&self.model, x) {
                Some((mu, sigma)) if sigma < f64::EPSILON => (mu - self.best_f).max(0.),
                Some((mu, sigma)) => {
                    let u = (mu - self.best_f) / sigma;
                    sigma * (u * norm_cdf(u) + norm_pdf(u))
                }
                None => f64::MIN,
            };
        }
        match self.sampler.posterior_samples(&self.model, x) {
            Ok((_, samples)) => samples
                .rows()
                .into_iter()
                .map(|f| f.fold(0f64, |acc, v| acc.max(v - self.best_f)))
                .sum::<f64>()
                / samples.nrows() as f64,
            Err(_) => f64::MIN,
        }
    }
}

/// Log of the expected improvement, numerically stable where the improvement
/// vanishes.
///
/// Closed form for a single point, otherwise the log mean over fixed base
/// samples of a smooth max over the batch of the softplus-smoothed improvement.
#[derive(Clone, Debug)]
pub struct LogExpectedImprovement {
    model: Arc<GaussianProcess>,
    best_f: f64,
    sampler: McSampler,
}

impl LogExpectedImprovement {
    pub(crate) fn new(model: Arc<GaussianProcess>, best_f: f64, sampler: McSampler) -> Self {
        LogExpectedImprovement {
            model,
            best_f,
            sampler,
        }
    }
}

impl AcquisitionFunction for LogExpectedImprovement {
    fn name(&self) -> &'static str {
        "qlogEI"
    }

    fn value(&self, x: &ArrayView2<f64>) -> f64 {
        if x.nrows() == 1 {
            return match marginal_posterior(&self.model, x) {
                Some((mu, sigma)) if sigma < f64::EPSILON => {
                    TAU_RELU.ln() + log_softplus(mu - self.best_f, TAU_RELU)
                }
                Some((mu, sigma)) => sigma.ln() + log_ei_helper((mu - self.best_f) / sigma),
                None => f64::MIN,
            };
        }
        match self.sampler.posterior_samples(&self.model, x) {
            Ok((_, samples)) => {
                let per_sample: Vec<f64> = samples
                    .rows()
                    .into_iter()
                    .map(|f| {
                        let log_impr: Vec<f64> = f
                            .iter()
                            .map(|v| {
                                (TAU_RELU.ln() + log_softplus(v - self.best_f, TAU_RELU)) / TAU_MAX
                            })
                            .collect();
                        // smooth max, log-sum-exp at temperature TAU_MAX
                        TAU_MAX
                            * (log_mean_exp(&log_impr) + (log_impr.len() as f64).ln())
                    })
                    .collect();
                log_mean_exp(&per_sample)
            }
            Err(_) => f64::MIN,
        }
    }
}
