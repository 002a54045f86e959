use crate::criteria::sampler::McSampler;
use crate::criteria::{marginal_posterior, AcquisitionFunction};
use crate::utils::norm_cdf;
use bbo_gp::GaussianProcess;
use ndarray::ArrayView2;
use std::sync::Arc;

/// Temperature of the sigmoid smoothing the improvement indicator
pub const PI_TAU: f64 = 1e-3;

/// Probability of improving over the best observed label.
///
/// Closed form `Φ((μ - best_f) / σ)` for a single point, otherwise
/// `E[max_j sigmoid((f_j - best_f) / τ)]` estimated with fixed base samples.
#[derive(Clone, Debug)]
pub struct ProbabilityOfImprovement {
    model: Arc<GaussianProcess>,
    best_f: f64,
    sampler: McSampler,
}

impl ProbabilityOfImprovement {
    pub(crate) fn new(model: Arc<GaussianProcess>, best_f: f64, sampler: McSampler) -> Self {
        ProbabilityOfImprovement {
            model,
            best_f,
            sampler,
        }
    }
}

fn sigmoid(x: f64) -> f64 {
    if x >= 0. {
        1. / (1. + (-x).exp())
    } else {
        let e = x.exp();
        e / (1. + e)
    }
}

impl AcquisitionFunction for ProbabilityOfImprovement {
    fn name(&self) -> &'static str {
        "qPI"
    }

    fn value(&self, x: &ArrayView2<f64>) -> f64 {
        if x.nrows() == 1 {
            return match marginal_posterior(&self.model, x) {
                Some((mu, sigma)) if sigma < f64::EPSILON => {
                    if mu > self.best_f {
                        1.
                    } else {
                        0.
                    }
                }
                Some((mu, sigma)) => norm_cdf((mu - self.best_f) / sigma),
                None => f64::MIN,
            };
        }
        match self.sampler.posterior_samples(&self.model, x) {
            Ok((_, samples)) => {
                samples
                    .rows()
                    .into_iter()
                    .map(|f| {
                        f.fold(0f64, |acc, v| acc.max(sigmoid((v - self.best_f) / PI_TAU)))
                    })
                    .sum::<f64>()
                    / samples.nrows() as f64
            }
            Err(_) => f64::MIN,
        }
    }
}
