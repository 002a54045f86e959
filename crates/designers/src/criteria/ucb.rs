use crate::criteria::sampler::McSampler;
use crate::criteria::{marginal_posterior, AcquisitionFunction};
use bbo_gp::GaussianProcess;
use ndarray::ArrayView2;
use std::f64::consts::PI;
use std::sync::Arc;

/// Upper confidence bound `μ + sqrt(β) σ`.
///
/// For a batch, `E[max_j (μ_j + sqrt(β π / 2) |f_j - μ_j|)]` estimated with
/// fixed base samples, which matches the closed form for a single point.
#[derive(Clone, Debug)]
pub struct UpperConfidenceBound {
    model: Arc<GaussianProcess>,
    beta: f64,
    sampler: McSampler,
}

impl UpperConfidenceBound {
    pub(crate) fn new(model: Arc<GaussianProcess>, beta: f64, sampler: McSampler) -> Self {
        UpperConfidenceBound {
            model,
            beta,
            sampler,
        }
    }
}

impl AcquisitionFunction for UpperConfidenceBound {
    fn name(&self) -> &'static str {
        "qUCB"
    }

    fn value(&self, x: &ArrayView2<f64>) -> f64 {
        if x.nrows() == 1 {
            return match marginal_posterior(&self.model, x) {
                Some((mu, sigma)) => mu + self.beta.sqrt() * sigma,
                None => f64::MIN,
            };
        }
        let beta_prime = (self.beta * PI / 2.).sqrt();
        match self.sampler.posterior_samples(&self.model, x) {
            Ok((mean, samples)) => {
                samples
                    .rows()
                    .into_iter()
                    .map(|f| {
                        f.iter()
                            .zip(mean.iter())
                            .map(|(v, mu)| mu + beta_prime * (v - mu).abs())
                            .fold(f64::NEG_INFINITY, f64::max)
                    })
                    .sum::<f64>()
                    / samples.nrows() as f64
            }
            Err(_) => f64::MIN,
        }
    }
}
