//! This library implements [Gaussian Process](https://en.wikipedia.org/wiki/Gaussian_process) regression
//! used as the surrogate model of a Bayesian optimization loop.
//!
//! The prior is made of a mean module and a covariance module which are chosen independently:
//!
//! * mean: [constant](mean_models::ConstantMean) or [multi-layer perceptron](mean_models::MlpMean),
//! * kernel: [Matern 5/2](kernels::Matern52Kernel), [Kumaraswamy input warping](kernels::KumarKernel)
//!   or [deep kernel](kernels::MlpKernel) (Matern 5/2 on MLP features).
//!
//! Observations are corrupted by a gaussian noise whose variance is bounded from below.
//! Hyperparameters are fitted by maximizing the marginal likelihood either with a quasi-Newton
//! method (SLSQP) or with a fixed number of Adam steps, see [MllOptimizer].
//!
//! GP models are implemented by [GaussianProcess] parameterized by [GpParams].
//!
//! ```no_run
//! use bbo_gp::{GaussianProcess, GpParams, MllOptimizer};
//! use bbo_gp::kernels::{kernel_factory, KernelType};
//! use bbo_gp::mean_models::{mean_factory, MeanType};
//! use linfa::prelude::*;
//! use ndarray::array;
//!
//! let xt = array![[0.0, 0.1], [0.4, 0.9], [0.7, 0.3], [1.0, 0.6]];
//! let yt = array![0.2, -0.5, 1.1, 0.3];
//! let gp = GpParams::new(
//!     mean_factory(Some(MeanType::Constant), None),
//!     kernel_factory(Some(KernelType::Kumar), None),
//! )
//! .mll_optimizer(MllOptimizer::Adam)
//! .lr(Some(0.01))
//! .epochs(Some(200))
//! .fit(&Dataset::new(xt, yt))
//! .expect("GP fitted");
//! let (mean, cov) = gp.predict_cov(&array![[0.5, 0.5], [0.2, 0.8]]).expect("joint posterior");
//! ```
#![warn(missing_docs)]
#![warn(rustdoc::broken_intra_doc_links)]
mod algorithm;
mod errors;
pub mod kernels;
pub mod mean_models;
pub mod mlp;

mod parameters;
mod utils;

mod optimization;

pub use algorithm::*;
pub use errors::*;
pub use parameters::*;
