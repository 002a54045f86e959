//! Bayesian optimization designer configuration.
use crate::criteria::{MC_SAMPLES, UCB_BETA};
use crate::errors::{BboError, Result};
use crate::optimizers::{ACQF_MAX_EVAL, EPOCHS, NUM_RESTARTS, RAW_SAMPLES};
use crate::nsga2::NSGA2_POP_SIZE;
use crate::types::{AcqfOptimizer, AcqfSpec, AcqfType, Device};
use bbo_gp::kernels::{KernelConfig, KernelType};
use bbo_gp::mean_models::{MeanConfig, MeanType};
use bbo_gp::MllOptimizer;
use linfa::ParamGuard;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Default number of random trials before the model-based phase
pub const N_INIT: usize = 10;

/// Acquisition functions and optimizers settings
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AcqfConfig {
    /// Gradient optimizer: number of local optimizations
    pub num_restarts: usize,
    /// Gradient optimizer: number of random batches screened for starting points
    pub raw_samples: usize,
    /// Gradient optimizer: evaluation budget of one local optimization
    pub max_eval: usize,
    /// Evolutionary optimizer: population size
    pub pop_size: usize,
    /// Evolutionary optimizer: offsprings per generation, population size when `None`
    pub n_offsprings: Option<usize>,
    /// Evolutionary optimizer: number of generations
    pub epochs: usize,
    /// Monte Carlo samples of batch criteria
    pub mc_samples: usize,
    /// UCB exploration weight
    pub ucb_beta: f64,
}

impl Default for AcqfConfig {
    fn default() -> Self {
        AcqfConfig {
            num_restarts: NUM_RESTARTS,
            raw_samples: RAW_SAMPLES,
            max_eval: ACQF_MAX_EVAL,
            pop_size: NSGA2_POP_SIZE,
            n_offsprings: None,
            epochs: EPOCHS,
            mc_samples: MC_SAMPLES,
            ucb_beta: UCB_BETA,
        }
    }
}

/// A checked [BoConfig]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ValidBoConfig {
    /// Number of trials gathered by random sampling before fitting a model
    pub(crate) n_init: usize,
    /// Number of points of a model-based batch
    pub(crate) q: usize,
    /// Compute capability
    pub(crate) device: Device,
    /// Seed of every random generator, system entropy when `None`
    pub(crate) seed: Option<u64>,
    pub(crate) mean_type: MeanType,
    pub(crate) mean_config: MeanConfig,
    pub(crate) kernel_type: KernelType,
    pub(crate) kernel_config: KernelConfig,
    /// Marginal likelihood maximization strategy
    pub(crate) mll_optimizer: MllOptimizer,
    /// Learning rate of the `adam` likelihood optimizer
    pub(crate) mll_lr: Option<f64>,
    /// Epochs of the `adam` likelihood optimizer
    pub(crate) mll_epochs: Option<usize>,
    /// Acquisition criterion or criteria
    pub(crate) acqf: AcqfSpec,
    /// Acquisition optimizer
    pub(crate) acqf_optimizer: AcqfOptimizer,
    pub(crate) acqf_config: AcqfConfig,
}

impl Default for ValidBoConfig {
    fn default() -> Self {
        ValidBoConfig {
            n_init: N_INIT,
            q: 1,
            device: Device::Cpu,
            seed: None,
            mean_type: MeanType::default(),
            mean_config: MeanConfig::default(),
            kernel_type: KernelType::default(),
            kernel_config: KernelConfig::default(),
            mll_optimizer: MllOptimizer::default(),
            mll_lr: None,
            mll_epochs: None,
            acqf: AcqfSpec::default(),
            acqf_optimizer: AcqfOptimizer::default(),
            acqf_config: AcqfConfig::default(),
        }
    }
}

impl ValidBoConfig {
    /// Number of random trials before the model-based phase
    pub fn n_init(&self) -> usize {
        self.n_init
    }

    /// Size of model-based batches
    pub fn q(&self) -> usize {
        self.q
    }

    /// Compute capability
    pub fn device(&self) -> Device {
        self.device
    }

    /// Random seed
    pub fn seed(&self) -> Option<u64> {
        self.seed
    }

    /// Acquisition criteria in declaration order
    pub fn acqf_types(&self) -> Vec<AcqfType> {
        self.acqf.types()
    }

    /// Acquisition optimizer
    pub fn acqf_optimizer(&self) -> AcqfOptimizer {
        self.acqf_optimizer
    }

    /// Acquisition settings
    pub fn acqf_config(&self) -> &AcqfConfig {
        &self.acqf_config
    }
}

/// Bayesian optimization designer configuration, checked into a
/// [ValidBoConfig] with [ParamGuard::check].
///
/// ```
/// use bbo_designers::{AcqfOptimizer, AcqfSpec, AcqfType, BoConfig};
/// use linfa::ParamGuard;
///
/// let config = BoConfig::default()
///     .n_init(5)
///     .q(2)
///     .acqf(AcqfSpec::Multi(vec![AcqfType::QEi, AcqfType::QUcb]))
///     .acqf_optimizer(AcqfOptimizer::Evolutionary)
///     .check()
///     .expect("valid configuration");
/// assert_eq!(config.q(), 2);
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BoConfig(ValidBoConfig);

impl BoConfig {
    /// Sets the number of random trials before the model-based phase
    pub fn n_init(mut self, n_init: usize) -> Self {
        self.0.n_init = n_init;
        self
    }

    /// Sets the size of model-based batches
    pub fn q(mut self, q: usize) -> Self {
        self.0.q = q;
        self
    }

    /// Sets the compute capability
    pub fn device(mut self, device: Device) -> Self {
        self.0.device = device;
        self
    }

    /// Sets a random generator seed used to get reproducible results
    pub fn seed(mut self, seed: u64) -> Self {
        self.0.seed = Some(seed);
        self
    }

    /// Sets the surrogate mean module
    pub fn mean(mut self, mean_type: MeanType, mean_config: MeanConfig) -> Self {
        self.0.mean_type = mean_type;
        self.0.mean_config = mean_config;
        self
    }

    /// Sets the surrogate kernel module
    pub fn kernel(mut self, kernel_type: KernelType, kernel_config: KernelConfig) -> Self {
        self.0.kernel_type = kernel_type;
        self.0.kernel_config = kernel_config;
        self
    }

    /// Sets the marginal likelihood optimizer, `lr` and `epochs` are used by `adam`
    pub fn mll_optimizer(
        mut self,
        mll_optimizer: MllOptimizer,
        lr: Option<f64>,
        epochs: Option<usize>,
    ) -> Self {
        self.0.mll_optimizer = mll_optimizer;
        self.0.mll_lr = lr;
        self.0.mll_epochs = epochs;
        self
    }

    /// Sets the acquisition criterion or criteria
    pub fn acqf(mut self, acqf: AcqfSpec) -> Self {
        self.0.acqf = acqf;
        self
    }

    /// Sets the acquisition optimizer
    pub fn acqf_optimizer(mut self, acqf_optimizer: AcqfOptimizer) -> Self {
        self.0.acqf_optimizer = acqf_optimizer;
        self
    }

    /// Sets the acquisition settings
    pub fn acqf_config(mut self, acqf_config: AcqfConfig) -> Self {
        self.0.acqf_config = acqf_config;
        self
    }

    /// Configuration from a JSON document, missing fields taking default values.
    /// Unknown fields are rejected.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| BboError::InvalidConfigError(format!("cannot parse configuration: {e}")))
    }

    /// JSON document of the configuration
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl From<ValidBoConfig> for BoConfig {
    fn from(valid: ValidBoConfig) -> Self {
        BoConfig(valid)
    }
}

fn invalid(msg: impl Into<String>) -> BboError {
    BboError::InvalidConfigError(msg.into())
}

impl ParamGuard for BoConfig {
    type Checked = ValidBoConfig;
    type Error = BboError;

    fn check_ref(&self) -> Result<&Self::Checked> {
        let config = &self.0;
        if config.n_init < 1 {
            return Err(invalid("`n_init` should be >= 1"));
        }
        if config.q < 1 {
            return Err(invalid("`q` should be >= 1"));
        }
        if config.mll_optimizer == MllOptimizer::Adam {
            if !matches!(config.mll_lr, Some(lr) if lr.is_finite() && lr > 0.) {
                return Err(invalid("adam likelihood optimizer requires `mll_lr` > 0"));
            }
            if !matches!(config.mll_epochs, Some(epochs) if epochs >= 1) {
                return Err(invalid("adam likelihood optimizer requires `mll_epochs` >= 1"));
            }
        }
        if let AcqfSpec::Multi(types) = &config.acqf {
            if types.is_empty() {
                return Err(invalid("acquisition list should not be empty"));
            }
            let distinct: BTreeSet<_> = types.iter().collect();
            if distinct.len() != types.len() {
                return Err(invalid(format!("duplicated acquisition in {types:?}")));
            }
            if config.acqf_optimizer != AcqfOptimizer::Evolutionary {
                return Err(invalid(
                    "several acquisition functions require the evolutionary optimizer",
                ));
            }
        }
        let acqf_config = &config.acqf_config;
        if acqf_config.pop_size < 2 {
            return Err(invalid("`pop_size` should be >= 2"));
        }
        if acqf_config.epochs < 1 {
            return Err(invalid("`epochs` should be >= 1"));
        }
        if acqf_config.n_offsprings == Some(0) {
            return Err(invalid("`n_offsprings` should be >= 1"));
        }
        if acqf_config.num_restarts < 1 {
            return Err(invalid("`num_restarts` should be >= 1"));
        }
        if acqf_config.raw_samples < acqf_config.num_restarts {
            return Err(invalid(format!(
                "`raw_samples` ({}) should be >= `num_restarts` ({})",
                acqf_config.raw_samples, acqf_config.num_restarts
            )));
        }
        if acqf_config.max_eval < 1 {
            return Err(invalid("`max_eval` should be >= 1"));
        }
        if acqf_config.mc_samples < 1 {
            return Err(invalid("`mc_samples` should be >= 1"));
        }
        if !(acqf_config.ucb_beta.is_finite() && acqf_config.ucb_beta >= 0.) {
            return Err(invalid("`ucb_beta` should be a non negative number"));
        }
        Ok(&self.0)
    }

    fn check(self) -> Result<Self::Checked> {
        self.check_ref()?;
        Ok(self.0)
    }
}
