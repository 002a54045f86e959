use crate::bo::config::{BoConfig, ValidBoConfig};
use crate::converter::{DefaultTrialConverter, FeaturesByType, SpecType};
use crate::criteria::{acqf_factory, AcqfParams, AcquisitionFunction};
use crate::designer::Designer;
use crate::errors::{BboError, Result};
use crate::optimizers::{
    optimize_acqf_evolutionary, optimize_acqf_gradient, EvolutionaryParams,
    GradientOptimizerParams, Nsga2Factory, PopulationDesignerFactory,
};
use crate::problem::{ProblemStatement, SearchSpace};
use crate::random::RandomDesigner;
use crate::trial::Trial;
use crate::types::AcqfOptimizer;
use crate::utils::standardize;
use bbo_gp::kernels::kernel_factory;
use bbo_gp::mean_models::mean_factory;
use bbo_gp::{GaussianProcess, GpParams};
use linfa::prelude::*;
use linfa::ParamGuard;
use log::{debug, info};
use ndarray::{Array2, ArrayView2};
use ndarray_rand::rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256Plus;
use std::fmt;
use std::sync::Arc;

/// Phase of a [BoDesigner], decided by the number of completed trials
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// Fewer than `n_init` trials: random sampling
    Bootstrap,
    /// Surrogate fitting and acquisition optimization
    ModelBased,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Phase::Bootstrap => write!(f, "bootstrap"),
            Phase::ModelBased => write!(f, "model-based"),
        }
    }
}

/// Sequential Bayesian optimization designer.
///
/// While fewer than `n_init` trials were fed back, suggestions are drawn at
/// random. Afterwards each `suggest` fits a Gaussian process on the whole
/// history (single metric, double parameters only), builds the configured
/// acquisition function(s) and returns the `q` points found by the configured
/// acquisition optimizer.
///
/// ```no_run
/// use bbo_designers::{BoConfig, BoDesigner, Designer, Objective, ObjectiveMetricGoal,
///     ProblemStatement, SearchSpace};
///
/// let mut space = SearchSpace::new();
/// space.add_float_param("x", -2., 2.)?;
/// let mut objective = Objective::new();
/// objective.add_metric("f", ObjectiveMetricGoal::Minimize)?;
/// let problem = ProblemStatement::new(space, objective);
///
/// let mut designer = BoDesigner::new(&problem, BoConfig::default().n_init(4).seed(42))?;
/// for _ in 0..10 {
///     let mut trials = designer.suggest(None)?;
///     for trial in trials.iter_mut() {
///         let x = trial.parameters["x"].as_f64().unwrap_or_default();
///         trial.metrics.insert("f".to_string(), (x - 0.5).powi(2));
///     }
///     designer.update(&trials)?;
/// }
/// # Ok::<(), bbo_designers::BboError>(())
/// ```
pub struct BoDesigner {
    config: ValidBoConfig,
    search_space: SearchSpace,
    converter: DefaultTrialConverter,
    init_designer: RandomDesigner,
    /// `(nx, 2)` bounds of the numeric features
    xlimits: Array2<f64>,
    trials: Vec<Trial>,
    phase: Phase,
    population_factory: Box<dyn PopulationDesignerFactory>,
    rng: Xoshiro256Plus,
}

impl BoDesigner {
    /// Designer for `problem` configured with `config`
    pub fn new(problem: &ProblemStatement, config: BoConfig) -> Result<Self> {
        let config = config.check()?;
        let mut rng = match config.seed() {
            Some(seed) => Xoshiro256Plus::seed_from_u64(seed),
            None => Xoshiro256Plus::from_entropy(),
        };
        let init_designer =
            RandomDesigner::new_with_rng(problem, Xoshiro256Plus::seed_from_u64(rng.gen()));
        let converter = DefaultTrialConverter::from_problem(problem);
        let spec = converter.output_spec();
        let mut xlimits = Array2::zeros((spec.len(), 2));
        for (mut row, s) in xlimits.rows_mut().into_iter().zip(spec.iter()) {
            row[0] = s.bounds.0;
            row[1] = s.bounds.1;
        }
        Ok(BoDesigner {
            config,
            search_space: problem.search_space.clone(),
            converter,
            init_designer,
            xlimits,
            trials: vec![],
            phase: Phase::Bootstrap,
            population_factory: Box::new(Nsga2Factory),
            rng,
        })
    }

    /// Sets the population designer used by the evolutionary acquisition optimizer
    pub fn population_factory(mut self, factory: Box<dyn PopulationDesignerFactory>) -> Self {
        self.population_factory = factory;
        self
    }

    /// Checked configuration
    pub fn config(&self) -> &ValidBoConfig {
        &self.config
    }

    /// Completed trials in update order
    pub fn trials(&self) -> &[Trial] {
        &self.trials
    }

    /// Current phase
    pub fn phase(&self) -> Phase {
        if self.trials.len() < self.config.n_init() {
            Phase::Bootstrap
        } else {
            Phase::ModelBased
        }
    }

    /// Training inputs and oriented labels of the history
    fn training_data(&self) -> Result<(Array2<f64>, Array2<f64>)> {
        if let Some(spec) = self
            .converter
            .output_spec()
            .into_iter()
            .find(|s| s.spec_type != SpecType::Double)
        {
            return Err(BboError::UnsupportedSpecType(format!(
                "model-based suggestions only handle double parameters, got {:?} `{}`",
                spec.spec_type, spec.name
            )));
        }
        if self.converter.num_metrics() != 1 {
            return Err(BboError::UnsupportedObjective(format!(
                "model-based suggestions handle a single metric, got {}",
                self.converter.num_metrics()
            )));
        }
        let (mut features, mut labels) = self.converter.convert(&self.trials)?;
        let x = features
            .remove(&SpecType::Double)
            .ok_or_else(|| BboError::InvalidValue("no double features".to_string()))?;
        let (_, y) = labels
            .pop_first()
            .ok_or_else(|| BboError::InvalidValue("no label".to_string()))?;
        Ok((x, y))
    }

    fn fit_model(&mut self, x: &Array2<f64>, y: &Array2<f64>) -> Result<GaussianProcess> {
        let config = &self.config;
        let params = GpParams::new(
            mean_factory(Some(config.mean_type), Some(&config.mean_config)),
            kernel_factory(Some(config.kernel_type), Some(&config.kernel_config)),
        )
        .mll_optimizer(config.mll_optimizer)
        .lr(config.mll_lr)
        .epochs(config.mll_epochs)
        .input_bounds(Some(self.xlimits.clone()))
        .seed(Some(self.rng.gen()))
        .parallel(config.device().is_parallel())
        .check()?;
        let gp = params.fit(&Dataset::new(x.to_owned(), y.column(0).to_owned()))?;
        info!("Surrogate fitted on {} trials: {}", x.nrows(), gp);
        Ok(gp)
    }

    fn acquisitions(
        &mut self,
        gp: GaussianProcess,
        x: &Array2<f64>,
        y: &Array2<f64>,
    ) -> Result<Vec<Box<dyn AcquisitionFunction>>> {
        let model = Arc::new(gp);
        let acqf_config = self.config.acqf_config();
        let params = AcqfParams {
            q: self.config.q(),
            mc_samples: acqf_config.mc_samples,
            ucb_beta: acqf_config.ucb_beta,
            seed: self.rng.gen(),
        };
        self.config
            .acqf_types()
            .into_iter()
            .map(|t| acqf_factory(t, model.clone(), x, y, &params))
            .collect()
    }

    fn model_based_suggest(&mut self, count: Option<usize>) -> Result<Vec<Trial>> {
        let q = self.config.q();
        if let Some(count) = count {
            if count != q {
                return Err(BboError::InvalidValue(format!(
                    "model-based batches hold `q` = {q} points, {count} requested"
                )));
            }
        }
        let (x, y) = self.training_data()?;
        let y = standardize(&y);
        let gp = self.fit_model(&x, &y)?;
        let acqfs = self.acquisitions(gp, &x, &y)?;

        let acqf_config = self.config.acqf_config().clone();
        let parallel = self.config.device().is_parallel();
        let candidates = match self.config.acqf_optimizer() {
            AcqfOptimizer::Gradient => {
                let acqf = acqfs.first().ok_or_else(|| {
                    BboError::InvalidConfigError("no acquisition function".to_string())
                })?;
                let params = GradientOptimizerParams {
                    num_restarts: acqf_config.num_restarts,
                    raw_samples: acqf_config.raw_samples,
                    max_eval: acqf_config.max_eval,
                    parallel,
                };
                optimize_acqf_gradient(acqf.as_ref(), &self.xlimits, q, &params, &mut self.rng)?
            }
            AcqfOptimizer::Evolutionary => {
                let params = EvolutionaryParams {
                    pop_size: acqf_config.pop_size,
                    n_offsprings: acqf_config.n_offsprings,
                    epochs: acqf_config.epochs,
                    parallel,
                };
                let init_designer = &mut self.init_designer;
                let converter = &self.converter;
                let random_fill = |n: usize| -> Result<Array2<f64>> {
                    let trials = init_designer.suggest(Some(n))?;
                    converter.to_feature_array(&trials)
                };
                optimize_acqf_evolutionary(
                    &acqfs,
                    &self.search_space,
                    q,
                    &params,
                    self.population_factory.as_ref(),
                    &mut self.rng,
                    random_fill,
                )?
            }
        };
        log_batch(&candidates.view());
        self.to_trials(candidates)
    }

    fn to_trials(&self, x: Array2<f64>) -> Result<Vec<Trial>> {
        let mut features = FeaturesByType::new();
        features.insert(SpecType::Double, x);
        self.converter.to_trials(&features)
    }
}

fn log_batch(x: &ArrayView2<f64>) {
    for (i, row) in x.rows().into_iter().enumerate() {
        debug!("Candidate {i}: {row}");
    }
}

impl Designer for BoDesigner {
    /// Random trials in the bootstrap phase, `count` defaulting to 1. In the
    /// model-based phase a batch of exactly `q` trials, `count` should then be
    /// `None` or `q`.
    fn suggest(&mut self, count: Option<usize>) -> Result<Vec<Trial>> {
        let phase = self.phase();
        if phase != self.phase {
            info!(
                "Switching to {phase} phase after {} trials",
                self.trials.len()
            );
            self.phase = phase;
        }
        match phase {
            Phase::Bootstrap => self.init_designer.suggest(count),
            Phase::ModelBased => self.model_based_suggest(count),
        }
    }

    fn update(&mut self, completed: &[Trial]) -> Result<()> {
        self.trials.extend_from_slice(completed);
        debug!(
            "{} trials added, history holds {}",
            completed.len(),
            self.trials.len()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bo::config::AcqfConfig;
    use crate::designer::PopulationDesigner;
    use crate::optimizers::EvolutionaryParams;
    use crate::problem::{Objective, ObjectiveMetricGoal};
    use crate::types::{AcqfSpec, AcqfType, Device};
    use env_logger::{Builder, Env, Target};
    use serial_test::serial;

    fn init_logger() {
        Builder::from_env(Env::new().filter_or("BBO_LOG", "info"))
            .target(Target::Stdout)
            .is_test(true)
            .try_init()
            .ok();
    }

    fn continuous_problem(goal: ObjectiveMetricGoal) -> ProblemStatement {
        let mut space = SearchSpace::new();
        space
            .add_float_param("x0", -2., 2.)
            .unwrap()
            .add_float_param("x1", 0., 1.)
            .unwrap();
        let mut objective = Objective::new();
        objective.add_metric("f", goal).unwrap();
        ProblemStatement::new(space, objective)
    }

    fn quadratic(trial: &Trial) -> f64 {
        let x0 = trial.parameters["x0"].as_f64().unwrap();
        let x1 = trial.parameters["x1"].as_f64().unwrap();
        (x0 - 0.5).powi(2) + (x1 - 0.25).powi(2)
    }

    fn evaluate(mut trials: Vec<Trial>) -> Vec<Trial> {
        for trial in trials.iter_mut() {
            let f = quadratic(trial);
            trial.metrics.insert("f".to_string(), f);
        }
        trials
    }

    fn fast_acqf_config() -> AcqfConfig {
        AcqfConfig {
            num_restarts: 3,
            raw_samples: 64,
            max_eval: 50,
            pop_size: 10,
            epochs: 10,
            mc_samples: 64,
            ..AcqfConfig::default()
        }
    }

    fn assert_in_bounds(trials: &[Trial]) {
        for trial in trials {
            let x0 = trial.parameters["x0"].as_f64().unwrap();
            let x1 = trial.parameters["x1"].as_f64().unwrap();
            assert!((-2. ..=2.).contains(&x0), "{trial}");
            assert!((0. ..=1.).contains(&x1), "{trial}");
        }
    }

    fn bootstrapped(config: BoConfig) -> BoDesigner {
        let problem = continuous_problem(ObjectiveMetricGoal::Minimize);
        let mut designer = BoDesigner::new(&problem, config).unwrap();
        while designer.phase() == Phase::Bootstrap {
            let trials = evaluate(designer.suggest(None).unwrap());
            designer.update(&trials).unwrap();
        }
        designer
    }

    #[test]
    fn test_bootstrap_on_mixed_space() {
        let mut space = SearchSpace::new();
        space
            .add_float_param("lr", 1e-4, 1e-1)
            .unwrap()
            .add_int_param("layers", 1, 4)
            .unwrap()
            .add_discrete_param("batch", &[16., 32., 64.])
            .unwrap()
            .add_categorical_param("act", &["relu", "tanh"])
            .unwrap();
        let mut objective = Objective::new();
        objective
            .add_metric("acc", ObjectiveMetricGoal::Maximize)
            .unwrap();
        let problem = ProblemStatement::new(space, objective);
        let mut designer = BoDesigner::new(&problem, BoConfig::default().seed(0)).unwrap();

        assert_eq!(designer.suggest(None).unwrap().len(), 1);
        let trials = designer.suggest(Some(7)).unwrap();
        assert_eq!(trials.len(), 7);
        for trial in trials.iter() {
            let lr = trial.parameters["lr"].as_f64().unwrap();
            assert!((1e-4..=1e-1).contains(&lr));
            let layers = trial.parameters["layers"].as_f64().unwrap();
            assert!((1. ..=4.).contains(&layers));
            let batch = trial.parameters["batch"].as_f64().unwrap();
            assert!([16., 32., 64.].contains(&batch));
            let act = trial.parameters["act"].to_string();
            assert!(act == "relu" || act == "tanh");
        }
        assert!(designer.trials().is_empty());
        assert_eq!(designer.phase(), Phase::Bootstrap);
    }

    #[test]
    fn test_unsupported_domain_in_model_based_phase() {
        let mut space = SearchSpace::new();
        space
            .add_float_param("x", 0., 1.)
            .unwrap()
            .add_int_param("n", 0, 3)
            .unwrap();
        let mut objective = Objective::new();
        objective
            .add_metric("f", ObjectiveMetricGoal::Minimize)
            .unwrap();
        let problem = ProblemStatement::new(space, objective);
        let mut designer = BoDesigner::new(&problem, BoConfig::default().n_init(3).seed(1)).unwrap();
        let mut trials = designer.suggest(Some(3)).unwrap();
        for trial in trials.iter_mut() {
            trial.metrics.insert("f".to_string(), 1.);
        }
        designer.update(&trials).unwrap();

        let err = designer.suggest(None).unwrap_err();
        assert!(matches!(err, BboError::UnsupportedSpecType(_)));
        assert!(err.is_unsupported_domain());
    }

    #[test]
    fn test_multi_objective_in_model_based_phase() {
        let mut space = SearchSpace::new();
        space.add_float_param("x", 0., 1.).unwrap();
        let mut objective = Objective::new();
        objective
            .add_metric("f", ObjectiveMetricGoal::Minimize)
            .unwrap()
            .add_metric("g", ObjectiveMetricGoal::Maximize)
            .unwrap();
        let problem = ProblemStatement::new(space, objective);
        let mut designer = BoDesigner::new(&problem, BoConfig::default().n_init(2).seed(2)).unwrap();
        let trials: Vec<Trial> = designer
            .suggest(Some(2))
            .unwrap()
            .into_iter()
            .map(|t| t.with_metric("f", 1.).with_metric("g", 2.))
            .collect();
        designer.update(&trials).unwrap();

        let err = designer.suggest(None).unwrap_err();
        assert!(matches!(err, BboError::UnsupportedObjective(_)));
        assert!(err.is_unsupported_domain());
    }

    #[test]
    fn test_multi_objective_with_partial_metrics() {
        let mut space = SearchSpace::new();
        space.add_float_param("x", 0., 1.).unwrap();
        let mut objective = Objective::new();
        objective
            .add_metric("f", ObjectiveMetricGoal::Minimize)
            .unwrap()
            .add_metric("g", ObjectiveMetricGoal::Maximize)
            .unwrap();
        let problem = ProblemStatement::new(space, objective);
        let mut designer = BoDesigner::new(&problem, BoConfig::default().n_init(2).seed(3)).unwrap();
        let trials: Vec<Trial> = designer
            .suggest(Some(2))
            .unwrap()
            .into_iter()
            .map(|t| t.with_metric("f", 1.))
            .collect();
        designer.update(&trials).unwrap();

        let err = designer.suggest(None).unwrap_err();
        assert!(matches!(err, BboError::UnsupportedObjective(_)));
    }

    #[test]
    fn test_invalid_config_is_rejected_at_construction() {
        let problem = continuous_problem(ObjectiveMetricGoal::Minimize);
        let config = BoConfig::default().acqf(AcqfSpec::Multi(vec![AcqfType::QEi, AcqfType::QUcb]));
        let err = BoDesigner::new(&problem, config).err().unwrap();
        assert!(err.is_configuration_error());
    }

    #[test]
    #[serial]
    fn test_gradient_batches() {
        init_logger();
        let mut designer = bootstrapped(
            BoConfig::default()
                .n_init(5)
                .q(2)
                .seed(42)
                .acqf_config(fast_acqf_config()),
        );
        assert_eq!(designer.phase(), Phase::ModelBased);
        assert_eq!(designer.trials().len(), 5);

        let mut n_trials = 5;
        for _ in 0..3 {
            let trials = designer.suggest(None).unwrap();
            assert_eq!(trials.len(), 2);
            assert_in_bounds(&trials);
            let trials = evaluate(trials);
            designer.update(&trials).unwrap();
            n_trials += trials.len();
            assert_eq!(designer.trials().len(), n_trials);
        }
        assert!(designer.suggest(Some(2)).is_ok());
        assert!(matches!(
            designer.suggest(Some(3)),
            Err(BboError::InvalidValue(_))
        ));
    }

    #[test]
    #[serial]
    fn test_batch_acquisitions_with_parallel_device() {
        for acqf in [AcqfType::QUcb, AcqfType::QPi, AcqfType::QLogEi] {
            let mut designer = bootstrapped(
                BoConfig::default()
                    .n_init(4)
                    .q(3)
                    .seed(7)
                    .device(Device::Parallel)
                    .acqf(AcqfSpec::Single(acqf))
                    .acqf_config(fast_acqf_config()),
            );
            let trials = designer.suggest(None).unwrap();
            assert_eq!(trials.len(), 3, "{acqf}");
            assert_in_bounds(&trials);
        }
    }

    #[test]
    #[serial]
    fn test_minimization_progress() {
        let mut designer = bootstrapped(
            BoConfig::default()
                .n_init(5)
                .seed(3)
                .acqf_config(AcqfConfig {
                    raw_samples: 256,
                    ..AcqfConfig::default()
                }),
        );
        for _ in 0..10 {
            let trials = evaluate(designer.suggest(None).unwrap());
            designer.update(&trials).unwrap();
        }
        let best = designer
            .trials()
            .iter()
            .map(|t| t.metrics["f"])
            .fold(f64::INFINITY, f64::min);
        assert!(best < 0.1, "best value {best}");
    }

    #[test]
    #[serial]
    fn test_evolutionary_batches() {
        init_logger();
        let mut designer = bootstrapped(
            BoConfig::default()
                .n_init(5)
                .q(4)
                .seed(11)
                .acqf(AcqfSpec::Multi(vec![AcqfType::QEi, AcqfType::QUcb, AcqfType::QPi]))
                .acqf_optimizer(AcqfOptimizer::Evolutionary)
                .acqf_config(fast_acqf_config()),
        );
        for _ in 0..2 {
            let trials = designer.suggest(None).unwrap();
            assert_eq!(trials.len(), 4);
            assert_in_bounds(&trials);
            designer.update(&evaluate(trials)).unwrap();
        }
        assert_eq!(designer.trials().len(), 13);
    }

    /// Population designer with an empty population
    struct Barren;

    impl Designer for Barren {
        fn suggest(&mut self, _count: Option<usize>) -> Result<Vec<Trial>> {
            Ok(vec![])
        }

        fn update(&mut self, _completed: &[Trial]) -> Result<()> {
            Ok(())
        }
    }

    impl PopulationDesigner for Barren {
        fn result(&self) -> (Array2<f64>, Array2<f64>) {
            (Array2::zeros((0, 2)), Array2::zeros((0, 1)))
        }

        fn curr_pop(&self) -> (Array2<f64>, Array2<f64>) {
            (Array2::zeros((0, 2)), Array2::zeros((0, 1)))
        }
    }

    struct BarrenFactory;

    impl PopulationDesignerFactory for BarrenFactory {
        fn create(
            &self,
            _problem: &ProblemStatement,
            _params: &EvolutionaryParams,
            _seed: u64,
        ) -> Result<Box<dyn PopulationDesigner>> {
            Ok(Box::new(Barren))
        }
    }

    #[test]
    fn test_random_fill_from_bootstrap_sampler() {
        let problem = continuous_problem(ObjectiveMetricGoal::Maximize);
        let config = BoConfig::default()
            .n_init(3)
            .q(5)
            .seed(5)
            .acqf_optimizer(AcqfOptimizer::Evolutionary)
            .acqf_config(fast_acqf_config());
        let mut designer = BoDesigner::new(&problem, config)
            .unwrap()
            .population_factory(Box::new(BarrenFactory));
        let trials = evaluate(designer.suggest(Some(3)).unwrap());
        designer.update(&trials).unwrap();

        let trials = designer.suggest(None).unwrap();
        assert_eq!(trials.len(), 5);
        assert_in_bounds(&trials);
    }
}
