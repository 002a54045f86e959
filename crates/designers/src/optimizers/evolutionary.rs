use crate::criteria::AcquisitionFunction;
use crate::designer::PopulationDesigner;
use crate::errors::{BboError, Result};
use crate::experimenter::FunctionExperimenter;
use crate::nsga2::{Nsga2Designer, NSGA2_POP_SIZE};
use crate::optimizers::batch::{assemble_batch, set_difference, SET_DIFFERENCE_TOL};
use crate::problem::{ObjectiveMetricGoal, Objective, ProblemStatement, SearchSpace};
use log::{debug, info, warn};
use ndarray::{Array2, ArrayView2, Axis, Zip};
use ndarray_rand::rand::Rng;

/// Default number of generations
pub const EPOCHS: usize = 200;

/// Settings of the evolutionary acquisition optimizer
#[derive(Clone, Debug)]
pub struct EvolutionaryParams {
    /// Population size
    pub pop_size: usize,
    /// Offsprings per generation, population size when `None`
    pub n_offsprings: Option<usize>,
    /// Number of generations
    pub epochs: usize,
    /// Evaluate the population on the rayon thread pool
    pub parallel: bool,
}

impl Default for EvolutionaryParams {
    fn default() -> Self {
        EvolutionaryParams {
            pop_size: NSGA2_POP_SIZE,
            n_offsprings: None,
            epochs: EPOCHS,
            parallel: false,
        }
    }
}

/// Builds the population designer searching the acquisition landscape.
pub trait PopulationDesignerFactory: Send + Sync {
    /// Designer for `problem` whose metrics are the acquisition values
    fn create(
        &self,
        problem: &ProblemStatement,
        params: &EvolutionaryParams,
        seed: u64,
    ) -> Result<Box<dyn PopulationDesigner>>;
}

/// [Nsga2Designer] factory
#[derive(Clone, Copy, Debug, Default)]
pub struct Nsga2Factory;

impl PopulationDesignerFactory for Nsga2Factory {
    fn create(
        &self,
        problem: &ProblemStatement,
        params: &EvolutionaryParams,
        seed: u64,
    ) -> Result<Box<dyn PopulationDesigner>> {
        let designer = Nsga2Designer::new(problem)?
            .pop_size(params.pop_size)
            .n_offsprings(params.n_offsprings)
            .seed(seed);
        Ok(Box::new(designer))
    }
}

/// Problem over `search_space` maximizing one metric per acquisition function
fn acqf_problem(
    search_space: &SearchSpace,
    acqfs: &[Box<dyn AcquisitionFunction>],
) -> Result<ProblemStatement> {
    let mut objective = Objective::new();
    for acqf in acqfs {
        objective.add_metric(acqf.name(), ObjectiveMetricGoal::Maximize)?;
    }
    Ok(ProblemStatement::new(search_space.clone(), objective))
}

/// Acquisition values `(n, n_acqfs)` of each point of `x` taken alone
fn evaluate_acqfs(
    acqfs: &[Box<dyn AcquisitionFunction>],
    x: &ArrayView2<f64>,
    parallel: bool,
) -> Array2<f64> {
    let mut y = Array2::zeros((x.nrows(), acqfs.len()));
    let eval = |mut yi: ndarray::ArrayViewMut1<f64>, xi: ndarray::ArrayView1<f64>| {
        let xi = xi.insert_axis(Axis(0));
        for (v, acqf) in yi.iter_mut().zip(acqfs) {
            *v = acqf.value(&xi);
        }
    };
    if parallel {
        Zip::from(y.rows_mut()).and(x.rows()).par_for_each(eval);
    } else {
        Zip::from(y.rows_mut()).and(x.rows()).for_each(eval);
    }
    y
}

/// Maximize the acquisition functions jointly with a population designer and
/// return a batch of exactly `q` points, feature columns in `search_space`
/// declaration order.
///
/// Each acquisition function is an objective evaluated point by point. After
/// `epochs` generations the batch is made of the Pareto points, completed if
/// needed by other population points then by `random_fill` points.
pub fn optimize_acqf_evolutionary<R: Rng, F>(
    acqfs: &[Box<dyn AcquisitionFunction>],
    search_space: &SearchSpace,
    q: usize,
    params: &EvolutionaryParams,
    factory: &dyn PopulationDesignerFactory,
    rng: &mut R,
    random_fill: F,
) -> Result<Array2<f64>>
where
    F: FnOnce(usize) -> Result<Array2<f64>>,
{
    if acqfs.is_empty() {
        return Err(BboError::InvalidValue(
            "no acquisition function to optimize".to_string(),
        ));
    }
    if acqfs.len() == 1 {
        warn!("NSGA-II is a multi-objective optimization algorithm, but only single objective is defined");
    }
    let problem = acqf_problem(search_space, acqfs)?;
    let mut designer = factory.create(&problem, params, rng.gen())?;
    let experimenter = FunctionExperimenter::new(
        |x: &ArrayView2<f64>| evaluate_acqfs(acqfs, x, params.parallel),
        &problem,
    );

    info!(
        "Evolutionary optimization of {:?} over {} generations",
        acqfs,
        params.epochs
    );
    for epoch in 0..params.epochs {
        let mut trials = designer.suggest(None)?;
        experimenter.evaluate(&mut trials)?;
        designer.update(&trials)?;
        if epoch % 50 == 0 {
            debug!("Generation {epoch}: {} candidates evaluated", trials.len());
        }
    }

    let (pareto_x, _) = designer.result();
    let (pop_x, _) = designer.curr_pop();
    let diff_x = set_difference(&pop_x, &pareto_x, SET_DIFFERENCE_TOL);
    debug!(
        "Population of {} with {} Pareto points",
        pop_x.nrows(),
        pareto_x.nrows()
    );
    assemble_batch(&pareto_x, &diff_x, q, rng, random_fill)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::designer::Designer;
    use crate::trial::Trial;
    use ndarray::array;
    use ndarray_rand::rand::SeedableRng;
    use rand_xoshiro::Xoshiro256Plus;

    struct Peak(f64);

    impl AcquisitionFunction for Peak {
        fn name(&self) -> &'static str {
            if self.0 < 0.5 {
                "low"
            } else {
                "high"
            }
        }

        fn value(&self, x: &ArrayView2<f64>) -> f64 {
            -x.iter().map(|v| (v - self.0).powi(2)).sum::<f64>()
        }
    }

    fn space() -> SearchSpace {
        let mut sp = SearchSpace::new();
        sp.add_float_param("x", 0., 1.).unwrap();
        sp
    }

    fn uniform_fill(n: usize) -> Result<Array2<f64>> {
        Ok(Array2::from_elem((n, 1), 0.5))
    }

    #[test]
    fn test_conflicting_acqfs() {
        let acqfs: Vec<Box<dyn AcquisitionFunction>> = vec![Box::new(Peak(0.2)), Box::new(Peak(0.8))];
        let params = EvolutionaryParams {
            pop_size: 12,
            epochs: 30,
            ..EvolutionaryParams::default()
        };
        let mut rng = Xoshiro256Plus::seed_from_u64(0);
        let x = optimize_acqf_evolutionary(&acqfs, &space(), 4, &params, &Nsga2Factory, &mut rng, uniform_fill)
            .unwrap();
        assert_eq!(x.dim(), (4, 1));
        // Pareto set of the two peaks is [0.2, 0.8]
        assert!(x.iter().all(|v| (0.1..=0.9).contains(v)));
    }

    #[test]
    fn test_single_acqf_batch_is_filled() {
        let acqfs: Vec<Box<dyn AcquisitionFunction>> = vec![Box::new(Peak(0.3))];
        let params = EvolutionaryParams {
            pop_size: 8,
            epochs: 10,
            parallel: true,
            ..EvolutionaryParams::default()
        };
        let mut rng = Xoshiro256Plus::seed_from_u64(1);
        let x = optimize_acqf_evolutionary(&acqfs, &space(), 3, &params, &Nsga2Factory, &mut rng, uniform_fill)
            .unwrap();
        assert_eq!(x.dim(), (3, 1));
    }

    /// Population designer with a fixed population
    struct Frozen {
        pop: Array2<f64>,
        pareto: Array2<f64>,
    }

    impl Designer for Frozen {
        fn suggest(&mut self, _count: Option<usize>) -> Result<Vec<Trial>> {
            Ok(vec![])
        }

        fn update(&mut self, _completed: &[Trial]) -> Result<()> {
            Ok(())
        }
    }

    impl PopulationDesigner for Frozen {
        fn result(&self) -> (Array2<f64>, Array2<f64>) {
            (self.pareto.clone(), Array2::zeros((self.pareto.nrows(), 1)))
        }

        fn curr_pop(&self) -> (Array2<f64>, Array2<f64>) {
            (self.pop.clone(), Array2::zeros((self.pop.nrows(), 1)))
        }
    }

    struct FrozenFactory;

    impl PopulationDesignerFactory for FrozenFactory {
        fn create(
            &self,
            _problem: &ProblemStatement,
            _params: &EvolutionaryParams,
            _seed: u64,
        ) -> Result<Box<dyn PopulationDesigner>> {
            Ok(Box::new(Frozen {
                pop: array![[0.1], [0.2], [0.3]],
                pareto: array![[0.2]],
            }))
        }
    }

    #[test]
    fn test_batch_assembly_from_injected_designer() {
        let acqfs: Vec<Box<dyn AcquisitionFunction>> = vec![Box::new(Peak(0.2))];
        let params = EvolutionaryParams {
            epochs: 2,
            ..EvolutionaryParams::default()
        };
        let mut rng = Xoshiro256Plus::seed_from_u64(2);

        let x = optimize_acqf_evolutionary(&acqfs, &space(), 1, &params, &FrozenFactory, &mut rng, uniform_fill)
            .unwrap();
        assert_eq!(x, array![[0.2]]);

        let x = optimize_acqf_evolutionary(&acqfs, &space(), 5, &params, &FrozenFactory, &mut rng, uniform_fill)
            .unwrap();
        assert_eq!(x.nrows(), 5);
        assert_eq!(x[[0, 0]], 0.2);
        let mut diversity = vec![x[[1, 0]], x[[2, 0]]];
        diversity.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert_eq!(diversity, vec![0.1, 0.3]);
        assert_eq!(x[[3, 0]], 0.5);
        assert_eq!(x[[4, 0]], 0.5);
    }
}
