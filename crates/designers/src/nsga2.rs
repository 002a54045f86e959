//! NSGA-II population designer over continuous search spaces.
use crate::converter::{DefaultTrialConverter, FeaturesByType, SpecType};
use crate::designer::{Designer, PopulationDesigner};
use crate::errors::{BboError, Result};
use crate::pareto::{fast_non_dominated_sort, rank_and_crowding};
use crate::problem::{ObjectiveMetricGoal, ProblemStatement};
use crate::trial::Trial;
use bbo_doe::{Lhs, SamplingMethod};
use log::debug;
use ndarray::{concatenate, Array1, Array2, Axis};
use ndarray_rand::rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256Plus;
use std::cmp::Ordering;

/// Default population size
pub const NSGA2_POP_SIZE: usize = 20;
const CROSSOVER_PROB: f64 = 0.9;
const CROSSOVER_ETA: f64 = 15.;
const MUTATION_ETA: f64 = 20.;

/// NSGA-II designer.
///
/// The first `suggest` returns a latin hypercube initial population, later
/// calls return offspring bred from the current population by binary tournament
/// on (rank, crowding distance), SBX crossover and polynomial mutation.
/// `update` merges evaluated trials into the population and keeps the
/// `pop_size` best by non-domination rank then crowding distance.
#[derive(Clone, Debug)]
pub struct Nsga2Designer {
    converter: DefaultTrialConverter,
    xlimits: Array2<f64>,
    /// Sign turning every metric into a maximized one
    orientation: Array1<f64>,
    pop_size: usize,
    n_offsprings: usize,
    crossover_prob: f64,
    crossover_eta: f64,
    mutation_eta: f64,
    pop_x: Array2<f64>,
    pop_y: Array2<f64>,
    rng: Xoshiro256Plus,
}

impl Nsga2Designer {
    /// NSGA-II designer for `problem` which should only declare double parameters.
    pub fn new(problem: &ProblemStatement) -> Result<Self> {
        if !problem.search_space.is_continuous() {
            return Err(BboError::UnsupportedSpecType(
                "NSGA-II designer only handles double parameters".to_string(),
            ));
        }
        if problem.objective.num_metrics() == 0 {
            return Err(BboError::InvalidValue(
                "NSGA-II designer requires at least one metric".to_string(),
            ));
        }
        let converter = DefaultTrialConverter::from_problem(problem);
        let spec = converter.output_spec();
        let mut xlimits = Array2::zeros((spec.len(), 2));
        for (mut row, s) in xlimits.rows_mut().into_iter().zip(spec.iter()) {
            row[0] = s.bounds.0;
            row[1] = s.bounds.1;
        }
        let orientation = problem
            .objective
            .metrics()
            .iter()
            .map(|m| match m.goal {
                ObjectiveMetricGoal::Maximize => 1.,
                ObjectiveMetricGoal::Minimize => -1.,
            })
            .collect();
        let (nx, ny) = (spec.len(), problem.objective.num_metrics());
        Ok(Nsga2Designer {
            converter,
            xlimits,
            orientation,
            pop_size: NSGA2_POP_SIZE,
            n_offsprings: NSGA2_POP_SIZE,
            crossover_prob: CROSSOVER_PROB,
            crossover_eta: CROSSOVER_ETA,
            mutation_eta: MUTATION_ETA,
            pop_x: Array2::zeros((0, nx)),
            pop_y: Array2::zeros((0, ny)),
            rng: Xoshiro256Plus::from_entropy(),
        })
    }

    /// Set the population size
    pub fn pop_size(mut self, pop_size: usize) -> Self {
        self.pop_size = pop_size;
        self.n_offsprings = pop_size;
        self
    }

    /// Set the number of offsprings per generation, population size when `None`
    pub fn n_offsprings(mut self, n_offsprings: Option<usize>) -> Self {
        self.n_offsprings = n_offsprings.unwrap_or(self.pop_size);
        self
    }

    /// Set SBX crossover probability and distribution index
    pub fn crossover(mut self, prob: f64, eta: f64) -> Self {
        self.crossover_prob = prob;
        self.crossover_eta = eta;
        self
    }

    /// Set polynomial mutation distribution index
    pub fn mutation_eta(mut self, eta: f64) -> Self {
        self.mutation_eta = eta;
        self
    }

    /// Set the seed of the random generator
    pub fn seed(mut self, seed: u64) -> Self {
        self.rng = Xoshiro256Plus::seed_from_u64(seed);
        self
    }

    fn initial_population(&mut self, n: usize) -> Array2<f64> {
        let rng = Xoshiro256Plus::seed_from_u64(self.rng.gen());
        Lhs::new(&self.xlimits).with_rng(rng).sample(n)
    }

    fn offsprings(&mut self, n: usize) -> Array2<f64> {
        let oriented = &self.pop_y * &self.orientation;
        let (rank, crowding) = rank_and_crowding(&oriented);
        let nparents = self.pop_x.nrows();

        let mut children = Vec::with_capacity(n + 1);
        while children.len() < n {
            let p1 = self.tournament(&rank, &crowding, nparents);
            let p2 = self.tournament(&rank, &crowding, nparents);
            let (mut c1, mut c2) = self.crossover_pair(p1, p2);
            self.mutate(&mut c1);
            self.mutate(&mut c2);
            children.push(c1);
            if children.len() < n {
                children.push(c2);
            }
        }
        let mut x = Array2::zeros((n, self.xlimits.nrows()));
        for (mut row, child) in x.rows_mut().into_iter().zip(children) {
            row.assign(&child);
        }
        x
    }

    /// Winner of two random individuals: lower rank, then larger crowding
    fn tournament(&mut self, rank: &[usize], crowding: &[f64], n: usize) -> usize {
        let a = self.rng.gen_range(0..n);
        let b = self.rng.gen_range(0..n);
        match rank[a].cmp(&rank[b]) {
            Ordering::Less => a,
            Ordering::Greater => b,
            Ordering::Equal if crowding[a] >= crowding[b] => a,
            Ordering::Equal => b,
        }
    }

    fn crossover_pair(&mut self, p1: usize, p2: usize) -> (Array1<f64>, Array1<f64>) {
        let mut c1 = self.pop_x.row(p1).to_owned();
        let mut c2 = self.pop_x.row(p2).to_owned();
        if self.rng.gen::<f64>() > self.crossover_prob {
            return (c1, c2);
        }
        for i in 0..c1.len() {
            let (x1, x2) = (c1[i], c2[i]);
            if (x1 - x2).abs() < 1e-14 {
                continue;
            }
            let (lb, ub) = (self.xlimits[[i, 0]], self.xlimits[[i, 1]]);
            let u: f64 = self.rng.gen();
            let beta = if u <= 0.5 {
                (2. * u).powf(1. / (self.crossover_eta + 1.))
            } else {
                (1. / (2. * (1. - u))).powf(1. / (self.crossover_eta + 1.))
            };
            c1[i] = (0.5 * ((1. + beta) * x1 + (1. - beta) * x2)).clamp(lb, ub);
            c2[i] = (0.5 * ((1. - beta) * x1 + (1. + beta) * x2)).clamp(lb, ub);
        }
        (c1, c2)
    }

    /// Polynomial mutation, each component mutated with probability 1/d
    fn mutate(&mut self, x: &mut Array1<f64>) {
        let prob = 1. / x.len() as f64;
        for i in 0..x.len() {
            if self.rng.gen::<f64>() >= prob {
                continue;
            }
            let (lb, ub) = (self.xlimits[[i, 0]], self.xlimits[[i, 1]]);
            let range = ub - lb;
            if range <= 0. {
                continue;
            }
            let u: f64 = self.rng.gen();
            let eta = self.mutation_eta;
            let delta_q = if u < 0.5 {
                let xy = 1. - (x[i] - lb) / range;
                let val = 2. * u + (1. - 2. * u) * xy.powf(eta + 1.);
                val.powf(1. / (eta + 1.)) - 1.
            } else {
                let xy = 1. - (ub - x[i]) / range;
                let val = 2. * (1. - u) + 2. * (u - 0.5) * xy.powf(eta + 1.);
                1. - val.powf(1. / (eta + 1.))
            };
            x[i] = (x[i] + delta_q * range).clamp(lb, ub);
        }
    }

    /// Keep the `pop_size` best individuals by rank then crowding distance
    fn select_survivors(&mut self, x: Array2<f64>, y: Array2<f64>) {
        let oriented = &y * &self.orientation;
        let fronts = fast_non_dominated_sort(&oriented);
        let mut selected: Vec<usize> = Vec::with_capacity(self.pop_size);
        for front in fronts.iter() {
            if selected.len() + front.len() <= self.pop_size {
                selected.extend_from_slice(front);
            } else {
                let remaining = self.pop_size - selected.len();
                let cd = crate::pareto::crowding_distance(front, &oriented);
                let mut order: Vec<usize> = (0..front.len()).collect();
                order.sort_by(|&a, &b| cd[b].partial_cmp(&cd[a]).unwrap_or(Ordering::Equal));
                selected.extend(order.iter().take(remaining).map(|&k| front[k]));
                break;
            }
        }
        self.pop_x = x.select(Axis(0), &selected);
        self.pop_y = y.select(Axis(0), &selected);
    }

    fn to_trials(&self, x: Array2<f64>) -> Result<Vec<Trial>> {
        let mut features = FeaturesByType::new();
        features.insert(SpecType::Double, x);
        self.converter.to_trials(&features)
    }
}

impl Designer for Nsga2Designer {
    /// Initial population or offsprings of the current one, `count` defaulting
    /// to the population size or the number of offsprings.
    fn suggest(&mut self, count: Option<usize>) -> Result<Vec<Trial>> {
        let x = if self.pop_x.nrows() < 2 {
            let n = count.unwrap_or(self.pop_size);
            self.initial_population(n)
        } else {
            let n = count.unwrap_or(self.n_offsprings);
            self.offsprings(n)
        };
        self.to_trials(x)
    }

    fn update(&mut self, completed: &[Trial]) -> Result<()> {
        if completed.is_empty() {
            return Ok(());
        }
        let (features, _) = self.converter.convert(completed)?;
        let x = features
            .get(&SpecType::Double)
            .cloned()
            .ok_or_else(|| BboError::InvalidValue("no double features".to_string()))?;
        // raw metric values in objective order
        let y = self.converter.to_labels(completed)? * &self.orientation;

        let x = concatenate(Axis(0), &[self.pop_x.view(), x.view()])
            .map_err(|e| BboError::InvalidValue(e.to_string()))?;
        let y = concatenate(Axis(0), &[self.pop_y.view(), y.view()])
            .map_err(|e| BboError::InvalidValue(e.to_string()))?;
        self.select_survivors(x, y);
        debug!(
            "NSGA-II population updated: {} individuals",
            self.pop_x.nrows()
        );
        Ok(())
    }
}

impl PopulationDesigner for Nsga2Designer {
    fn result(&self) -> (Array2<f64>, Array2<f64>) {
        let oriented = &self.pop_y * &self.orientation;
        let fronts = fast_non_dominated_sort(&oriented);
        match fronts.first() {
            Some(front) => (
                self.pop_x.select(Axis(0), front),
                self.pop_y.select(Axis(0), front),
            ),
            None => (self.pop_x.clone(), self.pop_y.clone()),
        }
    }

    fn curr_pop(&self) -> (Array2<f64>, Array2<f64>) {
        (self.pop_x.clone(), self.pop_y.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::experimenter::FunctionExperimenter;
    use crate::problem::{Objective, SearchSpace};
    use ndarray::{Array2, ArrayView2, Zip};

    fn two_objectives() -> ProblemStatement {
        let mut sp = SearchSpace::new();
        sp.add_float_param("x0", 0., 1.)
            .unwrap()
            .add_float_param("x1", 0., 1.)
            .unwrap();
        let mut obj = Objective::new();
        obj.add_metric("f1", ObjectiveMetricGoal::Minimize)
            .unwrap()
            .add_metric("f2", ObjectiveMetricGoal::Minimize)
            .unwrap();
        ProblemStatement::new(sp, obj)
    }

    // ZDT1, Pareto set is x1 = 0
    fn zdt1(x: &ArrayView2<f64>) -> Array2<f64> {
        let mut y = Array2::zeros((x.nrows(), 2));
        Zip::from(y.rows_mut())
            .and(x.rows())
            .for_each(|mut yi, xi| {
                let g = 1. + 9. * xi[1];
                yi[0] = xi[0];
                yi[1] = g * (1. - (xi[0] / g).sqrt());
            });
        y
    }

    #[test]
    fn test_nsga2_rejects_non_continuous() {
        let mut sp = SearchSpace::new();
        sp.add_int_param("n", 0, 3).unwrap();
        let mut obj = Objective::new();
        obj.add_metric("f", ObjectiveMetricGoal::Maximize).unwrap();
        let res = Nsga2Designer::new(&ProblemStatement::new(sp, obj));
        assert!(matches!(res, Err(BboError::UnsupportedSpecType(_))));
    }

    #[test]
    fn test_nsga2_converges_towards_pareto_set() {
        let problem = two_objectives();
        let experimenter = FunctionExperimenter::new(zdt1, &problem);
        let mut designer = Nsga2Designer::new(&problem).unwrap().pop_size(16).seed(42);
        for _ in 0..60 {
            let mut trials = designer.suggest(None).unwrap();
            experimenter.evaluate(&mut trials).unwrap();
            designer.update(&trials).unwrap();
        }
        let (pop_x, pop_y) = designer.curr_pop();
        assert_eq!(pop_x.dim(), (16, 2));
        assert_eq!(pop_y.dim(), (16, 2));
        let (pareto_x, _) = designer.result();
        assert!(pareto_x.nrows() >= 1);
        assert!(pareto_x.column(1).mean().unwrap() < 0.2);
        assert!(pop_x.iter().all(|&v| (0. ..=1.).contains(&v)));
    }

    #[test]
    fn test_offsprings_count() {
        let problem = two_objectives();
        let experimenter = FunctionExperimenter::new(zdt1, &problem);
        let mut designer = Nsga2Designer::new(&problem)
            .unwrap()
            .pop_size(10)
            .n_offsprings(Some(5))
            .seed(0);
        let mut init = designer.suggest(None).unwrap();
        assert_eq!(init.len(), 10);
        experimenter.evaluate(&mut init).unwrap();
        designer.update(&init).unwrap();
        assert_eq!(designer.suggest(None).unwrap().len(), 5);
        assert_eq!(designer.suggest(Some(3)).unwrap().len(), 3);
    }
}
