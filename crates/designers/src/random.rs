use crate::designer::Designer;
use crate::errors::Result;
use crate::problem::{ParameterDomain, ParameterType, ProblemStatement};
use crate::trial::{ParameterValue, Trial};
use ndarray_rand::rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256Plus;

/// Designer sampling each parameter uniformly over its domain
#[derive(Clone, Debug)]
pub struct RandomDesigner {
    problem: ProblemStatement,
    rng: Xoshiro256Plus,
}

impl RandomDesigner {
    /// Random designer seeded from system entropy
    pub fn new(problem: &ProblemStatement) -> Self {
        Self::new_with_rng(problem, Xoshiro256Plus::from_entropy())
    }

    /// Random designer driven by `rng`
    pub fn new_with_rng(problem: &ProblemStatement, rng: Xoshiro256Plus) -> Self {
        RandomDesigner {
            problem: problem.clone(),
            rng,
        }
    }

    /// Set the seed of the random generator
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = Xoshiro256Plus::seed_from_u64(seed);
        self
    }

    fn sample_trial(&mut self) -> Trial {
        let mut trial = Trial::new();
        for param in self.problem.search_space.parameters() {
            let value = match (param.param_type(), param.domain()) {
                (ParameterType::Integer, ParameterDomain::Bounds(lb, ub)) => {
                    ParameterValue::Int(self.rng.gen_range(*lb as i64..=*ub as i64))
                }
                (_, ParameterDomain::Bounds(lb, ub)) => {
                    let u: f64 = self.rng.gen();
                    ParameterValue::Float(lb + u * (ub - lb))
                }
                (_, ParameterDomain::FeasibleValues(values)) => {
                    ParameterValue::Float(values[self.rng.gen_range(0..values.len())])
                }
                (_, ParameterDomain::Categories(categories)) => ParameterValue::Str(
                    categories[self.rng.gen_range(0..categories.len())].clone(),
                ),
            };
            trial.parameters.insert(param.name().to_string(), value);
        }
        trial
    }
}

impl Designer for RandomDesigner {
    fn suggest(&mut self, count: Option<usize>) -> Result<Vec<Trial>> {
        let count = count.unwrap_or(1);
        Ok((0..count).map(|_| self.sample_trial()).collect())
    }

    /// Random sampling does not learn from observations
    fn update(&mut self, _completed: &[Trial]) -> Result<()> {
        Ok(())
    }
}
