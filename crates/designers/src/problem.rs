//! Search space and objective declarations of a black-box optimization problem.
use crate::errors::{BboError, Result};
use serde::{Deserialize, Serialize};

/// Kind of a search space parameter
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterType {
    /// Continuous value within bounds
    Double,
    /// Integer value within bounds
    Integer,
    /// Value taken from a finite sorted set of numbers
    Discrete,
    /// Label taken from a finite set of categories
    Categorical,
}

/// Domain of a parameter, consistent with its [ParameterType]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterDomain {
    /// `[lower, upper]` bounds of double and integer parameters
    Bounds(f64, f64),
    /// Sorted feasible values of a discrete parameter
    FeasibleValues(Vec<f64>),
    /// Labels of a categorical parameter
    Categories(Vec<String>),
}

/// A named parameter of the search space
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ParameterConfig {
    name: String,
    #[serde(rename = "type")]
    param_type: ParameterType,
    domain: ParameterDomain,
}

impl ParameterConfig {
    /// Parameter name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Parameter type
    pub fn param_type(&self) -> ParameterType {
        self.param_type
    }

    /// Parameter domain
    pub fn domain(&self) -> &ParameterDomain {
        &self.domain
    }

    /// Numeric `(lower, upper)` bounds of the parameter: bounds for double and
    /// integer, min/max of feasible values for discrete, category index range
    /// for categorical.
    pub fn bounds(&self) -> (f64, f64) {
        match &self.domain {
            ParameterDomain::Bounds(lb, ub) => (*lb, *ub),
            ParameterDomain::FeasibleValues(values) => {
                (values[0], values[values.len() - 1])
            }
            ParameterDomain::Categories(categories) => (0., (categories.len() - 1) as f64),
        }
    }

    /// Check the domain against the parameter type, sorting discrete values
    fn validated(mut self) -> Result<Self> {
        let name = &self.name;
        match (self.param_type, &mut self.domain) {
            (ParameterType::Double | ParameterType::Integer, ParameterDomain::Bounds(lb, ub)) => {
                check_bounds(name, *lb, *ub)?
            }
            (ParameterType::Discrete, ParameterDomain::FeasibleValues(values)) => {
                check_feasible_values(name, values)?;
                values.sort_by(|a, b| a.total_cmp(b));
                values.dedup();
            }
            (ParameterType::Categorical, ParameterDomain::Categories(categories)) => {
                check_categories(name, categories.len())?
            }
            (param_type, domain) => {
                return Err(BboError::InvalidValue(format!(
                    "parameter `{name}` of type {param_type:?} cannot have domain {domain:?}"
                )))
            }
        }
        Ok(self)
    }
}

#[derive(Deserialize)]
struct RawSearchSpace {
    parameters: Vec<ParameterConfig>,
}

impl TryFrom<RawSearchSpace> for SearchSpace {
    type Error = BboError;

    fn try_from(raw: RawSearchSpace) -> Result<Self> {
        let mut space = SearchSpace::new();
        for param in raw.parameters {
            space.push(param.validated()?)?;
        }
        Ok(space)
    }
}

/// Ordered set of uniquely named parameters
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawSearchSpace")]
pub struct SearchSpace {
    parameters: Vec<ParameterConfig>,
}

impl SearchSpace {
    /// Empty search space
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, param: ParameterConfig) -> Result<&mut Self> {
        if self.get(&param.name).is_some() {
            return Err(BboError::InvalidValue(format!(
                "duplicate parameter name `{}`",
                param.name
            )));
        }
        self.parameters.push(param);
        Ok(self)
    }

    /// Add a continuous parameter within `[lb, ub]`
    pub fn add_float_param(&mut self, name: &str, lb: f64, ub: f64) -> Result<&mut Self> {
        check_bounds(name, lb, ub)?;
        self.push(ParameterConfig {
            name: name.to_string(),
            param_type: ParameterType::Double,
            domain: ParameterDomain::Bounds(lb, ub),
        })
    }

    /// Add an integer parameter within `[lb, ub]`
    pub fn add_int_param(&mut self, name: &str, lb: i64, ub: i64) -> Result<&mut Self> {
        check_bounds(name, lb as f64, ub as f64)?;
        self.push(ParameterConfig {
            name: name.to_string(),
            param_type: ParameterType::Integer,
            domain: ParameterDomain::Bounds(lb as f64, ub as f64),
        })
    }

    /// Add a parameter taking one of the given numeric values
    pub fn add_discrete_param(&mut self, name: &str, feasible_values: &[f64]) -> Result<&mut Self> {
        check_feasible_values(name, feasible_values)?;
        let mut values = feasible_values.to_vec();
        values.sort_by(|a, b| a.total_cmp(b));
        values.dedup();
        self.push(ParameterConfig {
            name: name.to_string(),
            param_type: ParameterType::Discrete,
            domain: ParameterDomain::FeasibleValues(values),
        })
    }

    /// Add a parameter taking one of the given labels
    pub fn add_categorical_param(&mut self, name: &str, categories: &[&str]) -> Result<&mut Self> {
        check_categories(name, categories.len())?;
        self.push(ParameterConfig {
            name: name.to_string(),
            param_type: ParameterType::Categorical,
            domain: ParameterDomain::Categories(
                categories.iter().map(|c| c.to_string()).collect(),
            ),
        })
    }

    /// Parameters in declaration order
    pub fn parameters(&self) -> &[ParameterConfig] {
        &self.parameters
    }

    /// Parameter named `name`
    pub fn get(&self, name: &str) -> Option<&ParameterConfig> {
        self.parameters.iter().find(|p| p.name == name)
    }

    /// Number of parameters
    pub fn num_parameters(&self) -> usize {
        self.parameters.len()
    }

    /// Whether all parameters are continuous
    pub fn is_continuous(&self) -> bool {
        self.parameters
            .iter()
            .all(|p| p.param_type == ParameterType::Double)
    }
}

fn check_bounds(name: &str, lb: f64, ub: f64) -> Result<()> {
    if !(lb.is_finite() && ub.is_finite() && lb <= ub) {
        return Err(BboError::InvalidValue(format!(
            "parameter `{name}` requires finite bounds with lb <= ub, got [{lb}, {ub}]"
        )));
    }
    Ok(())
}

fn check_feasible_values(name: &str, values: &[f64]) -> Result<()> {
    if values.is_empty() || values.iter().any(|v| !v.is_finite()) {
        return Err(BboError::InvalidValue(format!(
            "discrete parameter `{name}` requires finite feasible values"
        )));
    }
    Ok(())
}

fn check_categories(name: &str, n_categories: usize) -> Result<()> {
    if n_categories == 0 {
        return Err(BboError::InvalidValue(format!(
            "categorical parameter `{name}` requires at least one category"
        )));
    }
    Ok(())
}

/// Optimization direction of a metric
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectiveMetricGoal {
    /// Larger is better
    Maximize,
    /// Smaller is better
    Minimize,
}

/// A named metric with its optimization direction
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricInformation {
    /// Metric name
    pub name: String,
    /// Optimization direction
    pub goal: ObjectiveMetricGoal,
}

/// Ordered set of uniquely named metrics
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawObjective")]
pub struct Objective {
    metrics: Vec<MetricInformation>,
}

impl Objective {
    /// Objective without metric
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a metric to optimize
    pub fn add_metric(&mut self, name: &str, goal: ObjectiveMetricGoal) -> Result<&mut Self> {
        if self.metrics.iter().any(|m| m.name == name) {
            return Err(BboError::InvalidValue(format!(
                "duplicate metric name `{name}`"
            )));
        }
        self.metrics.push(MetricInformation {
            name: name.to_string(),
            goal,
        });
        Ok(self)
    }

    /// Metrics in declaration order
    pub fn metrics(&self) -> &[MetricInformation] {
        &self.metrics
    }

    /// Number of metrics
    pub fn num_metrics(&self) -> usize {
        self.metrics.len()
    }
}

#[derive(Deserialize)]
struct RawObjective {
    metrics: Vec<MetricInformation>,
}

impl TryFrom<RawObjective> for Objective {
    type Error = BboError;

    fn try_from(raw: RawObjective) -> Result<Self> {
        let mut objective = Objective::new();
        for metric in raw.metrics {
            objective.add_metric(&metric.name, metric.goal)?;
        }
        Ok(objective)
    }
}

/// Search space and objective of an optimization problem
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ProblemStatement {
    /// Parameters to optimize
    pub search_space: SearchSpace,
    /// Metrics to optimize
    pub objective: Objective,
}

impl ProblemStatement {
    /// Problem over `search_space` optimizing `objective`
    pub fn new(search_space: SearchSpace, objective: Objective) -> Self {
        ProblemStatement {
            search_space,
            objective,
        }
    }
}
