use crate::converter::DefaultTrialConverter;
use crate::errors::{BboError, Result};
use crate::problem::ProblemStatement;
use crate::trial::Trial;
use ndarray::{Array2, ArrayView2};

/// Evaluates trials with a vectorized function.
///
/// The function takes a `(n, nx)` array of numeric features, columns in
/// parameter declaration order, and returns a `(n, n_metrics)` array whose
/// columns are written to the objective metrics in declaration order.
pub struct FunctionExperimenter<F>
where
    F: Fn(&ArrayView2<f64>) -> Array2<f64>,
{
    func: F,
    converter: DefaultTrialConverter,
    metric_names: Vec<String>,
}

impl<F> FunctionExperimenter<F>
where
    F: Fn(&ArrayView2<f64>) -> Array2<f64>,
{
    /// Experimenter evaluating `func` on trials of `problem`
    pub fn new(func: F, problem: &ProblemStatement) -> Self {
        FunctionExperimenter {
            func,
            converter: DefaultTrialConverter::from_problem(problem),
            metric_names: problem
                .objective
                .metrics()
                .iter()
                .map(|m| m.name.clone())
                .collect(),
        }
    }

    /// Numeric features of `trials` as a `(n, nx)` array
    pub fn features(&self, trials: &[Trial]) -> Result<Array2<f64>> {
        self.converter.to_feature_array(trials)
    }

    /// Evaluate `trials` in place, overwriting their metric values
    pub fn evaluate(&self, trials: &mut [Trial]) -> Result<()> {
        if trials.is_empty() {
            return Ok(());
        }
        let x = self.features(trials)?;
        let y = (self.func)(&x.view());
        if y.dim() != (trials.len(), self.metric_names.len()) {
            return Err(BboError::InvalidValue(format!(
                "evaluation returned a {:?} array, expected ({}, {})",
                y.dim(),
                trials.len(),
                self.metric_names.len()
            )));
        }
        for (trial, yi) in trials.iter_mut().zip(y.rows()) {
            for (name, v) in self.metric_names.iter().zip(yi.iter()) {
                trial.metrics.insert(name.clone(), *v);
            }
        }
        Ok(())
    }
}
