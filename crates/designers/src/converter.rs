//! Conversion between trials and numeric feature/label arrays.
use crate::errors::{BboError, Result};
use crate::problem::{
    MetricInformation, ObjectiveMetricGoal, ParameterConfig, ParameterDomain, ParameterType,
    ProblemStatement,
};
use crate::trial::{ParameterValue, Trial};
use ndarray::{concatenate, Array2, Axis};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Numeric encoding of a parameter type, used to group features
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpecType {
    /// Continuous feature
    Double,
    /// Integer feature
    Integer,
    /// Discrete feature (feasible value)
    Discrete,
    /// Categorical feature (category index)
    Categorical,
}

impl From<ParameterType> for SpecType {
    fn from(t: ParameterType) -> Self {
        match t {
            ParameterType::Double => SpecType::Double,
            ParameterType::Integer => SpecType::Integer,
            ParameterType::Discrete => SpecType::Discrete,
            ParameterType::Categorical => SpecType::Categorical,
        }
    }
}

/// Declared type and numeric bounds of one feature column
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FeatureSpec {
    /// Parameter name
    pub name: String,
    /// Feature type
    pub spec_type: SpecType,
    /// Numeric `(lower, upper)` bounds
    pub bounds: (f64, f64),
}

/// Features grouped by type, columns in parameter declaration order
pub type FeaturesByType = BTreeMap<SpecType, Array2<f64>>;
/// `(n, 1)` label column per metric name
pub type LabelsByMetric = BTreeMap<String, Array2<f64>>;

/// Converter between trials and arrays for a given problem.
///
/// Labels are oriented so that larger is better: minimized metrics are negated.
#[derive(Clone, Debug)]
pub struct DefaultTrialConverter {
    parameters: Vec<ParameterConfig>,
    metrics: Vec<MetricInformation>,
}

impl DefaultTrialConverter {
    /// Converter of the parameters and metrics declared by `problem`
    pub fn from_problem(problem: &ProblemStatement) -> Self {
        DefaultTrialConverter {
            parameters: problem.search_space.parameters().to_vec(),
            metrics: problem.objective.metrics().to_vec(),
        }
    }

    /// One feature spec per parameter in declaration order
    pub fn output_spec(&self) -> Vec<FeatureSpec> {
        self.parameters
            .iter()
            .map(|p| FeatureSpec {
                name: p.name().to_string(),
                spec_type: p.param_type().into(),
                bounds: p.bounds(),
            })
            .collect()
    }

    /// Number of label columns produced by [DefaultTrialConverter::convert]
    pub fn num_metrics(&self) -> usize {
        self.metrics.len()
    }

    /// `(n, 1)` feature column per parameter name
    pub fn to_features(&self, trials: &[Trial]) -> Result<BTreeMap<String, Array2<f64>>> {
        self.parameters
            .iter()
            .map(|p| {
                let column = trials
                    .iter()
                    .map(|t| encode(p, t))
                    .collect::<Result<Vec<_>>>()?;
                let column = Array2::from_shape_vec((trials.len(), 1), column)
                    .map_err(|e| BboError::InvalidValue(e.to_string()))?;
                Ok((p.name().to_string(), column))
            })
            .collect()
    }

    /// `(n, nx)` features, columns in parameter declaration order
    pub fn to_feature_array(&self, trials: &[Trial]) -> Result<Array2<f64>> {
        let mut x = Array2::zeros((trials.len(), self.parameters.len()));
        for (j, p) in self.parameters.iter().enumerate() {
            for (i, trial) in trials.iter().enumerate() {
                x[[i, j]] = encode(p, trial)?;
            }
        }
        Ok(x)
    }

    /// Features merged by type and oriented labels per metric
    pub fn convert(&self, trials: &[Trial]) -> Result<(FeaturesByType, LabelsByMetric)> {
        let mut columns = self.to_features(trials)?;
        let mut grouped: BTreeMap<SpecType, Vec<Array2<f64>>> = BTreeMap::new();
        for p in self.parameters.iter() {
            if let Some(column) = columns.remove(p.name()) {
                grouped
                    .entry(p.param_type().into())
                    .or_default()
                    .push(column);
            }
        }
        let mut features = FeaturesByType::new();
        for (spec_type, cols) in grouped {
            let views: Vec<_> = cols.iter().map(|c| c.view()).collect();
            let merged = concatenate(Axis(1), &views)
                .map_err(|e| BboError::InvalidValue(e.to_string()))?;
            features.insert(spec_type, merged);
        }

        let mut labels = LabelsByMetric::new();
        for metric in self.metrics.iter() {
            let column = trials
                .iter()
                .map(|t| oriented_label(metric, t))
                .collect::<Result<Vec<_>>>()?;
            let column = Array2::from_shape_vec((trials.len(), 1), column)
                .map_err(|e| BboError::InvalidValue(e.to_string()))?;
            labels.insert(metric.name.clone(), column);
        }
        Ok((features, labels))
    }

    /// Oriented labels stacked as `(n, n_metrics)` in objective order
    pub fn to_labels(&self, trials: &[Trial]) -> Result<Array2<f64>> {
        let mut labels = Array2::zeros((trials.len(), self.metrics.len()));
        for (j, metric) in self.metrics.iter().enumerate() {
            for (i, trial) in trials.iter().enumerate() {
                labels[[i, j]] = oriented_label(metric, trial)?;
            }
        }
        Ok(labels)
    }

    /// Decode features grouped by type back into trials without metrics
    pub fn to_trials(&self, features: &FeaturesByType) -> Result<Vec<Trial>> {
        let mut offsets: BTreeMap<SpecType, usize> = BTreeMap::new();
        let mut n_rows: Option<usize> = None;
        let mut located = Vec::with_capacity(self.parameters.len());
        for p in self.parameters.iter() {
            let spec_type: SpecType = p.param_type().into();
            let array = features.get(&spec_type).ok_or_else(|| {
                BboError::InvalidValue(format!("missing {spec_type:?} features"))
            })?;
            let col = offsets.entry(spec_type).or_insert(0);
            if *col >= array.ncols() {
                return Err(BboError::InvalidValue(format!(
                    "missing {spec_type:?} feature column for parameter `{}`",
                    p.name()
                )));
            }
            match n_rows {
                Some(n) if n != array.nrows() => {
                    return Err(BboError::InvalidValue(
                        "feature arrays should have the same number of rows".to_string(),
                    ))
                }
                _ => n_rows = Some(array.nrows()),
            }
            located.push((p, array, *col));
            *col += 1;
        }

        let n = n_rows.unwrap_or(0);
        let trials = (0..n)
            .map(|i| {
                let mut trial = Trial::new();
                for (p, array, col) in located.iter() {
                    trial
                        .parameters
                        .insert(p.name().to_string(), decode(p, array[[i, *col]]));
                }
                trial
            })
            .collect();
        Ok(trials)
    }
}

fn encode(param: &ParameterConfig, trial: &Trial) -> Result<f64> {
    let value = trial.parameters.get(param.name()).ok_or_else(|| {
        BboError::InvalidValue(format!("trial misses parameter `{}`", param.name()))
    })?;
    let ill_typed = || {
        BboError::InvalidValue(format!(
            "value `{value}` does not fit parameter `{}`",
            param.name()
        ))
    };
    match (param.domain(), value) {
        (ParameterDomain::Categories(categories), ParameterValue::Str(label)) => categories
            .iter()
            .position(|c| c == label)
            .map(|idx| idx as f64)
            .ok_or_else(ill_typed),
        (ParameterDomain::Categories(_), _) => Err(ill_typed()),
        (_, value) => value.as_f64().ok_or_else(ill_typed),
    }
}

fn decode(param: &ParameterConfig, x: f64) -> ParameterValue {
    let (lb, ub) = param.bounds();
    match param.domain() {
        ParameterDomain::Bounds(..) if param.param_type() == ParameterType::Integer => {
            ParameterValue::Int(x.round().clamp(lb, ub) as i64)
        }
        ParameterDomain::Bounds(..) => ParameterValue::Float(x.clamp(lb, ub)),
        ParameterDomain::FeasibleValues(values) => {
            let nearest = values
                .iter()
                .copied()
                .min_by(|a, b| (a - x).abs().total_cmp(&(b - x).abs()))
                .unwrap_or(lb);
            ParameterValue::Float(nearest)
        }
        ParameterDomain::Categories(categories) => {
            let idx = x.round().clamp(lb, ub) as usize;
            ParameterValue::Str(categories[idx].clone())
        }
    }
}

fn oriented_label(metric: &MetricInformation, trial: &Trial) -> Result<f64> {
    let value = trial.metrics.get(&metric.name).ok_or_else(|| {
        BboError::InvalidValue(format!("trial misses metric `{}`", metric.name))
    })?;
    Ok(match metric.goal {
        ObjectiveMetricGoal::Maximize => *value,
        ObjectiveMetricGoal::Minimize => -*value,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::problem::{Objective, SearchSpace};
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    fn mixed_problem() -> ProblemStatement {
        let mut sp = SearchSpace::new();
        sp.add_float_param("x0", -1., 1.)
            .unwrap()
            .add_int_param("n", 0, 4)
            .unwrap()
            .add_float_param("x1", 0., 10.)
            .unwrap()
            .add_categorical_param("c", &["a", "b"])
            .unwrap()
            .add_discrete_param("d", &[0.1, 0.5, 1.0])
            .unwrap();
        let mut obj = Objective::new();
        obj.add_metric("loss", ObjectiveMetricGoal::Minimize).unwrap();
        ProblemStatement::new(sp, obj)
    }

    #[test]
    fn test_output_spec_follows_declaration_order() {
        let conv = DefaultTrialConverter::from_problem(&mixed_problem());
        let spec = conv.output_spec();
        let names: Vec<_> = spec.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["x0", "n", "x1", "c", "d"]);
        assert_eq!(spec[3].spec_type, SpecType::Categorical);
        assert_eq!(spec[3].bounds, (0., 1.));
        assert_eq!(spec[4].bounds, (0.1, 1.0));
    }

    #[test]
    fn test_convert_groups_by_type_and_orients_labels() {
        let conv = DefaultTrialConverter::from_problem(&mixed_problem());
        let trials = vec![
            Trial::new()
                .with_parameter("x0", 0.5)
                .with_parameter("n", 2i64)
                .with_parameter("x1", 7.)
                .with_parameter("c", "b")
                .with_parameter("d", 0.5)
                .with_metric("loss", 3.),
            Trial::new()
                .with_parameter("x0", -0.5)
                .with_parameter("n", 0i64)
                .with_parameter("x1", 1.)
                .with_parameter("c", "a")
                .with_parameter("d", 1.0)
                .with_metric("loss", -1.),
        ];
        let (features, labels) = conv.convert(&trials).unwrap();
        assert_eq!(features[&SpecType::Double], array![[0.5, 7.], [-0.5, 1.]]);
        assert_eq!(features[&SpecType::Integer], array![[2.], [0.]]);
        assert_eq!(features[&SpecType::Categorical], array![[1.], [0.]]);
        assert_eq!(labels["loss"], array![[-3.], [1.]]);
        assert_eq!(conv.to_labels(&trials).unwrap(), array![[-3.], [1.]]);

        let back = conv.to_trials(&features).unwrap();
        assert_eq!(back.len(), 2);
        assert_eq!(back[0].parameters, trials[0].parameters);
        assert!(!back[0].is_completed());
    }

    #[test]
    fn test_to_trials_snaps_and_clamps() {
        let conv = DefaultTrialConverter::from_problem(&mixed_problem());
        let mut features = FeaturesByType::new();
        features.insert(SpecType::Double, array![[1.5, 5.]]);
        features.insert(SpecType::Integer, array![[2.6]]);
        features.insert(SpecType::Categorical, array![[7.]]);
        features.insert(SpecType::Discrete, array![[0.4]]);
        let trials = conv.to_trials(&features).unwrap();
        let p = &trials[0].parameters;
        assert_eq!(p["x0"], ParameterValue::Float(1.));
        assert_eq!(p["n"], ParameterValue::Int(3));
        assert_eq!(p["c"], ParameterValue::Str("b".to_string()));
        match p["d"] {
            ParameterValue::Float(v) => assert_abs_diff_eq!(v, 0.5),
            _ => panic!("discrete value expected"),
        }
    }

    #[test]
    fn test_missing_values_are_errors() {
        let conv = DefaultTrialConverter::from_problem(&mixed_problem());
        let incomplete = Trial::new().with_parameter("x0", 0.);
        assert!(matches!(
            conv.to_features(&[incomplete]),
            Err(BboError::InvalidValue(_))
        ));
        let no_metric = Trial::new()
            .with_parameter("x0", 0.5)
            .with_parameter("n", 2i64)
            .with_parameter("x1", 7.)
            .with_parameter("c", "b")
            .with_parameter("d", 0.5);
        assert!(matches!(
            conv.convert(&[no_metric]),
            Err(BboError::InvalidValue(_))
        ));
        let bad_label = Trial::new()
            .with_parameter("x0", 0.5)
            .with_parameter("n", 2i64)
            .with_parameter("x1", 7.)
            .with_parameter("c", "z")
            .with_parameter("d", 0.5);
        assert!(conv.to_features(&[bad_label]).is_err());
    }
}
