use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Value assigned to a parameter
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParameterValue {
    /// Double or discrete value
    Float(f64),
    /// Integer value
    Int(i64),
    /// Category label
    Str(String),
}

impl ParameterValue {
    /// Numeric view of the value, `None` for labels
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParameterValue::Float(v) => Some(*v),
            ParameterValue::Int(v) => Some(*v as f64),
            ParameterValue::Str(_) => None,
        }
    }
}

impl fmt::Display for ParameterValue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ParameterValue::Float(v) => write!(f, "{v}"),
            ParameterValue::Int(v) => write!(f, "{v}"),
            ParameterValue::Str(v) => write!(f, "{v}"),
        }
    }
}

impl From<f64> for ParameterValue {
    fn from(v: f64) -> Self {
        ParameterValue::Float(v)
    }
}

impl From<i64> for ParameterValue {
    fn from(v: i64) -> Self {
        ParameterValue::Int(v)
    }
}

impl From<&str> for ParameterValue {
    fn from(v: &str) -> Self {
        ParameterValue::Str(v.to_string())
    }
}

/// A parameter assignment with its observed metrics, if any
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Trial {
    /// Parameter values by name
    pub parameters: BTreeMap<String, ParameterValue>,
    /// Observed metric values by name
    pub metrics: BTreeMap<String, f64>,
}

impl Trial {
    /// Trial without any assignment
    pub fn new() -> Self {
        Self::default()
    }

    /// Assign `value` to parameter `name`
    pub fn with_parameter(mut self, name: &str, value: impl Into<ParameterValue>) -> Self {
        self.parameters.insert(name.to_string(), value.into());
        self
    }

    /// Record the observed `value` of metric `name`
    pub fn with_metric(mut self, name: &str, value: f64) -> Self {
        self.metrics.insert(name.to_string(), value);
        self
    }

    /// Whether at least one metric has been observed
    pub fn is_completed(&self) -> bool {
        !self.metrics.is_empty()
    }
}

impl fmt::Display for Trial {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let params: Vec<String> = self
            .parameters
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect();
        let metrics: Vec<String> = self
            .metrics
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect();
        write!(f, "Trial({}; {})", params.join(", "), metrics.join(", "))
    }
}
