use serde::{Deserialize, Serialize};
use std::fmt;

/// Acquisition criterion scoring candidate batches from the surrogate posterior
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AcqfType {
    /// (batch) Expected Improvement
    #[serde(rename = "qEI")]
    QEi,
    /// (batch) Upper Confidence Bound
    #[serde(rename = "qUCB")]
    QUcb,
    /// (batch) Probability of Improvement
    #[serde(rename = "qPI")]
    QPi,
    /// (batch) log of Expected Improvement
    #[serde(rename = "qlogEI")]
    QLogEi,
}

impl fmt::Display for AcqfType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            AcqfType::QEi => "qEI",
            AcqfType::QUcb => "qUCB",
            AcqfType::QPi => "qPI",
            AcqfType::QLogEi => "qlogEI",
        };
        write!(f, "{name}")
    }
}

/// One acquisition criterion, or several optimized jointly as a multi-objective problem
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AcqfSpec {
    /// A single scalar criterion
    Single(AcqfType),
    /// Several criteria, one objective each
    Multi(Vec<AcqfType>),
}

impl Default for AcqfSpec {
    fn default() -> Self {
        AcqfSpec::Single(AcqfType::QEi)
    }
}

impl AcqfSpec {
    /// Configured criteria in declaration order
    pub fn types(&self) -> Vec<AcqfType> {
        match self {
            AcqfSpec::Single(t) => vec![*t],
            AcqfSpec::Multi(ts) => ts.clone(),
        }
    }
}

/// Optimizer used to maximize the acquisition function(s)
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AcqfOptimizer {
    /// Multistart gradient ascent (single criterion only)
    #[default]
    #[serde(alias = "l-bfgs")]
    Gradient,
    /// NSGA-II population search followed by batch assembly
    #[serde(alias = "nsgaii")]
    Evolutionary,
}

/// Compute capability used by the designer. It never changes results beyond
/// numeric tolerance.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Device {
    /// Sequential computations on the calling thread
    #[default]
    Cpu,
    /// Multistarts dispatched on the rayon thread pool
    Parallel,
}

impl Device {
    /// Whether multistart computations run on the rayon thread pool
    pub fn is_parallel(&self) -> bool {
        matches!(self, Device::Parallel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acqf_spec_untagged() {
        let single: AcqfSpec = serde_json::from_str(r#""qUCB""#).unwrap();
        assert_eq!(single, AcqfSpec::Single(AcqfType::QUcb));
        let multi: AcqfSpec = serde_json::from_str(r#"["qEI", "qlogEI"]"#).unwrap();
        assert_eq!(multi, AcqfSpec::Multi(vec![AcqfType::QEi, AcqfType::QLogEi]));
        assert!(serde_json::from_str::<AcqfSpec>(r#""EI""#).is_err());
    }

    #[test]
    fn test_optimizer_aliases() {
        let opt: AcqfOptimizer = serde_json::from_str(r#""nsgaii""#).unwrap();
        assert_eq!(opt, AcqfOptimizer::Evolutionary);
        let opt: AcqfOptimizer = serde_json::from_str(r#""l-bfgs""#).unwrap();
        assert_eq!(opt, AcqfOptimizer::Gradient);
        assert_eq!(AcqfType::QLogEi.to_string(), "qlogEI");
    }
}
