//! Mean modules of the GP prior.
//!
//! The following models are implemented:
//! * constant: a single learned offset,
//! * mlp: a small neural network of the (scaled) inputs.
//!
//! Modules are dimension agnostic: the number of hyperparameters is only known
//! once the input dimension `nx` is given.

use crate::errors::{GpError, Result};
use crate::mlp::Mlp;
use ndarray::{Array1, ArrayBase, Axis, Data, Ix2};
use ndarray_rand::rand::Rng;
use paste::paste;
#[cfg(feature = "serializable")]
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A trait for mean models parameterized by a flat slice of hyperparameters
pub trait MeanFunction: Clone + fmt::Display + Send + Sync {
    /// Number of hyperparameters for inputs of dimension `nx`
    fn n_params(&self, nx: usize) -> usize;

    /// Starting point of the likelihood optimization
    fn init_params<R: Rng>(&self, nx: usize, rng: &mut R) -> Vec<f64>;

    /// Random restart point of the likelihood optimization
    fn random_params<R: Rng>(&self, nx: usize, rng: &mut R) -> Vec<f64>;

    /// Admissible range of each hyperparameter
    fn param_bounds(&self, nx: usize) -> Vec<(f64, f64)>;

    /// Mean value at the `(n, nx)` points `x`
    fn value(&self, x: &ArrayBase<impl Data<Elem = f64>, Ix2>, params: &[f64]) -> Array1<f64>;
}

/// A constant function as mean of the GP
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serializable", derive(Serialize, Deserialize))]
pub struct ConstantMean();

impl MeanFunction for ConstantMean {
    fn n_params(&self, _nx: usize) -> usize {
        1
    }

    fn init_params<R: Rng>(&self, _nx: usize, _rng: &mut R) -> Vec<f64> {
        vec![0.]
    }

    fn random_params<R: Rng>(&self, _nx: usize, rng: &mut R) -> Vec<f64> {
        vec![rng.gen_range(-1. ..1.)]
    }

    fn param_bounds(&self, _nx: usize) -> Vec<(f64, f64)> {
        vec![(-10., 10.)]
    }

    /// m(x) = c
    fn value(&self, x: &ArrayBase<impl Data<Elem = f64>, Ix2>, params: &[f64]) -> Array1<f64> {
        Array1::from_elem(x.nrows(), params[0])
    }
}

/// A neural network as mean of the GP
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serializable", derive(Serialize, Deserialize))]
pub struct MlpMean {
    hidden_layers: Vec<usize>,
}

impl MlpMean {
    /// Mean network with the given hidden layer widths
    pub fn new(hidden_layers: &[usize]) -> Self {
        MlpMean {
            hidden_layers: hidden_layers.to_vec(),
        }
    }

    fn network(&self, nx: usize) -> Mlp {
        Mlp::new(nx, &self.hidden_layers, 1)
    }
}

impl Default for MlpMean {
    fn default() -> Self {
        MlpMean::new(&MeanConfig::default().hidden_layers)
    }
}

impl MeanFunction for MlpMean {
    fn n_params(&self, nx: usize) -> usize {
        self.network(nx).n_params()
    }

    fn init_params<R: Rng>(&self, nx: usize, rng: &mut R) -> Vec<f64> {
        self.network(nx).init_params(rng)
    }

    fn random_params<R: Rng>(&self, nx: usize, rng: &mut R) -> Vec<f64> {
        self.network(nx).init_params(rng)
    }

    fn param_bounds(&self, nx: usize) -> Vec<(f64, f64)> {
        vec![Mlp::PARAM_BOUNDS; self.n_params(nx)]
    }

    fn value(&self, x: &ArrayBase<impl Data<Elem = f64>, Ix2>, params: &[f64]) -> Array1<f64> {
        self.network(x.ncols())
            .forward(x, params)
            .remove_axis(Axis(1))
    }
}

macro_rules! declare_mean_util_impls {
    ($regr:ident, $name:literal) => {
        paste! {
            impl fmt::Display for [<$regr Mean>] {
                fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                    write!(f, "{}", $name)
                }
            }
        }
    };
}

declare_mean_util_impls!(Constant, "constant");
declare_mean_util_impls!(Mlp, "mlp");

/// Names of the supported mean modules
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(
    feature = "serializable",
    derive(Serialize, Deserialize),
    serde(rename_all = "lowercase")
)]
pub enum MeanType {
    /// See [ConstantMean]
    #[default]
    Constant,
    /// See [MlpMean]
    Mlp,
}

impl fmt::Display for MeanType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            MeanType::Constant => write!(f, "constant"),
            MeanType::Mlp => write!(f, "mlp"),
        }
    }
}

impl FromStr for MeanType {
    type Err = GpError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "constant" => Ok(MeanType::Constant),
            "mlp" => Ok(MeanType::Mlp),
            _ => Err(GpError::InvalidModuleError(format!(
                "unknown mean type `{s}`, expected one of: constant, mlp"
            ))),
        }
    }
}

/// Options of the mean modules
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(
    feature = "serializable",
    derive(Serialize, Deserialize),
    serde(default)
)]
pub struct MeanConfig {
    /// Hidden layer widths of the `mlp` mean
    pub hidden_layers: Vec<usize>,
}

impl Default for MeanConfig {
    fn default() -> Self {
        MeanConfig {
            hidden_layers: vec![8],
        }
    }
}

/// Mean module selected at runtime
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serializable", derive(Serialize, Deserialize))]
pub enum MeanModel {
    /// Constant mean
    Constant(ConstantMean),
    /// Neural network mean
    Mlp(MlpMean),
}

impl Default for MeanModel {
    fn default() -> Self {
        MeanModel::Constant(ConstantMean())
    }
}

impl fmt::Display for MeanModel {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            MeanModel::Constant(m) => write!(f, "{m}"),
            MeanModel::Mlp(m) => write!(f, "{m}"),
        }
    }
}

impl MeanFunction for MeanModel {
    fn n_params(&self, nx: usize) -> usize {
        match self {
            MeanModel::Constant(m) => m.n_params(nx),
            MeanModel::Mlp(m) => m.n_params(nx),
        }
    }

    fn init_params<R: Rng>(&self, nx: usize, rng: &mut R) -> Vec<f64> {
        match self {
            MeanModel::Constant(m) => m.init_params(nx, rng),
            MeanModel::Mlp(m) => m.init_params(nx, rng),
        }
    }

    fn random_params<R: Rng>(&self, nx: usize, rng: &mut R) -> Vec<f64> {
        match self {
            MeanModel::Constant(m) => m.random_params(nx, rng),
            MeanModel::Mlp(m) => m.random_params(nx, rng),
        }
    }

    fn param_bounds(&self, nx: usize) -> Vec<(f64, f64)> {
        match self {
            MeanModel::Constant(m) => m.param_bounds(nx),
            MeanModel::Mlp(m) => m.param_bounds(nx),
        }
    }

    fn value(&self, x: &ArrayBase<impl Data<Elem = f64>, Ix2>, params: &[f64]) -> Array1<f64> {
        match self {
            MeanModel::Constant(m) => m.value(x, params),
            MeanModel::Mlp(m) => m.value(x, params),
        }
    }
}

/// Builds the mean module named by `mean_type` (constant when `None`).
pub fn mean_factory(mean_type: Option<MeanType>, config: Option<&MeanConfig>) -> MeanModel {
    let default_config = MeanConfig::default();
    let config = config.unwrap_or(&default_config);
    match mean_type.unwrap_or_default() {
        MeanType::Constant => MeanModel::Constant(ConstantMean()),
        MeanType::Mlp => MeanModel::Mlp(MlpMean::new(&config.hidden_layers)),
    }
}
