//! Covariance modules of the GP prior.
//!
//! All kernels end in an ARD Matern 5/2 kernel with an output scale, applied
//! either to the scaled inputs directly (`matern52`), to Kumaraswamy-warped
//! inputs (`kumar`) or to features extracted by a small network (`mlp`).
//!
//! Inputs are expected to lie in the unit hypercube.

use crate::errors::{GpError, Result};
use crate::mlp::Mlp;
use ndarray::{Array1, Array2, ArrayBase, Data, Ix2, Zip};
use ndarray_rand::rand::Rng;
use paste::paste;
#[cfg(feature = "serializable")]
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A trait for covariance functions parameterized by a flat slice of hyperparameters
pub trait CovarianceKernel: Clone + fmt::Display + Send + Sync {
    /// Number of hyperparameters for inputs of dimension `nx`
    fn n_params(&self, nx: usize) -> usize;

    /// Starting point of the likelihood optimization
    fn init_params<R: Rng>(&self, nx: usize, rng: &mut R) -> Vec<f64>;

    /// Random restart point of the likelihood optimization
    fn random_params<R: Rng>(&self, nx: usize, rng: &mut R) -> Vec<f64>;

    /// Admissible range of each hyperparameter
    fn param_bounds(&self, nx: usize) -> Vec<(f64, f64)>;

    /// Cross covariance `(na, nb)` between the rows of `xa` and `xb`
    fn value(
        &self,
        xa: &ArrayBase<impl Data<Elem = f64>, Ix2>,
        xb: &ArrayBase<impl Data<Elem = f64>, Ix2>,
        params: &[f64],
    ) -> Array2<f64>;

    /// Prior variance k(x, x) at each row of `x`
    fn diag(&self, x: &ArrayBase<impl Data<Elem = f64>, Ix2>, params: &[f64]) -> Array1<f64>;
}

const SQRT5: f64 = 2.236_067_977_499_79;

/// ARD Matern 5/2 kernel scaled by an output variance.
///
/// Hyperparameters: `[log lengthscale_1..nx, log outputscale]`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serializable", derive(Serialize, Deserialize))]
pub struct Matern52Kernel();

impl Matern52Kernel {
    const LOG_LENGTHSCALE_BOUNDS: (f64, f64) = (-4.6, 4.6);
    const LOG_OUTPUTSCALE_BOUNDS: (f64, f64) = (-6.9, 6.9);
    const LENGTHSCALE_INIT: f64 = 0.5;
}

impl CovarianceKernel for Matern52Kernel {
    fn n_params(&self, nx: usize) -> usize {
        nx + 1
    }

    fn init_params<R: Rng>(&self, nx: usize, _rng: &mut R) -> Vec<f64> {
        let mut params = vec![Self::LENGTHSCALE_INIT.ln(); nx];
        params.push(0.);
        params
    }

    fn random_params<R: Rng>(&self, nx: usize, rng: &mut R) -> Vec<f64> {
        let mut params: Vec<f64> = (0..nx)
            .map(|_| rng.gen_range(0.05f64.ln()..2f64.ln()))
            .collect();
        params.push(rng.gen_range(-0.7..0.7));
        params
    }

    fn param_bounds(&self, nx: usize) -> Vec<(f64, f64)> {
        let mut bounds = vec![Self::LOG_LENGTHSCALE_BOUNDS; nx];
        bounds.push(Self::LOG_OUTPUTSCALE_BOUNDS);
        bounds
    }

    /// k(x, x') = s2 * (1 + sqrt(5) r + 5/3 r^2) * exp(-sqrt(5) r)
    /// with r = || (x - x') / l ||
    fn value(
        &self,
        xa: &ArrayBase<impl Data<Elem = f64>, Ix2>,
        xb: &ArrayBase<impl Data<Elem = f64>, Ix2>,
        params: &[f64],
    ) -> Array2<f64> {
        let nx = xa.ncols();
        let inv_ls = Array1::from_iter(params[..nx].iter().map(|v| (-v).exp()));
        let outputscale = params[nx].exp();
        let xa = xa * &inv_ls;
        let xb = xb * &inv_ls;

        let mut k = Array2::zeros((xa.nrows(), xb.nrows()));
        Zip::indexed(&mut k).for_each(|(i, j), kij| {
            let r = Zip::from(xa.row(i))
                .and(xb.row(j))
                .fold(0., |acc, a, b| acc + (a - b) * (a - b))
                .sqrt();
            *kij = outputscale * (1. + SQRT5 * r + 5. / 3. * r * r) * (-SQRT5 * r).exp();
        });
        k
    }

    fn diag(&self, x: &ArrayBase<impl Data<Elem = f64>, Ix2>, params: &[f64]) -> Array1<f64> {
        Array1::from_elem(x.nrows(), params[x.ncols()].exp())
    }
}

/// Matern 5/2 kernel on inputs warped by a Kumaraswamy CDF `1 - (1 - x^a)^b`
/// per dimension.
///
/// Hyperparameters: `[log a_1..nx, log b_1..nx, matern52...]`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serializable", derive(Serialize, Deserialize))]
pub struct KumarKernel();

impl KumarKernel {
    const LOG_SHAPE_BOUNDS: (f64, f64) = (-2.3, 2.3);
    const EPS: f64 = 1e-7;

    fn warp(&self, x: &ArrayBase<impl Data<Elem = f64>, Ix2>, params: &[f64]) -> Array2<f64> {
        let nx = x.ncols();
        let mut w = x.to_owned();
        for (j, mut col) in w.columns_mut().into_iter().enumerate() {
            let a = params[j].exp();
            let b = params[nx + j].exp();
            col.mapv_inplace(|v| {
                let v = v.clamp(Self::EPS, 1. - Self::EPS);
                1. - (1. - v.powf(a)).powf(b)
            });
        }
        w
    }
}

impl CovarianceKernel for KumarKernel {
    fn n_params(&self, nx: usize) -> usize {
        2 * nx + Matern52Kernel().n_params(nx)
    }

    fn init_params<R: Rng>(&self, nx: usize, rng: &mut R) -> Vec<f64> {
        let mut params = vec![0.; 2 * nx];
        params.extend(Matern52Kernel().init_params(nx, rng));
        params
    }

    fn random_params<R: Rng>(&self, nx: usize, rng: &mut R) -> Vec<f64> {
        let mut params: Vec<f64> = (0..2 * nx).map(|_| rng.gen_range(-0.5..0.5)).collect();
        params.extend(Matern52Kernel().random_params(nx, rng));
        params
    }

    fn param_bounds(&self, nx: usize) -> Vec<(f64, f64)> {
        let mut bounds = vec![Self::LOG_SHAPE_BOUNDS; 2 * nx];
        bounds.extend(Matern52Kernel().param_bounds(nx));
        bounds
    }

    fn value(
        &self,
        xa: &ArrayBase<impl Data<Elem = f64>, Ix2>,
        xb: &ArrayBase<impl Data<Elem = f64>, Ix2>,
        params: &[f64],
    ) -> Array2<f64> {
        let nx = xa.ncols();
        let wa = self.warp(xa, params);
        let wb = self.warp(xb, params);
        Matern52Kernel().value(&wa, &wb, &params[2 * nx..])
    }

    fn diag(&self, x: &ArrayBase<impl Data<Elem = f64>, Ix2>, params: &[f64]) -> Array1<f64> {
        Matern52Kernel().diag(x, &params[2 * x.ncols()..])
    }
}

/// Deep kernel: Matern 5/2 kernel on the output features of a small network.
///
/// Hyperparameters: `[network weights..., matern52 on n_features...]`.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serializable", derive(Serialize, Deserialize))]
pub struct MlpKernel {
    hidden_layers: Vec<usize>,
    n_features: usize,
}

impl MlpKernel {
    /// Deep kernel extracting `n_features` features through `hidden_layers`
    pub fn new(hidden_layers: &[usize], n_features: usize) -> Self {
        MlpKernel {
            hidden_layers: hidden_layers.to_vec(),
            n_features: n_features.max(1),
        }
    }

    fn network(&self, nx: usize) -> Mlp {
        Mlp::new(nx, &self.hidden_layers, self.n_features)
    }
}

impl Default for MlpKernel {
    fn default() -> Self {
        let config = KernelConfig::default();
        MlpKernel::new(&config.hidden_layers, config.n_features)
    }
}

impl CovarianceKernel for MlpKernel {
    fn n_params(&self, nx: usize) -> usize {
        self.network(nx).n_params() + Matern52Kernel().n_params(self.n_features)
    }

    fn init_params<R: Rng>(&self, nx: usize, rng: &mut R) -> Vec<f64> {
        let mut params = self.network(nx).init_params(rng);
        params.extend(Matern52Kernel().init_params(self.n_features, rng));
        params
    }

    fn random_params<R: Rng>(&self, nx: usize, rng: &mut R) -> Vec<f64> {
        let mut params = self.network(nx).init_params(rng);
        params.extend(Matern52Kernel().random_params(self.n_features, rng));
        params
    }

    fn param_bounds(&self, nx: usize) -> Vec<(f64, f64)> {
        let mut bounds = vec![Mlp::PARAM_BOUNDS; self.network(nx).n_params()];
        bounds.extend(Matern52Kernel().param_bounds(self.n_features));
        bounds
    }

    fn value(
        &self,
        xa: &ArrayBase<impl Data<Elem = f64>, Ix2>,
        xb: &ArrayBase<impl Data<Elem = f64>, Ix2>,
        params: &[f64],
    ) -> Array2<f64> {
        let net = self.network(xa.ncols());
        let split = net.n_params();
        let fa = net.forward(xa, &params[..split]);
        let fb = net.forward(xb, &params[..split]);
        Matern52Kernel().value(&fa, &fb, &params[split..])
    }

    fn diag(&self, x: &ArrayBase<impl Data<Elem = f64>, Ix2>, params: &[f64]) -> Array1<f64> {
        let split = self.network(x.ncols()).n_params();
        Array1::from_elem(x.nrows(), params[split + self.n_features].exp())
    }
}

macro_rules! declare_kernel_util_impls {
    ($kernel:ident, $name:literal) => {
        paste! {
            impl fmt::Display for [<$kernel Kernel>] {
                fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                    write!(f, "{}", $name)
                }
            }
        }
    };
}

declare_kernel_util_impls!(Matern52, "matern52");
declare_kernel_util_impls!(Kumar, "kumar");
declare_kernel_util_impls!(Mlp, "mlp");

/// Names of the supported kernel modules
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(
    feature = "serializable",
    derive(Serialize, Deserialize),
    serde(rename_all = "lowercase")
)]
pub enum KernelType {
    /// See [Matern52Kernel]
    #[default]
    Matern52,
    /// See [MlpKernel]
    Mlp,
    /// See [KumarKernel]
    Kumar,
}

impl fmt::Display for KernelType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            KernelType::Matern52 => "matern52",
            KernelType::Mlp => "mlp",
            KernelType::Kumar => "kumar",
        };
        write!(f, "{name}")
    }
}

impl FromStr for KernelType {
    type Err = GpError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "matern52" => Ok(KernelType::Matern52),
            "mlp" => Ok(KernelType::Mlp),
            "kumar" => Ok(KernelType::Kumar),
            _ => Err(GpError::InvalidModuleError(format!(
                "unknown kernel type `{s}`, expected one of: matern52, mlp, kumar"
            ))),
        }
    }
}

/// Options of the kernel modules
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(
    feature = "serializable",
    derive(Serialize, Deserialize),
    serde(default)
)]
pub struct KernelConfig {
    /// Hidden layer widths of the `mlp` feature extractor
    pub hidden_layers: Vec<usize>,
    /// Number of features fed to the Matern kernel by the `mlp` extractor
    pub n_features: usize,
}

impl Default for KernelConfig {
    fn default() -> Self {
        KernelConfig {
            hidden_layers: vec![8],
            n_features: 2,
        }
    }
}

/// Kernel module selected at runtime
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serializable", derive(Serialize, Deserialize))]
pub enum Kernel {
    /// ARD Matern 5/2
    Matern52(Matern52Kernel),
    /// Deep kernel
    Mlp(MlpKernel),
    /// Input-warped Matern 5/2
    Kumar(KumarKernel),
}

impl Default for Kernel {
    fn default() -> Self {
        Kernel::Matern52(Matern52Kernel())
    }
}

impl fmt::Display for Kernel {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Kernel::Matern52(k) => write!(f, "{k}"),
            Kernel::Mlp(k) => write!(f, "{k}"),
            Kernel::Kumar(k) => write!(f, "{k}"),
        }
    }
}

macro_rules! dispatch {
    ($self:ident, $k:ident => $e:expr) => {
        match $self {
            Kernel::Matern52($k) => $e,
            Kernel::Mlp($k) => $e,
            Kernel::Kumar($k) => $e,
        }
    };
}

impl CovarianceKernel for Kernel {
    fn n_params(&self, nx: usize) -> usize {
        dispatch!(self, k => k.n_params(nx))
    }

    fn init_params<R: Rng>(&self, nx: usize, rng: &mut R) -> Vec<f64> {
        dispatch!(self, k => k.init_params(nx, rng))
    }

    fn random_params<R: Rng>(&self, nx: usize, rng: &mut R) -> Vec<f64> {
        dispatch!(self, k => k.random_params(nx, rng))
    }

    fn param_bounds(&self, nx: usize) -> Vec<(f64, f64)> {
        dispatch!(self, k => k.param_bounds(nx))
    }

    fn value(
        &self,
        xa: &ArrayBase<impl Data<Elem = f64>, Ix2>,
        xb: &ArrayBase<impl Data<Elem = f64>, Ix2>,
        params: &[f64],
    ) -> Array2<f64> {
        dispatch!(self, k => k.value(xa, xb, params))
    }

    fn diag(&self, x: &ArrayBase<impl Data<Elem = f64>, Ix2>, params: &[f64]) -> Array1<f64> {
        dispatch!(self, k => k.diag(x, params))
    }
}

/// Builds the kernel module named by `kernel_type` (matern52 when `None`).
pub fn kernel_factory(kernel_type: Option<KernelType>, config: Option<&KernelConfig>) -> Kernel {
    let default_config = KernelConfig::default();
    let config = config.unwrap_or(&default_config);
    match kernel_type.unwrap_or_default() {
        KernelType::Matern52 => Kernel::Matern52(Matern52Kernel()),
        KernelType::Mlp => Kernel::Mlp(MlpKernel::new(&config.hidden_layers, config.n_features)),
        KernelType::Kumar => Kernel::Kumar(KumarKernel()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;
    use ndarray_rand::rand::SeedableRng;
    use rand_xoshiro::Xoshiro256Plus;

    #[test]
    fn test_matern52_values() {
        let x = array![[0., 0.], [1., 0.]];
        // unit lengthscales, unit outputscale
        let params = [0., 0., 0.];
        let k = Matern52Kernel().value(&x, &x, &params);
        let r: f64 = 1.;
        let expected = (1. + SQRT5 * r + 5. / 3. * r * r) * (-SQRT5 * r).exp();
        assert_abs_diff_eq!(k, array![[1., expected], [expected, 1.]], epsilon = 1e-12);
    }

    #[test]
    fn test_matern52_lengthscale_and_scale() {
        let xa = array![[0.]];
        let xb = array![[0.5]];
        // lengthscale 0.5 => r = 1, outputscale 2
        let params = [0.5f64.ln(), 2f64.ln()];
        let k = Matern52Kernel().value(&xa, &xb, &params);
        let expected = 2. * (1. + SQRT5 + 5. / 3.) * (-SQRT5).exp();
        assert_abs_diff_eq!(k[[0, 0]], expected, epsilon = 1e-12);
        assert_abs_diff_eq!(Matern52Kernel().diag(&xa, &params)[0], 2., epsilon = 1e-12);
    }

    #[test]
    fn test_kumar_identity_warp() {
        // a = b = 1 is the identity warp
        let x = array![[0.2, 0.9], [0.6, 0.1]];
        let mut params = vec![0.; 4];
        params.extend([0., 0., 0.]);
        let k = KumarKernel().value(&x, &x, &params);
        let k_ref = Matern52Kernel().value(&x, &x, &[0., 0., 0.]);
        assert_abs_diff_eq!(k, k_ref, epsilon = 1e-6);
    }

    #[test]
    fn test_kernels_are_symmetric_psd_diag() {
        let mut rng = Xoshiro256Plus::seed_from_u64(42);
        let x = array![[0.1, 0.3], [0.5, 0.5], [0.9, 0.2]];
        for kind in [KernelType::Matern52, KernelType::Mlp, KernelType::Kumar] {
            let kernel = kernel_factory(Some(kind), None);
            let params = kernel.init_params(2, &mut rng);
            assert_eq!(params.len(), kernel.n_params(2));
            assert_eq!(kernel.param_bounds(2).len(), kernel.n_params(2));
            let k = kernel.value(&x, &x, &params);
            assert_abs_diff_eq!(k, k.t(), epsilon = 1e-12);
            let diag = kernel.diag(&x, &params);
            for i in 0..3 {
                assert_abs_diff_eq!(k[[i, i]], diag[i], epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn test_kernel_type_names() {
        assert_eq!("kumar".parse::<KernelType>().unwrap(), KernelType::Kumar);
        assert_eq!(KernelType::Matern52.to_string(), "matern52");
        assert!(matches!(
            "rbf".parse::<KernelType>(),
            Err(GpError::InvalidModuleError(_))
        ));
    }
}
