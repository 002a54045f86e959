//! Small fully connected network shared by the `mlp` mean and the deep kernel.
use ndarray::{Array1, Array2, ArrayBase, ArrayView1, Data, Ix2};
use ndarray_rand::{rand::Rng, rand_distr::StandardNormal, RandomExt};
#[cfg(feature = "serializable")]
use serde::{Deserialize, Serialize};

/// Feed-forward network with `tanh` hidden activations and a linear output layer.
///
/// The network owns no weights: every call takes a flat parameter slice laid out
/// layer after layer as `[W (fan_in x fan_out, row major), b (fan_out)]`.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serializable", derive(Serialize, Deserialize))]
pub struct Mlp {
    sizes: Vec<usize>,
}

impl Mlp {
    /// Admissible range for any weight or bias during likelihood optimization
    pub const PARAM_BOUNDS: (f64, f64) = (-5., 5.);

    /// Network mapping `input` features to `output` features through `hidden` layers
    pub fn new(input: usize, hidden: &[usize], output: usize) -> Self {
        let mut sizes = Vec::with_capacity(hidden.len() + 2);
        sizes.push(input);
        sizes.extend(hidden.iter().copied().filter(|&h| h > 0));
        sizes.push(output);
        Mlp { sizes }
    }

    /// Number of input features
    pub fn input_dim(&self) -> usize {
        self.sizes[0]
    }

    /// Number of output features
    pub fn output_dim(&self) -> usize {
        self.sizes[self.sizes.len() - 1]
    }

    /// Total number of weights and biases
    pub fn n_params(&self) -> usize {
        self.sizes.windows(2).map(|w| w[0] * w[1] + w[1]).sum()
    }

    /// LeCun-normal weights, zero biases
    pub fn init_params<R: Rng>(&self, rng: &mut R) -> Vec<f64> {
        let mut params = Vec::with_capacity(self.n_params());
        for w in self.sizes.windows(2) {
            let scale = (1. / w[0].max(1) as f64).sqrt();
            let weights = Array1::<f64>::random_using(w[0] * w[1], StandardNormal, rng);
            params.extend(weights.iter().map(|v| (v * scale).clamp(-2., 2.)));
            params.extend(std::iter::repeat(0.).take(w[1]));
        }
        params
    }

    /// Propagates the `(n, input_dim)` array `x`, returns `(n, output_dim)` features
    pub fn forward(&self, x: &ArrayBase<impl Data<Elem = f64>, Ix2>, params: &[f64]) -> Array2<f64> {
        let n_layers = self.sizes.len() - 1;
        let mut h = x.to_owned();
        let mut offset = 0;
        for (layer, w) in self.sizes.windows(2).enumerate() {
            let (fan_in, fan_out) = (w[0], w[1]);
            let weights = Array2::from_shape_fn((fan_in, fan_out), |(i, j)| {
                params[offset + i * fan_out + j]
            });
            offset += fan_in * fan_out;
            let bias = ArrayView1::from(&params[offset..offset + fan_out]);
            offset += fan_out;
            h = h.dot(&weights) + &bias;
            if layer + 1 < n_layers {
                h.mapv_inplace(f64::tanh);
            }
        }
        h
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
    fn test_mlp_params_count() {
        let mlp = Mlp::new(3, &[4, 5], 2);
        assert_eq!(mlp.n_params(), 3 * 4 + 4 + 4 * 5 + 5 + 5 * 2 + 2);
        let mut rng = Xoshiro256Plus::seed_from_u64(0);
        assert_eq!(mlp.init_params(&mut rng).len(), mlp.n_params());
    }

    #[test]
    fn test_mlp_forward_linear() {
        // no hidden layer: plain affine map
        let mlp = Mlp::new(2, &[], 1);
        let params = vec![2., -1., 0.5];
        let x = array![[1., 1.], [0., 3.]];
        let y = mlp.forward(&x, &params);
        assert_abs_diff_eq!(y, array![[1.5], [-2.5]], epsilon = 1e-12);
    }

    #[test]
    fn test_mlp_forward_hidden_tanh() {
        let mlp = Mlp::new(1, &[1], 1);
        // x -> tanh(x) -> 3 tanh(x) + 1
        let params = vec![1., 0., 3., 1.];
        let x = array![[0.], [1.]];
        let y = mlp.forward(&x, &params);
        assert_abs_diff_eq!(y, array![[1.], [3. * 1f64.tanh() + 1.]], epsilon = 1e-12);
    }
}
