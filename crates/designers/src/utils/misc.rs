use libm::erfc;
use ndarray::{Array2, ArrayBase, Data, Ix2};

const SQRT_2PI: f64 = 2.5066282746310007;

/// Offset added to the label standard deviation
pub const STD_EPSILON: f64 = 1e-6;

/// Cumulative distribution function of Standard Normal at x
pub fn norm_cdf(x: f64) -> f64 {
    0.5 * erfc(-x / std::f64::consts::SQRT_2)
}

/// Probability density function of Standard Normal at x
pub fn norm_pdf(x: f64) -> f64 {
    (-0.5 * x * x).exp() / SQRT_2PI
}

/// Standardize labels `y' = (y - mean(y)) / (std(y) + 1e-6)` where mean and
/// (population) std are taken over all elements.
///
/// Constant labels map to zeros.
pub fn standardize(y: &ArrayBase<impl Data<Elem = f64>, Ix2>) -> Array2<f64> {
    if y.is_empty() {
        return y.to_owned();
    }
    let mean = y.mean().unwrap_or(0.);
    let std = y.std(0.);
    y.mapv(|v| (v - mean) / (std + STD_EPSILON))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn test_standardize() {
        let y = array![[1.], [2.], [3.], [10.]];
        let ys = standardize(&y);
        assert_abs_diff_eq!(ys.mean().unwrap(), 0., epsilon = 1e-12);
        assert_abs_diff_eq!(ys.std(0.), 1., epsilon = 1e-5);
    }

    #[test]
    fn test_standardize_constant_labels() {
        let ys = standardize(&array![[4.], [4.], [4.]]);
        assert!(ys.iter().all(|v| v.is_finite()));
        assert_abs_diff_eq!(ys, array![[0.], [0.], [0.]]);
    }

    #[test]
    fn test_norm() {
        assert_abs_diff_eq!(norm_cdf(0.), 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(norm_cdf(1.96), 0.9750021048517795, epsilon = 1e-9);
        assert_abs_diff_eq!(norm_pdf(0.), 1. / SQRT_2PI, epsilon = 1e-12);
    }
}
