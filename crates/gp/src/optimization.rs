use finitediff::FiniteDiff;
use log::debug;
use ndarray::{arr1, Array1};

pub(crate) struct SlsqpParams {
    pub max_eval: usize,
    pub ftol_rel: f64,
}

impl Default for SlsqpParams {
    fn default() -> Self {
        SlsqpParams {
            max_eval: 200,
            ftol_rel: 1e-6,
        }
    }
}

pub(crate) struct AdamParams {
    pub lr: f64,
    pub epochs: usize,
    pub beta1: f64,
    pub beta2: f64,
    pub eps: f64,
}

impl AdamParams {
    pub fn new(lr: f64, epochs: usize) -> Self {
        AdamParams {
            lr,
            epochs,
            beta1: 0.9,
            beta2: 0.999,
            eps: 1e-8,
        }
    }
}

/// Central finite differences, non finite components zeroed
fn gradient<ObjF>(objfn: &ObjF, x: &[f64]) -> Vec<f64>
where
    ObjF: Fn(&[f64]) -> f64,
{
    let f = |x: &Vec<f64>| -> f64 { objfn(x.as_slice()) };
    x.to_vec()
        .central_diff(&f)
        .into_iter()
        .map(|g| if g.is_finite() { g } else { 0. })
        .collect()
}

/// Minimize `objfn` within `bounds` starting from `param0` with SLSQP
pub(crate) fn optimize_params_slsqp<ObjF>(
    objfn: ObjF,
    param0: &[f64],
    bounds: &[(f64, f64)],
    slsqp_params: SlsqpParams,
) -> (f64, Array1<f64>)
where
    ObjF: Fn(&[f64]) -> f64,
{
    let obj = |x: &[f64], grad: Option<&mut [f64]>, _params: &mut ()| -> f64 {
        // SLSQP may probe NaNs on degenerate steps
        if x.iter().any(|v| v.is_nan()) {
            return f64::INFINITY;
        }
        if let Some(grad) = grad {
            grad.copy_from_slice(&gradient(&objfn, x));
        }
        objfn(x)
    };
    let cons: Vec<&dyn slsqp::Func<()>> = vec![];

    match slsqp::minimize(
        obj,
        param0,
        bounds,
        &cons,
        (),
        slsqp_params.max_eval,
        Some(slsqp::StopTols {
            ftol_rel: slsqp_params.ftol_rel,
            ..slsqp::StopTols::default()
        }),
    ) {
        Ok((_, x_opt, fval)) => {
            let fval = if fval.is_nan() { f64::INFINITY } else { fval };
            (fval, arr1(&x_opt))
        }
        Err((status, x_opt, _)) => {
            // last iterate is still usable when the budget is exhausted
            let fval = objfn(x_opt.as_slice());
            debug!("SLSQP stopped with status={status:?}, last value={fval}");
            let fval = if fval.is_nan() { f64::INFINITY } else { fval };
            (fval, arr1(&x_opt))
        }
    }
}

/// Minimize `objfn` with a fixed number of Adam steps, iterates are projected
/// onto `bounds`. Returns the best iterate.
pub(crate) fn optimize_params_adam<ObjF>(
    objfn: ObjF,
    param0: &[f64],
    bounds: &[(f64, f64)],
    adam: AdamParams,
) -> (f64, Array1<f64>)
where
    ObjF: Fn(&[f64]) -> f64,
{
    let n = param0.len();
    let mut x = param0.to_vec();
    let mut m = vec![0.; n];
    let mut v = vec![0.; n];
    let mut best = (objfn(x.as_slice()), x.clone());

    for t in 1..=adam.epochs {
        let g = gradient(&objfn, &x);
        let bias1 = 1. - adam.beta1.powi(t as i32);
        let bias2 = 1. - adam.beta2.powi(t as i32);
        for i in 0..n {
            m[i] = adam.beta1 * m[i] + (1. - adam.beta1) * g[i];
            v[i] = adam.beta2 * v[i] + (1. - adam.beta2) * g[i] * g[i];
            let step = adam.lr * (m[i] / bias1) / ((v[i] / bias2).sqrt() + adam.eps);
            x[i] = (x[i] - step).clamp(bounds[i].0, bounds[i].1);
        }
        let fx = objfn(x.as_slice());
        if fx < best.0 {
            best = (fx, x.clone());
        }
    }
    let fval = if best.0.is_nan() { f64::INFINITY } else { best.0 };
    (fval, arr1(&best.1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn shifted_sphere(x: &[f64]) -> f64 {
        x.iter().map(|v| (v - 0.5) * (v - 0.5)).sum()
    }

    #[test]
    fn test_slsqp_sphere() {
        let (fmin, xmin) = optimize_params_slsqp(
            shifted_sphere,
            &[2., -1.],
            &[(-3., 3.), (-3., 3.)],
            SlsqpParams::default(),
        );
        assert_abs_diff_eq!(fmin, 0., epsilon = 1e-6);
        assert_abs_diff_eq!(xmin, arr1(&[0.5, 0.5]), epsilon = 1e-3);
    }

    #[test]
    fn test_slsqp_rosenbrock() {
        let rosen = |x: &[f64]| argmin_testfunctions::rosenbrock(x);
        let (fmin, xmin) = optimize_params_slsqp(
            rosen,
            &[-1., 1.5],
            &[(-2., 2.), (-2., 2.)],
            SlsqpParams {
                max_eval: 500,
                ..SlsqpParams::default()
            },
        );
        assert!(fmin < 1e-2, "fmin = {fmin}");
        assert_abs_diff_eq!(xmin, arr1(&[1., 1.]), epsilon = 1e-1);
    }

    #[test]
    fn test_adam_sphere_stays_in_bounds() {
        let (fmin, xmin) = optimize_params_adam(
            shifted_sphere,
            &[-1., 0.],
            &[(-1., 0.3), (-1., 1.)],
            AdamParams::new(0.05, 300),
        );
        // first component is bounded away from its unconstrained minimum
        assert_abs_diff_eq!(xmin[0], 0.3, epsilon = 1e-2);
        assert_abs_diff_eq!(xmin[1], 0.5, epsilon = 5e-2);
        assert!(fmin < 0.05);
    }
}
