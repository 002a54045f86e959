use crate::criteria::AcquisitionFunction;
use crate::errors::{BboError, Result};
use bbo_doe::{Random, SamplingMethod};
use finitediff::FiniteDiff;
use log::debug;
use ndarray::{arr1, Array1, Array2, ArrayView2, Axis, Zip};
use ndarray_rand::rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256Plus;
use rayon::prelude::*;
use std::cmp::Ordering;

/// Default number of local optimizations
pub const NUM_RESTARTS: usize = 10;
/// Default number of random batches screened for starting points
pub const RAW_SAMPLES: usize = 1024;
/// Default budget of acquisition evaluations of one local optimization
pub const ACQF_MAX_EVAL: usize = 200;

const FTOL_REL: f64 = 1e-6;

/// Settings of the multistart gradient acquisition optimizer
#[derive(Clone, Debug)]
pub struct GradientOptimizerParams {
    /// Number of local optimizations
    pub num_restarts: usize,
    /// Number of random batches screened for starting points
    pub raw_samples: usize,
    /// Evaluation budget of one local optimization
    pub max_eval: usize,
    /// Run the restarts on the rayon thread pool
    pub parallel: bool,
}

impl Default for GradientOptimizerParams {
    fn default() -> Self {
        GradientOptimizerParams {
            num_restarts: NUM_RESTARTS,
            raw_samples: RAW_SAMPLES,
            max_eval: ACQF_MAX_EVAL,
            parallel: false,
        }
    }
}

/// Central finite differences, non finite components zeroed
fn gradient<F: Fn(&[f64]) -> f64>(objfn: &F, x: &[f64]) -> Vec<f64> {
    let f = |x: &Vec<f64>| -> f64 { objfn(x.as_slice()) };
    x.to_vec()
        .central_diff(&f)
        .into_iter()
        .map(|g| if g.is_finite() { g } else { 0. })
        .collect()
}

/// Joint acquisition value of a flattened `(q, d)` batch
fn batch_value(acqf: &dyn AcquisitionFunction, x: &[f64], d: usize) -> f64 {
    match ArrayView2::from_shape((x.len() / d, d), x) {
        Ok(batch) => acqf.value(&batch),
        Err(_) => f64::MIN,
    }
}

/// Local minimization of the negated acquisition from `xinit` with SLSQP
fn local_search(
    acqf: &dyn AcquisitionFunction,
    xinit: &[f64],
    bounds: &[(f64, f64)],
    d: usize,
    max_eval: usize,
) -> (f64, Array1<f64>) {
    let neg_acqf = |x: &[f64]| -> f64 {
        let v = -batch_value(acqf, x, d);
        if v.is_finite() {
            v
        } else {
            f64::INFINITY
        }
    };
    let obj = |x: &[f64], grad: Option<&mut [f64]>, _data: &mut ()| -> f64 {
        if x.iter().any(|v| v.is_nan()) {
            return f64::INFINITY;
        }
        if let Some(grad) = grad {
            grad.copy_from_slice(&gradient(&neg_acqf, x));
        }
        neg_acqf(x)
    };
    let cons: Vec<&dyn slsqp::Func<()>> = vec![];
    let (x_opt, f_opt) = match slsqp::minimize(
        obj,
        xinit,
        bounds,
        &cons,
        (),
        max_eval,
        Some(slsqp::StopTols {
            ftol_rel: FTOL_REL,
            ..slsqp::StopTols::default()
        }),
    ) {
        Ok((_, x_opt, f_opt)) => (x_opt, f_opt),
        Err((status, x_opt, _)) => {
            debug!("SLSQP stopped with status={status:?}");
            let f_opt = neg_acqf(&x_opt);
            (x_opt, f_opt)
        }
    };
    // SLSQP iterates may slightly overshoot the bounds
    let x_opt: Vec<f64> = x_opt
        .iter()
        .zip(bounds)
        .map(|(v, (lb, ub))| v.clamp(*lb, *ub))
        .collect();
    let f_opt = if f_opt.is_nan() { f64::INFINITY } else { f_opt };
    (f_opt.min(neg_acqf(&x_opt)), arr1(&x_opt))
}

/// Maximize a batch acquisition function over the box `xlimits` `(d, 2)` and
/// return the best `(q, d)` batch found.
///
/// `raw_samples` random batches are scored, the `num_restarts` best ones
/// start SLSQP local searches (gradients by central finite differences) over
/// the flattened `q * d` batch coordinates, and the best local optimum wins.
pub fn optimize_acqf_gradient<R: Rng>(
    acqf: &dyn AcquisitionFunction,
    xlimits: &Array2<f64>,
    q: usize,
    params: &GradientOptimizerParams,
    rng: &mut R,
) -> Result<Array2<f64>> {
    let d = xlimits.nrows();
    if q == 0 || d == 0 {
        return Err(BboError::InvalidValue(format!(
            "cannot optimize a ({q}, {d}) batch"
        )));
    }
    let raw_samples = params.raw_samples.max(1);
    let num_restarts = params.num_restarts.clamp(1, raw_samples);

    let sampler = Random::new(xlimits).with_rng(Xoshiro256Plus::seed_from_u64(rng.gen()));
    let raw = sampler
        .sample(raw_samples * q)
        .into_shape((raw_samples, q * d))
        .map_err(|e| BboError::InvalidValue(e.to_string()))?;

    let mut raw_values = Array1::<f64>::zeros(raw_samples);
    let score = |v: &mut f64, x: ndarray::ArrayView1<f64>| {
        *v = x
            .as_slice()
            .map(|x| batch_value(acqf, x, d))
            .unwrap_or(f64::MIN);
    };
    if params.parallel {
        Zip::from(&mut raw_values)
            .and(raw.rows())
            .par_for_each(score);
    } else {
        Zip::from(&mut raw_values).and(raw.rows()).for_each(score);
    }

    let mut order: Vec<usize> = (0..raw_samples).collect();
    order.sort_by(|&a, &b| {
        raw_values[b]
            .partial_cmp(&raw_values[a])
            .unwrap_or(Ordering::Equal)
    });
    let starts = raw.select(Axis(0), &order[..num_restarts]);
    debug!(
        "Acquisition {} best raw sample value {}",
        acqf.name(),
        raw_values[order[0]]
    );

    let bounds: Vec<(f64, f64)> = (0..q)
        .flat_map(|_| xlimits.rows().into_iter().map(|r| (r[0], r[1])).collect::<Vec<_>>())
        .collect();

    let optimize = |i: usize| -> (f64, Array1<f64>) {
        let xinit = starts.row(i).to_vec();
        let res = local_search(acqf, &xinit, &bounds, d, params.max_eval);
        debug!("Restart {i}: acquisition value {}", -res.0);
        res
    };
    let init = || (f64::INFINITY, starts.row(0).to_owned());
    let best = if params.parallel {
        (0..num_restarts)
            .into_par_iter()
            .map(optimize)
            .reduce(init, |a, b| if b.0 < a.0 { b } else { a })
    } else {
        (0..num_restarts)
            .map(optimize)
            .fold(init(), |a, b| if b.0 < a.0 { b } else { a })
    };

    // local searches failed: fall back to the best raw batch
    let x_best = if best.0.is_finite() {
        best.1
    } else {
        starts.row(0).to_owned()
    };
    x_best
        .into_shape((q, d))
        .map_err(|e| BboError::InvalidValue(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    /// Peaks at (0.3, 0.7) for each point of the batch and rewards spread
    struct Bump;

    impl AcquisitionFunction for Bump {
        fn name(&self) -> &'static str {
            "bump"
        }

        fn value(&self, x: &ArrayView2<f64>) -> f64 {
            x.rows()
                .into_iter()
                .map(|r| -((r[0] - 0.3).powi(2) + (r[1] - 0.7).powi(2)))
                .sum()
        }
    }

    #[test]
    fn test_single_point() {
        let xlimits = array![[0., 1.], [0., 1.]];
        let mut rng = Xoshiro256Plus::seed_from_u64(42);
        let params = GradientOptimizerParams {
            num_restarts: 3,
            raw_samples: 64,
            ..GradientOptimizerParams::default()
        };
        let x = optimize_acqf_gradient(&Bump, &xlimits, 1, &params, &mut rng).unwrap();
        assert_eq!(x.dim(), (1, 2));
        assert_abs_diff_eq!(x, array![[0.3, 0.7]], epsilon = 1e-3);
    }

    #[test]
    fn test_batch_within_bounds() {
        let xlimits = array![[-1., 0.2], [0.5, 2.]];
        let mut rng = Xoshiro256Plus::seed_from_u64(0);
        let params = GradientOptimizerParams {
            num_restarts: 2,
            raw_samples: 32,
            parallel: true,
            ..GradientOptimizerParams::default()
        };
        let x = optimize_acqf_gradient(&Bump, &xlimits, 3, &params, &mut rng).unwrap();
        assert_eq!(x.dim(), (3, 2));
        for row in x.rows() {
            assert!((-1. ..=0.2).contains(&row[0]));
            assert!((0.5..=2.).contains(&row[1]));
            assert_abs_diff_eq!(row[0], 0.2, epsilon = 1e-3);
            assert_abs_diff_eq!(row[1], 0.7, epsilon = 1e-3);
        }
    }

    #[test]
    fn test_empty_batch_is_rejected() {
        let xlimits = array![[0., 1.]];
        let mut rng = Xoshiro256Plus::seed_from_u64(0);
        let params = GradientOptimizerParams::default();
        assert!(optimize_acqf_gradient(&Bump, &xlimits, 0, &params, &mut rng).is_err());
    }
}
