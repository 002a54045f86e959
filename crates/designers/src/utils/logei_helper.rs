use libm::{erfc, exp, expm1, log, log1p};

const INV_SQRT_2: f64 = std::f64::consts::FRAC_1_SQRT_2;
const LOG_2PI_OVER_2: f64 = 0.9189385332046727; // log(2π)/2
const LOG_PI_OVER_2_ALL_OVER_2: f64 = 0.2257913526447274; // log(π/2)/2

/// exp(u²) erfc(u) without overflow for large u
fn erfcx(u: f64) -> f64 {
    if u < 25. {
        exp(u * u) * erfc(u)
    } else {
        // asymptotic expansion
        let u2 = u * u;
        (1. - 1. / (2. * u2) + 3. / (4. * u2 * u2)) / (u * std::f64::consts::PI.sqrt())
    }
}

/// log(1 - exp(x)) for x < 0
fn log1mexp(x: f64) -> f64 {
    if x > -std::f64::consts::LN_2 {
        log(-expm1(x))
    } else {
        log1p(-exp(x))
    }
}

/// Numerically stable log(h(u)) with h(u) = φ(u) + u Φ(u), the expected
/// improvement of a standard normal over `-u`.
pub(crate) fn log_ei_helper(u: f64) -> f64 {
    if u > -1. {
        let h = crate::utils::norm_pdf(u) + u * crate::utils::norm_cdf(u);
        log(h)
    } else {
        let log_phi_u = -0.5 * u * u - LOG_2PI_OVER_2;
        let log_term = if u > -1e3 {
            let w = log(erfcx(-INV_SQRT_2 * u) * u.abs()) + LOG_PI_OVER_2_ALL_OVER_2;
            log1mexp(w)
        } else {
            -2. * log(u.abs())
        };
        log_phi_u + log_term
    }
}

/// log(softplus(x / tau)) = log(log(1 + exp(x / tau))) computed stably
pub(crate) fn log_softplus(x: f64, tau: f64) -> f64 {
    let z = x / tau;
    if z > 30. {
        log(z)
    } else if z < -30. {
        // softplus(z) ~ exp(z)
        z
    } else {
        log(log1p(exp(z)))
    }
}

/// log(mean(exp(v))) computed stably
pub(crate) fn log_mean_exp(values: &[f64]) -> f64 {
    let vmax = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if !vmax.is_finite() {
        return vmax;
    }
    let sum: f64 = values.iter().map(|v| exp(v - vmax)).sum();
    vmax + log(sum / values.len() as f64)
}
