//! Regularized selection policy solved by bisection.
//!
//! Given priors `pi`, rescaled action values `q` and a per-node coefficient
//! `lambda_n`, the selection policy is `p_a ∝ lambda_n * pi_a / (alpha - q_a)`
//! with `alpha` the scalar that makes `p` sum to one. For `alpha` above
//! `max_a(q_a)` the residual `f(alpha) = Σ_a p_a(alpha) - 1` is monotonically
//! decreasing and changes sign on the bracket
//! `[max_a(q_a + lambda_n * pi_a), max_a(q_a) + lambda_n]`, so a plain
//! bisection finds the root. Everything here is batched: one row per node,
//! every row bisected in lock-step.

use ndarray::{Array1, Array2, Axis};
use tracing::debug;

use crate::error::{Result, SearchError};

/// Absolute tolerance on the bisection residual.
pub const TOL: f32 = 1e-3;

/// Exploration coefficient for a node with `total_visits` visits over an
/// action space of `n_actions`. Grows toward `c_puct` as visits accumulate;
/// the floor at one visit keeps fresh nodes off a degenerate zero bracket.
pub fn lambda_n(c_puct: f32, total_visits: f32, n_actions: usize) -> f32 {
    let n = total_visits.max(1.0);
    c_puct * n / (n_actions as f32 + n)
}

fn nan_guard(y: &Array1<f32>) -> Result<()> {
    if y.iter().any(|v| v.is_nan()) {
        return Err(SearchError::NanResidual);
    }
    Ok(())
}

/// Batched bisection over monotonically decreasing residuals.
///
/// Each row searches its `[lo, hi]` bracket for a root of `f`, to absolute
/// tolerance `tol` on the residual, stopping early when the bracket
/// underflows (the midpoint becomes indistinguishable from an endpoint).
/// Rows whose bracket already disagrees with the expected sign at entry
/// (`f(lo) < -tol` or `f(hi) > tol`) are flagged and resolved to whichever
/// endpoint has the smaller absolute entry residual; they never abort the
/// batch. A sign violation appearing later on a healthy row is fatal.
///
/// # Errors
/// `NanResidual` if any evaluated residual is NaN, `BracketInvariant` if a
/// healthy row's endpoint crosses the root mid-search.
pub fn bisect<F>(f: F, lo: &Array1<f32>, hi: &Array1<f32>, tol: f32) -> Result<Array1<f32>>
where
    F: Fn(&Array1<f32>) -> Array1<f32>,
{
    let k = lo.len();
    let mut xl = lo.clone();
    let mut xr = hi.clone();
    let mut yl = f(&xl);
    nan_guard(&yl)?;
    let mut yr = f(&xr);
    nan_guard(&yr)?;

    let bad: Vec<bool> = (0..k).map(|i| yl[i] < -tol || yr[i] > tol).collect();
    let n_bad = bad.iter().filter(|&&b| b).count();
    if n_bad > 0 {
        debug!(
            rows = n_bad,
            "bisection bracket violated at entry, falling back to endpoints"
        );
    }
    let yl_entry = yl.clone();
    let yr_entry = yr.clone();

    loop {
        let xm = Array1::from_shape_fn(k, |i| xl[i] + 0.5 * (xr[i] - xl[i]));
        let ym = f(&xm);
        nan_guard(&ym)?;

        for i in 0..k {
            if bad[i] {
                continue;
            }
            if yl[i] < -tol {
                return Err(SearchError::BracketInvariant {
                    side: "left",
                    residual: yl[i],
                });
            }
            if yr[i] > tol {
                return Err(SearchError::BracketInvariant {
                    side: "right",
                    residual: yr[i],
                });
            }
        }

        let mut all_done = true;
        for i in 0..k {
            let underflow = xm[i] == xl[i] || xm[i] == xr[i];
            if !(bad[i] || ym[i].abs() <= tol || underflow) {
                all_done = false;
            }
        }

        for i in 0..k {
            if ym[i] > 0.0 {
                xl[i] = xm[i];
                yl[i] = ym[i];
            } else {
                xr[i] = xm[i];
                yr[i] = ym[i];
            }
        }

        if all_done {
            let mut roots = xm;
            for i in 0..k {
                if bad[i] {
                    roots[i] = if yl_entry[i].abs() <= yr_entry[i].abs() {
                        lo[i]
                    } else {
                        hi[i]
                    };
                }
            }
            return Ok(roots);
        }
    }
}

/// Solve the regularized selection policy for a batch of nodes.
///
/// `pi` must be row-stochastic, `q` rescaled to `[0, 1]` rowwise, and
/// `lambdas` strictly positive; one row per node. Returned rows are valid
/// probability distributions. An `alpha` landing exactly on some `q_a`
/// (reachable only through floating-point rounding when `lambda * pi_a` is
/// below the local ulp) drives that action's weight to `+inf` and resolves
/// to a one-hot policy on that action.
///
/// # Errors
/// Propagates the fatal conditions of [`bisect`].
pub fn regularized_policy(
    pi: &Array2<f32>,
    q: &Array2<f32>,
    lambdas: &Array1<f32>,
) -> Result<Array2<f32>> {
    let (k, n_actions) = pi.dim();
    let lo = Array1::from_shape_fn(k, |i| {
        (0..n_actions)
            .map(|a| q[[i, a]] + lambdas[i] * pi[[i, a]])
            .fold(f32::NEG_INFINITY, f32::max)
    });
    let hi = Array1::from_shape_fn(k, |i| {
        (0..n_actions)
            .map(|a| q[[i, a]])
            .fold(f32::NEG_INFINITY, f32::max)
            + lambdas[i]
    });

    let weights = |alpha: &Array1<f32>| {
        Array2::from_shape_fn((k, n_actions), |(i, a)| {
            lambdas[i] * pi[[i, a]] / (alpha[i] - q[[i, a]])
        })
    };
    let residual = |alpha: &Array1<f32>| weights(alpha).sum_axis(Axis(1)) - 1.0;

    let alpha = bisect(residual, &lo, &hi, TOL)?;

    let mut p = weights(&alpha);
    for i in 0..k {
        let singular = (0..n_actions).find(|&a| p[[i, a]] == f32::INFINITY);
        let mut row = p.row_mut(i);
        if let Some(a) = singular {
            row.fill(0.0);
            row[a] = 1.0;
        } else {
            let total = row.sum();
            row.mapv_inplace(|w| w / total);
        }
    }
    Ok(p)
}
