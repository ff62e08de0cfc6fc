//! Bounded least-squares fit of a single normalized Gaussian.
//!
//! The engine fits `integral * N(x; center, sigma)` to a narrow window of
//! histogram bins, with box bounds on all three parameters. The solver is a
//! small Levenberg-Marquardt iteration with additive damping and parameter
//! clamping; it reports convergence or gives up after a fixed number of
//! iterations, and the caller decides what a failed or saturated fit means.

use crate::histogram::gaussian_density;

const MAX_ITERATIONS: usize = 100;
const INITIAL_LAMBDA: f64 = 1e-3;
const MIN_LAMBDA: f64 = 1e-12;
const MAX_LAMBDA: f64 = 1e12;
/// Relative SSE improvement below which the fit counts as converged.
const RELATIVE_TOLERANCE: f64 = 1e-10;
/// SSE below which the fit is a perfect interpolation.
const ABSOLUTE_TOLERANCE: f64 = 1e-24;

/// A converged Gaussian fit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GaussianFit {
    /// Area under the fitted curve.
    pub integral: f64,
    /// Fitted peak position.
    pub center: f64,
    /// Fitted width, non-negative. A value at a box bound means the true
    /// optimum lies outside the allowed range.
    pub sigma: f64,
    /// Final sum of squared residuals.
    pub sse: f64,
    /// Iterations spent.
    pub iterations: usize,
}

#[inline]
fn model(x: f64, p: &[f64; 3]) -> f64 {
    p[0] * gaussian_density(x, p[1], p[2])
}

fn sum_of_squares(xs: &[f64], ys: &[f64], p: &[f64; 3]) -> f64 {
    xs.iter()
        .zip(ys)
        .map(|(&x, &y)| {
            let r = model(x, p) - y;
            r * r
        })
        .sum()
}

/// J^T J and J^T r for the current parameters.
fn normal_equations(xs: &[f64], ys: &[f64], p: &[f64; 3]) -> ([[f64; 3]; 3], [f64; 3]) {
    let mut jtj = [[0.0; 3]; 3];
    let mut jtr = [0.0; 3];
    for (&x, &y) in xs.iter().zip(ys) {
        let density = gaussian_density(x, p[1], p[2]);
        let z = (x - p[1]) / p[2];
        let f = p[0] * density;
        // d/d(integral), d/d(center), d/d(sigma)
        let j = [density, f * z / p[2], f * (z * z - 1.0) / p[2]];
        let r = f - y;
        for a in 0..3 {
            jtr[a] += j[a] * r;
            for b in 0..3 {
                jtj[a][b] += j[a] * j[b];
            }
        }
    }
    (jtj, jtr)
}

/// Solves the damped 3x3 system by Gaussian elimination with partial
/// pivoting. Returns `None` for a (numerically) singular matrix.
fn solve3(mut a: [[f64; 3]; 3], mut b: [f64; 3]) -> Option<[f64; 3]> {
    for col in 0..3 {
        let mut pivot = col;
        for row in col + 1..3 {
            if a[row][col].abs() > a[pivot][col].abs() {
                pivot = row;
            }
        }
        if a[pivot][col].abs() < 1e-300 {
            return None;
        }
        a.swap(col, pivot);
        b.swap(col, pivot);
        for row in col + 1..3 {
            let factor = a[row][col] / a[col][col];
            for k in col..3 {
                a[row][k] -= factor * a[col][k];
            }
            b[row] -= factor * b[col];
        }
    }
    let mut x = [0.0; 3];
    for row in (0..3).rev() {
        let mut sum = b[row];
        for k in row + 1..3 {
            sum -= a[row][k] * x[k];
        }
        x[row] = sum / a[row][row];
    }
    Some(x)
}

/// Fits `integral * N(x; center, sigma)` to `(xs, ys)` with the given seed
/// and per-parameter `[integral, center, sigma]` box bounds.
///
/// Returns `None` when the data is empty or mismatched, a bound is
/// inverted, or the iteration limit is reached before convergence.
#[must_use]
pub fn fit_gaussian(
    xs: &[f64],
    ys: &[f64],
    seed: [f64; 3],
    lower: [f64; 3],
    upper: [f64; 3],
) -> Option<GaussianFit> {
    if xs.is_empty() || xs.len() != ys.len() {
        return None;
    }
    for k in 0..3 {
        if lower[k] > upper[k] {
            return None;
        }
    }
    let clamp = |p: [f64; 3]| {
        [
            p[0].clamp(lower[0], upper[0]),
            p[1].clamp(lower[1], upper[1]),
            p[2].clamp(lower[2], upper[2]),
        ]
    };
    let done = |p: [f64; 3], sse: f64, iterations: usize| GaussianFit {
        integral: p[0],
        center: p[1],
        sigma: p[2].abs(),
        sse,
        iterations,
    };

    let mut p = clamp(seed);
    let mut sse = sum_of_squares(xs, ys, &p);
    if !sse.is_finite() {
        return None;
    }
    if sse <= ABSOLUTE_TOLERANCE {
        return Some(done(p, sse, 0));
    }

    let mut lambda = INITIAL_LAMBDA;
    for iteration in 1..=MAX_ITERATIONS {
        let (jtj, jtr) = normal_equations(xs, ys, &p);
        loop {
            let mut damped = jtj;
            for k in 0..3 {
                damped[k][k] += lambda;
            }
            let mut improved = false;
            if let Some(step) = solve3(damped, jtr) {
                let candidate = clamp([p[0] - step[0], p[1] - step[1], p[2] - step[2]]);
                let candidate_sse = sum_of_squares(xs, ys, &candidate);
                if candidate_sse.is_finite() && candidate_sse < sse {
                    let improvement = (sse - candidate_sse) / sse;
                    p = candidate;
                    sse = candidate_sse;
                    lambda = (lambda / 10.0).max(MIN_LAMBDA);
                    if improvement < RELATIVE_TOLERANCE || sse <= ABSOLUTE_TOLERANCE {
                        return Some(done(p, sse, iteration));
                    }
                    improved = true;
                }
            }
            if improved {
                break;
            }
            lambda *= 10.0;
            if lambda > MAX_LAMBDA {
                // No damping produces a downhill step: at a local minimum.
                return Some(done(p, sse, iteration));
            }
        }
    }
    None
}
