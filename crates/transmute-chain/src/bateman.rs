//! Closed-form Bateman solution for one linear path.
//!
//! For removal constants `λ_1 … λ_n` along a root-to-node path and
//! cumulative branch fraction `B`, the tail amount per unit root amount is
//!
//! ```text
//! N_n(t) = B · ∏_{j<n} λ_j · Σ_i e^{-λ_i t} / ∏_{j≠i} (λ_j − λ_i)
//! ```
//!
//! Equal (or nearly equal) constants make the plain sum divide by zero, so
//! the constants are grouped into roots with multiplicity and each root
//! contributes its full residue: `e^{-r t}` times a polynomial in `t`.
//!
//! When every `λ t` is small the residues cancel badly; the same quantity
//! is then taken from its power series in `λ t` instead. Residues also
//! cancel when a long-lived member sits next to a stable tail (the tail
//! residue is exactly 1, the parent's is nearly -1). Whenever the residue
//! terms are much larger than their sum, the path is re-evaluated by
//! scaling and squaring the power series: every squaring step sums
//! non-negative products, so nothing cancels.

use ordered_float::OrderedFloat;

use transmute_core::constants::DEGENERACY_RTOL;

use crate::tree::{DecayChainTree, NodeId};

/// Largest `λ_max · t` evaluated through the power series.
const SERIES_LIMIT: f64 = 0.5;
/// Terms kept in the power series. The remainder is below 1e-40 at the limit.
const SERIES_TERMS: usize = 30;
/// Largest ratio of `Σ|terms|` to the residue sum accepted before the path
/// is re-evaluated by scaling and squaring.
const CANCELLATION_LIMIT: f64 = 1e3;
/// Cap on halvings of `t`; keeps `2^s` finite.
const MAX_SQUARINGS: i32 = 1000;

/// Amount of a path's tail nuclide per unit root amount.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PathSolution {
    pub amount: f64,
    /// Two or more removal constants were merged into one root.
    pub degenerate: bool,
    /// Rounding pushed the result outside `[0, B]` and it was clamped.
    pub clamped: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BatemanSolver {
    rtol: f64,
}

impl Default for BatemanSolver {
    fn default() -> Self {
        Self::new(DEGENERACY_RTOL)
    }
}

impl BatemanSolver {
    /// `rtol` is the relative distance under which two removal constants
    /// are treated as one root.
    pub fn new(rtol: f64) -> Self {
        Self { rtol }
    }

    pub fn rtol(&self) -> f64 {
        self.rtol
    }

    /// Tail amount of the path `lambdas` (root first) after `t`.
    pub fn solve(&self, lambdas: &[f64], branch_fraction: f64, t: f64) -> PathSolution {
        let Some((&tail, chain)) = lambdas.split_last() else {
            return PathSolution::default();
        };
        if !branch_fraction.is_finite() || branch_fraction <= 0.0 {
            return PathSolution::default();
        }
        if t == 0.0 {
            let amount = if chain.is_empty() { branch_fraction } else { 0.0 };
            return PathSolution {
                amount,
                ..PathSolution::default()
            };
        }
        // A stable ancestor never feeds its daughters.
        if chain.iter().any(|l| *l == 0.0) {
            return PathSolution::default();
        }
        if chain.is_empty() {
            return finish(branch_fraction * (-tail * t).exp(), branch_fraction, false);
        }

        let roots = group_roots(lambdas, self.rtol);
        let degenerate = roots.len() < lambdas.len();
        let lambda_max = lambdas.iter().copied().fold(0.0, f64::max);
        let per_unit = if lambda_max * t <= SERIES_LIMIT {
            small_time_series(lambdas, t)
        } else {
            let (sum, magnitude) = residue_sum(chain, &roots, t);
            if well_conditioned(sum, magnitude) {
                sum
            } else {
                squared_series(lambdas, lambda_max, t)
            }
        };
        finish(branch_fraction * per_unit, branch_fraction, degenerate)
    }

    /// Tail amount of the path from the root of `tree` to `id`.
    pub fn solve_path(&self, tree: &DecayChainTree, id: NodeId, t: f64) -> PathSolution {
        let lambdas = tree.path_lambdas(id);
        self.solve(&lambdas, tree.node(id).fraction, t)
    }
}

fn finish(amount: f64, bound: f64, degenerate: bool) -> PathSolution {
    if amount.is_nan() || amount < 0.0 {
        return PathSolution {
            amount: 0.0,
            degenerate,
            clamped: true,
        };
    }
    if amount > bound {
        return PathSolution {
            amount: bound,
            degenerate,
            clamped: true,
        };
    }
    PathSolution {
        amount,
        degenerate,
        clamped: false,
    }
}

/// A distinct root of the characteristic polynomial.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Root {
    value: f64,
    multiplicity: usize,
}

fn group_roots(lambdas: &[f64], rtol: f64) -> Vec<Root> {
    let mut sorted = lambdas.to_vec();
    sorted.sort_by(f64::total_cmp);

    // (first member, running sum, multiplicity)
    let mut groups: Vec<(f64, f64, usize)> = Vec::new();
    for l in sorted {
        match groups.last_mut() {
            Some((first, sum, m)) if l - *first <= rtol * l.abs() => {
                *sum += l;
                *m += 1;
            }
            _ => groups.push((l, l, 1)),
        }
    }
    groups
        .into_iter()
        .map(|(_, sum, m)| Root {
            value: sum / m as f64,
            multiplicity: m,
        })
        .collect()
}

/// Σ over roots of the residue of `e^{st} / ∏_j (s + λ_j)`, scaled by
/// `∏ numerators`, together with `Σ |term|`.
fn residue_sum(numerators: &[f64], roots: &[Root], t: f64) -> (f64, f64) {
    let mut numerators = numerators.to_vec();
    numerators.sort_by(|a, b| b.total_cmp(a));

    let mut terms = Vec::with_capacity(roots.len());
    for (k, root) in roots.iter().enumerate() {
        let decay = (-root.value * t).exp();
        if decay == 0.0 {
            continue;
        }

        let order = root.multiplicity - 1;
        let mut series = vec![0.0; order + 1];
        series[0] = 1.0;
        let mut denominators = Vec::new();
        for (j, other) in roots.iter().enumerate() {
            if j == k {
                continue;
            }
            let d = other.value - root.value;
            denominators.extend(std::iter::repeat_n(d, other.multiplicity));
            if order > 0 {
                mul_binomial_series(&mut series, d, other.multiplicity);
            }
        }
        denominators.sort_by(|a, b| b.abs().total_cmp(&a.abs()));
        let scale = paired_product(&numerators, &denominators);

        // Σ_{p=0}^{order} t^p / p! · S_{order-p}
        let mut poly = 0.0;
        let mut t_pow = 1.0;
        for p in 0..=order {
            if p > 0 {
                t_pow *= t / p as f64;
            }
            poly += t_pow * series[order - p];
        }
        terms.push(scale * decay * poly);
    }
    let magnitude = terms.iter().map(|v| v.abs()).sum();
    (compensated_sum(terms), magnitude)
}

/// Rounding in each residue term is at most `ε · magnitude`; accept the sum
/// when that stays small next to the sum itself.
fn well_conditioned(sum: f64, magnitude: f64) -> bool {
    magnitude == 0.0 || (sum > 0.0 && magnitude <= CANCELLATION_LIMIT * sum)
}

/// Tail amount from the full transition matrix `E(t)`, where `E[i][j]` is
/// the amount of member `j` grown from a unit of member `i`.
///
/// `E(t/2^s)` comes from the power series, then `E(2τ) = E(τ)²` is applied
/// `s` times. Entries are non-negative so each product sum is exact to a
/// few ulps; the diagonal is reset to `e^{-λ_i τ}` at every level instead
/// of being squared, which would double its relative error each step.
fn squared_series(lambdas: &[f64], lambda_max: f64, t: f64) -> f64 {
    let n = lambdas.len();
    let halvings = (lambda_max * t / SERIES_LIMIT).log2().ceil();
    let s = if halvings.is_finite() && halvings > 0.0 {
        (halvings as i32).min(MAX_SQUARINGS)
    } else {
        0
    };
    let mut tau = t / 2f64.powi(s);

    let mut e = vec![vec![0.0; n]; n];
    for i in 0..n {
        for j in i..n {
            e[i][j] = small_time_series(&lambdas[i..=j], tau);
        }
    }

    for _ in 0..s {
        tau *= 2.0;
        let mut next = vec![vec![0.0; n]; n];
        for i in 0..n {
            next[i][i] = (-lambdas[i] * tau).exp();
            for j in i + 1..n {
                next[i][j] = (i..=j).map(|k| e[i][k] * e[k][j]).sum();
            }
        }
        e = next;
    }
    e[0][n - 1]
}

/// Multiply the truncated series in place by `(1 + h/d)^{-m}`.
fn mul_binomial_series(series: &mut [f64], d: f64, m: usize) {
    let len = series.len();
    let mut coeffs = vec![1.0; len];
    for q in 1..len {
        coeffs[q] = coeffs[q - 1] * (-((m + q - 1) as f64) / q as f64) / d;
    }
    for i in (0..len).rev() {
        let mut acc = 0.0;
        for q in 0..=i {
            acc += series[i - q] * coeffs[q];
        }
        series[i] = acc;
    }
}

/// `∏ numerators / ∏ denominators`, dividing pairwise so intermediate
/// values stay near 1. Needs `numerators.len() >= denominators.len()`.
fn paired_product(numerators: &[f64], denominators: &[f64]) -> f64 {
    let mut nums = numerators.iter();
    let mut acc = 1.0;
    for d in denominators {
        acc *= nums.next().copied().unwrap_or(1.0) / d;
    }
    nums.fold(acc, |acc, n| acc * n)
}

/// `∏_{j<n} y_j · Σ_k (-1)^k h_k(y) / (n-1+k)!` with `y = λ t`, where
/// `h_k` is the complete homogeneous symmetric polynomial.
fn small_time_series(lambdas: &[f64], t: f64) -> f64 {
    let n = lambdas.len();
    let mut h = [0.0; SERIES_TERMS + 1];
    h[0] = 1.0;
    for l in lambdas {
        let y = l * t;
        for k in 1..=SERIES_TERMS {
            h[k] += y * h[k - 1];
        }
    }

    // ∏_{j<n} y_j / (n-1)!
    let prefactor = lambdas[..n - 1]
        .iter()
        .enumerate()
        .fold(1.0, |acc, (j, l)| acc * l * t / (j + 1) as f64);

    let mut terms = Vec::with_capacity(SERIES_TERMS + 1);
    let mut denom = 1.0;
    for (k, hk) in h.iter().enumerate() {
        if k > 0 {
            denom *= (n - 1 + k) as f64;
        }
        let sign = if k % 2 == 0 { 1.0 } else { -1.0 };
        terms.push(sign * hk / denom);
    }
    prefactor * compensated_sum(terms)
}

/// Neumaier summation in ascending magnitude.
fn compensated_sum(mut terms: Vec<f64>) -> f64 {
    terms.sort_by_key(|v| OrderedFloat(v.abs()));
    let mut sum = 0.0;
    let mut c = 0.0;
    for v in terms {
        let s = sum + v;
        if f64::abs(sum) >= f64::abs(v) {
            c += (sum - s) + v;
        } else {
            c += (v - s) + sum;
        }
        sum = s;
    }
    sum + c
}
