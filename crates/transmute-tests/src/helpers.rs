//! Shared fixtures for integration tests.

use transmute_core::{Branch, DecayInfo, DecayMode, Material, Nuclide, NuclideLibrary, ReactionKind};

/// Seconds per Julian year.
pub const YEAR: f64 = 3.156e7;

/// Parse a nuclide name, panicking on typos.
pub fn nuc(s: &str) -> Nuclide {
    s.parse().unwrap_or_else(|e| panic!("bad nuclide {s:?}: {e}"))
}

pub fn material(entries: &[(&str, f64)]) -> Material {
    entries.iter().map(|(n, a)| (nuc(n), *a)).collect()
}

/// Install a test-friendly subscriber once. `RUST_LOG` overrides `level`;
/// `format = "json"` switches to structured output.
pub fn init_test_logging(level: &str, format: &str) {
    use tracing_subscriber::filter::EnvFilter;
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // A second call in the same test binary finds a subscriber already set.
    let _ = if format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_test_writer())
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_test_writer())
            .try_init()
    };
}

/// Co60 → Ni60 with the given half-life.
pub fn two_member(half_life: f64) -> NuclideLibrary {
    NuclideLibrary::new()
        .with_half_life(nuc("Co60"), half_life, &[(DecayMode::BetaMinus, 1.0)])
        .with_stable(nuc("Ni60"))
}

/// Sr90 → Y90 → Zr90 with both radioactive members sharing one decay
/// constant.
pub fn equal_constants(lambda: f64) -> NuclideLibrary {
    NuclideLibrary::new()
        .with_decay(
            nuc("Sr90"),
            DecayInfo::new(lambda, vec![Branch::decay(nuc("Y90"), 1.0, DecayMode::BetaMinus)]),
        )
        .with_decay(
            nuc("Y90"),
            DecayInfo::new(lambda, vec![Branch::decay(nuc("Zr90"), 1.0, DecayMode::BetaMinus)]),
        )
        .with_stable(nuc("Zr90"))
}

/// Sr90 → Y90 → Zr90 with independent decay constants.
pub fn parent_daughter(parent: f64, daughter: f64) -> NuclideLibrary {
    NuclideLibrary::new()
        .with_decay(
            nuc("Sr90"),
            DecayInfo::new(parent, vec![Branch::decay(nuc("Y90"), 1.0, DecayMode::BetaMinus)]),
        )
        .with_decay(
            nuc("Y90"),
            DecayInfo::new(daughter, vec![Branch::decay(nuc("Zr90"), 1.0, DecayMode::BetaMinus)]),
        )
        .with_stable(nuc("Zr90"))
}

/// Decay constants of [`branching`].
pub const BI212_LAMBDA: f64 = 0.05;
pub const PO212_LAMBDA: f64 = 0.2;
pub const TL208_LAMBDA: f64 = 0.1;

/// Bi212 splits 64/36 into Po212 and Tl208, both decaying to Pb208, with
/// round decay constants so each path can be integrated directly.
pub fn branching() -> NuclideLibrary {
    NuclideLibrary::new()
        .with_decay(
            nuc("Bi212"),
            DecayInfo::new(
                BI212_LAMBDA,
                vec![
                    Branch::decay(nuc("Po212"), 0.64, DecayMode::BetaMinus),
                    Branch::decay(nuc("Tl208"), 0.36, DecayMode::Alpha),
                ],
            ),
        )
        .with_decay(
            nuc("Po212"),
            DecayInfo::new(PO212_LAMBDA, vec![Branch::decay(nuc("Pb208"), 1.0, DecayMode::Alpha)]),
        )
        .with_decay(
            nuc("Tl208"),
            DecayInfo::new(TL208_LAMBDA, vec![Branch::decay(nuc("Pb208"), 1.0, DecayMode::BetaMinus)]),
        )
        .with_stable(nuc("Pb208"))
}

/// Amount of the last member of `λ_1 → λ_2 → stable` from a unit parent,
/// written with `exp_m1` so it stays accurate for a long-lived parent.
pub fn stable_tail_of_two(l1: f64, l2: f64, t: f64) -> f64 {
    (l2 * -(-l1 * t).exp_m1() - l1 * -(-l2 * t).exp_m1()) / (l2 - l1)
}

/// Th232 decay series with capture on Th232 and Pa233. U233 decays to
/// Th229 and Pa233 captures to Pa234, neither of which has data.
pub fn thorium_series() -> NuclideLibrary {
    NuclideLibrary::new()
        .with_half_life(nuc("Th232"), 1.405e10 * YEAR, &[(DecayMode::Alpha, 1.0)])
        .with_half_life(nuc("Ra228"), 5.75 * YEAR, &[(DecayMode::BetaMinus, 1.0)])
        .with_half_life(nuc("Ac228"), 22140.0, &[(DecayMode::BetaMinus, 1.0)])
        .with_half_life(nuc("Th228"), 1.912 * YEAR, &[(DecayMode::Alpha, 1.0)])
        .with_half_life(nuc("Ra224"), 3.66 * 86400.0, &[(DecayMode::Alpha, 1.0)])
        .with_half_life(nuc("Rn220"), 55.6, &[(DecayMode::Alpha, 1.0)])
        .with_half_life(nuc("Po216"), 0.145, &[(DecayMode::Alpha, 1.0)])
        .with_half_life(nuc("Pb212"), 38304.0, &[(DecayMode::BetaMinus, 1.0)])
        .with_half_life(
            nuc("Bi212"),
            3633.0,
            &[(DecayMode::BetaMinus, 0.6406), (DecayMode::Alpha, 0.3594)],
        )
        .with_half_life(nuc("Po212"), 2.99e-7, &[(DecayMode::Alpha, 1.0)])
        .with_half_life(nuc("Tl208"), 183.2, &[(DecayMode::BetaMinus, 1.0)])
        .with_stable(nuc("Pb208"))
        .with_half_life(nuc("Th233"), 1309.0, &[(DecayMode::BetaMinus, 1.0)])
        .with_half_life(nuc("Pa233"), 26.97 * 86400.0, &[(DecayMode::BetaMinus, 1.0)])
        .with_half_life(nuc("U233"), 1.592e5 * YEAR, &[(DecayMode::Alpha, 1.0)])
        .with_cross_section(nuc("Th232"), ReactionKind::Gamma, 7.35)
        .with_cross_section(nuc("Pa233"), ReactionKind::Gamma, 39.0)
}

/// Fe56 captures to Fe57 and transmutes by (n,p) to Mn56, which decays
/// back to Fe56.
pub fn iron_cycle() -> NuclideLibrary {
    NuclideLibrary::new()
        .with_stable(nuc("Fe56"))
        .with_stable(nuc("Fe57"))
        .with_half_life(nuc("Mn56"), 9284.0, &[(DecayMode::BetaMinus, 1.0)])
        .with_cross_section(nuc("Fe56"), ReactionKind::Gamma, 2.6)
        .with_cross_section(nuc("Fe56"), ReactionKind::Proton, 1.0)
}

/// Two nuclides feeding each other at rate 1: A ⇄ B.
pub fn ping_pong() -> NuclideLibrary {
    let a = nuc("Tc99m");
    let b = nuc("Tc99");
    NuclideLibrary::new()
        .with_decay(
            a,
            DecayInfo::new(1.0, vec![Branch::decay(b, 1.0, DecayMode::IsomericTransition)]),
        )
        .with_decay(b, DecayInfo::new(1.0, vec![Branch::decay(a, 1.0, DecayMode::Other)]))
}

/// Classic fourth-order Runge-Kutta integration of a linear chain
/// `dN_1/dt = -λ_1 N_1`, `dN_i/dt = λ_{i-1} N_{i-1} - λ_i N_i` from
/// `N(0) = (1, 0, …)`.
pub fn rk4_chain(lambdas: &[f64], t: f64, steps: usize) -> Vec<f64> {
    let deriv = |n: &[f64]| -> Vec<f64> {
        (0..n.len())
            .map(|i| {
                let gain = if i == 0 { 0.0 } else { lambdas[i - 1] * n[i - 1] };
                gain - lambdas[i] * n[i]
            })
            .collect()
    };
    let axpy = |n: &[f64], k: &[f64], s: f64| -> Vec<f64> {
        n.iter().zip(k).map(|(a, b)| a + s * b).collect()
    };

    let h = t / steps as f64;
    let mut n = vec![0.0; lambdas.len()];
    n[0] = 1.0;
    for _ in 0..steps {
        let k1 = deriv(&n);
        let k2 = deriv(&axpy(&n, &k1, h / 2.0));
        let k3 = deriv(&axpy(&n, &k2, h / 2.0));
        let k4 = deriv(&axpy(&n, &k3, h));
        for i in 0..n.len() {
            n[i] += h / 6.0 * (k1[i] + 2.0 * k2[i] + 2.0 * k3[i] + k4[i]);
        }
    }
    n
}

/// `|a - b| <= abs + rel * max(|a|, |b|)`.
pub fn close(a: f64, b: f64, rel: f64, abs: f64) -> bool {
    (a - b).abs() <= abs + rel * a.abs().max(b.abs())
}

/// Every nuclide of either material agrees within tolerance.
pub fn materials_close(a: &Material, b: &Material, rel: f64, abs: f64) -> bool {
    a.nuclides()
        .chain(b.nuclides())
        .all(|n| close(a.amount(n), b.amount(n), rel, abs))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rk4_matches_exponential() {
        let n = rk4_chain(&[0.3], 5.0, 1000);
        assert!(close(n[0], (-1.5_f64).exp(), 1e-10, 0.0));
    }

    #[test]
    fn fixtures_parse() {
        assert_eq!(thorium_series().len(), 15);
        assert!(iron_cycle().contains(nuc("Mn56")));
        assert_eq!(material(&[("Co60", 1.0), ("Co60", 2.0)]).amount(nuc("Co60")), 3.0);
        assert_eq!(branching().len(), 4);
    }

    #[test]
    fn stable_tail_matches_rk4() {
        let n = rk4_chain(&[0.3, 0.7, 0.0], 4.0, 4000);
        assert!(close(n[2], stable_tail_of_two(0.3, 0.7, 4.0), 1e-10, 0.0));
    }
}
