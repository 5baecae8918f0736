//! Chains that revisit a nuclide.
//!
//! Reactions can feed a nuclide back into an ancestor (capture then decay,
//! or an isomer pair). Expansion must terminate, report what it cut, and
//! still solve every path it kept.

use std::sync::Arc;

use transmute_chain::{
    BuilderConfig, ChainBuilder, ChainCache, NodeStatus, Transmuter, TransmuterConfig,
    TruncationReason,
};
use transmute_core::Flux;
use transmute_tests::helpers::*;

#[test]
fn ping_pong_matches_closed_form() {
    init_test_logging("warn", "text");
    let tr = Transmuter::with_defaults(Arc::new(ping_pong()));
    let cache = ChainCache::default();
    let t = 1.0;
    let (out, report) = tr
        .transmute(&cache, &material(&[("Tc99m", 1.0)]), t, &Flux::zero(), 1e-7)
        .unwrap();

    // A ⇄ B at equal rates: A(t) = (1 + e^{-2t}) / 2.
    let a = (1.0 + (-2.0 * t).exp()) / 2.0;
    assert!(close(out.amount(nuc("Tc99m")), a, 1e-9, 0.0));
    assert!(close(out.amount(nuc("Tc99")), 1.0 - a, 1e-9, 0.0));

    // The single path never thins out, so the depth cap cuts it.
    assert_eq!(report.truncated.len(), 1);
    assert_eq!(report.truncated[0].reason, TruncationReason::Cycle);
    assert_eq!(report.truncated[0].depth, TransmuterConfig::default().max_depth);
    assert!(report.degenerate_paths > 0);
}

#[test]
fn ping_pong_respects_custom_depth() {
    let lib = ping_pong();
    let builder = ChainBuilder::new(
        &lib,
        BuilderConfig {
            max_depth: 5,
            ..BuilderConfig::default()
        },
    );
    let tree = builder.expand(nuc("Tc99"), &Flux::zero(), 1e-7).unwrap();
    assert_eq!(tree.len(), 6);
    assert_eq!(tree.deepest(), 5);
    assert!(tree.validate().is_ok());
}

#[test]
fn capture_decay_cycle_terminates() {
    let lib = iron_cycle();
    let builder = ChainBuilder::new(&lib, BuilderConfig::default());
    let tree = builder
        .expand(nuc("Fe56"), &Flux::OneGroup(1e14), 1e-7)
        .unwrap();

    assert!(tree.validate().is_ok());
    let fe56_count = tree.nodes().iter().filter(|n| n.nuclide == nuc("Fe56")).count();
    assert!(fe56_count > 1, "cycle through Mn56 should revisit Fe56");
    assert!(tree.truncated_leaves().all(|(_, n)| n.fraction < 1e-7
        || matches!(n.status, NodeStatus::Truncated(TruncationReason::Cycle))));
    assert!(tree.omission_bound() < 1e-6);
}

#[test]
fn capture_decay_cycle_conserves_with_bound() {
    let tr = Transmuter::with_defaults(Arc::new(iron_cycle()));
    let cache = ChainCache::default();
    let m = material(&[("Fe56", 1.0)]);
    let flux = Flux::OneGroup(1e14);
    let (out, report) = tr.transmute(&cache, &m, YEAR, &flux, 1e-9).unwrap();

    let total = out.total();
    assert!(total <= 1.0 + 1e-9);
    assert!(total + report.omission_bound >= 1.0 - 1e-9);
    assert!(out.amount(nuc("Fe57")) > 0.0);
    assert!(out.amount(nuc("Mn56")) > 0.0);
}

#[test]
fn depth_cap_applies_to_acyclic_chains() {
    let lib = thorium_series();
    let builder = ChainBuilder::new(
        &lib,
        BuilderConfig {
            max_depth: 3,
            ..BuilderConfig::default()
        },
    );
    let tree = builder.expand(nuc("Th232"), &Flux::zero(), 1e-7).unwrap();
    let (_, leaf) = tree.truncated_leaves().next().unwrap();
    assert_eq!(leaf.status, NodeStatus::Truncated(TruncationReason::DepthCap));
    assert_eq!(leaf.depth, 3);
    assert_eq!(tree.omission_bound(), 1.0);
}

#[test]
fn strict_config_rejects_zero_depth() {
    let cfg = TransmuterConfig {
        max_depth: 0,
        ..TransmuterConfig::default()
    };
    assert!(Transmuter::new(Arc::new(ping_pong()), cfg).is_err());
}
