//! Diagnostics returned alongside a transmuted material.

use std::collections::BTreeMap;

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use transmute_core::Nuclide;

use crate::tree::{ChainWarning, DecayChainTree, NodeStatus, TruncationReason, WarningKind};

/// Something the caller should know about one input nuclide's result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Warning {
    /// The root had no decay data and its amount was passed through.
    NoDecayData,
    /// A nuclide in the tree had no decay data and was treated as stable.
    MissingDecayData(Nuclide),
    /// A nuclide in the tree had no reaction data; only decay applied.
    MissingReactionData(Nuclide),
    /// The tree could not be built; the amount was passed through.
    ChainFailure(String),
}

impl From<&ChainWarning> for Warning {
    fn from(w: &ChainWarning) -> Self {
        match w.kind {
            WarningKind::MissingDecayData => Self::MissingDecayData(w.nuclide),
            WarningKind::MissingReactionData => Self::MissingReactionData(w.nuclide),
        }
    }
}

/// A truncated leaf, scaled to the amount of its root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TruncatedBranch {
    pub root: Nuclide,
    pub nuclide: Nuclide,
    pub depth: usize,
    /// Cumulative branch fraction of the leaf.
    pub fraction: f64,
    /// Root amount times `fraction`: the most that can be missing here.
    pub bound: f64,
    pub reason: TruncationReason,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Report {
    /// Warnings grouped by input nuclide.
    pub warnings: BTreeMap<Nuclide, Vec<Warning>>,
    /// Upper bound on the total amount lost to truncation.
    pub omission_bound: f64,
    pub truncated: Vec<TruncatedBranch>,
    /// Paths solved with merged (equal) removal constants.
    pub degenerate_paths: usize,
    /// Paths whose result was clamped into `[0, B]`.
    pub clamped_paths: usize,
    pub trees_built: usize,
    pub trees_reused: usize,
}

impl Report {
    pub fn warn(&mut self, root: Nuclide, warning: Warning) {
        self.warnings.entry(root).or_default().push(warning);
    }

    /// Record the tree-level diagnostics of `tree` for a root amount.
    pub(crate) fn record_tree(&mut self, tree: &DecayChainTree, amount: f64) {
        let root = tree.root();
        for w in tree.warnings() {
            self.warn(root, w.into());
        }
        for (_, node) in tree.truncated_leaves() {
            let NodeStatus::Truncated(reason) = node.status else {
                continue;
            };
            self.truncated.push(TruncatedBranch {
                root,
                nuclide: node.nuclide,
                depth: node.depth,
                fraction: node.fraction,
                bound: amount * node.fraction,
                reason,
            });
        }
        self.omission_bound += amount * tree.omission_bound();
    }

    /// Fold `other` into `self`.
    pub fn merge(&mut self, other: Report) {
        for (root, warnings) in other.warnings {
            self.warnings.entry(root).or_default().extend(warnings);
        }
        self.omission_bound += other.omission_bound;
        self.truncated.extend(other.truncated);
        self.degenerate_paths += other.degenerate_paths;
        self.clamped_paths += other.clamped_paths;
        self.trees_built += other.trees_built;
        self.trees_reused += other.trees_reused;
    }

    /// Largest truncated bounds first.
    pub fn sort_truncated(&mut self) {
        self.truncated
            .sort_by_key(|b| std::cmp::Reverse(OrderedFloat(b.bound)));
    }

    pub fn warning_count(&self) -> usize {
        self.warnings.values().map(Vec::len).sum()
    }

    /// No warnings and nothing truncated.
    pub fn is_clean(&self) -> bool {
        self.warning_count() == 0 && self.truncated.is_empty()
    }
}
