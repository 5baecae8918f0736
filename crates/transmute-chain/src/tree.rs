//! Arena representation of a production tree.
//!
//! A [`DecayChainTree`] stores every node in one `Vec`, indexed by
//! [`NodeId`]. Node 0 is the root; every other node points at its parent by
//! index, so root-to-node paths share prefixes without shared ownership and
//! a nuclide can appear on several paths (or twice on one) without forming
//! reference cycles.
//!
//! Leaves are either `Stable`, `Truncated`, or `Expanded` with no children
//! (every removal leaves the tracked system, e.g. pure fission).

use serde::{Deserialize, Serialize};

use transmute_core::{BranchKind, FluxFingerprint, Nuclide};

use crate::error::ChainError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub usize);

/// Why a node was not expanded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TruncationReason {
    /// Cumulative fraction fell below the tolerance.
    Tolerance,
    /// Absolute depth cap reached on an acyclic path.
    DepthCap,
    /// Depth cap reached on a path that revisits a nuclide.
    Cycle,
    /// Per-tree node budget exhausted.
    NodeBudget,
    /// Wall-clock deadline passed during expansion.
    Deadline,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeStatus {
    Expanded,
    /// Removal constant is zero; nothing to expand.
    Stable,
    Truncated(TruncationReason),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainNode {
    pub nuclide: Nuclide,
    /// Total removal constant (decay + reactions).
    pub lambda: f64,
    /// Probability of the branch from the parent; 1 for the root.
    pub branch_probability: f64,
    /// Product of branch probabilities from the root.
    pub fraction: f64,
    pub depth: usize,
    pub parent: Option<NodeId>,
    /// Channel that produced this node; `None` for the root.
    pub kind: Option<BranchKind>,
    pub status: NodeStatus,
}

impl ChainNode {
    pub fn is_truncated(&self) -> bool {
        matches!(self.status, NodeStatus::Truncated(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum WarningKind {
    /// A non-root nuclide had no decay data and was treated as stable.
    MissingDecayData,
    /// A nuclide had no reaction data and was given no reaction channels.
    MissingReactionData,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ChainWarning {
    pub nuclide: Nuclide,
    pub kind: WarningKind,
}

/// Immutable production tree for one root, flux and tolerance.
#[derive(Debug, Clone, PartialEq)]
pub struct DecayChainTree {
    root: Nuclide,
    flux: FluxFingerprint,
    tolerance: f64,
    max_depth: usize,
    max_nodes: usize,
    nodes: Vec<ChainNode>,
    warnings: Vec<ChainWarning>,
    deadline_hit: bool,
}

impl DecayChainTree {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn from_parts(
        root: Nuclide,
        flux: FluxFingerprint,
        tolerance: f64,
        max_depth: usize,
        max_nodes: usize,
        nodes: Vec<ChainNode>,
        warnings: Vec<ChainWarning>,
        deadline_hit: bool,
    ) -> Self {
        Self {
            root,
            flux,
            tolerance,
            max_depth,
            max_nodes,
            nodes,
            warnings,
            deadline_hit,
        }
    }

    pub fn root(&self) -> Nuclide {
        self.root
    }

    pub fn flux(&self) -> FluxFingerprint {
        self.flux
    }

    /// Tolerance the tree was built with.
    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    pub fn max_nodes(&self) -> usize {
        self.max_nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Always false for a built tree; present for API symmetry.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: NodeId) -> &ChainNode {
        &self.nodes[id.0]
    }

    pub fn get(&self, id: NodeId) -> Option<&ChainNode> {
        self.nodes.get(id.0)
    }

    pub fn nodes(&self) -> &[ChainNode] {
        &self.nodes
    }

    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        (0..self.nodes.len()).map(NodeId)
    }

    /// Direct children of `id`, in expansion order.
    pub fn children(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .filter(move |(_, n)| n.parent == Some(id))
            .map(|(i, _)| NodeId(i))
    }

    /// Node ids from the root down to `id`, inclusive.
    pub fn path(&self, id: NodeId) -> Vec<NodeId> {
        let mut path = Vec::with_capacity(self.nodes[id.0].depth + 1);
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            path.push(current);
            cursor = self.nodes[current.0].parent;
        }
        path.reverse();
        path
    }

    /// Removal constants along the path to `id`, root first.
    pub fn path_lambdas(&self, id: NodeId) -> Vec<f64> {
        self.path(id)
            .into_iter()
            .map(|n| self.nodes[n.0].lambda)
            .collect()
    }

    pub fn warnings(&self) -> &[ChainWarning] {
        &self.warnings
    }

    /// Truncated leaves, in expansion order.
    pub fn truncated_leaves(&self) -> impl Iterator<Item = (NodeId, &ChainNode)> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| n.is_truncated())
            .map(|(i, n)| (NodeId(i), n))
    }

    /// Upper bound on the fraction of the root lost beyond truncated leaves.
    pub fn omission_bound(&self) -> f64 {
        self.truncated_leaves().map(|(_, n)| n.fraction).sum()
    }

    /// Nodes that were not truncated (expanded or stable).
    pub fn expanded_count(&self) -> usize {
        self.nodes.iter().filter(|n| !n.is_truncated()).count()
    }

    pub fn deepest(&self) -> usize {
        self.nodes.iter().map(|n| n.depth).max().unwrap_or(0)
    }

    /// False when a deadline cut expansion short; such trees are not cached.
    pub fn is_complete(&self) -> bool {
        !self.deadline_hit
    }

    /// Check the structural invariants a cached tree must keep.
    pub fn validate(&self) -> Result<(), ChainError> {
        let corrupt = |reason: String| ChainError::CacheCorruption {
            nuclide: self.root,
            reason,
        };

        let Some(root) = self.nodes.first() else {
            return Err(corrupt("tree has no nodes".into()));
        };
        if root.nuclide != self.root || root.parent.is_some() || root.depth != 0 {
            return Err(corrupt("node 0 is not the root".into()));
        }
        if root.fraction != 1.0 {
            return Err(corrupt(format!("root fraction {} != 1", root.fraction)));
        }

        for (i, node) in self.nodes.iter().enumerate() {
            if !node.lambda.is_finite() || node.lambda < 0.0 {
                return Err(corrupt(format!("node {i} has removal constant {}", node.lambda)));
            }
            if node.status == NodeStatus::Stable && node.lambda != 0.0 {
                return Err(corrupt(format!("stable node {i} has removal constant {}", node.lambda)));
            }
            if !node.fraction.is_finite() || node.fraction < 0.0 || node.fraction > 1.0 {
                return Err(corrupt(format!("node {i} has fraction {}", node.fraction)));
            }
            let Some(parent) = node.parent else {
                if i != 0 {
                    return Err(corrupt(format!("node {i} has no parent")));
                }
                continue;
            };
            let Some(p) = self.nodes.get(parent.0).filter(|_| parent.0 < i) else {
                return Err(corrupt(format!("node {i} has bad parent index {}", parent.0)));
            };
            if node.depth != p.depth + 1 {
                return Err(corrupt(format!("node {i} depth {} under parent depth {}", node.depth, p.depth)));
            }
            if node.fraction > p.fraction * (1.0 + 1e-12) {
                return Err(corrupt(format!(
                    "node {i} fraction {} exceeds parent fraction {}",
                    node.fraction, p.fraction
                )));
            }
            if p.status != NodeStatus::Expanded {
                return Err(corrupt(format!("node {i} hangs off an unexpanded parent")));
            }
        }
        Ok(())
    }
}
