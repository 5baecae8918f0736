//! Recursive expansion of production trees.
//!
//! Starting from a root nuclide, every node's decay and reaction channels
//! are merged into one branch set weighted by partial rate:
//!
//! ```text
//! p_child = (λ_decay · p_decay  or  rate_reaction · p_reaction) / λ_total
//! ```
//!
//! and the tree is grown depth first. A child whose cumulative fraction
//! drops below the tolerance becomes a truncated leaf; a child with zero
//! removal constant is a stable leaf. Paths that revisit a nuclide are only
//! bounded by the depth cap, which also bounds every other path.

use std::collections::HashMap;
use std::time::Instant;

use tracing::{debug, trace};

use transmute_core::{BranchKind, DecayInfo, Flux, Nuclide, NuclideDataProvider, ReactionRemoval};

use crate::config::{BuilderConfig, valid_tolerance};
use crate::error::ChainError;
use crate::tree::{
    ChainNode, ChainWarning, DecayChainTree, NodeId, NodeStatus, TruncationReason, WarningKind,
};

/// Expands production trees against a data provider.
pub struct ChainBuilder<'a, P: NuclideDataProvider + ?Sized> {
    provider: &'a P,
    config: BuilderConfig,
}

impl<'a, P: NuclideDataProvider + ?Sized> ChainBuilder<'a, P> {
    pub fn new(provider: &'a P, config: BuilderConfig) -> Self {
        Self { provider, config }
    }

    pub fn config(&self) -> &BuilderConfig {
        &self.config
    }

    /// Build the production tree rooted at `root`.
    ///
    /// Fails with [`ChainError::NoDecayData`] when the provider has no decay
    /// data for the root. Missing data deeper in the tree is recorded as a
    /// warning on the tree instead.
    pub fn expand(
        &self,
        root: Nuclide,
        flux: &Flux,
        tolerance: f64,
    ) -> Result<DecayChainTree, ChainError> {
        if !valid_tolerance(tolerance) {
            return Err(ChainError::InvalidTolerance(tolerance));
        }
        let decay = self
            .provider
            .decay_info(root)
            .map_err(|_| ChainError::NoDecayData(root))?;

        let mut expansion = Expansion {
            provider: self.provider,
            flux,
            tolerance,
            config: &self.config,
            nodes: Vec::new(),
            warnings: Vec::new(),
            on_path: HashMap::new(),
            deadline_hit: false,
        };

        let channels = expansion.channels_with_decay(root, decay);
        expansion.nodes.push(ChainNode {
            nuclide: root,
            lambda: channels.lambda,
            branch_probability: 1.0,
            fraction: 1.0,
            depth: 0,
            parent: None,
            kind: None,
            status: NodeStatus::Expanded,
        });
        expansion.expand_node(NodeId(0), channels, false);

        let tree = DecayChainTree::from_parts(
            root,
            flux.fingerprint(),
            tolerance,
            self.config.max_depth,
            self.config.max_nodes,
            expansion.nodes,
            expansion.warnings,
            expansion.deadline_hit,
        );
        debug!(
            %root,
            nodes = tree.len(),
            depth = tree.deepest(),
            omission = tree.omission_bound(),
            warnings = tree.warnings().len(),
            "chain: built tree"
        );
        Ok(tree)
    }
}

/// Merged branch set of one nuclide.
struct Channels {
    lambda: f64,
    branches: Vec<(Nuclide, f64, BranchKind)>,
}

impl Channels {
    fn stable() -> Self {
        Self {
            lambda: 0.0,
            branches: Vec::new(),
        }
    }
}

/// Mutable state of one `expand` call.
struct Expansion<'a, P: NuclideDataProvider + ?Sized> {
    provider: &'a P,
    flux: &'a Flux,
    tolerance: f64,
    config: &'a BuilderConfig,
    nodes: Vec<ChainNode>,
    warnings: Vec<ChainWarning>,
    /// Multiset of nuclides on the current root-to-node path.
    on_path: HashMap<Nuclide, u32>,
    deadline_hit: bool,
}

impl<P: NuclideDataProvider + ?Sized> Expansion<'_, P> {
    fn warn(&mut self, nuclide: Nuclide, kind: WarningKind) {
        let w = ChainWarning { nuclide, kind };
        if !self.warnings.contains(&w) {
            trace!(%nuclide, ?kind, "chain: missing data");
            self.warnings.push(w);
        }
    }

    fn channels(&mut self, nuclide: Nuclide) -> Channels {
        match self.provider.decay_info(nuclide) {
            Ok(decay) => self.channels_with_decay(nuclide, decay),
            Err(_) => {
                self.warn(nuclide, WarningKind::MissingDecayData);
                Channels::stable()
            }
        }
    }

    fn channels_with_decay(&mut self, nuclide: Nuclide, decay: DecayInfo) -> Channels {
        let reaction = match self.provider.reaction_removal(nuclide, self.flux) {
            Ok(r) => r,
            Err(_) => {
                self.warn(nuclide, WarningKind::MissingReactionData);
                ReactionRemoval::none()
            }
        };

        let decay_rate = sanitize_rate(decay.decay_constant);
        let reaction_rate = sanitize_rate(reaction.removal_rate);
        let lambda = decay_rate + reaction_rate;
        if lambda == 0.0 {
            return Channels::stable();
        }

        let weighted = decay
            .branches
            .iter()
            .map(|b| (b, decay_rate))
            .chain(reaction.branches.iter().map(|b| (b, reaction_rate)));
        let branches = weighted
            .filter_map(|(b, rate)| {
                let p = rate * b.probability / lambda;
                (p.is_finite() && p > 0.0).then_some((b.daughter, p.min(1.0), b.kind))
            })
            .collect();
        Channels { lambda, branches }
    }

    fn truncate(&mut self, id: NodeId, reason: TruncationReason) {
        let node = &mut self.nodes[id.0];
        node.status = NodeStatus::Truncated(reason);
        trace!(nuclide = %node.nuclide, depth = node.depth, fraction = node.fraction, ?reason, "chain: truncated");
    }

    fn expand_node(&mut self, id: NodeId, channels: Channels, cyclic: bool) {
        let (nuclide, fraction, depth) = {
            let n = &self.nodes[id.0];
            (n.nuclide, n.fraction, n.depth)
        };

        if channels.lambda == 0.0 {
            self.nodes[id.0].status = NodeStatus::Stable;
            return;
        }
        if self.config.deadline.is_some_and(|d| Instant::now() >= d) {
            self.deadline_hit = true;
            self.truncate(id, TruncationReason::Deadline);
            return;
        }
        if depth >= self.config.max_depth {
            let reason = if cyclic {
                TruncationReason::Cycle
            } else {
                TruncationReason::DepthCap
            };
            self.truncate(id, reason);
            return;
        }
        if self.nodes.len() >= self.config.max_nodes {
            self.truncate(id, TruncationReason::NodeBudget);
            return;
        }

        self.nodes[id.0].status = NodeStatus::Expanded;
        *self.on_path.entry(nuclide).or_insert(0) += 1;

        for (daughter, probability, kind) in channels.branches {
            let child_fraction = fraction * probability;
            let child_channels = self.channels(daughter);
            let child = NodeId(self.nodes.len());
            self.nodes.push(ChainNode {
                nuclide: daughter,
                lambda: child_channels.lambda,
                branch_probability: probability,
                fraction: child_fraction,
                depth: depth + 1,
                parent: Some(id),
                kind: Some(kind),
                status: NodeStatus::Expanded,
            });

            if child_channels.lambda == 0.0 {
                self.nodes[child.0].status = NodeStatus::Stable;
                continue;
            }
            if child_fraction < self.tolerance {
                self.truncate(child, TruncationReason::Tolerance);
                continue;
            }
            let revisits = self.on_path.get(&daughter).is_some_and(|c| *c > 0);
            self.expand_node(child, child_channels, cyclic || revisits);
        }

        if let Some(count) = self.on_path.get_mut(&nuclide) {
            *count -= 1;
            if *count == 0 {
                self.on_path.remove(&nuclide);
            }
        }
    }
}

fn sanitize_rate(rate: f64) -> f64 {
    if rate.is_finite() && rate > 0.0 { rate } else { 0.0 }
}
