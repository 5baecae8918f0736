//! Decay and reaction records consumed by the chain solver.
//!
//! Decay and reaction channels share one shape: a total rate plus a list of
//! [`Branch`]es, each naming a daughter and the fraction of removals that
//! produce it. The physical origin is kept as a closed [`BranchKind`] tag so
//! the solver can treat every branch uniformly.

use serde::{Deserialize, Serialize};

use crate::constants::LN_2;
use crate::nuclide::Nuclide;

/// Radioactive decay modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DecayMode {
    BetaMinus,
    /// Positron emission and electron capture.
    BetaPlus,
    Alpha,
    IsomericTransition,
    Neutron,
    Proton,
    SpontaneousFission,
    Other,
}

impl DecayMode {
    /// Daughter produced by this mode, in its ground state.
    ///
    /// Fission and unclassified modes have no single daughter.
    pub fn daughter(self, parent: Nuclide) -> Option<Nuclide> {
        match self {
            Self::BetaMinus => parent.shifted(1, 0),
            Self::BetaPlus => parent.shifted(-1, 0),
            Self::Alpha => parent.shifted(-2, -4),
            Self::IsomericTransition => Some(parent.ground_state()),
            Self::Neutron => parent.shifted(0, -1),
            Self::Proton => parent.shifted(-1, -1),
            Self::SpontaneousFission | Self::Other => None,
        }
    }
}

/// Neutron-induced reaction channels, named by the outgoing particle(s).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ReactionKind {
    /// (n,γ) radiative capture.
    Gamma,
    N2n,
    N3n,
    /// (n,p)
    Proton,
    /// (n,α)
    Alpha,
    /// (n,d)
    Deuteron,
    /// (n,t)
    Triton,
    /// (n,³He)
    Helion,
    Fission,
}

impl ReactionKind {
    /// Every channel, in a fixed order.
    pub const ALL: [ReactionKind; 9] = [
        Self::Gamma,
        Self::N2n,
        Self::N3n,
        Self::Proton,
        Self::Alpha,
        Self::Deuteron,
        Self::Triton,
        Self::Helion,
        Self::Fission,
    ];

    /// Product nuclide (ground state) of this reaction on `target`.
    ///
    /// The incoming neutron adds one nucleon before the ejectile leaves.
    /// Fission has no tracked product.
    pub fn child(self, target: Nuclide) -> Option<Nuclide> {
        match self {
            Self::Gamma => target.shifted(0, 1),
            Self::N2n => target.shifted(0, -1),
            Self::N3n => target.shifted(0, -2),
            Self::Proton => target.shifted(-1, 0),
            Self::Alpha => target.shifted(-2, -3),
            Self::Deuteron => target.shifted(-1, -1),
            Self::Triton => target.shifted(-1, -2),
            Self::Helion => target.shifted(-2, -2),
            Self::Fission => None,
        }
    }
}

/// Physical origin of a branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BranchKind {
    Decay(DecayMode),
    Reaction(ReactionKind),
}

/// One daughter of a decay or reaction channel set.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Branch {
    pub daughter: Nuclide,
    /// Fraction of removals (of this channel set) that produce `daughter`.
    pub probability: f64,
    pub kind: BranchKind,
}

impl Branch {
    pub fn new(daughter: Nuclide, probability: f64, kind: BranchKind) -> Self {
        Self {
            daughter,
            probability,
            kind,
        }
    }

    pub fn decay(daughter: Nuclide, probability: f64, mode: DecayMode) -> Self {
        Self::new(daughter, probability, BranchKind::Decay(mode))
    }

    pub fn reaction(daughter: Nuclide, probability: f64, kind: ReactionKind) -> Self {
        Self::new(daughter, probability, BranchKind::Reaction(kind))
    }
}

/// Radioactive decay data for one nuclide.
///
/// A stable nuclide has `decay_constant == 0.0` and no branches. For an
/// unstable nuclide the branch probabilities sum to 1 (modes without a
/// tracked daughter, such as spontaneous fission, are simply absent and
/// leave the sum short).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DecayInfo {
    pub decay_constant: f64,
    pub branches: Vec<Branch>,
}

impl DecayInfo {
    pub fn stable() -> Self {
        Self::default()
    }

    pub fn new(decay_constant: f64, branches: Vec<Branch>) -> Self {
        Self {
            decay_constant,
            branches,
        }
    }

    /// Build from a half-life. An infinite half-life is stable.
    pub fn from_half_life(half_life: f64, branches: Vec<Branch>) -> Self {
        if !half_life.is_finite() {
            return Self::stable();
        }
        Self::new(LN_2 / half_life, branches)
    }

    pub fn is_stable(&self) -> bool {
        self.decay_constant == 0.0
    }

    /// Half-life in the provider's time unit; infinite when stable.
    pub fn half_life(&self) -> f64 {
        if self.is_stable() {
            f64::INFINITY
        } else {
            LN_2 / self.decay_constant
        }
    }
}

/// Flux-weighted one-group reaction removal for one nuclide.
///
/// Structurally the same as [`DecayInfo`]: `removal_rate` is the total
/// reaction probability per unit time, split across `branches`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ReactionRemoval {
    pub removal_rate: f64,
    pub branches: Vec<Branch>,
}

impl ReactionRemoval {
    /// No reactions at all (zero flux or no cross sections).
    pub fn none() -> Self {
        Self::default()
    }

    pub fn new(removal_rate: f64, branches: Vec<Branch>) -> Self {
        Self {
            removal_rate,
            branches,
        }
    }
}
