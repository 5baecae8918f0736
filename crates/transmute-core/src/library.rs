//! In-memory nuclide data library.
//!
//! [`NuclideLibrary`] is the reference [`NuclideDataProvider`]: a decay table
//! plus one-group cross sections (barns) per reaction channel. Reaction
//! removal under a flux is
//!
//! ```text
//! rate = Σ_channels σ_channel · 1e-24 · Φ
//! ```
//!
//! with `Φ = flux.total()`. A multigroup flux is assumed to pair with cross
//! sections already collapsed against that spectrum. Fission removes the
//! target without a tracked product.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::constants::BARN_CM2;
use crate::error::DataError;
use crate::flux::Flux;
use crate::nuclide::Nuclide;
use crate::traits::NuclideDataProvider;
use crate::types::{Branch, DecayInfo, DecayMode, ReactionKind, ReactionRemoval};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NuclideLibrary {
    decay: HashMap<Nuclide, DecayInfo>,
    cross_sections: HashMap<Nuclide, BTreeMap<ReactionKind, f64>>,
}

impl NuclideLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert decay data for `nuclide`, replacing any previous record.
    pub fn with_decay(mut self, nuclide: Nuclide, info: DecayInfo) -> Self {
        self.insert_decay(nuclide, info);
        self
    }

    /// Mark `nuclide` as stable.
    pub fn with_stable(self, nuclide: Nuclide) -> Self {
        self.with_decay(nuclide, DecayInfo::stable())
    }

    /// Insert decay data from a half-life and `(mode, probability)` pairs.
    ///
    /// Daughters come from [`DecayMode::daughter`]; modes without a single
    /// daughter are dropped.
    pub fn with_half_life(
        self,
        nuclide: Nuclide,
        half_life: f64,
        modes: &[(DecayMode, f64)],
    ) -> Self {
        let branches = modes
            .iter()
            .filter_map(|(mode, p)| {
                mode.daughter(nuclide)
                    .map(|d| Branch::decay(d, *p, *mode))
            })
            .collect();
        self.with_decay(nuclide, DecayInfo::from_half_life(half_life, branches))
    }

    /// One-group cross section in barns for `kind` on `nuclide`.
    pub fn with_cross_section(mut self, nuclide: Nuclide, kind: ReactionKind, barns: f64) -> Self {
        self.insert_cross_section(nuclide, kind, barns);
        self
    }

    pub fn insert_decay(&mut self, nuclide: Nuclide, info: DecayInfo) {
        self.decay.insert(nuclide, info);
    }

    pub fn insert_cross_section(&mut self, nuclide: Nuclide, kind: ReactionKind, barns: f64) {
        self.cross_sections
            .entry(nuclide)
            .or_default()
            .insert(kind, barns);
    }

    pub fn contains(&self, nuclide: Nuclide) -> bool {
        self.decay.contains_key(&nuclide) || self.cross_sections.contains_key(&nuclide)
    }

    /// Number of nuclides with decay data.
    pub fn len(&self) -> usize {
        self.decay.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decay.is_empty()
    }
}

impl NuclideDataProvider for NuclideLibrary {
    fn decay_info(&self, nuclide: Nuclide) -> Result<DecayInfo, DataError> {
        self.decay
            .get(&nuclide)
            .cloned()
            .ok_or(DataError::NoDecayData(nuclide))
    }

    fn reaction_removal(&self, nuclide: Nuclide, flux: &Flux) -> Result<ReactionRemoval, DataError> {
        let Some(channels) = self.cross_sections.get(&nuclide) else {
            if self.decay.contains_key(&nuclide) {
                return Ok(ReactionRemoval::none());
            }
            return Err(DataError::NoReactionData(nuclide));
        };

        let phi = flux.total();
        let rates: Vec<(ReactionKind, f64)> = channels
            .iter()
            .map(|(kind, barns)| (*kind, barns * BARN_CM2 * phi))
            .filter(|(_, rate)| *rate > 0.0)
            .collect();
        let total: f64 = rates.iter().map(|(_, r)| r).sum();
        if total == 0.0 {
            return Ok(ReactionRemoval::none());
        }

        let branches = rates
            .iter()
            .filter_map(|(kind, rate)| {
                kind.child(nuclide)
                    .map(|child| Branch::reaction(child, rate / total, *kind))
            })
            .collect();
        Ok(ReactionRemoval::new(total, branches))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nuc(s: &str) -> Nuclide {
        s.parse().unwrap()
    }

    fn library() -> NuclideLibrary {
        NuclideLibrary::new()
            .with_stable(nuc("Fe56"))
            .with_stable(nuc("Fe57"))
            .with_half_life(nuc("Mn56"), 9284.0, &[(DecayMode::BetaMinus, 1.0)])
            .with_cross_section(nuc("Fe56"), ReactionKind::Gamma, 2.0)
            .with_cross_section(nuc("Fe56"), ReactionKind::Proton, 0.5)
            .with_cross_section(nuc("U235"), ReactionKind::Fission, 500.0)
    }

    #[test]
    fn decay_lookup() {
        let lib = library();
        let mn = lib.decay_info(nuc("Mn56")).unwrap();
        assert_eq!(mn.branches.len(), 1);
        assert_eq!(mn.branches[0].daughter, nuc("Fe56"));
        assert!(lib.decay_info(nuc("Fe56")).unwrap().is_stable());
    }

    #[test]
    fn unknown_decay_is_error() {
        assert_eq!(
            library().decay_info(nuc("Pu239")),
            Err(DataError::NoDecayData(nuc("Pu239")))
        );
    }

    #[test]
    fn reaction_rates_scale_with_flux() {
        let lib = library();
        let r = lib
            .reaction_removal(nuc("Fe56"), &Flux::OneGroup(1e14))
            .unwrap();
        let expected = 2.5 * BARN_CM2 * 1e14;
        assert!((r.removal_rate - expected).abs() < expected * 1e-12);
        let gamma = r
            .branches
            .iter()
            .find(|b| b.daughter == nuc("Fe57"))
            .unwrap();
        assert!((gamma.probability - 0.8).abs() < 1e-12);
        let proton = r
            .branches
            .iter()
            .find(|b| b.daughter == nuc("Mn56"))
            .unwrap();
        assert!((proton.probability - 0.2).abs() < 1e-12);
    }

    #[test]
    fn zero_flux_means_no_reactions() {
        let r = library()
            .reaction_removal(nuc("Fe56"), &Flux::zero())
            .unwrap();
        assert_eq!(r, ReactionRemoval::none());
    }

    #[test]
    fn multigroup_uses_total() {
        let lib = library();
        let one = lib.reaction_removal(nuc("Fe56"), &Flux::OneGroup(3e14)).unwrap();
        let multi = lib
            .reaction_removal(nuc("Fe56"), &Flux::Multigroup(vec![1e14, 2e14]))
            .unwrap();
        assert!((one.removal_rate - multi.removal_rate).abs() < one.removal_rate * 1e-12);
    }

    #[test]
    fn fission_removes_without_product() {
        let r = library()
            .reaction_removal(nuc("U235"), &Flux::OneGroup(1e14))
            .unwrap();
        assert!(r.removal_rate > 0.0);
        assert!(r.branches.is_empty());
    }

    #[test]
    fn decay_only_nuclide_has_no_reactions() {
        let r = library()
            .reaction_removal(nuc("Mn56"), &Flux::OneGroup(1e14))
            .unwrap();
        assert_eq!(r.removal_rate, 0.0);
    }

    #[test]
    fn unknown_nuclide_has_no_reaction_data() {
        assert_eq!(
            library().reaction_removal(nuc("Pu239"), &Flux::OneGroup(1.0)),
            Err(DataError::NoReactionData(nuc("Pu239")))
        );
    }

    #[test]
    fn library_round_trips_through_json() {
        let lib = library();
        let json = serde_json::to_string(&lib).unwrap();
        let back: NuclideLibrary = serde_json::from_str(&json).unwrap();
        assert_eq!(back.len(), lib.len());
        assert!(back.contains(nuc("U235")));
    }
}
