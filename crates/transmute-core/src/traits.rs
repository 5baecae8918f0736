//! The data-provider contract consumed by the chain solver.

use crate::error::DataError;
use crate::flux::Flux;
use crate::nuclide::Nuclide;
use crate::types::{DecayInfo, ReactionRemoval};

/// Source of decay constants, decay branches and one-group reaction
/// removal rates.
///
/// Implementations are expected to be fast in-memory lookups; the solver
/// calls them once per tree node and may call them from several threads.
/// Any multigroup collapsing happens inside the implementation.
pub trait NuclideDataProvider: Send + Sync {
    /// Decay constant and branches. Fails with [`DataError::NoDecayData`]
    /// when the nuclide is unknown.
    fn decay_info(&self, nuclide: Nuclide) -> Result<DecayInfo, DataError>;

    /// Reaction removal rate and product branches under `flux`. Fails with
    /// [`DataError::NoReactionData`] when no reaction data exists.
    fn reaction_removal(&self, nuclide: Nuclide, flux: &Flux) -> Result<ReactionRemoval, DataError>;

    /// Total removal constant: decay constant plus reaction removal rate.
    ///
    /// Default implementation treats missing reaction data as no reactions.
    fn removal_constant(&self, nuclide: Nuclide, flux: &Flux) -> Result<f64, DataError> {
        let decay = self.decay_info(nuclide)?.decay_constant;
        let reaction = self
            .reaction_removal(nuclide, flux)
            .map(|r| r.removal_rate)
            .unwrap_or(0.0);
        Ok(decay + reaction)
    }
}

impl<P: NuclideDataProvider + ?Sized> NuclideDataProvider for std::sync::Arc<P> {
    fn decay_info(&self, nuclide: Nuclide) -> Result<DecayInfo, DataError> {
        (**self).decay_info(nuclide)
    }

    fn reaction_removal(&self, nuclide: Nuclide, flux: &Flux) -> Result<ReactionRemoval, DataError> {
        (**self).reaction_removal(nuclide, flux)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Branch, DecayMode};
    use std::collections::HashMap;

    // ------------------------------------------------------------------
    // Mock: NuclideDataProvider
    // ------------------------------------------------------------------

    struct MockProvider {
        decay: HashMap<Nuclide, DecayInfo>,
        reaction_rate: f64,
    }

    impl NuclideDataProvider for MockProvider {
        fn decay_info(&self, nuclide: Nuclide) -> Result<DecayInfo, DataError> {
            self.decay
                .get(&nuclide)
                .cloned()
                .ok_or(DataError::NoDecayData(nuclide))
        }

        fn reaction_removal(
            &self,
            nuclide: Nuclide,
            flux: &Flux,
        ) -> Result<ReactionRemoval, DataError> {
            if self.reaction_rate == 0.0 {
                return Err(DataError::NoReactionData(nuclide));
            }
            Ok(ReactionRemoval::new(self.reaction_rate * flux.total(), vec![]))
        }
    }

    fn nuc(s: &str) -> Nuclide {
        s.parse().unwrap()
    }

    fn provider(reaction_rate: f64) -> MockProvider {
        let mut decay = HashMap::new();
        decay.insert(
            nuc("Co60"),
            DecayInfo::new(0.5, vec![Branch::decay(nuc("Ni60"), 1.0, DecayMode::BetaMinus)]),
        );
        MockProvider {
            decay,
            reaction_rate,
        }
    }

    #[test]
    fn removal_constant_sums_decay_and_reaction() {
        let p = provider(0.25);
        let lambda = p.removal_constant(nuc("Co60"), &Flux::OneGroup(2.0)).unwrap();
        assert!((lambda - 1.0).abs() < 1e-15);
    }

    #[test]
    fn removal_constant_without_reaction_data() {
        let p = provider(0.0);
        let lambda = p.removal_constant(nuc("Co60"), &Flux::OneGroup(2.0)).unwrap();
        assert_eq!(lambda, 0.5);
    }

    #[test]
    fn removal_constant_unknown_nuclide() {
        let p = provider(0.25);
        assert_eq!(
            p.removal_constant(nuc("U235"), &Flux::zero()),
            Err(DataError::NoDecayData(nuc("U235")))
        );
    }

    #[test]
    fn provider_is_object_safe() {
        let p = provider(0.0);
        let dyn_p: &dyn NuclideDataProvider = &p;
        assert_eq!(dyn_p.decay_info(nuc("Co60")).unwrap().decay_constant, 0.5);
    }

    #[test]
    fn arc_forwards() {
        let p = std::sync::Arc::new(provider(0.25));
        let lambda = p.removal_constant(nuc("Co60"), &Flux::OneGroup(2.0)).unwrap();
        assert!((lambda - 1.0).abs() < 1e-15);
    }
}
