//! Material-level transmutation.
//!
//! Every input nuclide is expanded into its production tree (through the
//! shared [`ChainCache`]) and every node's path is solved with the Bateman
//! solution. Results from all inputs are summed by nuclide.

use std::sync::Arc;
use std::time::Instant;

use rayon::prelude::*;
use tracing::{debug, warn};

use transmute_core::{Flux, Material, Nuclide, NuclideDataProvider};

use crate::bateman::BatemanSolver;
use crate::builder::ChainBuilder;
use crate::cache::ChainCache;
use crate::config::{MissingRootPolicy, TransmuterConfig, check_time, check_tolerance};
use crate::error::{ChainError, TransmuteError};
use crate::report::{Report, Warning};

pub struct Transmuter<P: NuclideDataProvider + ?Sized> {
    provider: Arc<P>,
    config: TransmuterConfig,
    solver: BatemanSolver,
}

impl<P: NuclideDataProvider + ?Sized> Transmuter<P> {
    pub fn new(provider: Arc<P>, config: TransmuterConfig) -> Result<Self, TransmuteError> {
        config.validate()?;
        Ok(Self {
            provider,
            config,
            solver: BatemanSolver::default(),
        })
    }

    pub fn with_defaults(provider: Arc<P>) -> Self {
        Self {
            provider,
            config: TransmuterConfig::default(),
            solver: BatemanSolver::default(),
        }
    }

    pub fn config(&self) -> &TransmuterConfig {
        &self.config
    }

    pub fn provider(&self) -> &Arc<P> {
        &self.provider
    }

    /// Transmute with the configured time, flux and tolerance.
    pub fn transmute_default(
        &self,
        cache: &ChainCache,
        material: &Material,
    ) -> Result<(Material, Report), TransmuteError> {
        self.transmute(
            cache,
            material,
            self.config.time,
            &self.config.flux,
            self.config.tolerance,
        )
    }

    /// Amounts of every nuclide produced from `material` after `t` in
    /// `flux`. Branches below `tolerance` of their root are pruned and
    /// accounted for in [`Report::omission_bound`].
    pub fn transmute(
        &self,
        cache: &ChainCache,
        material: &Material,
        t: f64,
        flux: &Flux,
        tolerance: f64,
    ) -> Result<(Material, Report), TransmuteError> {
        check_time(t)?;
        check_tolerance(tolerance)?;
        if !flux.is_valid() {
            return Err(TransmuteError::InvalidFlux);
        }
        if let Some((nuclide, amount)) = material
            .iter()
            .find(|(_, a)| !a.is_finite() || *a < 0.0)
        {
            return Err(TransmuteError::InvalidAmount { nuclide, amount });
        }

        let builder = ChainBuilder::new(&*self.provider, self.config.builder_config(Instant::now()));
        let inputs: Vec<(Nuclide, f64)> = material.iter().filter(|(_, a)| *a > 0.0).collect();

        let run = |&(nuclide, amount): &(Nuclide, f64)| {
            self.transmute_one(cache, &builder, nuclide, amount, t, flux, tolerance)
        };
        let outcomes: Vec<Result<(Material, Report), TransmuteError>> = if self.config.parallel {
            inputs.par_iter().map(run).collect()
        } else {
            inputs.iter().map(run).collect()
        };

        let mut result = Material::new();
        let mut report = Report::default();
        for outcome in outcomes {
            let (produced, partial) = outcome?;
            result.merge(&produced);
            report.merge(partial);
        }
        report.sort_truncated();

        debug!(
            inputs = inputs.len(),
            outputs = result.len(),
            t,
            omission = report.omission_bound,
            built = report.trees_built,
            reused = report.trees_reused,
            "transmute: done"
        );
        Ok((result, report))
    }

    #[allow(clippy::too_many_arguments)]
    fn transmute_one(
        &self,
        cache: &ChainCache,
        builder: &ChainBuilder<'_, P>,
        nuclide: Nuclide,
        amount: f64,
        t: f64,
        flux: &Flux,
        tolerance: f64,
    ) -> Result<(Material, Report), TransmuteError> {
        let mut produced = Material::new();
        let mut report = Report::default();

        let (tree, built) = match cache.fetch(builder, nuclide, flux, tolerance) {
            Ok(fetched) => fetched,
            Err(ChainError::NoDecayData(_)) => match self.config.missing_root {
                MissingRootPolicy::Abort => return Err(TransmuteError::NoDecayData(nuclide)),
                MissingRootPolicy::PassThrough => {
                    warn!(%nuclide, amount, "transmute: no decay data, passing through");
                    produced.add(nuclide, amount);
                    report.warn(nuclide, Warning::NoDecayData);
                    return Ok((produced, report));
                }
            },
            Err(err) => {
                warn!(%nuclide, %err, "transmute: chain failed, passing through");
                produced.add(nuclide, amount);
                report.warn(nuclide, Warning::ChainFailure(err.to_string()));
                return Ok((produced, report));
            }
        };

        if built {
            report.trees_built += 1;
        } else {
            report.trees_reused += 1;
        }

        for id in tree.node_ids() {
            let solution = self.solver.solve_path(&tree, id, t);
            if solution.degenerate {
                report.degenerate_paths += 1;
            }
            if solution.clamped {
                report.clamped_paths += 1;
            }
            if solution.amount > 0.0 {
                produced.add(tree.node(id).nuclide, amount * solution.amount);
            }
        }
        report.record_tree(&tree, amount);
        Ok((produced, report))
    }
}
