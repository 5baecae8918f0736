//! Configuration for chain building, caching and transmutation.
//!
//! [`TransmuterConfig`] carries the defaults a [`Transmuter`](crate::Transmuter)
//! falls back to (time, flux, tolerance) plus the limits handed down to the
//! chain builder. The structs are plain data with `Default` impls so callers
//! can embed them in their own serde configs.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use transmute_core::Flux;
use transmute_core::constants::{DEFAULT_MAX_DEPTH, DEFAULT_TOLERANCE};

use crate::error::TransmuteError;

/// Default cap on the number of nodes in a single tree.
pub const DEFAULT_MAX_NODES: usize = 1_000_000;

/// What to do with an input nuclide the data provider knows nothing about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MissingRootPolicy {
    /// Copy the amount unchanged into the result and record a warning.
    #[default]
    PassThrough,
    /// Fail the whole call with [`TransmuteError::NoDecayData`].
    Abort,
}

/// Limits for a single tree expansion.
#[derive(Debug, Clone, PartialEq)]
pub struct BuilderConfig {
    /// Absolute depth cap; also bounds paths that revisit a nuclide.
    pub max_depth: usize,
    /// Node budget per tree; nodes past it are truncated.
    pub max_nodes: usize,
    /// Stop expanding once this instant has passed.
    pub deadline: Option<Instant>,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            max_nodes: DEFAULT_MAX_NODES,
            deadline: None,
        }
    }
}

/// Chain cache bounds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Keep at most this many trees; oldest inserted are evicted first.
    pub max_entries: Option<usize>,
}

impl CacheConfig {
    pub fn bounded(max_entries: usize) -> Self {
        Self {
            max_entries: Some(max_entries),
        }
    }
}

/// Transmuter defaults and limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransmuterConfig {
    /// Default elapsed time.
    pub time: f64,
    /// Default flux.
    pub flux: Flux,
    /// Default pruning tolerance.
    pub tolerance: f64,
    pub max_depth: usize,
    pub max_nodes: usize,
    pub missing_root: MissingRootPolicy,
    /// Process input nuclides on the rayon pool.
    pub parallel: bool,
    /// Wall-clock budget for tree expansion per call.
    pub deadline: Option<Duration>,
}

impl Default for TransmuterConfig {
    fn default() -> Self {
        Self {
            time: 1.0,
            flux: Flux::zero(),
            tolerance: DEFAULT_TOLERANCE,
            max_depth: DEFAULT_MAX_DEPTH,
            max_nodes: DEFAULT_MAX_NODES,
            missing_root: MissingRootPolicy::default(),
            parallel: true,
            deadline: None,
        }
    }
}

impl TransmuterConfig {
    /// Pure decay over `time`.
    pub fn decay_only(time: f64) -> Self {
        Self {
            time,
            ..Self::default()
        }
    }

    /// Irradiation in `flux` over `time`.
    pub fn irradiation(time: f64, flux: Flux) -> Self {
        Self {
            time,
            flux,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), TransmuteError> {
        check_time(self.time)?;
        check_tolerance(self.tolerance)?;
        if !self.flux.is_valid() {
            return Err(TransmuteError::InvalidFlux);
        }
        if self.max_depth == 0 {
            return Err(TransmuteError::InvalidConfig("max_depth must be at least 1".into()));
        }
        if self.max_nodes == 0 {
            return Err(TransmuteError::InvalidConfig("max_nodes must be at least 1".into()));
        }
        Ok(())
    }

    /// Builder limits for one call that started at `started`.
    pub fn builder_config(&self, started: Instant) -> BuilderConfig {
        BuilderConfig {
            max_depth: self.max_depth,
            max_nodes: self.max_nodes,
            deadline: self.deadline.map(|d| started + d),
        }
    }
}

pub(crate) fn check_time(t: f64) -> Result<(), TransmuteError> {
    if !t.is_finite() || t < 0.0 {
        return Err(TransmuteError::InvalidTime(t));
    }
    Ok(())
}

pub(crate) fn check_tolerance(tol: f64) -> Result<(), TransmuteError> {
    if !valid_tolerance(tol) {
        return Err(TransmuteError::InvalidTolerance(tol));
    }
    Ok(())
}

pub(crate) fn valid_tolerance(tol: f64) -> bool {
    tol.is_finite() && tol > 0.0 && tol <= 1.0
}
