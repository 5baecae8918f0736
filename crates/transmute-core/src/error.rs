//! Error types shared by data providers and the solver.
use thiserror::Error;

use crate::nuclide::Nuclide;

/// Failures reported by a [`NuclideDataProvider`](crate::traits::NuclideDataProvider).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DataError {
    #[error("no decay data for {0}")] NoDecayData(Nuclide),
    #[error("no reaction data for {0}")] NoReactionData(Nuclide),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseNuclideError {
    #[error("empty nuclide name")] Empty,
    #[error("unknown element: {0}")] UnknownElement(String),
    #[error("invalid nuclide: {0}")] Invalid(String),
}
