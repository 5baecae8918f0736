//! Error types for chain construction and transmutation.
use thiserror::Error;

use transmute_core::Nuclide;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ChainError {
    #[error("no decay data for root {0}")] NoDecayData(Nuclide),
    #[error("invalid tolerance: {0} (must be in (0, 1])")] InvalidTolerance(f64),
    #[error("corrupt chain tree for {nuclide}: {reason}")] CacheCorruption { nuclide: Nuclide, reason: String },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransmuteError {
    #[error("no decay data for {0}")] NoDecayData(Nuclide),
    #[error("invalid time: {0}")] InvalidTime(f64),
    #[error("invalid tolerance: {0} (must be in (0, 1])")] InvalidTolerance(f64),
    #[error("invalid amount for {nuclide}: {amount}")] InvalidAmount { nuclide: Nuclide, amount: f64 },
    #[error("flux must be finite and non-negative")] InvalidFlux,
    #[error("invalid config: {0}")] InvalidConfig(String),
    #[error(transparent)] Chain(#[from] ChainError),
}
