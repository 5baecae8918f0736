//! # transmute-core
//! Foundation types and traits for the Transmute chain solver.

pub mod constants;
pub mod error;
pub mod flux;
pub mod library;
pub mod material;
pub mod nuclide;
pub mod traits;
pub mod types;

pub use error::DataError;
pub use flux::{Flux, FluxFingerprint};
pub use library::NuclideLibrary;
pub use material::Material;
pub use nuclide::Nuclide;
pub use traits::NuclideDataProvider;
pub use types::{Branch, BranchKind, DecayInfo, DecayMode, ReactionKind, ReactionRemoval};
