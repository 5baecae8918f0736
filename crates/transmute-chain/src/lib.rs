//! # transmute-chain
//! Production-tree expansion, Bateman path solutions and the shared chain
//! cache behind material transmutation.
//!
//! ```
//! use std::sync::Arc;
//! use transmute_chain::{ChainCache, Transmuter, TransmuterConfig};
//! use transmute_core::{DecayMode, Flux, Material, NuclideLibrary};
//!
//! let co60 = "Co60".parse().unwrap();
//! let ni60 = "Ni60".parse().unwrap();
//! let library = NuclideLibrary::new()
//!     .with_half_life(co60, 10.0, &[(DecayMode::BetaMinus, 1.0)])
//!     .with_stable(ni60);
//!
//! let transmuter = Transmuter::new(Arc::new(library), TransmuterConfig::default()).unwrap();
//! let cache = ChainCache::default();
//! let material: Material = [(co60, 1.0)].into_iter().collect();
//!
//! let (out, report) = transmuter
//!     .transmute(&cache, &material, 10.0, &Flux::zero(), 1e-7)
//!     .unwrap();
//! assert!((out.amount(ni60) - 0.5).abs() < 1e-12);
//! assert!(report.is_clean());
//! ```

pub mod bateman;
pub mod builder;
pub mod cache;
pub mod config;
pub mod error;
pub mod report;
pub mod transmuter;
pub mod tree;

pub use bateman::{BatemanSolver, PathSolution};
pub use builder::ChainBuilder;
pub use cache::{CacheStats, ChainCache};
pub use config::{BuilderConfig, CacheConfig, MissingRootPolicy, TransmuterConfig};
pub use error::{ChainError, TransmuteError};
pub use report::{Report, TruncatedBranch, Warning};
pub use transmuter::Transmuter;
pub use tree::{
    ChainNode, ChainWarning, DecayChainTree, NodeId, NodeStatus, TruncationReason, WarningKind,
};
