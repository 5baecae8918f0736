//! Neutron flux and its cache fingerprint.
//!
//! The solver never looks inside a multigroup spectrum: it hands the flux to
//! the data provider for reaction rates and uses [`Flux::fingerprint`] as a
//! cache key. The fingerprint is a BLAKE3 hash over the bincode encoding, so
//! two fluxes share a fingerprint exactly when they are bit-identical.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Neutron flux, one-group or multigroup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
pub enum Flux {
    /// Total flux magnitude.
    OneGroup(f64),
    /// Group fluxes, highest energy first by convention.
    Multigroup(Vec<f64>),
}

impl Flux {
    /// No neutrons: pure decay.
    pub fn zero() -> Self {
        Self::OneGroup(0.0)
    }

    /// Scalar magnitude (sum over groups).
    pub fn total(&self) -> f64 {
        match self {
            Self::OneGroup(phi) => *phi,
            Self::Multigroup(groups) => groups.iter().sum(),
        }
    }

    /// Every group is finite and non-negative.
    pub fn is_valid(&self) -> bool {
        match self {
            Self::OneGroup(phi) => phi.is_finite() && *phi >= 0.0,
            Self::Multigroup(groups) => groups.iter().all(|g| g.is_finite() && *g >= 0.0),
        }
    }

    /// Deterministic key for cache lookups.
    pub fn fingerprint(&self) -> FluxFingerprint {
        let mut hasher = blake3::Hasher::new();
        hasher.update(b"transmute-flux");
        // Encoding plain f64 enums into a Vec cannot fail.
        if let Ok(bytes) = bincode::encode_to_vec(self, bincode::config::standard()) {
            hasher.update(&bytes);
        }
        FluxFingerprint(hasher.finalize().into())
    }
}

impl Default for Flux {
    fn default() -> Self {
        Self::zero()
    }
}

/// 32-byte flux digest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FluxFingerprint(pub [u8; 32]);

impl FluxFingerprint {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for FluxFingerprint {
    /// Short hex prefix, enough to tell fluxes apart in logs.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in &self.0[..6] {
            write!(f, "{b:02x}")?;
        }
        Ok(())
    }
}
