//! Nuclide identifiers.
//!
//! A [`Nuclide`] packs proton count, nucleon count and excitation state into
//! one integer laid out as `ZZZAAASSSS`:
//!
//! ```text
//! id = Z * 10_000_000 + A * 10_000 + S
//! ```
//!
//! so `U-235` is `922350000` and `Am-242m` is `952420001`. The solver treats
//! the id as an opaque key; the accessors and the text form exist for
//! callers and for readable logs.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::constants::{A_FACTOR, MAX_Z, Z_FACTOR};
use crate::error::ParseNuclideError;

/// Element symbols indexed by atomic number (index 0 is the free neutron).
const ELEMENTS: [&str; 119] = [
    "n", "H", "He", "Li", "Be", "B", "C", "N", "O", "F", "Ne", "Na", "Mg", "Al", "Si", "P", "S",
    "Cl", "Ar", "K", "Ca", "Sc", "Ti", "V", "Cr", "Mn", "Fe", "Co", "Ni", "Cu", "Zn", "Ga", "Ge",
    "As", "Se", "Br", "Kr", "Rb", "Sr", "Y", "Zr", "Nb", "Mo", "Tc", "Ru", "Rh", "Pd", "Ag", "Cd",
    "In", "Sn", "Sb", "Te", "I", "Xe", "Cs", "Ba", "La", "Ce", "Pr", "Nd", "Pm", "Sm", "Eu", "Gd",
    "Tb", "Dy", "Ho", "Er", "Tm", "Yb", "Lu", "Hf", "Ta", "W", "Re", "Os", "Ir", "Pt", "Au", "Hg",
    "Tl", "Pb", "Bi", "Po", "At", "Rn", "Fr", "Ra", "Ac", "Th", "Pa", "U", "Np", "Pu", "Am", "Cm",
    "Bk", "Cf", "Es", "Fm", "Md", "No", "Lr", "Rf", "Db", "Sg", "Bh", "Hs", "Mt", "Ds", "Rg", "Cn",
    "Nh", "Fl", "Mc", "Lv", "Ts", "Og",
];

/// Opaque nuclide identifier in `ZZZAAASSSS` form.
///
/// # Examples
///
/// ```
/// use transmute_core::Nuclide;
/// let u235: Nuclide = "U-235".parse().unwrap();
/// assert_eq!(u235.id(), 922_350_000);
/// assert_eq!(u235.znum(), 92);
/// assert_eq!(u235.anum(), 235);
/// assert_eq!(u235.to_string(), "U235");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Nuclide(pub u32);

impl Nuclide {
    /// Build an id from its parts. Returns `None` when a part overflows its
    /// field or `z` has no element.
    pub fn new(z: u32, a: u32, s: u32) -> Option<Self> {
        if z > MAX_Z || a >= 1000 || s >= A_FACTOR {
            return None;
        }
        Some(Self(z * Z_FACTOR + a * A_FACTOR + s))
    }

    /// Raw integer id.
    pub fn id(self) -> u32 {
        self.0
    }

    /// Proton number Z.
    pub fn znum(self) -> u32 {
        self.0 / Z_FACTOR
    }

    /// Nucleon number A.
    pub fn anum(self) -> u32 {
        (self.0 / A_FACTOR) % 1000
    }

    /// Excitation state; 0 is the ground state.
    pub fn snum(self) -> u32 {
        self.0 % A_FACTOR
    }

    /// Same Z and A in the ground state.
    pub fn ground_state(self) -> Self {
        Self(self.0 - self.snum())
    }

    pub fn is_metastable(self) -> bool {
        self.snum() > 0
    }

    /// Shift Z and A by the given deltas and land in the ground state.
    ///
    /// Returns `None` when the product would be unphysical (negative Z or A,
    /// fewer nucleons than protons).
    pub fn shifted(self, dz: i32, da: i32) -> Option<Self> {
        let z = i64::from(self.znum()) + i64::from(dz);
        let a = i64::from(self.anum()) + i64::from(da);
        if z < 0 || a <= 0 || a < z {
            return None;
        }
        Self::new(u32::try_from(z).ok()?, u32::try_from(a).ok()?, 0)
    }

    /// Element symbol, if Z is in the table.
    pub fn symbol(self) -> Option<&'static str> {
        ELEMENTS.get(self.znum() as usize).copied()
    }
}

impl fmt::Display for Nuclide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some(symbol) = self.symbol() else {
            return write!(f, "{}", self.0);
        };
        if self.anum() == 0 {
            return f.write_str(symbol);
        }
        write!(f, "{symbol}{}", self.anum())?;
        match self.snum() {
            0 => Ok(()),
            1 => f.write_str("M"),
            s => write!(f, "M{s}"),
        }
    }
}

impl From<Nuclide> for u32 {
    fn from(n: Nuclide) -> Self {
        n.0
    }
}

impl FromStr for Nuclide {
    type Err = ParseNuclideError;

    /// Accepts `U235`, `U-235`, `u235`, `Am242m`, `AM-242M2` and raw ids
    /// such as `922350000`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let text = s.trim();
        if text.is_empty() {
            return Err(ParseNuclideError::Empty);
        }

        if text.bytes().all(|b| b.is_ascii_digit()) {
            let id: u32 = text
                .parse()
                .map_err(|_| ParseNuclideError::Invalid(text.to_string()))?;
            let n = Nuclide(id);
            return Nuclide::new(n.znum(), n.anum(), n.snum())
                .ok_or_else(|| ParseNuclideError::Invalid(text.to_string()));
        }

        let compact: String = text.chars().filter(|c| *c != '-').collect();
        let letters_end = compact
            .find(|c: char| !c.is_ascii_alphabetic())
            .unwrap_or(compact.len());
        let (symbol, rest) = compact.split_at(letters_end);
        // Exact case first so that "n" (neutron) and "N" (nitrogen) stay apart.
        let z = ELEMENTS
            .iter()
            .position(|e| *e == symbol)
            .or_else(|| {
                ELEMENTS
                    .iter()
                    .skip(1)
                    .position(|e| e.eq_ignore_ascii_case(symbol))
                    .map(|i| i + 1)
            })
            .ok_or_else(|| ParseNuclideError::UnknownElement(symbol.to_string()))?;

        let digits_end = rest
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(rest.len());
        let (mass, state) = rest.split_at(digits_end);
        let a: u32 = if mass.is_empty() {
            0
        } else {
            mass.parse()
                .map_err(|_| ParseNuclideError::Invalid(text.to_string()))?
        };

        let s = if state.is_empty() {
            0
        } else if let Some(level) = state.strip_prefix(['m', 'M']) {
            if level.is_empty() {
                1
            } else {
                level
                    .parse()
                    .map_err(|_| ParseNuclideError::Invalid(text.to_string()))?
            }
        } else {
            return Err(ParseNuclideError::Invalid(text.to_string()));
        };

        Nuclide::new(z as u32, a, s).ok_or_else(|| ParseNuclideError::Invalid(text.to_string()))
    }
}
