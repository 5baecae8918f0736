//! Solver constants. Rates are per unit time in whatever unit the data
//! provider uses; the solver never converts time units.

/// Natural log of 2, relating half-life and decay constant.
pub const LN_2: f64 = std::f64::consts::LN_2;

/// One barn in cm².
pub const BARN_CM2: f64 = 1e-24;

/// Default minimum cumulative branch fraction before a branch is pruned.
pub const DEFAULT_TOLERANCE: f64 = 1e-7;

/// Default absolute depth cap for chain expansion.
///
/// Paths that revisit an ancestor nuclide are expanded at most this deep.
pub const DEFAULT_MAX_DEPTH: usize = 30;

/// Relative tolerance under which two removal constants are treated as
/// the same root of the Bateman system.
pub const DEGENERACY_RTOL: f64 = 1e-9;

/// Nuclide id layout: `ZZZAAASSSS`.
pub const Z_FACTOR: u32 = 10_000_000;
/// Nucleon number multiplier inside a nuclide id.
pub const A_FACTOR: u32 = 10_000;

/// Highest atomic number with an element symbol.
pub const MAX_Z: u32 = 118;
