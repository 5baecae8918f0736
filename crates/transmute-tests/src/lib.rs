//! Integration and property test suite for Transmute.
//!
//! The tests under `tests/` check the solver end to end against analytic
//! solutions and a direct ODE integration, exercise cyclic chains, cache
//! reuse and concurrent callers. Shared fixtures live in [`helpers`].

pub mod helpers;
