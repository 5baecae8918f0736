//! Minimal material composition: nuclide → amount.
//!
//! Amounts are plain non-negative reals (atoms, moles or mass; the solver is
//! linear so the unit passes straight through). Iteration is ordered by
//! nuclide id so results print and compare deterministically.

use std::collections::BTreeMap;
use std::collections::btree_map;

use serde::{Deserialize, Serialize};

use crate::nuclide::Nuclide;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Material {
    comp: BTreeMap<Nuclide, f64>,
}

impl Material {
    pub fn new() -> Self {
        Self::default()
    }

    /// Amount of `nuclide`, 0 when absent.
    pub fn amount(&self, nuclide: Nuclide) -> f64 {
        self.comp.get(&nuclide).copied().unwrap_or(0.0)
    }

    /// Overwrite the amount of `nuclide`.
    pub fn set(&mut self, nuclide: Nuclide, amount: f64) {
        self.comp.insert(nuclide, amount);
    }

    /// Accumulate `amount` onto `nuclide`.
    pub fn add(&mut self, nuclide: Nuclide, amount: f64) {
        *self.comp.entry(nuclide).or_insert(0.0) += amount;
    }

    /// Add every entry of `other` into `self`.
    pub fn merge(&mut self, other: &Material) {
        for (nuc, amount) in other.iter() {
            self.add(nuc, amount);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (Nuclide, f64)> + '_ {
        self.comp.iter().map(|(n, a)| (*n, *a))
    }

    pub fn nuclides(&self) -> impl Iterator<Item = Nuclide> + '_ {
        self.comp.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.comp.len()
    }

    pub fn is_empty(&self) -> bool {
        self.comp.is_empty()
    }

    /// Sum of all amounts.
    pub fn total(&self) -> f64 {
        self.comp.values().sum()
    }

    /// Every amount multiplied by `factor`.
    pub fn scaled(&self, factor: f64) -> Self {
        self.comp.iter().map(|(n, a)| (*n, a * factor)).collect()
    }

    /// Copy with exactly-zero entries removed.
    pub fn without_zeros(&self) -> Self {
        self.comp
            .iter()
            .filter(|(_, a)| **a != 0.0)
            .map(|(n, a)| (*n, *a))
            .collect()
    }
}

impl FromIterator<(Nuclide, f64)> for Material {
    /// Duplicate nuclides accumulate.
    fn from_iter<I: IntoIterator<Item = (Nuclide, f64)>>(iter: I) -> Self {
        let mut m = Material::new();
        for (nuc, amount) in iter {
            m.add(nuc, amount);
        }
        m
    }
}

impl<'a> IntoIterator for &'a Material {
    type Item = (&'a Nuclide, &'a f64);
    type IntoIter = btree_map::Iter<'a, Nuclide, f64>;

    fn into_iter(self) -> Self::IntoIter {
        self.comp.iter()
    }
}
