//! Ordered factor collection.

use crate::core::{Key, Values};

use super::factor::{Factor, FactorKind};

/// Factors in arrival order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FactorGraph {
    factors: Vec<Factor>,
}

impl FactorGraph {
    /// Create a new empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a factor.
    pub fn push(&mut self, factor: Factor) {
        self.factors.push(factor);
    }

    /// Append all factors of `other`, preserving order.
    pub fn extend(&mut self, other: &FactorGraph) {
        self.factors.extend(other.factors.iter().cloned());
    }

    /// Remove and return the last factor.
    pub fn pop(&mut self) -> Option<Factor> {
        self.factors.pop()
    }

    /// Remove all factors.
    pub fn clear(&mut self) {
        self.factors.clear();
    }

    /// Number of factors.
    pub fn len(&self) -> usize {
        self.factors.len()
    }

    /// True if the graph has no factors.
    pub fn is_empty(&self) -> bool {
        self.factors.is_empty()
    }

    /// Iterate in arrival order.
    pub fn iter(&self) -> std::slice::Iter<'_, Factor> {
        self.factors.iter()
    }

    /// All factors.
    pub fn factors(&self) -> &[Factor] {
        &self.factors
    }

    /// Total error `Σ ½ rᵀ Ω r` at `values`.
    pub fn error(&self, values: &Values) -> f64 {
        self.factors.iter().map(|f| f.error(values)).sum()
    }

    /// Keys referenced by factors, in first-appearance order.
    pub fn keys(&self) -> Vec<Key> {
        let mut seen = std::collections::HashSet::new();
        let mut keys = Vec::new();
        for factor in &self.factors {
            for key in factor.keys() {
                if seen.insert(key) {
                    keys.push(key);
                }
            }
        }
        keys
    }

    /// Number of loop closure factors.
    pub fn num_loop_closures(&self, special_symbols: &[char]) -> usize {
        self.factors
            .iter()
            .filter(|f| f.kind(special_symbols) == FactorKind::LoopClosure)
            .count()
    }
}

impl FromIterator<Factor> for FactorGraph {
    fn from_iter<T: IntoIterator<Item = Factor>>(iter: T) -> Self {
        Self {
            factors: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a FactorGraph {
    type Item = &'a Factor;
    type IntoIter = std::slice::Iter<'a, Factor>;

    fn into_iter(self) -> Self::IntoIter {
        self.factors.iter()
    }
}
