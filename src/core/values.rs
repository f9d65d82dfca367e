//! Variable estimates keyed by [`Key`].

use std::collections::BTreeMap;

use nalgebra::DVector;

use super::key::Key;
use super::pose::{LiePose, Pose2D, Pose3D};

/// Estimate of a single variable.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Value {
    /// Planar pose
    Pose2(Pose2D),
    /// Spatial pose
    Pose3(Pose3D),
}

impl Value {
    /// Tangent space dimension.
    pub fn dim(&self) -> usize {
        match self {
            Value::Pose2(_) => Pose2D::DIM,
            Value::Pose3(_) => Pose3D::DIM,
        }
    }

    /// Right perturbation by a tangent vector of length `dim()`.
    pub fn retract(&self, delta: &[f64]) -> Value {
        match self {
            Value::Pose2(p) => Value::Pose2(p.retract(delta)),
            Value::Pose3(p) => Value::Pose3(p.retract(delta)),
        }
    }

    /// Tangent vector of `self⁻¹ * other`, or `None` if the variants differ.
    pub fn local(&self, other: &Value) -> Option<DVector<f64>> {
        match (self, other) {
            (Value::Pose2(a), Value::Pose2(b)) => Some(a.between(b).log()),
            (Value::Pose3(a), Value::Pose3(b)) => Some(a.between(b).log()),
            _ => None,
        }
    }

    /// `self⁻¹ * other`, or `None` if the variants differ.
    pub fn between(&self, other: &Value) -> Option<Value> {
        match (self, other) {
            (Value::Pose2(a), Value::Pose2(b)) => Some(Value::Pose2(a.between(b))),
            (Value::Pose3(a), Value::Pose3(b)) => Some(Value::Pose3(a.between(b))),
            _ => None,
        }
    }
}

impl From<Pose2D> for Value {
    fn from(pose: Pose2D) -> Self {
        Value::Pose2(pose)
    }
}

impl From<Pose3D> for Value {
    fn from(pose: Pose3D) -> Self {
        Value::Pose3(pose)
    }
}

/// Ordered map of variable estimates.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Values {
    values: BTreeMap<Key, Value>,
}

impl Values {
    /// Create an empty set of estimates.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite an estimate.
    pub fn insert(&mut self, key: Key, value: impl Into<Value>) {
        self.values.insert(key, value.into());
    }

    /// Get an estimate.
    pub fn get(&self, key: Key) -> Option<&Value> {
        self.values.get(&key)
    }

    /// Get a typed pose estimate.
    pub fn pose<P: LiePose>(&self, key: Key) -> Option<P> {
        self.values.get(&key).and_then(P::from_value)
    }

    /// True if `key` has an estimate.
    pub fn contains(&self, key: Key) -> bool {
        self.values.contains_key(&key)
    }

    /// Remove an estimate.
    pub fn remove(&mut self, key: Key) -> Option<Value> {
        self.values.remove(&key)
    }

    /// Number of variables.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True if there are no variables.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterate in key order.
    pub fn iter(&self) -> impl Iterator<Item = (Key, &Value)> {
        self.values.iter().map(|(k, v)| (*k, v))
    }

    /// All keys in order.
    pub fn keys(&self) -> impl Iterator<Item = Key> + '_ {
        self.values.keys().copied()
    }

    /// Add estimates for keys not yet present.
    ///
    /// Keys already present keep their current estimate, so re-delivered
    /// initial guesses never clobber optimized values.
    pub fn merge(&mut self, other: &Values) {
        for (key, value) in other.iter() {
            self.values.entry(key).or_insert(*value);
        }
    }
}

impl FromIterator<(Key, Value)> for Values {
    fn from_iter<T: IntoIterator<Item = (Key, Value)>>(iter: T) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}
