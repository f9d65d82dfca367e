//! Measurement factors.
//!
//! A factor constrains one or two variables:
//! - **Prior**: absolute pose measurement on a single key
//! - **Between**: relative pose measurement `x_from⁻¹ * x_to`
//!
//! Between factors are further classified by their keys (see
//! [`FactorKind`]) so outlier rejection can treat odometry, loop closures
//! and landmark measurements differently.

use nalgebra::{DMatrix, DVector};

use crate::core::{Edge, Key, ObservationId, Value, Values};

/// Information matrix (inverse covariance) of a measurement.
#[derive(Clone, Debug, PartialEq)]
pub struct Information(DMatrix<f64>);

impl Information {
    /// Wrap a symmetric positive (semi-)definite matrix.
    pub fn new(matrix: DMatrix<f64>) -> Self {
        Self(matrix)
    }

    /// Unit information.
    pub fn identity(dim: usize) -> Self {
        Self(DMatrix::identity(dim, dim))
    }

    /// Diagonal information matrix.
    pub fn diagonal(diag: &[f64]) -> Self {
        Self(DMatrix::from_diagonal(&DVector::from_row_slice(diag)))
    }

    /// Create from per-axis standard deviations.
    pub fn from_sigmas(sigmas: &[f64]) -> Self {
        let diag: Vec<f64> = sigmas.iter().map(|s| 1.0 / (s * s)).collect();
        Self::diagonal(&diag)
    }

    /// Matrix dimension.
    pub fn dim(&self) -> usize {
        self.0.nrows()
    }

    /// Underlying matrix.
    pub fn matrix(&self) -> &DMatrix<f64> {
        &self.0
    }

    /// Covariance, or `None` if the information matrix is singular.
    pub fn covariance(&self) -> Option<DMatrix<f64>> {
        self.0.clone().try_inverse()
    }
}

/// Role of a factor in the graph.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FactorKind {
    /// Prior on a single variable.
    Prior,
    /// Between consecutive poses of the same robot.
    Odometry,
    /// Between non-consecutive poses (same or different robots).
    LoopClosure,
    /// Between a robot pose and a special-prefix variable (landmark).
    Landmark,
    /// Between two special-prefix variables.
    Special,
}

/// Prior factor on one variable.
#[derive(Clone, Debug, PartialEq)]
pub struct PriorFactor {
    /// Constrained variable.
    pub key: Key,
    /// Measured value.
    pub prior: Value,
    /// Measurement information.
    pub information: Information,
}

/// Relative measurement between two variables.
#[derive(Clone, Debug, PartialEq)]
pub struct BetweenFactor {
    /// Source variable.
    pub from: Key,
    /// Target variable.
    pub to: Key,
    /// Measured relative pose `x_from⁻¹ * x_to`.
    pub measurement: Value,
    /// Measurement information.
    pub information: Information,
}

/// A measurement constraint.
#[derive(Clone, Debug, PartialEq)]
pub enum Factor {
    /// Absolute prior.
    Prior(PriorFactor),
    /// Relative measurement.
    Between(BetweenFactor),
}

impl Factor {
    /// Create a prior factor.
    pub fn prior(key: Key, prior: impl Into<Value>, information: Information) -> Self {
        Factor::Prior(PriorFactor {
            key,
            prior: prior.into(),
            information,
        })
    }

    /// Create a between factor.
    pub fn between(
        from: Key,
        to: Key,
        measurement: impl Into<Value>,
        information: Information,
    ) -> Self {
        Factor::Between(BetweenFactor {
            from,
            to,
            measurement: measurement.into(),
            information,
        })
    }

    /// Keys of the constrained variables.
    pub fn keys(&self) -> Vec<Key> {
        match self {
            Factor::Prior(f) => vec![f.key],
            Factor::Between(f) => vec![f.from, f.to],
        }
    }

    /// Endpoints; priors report the same key twice.
    pub fn edge(&self) -> Edge {
        match self {
            Factor::Prior(f) => Edge::new(f.key, f.key),
            Factor::Between(f) => Edge::new(f.from, f.to),
        }
    }

    /// Residual dimension.
    pub fn dim(&self) -> usize {
        match self {
            Factor::Prior(f) => f.prior.dim(),
            Factor::Between(f) => f.measurement.dim(),
        }
    }

    /// Measurement information.
    pub fn information(&self) -> &Information {
        match self {
            Factor::Prior(f) => &f.information,
            Factor::Between(f) => &f.information,
        }
    }

    /// Unweighted residual at `values`.
    ///
    /// Returns `None` if a key has no estimate or the variable types do not
    /// match the measurement.
    pub fn residual(&self, values: &Values) -> Option<DVector<f64>> {
        match self {
            Factor::Prior(f) => {
                let x = values.get(f.key)?;
                f.prior.local(x)
            }
            Factor::Between(f) => {
                let xi = values.get(f.from)?;
                let xj = values.get(f.to)?;
                let predicted = xi.between(xj)?;
                f.measurement.local(&predicted)
            }
        }
    }

    /// `½ rᵀ Ω r` at `values`, zero if the residual is unavailable or does
    /// not match the information matrix.
    pub fn error(&self, values: &Values) -> f64 {
        let information = self.information().matrix();
        match self.residual(values) {
            Some(r) if r.len() == information.nrows() && information.is_square() => {
                0.5 * (r.transpose() * information * &r)[(0, 0)]
            }
            _ => 0.0,
        }
    }

    /// Classify the factor given the set of special (landmark) prefixes.
    pub fn kind(&self, special_symbols: &[char]) -> FactorKind {
        let Factor::Between(f) = self else {
            return FactorKind::Prior;
        };
        let from_special = special_symbols.contains(&f.from.chr());
        let to_special = special_symbols.contains(&f.to.chr());
        match (from_special, to_special) {
            (true, true) => FactorKind::Special,
            (true, false) | (false, true) => FactorKind::Landmark,
            (false, false) => {
                if f.from.is_consecutive(f.to) {
                    FactorKind::Odometry
                } else {
                    FactorKind::LoopClosure
                }
            }
        }
    }

    /// Robot pair of a between factor.
    pub fn observation_id(&self) -> Option<ObservationId> {
        match self {
            Factor::Prior(_) => None,
            Factor::Between(f) => Some(ObservationId::new(f.from.chr(), f.to.chr())),
        }
    }

    /// True if any key carries `prefix`.
    pub fn touches_prefix(&self, prefix: char) -> bool {
        self.keys().iter().any(|k| k.chr() == prefix)
    }
}
