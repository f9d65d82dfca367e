//! Cycle consistency tests.
//!
//! A cycle composes measurements and odometry that should return to the
//! starting pose. The test decides whether the residual transform is small
//! enough for the measurements to agree.

use nalgebra::DMatrix;

use crate::core::LiePose;

/// Which threshold a test applies.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CycleKind {
    /// Loop closure against the odometry chain
    Odometry,
    /// Two loop closures against each other
    Pairwise,
}

/// Outcome of a single consistency test.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CheckResult {
    /// Whether the cycle passes
    pub consistent: bool,
    /// Reported error (Mahalanobis distance or translation norm)
    pub error: f64,
}

/// Decides whether a cycle residual is acceptable.
pub trait ConsistencyCheck<P: LiePose>: Clone + std::fmt::Debug + Send + Sync {
    /// Test `cycle` with covariance `covariance` (sum over the cycle).
    fn check(&self, kind: CycleKind, cycle: &P, covariance: &DMatrix<f64>) -> CheckResult;
}

/// Chi-style test: `sqrt(rᵀ Σ⁻¹ r) < threshold` with `r = log(cycle)`.
#[derive(Clone, Debug, PartialEq)]
pub struct Mahalanobis {
    /// Threshold for the odometry check
    pub odom_threshold: f64,
    /// Threshold for pairwise checks
    pub lc_threshold: f64,
}

impl Mahalanobis {
    /// Create with both thresholds.
    pub fn new(odom_threshold: f64, lc_threshold: f64) -> Self {
        Self {
            odom_threshold,
            lc_threshold,
        }
    }
}

impl<P: LiePose> ConsistencyCheck<P> for Mahalanobis {
    fn check(&self, kind: CycleKind, cycle: &P, covariance: &DMatrix<f64>) -> CheckResult {
        let threshold = match kind {
            CycleKind::Odometry => self.odom_threshold,
            CycleKind::Pairwise => self.lc_threshold,
        };

        let r = cycle.log();
        let error = covariance
            .clone()
            .try_inverse()
            .map(|info| (r.transpose() * info * &r)[(0, 0)].max(0.0).sqrt())
            .unwrap_or(f64::INFINITY);

        CheckResult {
            consistent: error < threshold,
            error,
        }
    }
}

/// Geometric test on translation and rotation magnitude, ignoring
/// covariances.
#[derive(Clone, Debug, PartialEq)]
pub struct DistanceThreshold {
    /// Translation threshold (meters)
    pub trans_threshold: f64,
    /// Rotation threshold (radians)
    pub rot_threshold: f64,
}

impl DistanceThreshold {
    /// Create with both thresholds.
    pub fn new(trans_threshold: f64, rot_threshold: f64) -> Self {
        Self {
            trans_threshold,
            rot_threshold,
        }
    }
}

impl<P: LiePose> ConsistencyCheck<P> for DistanceThreshold {
    fn check(&self, _kind: CycleKind, cycle: &P, _covariance: &DMatrix<f64>) -> CheckResult {
        let error = cycle.translation_norm();
        CheckResult {
            consistent: error < self.trans_threshold
                && cycle.rotation_angle() < self.rot_threshold,
            error,
        }
    }
}
