//! Per-robot odometry chains used to close consistency cycles.

use nalgebra::DMatrix;

use crate::core::LiePose;

/// Relative pose with its covariance.
#[derive(Clone, Debug)]
pub struct PoseWithCovariance<P> {
    /// Relative pose
    pub pose: P,
    /// Covariance in the tangent space of `pose`
    pub covariance: DMatrix<f64>,
}

impl<P: LiePose> PoseWithCovariance<P> {
    /// Identity pose with zero covariance.
    pub fn identity() -> Self {
        Self {
            pose: P::identity(),
            covariance: DMatrix::zeros(P::DIM, P::DIM),
        }
    }
}

/// Odometry chain of one robot, built by integrating consecutive between
/// factors.
///
/// Poses are expressed in the frame of the first node. Covariances are
/// accumulated as prefix sums so the covariance of any sub-chain is the
/// difference of two entries (first-order, without frame transport).
#[derive(Clone, Debug)]
pub struct OdometryTrajectory<P> {
    start: u64,
    poses: Vec<P>,
    covariances: Vec<DMatrix<f64>>,
}

impl<P: LiePose> OdometryTrajectory<P> {
    /// Start a chain at pose `start`.
    pub fn new(start: u64) -> Self {
        Self {
            start,
            poses: vec![P::identity()],
            covariances: vec![DMatrix::zeros(P::DIM, P::DIM)],
        }
    }

    /// Index of the first node.
    pub fn start(&self) -> u64 {
        self.start
    }

    /// Index of the last node.
    pub fn last(&self) -> u64 {
        self.start + self.poses.len() as u64 - 1
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.poses.len()
    }

    /// Always false; a chain holds at least its first node.
    pub fn is_empty(&self) -> bool {
        self.poses.is_empty()
    }

    /// True if node `index` is part of the chain.
    pub fn contains(&self, index: u64) -> bool {
        index >= self.start && index <= self.last()
    }

    /// Append the odometry step `last → last + 1`.
    ///
    /// Returns false if `from` is not the current chain end.
    pub fn extend(&mut self, from: u64, step: &P, covariance: &DMatrix<f64>) -> bool {
        if from != self.last() {
            return false;
        }
        // Non-empty by construction
        let (Some(pose), Some(cov)) = (self.poses.last(), self.covariances.last()) else {
            return false;
        };
        let next_pose = pose.compose(step);
        let next_cov = cov + covariance;
        self.poses.push(next_pose);
        self.covariances.push(next_cov);
        true
    }

    /// Odometry from node `from` to node `to` (either direction).
    pub fn between(&self, from: u64, to: u64) -> Option<PoseWithCovariance<P>> {
        if !self.contains(from) || !self.contains(to) {
            return None;
        }
        let i = (from - self.start) as usize;
        let j = (to - self.start) as usize;
        let pose = self.poses[i].between(&self.poses[j]);
        let covariance = if i <= j {
            &self.covariances[j] - &self.covariances[i]
        } else {
            &self.covariances[i] - &self.covariances[j]
        };
        Some(PoseWithCovariance { pose, covariance })
    }
}
