//! Test utilities for SetuPGO.
//!
//! Builders for trajectories, odometry chains and loop closures.

#![allow(dead_code)]

use std::f64::consts::FRAC_PI_2;

use setu_pgo::{
    Factor, FactorGraph, Information, Key, LiePose, Pose2D, Pose3D, RobustSolver,
    RobustSolverParams, Values, Verbosity,
};

/// Initialize test logging once.
pub fn init_logging() {
    env_logger::builder().is_test(true).try_init().ok();
}

/// Odometry noise used by every builder.
pub fn odom_info() -> Information {
    Information::from_sigmas(&[0.05, 0.05, 0.01])
}

/// Loop closure noise used by every builder.
pub fn lc_info() -> Information {
    Information::from_sigmas(&[0.1, 0.1, 0.02])
}

/// Spatial odometry noise.
pub fn odom_info_3d() -> Information {
    Information::from_sigmas(&[0.01, 0.01, 0.01, 0.05, 0.05, 0.05])
}

/// Create a straight-line trajectory.
pub fn straight_trajectory(n: usize, spacing: f64) -> Vec<Pose2D> {
    (0..n)
        .map(|i| Pose2D::new(i as f64 * spacing, 0.0, 0.0))
        .collect()
}

/// Create a square loop trajectory, turning left at each corner.
pub fn square_trajectory(side_length: f64, points_per_side: usize) -> Vec<Pose2D> {
    let mut poses = Vec::new();
    let spacing = side_length / points_per_side as f64;

    for i in 0..points_per_side {
        poses.push(Pose2D::new(i as f64 * spacing, 0.0, 0.0));
    }
    for i in 0..points_per_side {
        poses.push(Pose2D::new(side_length, i as f64 * spacing, FRAC_PI_2));
    }
    for i in 0..points_per_side {
        poses.push(Pose2D::new(
            side_length - i as f64 * spacing,
            side_length,
            std::f64::consts::PI,
        ));
    }
    for i in 0..points_per_side {
        poses.push(Pose2D::new(0.0, side_length - i as f64 * spacing, -FRAC_PI_2));
    }
    poses
}

/// Prior on the first pose, odometry between consecutive poses and
/// perturbed initial estimates.
pub fn odometry_chain(prefix: char, poses: &[Pose2D]) -> (FactorGraph, Values) {
    let key = |i: usize| Key::symbol(prefix, i as u64);
    let mut graph = FactorGraph::new();
    let mut values = Values::new();

    graph.push(Factor::prior(key(0), poses[0], Information::from_sigmas(&[0.01; 3])));
    values.insert(key(0), poses[0]);
    for i in 1..poses.len() {
        graph.push(Factor::between(
            key(i - 1),
            key(i),
            poses[i - 1].between(&poses[i]),
            odom_info(),
        ));
        // Small deterministic drift in the initial guess
        let drift = 0.01 * i as f64;
        let guess = Pose2D::new(poses[i].x + drift, poses[i].y - drift, poses[i].theta);
        values.insert(key(i), guess);
    }
    (graph, values)
}

/// Spatial odometry chain along x with a prior on the first pose.
pub fn odometry_chain_3d(prefix: char, n: usize) -> (FactorGraph, Values) {
    let key = |i: usize| Key::symbol(prefix, i as u64);
    let mut graph = FactorGraph::new();
    let mut values = Values::new();

    graph.push(Factor::prior(key(0), Pose3D::identity(), odom_info_3d()));
    values.insert(key(0), Pose3D::identity());
    let step = Pose3D::from_xyz_rpy(1.0, 0.0, 0.0, 0.0, 0.0, 0.0);
    for i in 1..n {
        graph.push(Factor::between(key(i - 1), key(i), step, odom_info_3d()));
        values.insert(key(i), Pose3D::from_xyz_rpy(i as f64, 0.0, 0.0, 0.0, 0.0, 0.0));
    }
    (graph, values)
}

/// Loop closure consistent with the ground-truth trajectory.
pub fn loop_closure(from: Key, to: Key, poses: &[Pose2D]) -> Factor {
    let measurement = poses[from.index() as usize].between(&poses[to.index() as usize]);
    Factor::between(from, to, measurement, lc_info())
}

/// Loop closure that disagrees with the trajectory by a large offset.
pub fn bad_loop_closure(from: Key, to: Key, poses: &[Pose2D]) -> Factor {
    let truth = poses[from.index() as usize].between(&poses[to.index() as usize]);
    let measurement = truth.compose(&Pose2D::new(2.5, -1.5, 0.8));
    Factor::between(from, to, measurement, lc_info())
}

/// Graph with a single factor.
pub fn single(factor: Factor) -> FactorGraph {
    let mut graph = FactorGraph::new();
    graph.push(factor);
    graph
}

/// Solver without outlier rejection.
pub fn solver_without_rejection() -> RobustSolver {
    let mut params = RobustSolverParams::default();
    params.set_no_rejection(Verbosity::Quiet);
    RobustSolver::new(params).unwrap()
}

/// Planar PCM solver with Mahalanobis thresholds.
pub fn pcm_2d_solver() -> RobustSolver {
    let mut params = RobustSolverParams::default();
    params.set_pcm_2d_params(3.0, 3.0, Verbosity::Quiet);
    RobustSolver::new(params).unwrap()
}

/// Planar PCM solver with distance thresholds.
pub fn pcm_simple_2d_solver() -> RobustSolver {
    let mut params = RobustSolverParams::default();
    params.set_pcm_simple_2d_params(0.3, 0.1, Verbosity::Quiet);
    RobustSolver::new(params).unwrap()
}
