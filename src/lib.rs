//! # SetuPGO
//!
//! Robust incremental pose graph optimization for single- and multi-robot
//! SLAM back-ends.
//!
//! ## Overview
//!
//! Measurements arrive in batches. Each batch is filtered by an outlier
//! rejection strategy before it reaches the accepted graph, which is then
//! re-optimized:
//!
//! - **None** - Every measurement is accepted
//! - **PCM-2D / PCM-3D** - Pairwise Consistency Maximization with Mahalanobis tests
//! - **PCM-Simple-2D / PCM-Simple-3D** - PCM with translation/rotation thresholds
//!
//! ## Features
//!
//! - **Incremental updates**: batches of factors and initial estimates
//! - **Levenberg-Marquardt / Gauss-Newton**: dense solver over SE(2) and SE(3)
//! - **Loop closure lifecycle**: remove the latest closure, suppress or
//!   restore all closures of a robot
//! - **Diagnostics**: per-update counters and consistency errors, g2o export
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use setu_pgo::{Factor, FactorGraph, Information, Key, Pose2D, RobustSolver,
//!                RobustSolverParams, Values, Verbosity};
//!
//! let mut params = RobustSolverParams::default();
//! params.set_pcm_simple_2d_params(0.3, 0.1, Verbosity::Update);
//! let mut solver = RobustSolver::new(params)?;
//!
//! let a = |i| Key::symbol('a', i);
//! let mut factors = FactorGraph::new();
//! factors.push(Factor::prior(a(0), Pose2D::default(), Information::identity(3)));
//! factors.push(Factor::between(a(0), a(1), Pose2D::new(1.0, 0.0, 0.0), Information::identity(3)));
//!
//! let mut values = Values::new();
//! values.insert(a(0), Pose2D::default());
//! values.insert(a(1), Pose2D::new(0.9, 0.1, 0.0));
//!
//! solver.update(&factors, &values);
//! println!("error: {:.6}", solver.error());
//! ```
//!
//! ## Keys
//!
//! Variables are named by a prefix character and an index (`a12`). The
//! prefix identifies the robot; prefixes listed in `special_symbols` mark
//! landmarks instead.

#![warn(missing_docs)]

// Keys, poses and estimates
pub mod core;

// Factors and factor graphs
pub mod graph;

// Nonlinear least squares
pub mod optimizer;

// Solver parameters
pub mod config;

// Outlier rejection strategies
pub mod outlier;

// Update controller
pub mod solver;

// g2o export
pub mod io;

pub mod error;

// Re-export commonly used types
pub use crate::core::{Edge, Key, LiePose, ObservationId, Pose2D, Pose3D, Value, Values};
pub use graph::{Factor, FactorGraph, FactorKind, Information};

pub use config::{
    DistanceThresholds, OutlierRemovalMethod, PcmThresholds, RobustSolverParams, SolverMode,
    Verbosity,
};
pub use error::{ConfigError, Result, SolverError};
pub use optimizer::{GraphOptimizer, GraphOptimizerConfig, OptimizationResult, TerminationReason};
pub use outlier::{OutlierRejector, OutlierRemoval, RejectionStats};
pub use solver::RobustSolver;
