//! Incremental robust pose graph solver.

use std::path::Path;

use crate::config::{OutlierRemovalMethod, RobustSolverParams, SolverMode, Verbosity};
use crate::core::{Edge, ObservationId, Values};
use crate::error::{ConfigError, Result};
use crate::graph::FactorGraph;
use crate::io::write_g2o;
use crate::optimizer::{GraphOptimizer, OptimizationResult};
use crate::outlier::{OutlierRejector, OutlierRemoval, RejectionStats};

use super::diagnostics::DiagnosticsLog;

/// File written by [`RobustSolver::save_data`].
pub const RESULT_FILE: &str = "result.g2o";

/// Accepted factor graph and estimate, grown batch by batch.
///
/// Each batch passes through the configured outlier rejection strategy (or
/// is merged unconditionally when there is none) and the graph is
/// re-optimized when the strategy asks for it. Loop closures can later be
/// removed, or suppressed and restored by robot prefix.
///
/// # Example
///
/// ```rust,ignore
/// let mut params = RobustSolverParams::default();
/// params.set_pcm_2d_params(3.0, 3.0, Verbosity::Quiet);
/// let mut solver = RobustSolver::new(params)?;
///
/// solver.update(&odometry, &initial_guess);
/// solver.update(&loop_closures, &Values::new());
/// solver.save_data(Path::new("/tmp/pgo"))?;
/// ```
#[derive(Debug)]
pub struct RobustSolver {
    graph: FactorGraph,
    values: Values,

    optimizer: GraphOptimizer,
    outlier_removal: Option<OutlierRejector>,

    quiet: bool,
    diagnostics: Option<DiagnosticsLog>,

    num_optimizations: usize,
    last_optimization: Option<OptimizationResult>,
}

impl RobustSolver {
    /// Create a solver with an empty graph.
    ///
    /// Fails if the parameters are invalid; no solver exists afterwards.
    pub fn new(params: RobustSolverParams) -> std::result::Result<Self, ConfigError> {
        params.validate()?;

        let mut outlier_removal = OutlierRejector::from_params(&params);
        let mut quiet = false;
        match params.verbosity {
            Verbosity::Update => {
                if let Some(rejector) = outlier_removal.as_mut() {
                    rejector.set_quiet();
                }
            }
            Verbosity::Quiet => {
                if let Some(rejector) = outlier_removal.as_mut() {
                    rejector.set_quiet();
                }
                quiet = true;
            }
            Verbosity::Verbose => log::info!("Starting RobustSolver."),
        }

        let optimizer = GraphOptimizer::new(params.solver, params.optimizer)
            .with_verbose(params.verbosity == Verbosity::Verbose);

        Ok(Self {
            graph: FactorGraph::new(),
            values: Values::new(),
            optimizer,
            outlier_removal,
            quiet,
            diagnostics: None,
            num_optimizations: 0,
            last_optimization: None,
        })
    }

    /// Add a batch of factors and initial estimates.
    ///
    /// Re-optimizes when the strategy accepts something that changes the
    /// solution (always, without a strategy). Appends a diagnostics record
    /// when logging is enabled.
    pub fn update(&mut self, factors: &FactorGraph, values: &Values) {
        let do_optimize = self.add_batch(factors, values);
        if do_optimize {
            self.optimize();
        }

        if let Some(diagnostics) = &self.diagnostics {
            let stats = self.rejection_stats();
            let error = self.graph.error(&self.values);
            if let Err(e) = diagnostics.append(&stats, error) {
                log::warn!(
                    "Failed to write diagnostics to {}: {}",
                    diagnostics.dir().display(),
                    e
                );
            }
        }
    }

    /// Add a batch and optimize unconditionally. No diagnostics record.
    pub fn force_update(&mut self, factors: &FactorGraph, values: &Values) {
        self.add_batch(factors, values);
        self.optimize();
    }

    fn add_batch(&mut self, factors: &FactorGraph, values: &Values) -> bool {
        match self.outlier_removal.as_mut() {
            Some(rejector) => {
                rejector.remove_outliers(factors, values, &mut self.graph, &mut self.values)
            }
            None => {
                self.graph.extend(factors);
                self.values.merge(values);
                true
            }
        }
    }

    /// Re-optimize the accepted graph and replace the estimate.
    pub fn optimize(&mut self) -> &OptimizationResult {
        if !self.quiet {
            log::debug!(
                "Running {} over {} factors",
                self.optimizer.mode(),
                self.graph.len()
            );
        }

        let (values, result) = self.optimizer.optimize(&self.graph, &self.values);
        self.values = values;
        self.num_optimizations += 1;

        if !self.quiet {
            log::info!(
                "Optimized {} factors: error {:.6} -> {:.6} ({} iterations, {:?})",
                self.graph.len(),
                result.initial_error,
                result.final_error,
                result.iterations,
                result.termination_reason
            );
        }
        self.last_optimization.insert(result)
    }

    /// Remove the most recent loop closure and re-optimize.
    ///
    /// Without a strategy the last factor of any kind is removed.
    pub fn remove_last_loop_closure(&mut self) -> Option<Edge> {
        let removed = match self.outlier_removal.as_mut() {
            Some(rejector) => rejector.remove_last_loop_closure(&mut self.graph),
            None => self.remove_last_factor(),
        };
        self.optimize();
        removed
    }

    /// Remove the most recent loop closure between robots `prefix_1` and
    /// `prefix_2` (in either order) and re-optimize.
    pub fn remove_last_loop_closure_between(
        &mut self,
        prefix_1: char,
        prefix_2: char,
    ) -> Option<Edge> {
        let id = ObservationId::new(prefix_1, prefix_2);
        let removed = match self.outlier_removal.as_mut() {
            Some(rejector) => rejector.remove_last_loop_closure_between(id, &mut self.graph),
            None => self.remove_last_factor(),
        };
        self.optimize();
        removed
    }

    fn remove_last_factor(&mut self) -> Option<Edge> {
        self.graph.pop().map(|factor| factor.edge())
    }

    /// Suppress loop closures touching robot `prefix` and re-optimize.
    pub fn ignore_prefix(&mut self, prefix: char) {
        match self.outlier_removal.as_mut() {
            Some(rejector) => rejector.ignore_loop_closure_with_prefix(prefix, &mut self.graph),
            None => log::warn!(
                "ignore_prefix('{}') has no effect without outlier rejection",
                prefix
            ),
        }
        self.optimize();
    }

    /// Restore loop closures touching robot `prefix` and re-optimize.
    pub fn revive_prefix(&mut self, prefix: char) {
        match self.outlier_removal.as_mut() {
            Some(rejector) => rejector.revive_loop_closure_with_prefix(prefix, &mut self.graph),
            None => log::warn!(
                "revive_prefix('{}') has no effect without outlier rejection",
                prefix
            ),
        }
        self.optimize();
    }

    /// Robot prefixes whose loop closures are currently suppressed, sorted.
    pub fn ignored_prefixes(&self) -> Vec<char> {
        match &self.outlier_removal {
            Some(rejector) => rejector.ignored_prefixes(),
            None => {
                log::warn!("No prefixes are ignored without outlier rejection");
                Vec::new()
            }
        }
    }

    /// Write `result.g2o` (and strategy diagnostics) into `folder`.
    pub fn save_data(&self, folder: &Path) -> Result<()> {
        write_g2o(&self.graph, &self.values, &folder.join(RESULT_FILE))?;
        if let Some(rejector) = &self.outlier_removal {
            rejector.save_data(folder)?;
        }
        Ok(())
    }

    /// Start writing diagnostics into `path`, truncating earlier logs.
    pub fn enable_logging(&mut self, path: &Path) -> Result<()> {
        self.diagnostics = Some(DiagnosticsLog::create(path)?);
        Ok(())
    }

    /// True once [`enable_logging`](Self::enable_logging) succeeded.
    pub fn is_logging(&self) -> bool {
        self.diagnostics.is_some()
    }

    /// Rejection counters of the strategy; all zero without one.
    pub fn rejection_stats(&self) -> RejectionStats {
        self.outlier_removal
            .as_ref()
            .map(|rejector| rejector.rejection_stats())
            .unwrap_or_default()
    }

    /// Accepted factors.
    pub fn graph(&self) -> &FactorGraph {
        &self.graph
    }

    /// Current estimate.
    pub fn values(&self) -> &Values {
        &self.values
    }

    /// Number of accepted factors.
    pub fn size(&self) -> usize {
        self.graph.len()
    }

    /// Total graph error at the current estimate.
    pub fn error(&self) -> f64 {
        self.graph.error(&self.values)
    }

    /// Optimizations run since construction.
    pub fn num_optimizations(&self) -> usize {
        self.num_optimizations
    }

    /// Summary of the latest optimization.
    pub fn last_optimization(&self) -> Option<&OptimizationResult> {
        self.last_optimization.as_ref()
    }

    /// Configured outlier rejection method.
    pub fn outlier_removal_method(&self) -> OutlierRemovalMethod {
        self.outlier_removal
            .as_ref()
            .map_or(OutlierRemovalMethod::None, OutlierRejector::method)
    }

    /// Configured nonlinear solver.
    pub fn solver_mode(&self) -> SolverMode {
        self.optimizer.mode()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Key, Pose2D};
    use crate::graph::{Factor, Information};
    use approx::assert_relative_eq;

    fn x(i: u64) -> Key {
        Key::symbol('x', i)
    }

    fn no_rejection() -> RobustSolver {
        let mut params = RobustSolverParams::default();
        params.set_no_rejection(Verbosity::Quiet);
        RobustSolver::new(params).unwrap()
    }

    fn odometry_batch(from: u64, to: u64) -> (FactorGraph, Values) {
        let mut graph = FactorGraph::new();
        let mut values = Values::new();
        for i in from..to {
            graph.push(Factor::between(
                x(i),
                x(i + 1),
                Pose2D::new(1.0, 0.0, 0.0),
                Information::identity(3),
            ));
            values.insert(x(i + 1), Pose2D::new((i + 1) as f64 + 0.1, 0.0, 0.0));
        }
        (graph, values)
    }

    #[test]
    fn test_new_rejects_invalid_params() {
        let mut params = RobustSolverParams::default();
        params.set_pcm_simple_2d_params(f64::NAN, 0.1, Verbosity::Quiet);
        assert!(matches!(
            RobustSolver::new(params),
            Err(ConfigError::InvalidThreshold { .. })
        ));
    }

    #[test]
    fn test_update_without_strategy_optimizes_once() {
        let mut solver = no_rejection();
        let mut prior = FactorGraph::new();
        prior.push(Factor::prior(x(0), Pose2D::default(), Information::identity(3)));
        let mut initial = Values::new();
        initial.insert(x(0), Pose2D::new(0.2, 0.0, 0.0));

        solver.update(&prior, &initial);
        assert_eq!(solver.num_optimizations(), 1);

        let (odom, guess) = odometry_batch(0, 3);
        solver.update(&odom, &guess);
        assert_eq!(solver.num_optimizations(), 2);
        assert_eq!(solver.size(), 4);
        assert_eq!(solver.values().len(), 4);

        let last = solver.values().pose::<Pose2D>(x(3)).unwrap();
        assert_relative_eq!(last.x, 3.0, epsilon = 1e-4);
        assert!(solver.error() < 1e-4);
    }

    #[test]
    fn test_remove_last_factor_without_strategy() {
        let mut solver = no_rejection();
        let (odom, guess) = odometry_batch(0, 2);
        let mut values = guess;
        values.insert(x(0), Pose2D::default());
        solver.update(&odom, &values);

        assert_eq!(solver.remove_last_loop_closure(), Some(Edge::new(x(1), x(2))));
        assert_eq!(solver.size(), 1);
        assert_eq!(
            solver.remove_last_loop_closure_between('x', 'x'),
            Some(Edge::new(x(0), x(1)))
        );
        assert_eq!(solver.remove_last_loop_closure(), None);
        // One optimization per update and per removal
        assert_eq!(solver.num_optimizations(), 4);
    }

    #[test]
    fn test_prefix_ops_without_strategy_still_optimize() {
        let mut solver = no_rejection();
        solver.ignore_prefix('a');
        solver.revive_prefix('a');
        assert!(solver.ignored_prefixes().is_empty());
        assert_eq!(solver.num_optimizations(), 2);
    }

    #[test]
    fn test_mismatched_information_without_strategy() {
        let mut solver = no_rejection();
        let mut prior = FactorGraph::new();
        prior.push(Factor::prior(x(0), Pose2D::default(), Information::identity(6)));
        let mut initial = Values::new();
        initial.insert(x(0), Pose2D::new(0.2, 0.0, 0.0));

        // Merged unconditionally; the solve skips the factor
        solver.update(&prior, &initial);
        assert_eq!(solver.size(), 1);
        assert_eq!(solver.num_optimizations(), 1);
        assert_eq!(solver.error(), 0.0);
        assert_eq!(solver.values().pose::<Pose2D>(x(0)), Some(Pose2D::new(0.2, 0.0, 0.0)));
    }

    #[test]
    fn test_accessors() {
        let mut params = RobustSolverParams::default();
        params.set_pcm_simple_2d_params(0.1, 0.01, Verbosity::Quiet);
        params.set_solver(SolverMode::GaussNewton);
        let solver = RobustSolver::new(params).unwrap();

        assert_eq!(solver.outlier_removal_method(), OutlierRemovalMethod::PcmSimple2D);
        assert_eq!(solver.solver_mode(), SolverMode::GaussNewton);
        assert_eq!(solver.num_optimizations(), 0);
        assert!(solver.last_optimization().is_none());
        assert!(!solver.is_logging());
        assert_eq!(solver.rejection_stats(), RejectionStats::default());
        assert_eq!(
            no_rejection().outlier_removal_method(),
            OutlierRemovalMethod::None
        );
    }
}
