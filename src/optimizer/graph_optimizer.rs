//! Levenberg-Marquardt and Gauss-Newton over a [`FactorGraph`].

use std::collections::HashMap;

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::config::SolverMode;
use crate::core::{Key, Values};
use crate::graph::{Factor, FactorGraph};

/// Step size for central-difference Jacobians.
const NUMERICAL_DIFF_EPS: f64 = 1e-6;

/// Result of graph optimization.
#[derive(Debug, Clone)]
pub struct OptimizationResult {
    /// Number of iterations performed.
    pub iterations: u32,

    /// Graph error at the initial estimate.
    pub initial_error: f64,

    /// Graph error at the returned estimate.
    pub final_error: f64,

    /// Whether the optimization converged.
    pub converged: bool,

    /// Reason for termination.
    pub termination_reason: TerminationReason,
}

/// Reason for optimization termination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationReason {
    /// Converged (error change below tolerance).
    Converged,

    /// Maximum iterations reached.
    MaxIterations,

    /// Error could not be decreased.
    Diverged,

    /// Linear system solve failed.
    SolveFailed,

    /// No factors to optimize.
    NoFactors,
}

/// Configuration for graph optimization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphOptimizerConfig {
    /// Maximum number of iterations.
    pub max_iterations: u32,

    /// Stop when the relative error decrease falls below this.
    pub relative_tolerance: f64,

    /// Stop when the error falls below this.
    pub absolute_tolerance: f64,

    /// Initial Levenberg-Marquardt damping.
    pub initial_lambda: f64,

    /// Damping multiplier on rejected steps (divisor on accepted ones).
    pub lambda_factor: f64,

    /// Give up once damping exceeds this.
    pub max_lambda: f64,

    /// Lower clamp of the Hessian diagonal used for damping.
    pub min_diagonal: f64,

    /// Upper clamp of the Hessian diagonal used for damping.
    pub max_diagonal: f64,
}

impl Default for GraphOptimizerConfig {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            relative_tolerance: 1e-5,
            absolute_tolerance: 1e-10,
            initial_lambda: 1e-5,
            lambda_factor: 10.0,
            max_lambda: 1e5,
            min_diagonal: 1e-6,
            max_diagonal: 1e32,
        }
    }
}

/// Variable ordering: offset of each key in the stacked tangent vector.
struct Ordering {
    offsets: HashMap<Key, (usize, usize)>,
    dim: usize,
}

impl Ordering {
    fn new(graph: &FactorGraph, values: &Values) -> Self {
        let mut offsets = HashMap::new();
        let mut dim = 0;
        for key in graph.keys() {
            if let Some(value) = values.get(key) {
                offsets.insert(key, (dim, value.dim()));
                dim += value.dim();
            }
        }
        Self { offsets, dim }
    }
}

/// Graph optimizer using Gauss-Newton or Levenberg-Marquardt.
///
/// Only variables referenced by factors are optimized; all other estimates
/// are returned untouched.
#[derive(Debug, Clone)]
pub struct GraphOptimizer {
    config: GraphOptimizerConfig,
    mode: SolverMode,
    verbose: bool,
}

impl GraphOptimizer {
    /// Create a new graph optimizer.
    pub fn new(mode: SolverMode, config: GraphOptimizerConfig) -> Self {
        Self {
            config,
            mode,
            verbose: false,
        }
    }

    /// Emit per-iteration debug records.
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Solver mode.
    pub fn mode(&self) -> SolverMode {
        self.mode
    }

    /// Optimize `values` against `graph`.
    ///
    /// Returns the refined estimate and a summary. The input is not
    /// modified; on failure the best estimate reached so far is returned.
    pub fn optimize(&self, graph: &FactorGraph, values: &Values) -> (Values, OptimizationResult) {
        if graph.is_empty() {
            return (
                values.clone(),
                OptimizationResult {
                    iterations: 0,
                    initial_error: 0.0,
                    final_error: 0.0,
                    converged: true,
                    termination_reason: TerminationReason::NoFactors,
                },
            );
        }

        // Nothing to improve
        let initial_error = graph.error(values);
        if initial_error <= self.config.absolute_tolerance {
            return (
                values.clone(),
                OptimizationResult {
                    iterations: 0,
                    initial_error,
                    final_error: initial_error,
                    converged: true,
                    termination_reason: TerminationReason::Converged,
                },
            );
        }

        let ordering = Ordering::new(graph, values);
        match self.mode {
            SolverMode::LevenbergMarquardt => self.levenberg_marquardt(graph, values, &ordering),
            SolverMode::GaussNewton => self.gauss_newton(graph, values, &ordering),
        }
    }

    fn levenberg_marquardt(
        &self,
        graph: &FactorGraph,
        values: &Values,
        ordering: &Ordering,
    ) -> (Values, OptimizationResult) {
        let mut current = values.clone();
        let initial_error = graph.error(&current);
        let mut error = initial_error;
        let mut lambda = self.config.initial_lambda;
        let mut iterations = 0;

        for iter in 0..self.config.max_iterations {
            iterations = iter + 1;
            let (h, b) = linearize(graph, &current, ordering);

            // Inner loop: raise damping until the step decreases the error
            let new_error = loop {
                let mut h_damped = h.clone();
                for i in 0..ordering.dim {
                    let d = h[(i, i)].clamp(self.config.min_diagonal, self.config.max_diagonal);
                    h_damped[(i, i)] += lambda * d;
                }

                if let Some(dx) = solve(h_damped, &b) {
                    let candidate = apply_update(&current, &dx, ordering);
                    let candidate_error = graph.error(&candidate);
                    if candidate_error <= error {
                        current = candidate;
                        lambda = (lambda / self.config.lambda_factor).max(1e-12);
                        break Some(candidate_error);
                    }
                }

                lambda *= self.config.lambda_factor;
                if lambda > self.config.max_lambda {
                    break None;
                }
            };

            let Some(new_error) = new_error else {
                log::warn!(
                    "Levenberg-Marquardt giving up: error {:.6} not reduced at maximum lambda",
                    error
                );
                return (
                    current,
                    OptimizationResult {
                        iterations,
                        initial_error,
                        final_error: error,
                        converged: false,
                        termination_reason: TerminationReason::Diverged,
                    },
                );
            };

            if self.verbose {
                log::debug!(
                    "LM iteration {}: error {:.6} -> {:.6}, lambda {:.2e}",
                    iterations,
                    error,
                    new_error,
                    lambda
                );
            }

            let converged = self.has_converged(error, new_error);
            error = new_error;
            if converged {
                return (
                    current,
                    OptimizationResult {
                        iterations,
                        initial_error,
                        final_error: error,
                        converged: true,
                        termination_reason: TerminationReason::Converged,
                    },
                );
            }
        }

        (
            current,
            OptimizationResult {
                iterations,
                initial_error,
                final_error: error,
                converged: false,
                termination_reason: TerminationReason::MaxIterations,
            },
        )
    }

    fn gauss_newton(
        &self,
        graph: &FactorGraph,
        values: &Values,
        ordering: &Ordering,
    ) -> (Values, OptimizationResult) {
        let mut current = values.clone();
        let initial_error = graph.error(&current);
        let mut error = initial_error;
        let mut iterations = 0;

        for iter in 0..self.config.max_iterations {
            iterations = iter + 1;
            let (h, b) = linearize(graph, &current, ordering);

            let Some(dx) = solve(h, &b) else {
                log::warn!("Gauss-Newton linear system is indeterminant");
                return (
                    current,
                    OptimizationResult {
                        iterations,
                        initial_error,
                        final_error: error,
                        converged: false,
                        termination_reason: TerminationReason::SolveFailed,
                    },
                );
            };

            let candidate = apply_update(&current, &dx, ordering);
            let new_error = graph.error(&candidate);

            if self.verbose {
                log::debug!(
                    "GN iteration {}: error {:.6} -> {:.6}",
                    iterations,
                    error,
                    new_error
                );
            }

            // Error increased: keep the previous estimate
            if new_error > error {
                return (
                    current,
                    OptimizationResult {
                        iterations,
                        initial_error,
                        final_error: error,
                        converged: false,
                        termination_reason: TerminationReason::Diverged,
                    },
                );
            }

            current = candidate;
            let converged = self.has_converged(error, new_error);
            error = new_error;
            if converged {
                return (
                    current,
                    OptimizationResult {
                        iterations,
                        initial_error,
                        final_error: error,
                        converged: true,
                        termination_reason: TerminationReason::Converged,
                    },
                );
            }
        }

        (
            current,
            OptimizationResult {
                iterations,
                initial_error,
                final_error: error,
                converged: false,
                termination_reason: TerminationReason::MaxIterations,
            },
        )
    }

    fn has_converged(&self, previous_error: f64, new_error: f64) -> bool {
        if new_error <= self.config.absolute_tolerance {
            return true;
        }
        let relative_decrease = (previous_error - new_error) / previous_error.max(1e-12);
        relative_decrease < self.config.relative_tolerance
    }
}

/// Build the normal equations `H δ = -b` at `values`.
fn linearize(
    graph: &FactorGraph,
    values: &Values,
    ordering: &Ordering,
) -> (DMatrix<f64>, DVector<f64>) {
    let mut h = DMatrix::zeros(ordering.dim, ordering.dim);
    let mut b = DVector::zeros(ordering.dim);

    for factor in graph {
        let Some(error) = factor.residual(values) else {
            continue;
        };
        let omega = factor.information().matrix();
        if omega.nrows() != error.len() || !omega.is_square() {
            continue;
        }

        let blocks: Vec<(usize, DMatrix<f64>)> = factor
            .keys()
            .into_iter()
            .filter_map(|key| {
                let (offset, _) = *ordering.offsets.get(&key)?;
                numerical_jacobian(factor, values, key).map(|j| (offset, j))
            })
            .collect();

        let omega_e = omega * &error;
        for (offset_i, j_i) in &blocks {
            let jt_omega = j_i.transpose() * omega;
            let b_i = j_i.transpose() * &omega_e;
            let mut b_view = b.rows_mut(*offset_i, b_i.len());
            b_view += &b_i;

            for (offset_j, j_j) in &blocks {
                let h_ij = &jt_omega * j_j;
                let mut h_view =
                    h.view_mut((*offset_i, *offset_j), (h_ij.nrows(), h_ij.ncols()));
                h_view += &h_ij;
            }
        }
    }

    (h, b)
}

/// Central-difference Jacobian of a factor residual with respect to `key`.
fn numerical_jacobian(factor: &Factor, values: &Values, key: Key) -> Option<DMatrix<f64>> {
    let value = values.get(key)?;
    let dim = value.dim();
    let rows = factor.dim();
    let mut jacobian = DMatrix::zeros(rows, dim);

    let mut local: Values = factor
        .keys()
        .into_iter()
        .filter_map(|k| values.get(k).map(|v| (k, *v)))
        .collect();

    let mut delta = vec![0.0; dim];
    for axis in 0..dim {
        delta[axis] = NUMERICAL_DIFF_EPS;
        local.insert(key, value.retract(&delta));
        let plus = factor.residual(&local)?;

        delta[axis] = -NUMERICAL_DIFF_EPS;
        local.insert(key, value.retract(&delta));
        let minus = factor.residual(&local)?;

        delta[axis] = 0.0;
        let column = (plus - minus) / (2.0 * NUMERICAL_DIFF_EPS);
        jacobian.set_column(axis, &column);
    }

    Some(jacobian)
}

/// Solve `H δ = -b` by Cholesky decomposition.
fn solve(h: DMatrix<f64>, b: &DVector<f64>) -> Option<DVector<f64>> {
    if h.nrows() == 0 {
        return Some(DVector::zeros(0));
    }
    let cholesky = h.cholesky()?;
    let dx = -cholesky.solve(b);
    if dx.iter().all(|v| v.is_finite()) {
        Some(dx)
    } else {
        None
    }
}

/// Retract every ordered variable by its slice of `dx`.
fn apply_update(values: &Values, dx: &DVector<f64>, ordering: &Ordering) -> Values {
    let mut updated = values.clone();
    for (key, (offset, dim)) in &ordering.offsets {
        if let Some(value) = values.get(*key) {
            updated.insert(*key, value.retract(&dx.as_slice()[*offset..*offset + *dim]));
        }
    }
    updated
}
