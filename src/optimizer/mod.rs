//! Nonlinear least-squares optimization of a factor graph.
//!
//! Minimizes:
//!
//! ```text
//! F(x) = Σ ½ e_k(x)ᵀ Ω_k e_k(x)
//! ```
//!
//! by repeatedly linearizing around the current estimate and solving the
//! normal equations
//!
//! ```text
//! (H + λ·D) δ = -b,     H = Σ Jᵀ Ω J,   b = Σ Jᵀ Ω e
//! ```
//!
//! with `D = diag(H)` (Levenberg-Marquardt, diagonal damping) or `λ = 0`
//! (Gauss-Newton). Updates are applied on the manifold: `x ← x ⊞ δ`.

mod graph_optimizer;

pub use graph_optimizer::{
    GraphOptimizer, GraphOptimizerConfig, OptimizationResult, TerminationReason,
};
