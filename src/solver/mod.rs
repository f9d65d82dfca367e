//! Update controller.
//!
//! ```text
//!   batch ──▶ OutlierRejector ──▶ accepted graph ──▶ GraphOptimizer
//!   (or unconditional merge)          │                   │
//!                                     └──── estimate ◀────┘
//! ```

mod diagnostics;
mod robust_solver;

pub use diagnostics::{DiagnosticsLog, ERROR_FILE, LOG_FILE};
pub use robust_solver::{RESULT_FILE, RobustSolver};
