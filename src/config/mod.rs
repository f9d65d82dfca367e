//! Solver configuration.
//!
//! Parameters can be built in code with the `set_*` helpers or loaded from
//! YAML:
//!
//! ```rust,ignore
//! let params = RobustSolverParams::load(Path::new("config/pgo.yaml"))?;
//! let solver = RobustSolver::new(params)?;
//! ```

mod modes;
mod params;

pub use modes::{OutlierRemovalMethod, SolverMode, Verbosity};
pub use params::{DistanceThresholds, PcmThresholds, RobustSolverParams};
