//! Factor graph data structures.
//!
//! ```text
//!   prior
//!     │
//!   [a0] ──odom──▶ [a1] ──odom──▶ [a2] ──odom──▶ [a3]
//!     │                            ▲
//!     └────────── loop closure ────┘
//!                                  │
//!   [b0] ──odom──▶ [b1] ───────────┘  (inter-robot loop closure)
//! ```
//!
//! - [`Factor`]: prior or between measurement with an information matrix
//! - [`FactorGraph`]: factors in arrival order

mod factor;
mod factor_graph;

pub use factor::{BetweenFactor, Factor, FactorKind, Information, PriorFactor};
pub use factor_graph::FactorGraph;
