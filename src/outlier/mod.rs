//! Outlier rejection strategies.
//!
//! A strategy owns the full measurement history and decides which loop
//! closures and landmark measurements enter the accepted graph. The
//! controller hands it `&mut` access to the accepted graph and estimate for
//! the duration of one call.
//!
//! | Method | Pose | Consistency test |
//! |--------|------|------------------|
//! | `pcm2d` | [`Pose2D`] | [`Mahalanobis`] |
//! | `pcm3d` | [`Pose3D`] | [`Mahalanobis`] |
//! | `pcm_simple2d` | [`Pose2D`] | [`DistanceThreshold`] |
//! | `pcm_simple3d` | [`Pose3D`] | [`DistanceThreshold`] |

mod clique;
mod consistency;
mod pcm;
mod stats;
mod trajectory;

use std::path::Path;

pub use clique::ConsistencyGraph;
pub use consistency::{CheckResult, ConsistencyCheck, CycleKind, DistanceThreshold, Mahalanobis};
pub use pcm::{PCM_DATA_FILE, Pcm};
pub use stats::RejectionStats;
pub use trajectory::{OdometryTrajectory, PoseWithCovariance};

use crate::config::{OutlierRemovalMethod, RobustSolverParams};
use crate::core::{Edge, ObservationId, Pose2D, Pose3D, Values};
use crate::error::Result;
use crate::graph::FactorGraph;

/// Capabilities every outlier rejection strategy provides.
pub trait OutlierRemoval: Send {
    /// Filter a batch into the accepted graph.
    ///
    /// New values are merged into `values` (existing estimates are kept) and
    /// `graph` is replaced by the accepted set. Returns true if the caller
    /// should re-optimize.
    fn remove_outliers(
        &mut self,
        new_factors: &FactorGraph,
        new_values: &Values,
        graph: &mut FactorGraph,
        values: &mut Values,
    ) -> bool;

    /// Remove the most recently accepted loop closure of any robot pair.
    fn remove_last_loop_closure(&mut self, graph: &mut FactorGraph) -> Option<Edge>;

    /// Remove the most recently accepted loop closure of one robot pair.
    fn remove_last_loop_closure_between(
        &mut self,
        id: ObservationId,
        graph: &mut FactorGraph,
    ) -> Option<Edge>;

    /// Suppress loop closures touching robot `prefix`.
    fn ignore_loop_closure_with_prefix(&mut self, prefix: char, graph: &mut FactorGraph);

    /// Restore loop closures touching robot `prefix`.
    fn revive_loop_closure_with_prefix(&mut self, prefix: char, graph: &mut FactorGraph);

    /// Prefixes currently suppressed, sorted.
    fn ignored_prefixes(&self) -> Vec<char>;

    /// Counters after the last call.
    fn rejection_stats(&self) -> RejectionStats;

    /// Write strategy diagnostics into `folder`.
    fn save_data(&self, folder: &Path) -> Result<()>;

    /// Silence informational log records.
    fn set_quiet(&mut self);
}

/// Strategy selected at construction.
#[derive(Clone, Debug)]
pub enum OutlierRejector {
    /// PCM over planar poses with Mahalanobis tests
    Pcm2D(Pcm<Pose2D, Mahalanobis>),
    /// PCM over spatial poses with Mahalanobis tests
    Pcm3D(Pcm<Pose3D, Mahalanobis>),
    /// PCM over planar poses with distance thresholds
    PcmSimple2D(Pcm<Pose2D, DistanceThreshold>),
    /// PCM over spatial poses with distance thresholds
    PcmSimple3D(Pcm<Pose3D, DistanceThreshold>),
}

impl OutlierRejector {
    /// Build the strategy named by `params.outlier_removal_method`, or
    /// `None` when rejection is disabled.
    pub fn from_params(params: &RobustSolverParams) -> Option<Self> {
        let symbols = params.special_symbols.clone();
        let mahalanobis = Mahalanobis::new(params.pcm.odom_threshold, params.pcm.lc_threshold);
        let distance = DistanceThreshold::new(
            params.pcm_distance.trans_threshold,
            params.pcm_distance.rot_threshold,
        );
        match params.outlier_removal_method {
            OutlierRemovalMethod::None => None,
            OutlierRemovalMethod::Pcm2D => Some(Self::Pcm2D(Pcm::new(mahalanobis, symbols))),
            OutlierRemovalMethod::Pcm3D => Some(Self::Pcm3D(Pcm::new(mahalanobis, symbols))),
            OutlierRemovalMethod::PcmSimple2D => {
                Some(Self::PcmSimple2D(Pcm::new(distance, symbols)))
            }
            OutlierRemovalMethod::PcmSimple3D => {
                Some(Self::PcmSimple3D(Pcm::new(distance, symbols)))
            }
        }
    }

    /// Method this strategy implements.
    pub fn method(&self) -> OutlierRemovalMethod {
        match self {
            Self::Pcm2D(_) => OutlierRemovalMethod::Pcm2D,
            Self::Pcm3D(_) => OutlierRemovalMethod::Pcm3D,
            Self::PcmSimple2D(_) => OutlierRemovalMethod::PcmSimple2D,
            Self::PcmSimple3D(_) => OutlierRemovalMethod::PcmSimple3D,
        }
    }

    fn inner(&self) -> &dyn OutlierRemoval {
        match self {
            Self::Pcm2D(pcm) => pcm,
            Self::Pcm3D(pcm) => pcm,
            Self::PcmSimple2D(pcm) => pcm,
            Self::PcmSimple3D(pcm) => pcm,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn OutlierRemoval {
        match self {
            Self::Pcm2D(pcm) => pcm,
            Self::Pcm3D(pcm) => pcm,
            Self::PcmSimple2D(pcm) => pcm,
            Self::PcmSimple3D(pcm) => pcm,
        }
    }
}

impl OutlierRemoval for OutlierRejector {
    fn remove_outliers(
        &mut self,
        new_factors: &FactorGraph,
        new_values: &Values,
        graph: &mut FactorGraph,
        values: &mut Values,
    ) -> bool {
        self.inner_mut()
            .remove_outliers(new_factors, new_values, graph, values)
    }

    fn remove_last_loop_closure(&mut self, graph: &mut FactorGraph) -> Option<Edge> {
        self.inner_mut().remove_last_loop_closure(graph)
    }

    fn remove_last_loop_closure_between(
        &mut self,
        id: ObservationId,
        graph: &mut FactorGraph,
    ) -> Option<Edge> {
        self.inner_mut().remove_last_loop_closure_between(id, graph)
    }

    fn ignore_loop_closure_with_prefix(&mut self, prefix: char, graph: &mut FactorGraph) {
        self.inner_mut().ignore_loop_closure_with_prefix(prefix, graph)
    }

    fn revive_loop_closure_with_prefix(&mut self, prefix: char, graph: &mut FactorGraph) {
        self.inner_mut().revive_loop_closure_with_prefix(prefix, graph)
    }

    fn ignored_prefixes(&self) -> Vec<char> {
        self.inner().ignored_prefixes()
    }

    fn rejection_stats(&self) -> RejectionStats {
        self.inner().rejection_stats()
    }

    fn save_data(&self, folder: &Path) -> Result<()> {
        self.inner().save_data(folder)
    }

    fn set_quiet(&mut self) {
        self.inner_mut().set_quiet()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Verbosity;

    #[test]
    fn test_from_params_dispatch() {
        let mut params = RobustSolverParams::default();
        params.set_no_rejection(Verbosity::Update);
        assert!(OutlierRejector::from_params(&params).is_none());

        params.set_pcm_2d_params(2.0, 4.0, Verbosity::Update);
        let rejector = OutlierRejector::from_params(&params).unwrap();
        assert_eq!(rejector.method(), OutlierRemovalMethod::Pcm2D);
        let OutlierRejector::Pcm2D(pcm) = &rejector else {
            panic!("expected planar PCM");
        };
        assert_eq!(pcm.check(), &Mahalanobis::new(2.0, 4.0));

        params.set_pcm_simple_3d_params(0.1, 0.01, Verbosity::Update);
        let rejector = OutlierRejector::from_params(&params).unwrap();
        assert_eq!(rejector.method(), OutlierRemovalMethod::PcmSimple3D);
        let OutlierRejector::PcmSimple3D(pcm) = &rejector else {
            panic!("expected spatial distance PCM");
        };
        assert_eq!(pcm.check(), &DistanceThreshold::new(0.1, 0.01));
    }

    #[test]
    fn test_rejector_starts_empty() {
        let rejector = OutlierRejector::from_params(&RobustSolverParams::default()).unwrap();
        assert_eq!(rejector.method(), OutlierRemovalMethod::Pcm3D);
        assert!(rejector.ignored_prefixes().is_empty());
        assert_eq!(rejector.rejection_stats(), RejectionStats::default());
    }
}
