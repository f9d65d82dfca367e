//! Pairwise Consistency Maximization.
//!
//! Loop closures are grouped by robot pair and landmark measurements by
//! landmark. Within each group, every pair of measurements is tested for
//! cycle consistency and the maximum clique of the resulting consistency
//! graph is accepted.
//!
//! ```text
//!   a1 ───odom_A───▶ a2
//!    │                │
//!   z1               z2        cycle = z1⁻¹ · odom_A · z2 · odom_B
//!    ▼                ▼
//!   b1 ◀──odom_B─── b2
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use nalgebra::DMatrix;

use crate::core::{Edge, Key, LiePose, ObservationId, Values};
use crate::error::Result;
use crate::graph::{BetweenFactor, Factor, FactorGraph, FactorKind};

use super::clique::ConsistencyGraph;
use super::consistency::{CheckResult, ConsistencyCheck, CycleKind};
use super::stats::RejectionStats;
use super::trajectory::{OdometryTrajectory, PoseWithCovariance};
use super::OutlierRemoval;

/// Name of the file written by [`Pcm::save_data`].
pub const PCM_DATA_FILE: &str = "pcm_loop_closures.csv";

/// A stored loop closure or landmark measurement.
#[derive(Clone, Debug)]
struct Measurement<P> {
    /// Arrival sequence number
    seq: u64,
    /// Factor as received, re-added to the accepted graph when accepted
    factor: Factor,
    /// Endpoints oriented for cycle composition
    edge: Edge,
    /// Measurement oriented like `edge`
    pose: P,
    covariance: DMatrix<f64>,
    odom_consistent: bool,
}

/// Measurements that are tested against each other.
#[derive(Clone, Debug)]
struct MeasurementGroup<P> {
    measurements: Vec<Measurement<P>>,
    consistency: ConsistencyGraph,
    inliers: Vec<usize>,
}

impl<P> Default for MeasurementGroup<P> {
    fn default() -> Self {
        Self {
            measurements: Vec::new(),
            consistency: ConsistencyGraph::new(),
            inliers: Vec::new(),
        }
    }
}

impl<P: LiePose> MeasurementGroup<P> {
    fn push(&mut self, measurement: Measurement<P>) -> usize {
        self.measurements.push(measurement);
        self.consistency.add_vertex()
    }

    fn remove(&mut self, index: usize) -> Measurement<P> {
        self.consistency.remove_vertex(index);
        // Later vertices shift down by one
        self.inliers = self
            .inliers
            .iter()
            .filter(|&&i| i != index)
            .map(|&i| if i > index { i - 1 } else { i })
            .collect();
        self.measurements.remove(index)
    }

    /// Recompute the maximum clique; true if the accepted set changed.
    fn update_inliers(&mut self) -> bool {
        let candidates: Vec<usize> = self
            .measurements
            .iter()
            .enumerate()
            .filter_map(|(i, m)| m.odom_consistent.then_some(i))
            .collect();
        let inliers = self.consistency.max_clique(&candidates);
        let before: Vec<u64> = self.inliers.iter().map(|&i| self.measurements[i].seq).collect();
        let after: Vec<u64> = inliers.iter().map(|&i| self.measurements[i].seq).collect();
        self.inliers = inliers;
        before != after
    }

    fn is_inlier(&self, index: usize) -> bool {
        self.inliers.contains(&index)
    }

    fn accepted(&self) -> impl Iterator<Item = &Measurement<P>> {
        self.inliers.iter().map(|&i| &self.measurements[i])
    }
}

/// PCM outlier rejection over poses of type `P`, with consistency test `C`.
#[derive(Clone, Debug)]
pub struct Pcm<P: LiePose, C: ConsistencyCheck<P>> {
    check: C,
    special_symbols: Vec<char>,

    trajectories: BTreeMap<char, OdometryTrajectory<P>>,
    odometry_factors: FactorGraph,
    special_factors: FactorGraph,

    loop_closures: BTreeMap<ObservationId, MeasurementGroup<P>>,
    landmarks: BTreeMap<Key, MeasurementGroup<P>>,

    /// Loop closures in arrival order
    history: Vec<(ObservationId, u64)>,
    next_seq: u64,

    ignored: BTreeSet<char>,
    stats: RejectionStats,
    quiet: bool,
}

impl<P: LiePose, C: ConsistencyCheck<P>> Pcm<P, C> {
    /// Create with a consistency test and the landmark prefixes.
    pub fn new(check: C, special_symbols: Vec<char>) -> Self {
        Self {
            check,
            special_symbols,
            trajectories: BTreeMap::new(),
            odometry_factors: FactorGraph::new(),
            special_factors: FactorGraph::new(),
            loop_closures: BTreeMap::new(),
            landmarks: BTreeMap::new(),
            history: Vec::new(),
            next_seq: 0,
            ignored: BTreeSet::new(),
            stats: RejectionStats::default(),
            quiet: false,
        }
    }

    /// Consistency test in use.
    pub fn check(&self) -> &C {
        &self.check
    }

    fn is_ignored(&self, id: &ObservationId) -> bool {
        self.ignored.iter().any(|&p| id.contains(p))
    }

    /// Odometry between two nodes of one robot; identity when they coincide.
    fn odometry(&self, prefix: char, from: u64, to: u64) -> Option<PoseWithCovariance<P>> {
        if from == to {
            return Some(PoseWithCovariance::identity());
        }
        self.trajectories.get(&prefix)?.between(from, to)
    }

    /// Measurement and covariance of a between factor, if it matches `P`.
    fn decode(&self, factor: &BetweenFactor) -> Option<(P, DMatrix<f64>)> {
        let Some(pose) = P::from_value(&factor.measurement) else {
            log::warn!(
                "Measurement {} -> {} has the wrong pose type, skipping",
                factor.from,
                factor.to
            );
            return None;
        };
        let covariance = if factor.information.dim() == P::DIM {
            factor.information.covariance()
        } else {
            None
        };
        let Some(covariance) = covariance else {
            log::warn!(
                "Measurement {} -> {} has an invalid information matrix, skipping",
                factor.from,
                factor.to
            );
            return None;
        };
        Some((pose, covariance))
    }

    /// True if a prior or special factor matches `P` in type and dimension.
    fn is_well_formed(&self, factor: &Factor) -> bool {
        let value = match factor {
            Factor::Prior(f) => &f.prior,
            Factor::Between(f) => &f.measurement,
        };
        let well_formed = P::from_value(value).is_some() && factor.information().dim() == P::DIM;
        if !well_formed {
            let edge = factor.edge();
            log::warn!(
                "Factor {} -> {} does not match the pose type, skipping",
                edge.from,
                edge.to
            );
        }
        well_formed
    }

    fn add_odometry(&mut self, factor: &Factor) {
        let Factor::Between(f) = factor else {
            return;
        };
        let Some((step, covariance)) = self.decode(f) else {
            return;
        };
        self.odometry_factors.push(factor.clone());
        let trajectory = self
            .trajectories
            .entry(f.from.chr())
            .or_insert_with(|| OdometryTrajectory::new(f.from.index()));
        if !trajectory.extend(f.from.index(), &step, &covariance) {
            log::warn!(
                "Odometry {} -> {} does not extend trajectory '{}' (ends at {})",
                f.from,
                f.to,
                f.from.chr(),
                trajectory.last()
            );
        }
    }

    fn next_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }

    /// Store a loop closure and test it; returns its group.
    fn add_loop_closure(&mut self, factor: &Factor) -> Option<ObservationId> {
        let Factor::Between(f) = factor else {
            return None;
        };
        let (mut pose, covariance) = self.decode(f)?;
        let id = ObservationId::new(f.from.chr(), f.to.chr());

        // Orient from the lower robot prefix to the higher one
        let mut edge = Edge::new(f.from, f.to);
        if f.from.chr() != id.first() {
            edge = Edge::new(f.to, f.from);
            pose = pose.inverse();
        }

        let odom_consistent = if id.is_multirobot() {
            true
        } else {
            match self.odometry(id.first(), edge.from.index(), edge.to.index()) {
                Some(odom) => {
                    let cycle = pose.inverse().compose(&odom.pose);
                    let cov = &covariance + &odom.covariance;
                    let result = self.check.check(CycleKind::Odometry, &cycle, &cov);
                    self.stats.consistency_error.push(result.error);
                    result.consistent
                }
                None => {
                    log::warn!(
                        "Loop closure {} -> {} is not covered by odometry, rejecting",
                        f.from,
                        f.to
                    );
                    false
                }
            }
        };

        let seq = self.next_seq();
        let measurement = Measurement {
            seq,
            factor: factor.clone(),
            edge,
            pose,
            covariance,
            odom_consistent,
        };

        let mut consistent_with = Vec::new();
        if odom_consistent {
            if let Some(group) = self.loop_closures.get(&id) {
                for (j, other) in group.measurements.iter().enumerate() {
                    if !other.odom_consistent {
                        continue;
                    }
                    if let Some(result) = self.pairwise(id, other, &measurement) {
                        self.stats.consistency_error.push(result.error);
                        if result.consistent {
                            consistent_with.push(j);
                        }
                    }
                }
            }
        }

        let group = self.loop_closures.entry(id).or_default();
        let index = group.push(measurement);
        for j in consistent_with {
            group.consistency.add_edge(index, j);
        }
        self.history.push((id, seq));
        Some(id)
    }

    /// Pairwise cycle between two loop closures of group `id`.
    fn pairwise(
        &self,
        id: ObservationId,
        m1: &Measurement<P>,
        m2: &Measurement<P>,
    ) -> Option<CheckResult> {
        let odom_a = self.odometry(id.first(), m1.edge.from.index(), m2.edge.from.index())?;
        let odom_b = self.odometry(id.second(), m2.edge.to.index(), m1.edge.to.index())?;

        let cycle = m1
            .pose
            .inverse()
            .compose(&odom_a.pose)
            .compose(&m2.pose)
            .compose(&odom_b.pose);
        let covariance = &m1.covariance + &m2.covariance + &odom_a.covariance + &odom_b.covariance;
        Some(self.check.check(CycleKind::Pairwise, &cycle, &covariance))
    }

    /// Store a landmark measurement and test it; returns the landmark key.
    fn add_landmark(&mut self, factor: &Factor) -> Option<Key> {
        let Factor::Between(f) = factor else {
            return None;
        };
        let (mut pose, covariance) = self.decode(f)?;

        // Orient from the robot pose to the landmark
        let mut edge = Edge::new(f.from, f.to);
        if self.special_symbols.contains(&f.from.chr()) {
            edge = Edge::new(f.to, f.from);
            pose = pose.inverse();
        }
        let landmark = edge.to;

        let seq = self.next_seq();
        let measurement = Measurement {
            seq,
            factor: factor.clone(),
            edge,
            pose,
            covariance,
            odom_consistent: true,
        };

        let mut consistent_with = Vec::new();
        if let Some(group) = self.landmarks.get(&landmark) {
            for (j, other) in group.measurements.iter().enumerate() {
                let robot = other.edge.from.chr();
                if robot != measurement.edge.from.chr() {
                    // No shared odometry to close the cycle
                    consistent_with.push(j);
                    continue;
                }
                let Some(odom) =
                    self.odometry(robot, other.edge.from.index(), measurement.edge.from.index())
                else {
                    continue;
                };
                let cycle = other
                    .pose
                    .inverse()
                    .compose(&odom.pose)
                    .compose(&measurement.pose);
                let cov = &other.covariance + &measurement.covariance + &odom.covariance;
                let result = self.check.check(CycleKind::Pairwise, &cycle, &cov);
                self.stats.consistency_error.push(result.error);
                if result.consistent {
                    consistent_with.push(j);
                }
            }
        }

        let group = self.landmarks.entry(landmark).or_default();
        let index = group.push(measurement);
        for j in consistent_with {
            group.consistency.add_edge(index, j);
        }
        Some(landmark)
    }

    /// Odometry, special factors and every accepted measurement not
    /// suppressed by an ignored prefix.
    fn accepted_graph(&self) -> FactorGraph {
        let mut graph = FactorGraph::new();
        graph.extend(&self.odometry_factors);
        graph.extend(&self.special_factors);
        for (id, group) in &self.loop_closures {
            if self.is_ignored(id) {
                continue;
            }
            for m in group.accepted() {
                graph.push(m.factor.clone());
            }
        }
        for group in self.landmarks.values() {
            for m in group.accepted() {
                graph.push(m.factor.clone());
            }
        }
        graph
    }

    fn refresh_stats(&mut self) {
        let mut stats = RejectionStats {
            consistency_error: std::mem::take(&mut self.stats.consistency_error),
            ..RejectionStats::default()
        };
        for (id, group) in &self.loop_closures {
            let total = group.measurements.len();
            let good = if self.is_ignored(id) { 0 } else { group.inliers.len() };
            stats.lc += total;
            stats.good_lc += good;
            stats.odom_consistent_lc +=
                group.measurements.iter().filter(|m| m.odom_consistent).count();
            if id.is_multirobot() {
                stats.multirobot_lc += total;
                stats.good_multirobot_lc += good;
            }
        }
        for group in self.landmarks.values() {
            stats.landmark_measurements += group.measurements.len();
            stats.good_landmark_measurements += group.inliers.len();
        }
        self.stats = stats;
    }

    fn rebuild(&mut self, graph: &mut FactorGraph) {
        self.refresh_stats();
        *graph = self.accepted_graph();
    }

    /// Remove measurement `seq` of group `id`, returning its factor endpoints.
    fn remove_measurement(&mut self, id: ObservationId, seq: u64) -> Option<Edge> {
        let group = self.loop_closures.get_mut(&id)?;
        let index = group.measurements.iter().position(|m| m.seq == seq)?;
        let removed = group.remove(index);
        group.update_inliers();
        if group.measurements.is_empty() {
            self.loop_closures.remove(&id);
        }
        self.history.retain(|&(_, s)| s != seq);
        Some(removed.factor.edge())
    }

    fn is_accepted(&self, id: ObservationId, seq: u64) -> bool {
        self.loop_closures.get(&id).is_some_and(|group| {
            group
                .measurements
                .iter()
                .position(|m| m.seq == seq)
                .is_some_and(|i| group.is_inlier(i))
        })
    }

    fn write_data(&self, path: &Path) -> std::io::Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        writeln!(writer, "robot_a,robot_b,from,to,kind,accepted,ignored")?;
        for (id, group) in &self.loop_closures {
            let ignored = self.is_ignored(id);
            for (i, m) in group.measurements.iter().enumerate() {
                let edge = m.factor.edge();
                writeln!(
                    writer,
                    "{},{},{},{},loop_closure,{},{}",
                    id.first(),
                    id.second(),
                    edge.from,
                    edge.to,
                    group.is_inlier(i),
                    ignored
                )?;
            }
        }
        for (landmark, group) in &self.landmarks {
            for (i, m) in group.measurements.iter().enumerate() {
                let edge = m.factor.edge();
                writeln!(
                    writer,
                    "{},{},{},{},landmark,{},false",
                    m.edge.from.chr(),
                    landmark.chr(),
                    edge.from,
                    edge.to,
                    group.is_inlier(i)
                )?;
            }
        }
        writer.flush()
    }
}

impl<P: LiePose, C: ConsistencyCheck<P>> OutlierRemoval for Pcm<P, C> {
    fn remove_outliers(
        &mut self,
        new_factors: &FactorGraph,
        new_values: &Values,
        graph: &mut FactorGraph,
        values: &mut Values,
    ) -> bool {
        values.merge(new_values);
        self.stats.consistency_error.clear();

        let mut prior_added = false;
        let mut measurements = Vec::new();
        for factor in new_factors {
            match factor.kind(&self.special_symbols) {
                FactorKind::Prior | FactorKind::Special if !self.is_well_formed(factor) => {}
                FactorKind::Prior => {
                    prior_added = true;
                    self.special_factors.push(factor.clone());
                }
                FactorKind::Special => self.special_factors.push(factor.clone()),
                FactorKind::Odometry => self.add_odometry(factor),
                kind @ (FactorKind::LoopClosure | FactorKind::Landmark) => {
                    measurements.push((kind, factor));
                }
            }
        }

        let mut touched_pairs = BTreeSet::new();
        let mut touched_landmarks = BTreeSet::new();
        for (kind, factor) in measurements {
            if kind == FactorKind::LoopClosure {
                if let Some(id) = self.add_loop_closure(factor) {
                    touched_pairs.insert(id);
                }
            } else if let Some(landmark) = self.add_landmark(factor) {
                touched_landmarks.insert(landmark);
            }
        }

        let mut changed = false;
        for id in &touched_pairs {
            if let Some(group) = self.loop_closures.get_mut(id) {
                // Suppressed groups do not alter the accepted graph
                changed |= group.update_inliers() && !self.ignored.iter().any(|&p| id.contains(p));
            }
        }
        for landmark in &touched_landmarks {
            if let Some(group) = self.landmarks.get_mut(landmark) {
                changed |= group.update_inliers();
            }
        }

        self.rebuild(graph);
        if !self.quiet {
            log::info!("PCM: {}", self.stats);
        }
        prior_added || changed
    }

    fn remove_last_loop_closure(&mut self, graph: &mut FactorGraph) -> Option<Edge> {
        let latest = self
            .history
            .iter()
            .rev()
            .copied()
            .find(|&(id, seq)| !self.is_ignored(&id) && self.is_accepted(id, seq));
        let (id, seq) = latest?;
        let removed = self.remove_measurement(id, seq);
        self.rebuild(graph);
        if let (Some(edge), false) = (removed, self.quiet) {
            log::info!("PCM: removed loop closure {} -> {}", edge.from, edge.to);
        }
        removed
    }

    fn remove_last_loop_closure_between(
        &mut self,
        id: ObservationId,
        graph: &mut FactorGraph,
    ) -> Option<Edge> {
        if self.is_ignored(&id) {
            return None;
        }
        let group = self.loop_closures.get(&id)?;
        let seq = group
            .inliers
            .iter()
            .map(|&i| group.measurements[i].seq)
            .max()?;
        let removed = self.remove_measurement(id, seq);
        self.rebuild(graph);
        if let (Some(edge), false) = (removed, self.quiet) {
            log::info!("PCM: removed loop closure {} -> {} of {}", edge.from, edge.to, id);
        }
        removed
    }

    fn ignore_loop_closure_with_prefix(&mut self, prefix: char, graph: &mut FactorGraph) {
        if self.ignored.insert(prefix) && !self.quiet {
            log::info!("PCM: ignoring loop closures with prefix '{}'", prefix);
        }
        self.rebuild(graph);
    }

    fn revive_loop_closure_with_prefix(&mut self, prefix: char, graph: &mut FactorGraph) {
        if self.ignored.remove(&prefix) && !self.quiet {
            log::info!("PCM: reviving loop closures with prefix '{}'", prefix);
        }
        self.rebuild(graph);
    }

    fn ignored_prefixes(&self) -> Vec<char> {
        self.ignored.iter().copied().collect()
    }

    fn rejection_stats(&self) -> RejectionStats {
        self.stats.clone()
    }

    fn save_data(&self, folder: &Path) -> Result<()> {
        self.write_data(&folder.join(PCM_DATA_FILE))?;
        Ok(())
    }

    fn set_quiet(&mut self) {
        self.quiet = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Pose2D, Pose3D};
    use crate::graph::Information;
    use crate::outlier::consistency::{DistanceThreshold, Mahalanobis};

    fn a(i: u64) -> Key {
        Key::symbol('a', i)
    }

    fn b(i: u64) -> Key {
        Key::symbol('b', i)
    }

    fn info() -> Information {
        Information::from_sigmas(&[0.1, 0.1, 0.05])
    }

    /// Straight line along x: a0 .. a{n-1}, one meter apart.
    fn line(prefix: char, n: u64) -> (FactorGraph, Values) {
        let key = |i| Key::symbol(prefix, i);
        let mut graph = FactorGraph::new();
        let mut values = Values::new();
        graph.push(Factor::prior(key(0), Pose2D::default(), info()));
        values.insert(key(0), Pose2D::default());
        for i in 1..n {
            graph.push(Factor::between(key(i - 1), key(i), Pose2D::new(1.0, 0.0, 0.0), info()));
            values.insert(key(i), Pose2D::new(i as f64, 0.0, 0.0));
        }
        (graph, values)
    }

    fn pcm2d() -> Pcm<Pose2D, Mahalanobis> {
        Pcm::new(Mahalanobis::new(3.0, 3.0), vec!['l'])
    }

    fn add(
        pcm: &mut impl OutlierRemoval,
        factors: FactorGraph,
        new_values: Values,
        graph: &mut FactorGraph,
        values: &mut Values,
    ) -> bool {
        pcm.remove_outliers(&factors, &new_values, graph, values)
    }

    #[test]
    fn test_odometry_always_accepted() {
        let mut pcm = pcm2d();
        let (factors, new_values) = line('a', 5);
        let mut graph = FactorGraph::new();
        let mut values = Values::new();

        // Prior in the batch requests optimization
        assert!(add(&mut pcm, factors, new_values, &mut graph, &mut values));
        assert_eq!(graph.len(), 5);
        assert_eq!(values.len(), 5);
        assert_eq!(pcm.trajectories[&'a'].len(), 5);
    }

    #[test]
    fn test_odometry_only_does_not_request_optimization() {
        let mut pcm = pcm2d();
        let (factors, new_values) = line('a', 3);
        let mut graph = FactorGraph::new();
        let mut values = Values::new();
        add(&mut pcm, factors, new_values, &mut graph, &mut values);

        let mut more = FactorGraph::new();
        more.push(Factor::between(a(2), a(3), Pose2D::new(1.0, 0.0, 0.0), info()));
        let mut more_values = Values::new();
        more_values.insert(a(3), Pose2D::new(3.0, 0.0, 0.0));
        assert!(!add(&mut pcm, more, more_values, &mut graph, &mut values));
        assert_eq!(graph.len(), 4);
    }

    #[test]
    fn test_consistent_loop_closure_accepted() {
        let mut pcm = pcm2d();
        let (factors, new_values) = line('a', 6);
        let mut graph = FactorGraph::new();
        let mut values = Values::new();
        add(&mut pcm, factors, new_values, &mut graph, &mut values);

        let mut lc = FactorGraph::new();
        lc.push(Factor::between(a(0), a(5), Pose2D::new(5.0, 0.0, 0.0), info()));
        assert!(add(&mut pcm, lc, Values::new(), &mut graph, &mut values));
        assert_eq!(graph.len(), 7);

        let stats = pcm.rejection_stats();
        assert_eq!(stats.lc, 1);
        assert_eq!(stats.good_lc, 1);
        assert_eq!(stats.odom_consistent_lc, 1);
        assert_eq!(stats.consistency_error.len(), 1);
    }

    #[test]
    fn test_odometry_inconsistent_loop_closure_rejected() {
        let mut pcm = pcm2d();
        let (factors, new_values) = line('a', 6);
        let mut graph = FactorGraph::new();
        let mut values = Values::new();
        add(&mut pcm, factors, new_values, &mut graph, &mut values);

        let mut lc = FactorGraph::new();
        lc.push(Factor::between(a(0), a(5), Pose2D::new(1.0, 3.0, 1.0), info()));
        assert!(!add(&mut pcm, lc, Values::new(), &mut graph, &mut values));
        assert_eq!(graph.len(), 6);

        let stats = pcm.rejection_stats();
        assert_eq!(stats.lc, 1);
        assert_eq!(stats.good_lc, 0);
        assert_eq!(stats.odom_consistent_lc, 0);
    }

    #[test]
    fn test_inter_robot_outlier_rejected_by_clique() {
        let mut pcm: Pcm<Pose2D, DistanceThreshold> =
            Pcm::new(DistanceThreshold::new(0.3, 0.1), vec![]);
        let mut graph = FactorGraph::new();
        let mut values = Values::new();
        let (fa, va) = line('a', 5);
        let (fb, vb) = line('b', 5);
        add(&mut pcm, fa, va, &mut graph, &mut values);
        add(&mut pcm, fb, vb, &mut graph, &mut values);

        // Robot b starts 2 m to the left of robot a
        let mut lcs = FactorGraph::new();
        for i in [0, 2, 4] {
            lcs.push(Factor::between(a(i), b(i), Pose2D::new(0.0, 2.0, 0.0), info()));
        }
        // Inconsistent with the others
        lcs.push(Factor::between(b(3), a(1), Pose2D::new(4.0, 4.0, 0.0), info()));
        assert!(add(&mut pcm, lcs, Values::new(), &mut graph, &mut values));

        let stats = pcm.rejection_stats();
        assert_eq!(stats.lc, 4);
        assert_eq!(stats.multirobot_lc, 4);
        assert_eq!(stats.good_multirobot_lc, 3);
        assert_eq!(graph.len(), 10 + 3);
    }

    #[test]
    fn test_reversed_inter_robot_closure_is_consistent() {
        let mut pcm: Pcm<Pose2D, DistanceThreshold> =
            Pcm::new(DistanceThreshold::new(0.3, 0.1), vec![]);
        let mut graph = FactorGraph::new();
        let mut values = Values::new();
        let (fa, va) = line('a', 3);
        let (fb, vb) = line('b', 3);
        add(&mut pcm, fa, va, &mut graph, &mut values);
        add(&mut pcm, fb, vb, &mut graph, &mut values);

        let mut lcs = FactorGraph::new();
        lcs.push(Factor::between(a(0), b(0), Pose2D::new(0.0, 2.0, 0.0), info()));
        lcs.push(Factor::between(b(2), a(2), Pose2D::new(0.0, -2.0, 0.0), info()));
        add(&mut pcm, lcs, Values::new(), &mut graph, &mut values);
        assert_eq!(pcm.rejection_stats().good_lc, 2);
    }

    #[test]
    fn test_remove_last_loop_closure() {
        let mut pcm = pcm2d();
        let (factors, new_values) = line('a', 6);
        let mut graph = FactorGraph::new();
        let mut values = Values::new();
        add(&mut pcm, factors, new_values, &mut graph, &mut values);

        let mut lcs = FactorGraph::new();
        lcs.push(Factor::between(a(0), a(4), Pose2D::new(4.0, 0.0, 0.0), info()));
        lcs.push(Factor::between(a(1), a(5), Pose2D::new(4.0, 0.0, 0.0), info()));
        add(&mut pcm, lcs, Values::new(), &mut graph, &mut values);
        assert_eq!(graph.len(), 8);

        assert_eq!(
            pcm.remove_last_loop_closure(&mut graph),
            Some(Edge::new(a(1), a(5)))
        );
        assert_eq!(graph.len(), 7);
        assert_eq!(
            pcm.remove_last_loop_closure(&mut graph),
            Some(Edge::new(a(0), a(4)))
        );
        assert_eq!(graph.len(), 6);

        // Only odometry left
        assert_eq!(pcm.remove_last_loop_closure(&mut graph), None);
        assert_eq!(graph.len(), 6);
    }

    #[test]
    fn test_remove_skips_rejected_newer_closure() {
        let mut pcm = pcm2d();
        let (factors, new_values) = line('a', 6);
        let mut graph = FactorGraph::new();
        let mut values = Values::new();
        add(&mut pcm, factors, new_values, &mut graph, &mut values);

        let mut lcs = FactorGraph::new();
        lcs.push(Factor::between(a(0), a(4), Pose2D::new(4.0, 0.0, 0.0), info()));
        lcs.push(Factor::between(a(1), a(5), Pose2D::new(4.0, 0.0, 0.0), info()));
        // Newest, rejected by the odometry check
        lcs.push(Factor::between(a(0), a(5), Pose2D::new(1.0, 3.0, 1.0), info()));
        add(&mut pcm, lcs, Values::new(), &mut graph, &mut values);
        assert_eq!(graph.len(), 8);

        // a1 -> a5 sits in the middle of its group
        assert_eq!(
            pcm.remove_last_loop_closure(&mut graph),
            Some(Edge::new(a(1), a(5)))
        );
        assert_eq!(graph.len(), 7);
        let stats = pcm.rejection_stats();
        assert_eq!(stats.lc, 2);
        assert_eq!(stats.good_lc, 1);

        assert_eq!(
            pcm.remove_last_loop_closure(&mut graph),
            Some(Edge::new(a(0), a(4)))
        );
        assert_eq!(pcm.remove_last_loop_closure(&mut graph), None);
        assert_eq!(graph.len(), 6);
        assert_eq!(pcm.rejection_stats().lc, 1);
        assert_eq!(pcm.rejection_stats().good_lc, 0);
    }

    #[test]
    fn test_remove_last_loop_closure_between_pair() {
        let mut pcm: Pcm<Pose2D, DistanceThreshold> =
            Pcm::new(DistanceThreshold::new(0.3, 0.1), vec![]);
        let mut graph = FactorGraph::new();
        let mut values = Values::new();
        let (fa, va) = line('a', 4);
        let (fb, vb) = line('b', 4);
        add(&mut pcm, fa, va, &mut graph, &mut values);
        add(&mut pcm, fb, vb, &mut graph, &mut values);

        let mut lcs = FactorGraph::new();
        lcs.push(Factor::between(a(1), b(1), Pose2D::new(0.0, 2.0, 0.0), info()));
        lcs.push(Factor::between(a(0), a(3), Pose2D::new(3.0, 0.0, 0.0), info()));
        add(&mut pcm, lcs, Values::new(), &mut graph, &mut values);

        let removed =
            pcm.remove_last_loop_closure_between(ObservationId::new('b', 'a'), &mut graph);
        assert_eq!(removed, Some(Edge::new(a(1), b(1))));
        assert_eq!(pcm.rejection_stats().lc, 1);
        assert!(pcm
            .remove_last_loop_closure_between(ObservationId::new('a', 'b'), &mut graph)
            .is_none());

        // The intra-robot closure is still the latest globally
        assert_eq!(
            pcm.remove_last_loop_closure(&mut graph),
            Some(Edge::new(a(0), a(3)))
        );
    }

    #[test]
    fn test_ignore_and_revive_prefix() {
        let mut pcm: Pcm<Pose2D, DistanceThreshold> =
            Pcm::new(DistanceThreshold::new(0.3, 0.1), vec![]);
        let mut graph = FactorGraph::new();
        let mut values = Values::new();
        let (fa, va) = line('a', 3);
        let (fb, vb) = line('b', 3);
        add(&mut pcm, fa, va, &mut graph, &mut values);
        add(&mut pcm, fb, vb, &mut graph, &mut values);

        let mut lcs = FactorGraph::new();
        lcs.push(Factor::between(a(2), b(2), Pose2D::new(0.0, 2.0, 0.0), info()));
        add(&mut pcm, lcs, Values::new(), &mut graph, &mut values);
        let full = graph.clone();

        pcm.ignore_loop_closure_with_prefix('b', &mut graph);
        assert_eq!(graph.len(), full.len() - 1);
        assert_eq!(pcm.ignored_prefixes(), vec!['b']);
        assert_eq!(pcm.rejection_stats().good_lc, 0);
        assert_eq!(pcm.remove_last_loop_closure(&mut graph), None);

        pcm.revive_loop_closure_with_prefix('b', &mut graph);
        assert_eq!(graph, full);
        assert!(pcm.ignored_prefixes().is_empty());
    }

    #[test]
    fn test_landmark_measurements() {
        let mut pcm = pcm2d();
        let (factors, new_values) = line('a', 4);
        let mut graph = FactorGraph::new();
        let mut values = Values::new();
        add(&mut pcm, factors, new_values, &mut graph, &mut values);

        let l0 = Key::symbol('l', 0);
        let mut obs = FactorGraph::new();
        obs.push(Factor::between(a(0), l0, Pose2D::new(3.0, 1.0, 0.0), info()));
        obs.push(Factor::between(a(2), l0, Pose2D::new(1.0, 1.0, 0.0), info()));
        // Landmark as the first key, wildly off
        obs.push(Factor::between(l0, a(3), Pose2D::new(5.0, 5.0, 0.0), info()));
        let mut landmark_values = Values::new();
        landmark_values.insert(l0, Pose2D::new(3.0, 1.0, 0.0));
        assert!(add(&mut pcm, obs, landmark_values, &mut graph, &mut values));

        let stats = pcm.rejection_stats();
        assert_eq!(stats.landmark_measurements, 3);
        assert_eq!(stats.good_landmark_measurements, 2);
        assert_eq!(stats.lc, 0);
        assert_eq!(graph.len(), 4 + 2);
        assert!(values.contains(l0));
    }

    #[test]
    fn test_wrong_pose_type_skipped() {
        let mut pcm = pcm2d();
        let (factors, new_values) = line('a', 4);
        let mut graph = FactorGraph::new();
        let mut values = Values::new();
        add(&mut pcm, factors, new_values, &mut graph, &mut values);

        let mut lc = FactorGraph::new();
        lc.push(Factor::between(a(0), a(3), Pose3D::identity(), Information::identity(6)));
        assert!(!add(&mut pcm, lc, Values::new(), &mut graph, &mut values));
        assert!(pcm.loop_closures.is_empty());
    }

    #[test]
    fn test_malformed_odometry_and_prior_skipped() {
        let mut pcm = pcm2d();
        let (factors, new_values) = line('a', 3);
        let mut graph = FactorGraph::new();
        let mut values = Values::new();
        add(&mut pcm, factors, new_values, &mut graph, &mut values);

        let mut bad = FactorGraph::new();
        bad.push(Factor::between(a(2), a(3), Pose2D::new(1.0, 0.0, 0.0), Information::identity(6)));
        bad.push(Factor::prior(a(1), Pose2D::default(), Information::identity(6)));
        bad.push(Factor::prior(a(0), Pose3D::identity(), Information::identity(6)));
        let mut more_values = Values::new();
        more_values.insert(a(3), Pose2D::new(3.0, 0.0, 0.0));

        // Nothing accepted, so no optimization request
        assert!(!add(&mut pcm, bad, more_values, &mut graph, &mut values));
        assert_eq!(graph.len(), 3);
        assert_eq!(pcm.trajectories[&'a'].len(), 3);
        assert!(graph.error(&values).is_finite());
    }

    #[test]
    fn test_save_data_csv() {
        let dir = tempfile::tempdir().unwrap();
        let mut pcm = pcm2d();
        let (factors, new_values) = line('a', 6);
        let mut graph = FactorGraph::new();
        let mut values = Values::new();
        add(&mut pcm, factors, new_values, &mut graph, &mut values);

        let mut lcs = FactorGraph::new();
        lcs.push(Factor::between(a(0), a(5), Pose2D::new(5.0, 0.0, 0.0), info()));
        lcs.push(Factor::between(a(1), a(4), Pose2D::new(0.0, 3.0, 2.0), info()));
        add(&mut pcm, lcs, Values::new(), &mut graph, &mut values);

        pcm.save_data(dir.path()).unwrap();
        let contents = std::fs::read_to_string(dir.path().join(PCM_DATA_FILE)).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines[0], "robot_a,robot_b,from,to,kind,accepted,ignored");
        assert_eq!(lines[1], "a,a,a0,a5,loop_closure,true,false");
        assert_eq!(lines[2], "a,a,a1,a4,loop_closure,false,false");
    }
}
