//! Outlier rejection counters.

use std::fmt;

/// Counters reported after each update, written as one row of `log.txt`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RejectionStats {
    /// Loop closures received
    pub lc: usize,
    /// Loop closures currently accepted
    pub good_lc: usize,
    /// Loop closures that passed the odometry check
    pub odom_consistent_lc: usize,
    /// Inter-robot loop closures received
    pub multirobot_lc: usize,
    /// Inter-robot loop closures currently accepted
    pub good_multirobot_lc: usize,
    /// Landmark measurements received
    pub landmark_measurements: usize,
    /// Landmark measurements currently accepted
    pub good_landmark_measurements: usize,
    /// Consistency errors computed during the last update
    pub consistency_error: Vec<f64>,
}

impl RejectionStats {
    /// Format the counters followed by the total graph error.
    pub fn log_row(&self, error: f64) -> String {
        format!(
            "{} {} {} {} {} {} {} {}",
            self.lc,
            self.good_lc,
            self.odom_consistent_lc,
            self.multirobot_lc,
            self.good_multirobot_lc,
            self.landmark_measurements,
            self.good_landmark_measurements,
            error
        )
    }

    /// Consistency errors separated by spaces.
    pub fn error_row(&self) -> String {
        let parts: Vec<String> = self.consistency_error.iter().map(|e| e.to_string()).collect();
        parts.join(" ")
    }
}

impl fmt::Display for RejectionStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} loop closures accepted ({} odometry consistent, {}/{} inter-robot), \
             {}/{} landmark measurements accepted",
            self.good_lc,
            self.lc,
            self.odom_consistent_lc,
            self.good_multirobot_lc,
            self.multirobot_lc,
            self.good_landmark_measurements,
            self.landmark_measurements
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_row_has_eight_fields() {
        let stats = RejectionStats {
            lc: 4,
            good_lc: 3,
            odom_consistent_lc: 3,
            multirobot_lc: 1,
            good_multirobot_lc: 1,
            landmark_measurements: 2,
            good_landmark_measurements: 2,
            consistency_error: vec![0.5, 1.25],
        };
        let row = stats.log_row(0.75);
        assert_eq!(row, "4 3 3 1 1 2 2 0.75");
        assert_eq!(row.split_whitespace().count(), 8);
        assert_eq!(stats.error_row(), "0.5 1.25");
    }

    #[test]
    fn test_default_rows() {
        let stats = RejectionStats::default();
        assert_eq!(stats.log_row(0.0), "0 0 0 0 0 0 0 0");
        assert!(stats.error_row().is_empty());
    }
}
