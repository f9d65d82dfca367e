//! Robust solver construction parameters.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::optimizer::GraphOptimizerConfig;

use super::modes::{OutlierRemovalMethod, SolverMode, Verbosity};

/// Mahalanobis thresholds for the PCM-2D/3D consistency tests.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PcmThresholds {
    /// Odometry consistency threshold (Mahalanobis distance)
    pub odom_threshold: f64,
    /// Pairwise loop closure consistency threshold (Mahalanobis distance)
    pub lc_threshold: f64,
}

impl Default for PcmThresholds {
    fn default() -> Self {
        Self {
            odom_threshold: 5.0,
            lc_threshold: 5.0,
        }
    }
}

/// Distance thresholds for the PCM-Simple consistency tests.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DistanceThresholds {
    /// Translation threshold (meters)
    pub trans_threshold: f64,
    /// Rotation threshold (radians)
    pub rot_threshold: f64,
}

impl Default for DistanceThresholds {
    fn default() -> Self {
        Self {
            trans_threshold: 0.05,
            rot_threshold: 0.005,
        }
    }
}

/// Full robust solver configuration.
///
/// ## Example YAML
///
/// ```yaml
/// solver: lm
/// outlier_removal_method: pcm2d
/// pcm:
///   odom_threshold: 3.0
///   lc_threshold: 3.0
/// special_symbols: [l, u]
/// verbosity: quiet
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RobustSolverParams {
    /// Nonlinear solver
    pub solver: SolverMode,

    /// Outlier rejection strategy
    pub outlier_removal_method: OutlierRemovalMethod,

    /// PCM-2D/3D thresholds
    pub pcm: PcmThresholds,

    /// PCM-Simple thresholds
    pub pcm_distance: DistanceThresholds,

    /// Prefixes of non-trajectory variables (landmarks)
    pub special_symbols: Vec<char>,

    /// Log output level
    pub verbosity: Verbosity,

    /// Optimizer tuning
    pub optimizer: GraphOptimizerConfig,
}

impl Default for RobustSolverParams {
    fn default() -> Self {
        Self {
            solver: SolverMode::LevenbergMarquardt,
            outlier_removal_method: OutlierRemovalMethod::Pcm3D,
            pcm: PcmThresholds::default(),
            pcm_distance: DistanceThresholds::default(),
            special_symbols: Vec::new(),
            verbosity: Verbosity::Update,
            optimizer: GraphOptimizerConfig::default(),
        }
    }
}

/// Untyped view of the YAML so selector faults surface as their own
/// [`ConfigError`] variants instead of a generic parse error.
#[derive(Deserialize, Default)]
#[serde(default)]
struct RawParams {
    solver: Option<String>,
    outlier_removal_method: Option<String>,
    pcm: PcmThresholds,
    pcm_distance: DistanceThresholds,
    special_symbols: Vec<char>,
    verbosity: Option<String>,
    optimizer: GraphOptimizerConfig,
}

impl TryFrom<RawParams> for RobustSolverParams {
    type Error = ConfigError;

    fn try_from(raw: RawParams) -> Result<Self, Self::Error> {
        let defaults = RobustSolverParams::default();
        Ok(Self {
            solver: match raw.solver {
                Some(s) => s.parse()?,
                None => defaults.solver,
            },
            outlier_removal_method: match raw.outlier_removal_method {
                Some(s) => s.parse()?,
                None => defaults.outlier_removal_method,
            },
            pcm: raw.pcm,
            pcm_distance: raw.pcm_distance,
            special_symbols: raw.special_symbols,
            verbosity: match raw.verbosity {
                Some(s) => s.parse()?,
                None => defaults.verbosity,
            },
            optimizer: raw.optimizer,
        })
    }
}

impl RobustSolverParams {
    /// Load parameters from a YAML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| ConfigError::Io(e.to_string()))?;
        Self::from_yaml(&contents)
    }

    /// Parse from a YAML string and validate.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let raw: RawParams =
            serde_yaml::from_str(yaml).map_err(|e| ConfigError::Parse(e.to_string()))?;
        let params = Self::try_from(raw)?;
        params.validate()?;
        Ok(params)
    }

    /// Serialize to YAML.
    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        serde_yaml::to_string(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Check thresholds and special symbols.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let thresholds = [
            ("pcm.odom_threshold", self.pcm.odom_threshold),
            ("pcm.lc_threshold", self.pcm.lc_threshold),
            ("pcm_distance.trans_threshold", self.pcm_distance.trans_threshold),
            ("pcm_distance.rot_threshold", self.pcm_distance.rot_threshold),
        ];
        for (name, value) in thresholds {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::InvalidThreshold { name, value });
            }
        }

        // Keys store the prefix in a single byte
        if let Some(&c) = self.special_symbols.iter().find(|c| !c.is_ascii()) {
            return Err(ConfigError::InvalidSpecialSymbol(c));
        }
        Ok(())
    }

    /// PCM-Simple-2D with the given translation/rotation thresholds.
    pub fn set_pcm_simple_2d_params(&mut self, trans: f64, rot: f64, verbosity: Verbosity) {
        self.outlier_removal_method = OutlierRemovalMethod::PcmSimple2D;
        self.pcm_distance = DistanceThresholds {
            trans_threshold: trans,
            rot_threshold: rot,
        };
        self.verbosity = verbosity;
    }

    /// PCM-Simple-3D with the given translation/rotation thresholds.
    pub fn set_pcm_simple_3d_params(&mut self, trans: f64, rot: f64, verbosity: Verbosity) {
        self.outlier_removal_method = OutlierRemovalMethod::PcmSimple3D;
        self.pcm_distance = DistanceThresholds {
            trans_threshold: trans,
            rot_threshold: rot,
        };
        self.verbosity = verbosity;
    }

    /// PCM-2D with the given Mahalanobis thresholds.
    pub fn set_pcm_2d_params(&mut self, odom: f64, lc: f64, verbosity: Verbosity) {
        self.outlier_removal_method = OutlierRemovalMethod::Pcm2D;
        self.pcm = PcmThresholds {
            odom_threshold: odom,
            lc_threshold: lc,
        };
        self.verbosity = verbosity;
    }

    /// PCM-3D with the given Mahalanobis thresholds.
    pub fn set_pcm_3d_params(&mut self, odom: f64, lc: f64, verbosity: Verbosity) {
        self.outlier_removal_method = OutlierRemovalMethod::Pcm3D;
        self.pcm = PcmThresholds {
            odom_threshold: odom,
            lc_threshold: lc,
        };
        self.verbosity = verbosity;
    }

    /// Disable outlier rejection.
    pub fn set_no_rejection(&mut self, verbosity: Verbosity) {
        self.outlier_removal_method = OutlierRemovalMethod::None;
        self.verbosity = verbosity;
    }

    /// Set the nonlinear solver.
    pub fn set_solver(&mut self, solver: SolverMode) {
        self.solver = solver;
    }

    /// Set the prefixes treated as landmarks.
    pub fn set_special_symbols(&mut self, symbols: Vec<char>) {
        self.special_symbols = symbols;
    }
}
