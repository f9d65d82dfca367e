//! Solver, outlier rejection and verbosity selectors.
//!
//! Each selector parses from a lowercase string so configuration files can
//! name it; unknown strings are configuration faults.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Nonlinear solver used for every re-optimization.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum SolverMode {
    /// Levenberg-Marquardt with diagonal damping
    #[default]
    LevenbergMarquardt,
    /// Gauss-Newton
    GaussNewton,
}

impl SolverMode {
    /// Configuration name.
    pub fn as_str(&self) -> &'static str {
        match self {
            SolverMode::LevenbergMarquardt => "lm",
            SolverMode::GaussNewton => "gn",
        }
    }
}

impl FromStr for SolverMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "lm" | "levenberg_marquardt" | "levenberg-marquardt" => {
                Ok(SolverMode::LevenbergMarquardt)
            }
            "gn" | "gauss_newton" | "gauss-newton" => Ok(SolverMode::GaussNewton),
            _ => Err(ConfigError::UnknownSolverMode(s.to_string())),
        }
    }
}

/// Outlier rejection strategy selected at construction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum OutlierRemovalMethod {
    /// Accept every measurement
    None,
    /// Pairwise consistency maximization, planar, Mahalanobis tests
    Pcm2D,
    /// Pairwise consistency maximization, spatial, Mahalanobis tests
    #[default]
    Pcm3D,
    /// Pairwise consistency maximization, planar, distance thresholds
    PcmSimple2D,
    /// Pairwise consistency maximization, spatial, distance thresholds
    PcmSimple3D,
}

impl OutlierRemovalMethod {
    /// Configuration name.
    pub fn as_str(&self) -> &'static str {
        match self {
            OutlierRemovalMethod::None => "none",
            OutlierRemovalMethod::Pcm2D => "pcm2d",
            OutlierRemovalMethod::Pcm3D => "pcm3d",
            OutlierRemovalMethod::PcmSimple2D => "pcm_simple2d",
            OutlierRemovalMethod::PcmSimple3D => "pcm_simple3d",
        }
    }
}

impl FromStr for OutlierRemovalMethod {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "none" => Ok(OutlierRemovalMethod::None),
            "pcm2d" => Ok(OutlierRemovalMethod::Pcm2D),
            "pcm3d" => Ok(OutlierRemovalMethod::Pcm3D),
            "pcm_simple2d" => Ok(OutlierRemovalMethod::PcmSimple2D),
            "pcm_simple3d" => Ok(OutlierRemovalMethod::PcmSimple3D),
            _ => Err(ConfigError::UnknownOutlierRemovalMethod(s.to_string())),
        }
    }
}

/// Amount of `log` output; no effect on results.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Verbosity {
    /// Solver and outlier rejection silent
    Quiet,
    /// Solver reports, outlier rejection silent
    #[default]
    Update,
    /// Everything reports
    Verbose,
}

impl Verbosity {
    /// Configuration name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Verbosity::Quiet => "quiet",
            Verbosity::Update => "update",
            Verbosity::Verbose => "verbose",
        }
    }
}

impl FromStr for Verbosity {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "quiet" => Ok(Verbosity::Quiet),
            "update" => Ok(Verbosity::Update),
            "verbose" => Ok(Verbosity::Verbose),
            _ => Err(ConfigError::UnknownVerbosity(s.to_string())),
        }
    }
}

macro_rules! string_conversions {
    ($($ty:ty),*) => {
        $(
            impl TryFrom<String> for $ty {
                type Error = ConfigError;

                fn try_from(value: String) -> Result<Self, Self::Error> {
                    value.parse()
                }
            }

            impl From<$ty> for String {
                fn from(value: $ty) -> Self {
                    value.as_str().to_string()
                }
            }

            impl fmt::Display for $ty {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    f.write_str(self.as_str())
                }
            }
        )*
    };
}

string_conversions!(SolverMode, OutlierRemovalMethod, Verbosity);
