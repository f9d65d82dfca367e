//! Error types for SetuPGO

use thiserror::Error;

/// Configuration fault detected before a solver is constructed.
///
/// A solver is never produced once one of these is returned.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// Outlier removal method string not recognised
    #[error("Undefined outlier removal method: {0}")]
    UnknownOutlierRemovalMethod(String),

    /// Solver mode string not recognised
    #[error("Unsupported solver: {0}")]
    UnknownSolverMode(String),

    /// Verbosity string not recognised
    #[error("Unrecognized verbosity: {0}")]
    UnknownVerbosity(String),

    /// Threshold is negative or not finite
    #[error("Invalid threshold {name}: {value}")]
    InvalidThreshold {
        /// Parameter name
        name: &'static str,
        /// Offending value
        value: f64,
    },

    /// Special symbol is not a single-byte character
    #[error("Invalid special symbol: {0:?}")]
    InvalidSpecialSymbol(char),

    /// Config file could not be read
    #[error("IO error: {0}")]
    Io(String),

    /// Config file could not be parsed
    #[error("Parse error: {0}")]
    Parse(String),
}

/// SetuPGO error type
#[derive(Error, Debug)]
pub enum SolverError {
    /// Log or result file I/O failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration fault
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, SolverError>;
