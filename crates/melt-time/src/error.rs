//! Error types for the temporal model.

use thiserror::Error;

/// Errors raised by horizons, time vectors and parameters.
#[derive(Error, Debug)]
pub enum TimeError {
    /// Horizon structure is unusable (empty, non-positive durations, bad grouping)
    #[error("Bad horizon: {0}")]
    BadHorizon(String),

    /// A fine horizon does not exactly refine a coarse horizon
    #[error("Subperiod mismatch: {0}")]
    SubperiodMismatch(String),

    /// Time vector data is unusable (unsorted index, length mismatch, empty)
    #[error("Bad time vector: {0}")]
    BadTimeVector(String),

    /// Parameter composition or evaluation error
    #[error("Bad parameter: {0}")]
    BadParam(String),
}

/// Convenience type alias for Results using TimeError.
pub type TimeResult<T> = Result<T, TimeError>;
