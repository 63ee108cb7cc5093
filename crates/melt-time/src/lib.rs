//! # melt-time: Temporal Model for Repeatedly Updated LPs
//!
//! Provides the problem-time arithmetic, horizons, time vectors and
//! parameters that let a linear program be rebuilt cheaply for successive
//! problem times.
//!
//! ## Design Philosophy
//!
//! Everything here is **relative**: a horizon is a list of period durations,
//! not a list of dates. Absolute times only appear when a caller asks for
//! the start of a period at a concrete [`ProbTime`]. This is what allows one
//! LP structure to be re-used across planning dates and weather scenarios:
//! only coefficient values change.
//!
//! The two clocks of a [`ProbTime`] separate concerns:
//! - the **datatime** selects planning-date data (capacities, costs, fuel
//!   prices),
//! - the **scenariotime** selects weather-scenario profiles (inflow, wind,
//!   temperature-driven demand).
//!
//! ## Modules
//!
//! - [`delta`] - contiguous and unit-union durations
//! - [`probtime`] - the two-clock problem time and its arithmetic
//! - [`vectors`] - constant / infinite / rotating / column-backed series
//! - [`params`] - durational and instantaneous parameters over the vectors
//! - [`horizon`] - sequential, adaptive and shrinkable horizons, offsets and
//!   the subperiod mapping

pub mod delta;
pub mod error;
pub mod horizon;
pub mod params;
pub mod probtime;
pub mod vectors;

pub use delta::{TimeDelta, UnitsTimeDelta};
pub use error::{TimeError, TimeResult};
pub use horizon::{
    subperiods, AdaptiveHorizon, ClusterMethod, Horizon, HorizonOffset, ResetPolicy,
    SequentialHorizon, ShrinkableHorizon,
};
pub use params::{
    FossilMcParam, InConversionLossParam, M3sToMm3SeriesParam, MwToGwhSeriesParam,
    OutConversionLossParam, Param, PrognosisSeriesParam, TwoProductParam, UmmSeriesParam,
};
pub use probtime::ProbTime;
pub use vectors::{
    ColumnTimeVector, InfiniteTimeVector, Interpolation, ProfileTable, RotatingTimeVector,
    TimeVector,
};
