//! Traits composed onto flows, storages and balances.
//!
//! Each is a thin wrapper around a [`melt_time::Param`] with its own
//! semantics flags, plus the arrows that wire flows into balances.

pub mod arrow;
pub mod capacity;
pub mod conversion;
pub mod cost;
pub mod price;
pub mod rhsterm;

pub use arrow::{Arrow, ArrowTarget, BaseArrow, SegmentedArrow};
pub use capacity::Capacity;
pub use conversion::{Conversion, Loss};
pub use cost::{Cost, SimpleSumCost};
pub use price::Price;
pub use rhsterm::RhsTerm;
