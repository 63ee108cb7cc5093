//! # melt-core: Model-Object Kernel for Energy-Market LPs
//!
//! Compiles a flat list of data elements describing a power system into a
//! typed object graph, builds the corresponding LP once, and thereafter
//! rewrites only time-dependent coefficients for each successive problem
//! time.
//!
//! ## Design Philosophy
//!
//! The object graph is an **arena keyed by [`Id`]**: back-references between
//! balances, flows and storages are id handles resolved against the store,
//! never pointers. The resolver builds the graph with two fixed-point
//! passes (include, then assemble) so elements can be authored in any
//! order; a stall aborts with a report naming the missing references.
//!
//! Every model object follows the same three-phase lifecycle against the
//! backend-neutral LP contract from `melt-solver`:
//!
//! 1. `build` - add named variable vectors and rows, once
//! 2. `set_constants` - write time-invariant coefficients, once
//! 3. `update(problem time)` - rewrite the time-dependent coefficients
//!
//! Carry-over quantities follow the state-variable discipline: a fixable
//! ingoing `x[0]` and an outgoing `x[T]`, so boundary conditions can pin
//! them and Benders-style cut pools can read their duals.
//!
//! ## Modules
//!
//! - [`id`], [`element`] - identities and the data-element wire format
//! - [`resolver`], [`include`] - the fixed-point loader and its registry
//! - [`objects`] - flows, balances, storages and friends
//! - [`traits`] - arrows, capacities, costs, prices, losses, RHS terms
//! - [`boundary`] - start-equal-stop and the single-cut pool
//! - [`problem`] - the model problem driving build / update / solve

pub mod boundary;
pub mod element;
pub mod error;
pub mod id;
pub mod include;
pub mod objects;
pub mod problem;
pub mod resolver;
pub mod statevar;
pub mod store;
pub mod traits;

pub use boundary::{
    get_cut_parameters, get_outgoing_states, set_ingoing_states, CutParameters, SimpleSingleCuts,
    StartEqualStop,
};
pub use element::{keys, DataElement, ElementValue, FieldValue};
pub use error::{CoreError, CoreResult};
pub use id::{concepts, ElementKey, Id, TypeKey};
pub use objects::{
    AggSupplyCurve, Balance, BalanceKind, Flow, ModelObject, SoftBound, StartUpCost, Storage,
};
pub use problem::ModelProblem;
pub use resolver::{resolve_elements, IncludeOutcome, IncludeRegistry, ResolverConfig};
pub use statevar::{StateVariableInfo, VarRef};
pub use store::{Commodity, LowLevelStore, ModelStore};
