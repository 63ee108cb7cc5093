//! Top-level model objects and their three-phase lifecycle.
//!
//! Every object is created by the resolver, gets its back-references filled
//! during `assemble`, adds its variables and rows during `build`, writes
//! time-invariant coefficients once in `set_constants`, and rewrites the
//! time-dependent ones on every `update`.

pub mod balance;
pub mod flow;
pub mod softbound;
pub mod startupcost;
pub mod storage;
pub mod supplycurve;

pub use balance::{Balance, BalanceKind};
pub use flow::Flow;
pub use softbound::SoftBound;
pub use startupcost::StartUpCost;
pub use storage::Storage;
pub use supplycurve::AggSupplyCurve;

use crate::boundary::{SimpleSingleCuts, StartEqualStop};
use crate::error::CoreResult;
use crate::id::Id;
use crate::statevar::StateVariableInfo;
use crate::store::{HorizonStore, LowLevelStore};
use melt_solver::Problem;
use melt_time::ProbTime;
use std::collections::BTreeMap;

/// Result of one assemble attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum AssembleOutcome {
    Done,
    /// Referenced objects that must be assembled (or exist) first.
    Missing(Vec<Id>),
}

impl AssembleOutcome {
    pub fn missing(id: Id) -> Self {
        AssembleOutcome::Missing(vec![id])
    }

    pub fn is_done(&self) -> bool {
        matches!(self, AssembleOutcome::Done)
    }
}

/// Read-only view of the rest of the store while one object assembles.
pub struct AssembleCtx<'a> {
    pub objects: &'a BTreeMap<Id, ModelObject>,
    pub lowlevel: &'a LowLevelStore,
}

impl AssembleCtx<'_> {
    pub fn balance(&self, id: &Id) -> Option<&Balance> {
        match self.objects.get(id) {
            Some(ModelObject::Balance(balance)) => Some(balance),
            _ => None,
        }
    }

    pub fn horizon_periods(&self, id: &Id) -> Option<usize> {
        self.lowlevel.horizons.get(id).map(|h| h.num_periods())
    }
}

/// The sealed set of top-level objects.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelObject {
    Flow(Flow),
    Balance(Balance),
    Storage(Storage),
    StartEqualStop(StartEqualStop),
    SingleCuts(SimpleSingleCuts),
    SoftBound(SoftBound),
    StartUpCost(StartUpCost),
    AggSupplyCurve(AggSupplyCurve),
}

impl ModelObject {
    pub fn id(&self) -> &Id {
        match self {
            ModelObject::Flow(o) => o.id(),
            ModelObject::Balance(o) => o.id(),
            ModelObject::Storage(o) => o.id(),
            ModelObject::StartEqualStop(o) => o.id(),
            ModelObject::SingleCuts(o) => o.id(),
            ModelObject::SoftBound(o) => o.id(),
            ModelObject::StartUpCost(o) => o.id(),
            ModelObject::AggSupplyCurve(o) => o.id(),
        }
    }

    pub fn as_flow(&self) -> Option<&Flow> {
        match self {
            ModelObject::Flow(flow) => Some(flow),
            _ => None,
        }
    }

    pub fn as_flow_mut(&mut self) -> Option<&mut Flow> {
        match self {
            ModelObject::Flow(flow) => Some(flow),
            _ => None,
        }
    }

    pub fn as_balance(&self) -> Option<&Balance> {
        match self {
            ModelObject::Balance(balance) => Some(balance),
            _ => None,
        }
    }

    pub fn as_balance_mut(&mut self) -> Option<&mut Balance> {
        match self {
            ModelObject::Balance(balance) => Some(balance),
            _ => None,
        }
    }

    pub fn as_storage_mut(&mut self) -> Option<&mut Storage> {
        match self {
            ModelObject::Storage(storage) => Some(storage),
            _ => None,
        }
    }

    /// Whether assemble has completed for this object.
    pub fn is_assembled(&self) -> bool {
        match self {
            ModelObject::Flow(o) => o.horizon().is_some(),
            ModelObject::Balance(o) => o.horizon().is_some(),
            ModelObject::Storage(o) => o.horizon().is_some(),
            ModelObject::StartEqualStop(_) => true,
            ModelObject::SingleCuts(_) => true,
            ModelObject::SoftBound(o) => o.horizon().is_some(),
            ModelObject::StartUpCost(o) => o.horizon().is_some(),
            ModelObject::AggSupplyCurve(o) => o.horizon().is_some(),
        }
    }

    /// Horizons this object reads during build and update.
    pub fn horizons(&self) -> Vec<Id> {
        match self {
            ModelObject::Flow(o) => {
                let mut ids: Vec<Id> = o.horizon().into_iter().cloned().collect();
                for arrow in o.arrows() {
                    if let Some(h) = arrow.balance_horizon() {
                        if !ids.contains(h) {
                            ids.push(h.clone());
                        }
                    }
                }
                ids
            }
            ModelObject::Balance(o) => o.horizon().into_iter().cloned().collect(),
            ModelObject::Storage(o) => o.horizon().into_iter().cloned().collect(),
            ModelObject::StartEqualStop(_) | ModelObject::SingleCuts(_) => Vec::new(),
            ModelObject::SoftBound(o) => o.horizon().into_iter().cloned().collect(),
            ModelObject::StartUpCost(o) => o.horizon().into_iter().cloned().collect(),
            ModelObject::AggSupplyCurve(o) => o.horizon().into_iter().cloned().collect(),
        }
    }

    pub fn state_variables(&self) -> Vec<StateVariableInfo> {
        match self {
            ModelObject::Storage(o) => o.state_variables(),
            ModelObject::StartUpCost(o) => o.state_variables(),
            _ => Vec::new(),
        }
    }

    pub(crate) fn assemble(&mut self, ctx: &AssembleCtx) -> CoreResult<AssembleOutcome> {
        match self {
            ModelObject::Flow(o) => o.assemble(ctx),
            ModelObject::Balance(o) => o.assemble(ctx),
            ModelObject::Storage(o) => o.assemble(ctx),
            ModelObject::StartEqualStop(o) => o.assemble(ctx),
            ModelObject::SingleCuts(o) => o.assemble(ctx),
            ModelObject::SoftBound(o) => o.assemble(ctx),
            ModelObject::StartUpCost(o) => o.assemble(ctx),
            ModelObject::AggSupplyCurve(o) => o.assemble(ctx),
        }
    }

    pub fn build(&self, lp: &mut dyn Problem, hs: &HorizonStore) -> CoreResult<()> {
        match self {
            ModelObject::Flow(o) => o.build(lp, hs),
            ModelObject::Balance(o) => o.build(lp, hs),
            ModelObject::Storage(o) => o.build(lp, hs),
            ModelObject::StartEqualStop(o) => o.build(lp, hs),
            ModelObject::SingleCuts(o) => o.build(lp, hs),
            ModelObject::SoftBound(o) => o.build(lp, hs),
            ModelObject::StartUpCost(o) => o.build(lp, hs),
            ModelObject::AggSupplyCurve(o) => o.build(lp, hs),
        }
    }

    pub fn set_constants(&self, lp: &mut dyn Problem, hs: &HorizonStore) -> CoreResult<()> {
        match self {
            ModelObject::Flow(o) => o.set_constants(lp, hs),
            ModelObject::Balance(o) => o.set_constants(lp, hs),
            ModelObject::Storage(o) => o.set_constants(lp, hs),
            ModelObject::StartEqualStop(o) => o.set_constants(lp, hs),
            ModelObject::SingleCuts(o) => o.set_constants(lp, hs),
            ModelObject::SoftBound(o) => o.set_constants(lp, hs),
            ModelObject::StartUpCost(o) => o.set_constants(lp, hs),
            ModelObject::AggSupplyCurve(o) => o.set_constants(lp, hs),
        }
    }

    pub fn update(
        &mut self,
        lp: &mut dyn Problem,
        hs: &HorizonStore,
        t: &ProbTime,
    ) -> CoreResult<()> {
        match self {
            ModelObject::Flow(o) => o.update(lp, hs, t),
            ModelObject::Balance(o) => o.update(lp, hs, t),
            ModelObject::Storage(o) => o.update(lp, hs, t),
            ModelObject::StartEqualStop(_) => Ok(()),
            ModelObject::SingleCuts(_) => Ok(()),
            ModelObject::SoftBound(o) => o.update(lp, hs, t),
            ModelObject::StartUpCost(o) => o.update(lp, hs, t),
            ModelObject::AggSupplyCurve(o) => o.update(lp, hs, t),
        }
    }
}
