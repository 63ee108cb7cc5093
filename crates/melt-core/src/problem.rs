//! The model problem: objects, horizons and an LP backend, driven through
//! build, set-constants, update and solve.

use crate::error::CoreResult;
use crate::id::Id;
use crate::objects::ModelObject;
use crate::statevar::StateVariableInfo;
use crate::store::{HorizonStore, ModelStore};
use melt_solver::{LpResult, Problem};
use melt_time::{Horizon, ProbTime};
use std::collections::BTreeMap;

/// A parameterized LP bound to a solver backend.
///
/// Construction collects the horizons reached through the objects, builds
/// every object's variables and rows once, and writes the time-invariant
/// coefficients. Each `update` then refreshes the horizons before letting
/// every object rewrite its time-dependent coefficients; objects are
/// processed in id order, and their contracts are order-invariant.
pub struct ModelProblem<P: Problem> {
    lp: P,
    objects: BTreeMap<Id, ModelObject>,
    horizons: HorizonStore,
}

impl<P: Problem> ModelProblem<P> {
    pub fn new(lp: P, store: ModelStore) -> CoreResult<Self> {
        let ModelStore { objects, lowlevel } = store;

        // Collect the horizons the objects reach, as private working copies
        let mut horizons: HorizonStore = BTreeMap::new();
        for object in objects.values() {
            for hid in object.horizons() {
                if let Some(horizon) = lowlevel.horizons.get(&hid) {
                    horizons.entry(hid).or_insert_with(|| horizon.clone());
                }
            }
        }
        // Adaptive horizons cluster on the residual load of the balances
        // that live on them
        for (hid, horizon) in horizons.iter_mut() {
            if let Horizon::Adaptive(adaptive) = horizon {
                let mut residual = Vec::new();
                for object in objects.values() {
                    if let Some(balance) = object.as_balance() {
                        if balance.horizon() == Some(hid) {
                            residual.extend(balance.residual_params());
                        }
                    }
                }
                adaptive.set_residual(residual);
            }
        }

        let mut problem = Self {
            lp,
            objects,
            horizons,
        };
        for object in problem.objects.values() {
            object.build(&mut problem.lp, &problem.horizons)?;
        }
        for object in problem.objects.values() {
            object.set_constants(&mut problem.lp, &problem.horizons)?;
        }
        tracing::debug!(
            objects = problem.objects.len(),
            horizons = problem.horizons.len(),
            "model problem built"
        );
        Ok(problem)
    }

    /// Rewrite the time-dependent coefficients for a new problem time.
    ///
    /// Horizons refresh their period structure first, so objects querying
    /// them see the state belonging to `t`.
    pub fn update(&mut self, t: &ProbTime) -> CoreResult<()> {
        for horizon in self.horizons.values_mut() {
            horizon.refresh(t);
        }
        for object in self.objects.values_mut() {
            object.update(&mut self.lp, &self.horizons, t)?;
        }
        Ok(())
    }

    pub fn solve(&mut self) -> LpResult<()> {
        self.lp.solve()
    }

    pub fn objective(&self) -> LpResult<f64> {
        self.lp.get_objective_value()
    }

    pub fn lp(&self) -> &P {
        &self.lp
    }

    pub fn lp_mut(&mut self) -> &mut P {
        &mut self.lp
    }

    pub fn object(&self, id: &Id) -> Option<&ModelObject> {
        self.objects.get(id)
    }

    pub fn object_mut(&mut self, id: &Id) -> Option<&mut ModelObject> {
        self.objects.get_mut(id)
    }

    pub fn objects(&self) -> impl Iterator<Item = (&Id, &ModelObject)> {
        self.objects.iter()
    }

    pub fn horizon(&self, id: &Id) -> Option<&Horizon> {
        self.horizons.get(id)
    }

    /// Every carry-over pair exposed by the objects, in id order.
    pub fn state_variables(&self) -> Vec<StateVariableInfo> {
        self.objects
            .values()
            .flat_map(|o| o.state_variables())
            .collect()
    }

    /// Access the cut pool machinery of one object together with the LP,
    /// split-borrowed so `update_cuts` / `clear_cuts` can write coefficients.
    pub fn cuts_mut(
        &mut self,
        id: &Id,
    ) -> Option<(&mut crate::boundary::SimpleSingleCuts, &mut P)> {
        match self.objects.get_mut(id) {
            Some(ModelObject::SingleCuts(cuts)) => Some((cuts, &mut self.lp)),
            _ => None,
        }
    }
}
