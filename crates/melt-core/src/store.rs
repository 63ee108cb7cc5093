//! Object stores: the arenas the resolver fills.
//!
//! References between objects are `Id` handles into these maps rather than
//! pointers, which keeps ownership acyclic and lets the resolver build the
//! graph incrementally. Top-level objects (flows, balances, storages,
//! boundary conditions, ...) live in the object map; low-level entities
//! (horizons, commodities, params, time vectors, prices, tables) live in the
//! low-level store with shared read-only access.

use crate::id::Id;
use crate::objects::ModelObject;
use crate::traits::Price;
use melt_time::{Horizon, Param, ProfileTable, TimeVector};
use std::collections::BTreeMap;
use std::sync::Arc;

/// A commodity names a physical quantity and owns the default horizon for
/// its balances.
#[derive(Debug, Clone, PartialEq)]
pub struct Commodity {
    pub id: Id,
    pub horizon: Id,
}

/// Low-level entities owned by the elements that refer to them.
#[derive(Debug, Default, PartialEq)]
pub struct LowLevelStore {
    pub horizons: BTreeMap<Id, Horizon>,
    pub commodities: BTreeMap<Id, Commodity>,
    pub params: BTreeMap<Id, Param>,
    pub timevectors: BTreeMap<Id, TimeVector>,
    pub prices: BTreeMap<Id, Price>,
    pub tables: BTreeMap<Id, Arc<ProfileTable>>,
}

/// The resolver's output: top-level objects plus the low-level store.
#[derive(Debug, Default, PartialEq)]
pub struct ModelStore {
    pub objects: BTreeMap<Id, ModelObject>,
    pub lowlevel: LowLevelStore,
}

impl ModelStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn object(&self, id: &Id) -> Option<&ModelObject> {
        self.objects.get(id)
    }

    pub fn object_mut(&mut self, id: &Id) -> Option<&mut ModelObject> {
        self.objects.get_mut(id)
    }
}

/// Horizons collected by a model problem, keyed by id.
pub type HorizonStore = BTreeMap<Id, Horizon>;

/// Look up a horizon a built object depends on.
pub fn horizon_of<'a>(
    hs: &'a HorizonStore,
    id: &Id,
) -> crate::error::CoreResult<&'a Horizon> {
    hs.get(id).ok_or_else(|| {
        crate::error::CoreError::InvariantViolation(format!("horizon {id} not collected"))
    })
}
