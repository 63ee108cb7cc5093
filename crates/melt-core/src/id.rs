//! Stable identities for model objects and data elements.
//!
//! An [`Id`] names an object: `(concept, instance)`, jointly unique within
//! its namespace (top-level objects and low-level objects are separate
//! namespaces). An [`ElementKey`] names a data element and a [`TypeKey`]
//! keys the include-function registry.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Concept names used by the standard registry.
pub mod concepts {
    pub const BALANCE: &str = "Balance";
    pub const FLOW: &str = "Flow";
    pub const STORAGE: &str = "Storage";
    pub const COMMODITY: &str = "Commodity";
    pub const HORIZON: &str = "Horizon";
    pub const ARROW: &str = "Arrow";
    pub const CAPACITY: &str = "Capacity";
    pub const COST: &str = "Cost";
    pub const PRICE: &str = "Price";
    pub const LOSS: &str = "Loss";
    pub const RHS_TERM: &str = "RHSTerm";
    pub const PARAM: &str = "Param";
    pub const TIME_VECTOR: &str = "TimeVector";
    pub const TABLE: &str = "Table";
    pub const BOUNDARY_CONDITION: &str = "BoundaryCondition";
    pub const SOFT_BOUND: &str = "SoftBound";
    pub const START_UP_COST: &str = "StartUpCost";
    pub const AGG_SUPPLY_CURVE: &str = "AggSupplyCurve";
}

/// Identity of a model object: `(concept, instance)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Id {
    pub concept: String,
    pub instance: String,
}

impl Id {
    pub fn new(concept: impl Into<String>, instance: impl Into<String>) -> Self {
        Self {
            concept: concept.into(),
            instance: instance.into(),
        }
    }

    /// The name this object uses for its main vector in the LP.
    pub fn lp_name(&self) -> String {
        format!("{}.{}", self.concept, self.instance)
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.concept, self.instance)
    }
}

/// Identity of a data element: `(concept, type, instance)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ElementKey {
    pub concept: String,
    pub elem_type: String,
    pub instance: String,
}

impl ElementKey {
    pub fn new(
        concept: impl Into<String>,
        elem_type: impl Into<String>,
        instance: impl Into<String>,
    ) -> Self {
        Self {
            concept: concept.into(),
            elem_type: elem_type.into(),
            instance: instance.into(),
        }
    }

    pub fn id(&self) -> Id {
        Id::new(self.concept.clone(), self.instance.clone())
    }

    pub fn type_key(&self) -> TypeKey {
        TypeKey::new(self.concept.clone(), self.elem_type.clone())
    }
}

impl fmt::Display for ElementKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}, {}, {})",
            self.concept, self.elem_type, self.instance
        )
    }
}

/// Key into the include-function registry: `(concept, type)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TypeKey {
    pub concept: String,
    pub elem_type: String,
}

impl TypeKey {
    pub fn new(concept: impl Into<String>, elem_type: impl Into<String>) -> Self {
        Self {
            concept: concept.into(),
            elem_type: elem_type.into(),
        }
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.concept, self.elem_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_ordering_is_stable() {
        let a = Id::new(concepts::BALANCE, "A");
        let b = Id::new(concepts::BALANCE, "B");
        let c = Id::new(concepts::FLOW, "A");
        assert!(a < b);
        assert!(a < c);
    }

    #[test]
    fn test_element_key_projections() {
        let key = ElementKey::new("Flow", "BaseFlow", "GasPlant");
        assert_eq!(key.id(), Id::new("Flow", "GasPlant"));
        assert_eq!(key.type_key(), TypeKey::new("Flow", "BaseFlow"));
        assert_eq!(key.to_string(), "(Flow, BaseFlow, GasPlant)");
    }

    #[test]
    fn test_lp_name() {
        let id = Id::new("Storage", "ResNO2");
        assert_eq!(id.lp_name(), "Storage.ResNO2");
    }
}
