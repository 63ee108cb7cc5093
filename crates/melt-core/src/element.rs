//! Data elements: the flat records the resolver compiles into model objects.
//!
//! Every element is a 4-tuple `(concept, type, instance, value)`. The value
//! is either a string-keyed field map or a direct in-memory object (time
//! vector, horizon, parameter, profile table). Elements may be authored in
//! any order; the resolver imposes the order.

use crate::error::{CoreError, CoreResult};
use crate::id::{ElementKey, Id, TypeKey};
use chrono::NaiveDateTime;
use melt_time::{Horizon, Param, ProfileTable, TimeVector};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Reserved field-name vocabulary.
pub mod keys {
    pub const WHICH_CONCEPT: &str = "WhichConcept";
    pub const WHICH_INSTANCE: &str = "WhichInstance";
    pub const DIRECTION: &str = "Direction";
    pub const DIRECTION_IN: &str = "In";
    pub const DIRECTION_OUT: &str = "Out";
    pub const BOUND: &str = "Bound";
    pub const BOUND_UPPER: &str = "Upper";
    pub const BOUND_LOWER: &str = "Lower";
    pub const LOSS_FACTOR: &str = "LossFactor";
    pub const UTILIZATION: &str = "Utilization";
    pub const PENALTY: &str = "Penalty";
    pub const SOFT_CAP: &str = "SoftCap";
    pub const STORAGE_HINT: &str = "StorageHint";
    pub const RESIDUAL_HINT: &str = "ResidualHint";
    pub const HORIZON: &str = "Horizon";
    pub const PARAM: &str = "Param";
    pub const CONVERSION: &str = "Conversion";
    pub const PRICE: &str = "Price";
    pub const LEVEL: &str = "Level";
    pub const PROFILE: &str = "Profile";
    pub const SCALE: &str = "Scale";
    pub const NUM_PERIODS: &str = "NumPeriods";
    pub const PERIOD_HOURS: &str = "PeriodHours";
    pub const TIMES: &str = "Times";
    pub const VALUES: &str = "Values";
    pub const START: &str = "Start";
    pub const STOP: &str = "Stop";
    pub const INTERPOLATION: &str = "Interpolation";
    pub const OBJECTS: &str = "Objects";
    pub const PROBABILITIES: &str = "Probabilities";
    pub const MAX_CUTS: &str = "MaxCuts";
    pub const CAPACITIES: &str = "Capacities";
    pub const CONVERSIONS: &str = "Conversions";
    pub const COSTS: &str = "Costs";
    pub const NUM_CLUSTERS: &str = "NumClusters";
    pub const START_COST: &str = "StartCost";
    pub const MIN_STABLE_LOAD: &str = "MinStableLoad";
}

/// A scalar or small composite field value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Time(NaiveDateTime),
    Values(Vec<f64>),
    Times(Vec<NaiveDateTime>),
    Strs(Vec<String>),
}

/// The payload of a data element.
#[derive(Debug, Clone)]
pub enum ElementValue {
    Fields(HashMap<String, FieldValue>),
    TimeVector(TimeVector),
    Horizon(Horizon),
    Param(Param),
    Table(Arc<ProfileTable>),
}

impl ElementValue {
    pub fn fields(&self) -> Option<&HashMap<String, FieldValue>> {
        match self {
            ElementValue::Fields(map) => Some(map),
            _ => None,
        }
    }
}

/// One record in the flat input list.
#[derive(Debug, Clone)]
pub struct DataElement {
    pub concept: String,
    pub elem_type: String,
    pub instance: String,
    pub value: ElementValue,
}

impl DataElement {
    pub fn new(
        concept: impl Into<String>,
        elem_type: impl Into<String>,
        instance: impl Into<String>,
        value: ElementValue,
    ) -> Self {
        Self {
            concept: concept.into(),
            elem_type: elem_type.into(),
            instance: instance.into(),
            value,
        }
    }

    /// Convenience constructor from field pairs.
    pub fn with_fields<K: Into<String>>(
        concept: impl Into<String>,
        elem_type: impl Into<String>,
        instance: impl Into<String>,
        fields: impl IntoIterator<Item = (K, FieldValue)>,
    ) -> Self {
        let map = fields
            .into_iter()
            .map(|(k, v)| (k.into(), v))
            .collect::<HashMap<_, _>>();
        Self::new(concept, elem_type, instance, ElementValue::Fields(map))
    }

    pub fn key(&self) -> ElementKey {
        ElementKey::new(
            self.concept.clone(),
            self.elem_type.clone(),
            self.instance.clone(),
        )
    }

    pub fn type_key(&self) -> TypeKey {
        TypeKey::new(self.concept.clone(), self.elem_type.clone())
    }

    pub fn id(&self) -> Id {
        Id::new(self.concept.clone(), self.instance.clone())
    }
}

/// Typed accessors over an element's field map.
///
/// Every failure names the element key, so resolver errors point at the
/// offending record.
pub struct FieldReader<'a> {
    key: &'a ElementKey,
    fields: &'a HashMap<String, FieldValue>,
}

impl<'a> FieldReader<'a> {
    pub fn new(key: &'a ElementKey, value: &'a ElementValue) -> CoreResult<Self> {
        let fields = value.fields().ok_or_else(|| CoreError::WrongFieldType {
            key: key.clone(),
            field: "<value>".into(),
            expected: "field map",
        })?;
        Ok(Self { key, fields })
    }

    fn req(&self, name: &str) -> CoreResult<&FieldValue> {
        self.fields.get(name).ok_or_else(|| CoreError::MissingField {
            key: self.key.clone(),
            field: name.to_string(),
        })
    }

    fn wrong(&self, name: &str, expected: &'static str) -> CoreError {
        CoreError::WrongFieldType {
            key: self.key.clone(),
            field: name.to_string(),
            expected,
        }
    }

    pub fn has(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    pub fn str(&self, name: &str) -> CoreResult<&str> {
        match self.req(name)? {
            FieldValue::Str(s) => Ok(s),
            _ => Err(self.wrong(name, "string")),
        }
    }

    pub fn f64(&self, name: &str) -> CoreResult<f64> {
        match self.req(name)? {
            FieldValue::Float(v) => Ok(*v),
            FieldValue::Int(v) => Ok(*v as f64),
            _ => Err(self.wrong(name, "number")),
        }
    }

    pub fn usize(&self, name: &str) -> CoreResult<usize> {
        match self.req(name)? {
            FieldValue::Int(v) if *v >= 0 => Ok(*v as usize),
            _ => Err(self.wrong(name, "non-negative integer")),
        }
    }

    pub fn bool_or(&self, name: &str, default: bool) -> CoreResult<bool> {
        match self.fields.get(name) {
            None => Ok(default),
            Some(FieldValue::Bool(b)) => Ok(*b),
            Some(_) => Err(self.wrong(name, "boolean")),
        }
    }

    pub fn opt_f64(&self, name: &str) -> CoreResult<Option<f64>> {
        match self.fields.get(name) {
            None => Ok(None),
            Some(FieldValue::Float(v)) => Ok(Some(*v)),
            Some(FieldValue::Int(v)) => Ok(Some(*v as f64)),
            Some(_) => Err(self.wrong(name, "number")),
        }
    }

    pub fn time(&self, name: &str) -> CoreResult<NaiveDateTime> {
        match self.req(name)? {
            FieldValue::Time(t) => Ok(*t),
            _ => Err(self.wrong(name, "timestamp")),
        }
    }

    pub fn times(&self, name: &str) -> CoreResult<&[NaiveDateTime]> {
        match self.req(name)? {
            FieldValue::Times(ts) => Ok(ts),
            _ => Err(self.wrong(name, "timestamp list")),
        }
    }

    pub fn values(&self, name: &str) -> CoreResult<&[f64]> {
        match self.req(name)? {
            FieldValue::Values(vs) => Ok(vs),
            _ => Err(self.wrong(name, "number list")),
        }
    }

    pub fn strs(&self, name: &str) -> CoreResult<&[String]> {
        match self.req(name)? {
            FieldValue::Strs(ss) => Ok(ss),
            _ => Err(self.wrong(name, "string list")),
        }
    }

    /// `Direction` field: `In` maps to true, `Out` to false.
    pub fn is_ingoing(&self) -> CoreResult<bool> {
        match self.str(keys::DIRECTION)? {
            keys::DIRECTION_IN => Ok(true),
            keys::DIRECTION_OUT => Ok(false),
            _ => Err(self.wrong(keys::DIRECTION, "'In' or 'Out'")),
        }
    }

    /// `Bound` field: `Upper` maps to true, `Lower` to false.
    pub fn bound_is_upper(&self) -> CoreResult<bool> {
        match self.str(keys::BOUND)? {
            keys::BOUND_UPPER => Ok(true),
            keys::BOUND_LOWER => Ok(false),
            _ => Err(self.wrong(keys::BOUND, "'Upper' or 'Lower'")),
        }
    }

    /// Reference by `(WhichConcept, WhichInstance)` pair.
    pub fn target_ref(&self) -> CoreResult<Id> {
        Ok(Id::new(
            self.str(keys::WHICH_CONCEPT)?,
            self.str(keys::WHICH_INSTANCE)?,
        ))
    }

    /// Reference held in a field named after the target's concept.
    pub fn ref_id(&self, concept: &str) -> CoreResult<Id> {
        Ok(Id::new(concept, self.str(concept)?))
    }

    pub fn key(&self) -> &ElementKey {
        self.key
    }
}
