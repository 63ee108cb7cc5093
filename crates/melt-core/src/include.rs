//! Standard include functions: one per `(concept, type)` in the built-in
//! vocabulary.
//!
//! An include function parses its element's value, looks up the objects it
//! references, and either mutates the store or defers until the references
//! exist. References are namespaced: a `Param` field names a Param element,
//! `Level` / `Profile` fields name TimeVector elements, object fields name
//! top-level objects by their concept.

use crate::boundary::{SimpleSingleCuts, StartEqualStop};
use crate::element::{keys, ElementValue, FieldReader, FieldValue};
use crate::error::{CoreError, CoreResult};
use crate::id::{concepts, ElementKey, Id, TypeKey};
use crate::objects::{AggSupplyCurve, Balance, Flow, ModelObject, SoftBound, StartUpCost, Storage};
use crate::resolver::{IncludeOutcome, IncludeRegistry};
use crate::store::{Commodity, ModelStore};
use crate::traits::{Arrow, BaseArrow, Capacity, Conversion, Cost, Loss, Price, RhsTerm, SegmentedArrow};
use melt_time::{
    FossilMcParam, Horizon, InfiniteTimeVector, Interpolation, M3sToMm3SeriesParam,
    MwToGwhSeriesParam, Param, PrognosisSeriesParam, RotatingTimeVector, SequentialHorizon,
    TimeVector, UmmSeriesParam,
};
use chrono::Duration;

/// Register every built-in element type.
pub fn register_standard(registry: &mut IncludeRegistry) {
    let mut reg = |concept: &str, elem_type: &str, f: crate::resolver::IncludeFn| {
        registry.register(TypeKey::new(concept, elem_type), f);
    };
    reg(concepts::COMMODITY, "BaseCommodity", include_commodity);
    reg(concepts::HORIZON, "SequentialHorizon", include_sequential_horizon);
    reg(concepts::HORIZON, "AdaptiveHorizon", include_direct_horizon);
    reg(concepts::HORIZON, "ShrinkableHorizon", include_direct_horizon);
    reg(concepts::TIME_VECTOR, "ConstantTimeVector", include_constant_timevector);
    reg(concepts::TIME_VECTOR, "InfiniteTimeVector", include_infinite_timevector);
    reg(concepts::TIME_VECTOR, "RotatingTimeVector", include_rotating_timevector);
    reg(concepts::TIME_VECTOR, "ColumnTimeVector", include_column_timevector);
    reg(concepts::TABLE, "BaseTable", include_table);
    reg(concepts::PARAM, "ConstantParam", include_constant_param);
    reg(concepts::PARAM, "MWToGWhSeriesParam", include_mw_to_gwh_param);
    reg(concepts::PARAM, "M3SToMM3SeriesParam", include_m3s_to_mm3_param);
    reg(concepts::PARAM, "PrognosisSeriesParam", include_prognosis_param);
    reg(concepts::PARAM, "FossilMCParam", include_fossil_mc_param);
    reg(concepts::PARAM, "UMMSeriesParam", include_umm_param);
    reg(concepts::PRICE, "BasePrice", include_price);
    reg(concepts::BALANCE, "BaseBalance", include_base_balance);
    reg(concepts::BALANCE, "ExogenBalance", include_exogen_balance);
    reg(concepts::FLOW, "BaseFlow", include_base_flow);
    reg(concepts::ARROW, "BaseArrow", include_base_arrow);
    reg(concepts::ARROW, "SegmentedArrow", include_segmented_arrow);
    reg(concepts::STORAGE, "BaseStorage", include_base_storage);
    reg(concepts::CAPACITY, "PositiveCapacity", include_positive_capacity);
    reg(concepts::COST, "CostTerm", include_cost_term);
    reg(concepts::RHS_TERM, "BaseRHSTerm", include_rhs_term);
    reg(concepts::LOSS, "SimpleLoss", include_simple_loss);
    reg(concepts::BOUNDARY_CONDITION, "StartEqualStop", include_start_equal_stop);
    reg(concepts::BOUNDARY_CONDITION, "SimpleSingleCuts", include_single_cuts);
    reg(concepts::SOFT_BOUND, "BaseSoftBound", include_soft_bound);
    reg(concepts::START_UP_COST, "SimpleStartUpCost", include_start_up_cost);
    reg(concepts::AGG_SUPPLY_CURVE, "BaseAggSupplyCurve", include_agg_supply_curve);
}

/// A field-level reference that may not be loadable yet.
enum Ref<T> {
    Ready(T),
    Missing(Id),
}

macro_rules! try_ref {
    ($e:expr) => {
        match $e {
            Ref::Ready(value) => value,
            Ref::Missing(id) => return Ok(IncludeOutcome::missing(id)),
        }
    };
}

/// A `Param` field: a number literal or a reference to a Param element.
fn field_param(store: &ModelStore, r: &FieldReader, name: &str) -> CoreResult<Ref<Param>> {
    match r.get(name) {
        Some(FieldValue::Float(v)) => Ok(Ref::Ready(Param::constant(*v))),
        Some(FieldValue::Int(v)) => Ok(Ref::Ready(Param::constant(*v as f64))),
        Some(FieldValue::Str(s)) => {
            let id = Id::new(concepts::PARAM, s.clone());
            match store.lowlevel.params.get(&id) {
                Some(param) => Ok(Ref::Ready(param.clone())),
                None => Ok(Ref::Missing(id)),
            }
        }
        Some(_) => Err(CoreError::WrongFieldType {
            key: r.key().clone(),
            field: name.to_string(),
            expected: "number or Param reference",
        }),
        None => Err(CoreError::MissingField {
            key: r.key().clone(),
            field: name.to_string(),
        }),
    }
}

/// A `Level` / `Profile` style field: a number literal or a reference to a
/// TimeVector element.
fn field_timevector(store: &ModelStore, r: &FieldReader, name: &str) -> CoreResult<Ref<TimeVector>> {
    match r.get(name) {
        Some(FieldValue::Float(v)) => Ok(Ref::Ready(TimeVector::Constant(*v))),
        Some(FieldValue::Int(v)) => Ok(Ref::Ready(TimeVector::Constant(*v as f64))),
        Some(FieldValue::Str(s)) => {
            let id = Id::new(concepts::TIME_VECTOR, s.clone());
            match store.lowlevel.timevectors.get(&id) {
                Some(tv) => Ok(Ref::Ready(tv.clone())),
                None => Ok(Ref::Missing(id)),
            }
        }
        Some(_) => Err(CoreError::WrongFieldType {
            key: r.key().clone(),
            field: name.to_string(),
            expected: "number or TimeVector reference",
        }),
        None => Err(CoreError::MissingField {
            key: r.key().clone(),
            field: name.to_string(),
        }),
    }
}

fn interpolation(r: &FieldReader) -> CoreResult<Interpolation> {
    match r.get(keys::INTERPOLATION) {
        None => Ok(Interpolation::Step),
        Some(FieldValue::Str(s)) if s == "Step" => Ok(Interpolation::Step),
        Some(FieldValue::Str(s)) if s == "Linear" => Ok(Interpolation::Linear),
        Some(_) => Err(CoreError::WrongFieldType {
            key: r.key().clone(),
            field: keys::INTERPOLATION.to_string(),
            expected: "'Step' or 'Linear'",
        }),
    }
}

fn include_commodity(
    store: &mut ModelStore,
    key: &ElementKey,
    value: &ElementValue,
) -> CoreResult<IncludeOutcome> {
    let r = FieldReader::new(key, value)?;
    let horizon = r.ref_id(keys::HORIZON)?;
    if !store.lowlevel.horizons.contains_key(&horizon) {
        return Ok(IncludeOutcome::missing(horizon));
    }
    store.lowlevel.commodities.insert(
        key.id(),
        Commodity {
            id: key.id(),
            horizon,
        },
    );
    Ok(IncludeOutcome::Included)
}

fn include_sequential_horizon(
    store: &mut ModelStore,
    key: &ElementKey,
    value: &ElementValue,
) -> CoreResult<IncludeOutcome> {
    let horizon = match value {
        ElementValue::Horizon(h) => h.clone(),
        _ => {
            let r = FieldReader::new(key, value)?;
            let periods = r.usize(keys::NUM_PERIODS)?;
            let hours = r.f64(keys::PERIOD_HOURS)?;
            let duration = Duration::minutes((hours * 60.0).round() as i64);
            Horizon::Sequential(SequentialHorizon::new(periods, duration)?)
        }
    };
    store.lowlevel.horizons.insert(key.id(), horizon);
    Ok(IncludeOutcome::Included)
}

/// Adaptive and shrinkable horizons are authored as direct objects.
fn include_direct_horizon(
    store: &mut ModelStore,
    key: &ElementKey,
    value: &ElementValue,
) -> CoreResult<IncludeOutcome> {
    let ElementValue::Horizon(horizon) = value else {
        return Err(CoreError::WrongFieldType {
            key: key.clone(),
            field: "<value>".into(),
            expected: "direct horizon object",
        });
    };
    store.lowlevel.horizons.insert(key.id(), horizon.clone());
    Ok(IncludeOutcome::Included)
}

fn include_constant_timevector(
    store: &mut ModelStore,
    key: &ElementKey,
    value: &ElementValue,
) -> CoreResult<IncludeOutcome> {
    let tv = match value {
        ElementValue::TimeVector(tv) => tv.clone(),
        _ => {
            let r = FieldReader::new(key, value)?;
            TimeVector::Constant(r.f64(keys::VALUES)?)
        }
    };
    store.lowlevel.timevectors.insert(key.id(), tv);
    Ok(IncludeOutcome::Included)
}

fn include_infinite_timevector(
    store: &mut ModelStore,
    key: &ElementKey,
    value: &ElementValue,
) -> CoreResult<IncludeOutcome> {
    let tv = match value {
        ElementValue::TimeVector(tv) => tv.clone(),
        _ => {
            let r = FieldReader::new(key, value)?;
            TimeVector::Infinite(InfiniteTimeVector::new(
                r.times(keys::TIMES)?.to_vec(),
                r.values(keys::VALUES)?.to_vec(),
                interpolation(&r)?,
            )?)
        }
    };
    store.lowlevel.timevectors.insert(key.id(), tv);
    Ok(IncludeOutcome::Included)
}

fn include_rotating_timevector(
    store: &mut ModelStore,
    key: &ElementKey,
    value: &ElementValue,
) -> CoreResult<IncludeOutcome> {
    let tv = match value {
        ElementValue::TimeVector(tv) => tv.clone(),
        _ => {
            let r = FieldReader::new(key, value)?;
            TimeVector::Rotating(RotatingTimeVector::new(
                r.times(keys::TIMES)?.to_vec(),
                r.values(keys::VALUES)?.to_vec(),
                r.time(keys::START)?,
                r.time(keys::STOP)?,
            )?)
        }
    };
    store.lowlevel.timevectors.insert(key.id(), tv);
    Ok(IncludeOutcome::Included)
}

fn include_column_timevector(
    store: &mut ModelStore,
    key: &ElementKey,
    value: &ElementValue,
) -> CoreResult<IncludeOutcome> {
    let r = FieldReader::new(key, value)?;
    let table_id = r.ref_id(concepts::TABLE)?;
    let Some(table) = store.lowlevel.tables.get(&table_id) else {
        return Ok(IncludeOutcome::missing(table_id));
    };
    let column = table.column(r.str("Column")?)?;
    store
        .lowlevel
        .timevectors
        .insert(key.id(), TimeVector::Column(column));
    Ok(IncludeOutcome::Included)
}

fn include_table(
    store: &mut ModelStore,
    key: &ElementKey,
    value: &ElementValue,
) -> CoreResult<IncludeOutcome> {
    let ElementValue::Table(table) = value else {
        return Err(CoreError::WrongFieldType {
            key: key.clone(),
            field: "<value>".into(),
            expected: "direct profile table",
        });
    };
    store.lowlevel.tables.insert(key.id(), table.clone());
    Ok(IncludeOutcome::Included)
}

fn include_constant_param(
    store: &mut ModelStore,
    key: &ElementKey,
    value: &ElementValue,
) -> CoreResult<IncludeOutcome> {
    let param = match value {
        ElementValue::Param(p) => p.clone(),
        _ => {
            let r = FieldReader::new(key, value)?;
            Param::constant(r.f64(keys::VALUES)?)
        }
    };
    store.lowlevel.params.insert(key.id(), param);
    Ok(IncludeOutcome::Included)
}

fn include_level_profile_param(
    store: &mut ModelStore,
    key: &ElementKey,
    value: &ElementValue,
    make: fn(TimeVector, TimeVector) -> Param,
) -> CoreResult<IncludeOutcome> {
    if let ElementValue::Param(p) = value {
        store.lowlevel.params.insert(key.id(), p.clone());
        return Ok(IncludeOutcome::Included);
    }
    let r = FieldReader::new(key, value)?;
    let level = try_ref!(field_timevector(store, &r, keys::LEVEL)?);
    let profile = try_ref!(field_timevector(store, &r, keys::PROFILE)?);
    store.lowlevel.params.insert(key.id(), make(level, profile));
    Ok(IncludeOutcome::Included)
}

fn include_mw_to_gwh_param(
    store: &mut ModelStore,
    key: &ElementKey,
    value: &ElementValue,
) -> CoreResult<IncludeOutcome> {
    include_level_profile_param(store, key, value, |level, profile| {
        Param::MwToGwhSeries(MwToGwhSeriesParam { level, profile })
    })
}

fn include_m3s_to_mm3_param(
    store: &mut ModelStore,
    key: &ElementKey,
    value: &ElementValue,
) -> CoreResult<IncludeOutcome> {
    include_level_profile_param(store, key, value, |level, profile| {
        Param::M3sToMm3Series(M3sToMm3SeriesParam { level, profile })
    })
}

fn include_prognosis_param(
    store: &mut ModelStore,
    key: &ElementKey,
    value: &ElementValue,
) -> CoreResult<IncludeOutcome> {
    if let ElementValue::Param(p) = value {
        store.lowlevel.params.insert(key.id(), p.clone());
        return Ok(IncludeOutcome::Included);
    }
    let r = FieldReader::new(key, value)?;
    let level = try_ref!(field_timevector(store, &r, keys::LEVEL)?);
    let profile = try_ref!(field_timevector(store, &r, keys::PROFILE)?);
    let scale = r.opt_f64(keys::SCALE)?.unwrap_or(1.0);
    store.lowlevel.params.insert(
        key.id(),
        Param::PrognosisSeries(PrognosisSeriesParam {
            level,
            profile,
            scale,
        }),
    );
    Ok(IncludeOutcome::Included)
}

fn include_fossil_mc_param(
    store: &mut ModelStore,
    key: &ElementKey,
    value: &ElementValue,
) -> CoreResult<IncludeOutcome> {
    if let ElementValue::Param(p) = value {
        store.lowlevel.params.insert(key.id(), p.clone());
        return Ok(IncludeOutcome::Included);
    }
    let r = FieldReader::new(key, value)?;
    let fuel_level = try_ref!(field_timevector(store, &r, "FuelLevel")?);
    let fuel_profile = try_ref!(field_timevector(store, &r, "FuelProfile")?);
    let co2_level = try_ref!(field_timevector(store, &r, "CO2Level")?);
    let co2_profile = try_ref!(field_timevector(store, &r, "CO2Profile")?);
    let param = FossilMcParam {
        fuel_level,
        fuel_profile,
        co2_level,
        co2_profile,
        co2_factor: r.f64("CO2Factor")?,
        efficiency: r.f64("Efficiency")?,
        voc: r.f64("VOC")?,
    };
    param.validate()?;
    store.lowlevel.params.insert(key.id(), Param::FossilMc(param));
    Ok(IncludeOutcome::Included)
}

fn include_umm_param(
    store: &mut ModelStore,
    key: &ElementKey,
    value: &ElementValue,
) -> CoreResult<IncludeOutcome> {
    if let ElementValue::Param(p) = value {
        store.lowlevel.params.insert(key.id(), p.clone());
        return Ok(IncludeOutcome::Included);
    }
    let r = FieldReader::new(key, value)?;
    let umm = match try_ref!(field_timevector(store, &r, "Umm")?) {
        TimeVector::Infinite(v) => v,
        _ => {
            return Err(CoreError::WrongFieldType {
                key: key.clone(),
                field: "Umm".into(),
                expected: "reference to an InfiniteTimeVector",
            })
        }
    };
    let longterm = try_ref!(field_param(store, &r, "Longterm")?);
    store
        .lowlevel
        .params
        .insert(key.id(), Param::UmmSeries(UmmSeriesParam::new(umm, longterm)?));
    Ok(IncludeOutcome::Included)
}

fn include_price(
    store: &mut ModelStore,
    key: &ElementKey,
    value: &ElementValue,
) -> CoreResult<IncludeOutcome> {
    let r = FieldReader::new(key, value)?;
    let param = try_ref!(field_param(store, &r, keys::PARAM)?);
    store.lowlevel.prices.insert(key.id(), Price::new(param));
    Ok(IncludeOutcome::Included)
}

fn include_base_balance(
    store: &mut ModelStore,
    key: &ElementKey,
    value: &ElementValue,
) -> CoreResult<IncludeOutcome> {
    let r = FieldReader::new(key, value)?;
    let commodity = r.ref_id(concepts::COMMODITY)?;
    if !store.lowlevel.commodities.contains_key(&commodity) {
        return Ok(IncludeOutcome::missing(commodity));
    }
    insert_object(
        store,
        key,
        ModelObject::Balance(Balance::endogenous(key.id(), commodity)),
    )
}

fn include_exogen_balance(
    store: &mut ModelStore,
    key: &ElementKey,
    value: &ElementValue,
) -> CoreResult<IncludeOutcome> {
    let r = FieldReader::new(key, value)?;
    let commodity = r.ref_id(concepts::COMMODITY)?;
    if !store.lowlevel.commodities.contains_key(&commodity) {
        return Ok(IncludeOutcome::missing(commodity));
    }
    let price_id = r.ref_id(keys::PRICE)?;
    let Some(price) = store.lowlevel.prices.get(&price_id) else {
        return Ok(IncludeOutcome::missing(price_id));
    };
    let price = price.clone();
    insert_object(
        store,
        key,
        ModelObject::Balance(Balance::exogenous(key.id(), commodity, price)),
    )
}

fn include_base_flow(
    store: &mut ModelStore,
    key: &ElementKey,
    _value: &ElementValue,
) -> CoreResult<IncludeOutcome> {
    insert_object(store, key, ModelObject::Flow(Flow::new(key.id())))
}

fn include_base_arrow(
    store: &mut ModelStore,
    key: &ElementKey,
    value: &ElementValue,
) -> CoreResult<IncludeOutcome> {
    let r = FieldReader::new(key, value)?;
    let flow_id = r.ref_id(concepts::FLOW)?;
    let balance_id = r.ref_id(concepts::BALANCE)?;
    if store.object(&balance_id).is_none() {
        return Ok(IncludeOutcome::missing(balance_id));
    }
    if store.object(&flow_id).is_none() {
        return Ok(IncludeOutcome::missing(flow_id));
    }
    let conversion_param = try_ref!(field_param(store, &r, keys::CONVERSION)?);
    if conversion_param.is_durational() {
        // A conversion is a rate, not an integrated quantity
        return Err(CoreError::WrongFieldType {
            key: key.clone(),
            field: keys::CONVERSION.to_string(),
            expected: "an instantaneous parameter",
        });
    }
    let conversion = Conversion::new(conversion_param);
    let is_ingoing = r.is_ingoing()?;
    let arrow = Arrow::Base(BaseArrow::new(key.id(), balance_id, conversion, is_ingoing));
    let Some(flow) = store.object_mut(&flow_id).and_then(ModelObject::as_flow_mut) else {
        return Err(CoreError::InvariantViolation(format!(
            "arrow {} targets {}, which is not a flow",
            key, flow_id
        )));
    };
    flow.add_arrow(arrow);
    Ok(IncludeOutcome::Included)
}

fn include_segmented_arrow(
    store: &mut ModelStore,
    key: &ElementKey,
    value: &ElementValue,
) -> CoreResult<IncludeOutcome> {
    let r = FieldReader::new(key, value)?;
    let flow_id = r.ref_id(concepts::FLOW)?;
    let balance_id = r.ref_id(concepts::BALANCE)?;
    if store.object(&balance_id).is_none() {
        return Ok(IncludeOutcome::missing(balance_id));
    }
    if store.object(&flow_id).is_none() {
        return Ok(IncludeOutcome::missing(flow_id));
    }
    let capacities = r
        .values(keys::CAPACITIES)?
        .iter()
        .map(|v| Param::constant(*v))
        .collect();
    let conversions = r
        .values(keys::CONVERSIONS)?
        .iter()
        .map(|v| Param::constant(*v))
        .collect();
    let is_ingoing = r.is_ingoing()?;
    let arrow = Arrow::Segmented(SegmentedArrow::new(
        key.id(),
        balance_id,
        is_ingoing,
        capacities,
        conversions,
    )?);
    let Some(flow) = store.object_mut(&flow_id).and_then(ModelObject::as_flow_mut) else {
        return Err(CoreError::InvariantViolation(format!(
            "arrow {} targets {}, which is not a flow",
            key, flow_id
        )));
    };
    flow.add_arrow(arrow);
    Ok(IncludeOutcome::Included)
}

fn include_base_storage(
    store: &mut ModelStore,
    key: &ElementKey,
    value: &ElementValue,
) -> CoreResult<IncludeOutcome> {
    let r = FieldReader::new(key, value)?;
    let balance_id = r.ref_id(concepts::BALANCE)?;
    if store.object(&balance_id).is_none() {
        return Ok(IncludeOutcome::missing(balance_id));
    }
    insert_object(
        store,
        key,
        ModelObject::Storage(Storage::new(key.id(), balance_id)),
    )
}

fn include_positive_capacity(
    store: &mut ModelStore,
    key: &ElementKey,
    value: &ElementValue,
) -> CoreResult<IncludeOutcome> {
    let r = FieldReader::new(key, value)?;
    let target = r.target_ref()?;
    if store.object(&target).is_none() {
        return Ok(IncludeOutcome::missing(target));
    }
    let param = try_ref!(field_param(store, &r, keys::PARAM)?);
    let capacity = Capacity::new(param, r.bound_is_upper()?);
    match store.object_mut(&target) {
        Some(ModelObject::Flow(flow)) => flow.set_capacity(capacity),
        Some(ModelObject::Storage(storage)) => storage.set_capacity(capacity),
        _ => {
            return Err(CoreError::InvariantViolation(format!(
                "capacity {} targets {}, which takes no bounds",
                key, target
            )))
        }
    }
    Ok(IncludeOutcome::Included)
}

fn include_cost_term(
    store: &mut ModelStore,
    key: &ElementKey,
    value: &ElementValue,
) -> CoreResult<IncludeOutcome> {
    let r = FieldReader::new(key, value)?;
    let target = r.target_ref()?;
    if store.object(&target).is_none() {
        return Ok(IncludeOutcome::missing(target));
    }
    let param = try_ref!(field_param(store, &r, keys::PARAM)?);
    let is_cost = if r.has(keys::DIRECTION) {
        r.is_ingoing()?
    } else {
        true
    };
    let cost = Cost::new(param, is_cost);
    match store.object_mut(&target) {
        Some(ModelObject::Flow(flow)) => flow.add_cost(cost),
        Some(ModelObject::Storage(storage)) => storage.add_cost(cost),
        _ => {
            return Err(CoreError::InvariantViolation(format!(
                "cost term {} targets {}, which takes no costs",
                key, target
            )))
        }
    }
    Ok(IncludeOutcome::Included)
}

fn include_rhs_term(
    store: &mut ModelStore,
    key: &ElementKey,
    value: &ElementValue,
) -> CoreResult<IncludeOutcome> {
    let r = FieldReader::new(key, value)?;
    let balance_id = r.ref_id(concepts::BALANCE)?;
    if store.object(&balance_id).is_none() {
        return Ok(IncludeOutcome::missing(balance_id));
    }
    let param = try_ref!(field_param(store, &r, keys::PARAM)?);
    let term = RhsTerm::new(key.id(), param, r.is_ingoing()?)
        .with_residual_hint(r.bool_or(keys::RESIDUAL_HINT, false)?);
    let Some(balance) = store
        .object_mut(&balance_id)
        .and_then(ModelObject::as_balance_mut)
    else {
        return Err(CoreError::InvariantViolation(format!(
            "RHS term {} targets {}, which is not a balance",
            key, balance_id
        )));
    };
    balance.add_rhs_term(term)?;
    Ok(IncludeOutcome::Included)
}

fn include_simple_loss(
    store: &mut ModelStore,
    key: &ElementKey,
    value: &ElementValue,
) -> CoreResult<IncludeOutcome> {
    let r = FieldReader::new(key, value)?;
    let target = r.target_ref()?;
    let loss = Loss::new(Param::constant(r.f64(keys::LOSS_FACTOR)?));
    match target.concept.as_str() {
        concepts::STORAGE => {
            let Some(storage) = store
                .object_mut(&target)
                .and_then(ModelObject::as_storage_mut)
            else {
                return Ok(IncludeOutcome::missing(target));
            };
            storage.set_loss(loss);
            Ok(IncludeOutcome::Included)
        }
        concepts::ARROW => {
            // Arrows live inside their flows; scan for the owner
            let owner = store.objects.iter().find_map(|(id, object)| {
                object
                    .as_flow()
                    .filter(|flow| flow.arrows().iter().any(|a| a.id() == &target))
                    .map(|_| id.clone())
            });
            let Some(owner) = owner else {
                return Ok(IncludeOutcome::missing(target));
            };
            let arrow = store
                .object_mut(&owner)
                .and_then(ModelObject::as_flow_mut)
                .and_then(|flow| flow.arrow_mut(&target))
                .expect("owner scan found the arrow");
            arrow.set_loss(loss)?;
            Ok(IncludeOutcome::Included)
        }
        _ => Err(CoreError::WrongFieldType {
            key: key.clone(),
            field: keys::WHICH_CONCEPT.to_string(),
            expected: "'Arrow' or 'Storage'",
        }),
    }
}

fn include_start_equal_stop(
    store: &mut ModelStore,
    key: &ElementKey,
    value: &ElementValue,
) -> CoreResult<IncludeOutcome> {
    let r = FieldReader::new(key, value)?;
    let target = r.target_ref()?;
    if store.object(&target).is_none() {
        return Ok(IncludeOutcome::missing(target));
    }
    insert_object(
        store,
        key,
        ModelObject::StartEqualStop(StartEqualStop::new(key.id(), target)),
    )
}

fn include_single_cuts(
    store: &mut ModelStore,
    key: &ElementKey,
    value: &ElementValue,
) -> CoreResult<IncludeOutcome> {
    let r = FieldReader::new(key, value)?;
    let mut objects = Vec::new();
    for name in r.strs(keys::OBJECTS)? {
        let Some((concept, instance)) = name.split_once('.') else {
            return Err(CoreError::WrongFieldType {
                key: key.clone(),
                field: keys::OBJECTS.to_string(),
                expected: "'Concept.Instance' entries",
            });
        };
        let id = Id::new(concept, instance);
        if store.object(&id).is_none() {
            return Ok(IncludeOutcome::missing(id));
        }
        objects.push(id);
    }
    let probabilities = r.values(keys::PROBABILITIES)?.to_vec();
    let max_cuts = r.usize(keys::MAX_CUTS)?;
    insert_object(
        store,
        key,
        ModelObject::SingleCuts(SimpleSingleCuts::new(
            key.id(),
            objects,
            probabilities,
            max_cuts,
        )),
    )
}

fn include_soft_bound(
    store: &mut ModelStore,
    key: &ElementKey,
    value: &ElementValue,
) -> CoreResult<IncludeOutcome> {
    let r = FieldReader::new(key, value)?;
    let target = r.target_ref()?;
    if store.object(&target).is_none() {
        return Ok(IncludeOutcome::missing(target));
    }
    let soft_cap = try_ref!(field_param(store, &r, keys::SOFT_CAP)?);
    let penalty = try_ref!(field_param(store, &r, keys::PENALTY)?);
    insert_object(
        store,
        key,
        ModelObject::SoftBound(SoftBound::new(
            key.id(),
            target,
            r.bound_is_upper()?,
            soft_cap,
            penalty,
        )),
    )
}

fn include_start_up_cost(
    store: &mut ModelStore,
    key: &ElementKey,
    value: &ElementValue,
) -> CoreResult<IncludeOutcome> {
    let r = FieldReader::new(key, value)?;
    let flow_id = r.ref_id(concepts::FLOW)?;
    if store.object(&flow_id).is_none() {
        return Ok(IncludeOutcome::missing(flow_id));
    }
    let start_cost = try_ref!(field_param(store, &r, keys::START_COST)?);
    let min_stable_load = r.f64(keys::MIN_STABLE_LOAD)?;
    insert_object(
        store,
        key,
        ModelObject::StartUpCost(StartUpCost::new(
            key.id(),
            flow_id,
            start_cost,
            min_stable_load,
        )?),
    )
}

fn include_agg_supply_curve(
    store: &mut ModelStore,
    key: &ElementKey,
    value: &ElementValue,
) -> CoreResult<IncludeOutcome> {
    let r = FieldReader::new(key, value)?;
    let balance_id = r.ref_id(concepts::BALANCE)?;
    if store.object(&balance_id).is_none() {
        return Ok(IncludeOutcome::missing(balance_id));
    }
    insert_object(
        store,
        key,
        ModelObject::AggSupplyCurve(AggSupplyCurve::new(
            key.id(),
            balance_id,
            r.usize(keys::NUM_CLUSTERS)?,
            r.values(keys::COSTS)?.to_vec(),
            r.values(keys::CAPACITIES)?.to_vec(),
        )?),
    )
}

fn insert_object(
    store: &mut ModelStore,
    key: &ElementKey,
    object: ModelObject,
) -> CoreResult<IncludeOutcome> {
    let id = key.id();
    if store.objects.contains_key(&id) {
        return Err(CoreError::InvariantViolation(format!(
            "object id {id} created twice (element {key})"
        )));
    }
    store.objects.insert(id, object);
    Ok(IncludeOutcome::Included)
}
