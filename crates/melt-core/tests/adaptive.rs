//! A balance living on an adaptive horizon: demand drives the clustering
//! through its residual hint, and total cost is invariant to the blocking.

use chrono::{Duration, NaiveDate, NaiveDateTime};
use melt_core::element::keys;
use melt_core::{
    concepts, resolve_elements, DataElement, ElementValue, FieldValue, ModelProblem,
    ResolverConfig,
};
use melt_solver::DirectProblem;
use melt_time::{
    AdaptiveHorizon, ClusterMethod, Horizon, ProbTime, SequentialHorizon,
};

fn dt(y: i32, m: u32, d: u32, h: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, m, d)
        .unwrap()
        .and_hms_opt(h, 0, 0)
        .unwrap()
}

fn s(v: &str) -> FieldValue {
    FieldValue::Str(v.to_string())
}

fn elements() -> Vec<DataElement> {
    let adaptive = AdaptiveHorizon::new(
        SequentialHorizon::new(1, Duration::days(1)).unwrap(),
        2,
        Duration::hours(1),
        ClusterMethod::KMeans { seed: 11 },
    )
    .unwrap();
    vec![
        DataElement::new(
            concepts::HORIZON,
            "AdaptiveHorizon",
            "Blocks",
            ElementValue::Horizon(Horizon::Adaptive(adaptive)),
        ),
        DataElement::with_fields(
            concepts::COMMODITY,
            "BaseCommodity",
            "Power",
            [(keys::HORIZON, s("Blocks"))],
        ),
        DataElement::with_fields(
            concepts::BALANCE,
            "BaseBalance",
            "Power",
            [(concepts::COMMODITY, s("Power"))],
        ),
        DataElement::with_fields(
            concepts::TIME_VECTOR,
            "InfiniteTimeVector",
            "DemandProfile",
            [
                (
                    keys::TIMES,
                    FieldValue::Times(vec![dt(1981, 1, 1, 0), dt(1981, 1, 1, 12)]),
                ),
                (keys::VALUES, FieldValue::Values(vec![0.5, 1.0])),
                (keys::INTERPOLATION, s("Step")),
            ],
        ),
        DataElement::with_fields(
            concepts::PARAM,
            "MWToGWhSeriesParam",
            "DemandParam",
            [
                (keys::LEVEL, FieldValue::Float(1000.0)),
                (keys::PROFILE, s("DemandProfile")),
            ],
        ),
        DataElement::with_fields(
            concepts::RHS_TERM,
            "BaseRHSTerm",
            "Demand",
            [
                (concepts::BALANCE, s("Power")),
                (keys::PARAM, s("DemandParam")),
                (keys::DIRECTION, s(keys::DIRECTION_OUT)),
                (keys::RESIDUAL_HINT, FieldValue::Bool(true)),
            ],
        ),
        DataElement::with_fields(
            concepts::FLOW,
            "BaseFlow",
            "Plant",
            Vec::<(String, FieldValue)>::new(),
        ),
        DataElement::with_fields(
            concepts::ARROW,
            "BaseArrow",
            "Plant_out",
            [
                (concepts::FLOW, s("Plant")),
                (concepts::BALANCE, s("Power")),
                (keys::CONVERSION, FieldValue::Float(1.0)),
                (keys::DIRECTION, s(keys::DIRECTION_IN)),
            ],
        ),
        DataElement::with_fields(
            concepts::COST,
            "CostTerm",
            "Plant_cost",
            [
                (keys::WHICH_CONCEPT, s(concepts::FLOW)),
                (keys::WHICH_INSTANCE, s("Plant")),
                (keys::PARAM, FieldValue::Float(10.0)),
                (keys::DIRECTION, s(keys::DIRECTION_IN)),
            ],
        ),
    ]
}

#[test]
fn test_adaptive_balance_costs_total_energy() {
    let store = resolve_elements(&ResolverConfig::default(), &elements()).unwrap();
    let mut problem = ModelProblem::new(DirectProblem::direct(), store).unwrap();
    let t = ProbTime::two(dt(2021, 1, 1, 0), dt(1981, 1, 1, 0));
    problem.update(&t).unwrap();
    problem.solve().unwrap();

    // Demand is 1000 MW at half load for 12 h and full load for 12 h:
    // 18 GWh at cost 10 regardless of how the units are blocked
    let objective = problem.objective().unwrap();
    assert!((objective - 180.0).abs() < 1e-4, "objective {objective}");

    // The clustered blocks still partition the day
    let hid = melt_core::Id::new(concepts::HORIZON, "Blocks");
    let horizon = problem.horizon(&hid).unwrap();
    let total: i64 = (0..horizon.num_periods())
        .map(|ix| horizon.period_delta(ix).total().num_hours())
        .sum();
    assert_eq!(total, 24);

    // Re-updating at the same time leaves the optimum untouched
    problem.update(&t).unwrap();
    problem.solve().unwrap();
    assert!((problem.objective().unwrap() - 180.0).abs() < 1e-4);
}
