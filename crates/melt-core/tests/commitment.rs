//! Soft bounds and start-up costs on a one-area system.

use chrono::{Duration, NaiveDate, NaiveDateTime};
use melt_core::element::keys;
use melt_core::{
    concepts, resolve_elements, DataElement, ElementValue, FieldValue, ModelProblem,
    ResolverConfig,
};
use melt_solver::{DirectProblem, Problem};
use melt_time::{Horizon, ProbTime, SequentialHorizon};

fn dt(y: i32, m: u32, d: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, m, d)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
}

fn s(v: &str) -> FieldValue {
    FieldValue::Str(v.to_string())
}

fn f(v: f64) -> FieldValue {
    FieldValue::Float(v)
}

/// One balance, one plant, constant demand.
fn base_elements(demand: f64, plant_cap: f64, plant_cost: f64) -> Vec<DataElement> {
    vec![
        DataElement::new(
            concepts::HORIZON,
            "SequentialHorizon",
            "TwoDays",
            ElementValue::Horizon(Horizon::Sequential(
                SequentialHorizon::new(2, Duration::days(1)).unwrap(),
            )),
        ),
        DataElement::with_fields(
            concepts::COMMODITY,
            "BaseCommodity",
            "Power",
            [(keys::HORIZON, s("TwoDays"))],
        ),
        DataElement::with_fields(
            concepts::BALANCE,
            "BaseBalance",
            "Power",
            [(concepts::COMMODITY, s("Power"))],
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
                (keys::CONVERSION, f(1.0)),
                (keys::DIRECTION, s(keys::DIRECTION_IN)),
            ],
        ),
        DataElement::with_fields(
            concepts::CAPACITY,
            "PositiveCapacity",
            "Plant_cap",
            [
                (keys::WHICH_CONCEPT, s(concepts::FLOW)),
                (keys::WHICH_INSTANCE, s("Plant")),
                (keys::PARAM, f(plant_cap)),
                (keys::BOUND, s(keys::BOUND_UPPER)),
            ],
        ),
        DataElement::with_fields(
            concepts::COST,
            "CostTerm",
            "Plant_cost",
            [
                (keys::WHICH_CONCEPT, s(concepts::FLOW)),
                (keys::WHICH_INSTANCE, s("Plant")),
                (keys::PARAM, f(plant_cost)),
                (keys::DIRECTION, s(keys::DIRECTION_IN)),
            ],
        ),
        DataElement::with_fields(
            concepts::RHS_TERM,
            "BaseRHSTerm",
            "Demand",
            [
                (concepts::BALANCE, s("Power")),
                (keys::PARAM, f(demand)),
                (keys::DIRECTION, s(keys::DIRECTION_OUT)),
            ],
        ),
    ]
}

fn t0() -> ProbTime {
    ProbTime::two(dt(2021, 1, 1), dt(1981, 1, 1))
}

#[test]
fn test_soft_upper_bound_prices_the_breach() {
    let mut elements = base_elements(100.0, 200.0, 10.0);
    elements.push(DataElement::with_fields(
        concepts::SOFT_BOUND,
        "BaseSoftBound",
        "PlantSoftCap",
        [
            (keys::WHICH_CONCEPT, s(concepts::FLOW)),
            (keys::WHICH_INSTANCE, s("Plant")),
            (keys::SOFT_CAP, f(80.0)),
            (keys::PENALTY, f(5.0)),
            (keys::BOUND, s(keys::BOUND_UPPER)),
        ],
    ));
    let store = resolve_elements(&ResolverConfig::default(), &elements).unwrap();
    let mut problem = ModelProblem::new(DirectProblem::direct(), store).unwrap();
    problem.update(&t0()).unwrap();
    problem.solve().unwrap();

    // Production 100 breaches the 80 soft cap by 20 each period:
    // 2 * (100*10 + 20*5) = 2200
    let objective = problem.objective().unwrap();
    assert!((objective - 2200.0).abs() < 1e-3, "objective {objective}");
    let breach = problem
        .lp()
        .get_var_value("SoftBound.PlantSoftCap_breach", 0)
        .unwrap();
    assert!((breach - 20.0).abs() < 1e-4);
}

#[test]
fn test_start_up_cost_charges_started_capacity() {
    let mut elements = base_elements(80.0, 100.0, 10.0);
    elements.push(DataElement::with_fields(
        concepts::START_UP_COST,
        "SimpleStartUpCost",
        "Commit",
        [
            (concepts::FLOW, s("Plant")),
            (keys::START_COST, f(50.0)),
            (keys::MIN_STABLE_LOAD, f(0.5)),
        ],
    ));
    let store = resolve_elements(&ResolverConfig::default(), &elements).unwrap();
    let mut problem = ModelProblem::new(DirectProblem::direct(), store).unwrap();
    problem.update(&t0()).unwrap();

    // The plant starts cold
    problem
        .lp_mut()
        .fix("StartUpCost.Commit_online_start", 0, 0.0)
        .unwrap();
    problem.solve().unwrap();

    // Production 2 * 80 * 10 plus 80 units of capacity started once at 50
    let objective = problem.objective().unwrap();
    assert!((objective - 5600.0).abs() < 1e-2, "objective {objective}");

    let started_first = problem
        .lp()
        .get_var_value("StartUpCost.Commit_started", 0)
        .unwrap();
    let started_second = problem
        .lp()
        .get_var_value("StartUpCost.Commit_started", 1)
        .unwrap();
    assert!((started_first - 80.0).abs() < 1e-3);
    assert!(started_second.abs() < 1e-3);

    // The commitment state carries over
    let states = problem.state_variables();
    assert_eq!(states.len(), 1);
    assert_eq!(states[0].var_in.name, "StartUpCost.Commit_online_start");
}
