//! Two-area deterministic power market, end to end: resolve elements, build
//! the LP on both adapters, update, solve, and check the optimum by hand.
//!
//! Area A (demand 100/day) is served by a hydro reservoir (inflow 10/day,
//! energy equivalent 1.2, release cap 40), an import line from area B
//! (cap 50, efficiency 0.97) and its own thermal plant (cap 80 at 50/unit).
//! Area B (demand 60/day) has a cheap thermal plant (cap 100 at 10/unit).
//! Start-equal-stop on the reservoir forces total release = total inflow.
//!
//! Optimal dispatch per period: import 40 (limited by B's plant), hydro
//! 10 releases worth 12, thermal A covers the rest. Objective:
//!   B production 2 * (60 + 40) * 10          = 2000
//!   A production (200 - 2*38.8 - 24) * 50    = 4920
//!   total                                      6920

use chrono::{Duration, NaiveDate, NaiveDateTime};
use melt_core::element::keys;
use melt_core::{
    concepts, get_cut_parameters, get_outgoing_states, resolve_elements, set_ingoing_states,
    DataElement, ElementValue, FieldValue, ModelProblem, ResolverConfig,
};
use melt_solver::{DirectProblem, ModelledProblem, Problem};
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

fn flow(instance: &str) -> DataElement {
    DataElement::with_fields(
        concepts::FLOW,
        "BaseFlow",
        instance,
        Vec::<(String, FieldValue)>::new(),
    )
}

fn arrow(instance: &str, flow: &str, balance: &str, conversion: f64, dir: &str) -> DataElement {
    DataElement::with_fields(
        concepts::ARROW,
        "BaseArrow",
        instance,
        [
            (concepts::FLOW, s(flow)),
            (concepts::BALANCE, s(balance)),
            (keys::CONVERSION, f(conversion)),
            (keys::DIRECTION, s(dir)),
        ],
    )
}

fn capacity(instance: &str, concept: &str, target: &str, value: f64) -> DataElement {
    DataElement::with_fields(
        concepts::CAPACITY,
        "PositiveCapacity",
        instance,
        [
            (keys::WHICH_CONCEPT, s(concept)),
            (keys::WHICH_INSTANCE, s(target)),
            (keys::PARAM, f(value)),
            (keys::BOUND, s(keys::BOUND_UPPER)),
        ],
    )
}

fn cost(instance: &str, target: &str, value: f64) -> DataElement {
    DataElement::with_fields(
        concepts::COST,
        "CostTerm",
        instance,
        [
            (keys::WHICH_CONCEPT, s(concepts::FLOW)),
            (keys::WHICH_INSTANCE, s(target)),
            (keys::PARAM, f(value)),
            (keys::DIRECTION, s(keys::DIRECTION_IN)),
        ],
    )
}

/// The dataset, deliberately shuffled so nearly every element defers at
/// least once.
fn elements() -> Vec<DataElement> {
    vec![
        // Arrows and traits first: all of them reference later elements
        arrow("ThermalA_out", "ThermalA", "PowerA", 1.0, keys::DIRECTION_IN),
        arrow("ThermalB_out", "ThermalB", "PowerB", 1.0, keys::DIRECTION_IN),
        arrow("LineBA_draw", "LineBA", "PowerB", 1.0, keys::DIRECTION_OUT),
        arrow("LineBA_feed", "LineBA", "PowerA", 0.97, keys::DIRECTION_IN),
        arrow("Release_draw", "Release", "Hydro", 1.0, keys::DIRECTION_OUT),
        arrow("Release_feed", "Release", "PowerA", 1.2, keys::DIRECTION_IN),
        cost("ThermalA_cost", "ThermalA", 50.0),
        cost("ThermalB_cost", "ThermalB", 10.0),
        capacity("ThermalA_cap", concepts::FLOW, "ThermalA", 80.0),
        capacity("ThermalB_cap", concepts::FLOW, "ThermalB", 100.0),
        capacity("LineBA_cap", concepts::FLOW, "LineBA", 50.0),
        capacity("Release_cap", concepts::FLOW, "Release", 40.0),
        capacity("Res_cap", concepts::STORAGE, "Res", 1000.0),
        DataElement::with_fields(
            concepts::RHS_TERM,
            "BaseRHSTerm",
            "DemandA",
            [
                (concepts::BALANCE, s("PowerA")),
                (keys::PARAM, f(100.0)),
                (keys::DIRECTION, s(keys::DIRECTION_OUT)),
            ],
        ),
        DataElement::with_fields(
            concepts::RHS_TERM,
            "BaseRHSTerm",
            "DemandB",
            [
                (concepts::BALANCE, s("PowerB")),
                (keys::PARAM, f(60.0)),
                (keys::DIRECTION, s(keys::DIRECTION_OUT)),
            ],
        ),
        DataElement::with_fields(
            concepts::RHS_TERM,
            "BaseRHSTerm",
            "Inflow",
            [
                (concepts::BALANCE, s("Hydro")),
                (keys::PARAM, f(10.0)),
                (keys::DIRECTION, s(keys::DIRECTION_IN)),
            ],
        ),
        DataElement::with_fields(
            concepts::BOUNDARY_CONDITION,
            "StartEqualStop",
            "ResBC",
            [
                (keys::WHICH_CONCEPT, s(concepts::STORAGE)),
                (keys::WHICH_INSTANCE, s("Res")),
            ],
        ),
        // Objects
        DataElement::with_fields(
            concepts::STORAGE,
            "BaseStorage",
            "Res",
            [(concepts::BALANCE, s("Hydro"))],
        ),
        flow("ThermalA"),
        flow("ThermalB"),
        flow("LineBA"),
        flow("Release"),
        DataElement::with_fields(
            concepts::BALANCE,
            "BaseBalance",
            "PowerA",
            [(concepts::COMMODITY, s("Power"))],
        ),
        DataElement::with_fields(
            concepts::BALANCE,
            "BaseBalance",
            "PowerB",
            [(concepts::COMMODITY, s("Power"))],
        ),
        DataElement::with_fields(
            concepts::BALANCE,
            "BaseBalance",
            "Hydro",
            [(concepts::COMMODITY, s("Water"))],
        ),
        DataElement::with_fields(
            concepts::COMMODITY,
            "BaseCommodity",
            "Power",
            [(keys::HORIZON, s("TwoDays"))],
        ),
        DataElement::with_fields(
            concepts::COMMODITY,
            "BaseCommodity",
            "Water",
            [(keys::HORIZON, s("TwoDays"))],
        ),
        DataElement::new(
            concepts::HORIZON,
            "SequentialHorizon",
            "TwoDays",
            ElementValue::Horizon(Horizon::Sequential(
                SequentialHorizon::new(2, Duration::days(1)).unwrap(),
            )),
        ),
    ]
}

fn problem_time() -> ProbTime {
    ProbTime::two(dt(2021, 1, 1), dt(1981, 1, 1))
}

#[test]
fn test_resolution_is_reproducible() {
    let a = resolve_elements(&ResolverConfig::default(), &elements()).unwrap();
    let b = resolve_elements(&ResolverConfig::default(), &elements()).unwrap();
    assert_eq!(a, b);
    assert_eq!(a.objects.len(), 9);
}

#[test]
fn test_two_area_optimum_on_direct_adapter() {
    let store = resolve_elements(&ResolverConfig::default(), &elements()).unwrap();
    let mut problem = ModelProblem::new(DirectProblem::direct(), store).unwrap();
    problem.update(&problem_time()).unwrap();
    problem.solve().unwrap();

    let objective = problem.objective().unwrap();
    assert!(
        (objective - 6920.0).abs() < 1e-3,
        "objective {objective} != 6920"
    );

    // Start-equal-stop conserves water: total release equals total inflow
    let lp = problem.lp();
    let release: f64 =
        lp.get_var_value("Flow.Release", 0).unwrap() + lp.get_var_value("Flow.Release", 1).unwrap();
    assert!((release - 20.0).abs() < 1e-4);

    // The import line runs at B's spare capacity
    assert!((lp.get_var_value("Flow.LineBA", 0).unwrap() - 40.0).abs() < 1e-4);

    // Marginal unit in A is thermal at 50. The row stores demand negated,
    // so the shadow price of the stored RHS is -50.
    let dual = lp.get_con_dual("Balance.PowerA", 0).unwrap();
    assert!((dual + 50.0).abs() < 1e-3, "dual {dual}");
}

#[test]
fn test_adapters_agree_on_objective() {
    let store = resolve_elements(&ResolverConfig::default(), &elements()).unwrap();
    let mut direct = ModelProblem::new(DirectProblem::direct(), store).unwrap();
    direct.update(&problem_time()).unwrap();
    direct.solve().unwrap();

    let store = resolve_elements(&ResolverConfig::default(), &elements()).unwrap();
    let mut modelled = ModelProblem::new(ModelledProblem::modelled(), store).unwrap();
    modelled.update(&problem_time()).unwrap();
    modelled.solve().unwrap();

    let a = direct.objective().unwrap();
    let b = modelled.objective().unwrap();
    assert!((a - b).abs() / a.abs() < 1e-6, "{a} vs {b}");
}

#[test]
fn test_repeated_update_is_idempotent() {
    let store = resolve_elements(&ResolverConfig::default(), &elements()).unwrap();
    let mut problem = ModelProblem::new(DirectProblem::direct(), store).unwrap();
    let t = problem_time();
    problem.update(&t).unwrap();
    problem.solve().unwrap();
    let first = problem.objective().unwrap();

    problem.update(&t).unwrap();
    problem.solve().unwrap();
    let second = problem.objective().unwrap();
    assert!((first - second).abs() < 1e-6);
}

#[test]
fn test_exogenous_balance_turns_arrows_into_income() {
    // One endogenous area exporting into a fixed-price neighbour: the
    // arrow into the exogenous balance becomes an income term on the flow
    let elements = vec![
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
            concepts::PRICE,
            "BasePrice",
            "SpotGER",
            [(keys::PARAM, f(45.0))],
        ),
        DataElement::with_fields(
            concepts::BALANCE,
            "BaseBalance",
            "PowerA",
            [(concepts::COMMODITY, s("Power"))],
        ),
        DataElement::with_fields(
            concepts::BALANCE,
            "ExogenBalance",
            "GER",
            [(concepts::COMMODITY, s("Power")), (keys::PRICE, s("SpotGER"))],
        ),
        DataElement::with_fields(
            concepts::RHS_TERM,
            "BaseRHSTerm",
            "DemandA",
            [
                (concepts::BALANCE, s("PowerA")),
                (keys::PARAM, f(50.0)),
                (keys::DIRECTION, s(keys::DIRECTION_OUT)),
            ],
        ),
        flow("Plant"),
        flow("Export"),
        arrow("Plant_out", "Plant", "PowerA", 1.0, keys::DIRECTION_IN),
        arrow("Export_draw", "Export", "PowerA", 1.0, keys::DIRECTION_OUT),
        arrow("Export_feed", "Export", "GER", 1.0, keys::DIRECTION_IN),
        cost("Plant_cost", "Plant", 30.0),
        capacity("Plant_cap", concepts::FLOW, "Plant", 100.0),
        capacity("Export_cap", concepts::FLOW, "Export", 20.0),
    ];
    let store = resolve_elements(&ResolverConfig::default(), &elements).unwrap();
    let mut problem = ModelProblem::new(DirectProblem::direct(), store).unwrap();
    problem.update(&problem_time()).unwrap();
    problem.solve().unwrap();

    // Export runs at its cap: income 45 beats production cost 30.
    // Per period: 30 * (50 + 20) - 45 * 20 = 1200
    let objective = problem.objective().unwrap();
    assert!((objective - 2400.0).abs() < 1e-3, "objective {objective}");
    assert!(
        (problem.lp().get_var_value("Flow.Export", 0).unwrap() - 20.0).abs() < 1e-4
    );
}

#[test]
fn test_state_roundtrip_and_cut_parameters() {
    let store = resolve_elements(&ResolverConfig::default(), &elements()).unwrap();
    let mut problem = ModelProblem::new(DirectProblem::direct(), store).unwrap();
    problem.update(&problem_time()).unwrap();
    problem.solve().unwrap();

    let states = problem.state_variables();
    assert_eq!(states.len(), 1);
    let outgoing = get_outgoing_states(problem.lp(), &states).unwrap();
    assert_eq!(outgoing.len(), 1);

    // Pin the reservoir's ingoing level and re-solve
    let ingoing: std::collections::HashMap<_, _> =
        states.iter().map(|s| (s.clone(), 5.0)).collect();
    set_ingoing_states(problem.lp_mut(), &ingoing).unwrap();
    problem.solve().unwrap();

    let cut = get_cut_parameters(problem.lp(), &states, &ingoing).unwrap();
    assert!(cut.constant.is_finite());
    assert_eq!(cut.slopes.len(), 1);
}
