//! End-to-end scenarios: loading definitions from disk, merging groups,
//! and evaluating many variants in parallel.

use crate::test_helpers::abc;
use approx::assert_relative_eq;
use indexmap::IndexMap;
use paramset_rs::parameters::mangling::prefix_definitions;
use paramset_rs::parameters::ParameterSet;
use paramset_rs::utils::{evaluate_many, evaluate_scenarios};
use paramset_rs::{EvalConfig, GlobalContext, NonRealPolicy, ParamSetError};
use std::fs;

const PLANT: &str = r#"{
    "capacity_mw": {"amount": 500, "unit": "MW"},
    "load_factor": {"amount": 0.6},
    "hours": {"formula": "24 * days"},
    "energy_mwh": {"formula": "capacity_mw * load_factor * hours"},
    "emissions_t": {"formula": "energy_mwh * emission_factor"}
}"#;

fn plant_globals() -> GlobalContext {
    GlobalContext::new()
        .with("days", 365.0)
        .unwrap()
        .with("emission_factor", 0.4)
        .unwrap()
}

#[test]
fn test_load_from_disk_and_evaluate() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("plant.json");
    fs::write(&path, PLANT).unwrap();

    let mut set = ParameterSet::load_json(&path)
        .unwrap()
        .with_globals(plant_globals());
    let result = set.evaluate().unwrap();

    assert_eq!(result["hours"], 8760.0);
    assert_relative_eq!(result["energy_mwh"], 500.0 * 0.6 * 8760.0, epsilon = 1e-6);
    assert_relative_eq!(result["emissions_t"], 500.0 * 0.6 * 8760.0 * 0.4, epsilon = 1e-6);
    assert_eq!(
        set.order().unwrap(),
        ["capacity_mw", "load_factor", "hours", "energy_mwh", "emissions_t"]
    );

    let out = dir.path().join("saved.json");
    set.save_json(&out).unwrap();
    let reloaded = ParameterSet::load_json(&out).unwrap();
    assert_eq!(reloaded.definitions(), set.definitions());
}

#[test]
fn test_missing_globals_are_unknown_references() {
    let mut set = ParameterSet::from_json(PLANT).unwrap();
    match set.evaluate() {
        Err(ParamSetError::UnknownReference { parameter, name, .. }) => {
            assert_eq!(parameter, "hours");
            assert_eq!(name, "days");
        }
        other => panic!("Expected UnknownReference, got {:?}", other),
    }
}

#[test]
fn test_scenarios_in_parallel() {
    let base = ParameterSet::from_json(PLANT)
        .unwrap()
        .with_globals(plant_globals());

    let scenarios: Vec<IndexMap<String, f64>> = [0.2, 0.4, 0.6, 0.8]
        .iter()
        .map(|&lf| {
            let mut overrides = IndexMap::new();
            overrides.insert("load_factor".to_string(), lf);
            overrides
        })
        .collect();

    let results = evaluate_scenarios(&base, &scenarios);
    assert_eq!(results.len(), 4);
    for (result, lf) in results.iter().zip([0.2, 0.4, 0.6, 0.8]) {
        let result = result.as_ref().unwrap();
        assert_relative_eq!(result["energy_mwh"], 500.0 * lf * 8760.0, epsilon = 1e-6);
    }
}

#[test]
fn test_evaluate_many_isolates_failures() {
    let mut cyclic = ParameterSet::new();
    cyclic.add_formula("X", "Y + 1").unwrap();
    cyclic.add_formula("Y", "X + 1").unwrap();

    let mut non_real = ParameterSet::with_config(EvalConfig {
        non_real: NonRealPolicy::Propagate,
        ..EvalConfig::default()
    });
    non_real.add_formula("r", "sqrt(-4)").unwrap();

    let results = evaluate_many(&[abc(), cyclic, non_real]);
    assert_eq!(results[0].as_ref().unwrap()["C"], 10.0);
    assert!(matches!(
        results[1],
        Err(ParamSetError::CircularReference { .. })
    ));
    assert!(results[2].as_ref().unwrap()["r"].is_nan());
}

#[test]
fn test_merged_groups_evaluate_together() {
    let group = ParameterSet::from_json(
        r#"{"rate": {"amount": 2}, "total": {"formula": "rate * base"}}"#,
    )
    .unwrap()
    .definitions();

    let (north, _) = prefix_definitions(&group, "north").unwrap();
    let (mut south, _) = prefix_definitions(&group, "south").unwrap();
    if let Some(def) = south.get_mut("south__rate") {
        def.amount = Some(3.0);
    }

    let globals = GlobalContext::new().with("base", 10.0).unwrap();
    let mut merged = ParameterSet::from_definitions(north.into_iter().chain(south))
        .unwrap()
        .with_globals(globals);
    let result = merged.evaluate().unwrap();
    assert_eq!(result["north__total"], 20.0);
    assert_eq!(result["south__total"], 30.0);
}
