//! Tests for the ParameterSet lifecycle: ordering, evaluation and re-entry

use crate::test_helpers::{abc, set_of};
use paramset_rs::config::EvalConfig;
use paramset_rs::error::ParamSetError;
use paramset_rs::parameters::{GlobalContext, ParameterDefinition, ParameterSet, SetState};

#[test]
fn test_basic_chain() {
    let mut set = abc();
    let result = set.evaluate().unwrap();
    assert_eq!(result.len(), 3);
    assert_eq!(result["A"], 42.0);
    assert_eq!(result["B"], 100.0);
    assert_eq!(result["C"], 10.0);
}

#[test]
fn test_empty_set() {
    let mut set = ParameterSet::new();
    assert!(set.order().unwrap().is_empty());
    assert!(set.evaluate().unwrap().is_empty());
    assert_eq!(set.state(), SetState::Evaluated);
}

#[test]
fn test_mutual_cycle() {
    let mut set = set_of(&[("X", "Y+1"), ("Y", "X+1")]);
    match set.evaluate() {
        Err(ParamSetError::CircularReference { members }) => {
            assert_eq!(members, vec!["X", "Y"]);
        }
        other => panic!("Expected CircularReference, got {:?}", other),
    }
    let message = set.evaluate().unwrap_err().to_string();
    assert!(message.contains("X") && message.contains("Y"));
}

#[test]
fn test_division_by_zero() {
    let mut set = set_of(&[("A", "1/0")]);
    match set.evaluate() {
        Err(ParamSetError::DivisionByZero { parameter }) => assert_eq!(parameter, "A"),
        other => panic!("Expected DivisionByZero, got {:?}", other),
    }
}

#[test]
fn test_unknown_reference() {
    let mut set = set_of(&[("A", "1"), ("B", "A + missing")]);
    match set.evaluate() {
        Err(ParamSetError::UnknownReference {
            parameter, name, ..
        }) => {
            assert_eq!(parameter, "B");
            assert_eq!(name, "missing");
        }
        other => panic!("Expected UnknownReference, got {:?}", other),
    }
    assert_eq!(set.state(), SetState::Unvalidated);

    // Case mismatches come with a suggestion
    let mut set = set_of(&[("Amount", "1"), ("B", "AMOUNT + 1")]);
    let message = set.evaluate().unwrap_err().to_string();
    assert!(message.contains("did you mean 'Amount'?"), "{}", message);
}

#[test]
fn test_unknown_function_is_unknown_reference() {
    let mut set = set_of(&[("A", "__import__(1)")]);
    assert!(matches!(
        set.evaluate(),
        Err(ParamSetError::UnknownReference { .. })
    ));
}

#[test]
fn test_idempotence() {
    let mut set = set_of(&[
        ("a", "0.1"),
        ("b", "a * 3 + sin(a)"),
        ("c", "exp(b) / (1 + b ^ 2)"),
    ]);
    let first = set.evaluate().unwrap();
    let second = set.evaluate().unwrap();
    for (name, value) in first.iter() {
        assert_eq!(value.to_bits(), second[name].to_bits());
    }

    // Recomputing from scratch gives the same bits too
    set.set_config(EvalConfig::default());
    let third = set.evaluate().unwrap();
    assert_eq!(first, third);
    assert_eq!(set.resolve().unwrap(), first);
}

#[test]
fn test_resolve_does_not_change_state() {
    let set = abc();
    let result = set.resolve().unwrap();
    assert_eq!(result["C"], 10.0);
    assert_eq!(set.state(), SetState::Unvalidated);
}

#[test]
fn test_mutation_resets_state() {
    let mut set = abc();
    set.evaluate().unwrap();

    set.add_formula("D", "C * 2").unwrap();
    assert_eq!(set.state(), SetState::Unvalidated);
    assert_eq!(set.evaluate().unwrap()["D"], 20.0);

    set.set_formula("A", "8").unwrap();
    let result = set.evaluate().unwrap();
    assert_eq!(result["B"], 32.0);

    set.remove("B");
    assert!(matches!(
        set.evaluate(),
        Err(ParamSetError::UnknownReference { .. })
    ));
}

#[test]
fn test_from_definitions_rejects_bad_input() {
    let both = ParameterDefinition {
        amount: Some(1.0),
        formula: Some("1".to_string()),
        ..Default::default()
    };
    assert!(matches!(
        ParameterSet::from_definitions(vec![("A", both)]),
        Err(ParamSetError::InvalidDefinition { .. })
    ));

    assert!(matches!(
        ParameterSet::from_definitions(vec![
            ("A", ParameterDefinition::amount(1.0)),
            ("A", ParameterDefinition::amount(2.0)),
        ]),
        Err(ParamSetError::InvalidDefinition { .. })
    ));

    assert!(matches!(
        ParameterSet::from_definitions(vec![("A", ParameterDefinition::formula("2 +* 3"))]),
        Err(ParamSetError::ParseError { .. })
    ));
}

#[test]
fn test_globals() {
    let globals = GlobalContext::new()
        .with("gravity", 9.81)
        .unwrap()
        .with("mass", 1.0)
        .unwrap();
    let mut set = set_of(&[("mass", "2"), ("weight", "mass * gravity")])
        .with_globals(globals);

    let result = set.evaluate().unwrap();
    assert_eq!(result["weight"], 2.0 * 9.81);
    assert!(!result.contains("gravity"));
    assert_eq!(set.globals().get("gravity"), Some(9.81));
    assert!(set.dependencies("weight").unwrap() == vec!["mass"]);
}

#[test]
fn test_json_round_trip_preserves_order() {
    let json = r#"{
        "zeta": {"formula": "alpha * 2"},
        "alpha": {"amount": 1.5, "comment": "from table 3"},
        "mid": {"formula": "zeta + alpha"}
    }"#;
    let set = ParameterSet::from_json(json).unwrap();
    let names: Vec<&str> = set.names().collect();
    assert_eq!(names, vec!["zeta", "alpha", "mid"]);

    let again = ParameterSet::from_json(&set.to_json().unwrap()).unwrap();
    assert_eq!(again.definitions(), set.definitions());
    assert_eq!(again.get("alpha").unwrap().metadata()["comment"], "from table 3");

    let result = again.resolve().unwrap();
    assert_eq!(
        serde_json::to_string(&result).unwrap(),
        r#"{"zeta":3.0,"alpha":1.5,"mid":4.5}"#
    );
}

#[test]
fn test_json_errors() {
    assert!(matches!(
        ParameterSet::from_json("[1, 2]"),
        Err(ParamSetError::JsonError(_))
    ));
    assert!(matches!(
        ParameterSet::from_json(r#"{"A": {"amount": 1, "formula": "2"}}"#),
        Err(ParamSetError::InvalidDefinition { .. })
    ));
    match ParameterSet::from_json(r#"{"first": {"amount": 1}, "A": {}}"#) {
        Err(ParamSetError::InvalidDefinition { name, .. }) => assert_eq!(name, "A"),
        other => panic!("Expected InvalidDefinition, got {:?}", other),
    }
    assert!(matches!(
        ParameterSet::from_json(r#"{"A": {"formula": "2 +* 3"}}"#),
        Err(ParamSetError::ParseError { .. })
    ));
    assert!(matches!(
        ParameterSet::from_json(r#"{"A": {"amount": "many"}}"#),
        Err(ParamSetError::JsonError(_))
    ));

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.json");
    std::fs::write(&path, r#"{"1st": {"amount": 1}}"#).unwrap();
    assert!(matches!(
        ParameterSet::load_json(&path),
        Err(ParamSetError::InvalidDefinition { .. })
    ));
    assert!(matches!(
        ParameterSet::load_json("/nonexistent/dir/params.json"),
        Err(ParamSetError::IoError(_))
    ));
}

#[test]
fn test_evaluate_and_set_amounts() {
    let mut set = abc();
    assert!(set.get("C").unwrap().value().is_none());
    set.evaluate_and_set_amounts().unwrap();
    assert_eq!(set.get("A").unwrap().value(), Some(42.0));
    assert_eq!(set.get("C").unwrap().value(), Some(10.0));
}

#[test]
fn test_long_formulas_never_abort() {
    let mut set = ParameterSet::new();
    set.add_formula("A", &format!("{}1", "-".repeat(400))).unwrap();
    set.add_formula("B", &format!("{}A", "-".repeat(4001))).unwrap();
    let result = set.evaluate().unwrap();
    assert_eq!(result["A"], 1.0);
    assert_eq!(result["B"], -1.0);

    assert!(matches!(
        set.add_formula("C", &format!("{}2", "2**".repeat(4000))),
        Err(ParamSetError::ParseError { .. })
    ));
    assert!(matches!(
        set.add_formula("D", "1e999 - 1e999"),
        Err(ParamSetError::ParseError { .. })
    ));
    assert!(!set.contains("C") && !set.contains("D"));
}
