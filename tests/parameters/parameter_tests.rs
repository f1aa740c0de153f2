//! Tests for the Parameter struct and user-facing definitions

use paramset_rs::error::ParamSetError;
use paramset_rs::parameters::{Parameter, ParameterDefinition, ParameterKind};
use paramset_rs::uncertainty::Uncertainty;
use serde_json::json;

#[test]
fn test_parameter_kinds() {
    let param = Parameter::amount("A", 42.0).unwrap();
    assert!(matches!(param.kind(), ParameterKind::Amount(a) if *a == 42.0));
    assert!(param.formula_source().is_none());

    let param = Parameter::formula("B", "2*A+16").unwrap();
    match param.kind() {
        ParameterKind::Formula(formula) => {
            assert_eq!(formula.source(), "2*A+16");
            assert_eq!(formula.expression().to_string(), "((2 * A) + 16)");
        }
        other => panic!("Expected a formula, got {:?}", other),
    }
    assert!(param.fixed_amount().is_none());
}

#[test]
fn test_invalid_names() {
    for name in ["", "2x", "with-dash", "a.b", "sqrt", "e", "tau"] {
        match Parameter::amount(name, 1.0) {
            Err(ParamSetError::InvalidDefinition { .. }) => {}
            other => panic!("Expected InvalidDefinition for {:?}, got {:?}", name, other),
        }
    }
}

#[test]
fn test_definition_from_json() {
    let def: ParameterDefinition = serde_json::from_value(json!({
        "amount": 0.8,
        "uncertainty": {"distribution": "triangular", "minimum": 0.5, "maximum": 1.0},
        "unit": "dimensionless",
        "source": {"doi": "10.1000/182"}
    }))
    .unwrap();

    let param = Parameter::from_definition("efficiency", def.clone()).unwrap();
    assert_eq!(param.fixed_amount(), Some(0.8));
    assert_eq!(
        param.uncertainty(),
        Some(&Uncertainty::Triangular {
            minimum: 0.5,
            maximum: 1.0
        })
    );
    assert_eq!(param.metadata()["source"]["doi"], "10.1000/182");

    // Metadata survives the trip back to a definition
    assert_eq!(param.to_definition(), def);
}

#[test]
fn test_invalid_definitions() {
    let err = Parameter::from_definition(
        "A",
        serde_json::from_value(json!({"amount": 1.0, "formula": "2"})).unwrap(),
    )
    .unwrap_err();
    assert!(err.to_string().contains("both"));

    let err = Parameter::from_definition(
        "A",
        serde_json::from_value(json!({"unit": "kg"})).unwrap(),
    )
    .unwrap_err();
    assert!(err.to_string().contains("neither"));

    // Distribution that does not fit the amount
    let def = ParameterDefinition::amount(-2.0).with_uncertainty(Uncertainty::Lognormal {
        scale: 0.1,
        minimum: None,
        maximum: None,
    });
    assert!(matches!(
        Parameter::from_definition("A", def),
        Err(ParamSetError::InvalidDefinition { .. })
    ));

    // Formulas only accept the fixed distribution
    let def = ParameterDefinition::formula("1 + 1").with_uncertainty(Uncertainty::Fixed);
    assert!(Parameter::from_definition("A", def).is_ok());
}

#[test]
fn test_metadata_is_mutable() {
    let mut param = Parameter::amount("A", 1.0).unwrap();
    param
        .metadata_mut()
        .insert("comment".to_string(), json!("measured"));
    assert_eq!(param.metadata()["comment"], "measured");
}
