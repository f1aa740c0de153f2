//! Tests for name mangling

use approx::assert_relative_eq;
use indexmap::IndexMap;
use paramset_rs::parameters::mangling::{
    mangle_formula, mangled_name, prefix_definitions, substitute_in_formulas,
};
use paramset_rs::parameters::{ExpressionError, ParameterDefinition, ParameterSet};

#[test]
fn test_mangle_formula() {
    assert_eq!(
        mangle_formula("log(foo * bar) + 7 / baz", "pre", &["bar"]).unwrap(),
        "(log((pre__foo * bar)) + (7 / pre__baz))"
    );
    assert_eq!(mangle_formula("42", "pre", &[]).unwrap(), "42");
    assert_eq!(mangled_name("grp", "x"), "grp__x");
    assert!(mangle_formula("foo +", "pre", &[]).is_err());
    assert!(matches!(
        mangle_formula("1e999 + a", "pre", &[]),
        Err(ExpressionError::ParseError { .. })
    ));
    assert_eq!(mangle_formula("1e300 * a", "pre", &[]).unwrap(), format!("({} * pre__a)", 1e300));
}

#[test]
fn test_mangled_formula_evaluates_the_same() {
    let mut plain = ParameterSet::new();
    plain.add_amount("foo", 3.0).unwrap();
    plain.add_amount("bar", 5.0).unwrap();
    plain.add_formula("out", "foo ^ 2 - bar / 2").unwrap();

    let mut mangled = ParameterSet::new();
    mangled.add_amount("p__foo", 3.0).unwrap();
    mangled.add_amount("bar", 5.0).unwrap();
    let formula = mangle_formula("foo ^ 2 - bar / 2", "p", &["bar"]).unwrap();
    mangled.add_formula("out", &formula).unwrap();

    let a = plain.evaluate().unwrap()["out"];
    let b = mangled.evaluate().unwrap()["out"];
    assert_relative_eq!(a, b, epsilon = 1e-12);
}

#[test]
fn test_merging_two_groups() {
    let mut group = IndexMap::new();
    group.insert("efficiency".to_string(), ParameterDefinition::amount(0.5));
    group.insert(
        "output".to_string(),
        ParameterDefinition::formula("fuel * efficiency"),
    );

    let (boiler, _) = prefix_definitions(&group, "boiler").unwrap();
    let (mut turbine, subs) = prefix_definitions(&group, "turbine").unwrap();
    turbine.insert(
        "turbine__efficiency".to_string(),
        ParameterDefinition::amount(0.25),
    );
    assert_eq!(subs["output"], "turbine__output");

    let mut definitions = boiler;
    definitions.extend(turbine);
    definitions.insert("fuel".to_string(), ParameterDefinition::amount(100.0));

    let mut set = ParameterSet::from_definitions(definitions).unwrap();
    let result = set.evaluate().unwrap();
    assert_eq!(result["boiler__output"], 50.0);
    assert_eq!(result["turbine__output"], 25.0);
}

#[test]
fn test_substitute_in_formulas() {
    let mut defs = IndexMap::new();
    defs.insert("a".to_string(), ParameterDefinition::formula("old_name * 2"));
    defs.insert("b".to_string(), ParameterDefinition::formula("old_name_2 + 1"));
    defs.insert("c".to_string(), ParameterDefinition::amount(1.0));

    let mut subs = IndexMap::new();
    subs.insert("old_name".to_string(), "new_name".to_string());

    let out = substitute_in_formulas(&defs, &subs).unwrap();
    assert_eq!(out["a"].formula.as_deref(), Some("(new_name * 2)"));
    // Only whole names are replaced
    assert_eq!(out["b"].formula.as_deref(), Some("old_name_2 + 1"));
    assert_eq!(out["c"], defs["c"]);
}
