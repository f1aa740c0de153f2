//! Name mangling for merging groups of parameters.
//!
//! Two groups that both define `efficiency` can live in one set once each
//! group's names are prefixed, e.g. `boiler__efficiency` and
//! `turbine__efficiency`. Formulas are rewritten through the expression tree,
//! so only real references are touched and never substrings of other names.

use crate::error::{ParamSetError, Result};
use crate::parameters::builtins;
use crate::parameters::expression::{Expression, ExpressionError};
use crate::parameters::parameter::ParameterDefinition;
use indexmap::IndexMap;

/// Separator between a prefix and the unprefixed name
pub const SEPARATOR: &str = "__";

/// Build the mangled form of `name`
pub fn mangled_name(prefix: &str, name: &str) -> String {
    format!("{}{}{}", prefix, SEPARATOR, name)
}

/// Prefix every name referenced by `formula` that is neither in `context` nor
/// an allow-listed constant, and render the result.
///
/// The output is fully parenthesized.
///
/// # Examples
///
/// ```
/// use paramset_rs::parameters::mangling::mangle_formula;
///
/// let mangled = mangle_formula("log(foo * bar) + 7 / baz", "pre", &["bar"]).unwrap();
/// assert_eq!(mangled, "(log((pre__foo * bar)) + (7 / pre__baz))");
/// ```
pub fn mangle_formula(
    formula: &str,
    prefix: &str,
    context: &[&str],
) -> std::result::Result<String, ExpressionError> {
    check_prefix(prefix).map_err(|message| ExpressionError::InvalidOperation { message })?;
    let expr = Expression::parse(formula)?;
    let mangled = expr.rename_variables(&mut |name| {
        if context.iter().any(|kept| *kept == name) || builtins::constant(name).is_some() {
            None
        } else {
            Some(mangled_name(prefix, name))
        }
    });
    Ok(mangled.to_string())
}

/// Prefix every key of `definitions` and the references between them.
///
/// References to names outside the mapping (globals, parameters of another
/// group) are left alone. Returns the renamed definitions together with the
/// old-to-new substitution map.
pub fn prefix_definitions(
    definitions: &IndexMap<String, ParameterDefinition>,
    prefix: &str,
) -> Result<(
    IndexMap<String, ParameterDefinition>,
    IndexMap<String, String>,
)> {
    check_prefix(prefix).map_err(|reason| ParamSetError::invalid(prefix, reason))?;

    let substitutions: IndexMap<String, String> = definitions
        .keys()
        .map(|name| (name.clone(), mangled_name(prefix, name)))
        .collect();

    let renamed = substitute_in_formulas(definitions, &substitutions)?
        .into_iter()
        .map(|(name, definition)| {
            let new_name = substitutions
                .get(&name)
                .cloned()
                .unwrap_or(name);
            (new_name, definition)
        })
        .collect();

    Ok((renamed, substitutions))
}

/// Rename references in every formula according to `substitutions`.
///
/// Keys of `definitions` are kept; formulas without a substituted reference
/// keep their source text.
pub fn substitute_in_formulas(
    definitions: &IndexMap<String, ParameterDefinition>,
    substitutions: &IndexMap<String, String>,
) -> Result<IndexMap<String, ParameterDefinition>> {
    definitions
        .iter()
        .map(|(name, definition)| {
            let mut definition = definition.clone();
            if let Some(formula) = &definition.formula {
                let expr = Expression::parse(formula)
                    .map_err(|e| ParamSetError::from_expression(name, e))?;
                if expr
                    .references()
                    .iter()
                    .any(|reference| substitutions.contains_key(reference))
                {
                    let rewritten =
                        expr.rename_variables(&mut |reference| substitutions.get(reference).cloned());
                    definition.formula = Some(rewritten.to_string());
                }
            }
            Ok((name.clone(), definition))
        })
        .collect()
}

fn check_prefix(prefix: &str) -> std::result::Result<(), String> {
    let mut chars = prefix.chars();
    let valid = match chars.next() {
        Some(first) => {
            (first.is_ascii_alphabetic() || first == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        None => false,
    };
    if valid {
        Ok(())
    } else {
        Err(format!("prefix '{}' is not a valid identifier", prefix))
    }
}
