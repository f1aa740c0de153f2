//! Parameter set implementation
//!
//! A [`ParameterSet`] owns a collection of named parameters, resolves the
//! dependencies between their formulas, and evaluates them in topological
//! order. It moves through three states:
//!
//! * `Unvalidated`: definitions only, nothing resolved yet.
//! * `Ordered`: every reference resolved and an evaluation order fixed.
//! * `Evaluated`: one value computed per parameter.
//!
//! Any change to the definitions, the globals, or the configuration drops the
//! set back to `Unvalidated` and clears cached values.

use crate::config::EvalConfig;
use crate::error::{ParamSetError, Result};
use crate::parameters::expression::{EvaluationContext, Expression, ExpressionError};
use crate::parameters::globals::GlobalContext;
use crate::parameters::graph::DependencyGraph;
use crate::parameters::parameter::{Formula, Parameter, ParameterDefinition, ParameterKind};
use crate::parameters::result::EvaluationResult;
use crate::uncertainty::Uncertainty;
use indexmap::IndexMap;
use serde::de::{self, MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use tracing::{debug, trace, warn};

/// Label used in errors raised by [`ParameterSet::evaluate_formula`]
const EXTERNAL_FORMULA: &str = "<formula>";

/// Where a [`ParameterSet`] is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetState {
    Unvalidated,
    Ordered,
    Evaluated,
}

/// Resolved graph and evaluation order
#[derive(Debug, Clone)]
struct Resolution {
    graph: DependencyGraph,
    order: Vec<String>,
}

#[derive(Debug, Clone, Default)]
enum State {
    #[default]
    Unvalidated,
    Ordered(Resolution),
    Evaluated(Resolution, EvaluationResult),
}

impl State {
    fn resolution(&self) -> Option<&Resolution> {
        match self {
            State::Unvalidated => None,
            State::Ordered(resolution) | State::Evaluated(resolution, _) => Some(resolution),
        }
    }
}

/// A collection of parameters evaluated together
///
/// # Examples
///
/// ```
/// use paramset_rs::parameters::ParameterSet;
///
/// let mut set = ParameterSet::new();
/// set.add_amount("A", 42.0).unwrap();
/// set.add_formula("B", "2 * A + 16").unwrap();
/// set.add_formula("C", "sqrt(B)").unwrap();
///
/// let result = set.evaluate().unwrap();
/// assert_eq!(result["B"], 100.0);
/// assert_eq!(result["C"], 10.0);
/// ```
#[derive(Debug, Clone, Default)]
pub struct ParameterSet {
    params: IndexMap<String, Parameter>,
    globals: GlobalContext,
    config: EvalConfig,
    state: State,
}

impl ParameterSet {
    /// Create an empty set with the default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty set with the given configuration
    pub fn with_config(config: EvalConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Builder-style replacement of the global context
    pub fn with_globals(mut self, globals: GlobalContext) -> Self {
        self.set_globals(globals);
        self
    }

    /// Build a set from `(name, definition)` pairs, keeping their order.
    ///
    /// Fails with `InvalidDefinition` on a bad or duplicated name, or a
    /// definition with neither or both of amount and formula. Formula syntax
    /// errors fail with `ParseError`.
    ///
    /// # Examples
    ///
    /// ```
    /// use paramset_rs::parameters::{ParameterDefinition, ParameterSet};
    ///
    /// let set = ParameterSet::from_definitions(vec![
    ///     ("X", ParameterDefinition::formula("Y + 1")),
    ///     ("Y", ParameterDefinition::formula("X + 1")),
    /// ])
    /// .unwrap();
    /// assert!(set.resolve().is_err());
    /// ```
    pub fn from_definitions<I, S>(definitions: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, ParameterDefinition)>,
        S: AsRef<str>,
    {
        let mut set = Self::new();
        for (name, definition) in definitions {
            set.add(Parameter::from_definition(name.as_ref(), definition)?)?;
        }
        Ok(set)
    }

    /// Add a parameter; its name must not already be in use
    pub fn add(&mut self, param: Parameter) -> Result<()> {
        if self.params.contains_key(param.name()) {
            return Err(ParamSetError::invalid(
                param.name(),
                "duplicate parameter name",
            ));
        }
        self.params.insert(param.name().to_string(), param);
        self.invalidate();
        Ok(())
    }

    /// Add a fixed-amount parameter
    pub fn add_amount(&mut self, name: &str, amount: f64) -> Result<()> {
        self.add(Parameter::amount(name, amount)?)
    }

    /// Add a formula parameter
    pub fn add_formula(&mut self, name: &str, formula: &str) -> Result<()> {
        self.add(Parameter::formula(name, formula)?)
    }

    /// Give `name` a fixed amount, adding it if absent. An existing
    /// parameter keeps its position, metadata, and uncertainty.
    pub fn set_amount(&mut self, name: &str, amount: f64) -> Result<()> {
        match self.params.get_mut(name) {
            Some(param) => param.replace_kind(ParameterKind::Amount(amount))?,
            None => return self.add_amount(name, amount),
        }
        self.invalidate();
        Ok(())
    }

    /// Give `name` a formula, adding it if absent. An existing parameter
    /// keeps its position and metadata but loses any uncertainty.
    pub fn set_formula(&mut self, name: &str, formula: &str) -> Result<()> {
        let parsed =
            Formula::parse(formula).map_err(|e| ParamSetError::from_expression(name, e))?;
        match self.params.get_mut(name) {
            Some(param) => param.replace_kind(ParameterKind::Formula(parsed))?,
            None => return self.add_formula(name, formula),
        }
        self.invalidate();
        Ok(())
    }

    /// Attach or clear the uncertainty distribution of an existing parameter
    pub fn set_uncertainty(&mut self, name: &str, uncertainty: Option<Uncertainty>) -> Result<()> {
        let param = self
            .params
            .get_mut(name)
            .ok_or_else(|| ParamSetError::invalid(name, "no parameter with this name"))?;
        param.set_uncertainty(uncertainty)?;
        self.invalidate();
        Ok(())
    }

    /// Remove a parameter, keeping the order of the others
    pub fn remove(&mut self, name: &str) -> Option<Parameter> {
        let removed = self.params.shift_remove(name);
        if removed.is_some() {
            self.invalidate();
        }
        removed
    }

    pub fn set_globals(&mut self, globals: GlobalContext) {
        self.globals = globals;
        self.invalidate();
    }

    pub fn set_config(&mut self, config: EvalConfig) {
        self.config = config;
        self.invalidate();
    }

    fn invalidate(&mut self) {
        if !matches!(self.state, State::Unvalidated) {
            debug!("parameter set changed, discarding resolved state");
        }
        self.state = State::Unvalidated;
        for param in self.params.values_mut() {
            param.set_value(None);
        }
    }

    pub fn get(&self, name: &str) -> Option<&Parameter> {
        self.params.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.params.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Parameter names in insertion order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.params.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Parameter)> {
        self.params.iter().map(|(name, param)| (name.as_str(), param))
    }

    pub fn globals(&self) -> &GlobalContext {
        &self.globals
    }

    pub fn config(&self) -> &EvalConfig {
        &self.config
    }

    pub fn state(&self) -> SetState {
        match self.state {
            State::Unvalidated => SetState::Unvalidated,
            State::Ordered(_) => SetState::Ordered,
            State::Evaluated(..) => SetState::Evaluated,
        }
    }

    /// Current definitions, in insertion order
    pub fn definitions(&self) -> IndexMap<String, ParameterDefinition> {
        self.params
            .iter()
            .map(|(name, param)| (name.clone(), param.to_definition()))
            .collect()
    }

    /// Parameters that `name` references directly
    pub fn dependencies(&self, name: &str) -> Result<Vec<String>> {
        self.with_graph(|graph| graph.dependencies(name).into_iter().map(String::from).collect())
    }

    /// Parameters that reference `name` directly
    pub fn dependents(&self, name: &str) -> Result<Vec<String>> {
        self.with_graph(|graph| graph.dependents(name).into_iter().map(String::from).collect())
    }

    fn with_graph<T, F: FnOnce(&DependencyGraph) -> T>(&self, f: F) -> Result<T> {
        match self.state.resolution() {
            Some(resolution) => Ok(f(&resolution.graph)),
            None => Ok(f(&DependencyGraph::build(
                &self.params,
                &self.globals,
                &self.config,
            )?)),
        }
    }

    /// Resolve every reference and fix the evaluation order.
    ///
    /// On `UnknownReference` or `CircularReference` the set stays `Unvalidated`.
    pub fn order(&mut self) -> Result<&[String]> {
        if matches!(self.state, State::Unvalidated) {
            self.state = State::Ordered(self.compute_resolution()?);
        }
        Ok(self
            .state
            .resolution()
            .map(|resolution| resolution.order.as_slice())
            .unwrap_or_default())
    }

    /// Evaluate every parameter, caching the result until the next change.
    ///
    /// A failed evaluation leaves no values behind; the set stays `Ordered`
    /// if ordering succeeded and `Unvalidated` otherwise.
    pub fn evaluate(&mut self) -> Result<EvaluationResult> {
        let resolution = match std::mem::take(&mut self.state) {
            State::Evaluated(resolution, result) => {
                self.state = State::Evaluated(resolution, result.clone());
                return Ok(result);
            }
            State::Ordered(resolution) => resolution,
            State::Unvalidated => self.compute_resolution()?,
        };

        match self.compute_values(&resolution) {
            Ok(result) => {
                debug!(count = result.len(), "evaluated parameter set");
                self.state = State::Evaluated(resolution, result.clone());
                Ok(result)
            }
            Err(err) => {
                self.state = State::Ordered(resolution);
                Err(err)
            }
        }
    }

    /// Evaluate without touching the cached state
    pub fn resolve(&self) -> Result<EvaluationResult> {
        match &self.state {
            State::Evaluated(_, result) => Ok(result.clone()),
            State::Ordered(resolution) => self.compute_values(resolution),
            State::Unvalidated => self.compute_values(&self.compute_resolution()?),
        }
    }

    /// Evaluate and store each value on its parameter, see [`Parameter::value`]
    pub fn evaluate_and_set_amounts(&mut self) -> Result<EvaluationResult> {
        let result = self.evaluate()?;
        for (name, param) in self.params.iter_mut() {
            param.set_value(result.get(name));
        }
        Ok(result)
    }

    /// Evaluate a formula that is not part of the set against the evaluated
    /// parameters and the globals.
    ///
    /// # Examples
    ///
    /// ```
    /// use paramset_rs::parameters::ParameterSet;
    ///
    /// let mut set = ParameterSet::new();
    /// set.add_amount("yield_factor", 0.25).unwrap();
    /// assert_eq!(set.evaluate_formula("yield_factor * 8").unwrap(), 2.0);
    /// ```
    pub fn evaluate_formula(&mut self, formula: &str) -> Result<f64> {
        let expr = Expression::parse(formula)
            .map_err(|e| ParamSetError::from_expression(EXTERNAL_FORMULA, e))?;
        let result = self.evaluate()?;
        let scope = Scope {
            values: result.values(),
            globals: &self.globals,
        };
        expr.evaluate_with(&scope, self.config.non_real)
            .map_err(|e| ParamSetError::from_expression(EXTERNAL_FORMULA, e))
    }

    fn compute_resolution(&self) -> Result<Resolution> {
        let graph = DependencyGraph::build(&self.params, &self.globals, &self.config)?;
        let order: Vec<String> = graph
            .topological_order()?
            .into_iter()
            .filter_map(|index| graph.name(index).map(String::from))
            .collect();
        debug!(count = order.len(), "ordered parameter set");
        Ok(Resolution { graph, order })
    }

    fn compute_values(&self, resolution: &Resolution) -> Result<EvaluationResult> {
        let mut computed: IndexMap<String, f64> = IndexMap::with_capacity(self.params.len());
        for name in &resolution.order {
            let Some(param) = self.params.get(name) else {
                continue;
            };
            let value = match param.kind() {
                ParameterKind::Amount(amount) => *amount,
                ParameterKind::Formula(formula) => {
                    let scope = Scope {
                        values: &computed,
                        globals: &self.globals,
                    };
                    formula
                        .expression()
                        .evaluate_with(&scope, self.config.non_real)
                        .map_err(|e| ParamSetError::from_expression(name, e))?
                }
            };
            if !value.is_finite() {
                warn!(parameter = %name, value, "formula produced a non-real value");
            }
            trace!(parameter = %name, value, "evaluated parameter");
            computed.insert(name.clone(), value);
        }

        let values = self
            .params
            .keys()
            .filter_map(|name| computed.get(name).map(|value| (name.clone(), *value)))
            .collect();
        Ok(EvaluationResult::new(values, resolution.order.clone()))
    }

    /// Parameters in evaluation order, resolving the graph if needed
    pub(crate) fn ordered_parameters(&self) -> Result<Vec<&Parameter>> {
        let computed;
        let resolution = match self.state.resolution() {
            Some(resolution) => resolution,
            None => {
                computed = self.compute_resolution()?;
                &computed
            }
        };
        Ok(resolution
            .order
            .iter()
            .filter_map(|name| self.params.get(name))
            .collect())
    }

    /// Serialize the definitions to pretty-printed JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Build a set from a JSON object of definitions
    ///
    /// # Examples
    ///
    /// ```
    /// use paramset_rs::parameters::ParameterSet;
    ///
    /// let json = r#"{
    ///     "A": {"amount": 42.0},
    ///     "B": {"formula": "2 * A + 16", "unit": "kg"}
    /// }"#;
    /// let mut set = ParameterSet::from_json(json).unwrap();
    /// assert_eq!(set.evaluate().unwrap()["B"], 100.0);
    /// ```
    /// Fails with `JsonError` on malformed JSON and with the construction
    /// errors of [`from_definitions`](Self::from_definitions) otherwise.
    pub fn from_json(json: &str) -> Result<Self> {
        let Definitions(definitions) = serde_json::from_str(json)?;
        Self::from_definitions(definitions)
    }

    /// Write the definitions to a JSON file
    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    /// Read definitions from a JSON file
    pub fn load_json<P: AsRef<Path>>(path: P) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        let Definitions(definitions) = serde_json::from_reader(reader)?;
        Self::from_definitions(definitions)
    }
}

/// Lookup scope for formulas: computed parameters shadow globals
pub(crate) struct Scope<'a> {
    pub(crate) values: &'a IndexMap<String, f64>,
    pub(crate) globals: &'a GlobalContext,
}

impl EvaluationContext for Scope<'_> {
    fn get_variable(&self, name: &str) -> std::result::Result<f64, ExpressionError> {
        match self.values.get(name) {
            Some(value) => Ok(*value),
            None => self.globals.get_variable(name),
        }
    }
}

impl Serialize for ParameterSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.params.len()))?;
        for (name, param) in &self.params {
            map.serialize_entry(name, &param.to_definition())?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for ParameterSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let Definitions(definitions) = Definitions::deserialize(deserializer)?;
        ParameterSet::from_definitions(definitions).map_err(de::Error::custom)
    }
}

/// Definitions in document order, so duplicated keys reach
/// `from_definitions` instead of being silently overwritten
struct Definitions(Vec<(String, ParameterDefinition)>);

impl<'de> Deserialize<'de> for Definitions {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        deserializer.deserialize_map(DefinitionsVisitor)
    }
}

struct DefinitionsVisitor;

impl<'de> Visitor<'de> for DefinitionsVisitor {
    type Value = Definitions;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a map of parameter names to definitions")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> std::result::Result<Self::Value, A::Error> {
        let mut definitions: Vec<(String, ParameterDefinition)> =
            Vec::with_capacity(access.size_hint().unwrap_or(0));
        while let Some((name, definition)) = access.next_entry()? {
            definitions.push((name, definition));
        }
        Ok(Definitions(definitions))
    }
}
