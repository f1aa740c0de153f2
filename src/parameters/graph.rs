//! Dependency graph between parameters and its topological order.
//!
//! The graph is derived from the formulas of a parameter map every time a set
//! is ordered; it is never stored with the definitions.

use crate::config::EvalConfig;
use crate::error::{ParamSetError, Result};
use crate::parameters::globals::GlobalContext;
use crate::parameters::parameter::{Parameter, ParameterKind};
use indexmap::{IndexMap, IndexSet};
use std::cmp::Reverse;
use std::collections::BinaryHeap;

/// Directed graph with an edge from each dependency to its dependents.
///
/// Nodes are identified by their insertion index in the parameter map.
#[derive(Debug, Clone, PartialEq)]
pub struct DependencyGraph {
    names: IndexSet<String>,
    dependencies: Vec<Vec<usize>>,
    dependents: Vec<Vec<usize>>,
}

impl DependencyGraph {
    /// Build the graph for `params`, resolving every formula reference against
    /// the parameter names and then the global names.
    ///
    /// Fails with `UnknownReference` for names or functions that resolve to
    /// nothing, and with `InvalidDefinition` for calls with a wrong argument count.
    pub fn build(
        params: &IndexMap<String, Parameter>,
        globals: &GlobalContext,
        config: &EvalConfig,
    ) -> Result<Self> {
        let names: IndexSet<String> = params.keys().cloned().collect();
        let mut dependencies = vec![Vec::new(); names.len()];
        let mut dependents = vec![Vec::new(); names.len()];

        for (node, (name, param)) in params.iter().enumerate() {
            let formula = match param.kind() {
                ParameterKind::Amount(_) => continue,
                ParameterKind::Formula(formula) => formula,
            };

            formula
                .expression()
                .validate_calls()
                .map_err(|e| ParamSetError::from_expression(name, e))?;

            for reference in formula.expression().references() {
                if let Some(dep) = names.get_index_of(&reference) {
                    dependencies[node].push(dep);
                    dependents[dep].push(node);
                } else if !globals.contains(&reference) {
                    let suggestion = if config.suggest_case_matches {
                        case_insensitive_match(&reference, &names, globals)
                    } else {
                        None
                    };
                    return Err(ParamSetError::UnknownReference {
                        parameter: name.clone(),
                        name: reference,
                        suggestion,
                    });
                }
            }
        }

        for list in dependencies.iter_mut().chain(dependents.iter_mut()) {
            list.sort_unstable();
        }

        Ok(Self {
            names,
            dependencies,
            dependents,
        })
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Name of the node at `index`
    pub fn name(&self, index: usize) -> Option<&str> {
        self.names.get_index(index).map(String::as_str)
    }

    /// Parameters `name` references directly, in insertion order
    pub fn dependencies(&self, name: &str) -> Vec<&str> {
        self.neighbours(name, &self.dependencies)
    }

    /// Parameters that reference `name` directly, in insertion order
    pub fn dependents(&self, name: &str) -> Vec<&str> {
        self.neighbours(name, &self.dependents)
    }

    fn neighbours<'a>(&'a self, name: &str, edges: &'a [Vec<usize>]) -> Vec<&'a str> {
        match self.names.get_index_of(name) {
            Some(node) => edges[node].iter().filter_map(|&i| self.name(i)).collect(),
            None => Vec::new(),
        }
    }

    /// Order the nodes so every parameter comes after everything it depends on.
    ///
    /// Kahn's algorithm with a min-heap of ready nodes: among parameters whose
    /// dependencies are all placed, the earliest inserted goes first.
    pub fn topological_order(&self) -> Result<Vec<usize>> {
        let n = self.len();
        let mut in_degree: Vec<usize> = self.dependencies.iter().map(Vec::len).collect();
        let mut ready: BinaryHeap<Reverse<usize>> = (0..n)
            .filter(|&node| in_degree[node] == 0)
            .map(Reverse)
            .collect();

        let mut order = Vec::with_capacity(n);
        while let Some(Reverse(node)) = ready.pop() {
            order.push(node);
            for &dependent in &self.dependents[node] {
                in_degree[dependent] -= 1;
                if in_degree[dependent] == 0 {
                    ready.push(Reverse(dependent));
                }
            }
        }

        if order.len() == n {
            Ok(order)
        } else {
            let unplaced: Vec<bool> = in_degree.iter().map(|&d| d > 0).collect();
            Err(ParamSetError::CircularReference {
                members: self.cycle_members(&unplaced),
            })
        }
    }

    /// Unplaced nodes that can reach themselves. Nodes that are merely
    /// downstream of a cycle are left out.
    fn cycle_members(&self, unplaced: &[bool]) -> Vec<String> {
        (0..self.len())
            .filter(|&node| unplaced[node] && self.reaches_itself(node, unplaced))
            .filter_map(|node| self.name(node).map(str::to_string))
            .collect()
    }

    fn reaches_itself(&self, start: usize, within: &[bool]) -> bool {
        let mut seen = vec![false; self.len()];
        let mut stack = vec![start];
        while let Some(node) = stack.pop() {
            for &next in &self.dependents[node] {
                if !within[next] {
                    continue;
                }
                if next == start {
                    return true;
                }
                if !seen[next] {
                    seen[next] = true;
                    stack.push(next);
                }
            }
        }
        false
    }
}

fn case_insensitive_match(
    missing: &str,
    names: &IndexSet<String>,
    globals: &GlobalContext,
) -> Option<String> {
    let lowered = missing.to_lowercase();
    names
        .iter()
        .chain(globals.names())
        .find(|candidate| candidate.to_lowercase() == lowered)
        .cloned()
}
