//! Operation dependency graph and execution planning.

use super::operation::Operation;
use crate::error::{ConfigError, Result};
use petgraph::algo::{tarjan_scc, toposort};
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::{HashMap, HashSet};

/// Immutable, validated set of operations
///
/// Edges point from a prerequisite to the operation that needs it.
#[derive(Debug)]
pub struct OperationGraph {
    graph: DiGraph<Operation, ()>,
    index: HashMap<String, NodeIndex>,
    /// Names in declaration order
    order: Vec<String>,
}

impl OperationGraph {
    /// Build a graph, rejecting duplicates, unresolved prerequisites and cycles
    pub fn new(operations: Vec<Operation>) -> Result<Self> {
        let mut graph = DiGraph::with_capacity(operations.len(), operations.len());
        let mut index = HashMap::with_capacity(operations.len());
        let mut order = Vec::with_capacity(operations.len());

        for operation in operations {
            if index.contains_key(&operation.name) {
                return Err(ConfigError::DuplicateOperation {
                    name: operation.name,
                }
                .into());
            }
            let name = operation.name.clone();
            let node = graph.add_node(operation);
            index.insert(name.clone(), node);
            order.push(name);
        }

        let mut edges = Vec::new();
        for node in graph.node_indices() {
            let operation = &graph[node];
            for prerequisite in &operation.prerequisites {
                let from = index.get(prerequisite).ok_or_else(|| {
                    ConfigError::UnresolvedPrerequisite {
                        operation: operation.name.clone(),
                        prerequisite: prerequisite.clone(),
                    }
                })?;
                edges.push((*from, node));
            }
        }
        for (from, to) in edges {
            graph.update_edge(from, to, ());
        }

        if toposort(&graph, None).is_err() {
            return Err(ConfigError::CircularDependency {
                operations: Self::cycle_members(&graph),
            }
            .into());
        }

        log::debug!("Operation graph built with {} operations", order.len());
        Ok(Self {
            graph,
            index,
            order,
        })
    }

    /// Names of every operation that sits on a cycle
    fn cycle_members(graph: &DiGraph<Operation, ()>) -> Vec<String> {
        let mut members: Vec<String> = tarjan_scc(graph)
            .into_iter()
            .filter(|component| {
                component.len() > 1
                    || component
                        .first()
                        .is_some_and(|node| graph.contains_edge(*node, *node))
            })
            .flatten()
            .map(|node| graph[node].name.clone())
            .collect();
        members.sort();
        members
    }

    /// Look up an operation by name
    pub fn get(&self, name: &str) -> Option<&Operation> {
        self.index.get(name).map(|node| &self.graph[*node])
    }

    /// Whether `name` is declared
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Operations in declaration order
    pub fn operations(&self) -> impl Iterator<Item = &Operation> {
        self.order.iter().filter_map(|name| self.get(name))
    }

    /// First declared operation, the default target
    pub fn default_operation(&self) -> Option<&Operation> {
        self.operations().next()
    }

    /// Number of declared operations
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether the graph has no operations
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Names of operations that list `name` as a prerequisite
    pub fn dependents(&self, name: &str) -> Vec<&str> {
        let Some(node) = self.index.get(name) else {
            return Vec::new();
        };
        let mut names: Vec<&str> = self
            .graph
            .neighbors_directed(*node, petgraph::Direction::Outgoing)
            .map(|n| self.graph[n].name.as_str())
            .collect();
        names.sort_unstable();
        names
    }

    /// Execution order for `targets`: prerequisites first, each at most once
    ///
    /// Every target is checked before any ordering is computed, so an unknown
    /// name fails without side effects.
    pub fn plan(&self, targets: &[String]) -> Result<Vec<&Operation>> {
        for target in targets {
            if !self.contains(target) {
                return Err(ConfigError::UnknownOperation {
                    name: target.clone(),
                }
                .into());
            }
        }

        let mut completed = HashSet::new();
        let mut order = Vec::new();
        for target in targets {
            self.visit(target, &mut completed, &mut order);
        }
        Ok(order)
    }

    /// Depth-first walk in declared prerequisite order; the graph is acyclic
    /// and every name resolves, both checked in [`OperationGraph::new`]
    fn visit<'a>(
        &'a self,
        name: &str,
        completed: &mut HashSet<&'a str>,
        order: &mut Vec<&'a Operation>,
    ) {
        let Some(operation) = self.get(name) else {
            return;
        };
        if completed.contains(operation.name.as_str()) {
            return;
        }
        for prerequisite in &operation.prerequisites {
            self.visit(prerequisite, completed, order);
        }
        completed.insert(operation.name.as_str());
        order.push(operation);
    }
}
