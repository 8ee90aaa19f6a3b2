//! Dependency graph over the catalog.
//!
//! The graph is rebuilt for every query: traversal marks live on the nodes and
//! a request-scoped subgraph gets fresh clones, so no state leaks between calls.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use super::registry::RegistryView;
use super::validation::validate_package_name;
use crate::error::{OrchestratorError, Result};

#[derive(Debug, Clone)]
pub struct DependencyNode {
    pub name: String,
    /// Copied verbatim from the descriptor; names outside the graph are leaves
    pub dependencies: Vec<String>,
    visited: bool,
    in_stack: bool,
}

impl DependencyNode {
    fn new(name: &str, dependencies: &[String]) -> Self {
        Self {
            name: name.to_string(),
            dependencies: dependencies.to_vec(),
            visited: false,
            in_stack: false,
        }
    }

    fn reset(&mut self) {
        self.visited = false;
        self.in_stack = false;
    }
}

#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    nodes: BTreeMap<String, DependencyNode>,
}

impl DependencyGraph {
    /// One node per registry entry
    pub fn build(registry: &RegistryView) -> Self {
        let nodes = registry
            .all()
            .into_iter()
            .map(|pkg| {
                let node = DependencyNode::new(&pkg.name, &pkg.dependencies);
                (pkg.name, node)
            })
            .collect();
        Self { nodes }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.nodes.contains_key(name)
    }

    /// Minimal subgraph reachable from `requested`, with cloned nodes and reset marks
    pub fn subgraph(&self, requested: &[String]) -> Self {
        let mut nodes = BTreeMap::new();
        let mut queue: VecDeque<&str> = requested.iter().map(String::as_str).collect();

        while let Some(name) = queue.pop_front() {
            if nodes.contains_key(name) {
                continue;
            }
            let Some(node) = self.nodes.get(name) else {
                continue;
            };
            let mut copy = node.clone();
            copy.reset();
            for dep in &node.dependencies {
                queue.push_back(dep);
            }
            nodes.insert(name.to_string(), copy);
        }

        Self { nodes }
    }

    fn reset_marks(&mut self) {
        for node in self.nodes.values_mut() {
            node.reset();
        }
    }

    /// Three-color DFS. Returns the first cycle found, closed on its first
    /// element (`[a, b, a]`).
    pub fn detect_cycles(&mut self) -> Option<Vec<String>> {
        self.reset_marks();
        let roots: Vec<String> = self.nodes.keys().cloned().collect();
        let mut stack = Vec::new();
        for root in roots {
            if self.nodes[&root].visited {
                continue;
            }
            if let Some(cycle) = self.visit_for_cycle(&root, &mut stack) {
                return Some(cycle);
            }
        }
        None
    }

    fn visit_for_cycle(&mut self, name: &str, stack: &mut Vec<String>) -> Option<Vec<String>> {
        let dependencies = {
            let node = self.nodes.get_mut(name)?;
            node.visited = true;
            node.in_stack = true;
            node.dependencies.clone()
        };
        stack.push(name.to_string());

        for dep in &dependencies {
            let Some(dep_node) = self.nodes.get(dep) else {
                continue;
            };
            if dep_node.in_stack {
                let start = stack.iter().position(|n| n == dep).unwrap_or(0);
                let mut cycle = stack[start..].to_vec();
                cycle.push(dep.clone());
                return Some(cycle);
            }
            if !dep_node.visited {
                if let Some(cycle) = self.visit_for_cycle(dep, stack) {
                    return Some(cycle);
                }
            }
        }

        stack.pop();
        if let Some(node) = self.nodes.get_mut(name) {
            node.in_stack = false;
        }
        None
    }

    /// Post-order DFS: every dependency precedes its dependents. Roots are taken
    /// in name order and dependencies in declaration order, so the result is
    /// deterministic. Must only be called on an acyclic graph.
    pub fn topological_order(&mut self) -> Vec<String> {
        self.reset_marks();
        let roots: Vec<String> = self.nodes.keys().cloned().collect();
        let mut order = Vec::with_capacity(self.nodes.len());
        for root in roots {
            self.visit_post_order(&root, &mut order);
        }
        order
    }

    fn visit_post_order(&mut self, name: &str, order: &mut Vec<String>) {
        let dependencies = match self.nodes.get_mut(name) {
            Some(node) if !node.visited => {
                node.visited = true;
                node.dependencies.clone()
            }
            _ => return,
        };
        for dep in &dependencies {
            self.visit_post_order(dep, order);
        }
        order.push(name.to_string());
    }
}

/// Fail with [`OrchestratorError::CircularDependency`] if the full registry has a cycle
pub fn detect_circular_dependencies(registry: &RegistryView) -> Result<()> {
    let mut graph = DependencyGraph::build(registry);
    match graph.detect_cycles() {
        Some(cycle) => Err(OrchestratorError::CircularDependency(cycle)),
        None => Ok(()),
    }
}

/// Installation order for `requested` and every catalog package they pull in.
///
/// Bare system commands are not part of the result; they are satisfied through
/// the OS package manager during installation.
pub fn installation_order(registry: &RegistryView, requested: &[String]) -> Result<Vec<String>> {
    let mut unique = BTreeSet::new();
    for name in requested {
        validate_package_name(name)?;
        if !registry.contains(name) {
            return Err(OrchestratorError::UnknownPackage(name.clone()));
        }
        unique.insert(name.clone());
    }

    let full = DependencyGraph::build(registry);
    let roots: Vec<String> = unique.into_iter().collect();
    let mut sub = full.subgraph(&roots);

    if let Some(cycle) = sub.detect_cycles() {
        return Err(OrchestratorError::CircularDependency(cycle));
    }

    Ok(sub.topological_order())
}
