//! Inheritance graph, member flattening order and upcast paths.
//!
//! Uses `petgraph::DiGraph` with:
//! - Nodes: class tokens
//! - Edges: derived → direct superclass, weighted by declaration order and
//!   carrying the upcast

use std::fmt;
use std::sync::Arc;

use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use rustc_hash::{FxHashMap, FxHashSet};

use tether_core::{RegistrationError, TypeToken, UpcastFn};

use crate::class::ClassDescriptor;

#[derive(Clone)]
struct SuperEdge {
    order: usize,
    upcast: Arc<dyn UpcastFn>,
}

/// One ancestor visited while flattening a class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlattenStep {
    pub class: TypeToken,
    /// Members are reachable through the host's single-parent delegation
    /// chain and need not be copied.
    pub reachable: bool,
}

type UpcastPath = Vec<Arc<dyn UpcastFn>>;

/// The superclass DAG of every known class.
pub struct Hierarchy {
    graph: DiGraph<TypeToken, SuperEdge>,
    nodes: FxHashMap<TypeToken, NodeIndex>,
    paths: FxHashMap<(TypeToken, TypeToken), UpcastPath>,
}

impl Hierarchy {
    /// Build the graph and precompute upcast paths.
    ///
    /// Fails with [`RegistrationError::InheritanceCycle`] if any class is
    /// its own ancestor.
    pub fn build(classes: &[ClassDescriptor]) -> Result<Self, RegistrationError> {
        let mut graph = DiGraph::new();
        let mut nodes = FxHashMap::default();
        for class in classes {
            nodes.insert(class.token, graph.add_node(class.token));
        }
        for class in classes {
            let from = nodes[&class.token];
            for (order, link) in class.supers().iter().enumerate() {
                let to = match nodes.get(&link.token) {
                    Some(&node) => node,
                    None => {
                        let node = graph.add_node(link.token);
                        nodes.insert(link.token, node);
                        node
                    }
                };
                graph.add_edge(
                    from,
                    to,
                    SuperEdge {
                        order,
                        upcast: Arc::clone(&link.upcast),
                    },
                );
            }
        }

        if let Err(cycle) = toposort(&graph, None) {
            let token = graph[cycle.node_id()];
            let name = classes
                .iter()
                .find(|c| c.token == token)
                .map_or_else(|| token.rust_name().to_string(), |c| c.name.clone());
            return Err(RegistrationError::InheritanceCycle { name });
        }

        let mut hierarchy = Self {
            graph,
            nodes,
            paths: FxHashMap::default(),
        };
        hierarchy.compute_paths();
        Ok(hierarchy)
    }

    /// Outgoing superclass edges of `node`, in declaration order.
    fn super_edges(&self, node: NodeIndex) -> Vec<(NodeIndex, &SuperEdge)> {
        let mut edges: Vec<_> = self
            .graph
            .edges(node)
            .map(|edge| (edge.target(), edge.weight()))
            .collect();
        edges.sort_by_key(|(_, edge)| edge.order);
        edges
    }

    fn compute_paths(&mut self) {
        let mut paths = FxHashMap::default();
        for (&class, &node) in &self.nodes {
            let mut stack = vec![(node, UpcastPath::new())];
            let mut seen = FxHashSet::default();
            while let Some((current, path)) = stack.pop() {
                // Reverse so the first-declared superclass is explored first.
                for (target, edge) in self.super_edges(current).into_iter().rev() {
                    let to = self.graph[target];
                    if !seen.insert(to) {
                        continue;
                    }
                    let mut extended = path.clone();
                    extended.push(Arc::clone(&edge.upcast));
                    paths.insert((class, to), extended.clone());
                    stack.push((target, extended));
                }
            }
        }
        self.paths = paths;
    }

    /// Direct superclasses of `class` in declaration order.
    pub fn supers(&self, class: TypeToken) -> Vec<TypeToken> {
        self.nodes
            .get(&class)
            .map(|&node| {
                self.super_edges(node)
                    .into_iter()
                    .map(|(target, _)| self.graph[target])
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Every ancestor of `class`, depth first in declaration order, each
    /// visited once.
    ///
    /// Only the first direct superclass of `class` is reachable. Below it,
    /// every ancestor of a reachable class is reachable too: that class's
    /// own exposed members already include them. A diamond ancestor is
    /// visited on the first path that reaches it.
    pub fn flatten(&self, class: TypeToken) -> Vec<FlattenStep> {
        let mut steps = Vec::new();
        let Some(&node) = self.nodes.get(&class) else {
            return steps;
        };
        let mut visited = FxHashSet::default();
        visited.insert(class);
        for (index, (target, _)) in self.super_edges(node).into_iter().enumerate() {
            self.flatten_from(target, index == 0, &mut visited, &mut steps);
        }
        steps
    }

    fn flatten_from(
        &self,
        node: NodeIndex,
        reachable: bool,
        visited: &mut FxHashSet<TypeToken>,
        steps: &mut Vec<FlattenStep>,
    ) {
        let class = self.graph[node];
        if !visited.insert(class) {
            return;
        }
        steps.push(FlattenStep { class, reachable });
        for (target, _) in self.super_edges(node) {
            self.flatten_from(target, reachable, visited, steps);
        }
    }

    /// Ancestors of `class` in flattening order.
    pub fn ancestors(&self, class: TypeToken) -> Vec<TypeToken> {
        self.flatten(class).into_iter().map(|s| s.class).collect()
    }

    /// Upcasts from `from` to its ancestor `to`; empty when they are equal.
    pub fn upcast_path(&self, from: TypeToken, to: TypeToken) -> Option<&[Arc<dyn UpcastFn>]> {
        if from == to {
            return Some(&[]);
        }
        self.paths.get(&(from, to)).map(Vec::as_slice)
    }

    pub fn is_ancestor(&self, from: TypeToken, to: TypeToken) -> bool {
        from != to && self.paths.contains_key(&(from, to))
    }
}

impl fmt::Debug for Hierarchy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hierarchy")
            .field("classes", &self.graph.node_count())
            .field("edges", &self.graph.edge_count())
            .field("paths", &self.paths.len())
            .finish()
    }
}
