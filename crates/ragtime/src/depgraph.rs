//! The dependency graph recorded during attribute evaluation.
//!
//! Graph nodes are [`DepKey`]s: either a memoized attribute instance or a
//! structural fact (a read of one named slot of one AST node). Edges run
//! from dependent to dependency; invalidation is a reverse-reachability
//! walk from the mutated structural fact, collecting every attribute whose
//! cached value transitively depended on it.
//!
//! Keys are interned to stable petgraph indices so invalidation is a graph
//! traversal rather than a pointer chase; removing an attribute node drops
//! its edges with it, and structural facts persist across invalidations.

use std::collections::{HashMap, HashSet};

use petgraph::{Direction, stable_graph::NodeIndex, stable_graph::StableDiGraph};

use ragtime_core::{
    identifier::Id,
    value::{NodeId, Value},
};

/// Memoization key: one attribute instance on one node with one argument
/// tuple.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AttrKey {
    pub node: NodeId,
    pub attribute: Id,
    pub args: Vec<Value>,
}

/// One vertex of the dependency graph.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum DepKey {
    /// A memoized attribute instance.
    Attr(AttrKey),
    /// A structural fact: the contents of slot `.1` of node `.0` — a
    /// terminal value, a single child identity, or a list's structure.
    Slot(NodeId, Id),
}

#[derive(Debug, Default)]
pub(crate) struct DepGraph {
    graph: StableDiGraph<DepKey, ()>,
    index: HashMap<DepKey, NodeIndex>,
}

impl DepGraph {
    /// Intern `key`, returning its stable index.
    pub(crate) fn intern(&mut self, key: DepKey) -> NodeIndex {
        if let Some(index) = self.index.get(&key) {
            return *index;
        }
        let index = self.graph.add_node(key.clone());
        self.index.insert(key, index);
        index
    }

    /// Record that `dependent` read `dependency`.
    pub(crate) fn add_dependency(&mut self, dependent: NodeIndex, dependency: NodeIndex) {
        self.graph.add_edge(dependent, dependency, ());
    }

    /// Every attribute instance that transitively depends on any of
    /// `roots`, including any root that is itself an attribute.
    ///
    /// Reverse BFS: followers of incoming edges are the dependents.
    pub(crate) fn dependents_of(&self, roots: &[DepKey]) -> Vec<AttrKey> {
        let mut queue: Vec<NodeIndex> = roots
            .iter()
            .filter_map(|key| self.index.get(key).copied())
            .collect();
        let mut seen: HashSet<NodeIndex> = queue.iter().copied().collect();
        let mut dependents = Vec::new();

        while let Some(current) = queue.pop() {
            if let DepKey::Attr(key) = &self.graph[current] {
                dependents.push(key.clone());
            }
            for neighbor in self.graph.neighbors_directed(current, Direction::Incoming) {
                if seen.insert(neighbor) {
                    queue.push(neighbor);
                }
            }
        }
        dependents
    }

    /// Drop an attribute vertex; its edges die with it. Structural facts
    /// referencing it from other entries resolve to "already invalid".
    pub(crate) fn remove(&mut self, key: &DepKey) {
        if let Some(index) = self.index.remove(key) {
            self.graph.remove_node(index);
        }
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.graph.node_count()
    }
}
