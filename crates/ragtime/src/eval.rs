//! The incremental evaluator: lazy attribute reads with memoization and
//! dependency recording.
//!
//! Every attribute read flows through [`Tree::att_value`]. A read with a
//! valid cache entry returns immediately; otherwise the resolved equation
//! runs inside a fresh evaluation frame, and every nested attribute or
//! structural read performed during the run is appended to that frame as a
//! dependency edge. When the frame completes, a cached equation stores its
//! value and edge set wholesale; an uncached equation stores nothing and
//! charges its reads to the calling frame instead. A failed evaluation
//! also stores nothing and charges its reads to the calling frame, so a
//! caller that absorbs the error still carries the recorded dependencies.

use std::collections::{HashMap, HashSet};

use indexmap::IndexSet;
use log::trace;

use ragtime_core::{
    identifier::Id,
    value::{NodeId, Value},
};

use crate::{
    depgraph::{AttrKey, DepGraph, DepKey},
    error::{CircularDependencyError, EvalError, LookupError},
    tree::Tree,
};

/// One in-progress attribute evaluation.
struct Frame {
    key: AttrKey,
    cached: bool,
    deps: IndexSet<DepKey>,
}

/// Mutable evaluation state of a [`Tree`]: the memo cache, the dependency
/// graph, and the stack of in-progress evaluations.
///
/// A cache entry's validity is its presence; invalidation removes the
/// entry and its graph vertex wholesale, and recomputation re-creates
/// both.
#[derive(Default)]
pub(crate) struct EvalState {
    cache: HashMap<AttrKey, Value>,
    /// Cache keys per node, for wholesale flushes when a subtree moves.
    by_node: HashMap<NodeId, HashSet<AttrKey>>,
    graph: DepGraph,
    stack: Vec<Frame>,
}

impl EvalState {
    /// Append a dependency to the innermost in-progress evaluation, if
    /// any. Reads outside an evaluation record nothing.
    pub(crate) fn record(&mut self, key: DepKey) {
        if let Some(frame) = self.stack.last_mut() {
            frame.deps.insert(key);
        }
    }

    pub(crate) fn in_evaluation(&self) -> bool {
        !self.stack.is_empty()
    }

    /// Remove every cache entry in the reverse-reachability closure of
    /// `roots`, returning how many entries were dropped.
    pub(crate) fn invalidate(&mut self, roots: &[DepKey]) -> usize {
        let victims = self.graph.dependents_of(roots);
        let count = victims.len();
        for key in victims {
            self.cache.remove(&key);
            if let Some(keys) = self.by_node.get_mut(&key.node) {
                keys.remove(&key);
            }
            self.graph.remove(&DepKey::Attr(key));
        }
        count
    }

    /// Cache keys currently stored for `node`.
    pub(crate) fn keys_of_node(&self, node: NodeId) -> Vec<AttrKey> {
        self.by_node
            .get(&node)
            .map(|keys| keys.iter().cloned().collect())
            .unwrap_or_default()
    }

    #[cfg(test)]
    pub(crate) fn cache_len(&self) -> usize {
        self.cache.len()
    }
}

impl Tree {
    /// Read attribute `attribute` of `node`, with arguments.
    ///
    /// This is the sole attribute read entry point; equations receive the
    /// tree and call it re-entrantly for nested reads. A read served from
    /// cache invokes no equation. Re-entering an evaluation that is
    /// already in progress for the same (node, attribute, arguments) key
    /// fails with [`CircularDependencyError`].
    ///
    /// If no equation applies at `node` itself, resolution climbs the
    /// parent chain and evaluates at the closest ancestor that defines
    /// the attribute; the result is keyed on that ancestor, so every
    /// descendant shares one cache entry.
    pub fn att_value(
        &self,
        node: NodeId,
        attribute: &str,
        args: &[Value],
    ) -> Result<Value, EvalError> {
        let attr = Id::new(attribute);

        // Find the defining node: `node` or its closest ancestor whose
        // kind and context have an applicable equation.
        let mut target = node;
        let decl = loop {
            let kind = self.kind_of(target);
            let context = self.context_name(target);
            if let Some(decl) = self.spec.resolve_equation(kind, attr, context) {
                break decl;
            }
            match self.parent(target) {
                Some(parent) => target = parent,
                None => {
                    return Err(LookupError::NoEquation {
                        attribute: attr,
                        kind: self.kind_name(node),
                    }
                    .into());
                }
            }
        };
        let key = AttrKey {
            node: target,
            attribute: attr,
            args: args.to_vec(),
        };

        {
            let mut state = self.state.borrow_mut();
            if let Some(value) = state.cache.get(&key).cloned() {
                trace!(node = target.to_string(), attribute = attribute; "attribute cache hit");
                state.record(DepKey::Attr(key));
                return Ok(value);
            }
            if state.stack.iter().any(|frame| frame.key == key) {
                return Err(CircularDependencyError {
                    node: target,
                    attribute: attr,
                }
                .into());
            }
        }

        let cached = decl.cached;
        let equation = decl.equation.clone();

        {
            let mut state = self.state.borrow_mut();
            if cached {
                // The caller depends on this memoized instance; uncached
                // equations stay invisible and flatten instead.
                state.record(DepKey::Attr(key.clone()));
            }
            state.stack.push(Frame {
                key: key.clone(),
                cached,
                deps: IndexSet::new(),
            });
        }
        trace!(node = target.to_string(), attribute = attribute; "attribute cache miss");

        let result = equation(self, target, args);

        let mut state = self.state.borrow_mut();
        let frame = state.stack.pop().expect("evaluation frame present");
        debug_assert!(frame.key == key);
        let value = match result {
            Ok(value) => value,
            Err(err) => {
                // A caller may catch the error and cache a fallback value;
                // that value still depends on everything the failed
                // evaluation read.
                if let Some(caller) = state.stack.last_mut() {
                    caller.deps.extend(frame.deps);
                }
                return Err(err);
            }
        };

        if frame.cached {
            let dependent = state.graph.intern(DepKey::Attr(key.clone()));
            for dep in frame.deps {
                let dependency = state.graph.intern(dep);
                state.graph.add_dependency(dependent, dependency);
            }
            state.cache.insert(key.clone(), value.clone());
            state.by_node.entry(target).or_default().insert(key);
        } else if let Some(caller) = state.stack.last_mut() {
            caller.deps.extend(frame.deps);
        }

        Ok(value)
    }
}
