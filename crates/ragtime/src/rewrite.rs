//! In-place AST mutation with selective invalidation.
//!
//! Every rewrite validates first, mutates second, and invalidates third;
//! a failed validation leaves the tree untouched. Invalidation walks the
//! dependency graph in reverse from the mutated structural fact and drops
//! exactly the cache entries that transitively depended on it. Nothing is
//! recomputed eagerly; the next [`Tree::att_value`] read does that.
//!
//! Replacing or deleting a subtree detaches it rather than destroying it:
//! the returned root is a free tree that may be re-attached later. Cache
//! entries of every node in a moved subtree are flushed wholesale, since
//! their upward context changed.

use log::trace;

use ragtime_core::{
    grammar::{KindId, SlotShape},
    identifier::Id,
    value::{NodeId, Value},
};

use crate::{
    depgraph::DepKey,
    error::{ConstructionError, LookupError, RagError},
    tree::{SlotValue, Tree},
};

impl Tree {
    /// Replace the terminal value in slot `slot` of `node`, returning the
    /// previous value.
    pub fn rewrite_terminal(
        &mut self,
        node: NodeId,
        slot: &str,
        value: impl Into<Value>,
    ) -> Result<Value, RagError> {
        self.ensure_idle()?;
        self.check_node(node)?;
        let slot_id = Id::new(slot);
        let kind = self.kind_name(node);
        let index = self.slot_index(node, slot_id)?;
        let old = match &mut self.nodes[node.index()].slots[index] {
            SlotValue::Terminal(stored) => std::mem::replace(stored, value.into()),
            other => {
                let actual = other.shape();
                return Err(LookupError::SlotShape {
                    kind,
                    slot: slot_id,
                    expected: "terminal",
                    actual,
                }
                .into());
            }
        };
        self.invalidate_slot(node, slot_id);
        Ok(old)
    }

    /// Replace the single-child subtree in slot `slot` of `node`,
    /// returning the detached old subtree root.
    pub fn rewrite_child(
        &mut self,
        node: NodeId,
        slot: &str,
        replacement: NodeId,
    ) -> Result<NodeId, RagError> {
        self.ensure_idle()?;
        self.check_node(node)?;
        let slot_id = Id::new(slot);
        let expected = self.expect_shape(node, slot_id, "node", |shape| match shape {
            SlotShape::Node(kind) => Some(kind),
            _ => None,
        })?;
        self.check_replacement(node, slot_id, replacement, expected)?;

        let index = self.slot_index(node, slot_id)?;
        let old = match &self.nodes[node.index()].slots[index] {
            SlotValue::Node(child) => *child,
            _ => unreachable!("shape checked above"),
        };
        self.nodes[old.index()].parent = None;
        self.nodes[replacement.index()].parent = Some(node);
        self.nodes[node.index()].slots[index] = SlotValue::Node(replacement);

        self.flush_subtree(old);
        self.flush_subtree(replacement);
        self.invalidate_slot(node, slot_id);
        Ok(old)
    }

    /// Insert `element` at `index` (0-based, up to and including the
    /// current length) of list slot `slot`.
    pub fn list_insert(
        &mut self,
        node: NodeId,
        slot: &str,
        index: usize,
        element: NodeId,
    ) -> Result<(), RagError> {
        self.ensure_idle()?;
        self.check_node(node)?;
        let slot_id = Id::new(slot);
        let expected = self.expect_list(node, slot_id)?;
        let len = self.list_storage(node, slot_id).len();
        if index > len {
            return Err(LookupError::IndexOutOfBounds {
                slot: slot_id,
                index,
                len,
            }
            .into());
        }
        self.check_replacement(node, slot_id, element, expected)?;

        self.list_storage_mut(node, slot_id).insert(index, element);
        self.nodes[element.index()].parent = Some(node);

        self.flush_subtree(element);
        self.invalidate_slot(node, slot_id);
        Ok(())
    }

    /// Append `element` to list slot `slot`.
    pub fn list_append(&mut self, node: NodeId, slot: &str, element: NodeId) -> Result<(), RagError> {
        self.check_node(node)?;
        let len = self.list_len(node, slot)?;
        self.list_insert(node, slot, len, element)
    }

    /// Remove and return the element at `index` of list slot `slot`; the
    /// element becomes a detached free tree.
    pub fn list_delete(
        &mut self,
        node: NodeId,
        slot: &str,
        index: usize,
    ) -> Result<NodeId, RagError> {
        self.ensure_idle()?;
        self.check_node(node)?;
        let slot_id = Id::new(slot);
        self.expect_list(node, slot_id)?;
        let len = self.list_storage(node, slot_id).len();
        if index >= len {
            return Err(LookupError::IndexOutOfBounds {
                slot: slot_id,
                index,
                len,
            }
            .into());
        }

        let removed = self.list_storage_mut(node, slot_id).remove(index);
        self.nodes[removed.index()].parent = None;

        self.flush_subtree(removed);
        self.invalidate_slot(node, slot_id);
        Ok(removed)
    }

    /// Replace the element at `index` of list slot `slot`, returning the
    /// detached old element.
    pub fn rewrite_list_element(
        &mut self,
        node: NodeId,
        slot: &str,
        index: usize,
        replacement: NodeId,
    ) -> Result<NodeId, RagError> {
        self.ensure_idle()?;
        self.check_node(node)?;
        let slot_id = Id::new(slot);
        let expected = self.expect_list(node, slot_id)?;
        let len = self.list_storage(node, slot_id).len();
        if index >= len {
            return Err(LookupError::IndexOutOfBounds {
                slot: slot_id,
                index,
                len,
            }
            .into());
        }
        self.check_replacement(node, slot_id, replacement, expected)?;

        let old = std::mem::replace(&mut self.list_storage_mut(node, slot_id)[index], replacement);
        self.nodes[old.index()].parent = None;
        self.nodes[replacement.index()].parent = Some(node);

        self.flush_subtree(old);
        self.flush_subtree(replacement);
        self.invalidate_slot(node, slot_id);
        Ok(old)
    }

    /// Drop every cache entry that depends on slot `slot` of `node`.
    fn invalidate_slot(&mut self, node: NodeId, slot: Id) {
        let state = self.state.get_mut();
        let dropped = state.invalidate(&[DepKey::Slot(node, slot)]);
        trace!(
            node = node.to_string(),
            slot = slot.to_string(),
            dropped;
            "invalidated slot dependents"
        );
    }

    /// Drop every cache entry keyed on a node of the subtree at `root`,
    /// and every entry that depended on one of those.
    fn flush_subtree(&mut self, root: NodeId) {
        let nodes = self.collect_subtree(root);
        let state = self.state.get_mut();
        let roots: Vec<DepKey> = nodes
            .into_iter()
            .flat_map(|node| state.keys_of_node(node))
            .map(DepKey::Attr)
            .collect();
        if !roots.is_empty() {
            let dropped = state.invalidate(&roots);
            trace!(root = root.to_string(), dropped; "flushed subtree cache");
        }
    }

    // The stack can only be non-empty here if a previous evaluation
    // unwound without completing.
    fn ensure_idle(&mut self) -> Result<(), RagError> {
        if self.state.get_mut().in_evaluation() {
            return Err(RagError::ActiveEvaluation);
        }
        Ok(())
    }

    fn check_replacement(
        &self,
        node: NodeId,
        slot: Id,
        replacement: NodeId,
        expected: KindId,
    ) -> Result<(), ConstructionError> {
        self.check_node(replacement)?;
        let grammar = self.spec.sealed_grammar();
        let actual = self.kind_of(replacement);
        if !grammar.is_subkind_of(actual, expected) {
            return Err(ConstructionError::KindMismatch {
                kind: self.kind_name(node),
                slot,
                expected: grammar.kind_name(expected),
                actual: grammar.kind_name(actual),
            });
        }
        if self.parent(replacement).is_some() {
            return Err(ConstructionError::AlreadyAttached {
                child: replacement,
                slot,
            });
        }
        // Attaching an ancestor of the rewrite target would close a loop.
        let mut cursor = Some(node);
        while let Some(current) = cursor {
            if current == replacement {
                return Err(ConstructionError::WouldCycle { child: replacement });
            }
            cursor = self.parent(current);
        }
        Ok(())
    }

    fn expect_shape<T>(
        &self,
        node: NodeId,
        slot: Id,
        expected: &'static str,
        select: impl Fn(SlotShape) -> Option<T>,
    ) -> Result<T, RagError> {
        let (value, spec) = self.slot_value(node, slot)?;
        match select(spec.shape) {
            Some(found) => Ok(found),
            None => Err(LookupError::SlotShape {
                kind: self.kind_name(node),
                slot,
                expected,
                actual: value.shape(),
            }
            .into()),
        }
    }

    fn expect_list(&self, node: NodeId, slot: Id) -> Result<KindId, RagError> {
        self.expect_shape(node, slot, "list", |shape| match shape {
            SlotShape::List(kind) => Some(kind),
            _ => None,
        })
    }

    fn list_storage(&self, node: NodeId, slot: Id) -> &[NodeId] {
        let index = self
            .slot_index(node, slot)
            .expect("slot checked by caller");
        match &self.nodes[node.index()].slots[index] {
            SlotValue::List(elements) => elements,
            _ => unreachable!("shape checked by caller"),
        }
    }

    fn list_storage_mut(&mut self, node: NodeId, slot: Id) -> &mut Vec<NodeId> {
        let index = self
            .slot_index(node, slot)
            .expect("slot checked by caller");
        match &mut self.nodes[node.index()].slots[index] {
            SlotValue::List(elements) => elements,
            _ => unreachable!("shape checked by caller"),
        }
    }
}
