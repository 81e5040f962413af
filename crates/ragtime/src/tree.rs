//! The AST model: an arena of kinded nodes owned by a [`Tree`].
//!
//! Nodes are created free-floating with [`Tree::create_node`] and composed
//! bottom-up; attaching a child records a non-owning parent back-reference
//! used for context-sensitive equation resolution and invalidation walks.
//! All list access is 0-based.
//!
//! Navigation calls made while an attribute evaluation is in progress
//! transparently record structural dependency facts; outside an
//! evaluation they are plain reads.

use std::cell::RefCell;
use std::rc::Rc;

use ragtime_core::{
    grammar::{GrammarError, KindId, SlotShape, SlotSpec},
    identifier::Id,
    value::{NodeId, Value},
};

use crate::{
    depgraph::DepKey,
    error::{ConstructionError, EvalError, LookupError},
    eval::EvalState,
    spec::Specification,
};

/// A child value supplied to [`Tree::create_node`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChildValue {
    Node(NodeId),
    List(Vec<NodeId>),
    Terminal(Value),
}

impl ChildValue {
    fn shape(&self) -> &'static str {
        match self {
            ChildValue::Node(_) => "node",
            ChildValue::List(_) => "list",
            ChildValue::Terminal(_) => "terminal",
        }
    }
}

impl From<NodeId> for ChildValue {
    fn from(node: NodeId) -> Self {
        ChildValue::Node(node)
    }
}

impl From<Vec<NodeId>> for ChildValue {
    fn from(nodes: Vec<NodeId>) -> Self {
        ChildValue::List(nodes)
    }
}

impl From<Value> for ChildValue {
    fn from(value: Value) -> Self {
        ChildValue::Terminal(value)
    }
}

impl From<f64> for ChildValue {
    fn from(value: f64) -> Self {
        ChildValue::Terminal(Value::from(value))
    }
}

impl From<i64> for ChildValue {
    fn from(value: i64) -> Self {
        ChildValue::Terminal(Value::from(value))
    }
}

impl From<bool> for ChildValue {
    fn from(value: bool) -> Self {
        ChildValue::Terminal(Value::from(value))
    }
}

impl From<&str> for ChildValue {
    fn from(value: &str) -> Self {
        ChildValue::Terminal(Value::from(value))
    }
}

/// Storage for one slot of one node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SlotValue {
    Node(NodeId),
    List(Vec<NodeId>),
    Terminal(Value),
}

impl SlotValue {
    pub(crate) fn shape(&self) -> &'static str {
        match self {
            SlotValue::Node(_) => "node",
            SlotValue::List(_) => "list",
            SlotValue::Terminal(_) => "terminal",
        }
    }
}

#[derive(Debug)]
pub(crate) struct NodeData {
    pub(crate) kind: KindId,
    pub(crate) parent: Option<NodeId>,
    /// Aligned with the kind's full slot list.
    pub(crate) slots: Vec<SlotValue>,
}

/// An AST arena bound to one sealed [`Specification`].
///
/// The tree owns every node it created, attached or not; `NodeId`s stay
/// valid for the tree's lifetime. A subtree detached by a rewrite is a
/// free tree whose root has no parent and may be re-attached later.
pub struct Tree {
    pub(crate) spec: Rc<Specification>,
    pub(crate) nodes: Vec<NodeData>,
    pub(crate) state: RefCell<EvalState>,
}

impl Tree {
    /// Create an empty arena for a sealed specification.
    pub fn new(spec: Rc<Specification>) -> Result<Self, GrammarError> {
        if !spec.is_sealed() {
            return Err(GrammarError::Phase {
                expected: "sealed",
                actual: "unsealed",
            });
        }
        Ok(Self {
            spec,
            nodes: Vec::new(),
            state: RefCell::new(EvalState::default()),
        })
    }

    /// The specification this tree was built against.
    pub fn spec(&self) -> &Rc<Specification> {
        &self.spec
    }

    /// Create a node of `kind` from child values, one per declared slot in
    /// declaration order (inherited slots first).
    ///
    /// Child nodes must belong to this tree, be parentless, and be of the
    /// slot's declared kind or a subkind. On any mismatch the call fails
    /// with a [`ConstructionError`] and no node is created.
    pub fn create_node(
        &mut self,
        kind: &str,
        children: Vec<ChildValue>,
    ) -> Result<NodeId, ConstructionError> {
        let grammar = self.spec.sealed_grammar();
        let kind_name = Id::new(kind);
        let kind_id = grammar
            .kind(kind)
            .ok_or(ConstructionError::UnknownKind(kind_name))?;
        let specs = grammar.slots(kind_id);
        if children.len() != specs.len() {
            return Err(ConstructionError::Arity {
                kind: kind_name,
                expected: specs.len(),
                actual: children.len(),
            });
        }

        // Validate everything before committing anything.
        let mut attached: Vec<NodeId> = Vec::new();
        let mut slots: Vec<SlotValue> = Vec::with_capacity(children.len());
        for (spec, value) in specs.iter().zip(children) {
            match (spec.shape, value) {
                (SlotShape::Node(expected), ChildValue::Node(child)) => {
                    self.check_attachable(child, expected, kind_name, spec, &mut attached)?;
                    slots.push(SlotValue::Node(child));
                }
                (SlotShape::List(expected), ChildValue::List(elements)) => {
                    for element in &elements {
                        self.check_attachable(*element, expected, kind_name, spec, &mut attached)?;
                    }
                    slots.push(SlotValue::List(elements));
                }
                (SlotShape::Terminal, ChildValue::Terminal(value)) => {
                    slots.push(SlotValue::Terminal(value));
                }
                (shape, value) => {
                    return Err(ConstructionError::SlotMismatch {
                        kind: kind_name,
                        slot: spec.name,
                        expected: shape_name(shape),
                        actual: value.shape(),
                    });
                }
            }
        }

        let id = NodeId::from_index(self.nodes.len());
        for child in attached {
            self.nodes[child.index()].parent = Some(id);
        }
        self.nodes.push(NodeData {
            kind: kind_id,
            parent: None,
            slots,
        });
        Ok(id)
    }

    /// The kind of `node`.
    pub fn kind_of(&self, node: NodeId) -> KindId {
        self.data(node).kind
    }

    /// The kind name of `node`.
    pub fn kind_name(&self, node: NodeId) -> Id {
        self.spec.sealed_grammar().kind_name(self.data(node).kind)
    }

    /// The parent of `node`, if it is attached.
    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.data(node).parent
    }

    /// The slot name under which `node` sits in its parent. `None` for a
    /// root or detached node.
    pub fn context_name(&self, node: NodeId) -> Option<Id> {
        let parent = self.data(node).parent?;
        let grammar = self.spec.sealed_grammar();
        let specs = grammar.slots(self.data(parent).kind);
        for (spec, slot) in specs.iter().zip(&self.data(parent).slots) {
            let holds = match slot {
                SlotValue::Node(child) => *child == node,
                SlotValue::List(elements) => elements.contains(&node),
                SlotValue::Terminal(_) => false,
            };
            if holds {
                return Some(spec.name);
            }
        }
        None
    }

    /// Fetch the single child in slot `name`.
    pub fn child(&self, node: NodeId, name: &str) -> Result<NodeId, LookupError> {
        let slot = Id::new(name);
        let (value, _) = self.slot_value(node, slot)?;
        match value {
            SlotValue::Node(child) => {
                let child = *child;
                self.record_slot(node, slot);
                Ok(child)
            }
            other => Err(self.shape_error(node, slot, "node", other.shape())),
        }
    }

    /// Fetch the terminal value in slot `name`.
    pub fn terminal(&self, node: NodeId, name: &str) -> Result<Value, LookupError> {
        let slot = Id::new(name);
        let (value, _) = self.slot_value(node, slot)?;
        match value {
            SlotValue::Terminal(value) => {
                let value = value.clone();
                self.record_slot(node, slot);
                Ok(value)
            }
            other => Err(self.shape_error(node, slot, "terminal", other.shape())),
        }
    }

    /// Number of elements in list slot `name`.
    pub fn list_len(&self, node: NodeId, name: &str) -> Result<usize, LookupError> {
        let slot = Id::new(name);
        let elements = self.list_slot(node, slot)?;
        let len = elements.len();
        self.record_slot(node, slot);
        Ok(len)
    }

    /// Element `index` (0-based) of list slot `name`.
    pub fn list_child(&self, node: NodeId, name: &str, index: usize) -> Result<NodeId, LookupError> {
        let slot = Id::new(name);
        let elements = self.list_slot(node, slot)?;
        let found = elements
            .get(index)
            .copied()
            .ok_or(LookupError::IndexOutOfBounds {
                slot,
                index,
                len: elements.len(),
            })?;
        self.record_slot(node, slot);
        Ok(found)
    }

    /// All elements of list slot `name`, in order.
    pub fn list_children(&self, node: NodeId, name: &str) -> Result<Vec<NodeId>, LookupError> {
        let slot = Id::new(name);
        let elements = self.list_slot(node, slot)?.to_vec();
        self.record_slot(node, slot);
        Ok(elements)
    }

    /// Linear search over list slot `name`: the first element for which
    /// `predicate(index, element)` returns true. The predicate may itself
    /// read attributes and structure.
    pub fn find_child<F>(
        &self,
        node: NodeId,
        name: &str,
        mut predicate: F,
    ) -> Result<Option<NodeId>, EvalError>
    where
        F: FnMut(usize, NodeId) -> Result<bool, EvalError>,
    {
        let elements = self.list_children(node, name)?;
        for (index, element) in elements.into_iter().enumerate() {
            if predicate(index, element)? {
                return Ok(Some(element));
            }
        }
        Ok(None)
    }

    pub(crate) fn data(&self, node: NodeId) -> &NodeData {
        &self.nodes[node.index()]
    }

    // NodeIds are plain indices, so an id minted by another tree could
    // alias an unrelated node here. Every mutation entry point rejects
    // ids this tree never issued.
    pub(crate) fn check_node(&self, node: NodeId) -> Result<(), ConstructionError> {
        if node.index() >= self.nodes.len() {
            return Err(ConstructionError::UnknownNode(node));
        }
        Ok(())
    }

    /// All nodes of the subtree rooted at `root`, root first.
    pub(crate) fn collect_subtree(&self, root: NodeId) -> Vec<NodeId> {
        let mut collected = vec![root];
        let mut cursor = 0;
        while cursor < collected.len() {
            let current = collected[cursor];
            cursor += 1;
            for slot in &self.data(current).slots {
                match slot {
                    SlotValue::Node(child) => collected.push(*child),
                    SlotValue::List(elements) => collected.extend(elements.iter().copied()),
                    SlotValue::Terminal(_) => {}
                }
            }
        }
        collected
    }

    /// Locate slot `name` on `node`, returning storage and spec.
    pub(crate) fn slot_value(
        &self,
        node: NodeId,
        slot: Id,
    ) -> Result<(&SlotValue, &SlotSpec), LookupError> {
        let grammar = self.spec.sealed_grammar();
        let data = self.data(node);
        let specs = grammar.slots(data.kind);
        let index = specs
            .iter()
            .position(|spec| spec.name == slot)
            .ok_or(LookupError::NoSuchSlot {
                kind: grammar.kind_name(data.kind),
                slot,
            })?;
        Ok((&data.slots[index], &specs[index]))
    }

    pub(crate) fn slot_index(&self, node: NodeId, slot: Id) -> Result<usize, LookupError> {
        let grammar = self.spec.sealed_grammar();
        let data = self.data(node);
        grammar
            .slots(data.kind)
            .iter()
            .position(|spec| spec.name == slot)
            .ok_or(LookupError::NoSuchSlot {
                kind: grammar.kind_name(data.kind),
                slot,
            })
    }

    pub(crate) fn record_slot(&self, node: NodeId, slot: Id) {
        self.state.borrow_mut().record(DepKey::Slot(node, slot));
    }

    fn list_slot(&self, node: NodeId, slot: Id) -> Result<&[NodeId], LookupError> {
        let (value, _) = self.slot_value(node, slot)?;
        match value {
            SlotValue::List(elements) => Ok(elements),
            other => Err(self.shape_error(node, slot, "list", other.shape())),
        }
    }

    fn shape_error(
        &self,
        node: NodeId,
        slot: Id,
        expected: &'static str,
        actual: &'static str,
    ) -> LookupError {
        LookupError::SlotShape {
            kind: self.kind_name(node),
            slot,
            expected,
            actual,
        }
    }

    fn check_attachable(
        &self,
        child: NodeId,
        expected: KindId,
        kind: Id,
        spec: &SlotSpec,
        attached: &mut Vec<NodeId>,
    ) -> Result<(), ConstructionError> {
        self.check_node(child)?;
        let grammar = self.spec.sealed_grammar();
        let actual = self.data(child).kind;
        if !grammar.is_subkind_of(actual, expected) {
            return Err(ConstructionError::KindMismatch {
                kind,
                slot: spec.name,
                expected: grammar.kind_name(expected),
                actual: grammar.kind_name(actual),
            });
        }
        if self.data(child).parent.is_some() || attached.contains(&child) {
            return Err(ConstructionError::AlreadyAttached {
                child,
                slot: spec.name,
            });
        }
        attached.push(child);
        Ok(())
    }
}

fn shape_name(shape: SlotShape) -> &'static str {
    match shape {
        SlotShape::Node(_) => "node",
        SlotShape::List(_) => "list",
        SlotShape::Terminal => "terminal",
    }
}
