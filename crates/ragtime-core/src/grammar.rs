//! Grammar rules and the compiled kind hierarchy.
//!
//! A grammar is declared as a sequence of [`RuleDecl`]s (usually produced
//! by the rule parser) and compiled into a sealed [`Grammar`]: a forest of
//! [`Kind`]s with single inheritance, where every kind exposes its full,
//! inherited-first list of child slots in declaration order.
//!
//! Resolution is deferred: a rule may name a parent kind that is declared
//! later, and all validation runs in [`Grammar::compile`]. Each violation
//! is reported exactly once, as the first error encountered.

use indexmap::IndexMap;
use log::debug;
use thiserror::Error;

use crate::identifier::Id;

/// Cardinality marker on a child specification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildCard {
    /// Exactly one child node.
    Single,
    /// An ordered list of zero or more child nodes (`*` in the rule syntax).
    List,
}

/// One child specification as written in a rule, before resolution.
///
/// Whether `name` denotes a non-terminal child or a terminal slot is only
/// decided at compile time, by checking it against the declared kinds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildDecl {
    /// Kind name or terminal slot identifier.
    pub name: Id,
    pub card: ChildCard,
    /// Slot name rebinding (`<Name` in the rule syntax).
    pub binding: Option<Id>,
}

/// One unresolved rule declaration: `Kind[:Parent]-><children>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleDecl {
    pub name: Id,
    pub parent: Option<Id>,
    pub children: Vec<ChildDecl>,
}

/// Errors from declaring or compiling grammar rules.
///
/// All variants are fatal to the specification under construction; none
/// is recoverable at runtime.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GrammarError {
    #[error("syntax error in rule `{rule}` at offset {offset}: {message}")]
    Syntax {
        rule: String,
        offset: usize,
        message: String,
    },

    #[error("kind `{0}` is declared twice")]
    DuplicateKind(Id),

    #[error("kind `{kind}` inherits from undeclared kind `{parent}`")]
    UnknownParent { kind: Id, parent: Id },

    #[error("inheritance cycle through kind `{0}`")]
    InheritanceCycle(Id),

    #[error("child `{child}` of kind `{kind}` collides with a child declared by `{ancestor}`")]
    ChildCollision { kind: Id, child: Id, ancestor: Id },

    #[error("root kind `{0}` is not declared")]
    MissingRoot(Id),

    #[error("child `{child}` of kind `{kind}` names no declared kind")]
    UnknownChildKind { kind: Id, child: Id },

    #[error("terminal `{child}` of kind `{kind}` cannot carry a list marker or slot binding")]
    TerminalMarker { kind: Id, child: Id },

    #[error("attribute equation targets undeclared kind `{0}`")]
    UnknownKind(Id),

    #[error("operation requires the {expected} phase, but the specification is {actual}")]
    Phase {
        expected: &'static str,
        actual: &'static str,
    },
}

/// Index of a kind within its compiled [`Grammar`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KindId(u32);

impl KindId {
    fn from_index(index: usize) -> Self {
        Self(index as u32)
    }

    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

/// Resolved shape of one child slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotShape {
    /// A single non-terminal child of the given kind (or a subkind).
    Node(KindId),
    /// An ordered list of non-terminal children of the given kind.
    List(KindId),
    /// A terminal scalar value.
    Terminal,
}

/// A resolved child slot: its name, shape, and the kind that declared it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotSpec {
    pub name: Id,
    pub shape: SlotShape,
    /// Kind whose rule declared this slot (an ancestor for inherited slots).
    pub owner: KindId,
}

/// A compiled node kind.
#[derive(Debug, Clone)]
pub struct Kind {
    name: Id,
    parent: Option<KindId>,
    /// Full slot list: inherited slots first, own slots after, both in
    /// declaration order.
    slots: Vec<SlotSpec>,
    /// Number of leading slots inherited from ancestors.
    inherited: usize,
}

impl Kind {
    pub fn name(&self) -> Id {
        self.name
    }

    pub fn parent(&self) -> Option<KindId> {
        self.parent
    }

    /// All slots, inherited first, in declaration order.
    pub fn slots(&self) -> &[SlotSpec] {
        &self.slots
    }

    /// Slots declared by this kind itself.
    pub fn own_slots(&self) -> &[SlotSpec] {
        &self.slots[self.inherited..]
    }
}

/// The sealed kind hierarchy produced by [`Grammar::compile`].
#[derive(Debug, Clone)]
pub struct Grammar {
    kinds: Vec<Kind>,
    by_name: IndexMap<Id, KindId>,
    root: KindId,
}

impl Grammar {
    /// Compile rule declarations and a designated root kind into a sealed
    /// hierarchy.
    ///
    /// Fails with a [`GrammarError`] when a kind is declared twice, a
    /// parent or uppercase child kind is undeclared, inheritance cycles,
    /// a child name collides along the inheritance chain, a terminal
    /// carries a list marker or binding, or the root kind is absent.
    pub fn compile(rules: &[RuleDecl], root: &str) -> Result<Self, GrammarError> {
        let mut by_name: IndexMap<Id, KindId> = IndexMap::with_capacity(rules.len());
        for (index, rule) in rules.iter().enumerate() {
            if by_name
                .insert(rule.name, KindId::from_index(index))
                .is_some()
            {
                return Err(GrammarError::DuplicateKind(rule.name));
            }
        }

        let root_id = Id::new(root);
        let root = *by_name
            .get(&root_id)
            .ok_or(GrammarError::MissingRoot(root_id))?;

        // Resolve parents and reject cycles before slot resolution, which
        // recurses along the parent chain.
        let mut parents: Vec<Option<KindId>> = Vec::with_capacity(rules.len());
        for rule in rules {
            match rule.parent {
                None => parents.push(None),
                Some(parent) => match by_name.get(&parent) {
                    Some(id) => parents.push(Some(*id)),
                    None => {
                        return Err(GrammarError::UnknownParent {
                            kind: rule.name,
                            parent,
                        });
                    }
                },
            }
        }
        for (index, rule) in rules.iter().enumerate() {
            let mut cursor = parents[index];
            let mut steps = 0;
            while let Some(parent) = cursor {
                steps += 1;
                if steps > rules.len() {
                    return Err(GrammarError::InheritanceCycle(rule.name));
                }
                cursor = parents[parent.index()];
            }
        }

        // Full slot lists, parent slots first. Kinds are resolved in an
        // order where every parent precedes its children.
        let order = inheritance_order(&parents);
        let mut slots: Vec<Option<Vec<SlotSpec>>> = vec![None; rules.len()];
        for index in order {
            let rule = &rules[index];
            let kind = KindId::from_index(index);
            let mut resolved: Vec<SlotSpec> = match parents[index] {
                Some(parent) => slots[parent.index()]
                    .as_ref()
                    .expect("parent resolved before child")
                    .clone(),
                None => Vec::new(),
            };
            for child in &rule.children {
                let spec = resolve_child(rule.name, kind, child, &by_name)?;
                if let Some(existing) = resolved.iter().find(|s| s.name == spec.name) {
                    return Err(GrammarError::ChildCollision {
                        kind: rule.name,
                        child: spec.name,
                        ancestor: rules[existing.owner.index()].name,
                    });
                }
                resolved.push(spec);
            }
            slots[index] = Some(resolved);
        }

        let kinds = rules
            .iter()
            .enumerate()
            .map(|(index, rule)| {
                let slots = slots[index].take().expect("all kinds resolved");
                // The inherited prefix is everything before this rule's own
                // children.
                let inherited = slots.len() - rule.children.len();
                Kind {
                    name: rule.name,
                    parent: parents[index],
                    slots,
                    inherited,
                }
            })
            .collect();

        let grammar = Grammar {
            kinds,
            by_name,
            root,
        };
        debug!(
            kinds = grammar.kinds.len(),
            root = grammar.kind_name(grammar.root).to_string();
            "compiled grammar"
        );
        Ok(grammar)
    }

    /// Look up a kind by name.
    pub fn kind(&self, name: &str) -> Option<KindId> {
        self.by_name.get(&Id::new(name)).copied()
    }

    pub fn kind_name(&self, kind: KindId) -> Id {
        self.kinds[kind.index()].name
    }

    pub fn parent(&self, kind: KindId) -> Option<KindId> {
        self.kinds[kind.index()].parent
    }

    /// The designated root kind.
    pub fn root(&self) -> KindId {
        self.root
    }

    /// All kinds, in declaration order.
    pub fn kinds(&self) -> impl Iterator<Item = (KindId, &Kind)> {
        self.kinds
            .iter()
            .enumerate()
            .map(|(index, kind)| (KindId::from_index(index), kind))
    }

    /// Full slot list of `kind`, inherited first, in declaration order.
    pub fn slots(&self, kind: KindId) -> &[SlotSpec] {
        self.kinds[kind.index()].slots()
    }

    /// Find a slot of `kind` by name.
    pub fn slot(&self, kind: KindId, name: Id) -> Option<&SlotSpec> {
        self.kinds[kind.index()]
            .slots()
            .iter()
            .find(|slot| slot.name == name)
    }

    /// `kind` itself followed by its ancestors up to the hierarchy root.
    pub fn ancestry(&self, kind: KindId) -> impl Iterator<Item = KindId> + '_ {
        std::iter::successors(Some(kind), |current| self.parent(*current))
    }

    /// Whether `kind` equals `ancestor` or inherits from it.
    pub fn is_subkind_of(&self, kind: KindId, ancestor: KindId) -> bool {
        self.ancestry(kind).any(|k| k == ancestor)
    }
}

// Slot resolution needs `slots[parent]` before `slots[child]`; walk each
// chain root-first.
fn inheritance_order(parents: &[Option<KindId>]) -> Vec<usize> {
    let mut order = Vec::with_capacity(parents.len());
    let mut done = vec![false; parents.len()];
    for start in 0..parents.len() {
        let mut chain = Vec::new();
        let mut cursor = Some(start);
        while let Some(index) = cursor {
            if done[index] {
                break;
            }
            chain.push(index);
            cursor = parents[index].map(|p| p.index());
        }
        for index in chain.into_iter().rev() {
            done[index] = true;
            order.push(index);
        }
    }
    order
}

fn resolve_child(
    kind_name: Id,
    kind: KindId,
    child: &ChildDecl,
    by_name: &IndexMap<Id, KindId>,
) -> Result<SlotSpec, GrammarError> {
    if let Some(child_kind) = by_name.get(&child.name) {
        let shape = match child.card {
            ChildCard::Single => SlotShape::Node(*child_kind),
            ChildCard::List => SlotShape::List(*child_kind),
        };
        return Ok(SlotSpec {
            name: child.binding.unwrap_or(child.name),
            shape,
            owner: kind,
        });
    }

    // Not a declared kind: a terminal slot. Uppercase identifiers are
    // reserved for kinds, so an unmatched one is a typo, not a terminal.
    let text = child.name.resolve();
    if text.chars().next().is_some_and(|c| c.is_ascii_uppercase()) {
        return Err(GrammarError::UnknownChildKind {
            kind: kind_name,
            child: child.name,
        });
    }
    if child.card == ChildCard::List || child.binding.is_some() {
        return Err(GrammarError::TerminalMarker {
            kind: kind_name,
            child: child.name,
        });
    }
    Ok(SlotSpec {
        name: child.name,
        shape: SlotShape::Terminal,
        owner: kind,
    })
}
