//! Attribute equation registry and resolution tables.
//!
//! Equations are declared against a kind selector (a kind name or the `*`
//! wildcard) and a context selector (the slot name under which the target
//! node sits in its parent, or `*`). Compiling the registry precomputes,
//! for every reachable (kind, attribute) pair, the candidate equations
//! ordered by specificity; read-time resolution then only scans that list
//! for the first matching context.

use std::collections::HashMap;
use std::rc::Rc;

use log::debug;

use ragtime_core::{
    grammar::{Grammar, KindId},
    identifier::Id,
    value::{NodeId, Value},
};

use crate::{
    error::{AmbiguityError, EvalError},
    tree::Tree,
};

/// An attribute equation: a pure function of the tree, the target node,
/// and the attribute arguments.
pub type Equation = Rc<dyn Fn(&Tree, NodeId, &[Value]) -> Result<Value, EvalError>>;

/// Which kinds an equation applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum KindSelector {
    Any,
    Kind(KindId),
}

/// Which calling contexts an equation applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ContextSelector {
    Any,
    Name(Id),
}

impl ContextSelector {
    fn matches(&self, context: Option<Id>) -> bool {
        match self {
            ContextSelector::Any => true,
            ContextSelector::Name(name) => context == Some(*name),
        }
    }

    fn display(&self) -> Id {
        match self {
            ContextSelector::Any => Id::new("*"),
            ContextSelector::Name(name) => *name,
        }
    }
}

pub(crate) struct EquationDecl {
    pub(crate) name: Id,
    pub(crate) kind: KindSelector,
    pub(crate) context: ContextSelector,
    pub(crate) cached: bool,
    pub(crate) equation: Equation,
}

/// The attribute equation table: open for declarations until
/// [`AttributeRegistry::compile`] seals it.
#[derive(Default)]
pub(crate) struct AttributeRegistry {
    decls: Vec<EquationDecl>,
    /// Candidate declaration indices per (kind, attribute), most specific
    /// first. Populated by `compile`.
    table: HashMap<(KindId, Id), Vec<usize>>,
}

impl AttributeRegistry {
    pub(crate) fn declare(&mut self, decl: EquationDecl) {
        self.decls.push(decl);
    }

    /// Seal the registry against `grammar`.
    ///
    /// Two equations with identical (attribute, kind selector, context
    /// selector) would be equally specific everywhere they apply, so they
    /// are rejected here rather than at read time.
    pub(crate) fn compile(&mut self, grammar: &Grammar) -> Result<(), AmbiguityError> {
        for (i, a) in self.decls.iter().enumerate() {
            for b in &self.decls[i + 1..] {
                if a.name == b.name && a.kind == b.kind && a.context == b.context {
                    let kind = match a.kind {
                        KindSelector::Any => Id::new("*"),
                        KindSelector::Kind(id) => grammar.kind_name(id),
                    };
                    return Err(AmbiguityError {
                        attribute: a.name,
                        kind,
                        context: a.context.display(),
                    });
                }
            }
        }

        let mut table: HashMap<(KindId, Id), Vec<usize>> = HashMap::new();
        for (kind, _) in grammar.kinds() {
            let ancestry: Vec<KindId> = grammar.ancestry(kind).collect();
            let wildcard_rank = ancestry.len();
            let mut per_name: HashMap<Id, Vec<(usize, usize, usize)>> = HashMap::new();
            for (index, decl) in self.decls.iter().enumerate() {
                let kind_rank = match decl.kind {
                    KindSelector::Any => wildcard_rank,
                    KindSelector::Kind(target) => {
                        match ancestry.iter().position(|k| *k == target) {
                            Some(distance) => distance,
                            None => continue,
                        }
                    }
                };
                let context_rank = match decl.context {
                    ContextSelector::Name(_) => 0,
                    ContextSelector::Any => 1,
                };
                per_name
                    .entry(decl.name)
                    .or_default()
                    .push((kind_rank, context_rank, index));
            }
            for (name, mut candidates) in per_name {
                candidates.sort();
                table.insert(
                    (kind, name),
                    candidates.into_iter().map(|(_, _, index)| index).collect(),
                );
            }
        }

        debug!(
            equations = self.decls.len(),
            entries = table.len();
            "compiled attribute specifications"
        );
        self.table = table;
        Ok(())
    }

    /// Most specific equation for `attribute` on a node of `kind` sitting
    /// in `context` (its slot name in its parent; `None` for a root).
    pub(crate) fn resolve(
        &self,
        kind: KindId,
        attribute: Id,
        context: Option<Id>,
    ) -> Option<&EquationDecl> {
        let candidates = self.table.get(&(kind, attribute))?;
        candidates
            .iter()
            .map(|index| &self.decls[*index])
            .find(|decl| decl.context.matches(context))
    }
}
