//! Error types for the ragtime engine.
//!
//! Every class is a non-retryable programming error in the grammar,
//! attribute specification, or client code; the engine never recovers
//! automatically. [`RagError`] wraps all of them for callers that want a
//! single error surface.

use thiserror::Error;

use ragtime_core::{
    grammar::GrammarError,
    identifier::Id,
    value::{NodeId, TypeError},
};

/// An AST node was built or attached with the wrong shape.
///
/// Surfaced immediately at the construction or rewrite call; no node is
/// created and no mutation is performed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConstructionError {
    #[error("unknown kind `{0}`")]
    UnknownKind(Id),

    #[error("node {0} was not created by this tree")]
    UnknownNode(NodeId),

    #[error("kind `{kind}` takes {expected} children, {actual} supplied")]
    Arity {
        kind: Id,
        expected: usize,
        actual: usize,
    },

    #[error("slot `{slot}` of kind `{kind}` expects a {expected} child, got a {actual}")]
    SlotMismatch {
        kind: Id,
        slot: Id,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("slot `{slot}` of kind `{kind}` expects kind `{expected}`, got `{actual}`")]
    KindMismatch {
        kind: Id,
        slot: Id,
        expected: Id,
        actual: Id,
    },

    #[error("node {child} already has a parent and cannot be attached to slot `{slot}`")]
    AlreadyAttached { child: NodeId, slot: Id },

    #[error("attaching node {child} would place a node inside its own subtree")]
    WouldCycle { child: NodeId },
}

/// A navigation or equation lookup found no applicable name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LookupError {
    #[error("kind `{kind}` has no slot named `{slot}`")]
    NoSuchSlot { kind: Id, slot: Id },

    #[error("slot `{slot}` of kind `{kind}` holds a {actual}, not a {expected}")]
    SlotShape {
        kind: Id,
        slot: Id,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("index {index} is out of bounds for list slot `{slot}` of length {len}")]
    IndexOutOfBounds { slot: Id, index: usize, len: usize },

    #[error("no equation for attribute `{attribute}` on kind `{kind}`")]
    NoEquation { attribute: Id, kind: Id },
}

/// Two equally specific equations were declared for one
/// (attribute, kind, context) triple.
///
/// Surfaced when the attribute registry is compiled, fatal to the
/// specification.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("duplicate equation for attribute `{attribute}` on kind `{kind}` in context `{context}`")]
pub struct AmbiguityError {
    pub attribute: Id,
    pub kind: Id,
    pub context: Id,
}

/// An attribute evaluation re-entered itself before completing.
///
/// A specification whose attribute transitively depends on itself for the
/// same node and arguments is a bug in the grammar, not a condition the
/// engine resolves silently.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("attribute `{attribute}` of node {node} transitively depends on itself")]
pub struct CircularDependencyError {
    pub node: NodeId,
    pub attribute: Id,
}

/// Failure of an attribute read.
///
/// This is the error type attribute equations themselves return, so every
/// variant can flow out of a nested read unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvalError {
    #[error(transparent)]
    Lookup(#[from] LookupError),

    #[error(transparent)]
    Circular(#[from] CircularDependencyError),

    #[error(transparent)]
    Type(#[from] TypeError),

    /// A domain-level failure raised by an equation body itself, e.g. an
    /// unresolved name in a lookup attribute.
    #[error("equation failed: {0}")]
    Failed(String),
}

/// Umbrella error for every engine operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RagError {
    #[error(transparent)]
    Grammar(#[from] GrammarError),

    #[error(transparent)]
    Construction(#[from] ConstructionError),

    #[error(transparent)]
    Lookup(#[from] LookupError),

    #[error(transparent)]
    Ambiguity(#[from] AmbiguityError),

    #[error(transparent)]
    Circular(#[from] CircularDependencyError),

    #[error(transparent)]
    Type(#[from] TypeError),

    #[error("equation failed: {0}")]
    Equation(String),

    #[error("rewrite attempted while an attribute evaluation is in progress")]
    ActiveEvaluation,
}

impl From<EvalError> for RagError {
    fn from(err: EvalError) -> Self {
        match err {
            EvalError::Lookup(e) => RagError::Lookup(e),
            EvalError::Circular(e) => RagError::Circular(e),
            EvalError::Type(e) => RagError::Type(e),
            EvalError::Failed(message) => RagError::Equation(message),
        }
    }
}
