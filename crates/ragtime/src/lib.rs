//! ragtime — an incremental reference attribute grammar engine.
//!
//! A grammar declares the shape of an AST as rules with single inheritance
//! between node kinds; attributes are memoized functions of a node's
//! context, declared as per-kind equations; the AST can then be mutated in
//! place while exactly the dependent attribute values are invalidated and
//! lazily recomputed on the next read.
//!
//! The lifecycle is: declare rules, seal the grammar, declare attribute
//! equations, seal the registry, build trees, read attributes, rewrite.
//!
//! # Example
//!
//! ```
//! use std::rc::Rc;
//!
//! use ragtime::{ChildValue, Specification, Tree, Value};
//!
//! fn main() -> Result<(), ragtime::RagError> {
//!     let mut spec = Specification::new();
//!     spec.ast_rule("Root->Exp")?;
//!     spec.ast_rule("Exp->")?;
//!     spec.ast_rule("AddExp:Exp->Exp<A-Exp<B")?;
//!     spec.ast_rule("Number:Exp->value")?;
//!     spec.compile_ast_rules("Root")?;
//!
//!     spec.attribute("Eval", "Root", "*", true, |tree, node, _| {
//!         tree.att_value(tree.child(node, "Exp")?, "Eval", &[])
//!     })?;
//!     spec.attribute("Eval", "AddExp", "*", true, |tree, node, _| {
//!         let a = tree.att_value(tree.child(node, "A")?, "Eval", &[])?.as_float()?;
//!         let b = tree.att_value(tree.child(node, "B")?, "Eval", &[])?.as_float()?;
//!         Ok(Value::from(a + b))
//!     })?;
//!     spec.attribute("Eval", "Number", "*", true, |tree, node, _| {
//!         tree.terminal(node, "value").map_err(Into::into)
//!     })?;
//!     spec.compile_attributes()?;
//!
//!     let mut tree = Tree::new(Rc::new(spec))?;
//!     let two = tree.create_node("Number", vec![ChildValue::from(2.0)])?;
//!     let three = tree.create_node("Number", vec![ChildValue::from(3.0)])?;
//!     let sum = tree.create_node("AddExp", vec![two.into(), three.into()])?;
//!     let root = tree.create_node("Root", vec![sum.into()])?;
//!
//!     assert_eq!(tree.att_value(root, "Eval", &[])?.as_float()?, 5.0);
//!
//!     // Rewriting a terminal invalidates exactly the dependent values;
//!     // the next read recomputes them.
//!     tree.rewrite_terminal(two, "value", 4.0)?;
//!     assert_eq!(tree.att_value(root, "Eval", &[])?.as_float()?, 6.0);
//!     Ok(())
//! }
//! ```

mod attribute;
mod depgraph;
mod error;
mod eval;
mod rewrite;
mod spec;
mod tree;

pub use attribute::Equation;
pub use depgraph::AttrKey;
pub use error::{
    AmbiguityError, CircularDependencyError, ConstructionError, EvalError, LookupError, RagError,
};
pub use spec::Specification;
pub use tree::{ChildValue, Tree};

pub use ragtime_core::{
    grammar::{Grammar, GrammarError, KindId, SlotShape, SlotSpec},
    identifier::Id,
    value::{NodeId, TypeError, Value},
};
