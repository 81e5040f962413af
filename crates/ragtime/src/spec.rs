//! The specification lifecycle: declare rules, seal the grammar, declare
//! attribute equations, seal the registry.
//!
//! A [`Specification`] moves through three phases:
//!
//! 1. **Open for AST rules** — [`Specification::ast_rule`] collects rule
//!    declarations.
//! 2. **Open for attribute equations** — entered by
//!    [`Specification::compile_ast_rules`], which seals the kind
//!    hierarchy; [`Specification::attribute`] registers equations against
//!    it.
//! 3. **Sealed** — entered by [`Specification::compile_attributes`]. The
//!    specification is immutable from here on and is shared by reference
//!    with every [`Tree`](crate::tree::Tree) built from it.
//!
//! Calling an operation in the wrong phase is a [`GrammarError::Phase`].

use std::rc::Rc;

use log::debug;

use ragtime_core::{
    grammar::{Grammar, GrammarError, KindId, RuleDecl},
    identifier::Id,
    value::{NodeId, Value},
};

use crate::{
    attribute::{AttributeRegistry, ContextSelector, EquationDecl, KindSelector},
    error::{EvalError, RagError},
    tree::Tree,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    AstRules,
    Attributes,
    Sealed,
}

impl Phase {
    fn name(self) -> &'static str {
        match self {
            Phase::AstRules => "open for AST rules",
            Phase::Attributes => "open for attribute equations",
            Phase::Sealed => "sealed",
        }
    }
}

/// A grammar plus its attribute equations, bound together by the phased
/// lifecycle described in the [module docs](self).
///
/// # Examples
///
/// ```
/// use ragtime::{Specification, Value};
///
/// let mut spec = Specification::new();
/// spec.ast_rule("Root->Number")?;
/// spec.ast_rule("Number->value")?;
/// spec.compile_ast_rules("Root")?;
///
/// spec.attribute("Eval", "Number", "*", true, |tree, node, _args| {
///     tree.terminal(node, "value").map_err(Into::into)
/// })?;
/// spec.compile_attributes()?;
/// # Ok::<(), ragtime::RagError>(())
/// ```
#[derive(Default)]
pub struct Specification {
    phase: Phase,
    rules: Vec<RuleDecl>,
    grammar: Option<Grammar>,
    attributes: AttributeRegistry,
}

impl Default for Phase {
    fn default() -> Self {
        Phase::AstRules
    }
}

impl Specification {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare one grammar rule in the rule mini-language, e.g.
    /// `"Root->Def*<Defs-Exp"`.
    ///
    /// Rules may reference parent kinds declared later; resolution is
    /// deferred to [`compile_ast_rules`](Self::compile_ast_rules).
    pub fn ast_rule(&mut self, rule: &str) -> Result<(), GrammarError> {
        self.expect_phase(Phase::AstRules)?;
        let decl = ragtime_parser::parse_rule(rule)?;
        self.rules.push(decl);
        Ok(())
    }

    /// Seal the kind hierarchy with `root` as the designated root kind and
    /// open the specification for attribute equations.
    pub fn compile_ast_rules(&mut self, root: &str) -> Result<(), GrammarError> {
        self.expect_phase(Phase::AstRules)?;
        let grammar = Grammar::compile(&self.rules, root)?;
        self.grammar = Some(grammar);
        self.phase = Phase::Attributes;
        Ok(())
    }

    /// Register an attribute equation.
    ///
    /// * `name` — the attribute name, e.g. `"Eval"`.
    /// * `kind` — the target kind name, or `"*"` for any kind.
    /// * `context` — the slot name the target node must occupy in its
    ///   parent, or `"*"` for any context.
    /// * `cached` — whether results are memoized. Uncached equations are
    ///   recomputed on every read; their reads are charged to the calling
    ///   evaluation.
    /// * `equation` — a pure function of `(tree, node, args)`.
    pub fn attribute<F>(
        &mut self,
        name: &str,
        kind: &str,
        context: &str,
        cached: bool,
        equation: F,
    ) -> Result<(), GrammarError>
    where
        F: Fn(&Tree, NodeId, &[Value]) -> Result<Value, EvalError> + 'static,
    {
        self.expect_phase(Phase::Attributes)?;
        let grammar = self.grammar.as_ref().expect("grammar compiled");
        let kind_selector = match kind {
            "*" => KindSelector::Any,
            name => match grammar.kind(name) {
                Some(id) => KindSelector::Kind(id),
                None => return Err(GrammarError::UnknownKind(Id::new(name))),
            },
        };
        let context_selector = match context {
            "*" => ContextSelector::Any,
            name => ContextSelector::Name(Id::new(name)),
        };
        self.attributes.declare(EquationDecl {
            name: Id::new(name),
            kind: kind_selector,
            context: context_selector,
            cached,
            equation: Rc::new(equation),
        });
        Ok(())
    }

    /// Seal the attribute registry, resolving per-kind candidate tables.
    pub fn compile_attributes(&mut self) -> Result<(), RagError> {
        self.expect_phase(Phase::Attributes)?;
        let grammar = self.grammar.as_ref().expect("grammar compiled");
        self.attributes
            .compile(grammar)
            .map_err(RagError::Ambiguity)?;
        self.phase = Phase::Sealed;
        debug!(rules = self.rules.len(); "specification sealed");
        Ok(())
    }

    /// The compiled kind hierarchy, once
    /// [`compile_ast_rules`](Self::compile_ast_rules) has run.
    pub fn grammar(&self) -> Option<&Grammar> {
        self.grammar.as_ref()
    }

    /// Whether the whole specification is sealed and trees may be built.
    pub fn is_sealed(&self) -> bool {
        self.phase == Phase::Sealed
    }

    pub(crate) fn sealed_grammar(&self) -> &Grammar {
        self.grammar.as_ref().expect("specification sealed")
    }

    pub(crate) fn resolve_equation(
        &self,
        kind: KindId,
        attribute: Id,
        context: Option<Id>,
    ) -> Option<&EquationDecl> {
        self.attributes.resolve(kind, attribute, context)
    }

    fn expect_phase(&self, expected: Phase) -> Result<(), GrammarError> {
        if self.phase == expected {
            Ok(())
        } else {
            Err(GrammarError::Phase {
                expected: expected.name(),
                actual: self.phase.name(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn math_spec_rules(spec: &mut Specification) {
        for rule in [
            "Root->Def*<Defs-Exp",
            "Def->name-value",
            "Exp->",
            "BinExp:Exp->Exp<A-Exp<B",
            "AddExp:BinExp->",
            "MulExp:BinExp->",
            "Number:Exp->value",
            "Const:Exp->name",
        ] {
            spec.ast_rule(rule).expect("rule should parse");
        }
    }

    fn constant(value: f64) -> impl Fn(&Tree, NodeId, &[Value]) -> Result<Value, EvalError> {
        move |_, _, _| Ok(Value::from(value))
    }

    #[test]
    fn lifecycle_happy_path() {
        let mut spec = Specification::new();
        math_spec_rules(&mut spec);
        spec.compile_ast_rules("Root").unwrap();
        spec.attribute("Eval", "Number", "*", true, constant(1.0))
            .unwrap();
        spec.compile_attributes().unwrap();
        assert!(spec.is_sealed());
    }

    #[test]
    fn rules_after_grammar_seal_are_rejected() {
        let mut spec = Specification::new();
        math_spec_rules(&mut spec);
        spec.compile_ast_rules("Root").unwrap();
        assert!(matches!(
            spec.ast_rule("Late->"),
            Err(GrammarError::Phase { .. })
        ));
    }

    #[test]
    fn attributes_require_compiled_grammar() {
        let mut spec = Specification::new();
        assert!(matches!(
            spec.attribute("Eval", "*", "*", true, constant(0.0)),
            Err(GrammarError::Phase { .. })
        ));
    }

    #[test]
    fn attribute_on_undeclared_kind_is_rejected() {
        let mut spec = Specification::new();
        math_spec_rules(&mut spec);
        spec.compile_ast_rules("Root").unwrap();
        assert_eq!(
            spec.attribute("Eval", "Ghost", "*", true, constant(0.0))
                .unwrap_err(),
            GrammarError::UnknownKind(Id::new("Ghost"))
        );
    }

    #[test]
    fn duplicate_equation_is_ambiguous() {
        let mut spec = Specification::new();
        math_spec_rules(&mut spec);
        spec.compile_ast_rules("Root").unwrap();
        spec.attribute("Eval", "Number", "*", true, constant(1.0))
            .unwrap();
        spec.attribute("Eval", "Number", "*", true, constant(2.0))
            .unwrap();
        assert!(matches!(
            spec.compile_attributes(),
            Err(RagError::Ambiguity(_))
        ));
    }

    #[test]
    fn exact_kind_beats_inherited_and_wildcard() {
        let mut spec = Specification::new();
        math_spec_rules(&mut spec);
        spec.compile_ast_rules("Root").unwrap();
        spec.attribute("Tag", "*", "*", true, constant(0.0)).unwrap();
        spec.attribute("Tag", "Exp", "*", true, constant(1.0)).unwrap();
        spec.attribute("Tag", "BinExp", "*", true, constant(2.0))
            .unwrap();
        spec.compile_attributes().unwrap();

        let grammar = spec.grammar().unwrap();
        let add = grammar.kind("AddExp").unwrap();
        let number = grammar.kind("Number").unwrap();
        let def = grammar.kind("Def").unwrap();
        let tag = Id::new("Tag");

        // AddExp inherits BinExp's equation; Number falls back to Exp's;
        // Def only matches the wildcard.
        let resolved = spec.resolve_equation(add, tag, None).unwrap();
        assert_eq!(resolved.kind, KindSelector::Kind(grammar.kind("BinExp").unwrap()));
        let resolved = spec.resolve_equation(number, tag, None).unwrap();
        assert_eq!(resolved.kind, KindSelector::Kind(grammar.kind("Exp").unwrap()));
        let resolved = spec.resolve_equation(def, tag, None).unwrap();
        assert_eq!(resolved.kind, KindSelector::Any);
    }

    #[test]
    fn context_selector_discriminates_at_equal_kind_specificity() {
        let mut spec = Specification::new();
        math_spec_rules(&mut spec);
        spec.compile_ast_rules("Root").unwrap();
        spec.attribute("Side", "Exp", "*", true, constant(0.0)).unwrap();
        spec.attribute("Side", "Exp", "A", true, constant(1.0)).unwrap();
        spec.compile_attributes().unwrap();

        let grammar = spec.grammar().unwrap();
        let exp = grammar.kind("Exp").unwrap();
        let side = Id::new("Side");

        let in_a = spec.resolve_equation(exp, side, Some(Id::new("A"))).unwrap();
        assert_eq!(in_a.context, ContextSelector::Name(Id::new("A")));
        let in_b = spec.resolve_equation(exp, side, Some(Id::new("B"))).unwrap();
        assert_eq!(in_b.context, ContextSelector::Any);
        let at_root = spec.resolve_equation(exp, side, None).unwrap();
        assert_eq!(at_root.context, ContextSelector::Any);
    }

    #[test]
    fn unknown_attribute_resolves_to_none() {
        let mut spec = Specification::new();
        math_spec_rules(&mut spec);
        spec.compile_ast_rules("Root").unwrap();
        spec.compile_attributes().unwrap();

        let grammar = spec.grammar().unwrap();
        let root = grammar.kind("Root").unwrap();
        assert!(spec.resolve_equation(root, Id::new("Ghost"), None).is_none());
    }
}
