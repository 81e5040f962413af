//! Parser for the ragtime grammar-rule mini-language.
//!
//! Grammars are declared one rule at a time in a compact notation:
//!
//! ```text
//! Root->Def*<Defs-Exp      Root has a list of Defs and a single Exp
//! Def->name-value          Def has two terminal slots
//! BinExp:Exp->Exp<A-Exp<B  BinExp inherits Exp, adds children A and B
//! AddExp:BinExp->          AddExp inherits everything from BinExp
//! ```
//!
//! Per child spec, `*` marks an ordered list child and `<name` rebinds the
//! slot name. Whether an identifier denotes a non-terminal kind or a
//! terminal scalar slot is resolved later, against the set of declared
//! kinds, when the grammar is compiled.
//!
//! The entry point is [`parse_rule`].

mod rule;

use log::trace;

use ragtime_core::grammar::{GrammarError, RuleDecl};
use winnow::Parser as _;

/// Parse a single rule declaration.
///
/// Surrounding whitespace is ignored; the rule body itself allows none.
/// Syntax failures map to [`GrammarError::Syntax`] with the byte offset of
/// the failure within the trimmed rule.
///
/// # Examples
///
/// ```
/// use ragtime_parser::parse_rule;
///
/// let decl = parse_rule("BinExp:Exp->Exp<A-Exp<B").unwrap();
/// assert_eq!(decl.name.to_string(), "BinExp");
/// assert_eq!(decl.children.len(), 2);
/// ```
pub fn parse_rule(source: &str) -> Result<RuleDecl, GrammarError> {
    let trimmed = source.trim();
    match rule::rule_decl.parse(trimmed) {
        Ok(decl) => {
            trace!(rule = trimmed, kind = decl.name.to_string(); "parsed rule");
            Ok(decl)
        }
        Err(err) => Err(GrammarError::Syntax {
            rule: trimmed.to_owned(),
            offset: err.offset(),
            message: err.inner().to_string(),
        }),
    }
}
