//! Winnow combinators for the grammar-rule mini-language.
//!
//! A rule has the shape `Kind[:Parent]-><children>` where `<children>` is
//! zero or more child specs separated by `-`, and a child spec is
//! `ident ['*'] ['<' ident]`. There is no whitespace inside a rule.

use winnow::{
    ModalResult, Parser,
    combinator::{opt, preceded, separated},
    error::{StrContext, StrContextValue},
    token::{one_of, take_while},
};

use ragtime_core::{
    grammar::{ChildCard, ChildDecl, RuleDecl},
    identifier::Id,
};

type Input<'src> = &'src str;

/// An identifier: an ASCII letter followed by letters, digits, or `_`.
fn identifier<'src>(input: &mut Input<'src>) -> ModalResult<&'src str> {
    (
        one_of(|c: char| c.is_ascii_alphabetic()),
        take_while(0.., |c: char| c.is_ascii_alphanumeric() || c == '_'),
    )
        .take()
        .context(StrContext::Expected(StrContextValue::Description(
            "identifier",
        )))
        .parse_next(input)
}

/// One child spec: `ident ['*'] ['<' ident]`.
///
/// Whether the identifier denotes a kind or a terminal slot is decided at
/// grammar compile time; here it is kept verbatim.
fn child_decl(input: &mut Input<'_>) -> ModalResult<ChildDecl> {
    let name = identifier.parse_next(input)?;
    let star = opt('*').parse_next(input)?;
    let binding = opt(preceded('<', identifier)).parse_next(input)?;
    Ok(ChildDecl {
        name: Id::new(name),
        card: if star.is_some() {
            ChildCard::List
        } else {
            ChildCard::Single
        },
        binding: binding.map(Id::new),
    })
}

/// A complete rule declaration.
pub(crate) fn rule_decl(input: &mut Input<'_>) -> ModalResult<RuleDecl> {
    let name = identifier
        .context(StrContext::Label("kind name"))
        .parse_next(input)?;
    let parent = opt(preceded(':', identifier))
        .context(StrContext::Label("parent kind"))
        .parse_next(input)?;
    let _ = "->"
        .context(StrContext::Expected(StrContextValue::StringLiteral("->")))
        .parse_next(input)?;
    let children: Vec<ChildDecl> = separated(0.., child_decl, '-')
        .context(StrContext::Label("child specs"))
        .parse_next(input)?;
    Ok(RuleDecl {
        name: Id::new(name),
        parent: parent.map(Id::new),
        children,
    })
}
