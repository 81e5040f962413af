//! Integration tests for the rule mini-language parser.

use ragtime_core::{
    grammar::{ChildCard, GrammarError},
    identifier::Id,
};
use ragtime_parser::parse_rule;

#[test]
fn parses_the_full_math_grammar() {
    let rules = [
        "Root->Def*<Defs-Exp",
        "Def->name-value",
        "Exp->",
        "BinExp:Exp->Exp<A-Exp<B",
        "AddExp:BinExp->",
        "MulExp:BinExp->",
        "Number:Exp->value",
        "Const:Exp->name",
    ];

    for rule in rules {
        parse_rule(rule).unwrap_or_else(|err| panic!("rule `{rule}` should parse: {err}"));
    }
}

#[test]
fn surrounding_whitespace_is_ignored() {
    let decl = parse_rule("  Exp->\n").expect("should parse");
    assert_eq!(decl.name, Id::new("Exp"));
}

#[test]
fn reports_offset_of_syntax_error() {
    let err = parse_rule("Root->Def*<Defs-!").expect_err("should fail");
    match err {
        GrammarError::Syntax { rule, offset, .. } => {
            assert_eq!(rule, "Root->Def*<Defs-!");
            // Parsing stops at the `-` that starts the unparsable tail.
            assert_eq!(offset, 15);
        }
        other => panic!("expected syntax error, got {other:?}"),
    }
}

#[test]
fn identifiers_may_contain_underscores_and_digits() {
    let decl = parse_rule("VarDecl->var_name-value2").expect("should parse");
    assert_eq!(decl.children[0].name, Id::new("var_name"));
    assert_eq!(decl.children[1].name, Id::new("value2"));
    // The leading character must still be a letter.
    assert!(parse_rule("_Decl->name").is_err());
    assert!(parse_rule("Decl->_name").is_err());
}

#[test]
fn rejects_interior_whitespace() {
    assert!(parse_rule("Root -> Exp").is_err());
}

#[test]
fn rejects_missing_kind_name() {
    assert!(parse_rule("->Exp").is_err());
    assert!(parse_rule("").is_err());
}

#[test]
fn list_marker_and_binding_survive_round_trip() {
    let decl = parse_rule("Block->Stmt*<Body-label").expect("should parse");
    assert_eq!(decl.children[0].card, ChildCard::List);
    assert_eq!(decl.children[0].binding, Some(Id::new("Body")));
    assert_eq!(decl.children[1].card, ChildCard::Single);
    assert_eq!(decl.children[1].name, Id::new("label"));
}
