//! End-to-end checks of the public engine surface: specification
//! lifecycle, tree construction, navigation, and equation resolution.

use std::cell::Cell;
use std::rc::Rc;

use ragtime::{
    ChildValue, ConstructionError, EvalError, LookupError, Specification, Tree, Value,
};

fn sealed_spec(rules: &[&str], root: &str) -> Specification {
    let mut spec = Specification::new();
    for rule in rules {
        spec.ast_rule(rule).expect("rule should parse");
    }
    spec.compile_ast_rules(root).expect("grammar should compile");
    spec
}

fn pair_spec() -> Specification {
    sealed_spec(
        &["Root->Exp<A-Exp<B-tag", "Exp->", "Number:Exp->value"],
        "Root",
    )
}

#[test]
fn tree_requires_sealed_spec() {
    let mut spec = Specification::new();
    spec.ast_rule("Root->value").unwrap();
    // Never sealed.
    assert!(Tree::new(Rc::new(spec)).is_err());
}

#[test]
fn construction_rejects_unknown_kind() {
    let mut spec = pair_spec();
    spec.compile_attributes().unwrap();
    let mut tree = Tree::new(Rc::new(spec)).unwrap();
    let err = tree.create_node("Nope", vec![]).unwrap_err();
    assert!(matches!(err, ConstructionError::UnknownKind(_)));
}

#[test]
fn construction_rejects_wrong_arity() {
    let mut spec = pair_spec();
    spec.compile_attributes().unwrap();
    let mut tree = Tree::new(Rc::new(spec)).unwrap();
    let err = tree.create_node("Number", vec![]).unwrap_err();
    assert!(matches!(
        err,
        ConstructionError::Arity {
            expected: 1,
            actual: 0,
            ..
        }
    ));
}

#[test]
fn construction_rejects_shape_mismatch() {
    let mut spec = pair_spec();
    spec.compile_attributes().unwrap();
    let mut tree = Tree::new(Rc::new(spec)).unwrap();
    let n = tree.create_node("Number", vec![ChildValue::from(1.0)]).unwrap();
    // The value slot expects a terminal, not a node.
    let err = tree.create_node("Number", vec![n.into()]).unwrap_err();
    assert!(matches!(err, ConstructionError::SlotMismatch { .. }));
}

#[test]
fn construction_rejects_double_attachment() {
    let mut spec = pair_spec();
    spec.compile_attributes().unwrap();
    let mut tree = Tree::new(Rc::new(spec)).unwrap();
    let n = tree.create_node("Number", vec![ChildValue::from(1.0)]).unwrap();
    let err = tree
        .create_node("Root", vec![n.into(), n.into(), ChildValue::from("t")])
        .unwrap_err();
    assert!(matches!(err, ConstructionError::AlreadyAttached { .. }));
    // The failed call committed nothing.
    assert_eq!(tree.parent(n), None);
}

#[test]
fn node_ids_from_another_tree_are_rejected() {
    let mut spec = pair_spec();
    spec.compile_attributes().unwrap();
    let spec = Rc::new(spec);
    let mut tree = Tree::new(spec.clone()).unwrap();
    let mut other = Tree::new(spec).unwrap();

    let local = tree.create_node("Number", vec![ChildValue::from(1.0)]).unwrap();
    for _ in 0..3 {
        other.create_node("Number", vec![ChildValue::from(2.0)]).unwrap();
    }
    // An id the other tree issued but this tree never did.
    let foreign = other.create_node("Number", vec![ChildValue::from(3.0)]).unwrap();

    let err = tree
        .create_node("Root", vec![local.into(), foreign.into(), ChildValue::from("t")])
        .unwrap_err();
    assert_eq!(err, ConstructionError::UnknownNode(foreign));
    // The failed call committed nothing.
    assert_eq!(tree.parent(local), None);

    let filler = tree.create_node("Exp", vec![]).unwrap();
    let root = tree
        .create_node("Root", vec![local.into(), filler.into(), ChildValue::from("t")])
        .unwrap();
    let err = tree.rewrite_child(root, "A", foreign).unwrap_err();
    assert!(matches!(
        err,
        ragtime::RagError::Construction(ConstructionError::UnknownNode(_))
    ));
    let err = tree.list_append(foreign, "A", local).unwrap_err();
    assert!(matches!(
        err,
        ragtime::RagError::Construction(ConstructionError::UnknownNode(_))
    ));
}

#[test]
fn subkind_fills_supertype_slot() {
    let mut spec = pair_spec();
    spec.compile_attributes().unwrap();
    let mut tree = Tree::new(Rc::new(spec)).unwrap();
    let a = tree.create_node("Number", vec![ChildValue::from(1.0)]).unwrap();
    let b = tree.create_node("Number", vec![ChildValue::from(2.0)]).unwrap();
    let root = tree
        .create_node("Root", vec![a.into(), b.into(), ChildValue::from("t")])
        .unwrap();
    assert_eq!(tree.parent(a), Some(root));
    assert_eq!(tree.parent(b), Some(root));
    assert_eq!(tree.kind_name(a), "Number");
    assert_eq!(tree.context_name(a).unwrap(), "A");
    assert_eq!(tree.context_name(b).unwrap(), "B");
    assert_eq!(tree.context_name(root), None);
    assert_eq!(tree.child(root, "A").unwrap(), a);
    assert_eq!(tree.terminal(root, "tag").unwrap(), Value::from("t"));
}

#[test]
fn list_access_is_zero_based() {
    let mut spec = sealed_spec(&["Root->Num*<Items", "Num->value"], "Root");
    spec.compile_attributes().unwrap();
    let mut tree = Tree::new(Rc::new(spec)).unwrap();
    let first = tree.create_node("Num", vec![ChildValue::from(10.0)]).unwrap();
    let second = tree.create_node("Num", vec![ChildValue::from(20.0)]).unwrap();
    let root = tree
        .create_node("Root", vec![ChildValue::List(vec![first, second])])
        .unwrap();

    assert_eq!(tree.list_len(root, "Items").unwrap(), 2);
    assert_eq!(tree.list_child(root, "Items", 0).unwrap(), first);
    assert_eq!(tree.list_child(root, "Items", 1).unwrap(), second);
    assert_eq!(tree.list_children(root, "Items").unwrap(), vec![first, second]);
    assert!(matches!(
        tree.list_child(root, "Items", 2),
        Err(LookupError::IndexOutOfBounds { index: 2, len: 2, .. })
    ));
    assert!(matches!(
        tree.child(root, "Missing"),
        Err(LookupError::NoSuchSlot { .. })
    ));
    // A list slot read through the single-child accessor is a shape error.
    assert!(matches!(
        tree.child(root, "Items"),
        Err(LookupError::SlotShape { .. })
    ));
}

#[test]
fn equation_resolution_climbs_to_defining_ancestor() {
    let mut spec = pair_spec();
    let calls = Rc::new(Cell::new(0usize));
    let counter = calls.clone();
    spec.attribute("Scope", "Root", "*", true, move |_, _, _| {
        counter.set(counter.get() + 1);
        Ok(Value::from(42i64))
    })
    .unwrap();
    spec.compile_attributes().unwrap();

    let mut tree = Tree::new(Rc::new(spec)).unwrap();
    let a = tree.create_node("Number", vec![ChildValue::from(1.0)]).unwrap();
    let b = tree.create_node("Number", vec![ChildValue::from(2.0)]).unwrap();
    tree.create_node("Root", vec![a.into(), b.into(), ChildValue::from("t")])
        .unwrap();

    // Both leaves resolve to the Root equation and share its one entry.
    assert_eq!(tree.att_value(a, "Scope", &[]).unwrap().as_int().unwrap(), 42);
    assert_eq!(tree.att_value(b, "Scope", &[]).unwrap().as_int().unwrap(), 42);
    assert_eq!(calls.get(), 1);
}

#[test]
fn context_selectors_discriminate_equations() {
    let mut spec = pair_spec();
    spec.attribute("Side", "Exp", "A", true, |_, _, _| Ok(Value::from("left")))
        .unwrap();
    spec.attribute("Side", "Exp", "B", true, |_, _, _| Ok(Value::from("right")))
        .unwrap();
    spec.compile_attributes().unwrap();

    let mut tree = Tree::new(Rc::new(spec)).unwrap();
    let a = tree.create_node("Number", vec![ChildValue::from(1.0)]).unwrap();
    let b = tree.create_node("Number", vec![ChildValue::from(2.0)]).unwrap();
    tree.create_node("Root", vec![a.into(), b.into(), ChildValue::from("t")])
        .unwrap();

    assert_eq!(tree.att_value(a, "Side", &[]).unwrap(), Value::from("left"));
    assert_eq!(tree.att_value(b, "Side", &[]).unwrap(), Value::from("right"));
}

#[test]
fn missing_equation_is_reported_on_the_asked_node() {
    let mut spec = pair_spec();
    spec.compile_attributes().unwrap();
    let mut tree = Tree::new(Rc::new(spec)).unwrap();
    let n = tree.create_node("Number", vec![ChildValue::from(1.0)]).unwrap();
    let err = tree.att_value(n, "Absent", &[]).unwrap_err();
    assert!(matches!(
        err,
        EvalError::Lookup(LookupError::NoEquation { kind, .. }) if kind == "Number"
    ));
}

#[test]
fn self_dependent_attribute_is_circular() {
    let mut spec = pair_spec();
    spec.attribute("Loop", "Number", "*", true, |tree, node, _| {
        tree.att_value(node, "Loop", &[])
    })
    .unwrap();
    spec.compile_attributes().unwrap();

    let mut tree = Tree::new(Rc::new(spec)).unwrap();
    let n = tree.create_node("Number", vec![ChildValue::from(1.0)]).unwrap();
    let err = tree.att_value(n, "Loop", &[]).unwrap_err();
    assert!(matches!(err, EvalError::Circular(_)));
    // The failed read left no poisoned state behind.
    let err = tree.att_value(n, "Loop", &[]).unwrap_err();
    assert!(matches!(err, EvalError::Circular(_)));
}

#[test]
fn uncached_equation_runs_on_every_read() {
    let mut spec = pair_spec();
    let calls = Rc::new(Cell::new(0usize));
    let counter = calls.clone();
    spec.attribute("Tick", "Number", "*", false, move |_, _, _| {
        counter.set(counter.get() + 1);
        Ok(Value::from(0i64))
    })
    .unwrap();
    spec.compile_attributes().unwrap();

    let mut tree = Tree::new(Rc::new(spec)).unwrap();
    let n = tree.create_node("Number", vec![ChildValue::from(1.0)]).unwrap();
    tree.att_value(n, "Tick", &[]).unwrap();
    tree.att_value(n, "Tick", &[]).unwrap();
    assert_eq!(calls.get(), 2);
}

#[test]
fn parameterized_attribute_is_keyed_by_arguments() {
    let mut spec = pair_spec();
    let calls = Rc::new(Cell::new(0usize));
    let counter = calls.clone();
    spec.attribute("Echo", "Number", "*", true, move |_, _, args| {
        counter.set(counter.get() + 1);
        Ok(args[0].clone())
    })
    .unwrap();
    spec.compile_attributes().unwrap();

    let mut tree = Tree::new(Rc::new(spec)).unwrap();
    let n = tree.create_node("Number", vec![ChildValue::from(1.0)]).unwrap();
    let one = [Value::from(1i64)];
    let two = [Value::from(2i64)];
    assert_eq!(tree.att_value(n, "Echo", &one).unwrap(), one[0]);
    assert_eq!(tree.att_value(n, "Echo", &two).unwrap(), two[0]);
    // Each argument vector has its own cache entry.
    assert_eq!(tree.att_value(n, "Echo", &one).unwrap(), one[0]);
    assert_eq!(tree.att_value(n, "Echo", &two).unwrap(), two[0]);
    assert_eq!(calls.get(), 2);
}

#[test]
fn equation_failure_propagates_unchanged() {
    let mut spec = pair_spec();
    spec.attribute("Fail", "Number", "*", true, |_, _, _| {
        Err(EvalError::Failed("no such thing".into()))
    })
    .unwrap();
    spec.compile_attributes().unwrap();

    let mut tree = Tree::new(Rc::new(spec)).unwrap();
    let n = tree.create_node("Number", vec![ChildValue::from(1.0)]).unwrap();
    let err = tree.att_value(n, "Fail", &[]).unwrap_err();
    assert!(matches!(err, EvalError::Failed(message) if message == "no such thing"));
}

#[test]
fn rewrite_rejects_cycle_and_wrong_kind() {
    let mut spec = sealed_spec(
        &["Root->Exp<E", "Exp->", "AddExp:Exp->Exp<A-Exp<B", "Number:Exp->value", "Other->x"],
        "Root",
    );
    spec.compile_attributes().unwrap();
    let mut tree = Tree::new(Rc::new(spec)).unwrap();
    let a = tree.create_node("Number", vec![ChildValue::from(1.0)]).unwrap();
    let b = tree.create_node("Number", vec![ChildValue::from(2.0)]).unwrap();
    let add = tree.create_node("AddExp", vec![a.into(), b.into()]).unwrap();

    // The root of a free tree cannot become a child inside that tree.
    let err = tree.rewrite_child(add, "A", add).unwrap_err();
    assert!(matches!(
        err,
        ragtime::RagError::Construction(ConstructionError::WouldCycle { .. })
    ));

    let root = tree.create_node("Root", vec![add.into()]).unwrap();

    let stray = tree.create_node("Other", vec![ChildValue::from(0i64)]).unwrap();
    let err = tree.rewrite_child(root, "E", stray).unwrap_err();
    assert!(matches!(
        err,
        ragtime::RagError::Construction(ConstructionError::KindMismatch { .. })
    ));

    // An attached node cannot be attached a second time.
    let err = tree.rewrite_child(add, "A", b).unwrap_err();
    assert!(matches!(
        err,
        ragtime::RagError::Construction(ConstructionError::AlreadyAttached { .. })
    ));
}
