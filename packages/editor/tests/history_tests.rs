//! Integration tests for single-document history

use anyhow::Result;
use snaptree_editor::{
    AddressSchema, DiffStack, Document, Element, HistoryConfig, HistoryEvent, Locator, MergeHint,
    MergeParams, Mutation, NodeAddress, SnapshotOutcome, Step,
};
use std::cell::RefCell;
use std::rc::Rc;

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn addr(s: &str) -> NodeAddress {
    s.parse().unwrap()
}

/// vle_project
///   structures
///     model name=top
///       in / out ports
///       submodels: A, B (B has submodels C)
///       connections
fn project() -> Element {
    Element::new("vle_project").with_child(
        Element::new("structures").with_child(
            Element::new("model")
                .with_attr("name", "top")
                .with_child(Element::new("in").with_child(Element::new("port").with_attr("name", "i1")))
                .with_child(Element::new("out").with_child(Element::new("port").with_attr("name", "o1")))
                .with_child(
                    Element::new("submodels")
                        .with_child(Element::new("model").with_attr("name", "A").with_attr("x", "1"))
                        .with_child(
                            Element::new("model").with_attr("name", "B").with_child(
                                Element::new("submodels")
                                    .with_child(Element::new("model").with_attr("name", "C")),
                            ),
                        ),
                )
                .with_child(Element::new("connections")),
        ),
    )
}

const TOP: &str = "./vle_project/structures/model[@name=\"top\"]";

fn model(name: &str) -> NodeAddress {
    addr(&format!("{}/submodels/model[@name=\"{}\"]", TOP, name))
}

fn document() -> Document {
    init_tracing();
    Document::new(project(), AddressSchema::project(), &HistoryConfig::default())
}

fn set_x(value: &str) -> Mutation {
    Mutation::SetAttribute {
        target: model("A"),
        name: "x".to_string(),
        value: value.to_string(),
    }
}

fn collect_locators(node: &Element, at: Locator, out: &mut Vec<Locator>) {
    out.push(at.clone());
    for (index, child) in node.children.iter().enumerate() {
        collect_locators(child, at.child(index), out);
    }
}

#[test]
fn test_address_round_trip_for_every_node() -> Result<()> {
    let root = project();
    let schema = AddressSchema::project();
    let mut locators = Vec::new();
    collect_locators(&root, Locator::root(), &mut locators);

    for locator in locators {
        let address = schema.address_of(&root, &locator)?;
        assert_eq!(schema.locate(&root, &address), Some(locator.clone()), "{}", address);
    }

    Ok(())
}

#[test]
fn test_undo_inverts_structural_edit() -> Result<()> {
    let mut doc = document();
    let before = doc.root().clone();

    doc.apply(&Mutation::RemoveChild { target: model("B") })?;
    assert!(doc.node(&model("B")).is_none());

    doc.undo().unwrap();
    assert_eq!(doc.root(), &before);

    Ok(())
}

#[test]
fn test_undo_redo_round_trip() -> Result<()> {
    let mut doc = document();
    doc.apply(&Mutation::InsertChild {
        parent: addr(&format!("{}/connections", TOP)),
        index: 0,
        element: Element::new("connection").with_attr("type", "internal"),
    })?;
    let edited = doc.root().clone();

    doc.undo().unwrap();
    assert_ne!(doc.root(), &edited);
    doc.redo().unwrap();
    assert_eq!(doc.root(), &edited);

    Ok(())
}

#[test]
fn test_repeated_edits_collapse_into_one_step() -> Result<()> {
    let mut doc = document();
    for i in 2..12 {
        doc.apply(&set_x(&i.to_string()))?;
    }

    assert_eq!(doc.history().len(), 2);
    doc.undo().unwrap();
    assert_eq!(doc.node(&model("A")).unwrap().attr("x"), Some("1"));
    assert!(!doc.can_undo());

    Ok(())
}

#[test]
fn test_concrete_merge_scenario() -> Result<()> {
    init_tracing();
    let mut root = Element::new("R").with_child(Element::new("A").with_attr("name", "A").with_attr("x", "1"));
    let schema = AddressSchema::new("R").with_keyed(["A"]);
    let mut stack = DiffStack::new(schema, &HistoryConfig::default(), &root);
    let a = Locator::from(vec![0]);
    let hint = || Some(MergeHint::new("setx", MergeParams::query("A")));

    stack.snapshot_with(&root, &a, hint())?;
    root.get_mut(&a).unwrap().set_attr("x", "2");
    stack.snapshot_with(&root, &a, hint())?;
    root.get_mut(&a).unwrap().set_attr("x", "3");

    assert_eq!(stack.len(), 2);

    stack.undo(&mut root).unwrap();
    assert_eq!(root.get(&a).unwrap().attr("x"), Some("1"));

    stack.redo(&mut root).unwrap();
    assert_eq!(root.get(&a).unwrap().attr("x"), Some("3"));

    Ok(())
}

#[test]
fn test_availability_changes_only_on_edges() -> Result<()> {
    let mut doc = document();
    let flips = Rc::new(RefCell::new(Vec::new()));
    let sink = flips.clone();
    doc.history_mut().add_listener(move |event: &HistoryEvent| {
        if let HistoryEvent::UndoAvailabilityChanged(available) = event {
            sink.borrow_mut().push(*available);
        }
    });

    doc.mark_saved();
    assert!(flips.borrow().is_empty());

    doc.apply(&set_x("2"))?;
    doc.apply(&Mutation::RemoveChild { target: model("B") })?;
    assert_eq!(*flips.borrow(), vec![true]);

    doc.undo().unwrap();
    assert_eq!(*flips.borrow(), vec![true]);
    doc.undo().unwrap();
    assert_eq!(*flips.borrow(), vec![true, false]);

    assert!(doc.undo().is_none());
    assert_eq!(*flips.borrow(), vec![true, false]);

    Ok(())
}

#[test]
fn test_redo_rejected_for_other_source() -> Result<()> {
    let mut doc = document();
    doc.history_mut().set_current_source("viewA");
    doc.apply(&set_x("2"))?;
    doc.undo().unwrap();

    doc.history_mut().set_current_source("viewB");
    assert!(doc.redo().is_none());
    assert_eq!(doc.node(&model("A")).unwrap().attr("x"), Some("1"));

    doc.history_mut().set_current_source("viewA");
    assert!(doc.redo().is_some());
    assert_eq!(doc.node(&model("A")).unwrap().attr("x"), Some("2"));

    Ok(())
}

#[test]
fn test_redo_with_empty_source_is_wildcard() -> Result<()> {
    let mut doc = document();
    doc.apply(&set_x("2"))?;
    doc.undo().unwrap();

    doc.history_mut().set_current_source("viewB");
    assert!(doc.redo().is_some());
    assert_eq!(doc.node(&model("A")).unwrap().attr("x"), Some("2"));

    // undo stays strict
    assert!(doc.undo().is_none());

    Ok(())
}

#[test]
fn test_new_edit_discards_redo_branch() -> Result<()> {
    let mut doc = document();
    doc.apply(&set_x("2"))?;
    doc.apply(&Mutation::RemoveChild { target: model("B") })?;
    doc.undo().unwrap();
    doc.undo().unwrap();

    let result = doc.apply(&Mutation::RemoveAttribute {
        target: model("A"),
        name: "x".to_string(),
    })?;
    assert_eq!(result.recorded, Some(SnapshotOutcome::Recorded { index: 1 }));
    assert_eq!(doc.history().len(), 2);
    assert!(!doc.can_redo());

    Ok(())
}

#[test]
fn test_stale_entry_still_moves_cursor() -> Result<()> {
    let mut doc = document();
    let c = addr(&format!("{}/submodels/model[@name=\"B\"]/submodels/model[@name=\"C\"]", TOP));
    doc.apply(&Mutation::SetAttribute {
        target: c.clone(),
        name: "x".to_string(),
        value: "5".to_string(),
    })?;

    // rename B outside of history so C's recorded address dangles
    doc.replay(|doc| {
        doc.apply(&Mutation::SetAttribute {
            target: model("B"),
            name: "name".to_string(),
            value: "B2".to_string(),
        })
    })?;

    let step = doc.undo().unwrap();
    assert!(matches!(step, Step::Stale { .. }));
    assert_eq!(doc.history().current(), 0);

    Ok(())
}

#[test]
fn test_replay_guard_survives_panic() {
    let mut doc = document();
    let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        doc.replay(|_| panic!("listener failed"));
    }));

    assert!(outcome.is_err());
    assert!(doc.history().is_snapshot_enabled());
}

#[test]
fn test_display_summary() -> Result<()> {
    let mut doc = document();
    doc.apply(&set_x("2"))?;
    let summary = doc.history().to_string();
    assert!(summary.contains("size=2"), "{}", summary);
    assert!(summary.contains("current=1"), "{}", summary);

    Ok(())
}
