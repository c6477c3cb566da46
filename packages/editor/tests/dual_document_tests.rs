//! Integration tests for paired primary/metadata editing

use anyhow::Result;
use snaptree_editor::{
    AddressSchema, Document, DualDocument, DualEvent, EditorConfig, Element, HistoryConfig,
    HistoryEvent, MergeHint, MergeParams, Mutation, NodeAddress,
};
use std::cell::RefCell;
use std::rc::Rc;

fn addr(s: &str) -> NodeAddress {
    s.parse().unwrap()
}

const TOP: &str = "./vle_project/structures/model[@name=\"top\"]";
const PLUGINS: &str = "./vle_project_metadata/condPlugins";

fn primary_root() -> Element {
    Element::new("vle_project").with_child(
        Element::new("structures").with_child(
            Element::new("model")
                .with_attr("name", "top")
                .with_child(
                    Element::new("submodels")
                        .with_child(Element::new("model").with_attr("name", "A").with_attr("x", "0")),
                ),
        ),
    )
}

fn metadata_root() -> Element {
    Element::new("vle_project_metadata")
        .with_child(Element::new("condPlugins"))
        .with_child(Element::new("outputGUIplugins"))
}

fn dual() -> DualDocument {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    DualDocument::new(primary_root(), metadata_root(), &EditorConfig::default())
}

fn model_a() -> NodeAddress {
    addr(&format!("{}/submodels/model[@name=\"A\"]", TOP))
}

fn add_condition_plugin(name: &str) -> Mutation {
    Mutation::InsertChild {
        parent: addr(PLUGINS),
        index: 0,
        element: Element::new("condPlugin")
            .with_attr("name", name)
            .with_attr("plugin", "default"),
    }
}

fn recorder(dual: &mut DualDocument) -> Rc<RefCell<Vec<DualEvent>>> {
    let events = Rc::new(RefCell::new(Vec::new()));
    let sink = events.clone();
    dual.add_listener(move |event: &DualEvent| sink.borrow_mut().push(event.clone()));
    events
}

fn undo_redo_events(events: &Rc<RefCell<Vec<DualEvent>>>) -> usize {
    events
        .borrow()
        .iter()
        .filter(|event| matches!(event, DualEvent::UndoRedo(_)))
        .count()
}

#[test]
fn test_metadata_only_action_reports_null_primary_pair() -> Result<()> {
    let mut dual = dual();
    let events = recorder(&mut dual);

    dual.apply_metadata(&add_condition_plugin("cond1"))?;
    let step = dual.undo().unwrap();

    assert_eq!(step.primary_old, None);
    assert_eq!(step.primary_new, None);
    assert_eq!(step.metadata_old.as_ref().unwrap().children.len(), 1);
    assert_eq!(step.metadata_new.as_ref().unwrap().children.len(), 0);
    assert_eq!(undo_redo_events(&events), 1);

    Ok(())
}

#[test]
fn test_primary_only_action_reports_null_metadata_pair() -> Result<()> {
    let mut dual = dual();
    dual.apply_primary(&Mutation::SetAttribute {
        target: model_a(),
        name: "x".to_string(),
        value: "10".to_string(),
    })?;

    let step = dual.undo().unwrap();
    assert!(step.touches_primary());
    assert!(!step.touches_metadata());

    let step = dual.redo().unwrap();
    assert_eq!(step.primary_new.as_ref().unwrap().attr("x"), Some("10"));
    assert!(!step.touches_metadata());

    Ok(())
}

#[test]
fn test_interleaved_edits_undo_one_at_a_time() -> Result<()> {
    let mut dual = dual();
    let events = recorder(&mut dual);

    dual.apply_primary(&Mutation::SetAttribute {
        target: model_a(),
        name: "x".to_string(),
        value: "1".to_string(),
    })?;
    dual.apply_metadata(&add_condition_plugin("cond1"))?;
    dual.apply_paired(
        Some(&Mutation::RemoveChild { target: model_a() }),
        Some(&add_condition_plugin("cond2")),
    )?;

    let third = dual.undo().unwrap();
    assert!(third.touches_primary() && third.touches_metadata());
    let second = dual.undo().unwrap();
    assert!(!second.touches_primary() && second.touches_metadata());
    let first = dual.undo().unwrap();
    assert!(first.touches_primary() && !first.touches_metadata());
    assert!(dual.undo().is_none());

    assert_eq!(undo_redo_events(&events), 3);
    assert_eq!(dual.primary().node(&model_a()).unwrap().attr("x"), Some("0"));
    assert!(dual.metadata().node(&addr(PLUGINS)).unwrap().children.is_empty());

    Ok(())
}

#[test]
fn test_paired_edit_blocks_per_document_events() -> Result<()> {
    let recorded = Rc::new(RefCell::new(0));
    let sink = recorded.clone();

    let mut primary = Document::new(primary_root(), AddressSchema::project(), &HistoryConfig::default());
    primary.history_mut().add_listener(move |event: &HistoryEvent| {
        if let HistoryEvent::EditRecorded { .. } = event {
            *sink.borrow_mut() += 1;
        }
    });
    let metadata = Document::new(
        metadata_root(),
        AddressSchema::project_metadata(),
        &HistoryConfig::default(),
    );
    let mut dual = DualDocument::from_documents(primary, metadata);

    dual.apply_paired(
        Some(&Mutation::SetAttribute {
            target: model_a(),
            name: "x".to_string(),
            value: "4".to_string(),
        }),
        None,
    )?;
    assert_eq!(*recorded.borrow(), 0);

    dual.apply_metadata(&add_condition_plugin("cond1"))?;
    assert_eq!(*recorded.borrow(), 0, "lockstep marker is silent");

    dual.apply_primary(&Mutation::SetAttribute {
        target: model_a(),
        name: "y".to_string(),
        value: "1".to_string(),
    })?;
    assert_eq!(*recorded.borrow(), 1);

    Ok(())
}

#[test]
fn test_save_point_tracks_primary() -> Result<()> {
    let mut dual = dual();
    let events = recorder(&mut dual);

    dual.apply_metadata(&add_condition_plugin("cond1"))?;
    assert!(dual.is_dirty());
    dual.save();
    assert!(!dual.is_dirty());

    dual.undo().unwrap();
    dual.redo().unwrap();
    assert!(!dual.is_dirty());

    let flips: Vec<bool> = events
        .borrow()
        .iter()
        .filter_map(|event| match event {
            DualEvent::UndoAvailabilityChanged(available) => Some(*available),
            _ => None,
        })
        .collect();
    assert_eq!(flips, vec![true, false, true, false]);

    Ok(())
}

#[test]
fn test_source_applies_to_both_sides() -> Result<()> {
    let mut dual = dual();
    dual.set_current_source("conditions");
    dual.apply_metadata(&add_condition_plugin("cond1"))?;
    dual.undo().unwrap();

    dual.set_current_source("diagram");
    assert!(dual.redo().is_none());
    assert!(dual.can_redo());

    dual.set_current_source("conditions");
    let step = dual.redo().unwrap();
    assert!(step.touches_metadata());

    Ok(())
}

#[test]
fn test_merged_edits_stay_in_lockstep() -> Result<()> {
    let mut dual = dual();
    let hint = || Some(MergeHint::new("move", MergeParams::queries([model_a().to_string()])));

    for x in 1..5 {
        dual.edit_primary(&model_a(), hint(), |node| {
            node.set_attr("x", x.to_string());
        })?;
    }

    assert_eq!(dual.primary().history().len(), 2);
    assert_eq!(dual.metadata().history().len(), 2);

    dual.undo().unwrap();
    assert_eq!(dual.primary().node(&model_a()).unwrap().attr("x"), Some("0"));

    Ok(())
}

#[test]
fn test_replay_suppresses_both_sides() -> Result<()> {
    let mut dual = dual();
    dual.replay(|dual| -> Result<()> {
        dual.apply_metadata(&add_condition_plugin("cond1"))?;
        dual.apply_primary(&Mutation::RemoveChild { target: model_a() })?;
        Ok(())
    })?;

    assert_eq!(dual.primary().history().current(), 0);
    assert_eq!(dual.metadata().history().current(), 0);
    assert!(dual.primary().node(&model_a()).is_none());
    assert!(!dual.can_undo());

    Ok(())
}
