use folio_core::sync::SaveStateSink;
use folio_core::{
    Citation, ContentSource, EntityKind, EntityState, Note, OutlineError, SourceOwner,
    SqliteStore, SyncConfig, SyncError, TextUnit, Workspace, WorkspaceError,
};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

fn quiet_sink() -> Arc<dyn SaveStateSink> {
    Arc::new(|_dirty: bool| {})
}

fn open(path: &Path) -> Workspace {
    Workspace::open(
        Box::new(SqliteStore::open(path).unwrap()),
        SyncConfig::default().with_flush_period(Duration::from_secs(600)),
        quiet_sink(),
    )
    .unwrap()
}

fn open_in_memory() -> Workspace {
    Workspace::open(
        Box::new(SqliteStore::in_memory().unwrap()),
        SyncConfig::default().with_flush_period(Duration::from_secs(600)),
        quiet_sink(),
    )
    .unwrap()
}

fn assert_keys_increase(workspace: &Workspace, document_id: i64) {
    let views = workspace.document_views(document_id).unwrap();
    for pair in views.windows(2) {
        assert!(
            pair[0].order_key < pair[1].order_key,
            "unit {:?} ({}) !< unit {:?} ({})",
            pair[0].unit.id,
            pair[0].order_key,
            pair[1].unit.id,
            pair[1].order_key
        );
    }
}

#[test]
fn new_document_child_and_sibling_scenario() {
    let mut workspace = open_in_memory();
    let (document_id, t0) = workspace.create_document("D").unwrap();

    let root = workspace.unit_view(t0).unwrap();
    assert_eq!(root.order_key, 0.0);
    assert_eq!(root.notes.len(), 1);

    let t1 = workspace.insert_child(t0).unwrap();
    let t2 = workspace.insert_after(t1).unwrap();

    let v0 = workspace.unit_view(t0).unwrap();
    let v1 = workspace.unit_view(t1).unwrap();
    let v2 = workspace.unit_view(t2).unwrap();
    assert!(v0.order_key < v1.order_key);
    assert!(v1.order_key < v2.order_key);
    assert_eq!(v0.children, vec![t1, t2]);
    assert_eq!(v0.depth, 1);
    assert_eq!(v1.unit.parent_id, Some(t0));
    assert_eq!(v1.unit.successor_id, Some(t2));
    assert_eq!(workspace.flatten(document_id).unwrap(), vec![t0, t1, t2]);
}

#[test]
fn insert_child_prepends_and_links_old_first_child() {
    let mut workspace = open_in_memory();
    let (document_id, t0) = workspace.create_document("D").unwrap();
    let older = workspace.insert_child(t0).unwrap();
    let newer = workspace.insert_child(t0).unwrap();

    let view = workspace.unit_view(newer).unwrap();
    assert_eq!(view.unit.successor_id, Some(older));
    assert_eq!(workspace.flatten(document_id).unwrap(), vec![t0, newer, older]);
    assert_keys_increase(&workspace, document_id);
}

#[test]
fn rejected_insert_leaves_outline_unchanged() {
    let mut workspace = open_in_memory();
    let (document_id, t0) = workspace.create_document("D").unwrap();
    let child = workspace.insert_child(t0).unwrap();
    workspace.engine().remove::<TextUnit>(child).unwrap();

    let err = workspace.insert_child(t0).unwrap_err();
    assert!(matches!(
        err,
        WorkspaceError::Sync(SyncError::NotFound {
            kind: EntityKind::TextUnit,
            id,
        }) if id == child
    ));
    assert_eq!(workspace.flatten(document_id).unwrap(), vec![t0, child]);
    assert_eq!(workspace.outline().len(), 2);
}

#[test]
fn crowded_insertions_keep_keys_ordered() {
    let mut workspace = open_in_memory();
    let (document_id, t0) = workspace.create_document("D").unwrap();
    workspace.insert_after(t0).unwrap();
    for _ in 0..80 {
        workspace.insert_after(t0).unwrap();
    }
    assert_eq!(workspace.flatten(document_id).unwrap().len(), 82);
    assert_keys_increase(&workspace, document_id);
}

#[test]
fn remove_unit_repairs_chain_and_cascades() {
    let mut workspace = open_in_memory();
    let (document_id, a) = workspace.create_document("D").unwrap();
    let b = workspace.insert_after(a).unwrap();
    let c = workspace.insert_after(b).unwrap();
    let b_child = workspace.insert_child(b).unwrap();
    workspace
        .engine()
        .add(ContentSource::new(SourceOwner::TextUnit(b), Citation::default()))
        .unwrap();
    workspace.engine().flush_now().unwrap();

    let removed = workspace.remove_unit(b).unwrap();
    assert_eq!(removed, vec![b_child, b]);
    assert_eq!(workspace.flatten(document_id).unwrap(), vec![a, c]);

    let engine = workspace.engine();
    assert_eq!(
        engine.get::<TextUnit>(a).unwrap().unwrap().successor_id,
        Some(c)
    );
    assert_eq!(
        engine.state_of::<TextUnit>(b_child).unwrap(),
        Some(EntityState::PendingDelete)
    );
    assert!(engine.sources_for(SourceOwner::TextUnit(b)).unwrap().is_empty());
    assert_eq!(engine.unsorted_notes().unwrap().len(), 2);
}

#[test]
fn moves_update_links_and_reject_cycles() {
    let mut workspace = open_in_memory();
    let (document_id, a) = workspace.create_document("D").unwrap();
    let b = workspace.insert_after(a).unwrap();
    let c = workspace.insert_after(b).unwrap();

    workspace.move_under(c, a).unwrap();
    assert_eq!(workspace.flatten(document_id).unwrap(), vec![a, c, b]);
    let engine = workspace.engine();
    assert_eq!(engine.get::<TextUnit>(c).unwrap().unwrap().parent_id, Some(a));
    assert_eq!(engine.get::<TextUnit>(b).unwrap().unwrap().successor_id, None);
    assert_eq!(engine.get::<TextUnit>(a).unwrap().unwrap().successor_id, Some(b));

    workspace.move_after(a, b).unwrap();
    assert_eq!(workspace.flatten(document_id).unwrap(), vec![b, a, c]);
    assert_keys_increase(&workspace, document_id);

    let err = workspace.move_under(a, c).unwrap_err();
    assert!(matches!(
        err,
        WorkspaceError::Outline(OutlineError::CycleDetected { .. })
    ));
}

#[test]
fn cross_document_move_is_rejected() {
    let mut workspace = open_in_memory();
    let (_, a) = workspace.create_document("one").unwrap();
    let (_, b) = workspace.create_document("two").unwrap();

    assert!(matches!(
        workspace.move_after(a, b),
        Err(WorkspaceError::Outline(OutlineError::CrossDocumentMove { .. }))
    ));
}

#[test]
fn outline_survives_save_and_reload() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("outline.db");

    let (document_id, expected, noted) = {
        let mut workspace = open(&path);
        let (document_id, a) = workspace.create_document("Draft").unwrap();
        let b = workspace.insert_after(a).unwrap();
        let a1 = workspace.insert_child(a).unwrap();
        let a0 = workspace.insert_child(a).unwrap();
        let a1x = workspace.insert_child(a1).unwrap();
        workspace.insert_after(b).unwrap();
        workspace.move_after(b, a0).unwrap();

        let note_id = workspace.unit_view(a1x).unwrap().notes[0].id.unwrap();
        workspace
            .engine()
            .update::<Note, _>(note_id, |note| note.set_text("kept"))
            .unwrap();

        let expected = workspace.flatten(document_id).unwrap();
        workspace.close().unwrap();
        (document_id, expected, a1x)
    };

    let workspace = open(&path);
    assert_eq!(workspace.flatten(document_id).unwrap(), expected);
    assert_keys_increase(&workspace, document_id);
    assert!(!workspace.engine().is_dirty().unwrap());

    let keys: Vec<f64> = workspace
        .document_views(document_id)
        .unwrap()
        .iter()
        .map(|view| view.order_key)
        .collect();
    let integers: Vec<f64> = (0..expected.len()).map(|index| index as f64).collect();
    assert_eq!(keys, integers);

    let view = workspace.unit_view(noted).unwrap();
    assert_eq!(view.notes[0].text, "kept");
    assert_eq!(
        workspace.engine().state_of::<TextUnit>(noted).unwrap(),
        Some(EntityState::Clean)
    );
}

#[test]
fn removed_document_is_gone_after_reload() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("removed.db");

    let (kept, dropped) = {
        let mut workspace = open(&path);
        let (kept, _) = workspace.create_document("kept").unwrap();
        let (dropped, root) = workspace.create_document("dropped").unwrap();
        workspace.insert_child(root).unwrap();
        workspace.engine().flush_now().unwrap();

        workspace.remove_document(dropped).unwrap();
        workspace.close().unwrap();
        (kept, dropped)
    };

    let workspace = open(&path);
    assert_eq!(workspace.outline().documents(), vec![kept]);
    assert!(workspace.flatten(dropped).is_err());
    assert!(workspace.engine().unsorted_notes().unwrap().len() >= 1);
}
