//! CLI smoke entry point.
//!
//! # Responsibility
//! - Open a folio database (first argument, in-memory when absent).
//! - Build a small outline, flush it, and print it in pre-order.
//!
//! Logging goes to `$FOLIO_LOG_DIR` when that variable is set.

use folio_core::{
    default_log_level, init_logging, Note, SqliteStore, SyncConfig, Workspace, WorkspaceError,
};
use std::error::Error;
use std::process::ExitCode;
use std::sync::Arc;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("folio: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    if let Ok(log_dir) = std::env::var("FOLIO_LOG_DIR") {
        init_logging(default_log_level(), log_dir)?;
    }
    println!("folio_core ping={}", folio_core::ping());
    println!("folio_core version={}", folio_core::core_version());

    let store = match std::env::args().nth(1) {
        Some(path) => SqliteStore::open(path)?,
        None => SqliteStore::in_memory()?,
    };
    let sink = Arc::new(|dirty: bool| println!("save_state dirty={dirty}"));
    let mut workspace = Workspace::open(Box::new(store), SyncConfig::default(), sink)?;

    let (document_id, root) = workspace.create_document("Smoke outline")?;
    let child = workspace.insert_child(root)?;
    let sibling = workspace.insert_after(child)?;
    workspace.insert_after(root)?;
    annotate(&workspace, sibling, "second child")?;

    println!("flush={:?}", workspace.engine().flush_now()?);
    for view in workspace.document_views(document_id)? {
        let text = view
            .notes
            .first()
            .map(|note| note.text.as_str())
            .unwrap_or_default();
        println!(
            "{:>6.2} depth={} unit={} {}",
            view.order_key,
            view.depth,
            view.unit.id.unwrap_or_default(),
            text
        );
    }
    println!("close={:?}", workspace.close()?);
    Ok(())
}

fn annotate(workspace: &Workspace, unit_id: i64, text: &str) -> Result<(), WorkspaceError> {
    let engine = workspace.engine();
    for note in engine.notes_for_unit(unit_id)? {
        if let Some(id) = note.id {
            engine.update::<Note, _>(id, |note| note.set_text(text))?;
        }
    }
    Ok(())
}
