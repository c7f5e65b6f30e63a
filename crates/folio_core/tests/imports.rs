use folio_core::{
    import_legacy_dump, import_structured_export, ContentSource, EntityState, ImportError, Note,
    SourceOwner, SqliteStore, SyncConfig, SyncEngine,
};
use std::sync::Arc;
use std::time::Duration;

fn start() -> SyncEngine {
    SyncEngine::start(
        Box::new(SqliteStore::in_memory().unwrap()),
        SyncConfig::default().with_flush_period(Duration::from_secs(600)),
        Arc::new(|_dirty: bool| {}),
    )
    .unwrap()
}

#[test]
fn legacy_dump_admits_notes_with_their_sources() {
    let engine = start();
    let dump = "# exported notes\n\
                NOTE\tla\tGallia est omnis divisa\\nin partes tres\n\
                SOURCE\tCaesar\tDe Bello Gallico\tI\t1\n\
                NOTE\ten\tSecond\n\
                SOURCE\tAnon\tUntitled\n";

    let report = import_legacy_dump(&engine, dump).unwrap();
    assert_eq!(report.notes, vec![1, 2]);
    assert_eq!(report.content_sources, 2);
    assert_eq!(report.skipped, 0);

    let first = engine.get::<Note>(1).unwrap().unwrap();
    assert_eq!(first.text, "Gallia est omnis divisa\nin partes tres");
    assert_eq!(first.language, "la");
    assert!(first.is_unsorted());
    assert_eq!(engine.state_of::<Note>(1).unwrap(), Some(EntityState::Unsaved));

    let sources = engine.sources_for(SourceOwner::Note(1)).unwrap();
    assert_eq!(sources.len(), 1);
    assert_eq!(sources[0].citation.chapter, "I");
    assert_eq!(sources[0].citation.page, "1");
    assert!(engine.is_dirty().unwrap());
}

#[test]
fn malformed_legacy_lines_are_skipped_not_fatal() {
    let engine = start();
    let dump = "SOURCE\tOrphan\tNo note yet\n\
                GARBAGE LINE\n\
                NOTE\tonly-language\n\
                NOTE\ten\tkept\n\
                SOURCE\ttoo-few\n";

    let report = import_legacy_dump(&engine, dump).unwrap();
    assert_eq!(report.notes.len(), 1);
    assert_eq!(report.skipped, 4);
    assert_eq!(report.errors.len(), 4);
    assert_eq!(engine.list::<ContentSource>().unwrap().len(), 0);
}

#[test]
fn structured_export_skips_elements_with_wrong_shape() {
    let engine = start();
    let payload = r#"[
        {"text": "first", "language": "en",
         "sources": [{"author": "Ann", "title": "Book", "accessed_at": 1700000000000}]},
        {"language": "en"},
        42,
        {"text": "third", "extra": true}
    ]"#;

    let report = import_structured_export(&engine, payload).unwrap();
    assert_eq!(report.notes.len(), 2);
    assert_eq!(report.content_sources, 1);
    assert_eq!(report.skipped, 2);

    let third = engine.get::<Note>(report.notes[1]).unwrap().unwrap();
    assert_eq!(third.text, "third");
    assert!(third.language.is_empty());

    let sources = engine.sources_for(SourceOwner::Note(report.notes[0])).unwrap();
    assert_eq!(sources[0].citation.accessed_at, Some(1_700_000_000_000));
}

#[test]
fn structured_export_must_be_an_array() {
    let engine = start();
    let err = import_structured_export(&engine, r#"{"text": "x"}"#).unwrap_err();
    assert!(matches!(err, ImportError::InvalidExport(_)));
    assert!(engine.list::<Note>().unwrap().is_empty());
}

#[test]
fn imported_records_flush_like_any_other() {
    let engine = start();
    import_legacy_dump(&engine, "NOTE\ten\tsaved\nSOURCE\tA\tB\n").unwrap();

    engine.flush_now().unwrap();
    assert_eq!(engine.state_of::<Note>(1).unwrap(), Some(EntityState::Clean));
    assert_eq!(
        engine.state_of::<ContentSource>(1).unwrap(),
        Some(EntityState::Clean)
    );
}
