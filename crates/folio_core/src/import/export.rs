//! Structured JSON export importer.
//!
//! The export is an array of note objects:
//! `{"text": "...", "language": "la", "sources": [{"author": "...", ...}]}`.
//! Unknown keys are ignored; an element that does not match the shape is
//! skipped as one malformed record.

use super::{admit_note, admit_source, ImportError, ImportReport, ImportResult};
use crate::model::content_source::Citation;
use crate::model::note::Note;
use crate::sync::SyncEngine;
use log::info;
use serde::Deserialize;
use serde_json::Value;
use std::time::Instant;

const IMPORTER: &str = "structured_export";

#[derive(Debug, Deserialize)]
struct ExportedNote {
    text: String,
    #[serde(default)]
    language: String,
    #[serde(default)]
    sources: Vec<ExportedSource>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ExportedSource {
    author: String,
    title: String,
    chapter: String,
    page: String,
    url: String,
    accessed_at: Option<i64>,
}

impl From<ExportedSource> for Citation {
    fn from(value: ExportedSource) -> Self {
        Self {
            author: value.author,
            title: value.title,
            chapter: value.chapter,
            page: value.page,
            url: value.url,
            accessed_at: value.accessed_at,
        }
    }
}

/// Imports a structured export into `engine`.
///
/// # Errors
/// - `InvalidExport` when the payload is not a JSON array.
/// - `Sync` when the engine rejects an admission.
pub fn import_structured_export(engine: &SyncEngine, payload: &str) -> ImportResult<ImportReport> {
    let started_at = Instant::now();
    let elements: Vec<Value> = serde_json::from_str(payload).map_err(ImportError::InvalidExport)?;
    let mut report = ImportReport::default();

    for (index, element) in elements.into_iter().enumerate() {
        let exported: ExportedNote = match serde_json::from_value(element) {
            Ok(exported) => exported,
            Err(err) => {
                let reason = format!("element does not match note shape ({:?})", err.classify());
                report.skip(IMPORTER, index, reason);
                continue;
            }
        };
        let note_id = admit_note(
            engine,
            &mut report,
            Note::new(exported.text, exported.language),
        )?;
        for source in exported.sources {
            admit_source(engine, &mut report, note_id, source.into())?;
        }
    }

    info!(
        "event=import_done module=import status=ok importer={} duration_ms={} notes={} content_sources={} skipped={}",
        IMPORTER,
        started_at.elapsed().as_millis(),
        report.notes.len(),
        report.content_sources,
        report.skipped
    );
    Ok(report)
}
