//! One-shot importers that feed existing material into a [`SyncEngine`].
//!
//! # Responsibility
//! - Parse legacy tab-separated dumps and structured JSON exports.
//! - Admit every parsed record through [`SyncEngine::add`].
//!
//! # Invariants
//! - Importers never assign ids or touch storage themselves.
//! - A malformed record is logged, counted and skipped; the import goes on.
//! - Log lines carry positions and reasons only, never imported text.

mod export;
mod legacy;

use crate::model::content_source::{Citation, ContentSource, SourceOwner};
use crate::model::note::Note;
use crate::model::NoteId;
use crate::sync::{SyncEngine, SyncError};
use log::warn;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub use export::import_structured_export;
pub use legacy::import_legacy_dump;

pub type ImportResult<T> = Result<T, ImportError>;

#[derive(Debug)]
pub enum ImportError {
    /// One record could not be parsed. Reported through [`ImportReport`],
    /// never returned by the importers.
    MalformedImportRecord { position: usize, reason: String },
    /// The export is not a JSON array at all.
    InvalidExport(serde_json::Error),
    Sync(SyncError),
}

impl Display for ImportError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MalformedImportRecord { position, reason } => {
                write!(f, "malformed import record at {position}: {reason}")
            }
            Self::InvalidExport(err) => write!(f, "invalid structured export: {err}"),
            Self::Sync(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ImportError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::MalformedImportRecord { .. } => None,
            Self::InvalidExport(err) => Some(err),
            Self::Sync(err) => Some(err),
        }
    }
}

impl From<SyncError> for ImportError {
    fn from(value: SyncError) -> Self {
        Self::Sync(value)
    }
}

/// Summary of one import run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub notes: Vec<NoteId>,
    pub content_sources: usize,
    pub skipped: usize,
    pub errors: Vec<String>,
}

impl ImportReport {
    fn skip(&mut self, importer: &str, position: usize, reason: impl Into<String>) {
        let err = ImportError::MalformedImportRecord {
            position,
            reason: reason.into(),
        };
        warn!(
            "event=import_skip module=import status=skipped importer={} error_code=malformed_import_record error={}",
            importer, err
        );
        self.skipped += 1;
        self.errors.push(err.to_string());
    }
}

fn admit_note(engine: &SyncEngine, report: &mut ImportReport, note: Note) -> ImportResult<NoteId> {
    let id = engine.add(note)?.id;
    report.notes.push(id);
    Ok(id)
}

fn admit_source(
    engine: &SyncEngine,
    report: &mut ImportReport,
    note_id: NoteId,
    citation: Citation,
) -> ImportResult<()> {
    engine.add(ContentSource::new(SourceOwner::Note(note_id), citation))?;
    report.content_sources += 1;
    Ok(())
}
