//! Domain records for outlines, notes and their citations.
//!
//! # Responsibility
//! - Define the five persisted entity kinds and their tracked attributes.
//! - Keep derived data (order keys, depth, read-only flags) out of stored
//!   fields.
//!
//! # Invariants
//! - Durable ids are sequential per kind and never reused.
//! - Timestamps are Unix epoch milliseconds.

pub mod content_source;
pub mod document;
pub mod language;
pub mod note;
pub mod text_unit;

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::time::{SystemTime, UNIX_EPOCH};

/// Durable identifier shared by every entity kind.
///
/// Allocation is per kind, so the same value may name a document and a note.
pub type EntityId = i64;

pub type DocumentId = EntityId;
pub type TextUnitId = EntityId;
pub type NoteId = EntityId;
pub type ContentSourceId = EntityId;
pub type LanguageId = EntityId;

/// The five entity kinds handled by the synchronization engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Document,
    TextUnit,
    Note,
    ContentSource,
    Language,
}

impl EntityKind {
    /// Stable lowercase name used in log events.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Document => "document",
            Self::TextUnit => "text_unit",
            Self::Note => "note",
            Self::ContentSource => "content_source",
            Self::Language => "language",
        }
    }
}

impl Display for EntityKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Current wall clock in epoch milliseconds.
///
/// Clocks set before 1970 collapse to `0` instead of failing.
pub fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as i64)
        .unwrap_or(0)
}
