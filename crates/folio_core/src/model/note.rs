//! Note record and lineage edges.
//!
//! # Responsibility
//! - Hold user-authored note text with its language tag.
//! - Keep both directions of the source → derived lineage graph.
//!
//! # Invariants
//! - `is_read_only()` is true exactly when `derived` is non-empty.
//! - Lineage is symmetric: `b.sources` contains `a` iff `a.derived` contains
//!   `b`. The synchronization engine maintains both sides together.

use super::{now_epoch_ms, NoteId, TextUnitId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A note, optionally bound to one text unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    pub id: Option<NoteId>,
    pub text: String,
    /// Free-form language tag such as `en` or `la`.
    pub language: String,
    pub created_at: i64,
    pub modified_at: i64,
    /// `None` means the note is unsorted.
    pub text_unit_id: Option<TextUnitId>,
    /// Notes this note was derived from.
    #[serde(default)]
    pub sources: BTreeSet<NoteId>,
    /// Notes derived from this note.
    #[serde(default)]
    pub derived: BTreeSet<NoteId>,
}

impl Note {
    /// Creates an unsorted, unadmitted note.
    pub fn new(text: impl Into<String>, language: impl Into<String>) -> Self {
        let now = now_epoch_ms();
        Self {
            id: None,
            text: text.into(),
            language: language.into(),
            created_at: now,
            modified_at: now,
            text_unit_id: None,
            sources: BTreeSet::new(),
            derived: BTreeSet::new(),
        }
    }

    /// Creates the empty note seeded for a freshly admitted text unit.
    pub fn empty_for_unit(text_unit_id: TextUnitId) -> Self {
        let mut note = Self::new(String::new(), String::new());
        note.text_unit_id = Some(text_unit_id);
        note
    }

    /// A note becomes read-only once anything is derived from it.
    pub fn is_read_only(&self) -> bool {
        !self.derived.is_empty()
    }

    /// Whether the note is not bound to any text unit.
    pub fn is_unsorted(&self) -> bool {
        self.text_unit_id.is_none()
    }

    /// Replaces the body and bumps `modified_at`.
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
        self.touch();
    }

    pub fn touch(&mut self) {
        self.modified_at = self.modified_at.max(now_epoch_ms());
    }
}

#[cfg(test)]
mod tests {
    use super::Note;

    #[test]
    fn read_only_follows_derived_set() {
        let mut note = Note::new("base", "en");
        assert!(!note.is_read_only());
        note.derived.insert(7);
        assert!(note.is_read_only());
        note.sources.insert(3);
        note.derived.clear();
        assert!(!note.is_read_only());
    }

    #[test]
    fn seeded_note_is_empty_and_bound() {
        let note = Note::empty_for_unit(42);
        assert!(note.text.is_empty());
        assert_eq!(note.text_unit_id, Some(42));
        assert!(!note.is_unsorted());
    }
}
