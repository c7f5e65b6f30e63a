//! Content source (citation) record.

use super::{ContentSourceId, NoteId, TextUnitId};
use serde::{Deserialize, Serialize};

/// Entity a content source is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "id")]
pub enum SourceOwner {
    Note(NoteId),
    TextUnit(TextUnitId),
}

/// Citation metadata. Every field is tracked for dirtiness.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    pub author: String,
    pub title: String,
    pub chapter: String,
    pub page: String,
    pub url: String,
    /// Epoch ms the source was consulted, when known.
    pub accessed_at: Option<i64>,
}

/// Citation attached to exactly one note or text unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentSource {
    pub id: Option<ContentSourceId>,
    pub owner: SourceOwner,
    pub citation: Citation,
}

impl ContentSource {
    pub fn new(owner: SourceOwner, citation: Citation) -> Self {
        Self {
            id: None,
            owner,
            citation,
        }
    }

    pub fn note_id(&self) -> Option<NoteId> {
        match self.owner {
            SourceOwner::Note(id) => Some(id),
            SourceOwner::TextUnit(_) => None,
        }
    }

    pub fn text_unit_id(&self) -> Option<TextUnitId> {
        match self.owner {
            SourceOwner::TextUnit(id) => Some(id),
            SourceOwner::Note(_) => None,
        }
    }
}
