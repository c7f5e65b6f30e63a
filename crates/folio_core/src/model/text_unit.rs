//! Text unit record.
//!
//! # Invariants
//! - `parent_id`, when set, names a unit of the same document.
//! - Order key, depth and children are owned by [`crate::outline::Outline`]
//!   and are not part of the stored record.

use super::{now_epoch_ms, DocumentId, TextUnitId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One node of a document outline as it is persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextUnit {
    /// Durable id. `None` until admitted.
    pub id: Option<TextUnitId>,
    /// Process-local identity, regenerated on every load.
    #[serde(skip, default = "Uuid::new_v4")]
    pub local_id: Uuid,
    pub document_id: DocumentId,
    /// `None` for root-level units.
    pub parent_id: Option<TextUnitId>,
    /// Next sibling in the order chain. `None` for the tail.
    pub successor_id: Option<TextUnitId>,
    pub modified_at: i64,
}

impl TextUnit {
    /// Creates an unadmitted root-level unit with no successor.
    pub fn new(document_id: DocumentId) -> Self {
        Self {
            id: None,
            local_id: Uuid::new_v4(),
            document_id,
            parent_id: None,
            successor_id: None,
            modified_at: now_epoch_ms(),
        }
    }

    /// Sets the structural links and bumps `modified_at`.
    pub fn relink(&mut self, parent_id: Option<TextUnitId>, successor_id: Option<TextUnitId>) {
        self.parent_id = parent_id;
        self.successor_id = successor_id;
        self.touch();
    }

    pub fn touch(&mut self) {
        self.modified_at = self.modified_at.max(now_epoch_ms());
    }
}
