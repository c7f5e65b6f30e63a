//! Document record.

use super::{now_epoch_ms, DocumentId};
use serde::{Deserialize, Serialize};

/// Top-level container owning root-level text units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// `None` until admitted by the synchronization engine.
    pub id: Option<DocumentId>,
    pub title: String,
    pub created_at: i64,
    pub modified_at: i64,
}

impl Document {
    /// Creates an unadmitted document stamped with the current time.
    pub fn new(title: impl Into<String>) -> Self {
        let now = now_epoch_ms();
        Self {
            id: None,
            title: title.into(),
            created_at: now,
            modified_at: now,
        }
    }

    /// Replaces the title and bumps `modified_at`.
    pub fn rename(&mut self, title: impl Into<String>) {
        self.title = title.into();
        self.touch();
    }

    /// Bumps `modified_at`, never moving it backwards.
    pub fn touch(&mut self) {
        self.modified_at = self.modified_at.max(now_epoch_ms());
    }
}
