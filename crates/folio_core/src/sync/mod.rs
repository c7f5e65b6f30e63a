//! Write-back synchronization of every entity kind.
//!
//! # Responsibility
//! - Admit records and assign durable ids.
//! - Track Unsaved/Clean/Dirty/PendingDelete per instance.
//! - Flush batched writes on a debounced schedule through a [`SyncStore`].
//!
//! # Invariants
//! - Foreground mutation never waits on storage I/O.
//! - A failed flush loses nothing; queues are restored and retried.
//! - Save-state notifications are edge-triggered.
//!
//! # See also
//! - crate::repo::sync_store
//!
//! [`SyncStore`]: crate::repo::sync_store::SyncStore

pub mod collection;
mod engine;
pub mod entity;

use crate::model::{DocumentId, EntityId, EntityKind, NoteId, TextUnitId};
use crate::repo::sync_store::StoreError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub use collection::{Collection, Collections, FlushBatch, KindBatch, Removal};
pub use engine::{Admission, FlushReport, SkipReason, SyncEngine};
pub use entity::{EntityState, SyncEntity};

pub type SyncResult<T> = Result<T, SyncError>;

#[derive(Debug)]
pub enum SyncError {
    /// A target or referenced entity is not admitted.
    NotFound { kind: EntityKind, id: EntityId },
    AlreadyAdmitted { kind: EntityKind, id: EntityId },
    LineageCycle { source: NoteId, derived: NoteId },
    /// A text unit link points at itself.
    SelfLink { unit: TextUnitId },
    /// A text unit link points into another document.
    CrossDocumentLink {
        unit: TextUnitId,
        link: TextUnitId,
        document_id: DocumentId,
    },
    /// The engine state lock was poisoned by a panicking thread.
    ConcurrentModification,
    Persistence(StoreError),
    FlusherUnavailable(std::io::Error),
}

impl Display for SyncError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound { kind, id } => write!(f, "{kind} not found: {id}"),
            Self::AlreadyAdmitted { kind, id } => write!(f, "{kind} already admitted: {id}"),
            Self::LineageCycle { source, derived } => write!(
                f,
                "lineage edge {source} -> {derived} would create a cycle"
            ),
            Self::SelfLink { unit } => write!(f, "text unit {unit} cannot link to itself"),
            Self::CrossDocumentLink {
                unit,
                link,
                document_id,
            } => write!(
                f,
                "text unit {unit} cannot link to {link}: not in document {document_id}"
            ),
            Self::ConcurrentModification => write!(f, "sync state lock poisoned"),
            Self::Persistence(err) => write!(f, "persistence failure: {err}"),
            Self::FlusherUnavailable(err) => write!(f, "flusher thread unavailable: {err}"),
        }
    }
}

impl Error for SyncError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Persistence(err) => Some(err),
            Self::FlusherUnavailable(err) => Some(err),
            Self::NotFound { .. }
            | Self::AlreadyAdmitted { .. }
            | Self::LineageCycle { .. }
            | Self::SelfLink { .. }
            | Self::CrossDocumentLink { .. }
            | Self::ConcurrentModification => None,
        }
    }
}

impl From<StoreError> for SyncError {
    fn from(value: StoreError) -> Self {
        Self::Persistence(value)
    }
}

/// Receiver of aggregate save-state transitions.
///
/// `true` when the first unsaved change appears, `false` when a flush leaves
/// nothing outstanding. Calls arrive one at a time in the order the
/// transitions happened, without the state lock held. A sink that blocks on
/// another engine call can stall writers waiting behind it.
pub trait SaveStateSink: Send + Sync {
    fn save_state_changed(&self, dirty: bool);
}

impl<F> SaveStateSink for F
where
    F: Fn(bool) + Send + Sync,
{
    fn save_state_changed(&self, dirty: bool) {
        self(dirty)
    }
}
