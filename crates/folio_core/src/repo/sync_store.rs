//! Durable storage contract used by the synchronization engine.
//!
//! # Responsibility
//! - Load every stored record once when an engine starts.
//! - Commit one [`FlushBatch`] atomically: deletions, then upserts, then
//!   commit, across all kinds.
//!
//! # Invariants
//! - A failed `commit` leaves storage unchanged.

use crate::db::DbError;
use crate::model::content_source::ContentSource;
use crate::model::document::Document;
use crate::model::language::Language;
use crate::model::note::Note;
use crate::model::text_unit::TextUnit;
use crate::sync::FlushBatch;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type StoreResult<T> = Result<T, StoreError>;

/// Errors from durable storage.
#[derive(Debug)]
pub enum StoreError {
    /// Underlying SQLite/bootstrap error.
    Db(DbError),
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    MissingRequiredTable(&'static str),
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
    /// Persisted data cannot be converted into a valid record.
    InvalidData(String),
    /// Storage refused the write for a reason of its own.
    Rejected(String),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "store requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => write!(f, "missing required table `{table}`"),
            Self::MissingRequiredColumn { table, column } => {
                write!(f, "missing required column `{table}.{column}`")
            }
            Self::InvalidData(message) => write!(f, "invalid stored data: {message}"),
            Self::Rejected(message) => write!(f, "store rejected commit: {message}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::UninitializedConnection { .. } => None,
            Self::MissingRequiredTable(_) => None,
            Self::MissingRequiredColumn { .. } => None,
            Self::InvalidData(_) => None,
            Self::Rejected(_) => None,
        }
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Every stored record, as loaded at startup.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoreSnapshot {
    pub documents: Vec<Document>,
    pub text_units: Vec<TextUnit>,
    pub notes: Vec<Note>,
    pub content_sources: Vec<ContentSource>,
    pub languages: Vec<Language>,
}

/// Storage backend driven by the flusher thread.
pub trait SyncStore: Send {
    /// Loads all stored records. Note lineage sets are filled on both sides.
    fn load(&mut self) -> StoreResult<StoreSnapshot>;

    /// Applies `batch` as one atomic unit.
    fn commit(&mut self, batch: &FlushBatch) -> StoreResult<()>;
}
