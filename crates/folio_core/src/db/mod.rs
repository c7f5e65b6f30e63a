//! Folio database file: connection setup and schema versions.
//!
//! The schema holds five record tables mirroring the entity kinds
//! (`documents`, `text_units`, `notes`, `content_sources`, `languages`) plus
//! the `note_lineage` edge table. Version 1 creates the outline tables,
//! version 2 the note tables.
//!
//! # Invariants
//! - `PRAGMA user_version` equals the highest applied migration.
//! - Foreign keys are enforced and deferred to commit, so one flush may
//!   write rows in any order.
//! - A database written by a newer build is refused, never downgraded.

use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod migrations;
mod open;

pub use open::{open_db, open_db_in_memory};

pub type DbResult<T> = Result<T, DbError>;

#[derive(Debug)]
pub enum DbError {
    Sqlite(rusqlite::Error),
    /// One migration step failed; nothing from the pending set was applied.
    Migration { version: u32, source: rusqlite::Error },
    /// The file carries a schema version this build does not know.
    SchemaTooNew { found: u32, supported: u32 },
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::Migration { version, source } => {
                write!(f, "schema migration {version} failed: {source}")
            }
            Self::SchemaTooNew { found, supported } => write!(
                f,
                "folio schema version {found} is newer than the supported {supported}"
            ),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) | Self::Migration { source: err, .. } => Some(err),
            Self::SchemaTooNew { .. } => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}
