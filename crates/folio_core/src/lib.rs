//! Core of folio: an outline of nested text units with notes and citations,
//! kept in memory and written back to SQLite on a debounced schedule.
//!
//! # Layout
//! - [`outline`]: arena tree with floating-point order keys.
//! - [`sync`]: per-entity dirty tracking and the background flusher.
//! - [`db`] / [`repo`]: SQLite schema and the [`SyncStore`] implementation.
//! - [`service`]: the [`Workspace`] facade tying both engines together.

pub mod config;
pub mod db;
pub mod import;
pub mod logging;
pub mod model;
pub mod outline;
pub mod repo;
pub mod service;
pub mod sync;

pub use config::SyncConfig;
pub use import::{import_legacy_dump, import_structured_export, ImportError, ImportReport};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::content_source::{Citation, ContentSource, SourceOwner};
pub use model::document::Document;
pub use model::language::Language;
pub use model::note::Note;
pub use model::text_unit::TextUnit;
pub use model::{EntityId, EntityKind};
pub use outline::{Outline, OutlineEdit, OutlineError, UnitHandle};
pub use repo::sqlite_store::SqliteStore;
pub use repo::sync_store::{StoreError, StoreSnapshot, SyncStore};
pub use service::workspace::{UnitView, Workspace, WorkspaceError};
pub use sync::{
    Admission, EntityState, FlushBatch, FlushReport, Removal, SaveStateSink, SyncEngine,
    SyncError,
};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::{core_version, ping};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
