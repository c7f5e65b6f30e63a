//! Persistence contracts and SQLite implementations.
//!
//! # Responsibility
//! - Define the storage contract the synchronization engine writes through.
//! - Isolate SQLite query details from engine and service orchestration.
//!
//! # Invariants
//! - Every commit is one transaction; partial batches are never visible.
//! - Read paths reject invalid persisted state instead of masking it.

pub mod sqlite_store;
pub mod sync_store;
