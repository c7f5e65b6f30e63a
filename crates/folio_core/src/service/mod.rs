//! Use-case facades over the core engines.
//!
//! # Responsibility
//! - Combine the outline and the sync engine into the calls the
//!   presentation layer makes.

pub mod workspace;
