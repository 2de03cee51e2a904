//! Core data models for the media normalization and resolution layer.
//!
//! Reference types are pure values produced by classification; the migration
//! types map to database tables via `sqlx::FromRow` and serialize naturally
//! as JSON via `serde`.

pub mod migration;
pub mod reference;
