//! Persisted state for the offline reference-rewrite job.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Lifecycle status of one asset's migration into object storage.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, sqlx::Type)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MigrationStatus {
    /// Discovered on disk, not yet uploaded.
    Pending,
    /// Upload succeeded; awaiting (or past) the follow-up existence probe.
    Migrated,
    /// Upload or verification raised; retried on the next run.
    Failed,
}

/// Audit record of one filesystem asset's move into object storage.
///
/// One row per `source_location` (unique). Created `Pending` when the file is
/// discovered, advanced by the rewriter, never deleted. Exclusively owned and
/// mutated by the rewriter; everything else only reads it for reporting.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug)]
pub struct MigrationRecord {
    /// Internal UUID for DB indexing.
    pub id: Uuid,

    /// Filesystem path relative to the web root. Unique key.
    pub source_location: String,

    /// Bucket the asset was uploaded (or will be uploaded) under.
    pub media_bucket: String,

    /// MIME type inferred from the file extension.
    pub media_type: String,

    /// Object-storage key the asset lives under once migrated.
    pub storage_key: String,

    /// Current migration status.
    pub migration_status: MigrationStatus,

    /// True only after a follow-up existence probe against object storage
    /// succeeded. Decoupled from the upload so eventual-consistency delays
    /// cannot falsely mark data lost.
    pub verified: bool,

    /// Captured exception message when `migration_status` is `Failed`.
    pub error_message: Option<String>,

    /// When the record was first created.
    pub created_at: DateTime<Utc>,

    /// When the record was last touched.
    pub updated_at: DateTime<Utc>,
}

/// Checkpointed counters for one rewriter invocation.
///
/// Updated after every batch so a crash mid-run loses at most one batch of
/// progress.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug)]
pub struct RewriteRun {
    /// Internal UUID for DB indexing.
    pub id: Uuid,

    /// When the run started.
    pub started_at: DateTime<Utc>,

    /// Filesystem assets discovered by the scan.
    pub scanned: i64,

    /// Assets newly uploaded this run.
    pub migrated: i64,

    /// Assets skipped (already verified, already canonical, or excluded by
    /// verify-only mode).
    pub skipped: i64,

    /// Assets whose upload or verification raised.
    pub failed: i64,

    /// Content rows rewritten to the canonical proxy-qualified form.
    pub rewritten: i64,

    /// False while the run is in flight or was interrupted.
    pub completed: bool,
}
