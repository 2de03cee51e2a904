//! Offline reference rewriting.
//!
//! The rewriter is the only writer in the system. It scans the legacy
//! directories under the web root, migrates each discovered file into object
//! storage, verifies the upload with a follow-up existence probe, and then
//! converges stored content rows to the canonical proxy-qualified form.
//!
//! Per-asset progress is persisted in `migration_records` (one row per
//! source path, unique, never deleted), so an interrupted run resumes where
//! it left off instead of re-uploading everything. Summary counters are
//! checkpointed into `rewrite_runs` after every batch.

use crate::{
    models::{
        migration::{MigrationRecord, MigrationStatus},
        reference::{CandidateLocation, MediaBucket, ReferenceKind},
    },
    services::{
        classifier::classify,
        object_store::{ObjectStore, ObjectStoreError},
        proxy_service::content_type_for,
        resolver::Resolver,
    },
};
use bytes::Bytes;
use chrono::Utc;
use futures::{StreamExt, stream};
use serde::Serialize;
use sqlx::{QueryBuilder, SqlitePool, sqlite::Sqlite};
use std::{io::ErrorKind, path::PathBuf, sync::Arc};
use thiserror::Error;
use tokio::fs;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum RewriteError {
    #[error("invalid content target `{0}`; expected `table.column`")]
    InvalidContentTarget(String),
    #[error(transparent)]
    ObjectStore(#[from] ObjectStoreError),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type RewriteResult<T> = Result<T, RewriteError>;

/// What a run is allowed to do.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunScope {
    /// Migrate pending and failed assets, verify, rewrite rows.
    Full,
    /// Only run verification probes for already-uploaded assets; pending
    /// and failed assets are left untouched.
    VerifyOnly,
}

/// Summary counters for one run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub scanned: u64,
    pub migrated: u64,
    pub skipped: u64,
    pub failed: u64,
    pub rewritten: u64,
}

/// A `table.column` pair whose values the rewriter converges.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContentTarget {
    pub table: String,
    pub column: String,
}

impl ContentTarget {
    /// Parse a `table.column` spec, accepting only identifier characters so
    /// the names can be interpolated into SQL safely.
    pub fn parse(spec: &str) -> RewriteResult<Self> {
        let (table, column) = spec
            .split_once('.')
            .ok_or_else(|| RewriteError::InvalidContentTarget(spec.to_string()))?;
        if !is_identifier(table) || !is_identifier(column) {
            return Err(RewriteError::InvalidContentTarget(spec.to_string()));
        }
        Ok(Self {
            table: table.to_string(),
            column: column.to_string(),
        })
    }
}

fn is_identifier(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// A filesystem asset found by the scan.
#[derive(Clone, Debug)]
struct DiscoveredAsset {
    /// Path relative to the web root; becomes the record's unique key.
    source_location: String,
    bucket: MediaBucket,
    filename: String,
}

enum AssetOutcome {
    Migrated { rows: u64 },
    Skipped { rows: u64 },
    Failed,
}

/// Batch job converging legacy filesystem assets and the rows that
/// reference them.
pub struct ReferenceRewriter {
    db: Arc<SqlitePool>,
    store: Arc<dyn ObjectStore>,
    resolver: Resolver,
    web_root: PathBuf,
    targets: Vec<ContentTarget>,
    batch_size: usize,
}

impl ReferenceRewriter {
    pub fn new(
        db: Arc<SqlitePool>,
        store: Arc<dyn ObjectStore>,
        resolver: Resolver,
        web_root: impl Into<PathBuf>,
        targets: Vec<ContentTarget>,
        batch_size: usize,
    ) -> Self {
        Self {
            db,
            store,
            resolver,
            web_root: web_root.into(),
            targets,
            batch_size: batch_size.max(1),
        }
    }

    /// Run the job once and return the summary counts.
    ///
    /// Individual asset failures are captured on their migration record and
    /// never abort the batch; only a data-store failure aborts the run, and
    /// counts already checkpointed survive it.
    pub async fn run(&self, scope: RunScope) -> RewriteResult<RunSummary> {
        let run_id = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO rewrite_runs (id, started_at, scanned, migrated, skipped, failed, rewritten, completed)
             VALUES (?, ?, 0, 0, 0, 0, 0, 0)",
        )
        .bind(run_id)
        .bind(Utc::now())
        .execute(&*self.db)
        .await?;

        let assets = self.scan().await?;
        let mut summary = RunSummary {
            scanned: assets.len() as u64,
            ..Default::default()
        };
        self.checkpoint(run_id, &summary, false).await?;

        for batch in assets.chunks(self.batch_size) {
            let outcomes = stream::iter(batch)
                .map(|asset| self.process_asset(asset, scope))
                .buffer_unordered(self.batch_size)
                .collect::<Vec<_>>()
                .await;
            for outcome in outcomes {
                match outcome {
                    AssetOutcome::Migrated { rows } => {
                        summary.migrated += 1;
                        summary.rewritten += rows;
                    }
                    AssetOutcome::Skipped { rows } => {
                        summary.skipped += 1;
                        summary.rewritten += rows;
                    }
                    AssetOutcome::Failed => summary.failed += 1,
                }
            }
            self.checkpoint(run_id, &summary, false).await?;
        }

        self.checkpoint(run_id, &summary, true).await?;
        info!(?summary, "rewrite run complete");
        Ok(summary)
    }

    /// Discover migratable files under both legacy twin directories of every
    /// bucket, plus loose files directly under the uploads root.
    async fn scan(&self) -> RewriteResult<Vec<DiscoveredAsset>> {
        for bucket in MediaBucket::ALL {
            let dir = self.resolver.writable_dir(bucket);
            if !dir.is_empty() {
                fs::create_dir_all(self.web_root.join(&dir)).await?;
            }
        }

        let mut assets = Vec::new();
        for bucket in MediaBucket::ALL {
            if let Some(dir) = bucket.legacy_dir() {
                self.scan_dir(&format!("uploads/{dir}"), bucket, &mut assets)
                    .await?;
                self.scan_dir(dir, bucket, &mut assets).await?;
            }
        }
        self.scan_dir("uploads", MediaBucket::General, &mut assets)
            .await?;

        assets.sort_by(|a, b| a.source_location.cmp(&b.source_location));
        assets.dedup_by(|a, b| a.source_location == b.source_location);
        Ok(assets)
    }

    async fn scan_dir(
        &self,
        prefix: &str,
        bucket: MediaBucket,
        out: &mut Vec<DiscoveredAsset>,
    ) -> RewriteResult<()> {
        let mut entries = match fs::read_dir(self.web_root.join(prefix)).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(()),
            Err(err) => return Err(err.into()),
        };
        while let Some(entry) = entries.next_entry().await? {
            if !entry.metadata().await?.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            if name.starts_with('.') {
                continue;
            }
            out.push(DiscoveredAsset {
                source_location: format!("{prefix}/{name}"),
                bucket,
                filename: name,
            });
        }
        Ok(())
    }

    async fn process_asset(&self, asset: &DiscoveredAsset, scope: RunScope) -> AssetOutcome {
        match self.try_process(asset, scope).await {
            Ok(outcome) => outcome,
            Err(err) => {
                warn!(
                    source = asset.source_location,
                    error = %err,
                    "asset migration failed; captured on record"
                );
                if let Err(update_err) = self
                    .mark_failed(&asset.source_location, &err.to_string())
                    .await
                {
                    warn!(
                        source = asset.source_location,
                        error = %update_err,
                        "could not record migration failure"
                    );
                }
                AssetOutcome::Failed
            }
        }
    }

    async fn try_process(
        &self,
        asset: &DiscoveredAsset,
        scope: RunScope,
    ) -> RewriteResult<AssetOutcome> {
        // Check-then-create on the unique source_location is the
        // synchronization point: a record that already exists is resumed,
        // never raced.
        let now = Utc::now();
        sqlx::query(
            "INSERT INTO migration_records
                 (id, source_location, media_bucket, media_type, storage_key,
                  migration_status, verified, error_message, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, 0, NULL, ?, ?)
             ON CONFLICT(source_location) DO NOTHING",
        )
        .bind(Uuid::new_v4())
        .bind(&asset.source_location)
        .bind(asset.bucket)
        .bind(content_type_for(&asset.filename))
        .bind(&asset.filename)
        .bind(MigrationStatus::Pending)
        .bind(now)
        .bind(now)
        .execute(&*self.db)
        .await?;

        let record = sqlx::query_as::<_, MigrationRecord>(
            "SELECT id, source_location, media_bucket, media_type, storage_key,
                    migration_status, verified, error_message, created_at, updated_at
             FROM migration_records WHERE source_location = ?",
        )
        .bind(&asset.source_location)
        .fetch_one(&*self.db)
        .await?;

        match (record.migration_status, record.verified) {
            (MigrationStatus::Migrated, true) => {
                // Already converged; only straggler rows (e.g. skipped on a
                // previous conflict) remain to rewrite.
                let rows = self.rewrite_rows(asset).await?;
                Ok(AssetOutcome::Skipped { rows })
            }
            (MigrationStatus::Migrated, false) => {
                if self.verify(asset).await? {
                    let rows = self.rewrite_rows(asset).await?;
                    Ok(AssetOutcome::Skipped { rows })
                } else {
                    debug!(
                        source = asset.source_location,
                        "uploaded object not visible yet; verification deferred"
                    );
                    Ok(AssetOutcome::Skipped { rows: 0 })
                }
            }
            (MigrationStatus::Pending | MigrationStatus::Failed, _) => {
                if scope == RunScope::VerifyOnly {
                    return Ok(AssetOutcome::Skipped { rows: 0 });
                }
                self.upload(asset).await?;
                if self.verify(asset).await? {
                    let rows = self.rewrite_rows(asset).await?;
                    Ok(AssetOutcome::Migrated { rows })
                } else {
                    Ok(AssetOutcome::Migrated { rows: 0 })
                }
            }
        }
    }

    async fn upload(&self, asset: &DiscoveredAsset) -> RewriteResult<()> {
        let bytes = fs::read(self.web_root.join(&asset.source_location)).await?;
        let content_type = content_type_for(&asset.filename);
        let url = self
            .store
            .put(
                asset.bucket,
                &asset.filename,
                Bytes::from(bytes),
                content_type,
            )
            .await?;
        debug!(source = asset.source_location, url, "asset uploaded");

        sqlx::query(
            "UPDATE migration_records
             SET migration_status = ?, error_message = NULL, updated_at = ?
             WHERE source_location = ?",
        )
        .bind(MigrationStatus::Migrated)
        .bind(Utc::now())
        .bind(&asset.source_location)
        .execute(&*self.db)
        .await?;
        Ok(())
    }

    /// Follow-up existence probe, decoupled from the upload so storage
    /// eventual consistency cannot falsely mark data lost.
    async fn verify(&self, asset: &DiscoveredAsset) -> RewriteResult<bool> {
        let present = match self.store.exists(asset.bucket, &asset.filename).await {
            Ok(present) => present,
            Err(err) => {
                debug!(
                    source = asset.source_location,
                    error = %err,
                    "verification probe failed; will retry next run"
                );
                return Ok(false);
            }
        };
        if present {
            sqlx::query(
                "UPDATE migration_records SET verified = 1, updated_at = ? WHERE source_location = ?",
            )
            .bind(Utc::now())
            .bind(&asset.source_location)
            .execute(&*self.db)
            .await?;
        }
        Ok(present)
    }

    async fn mark_failed(&self, source_location: &str, message: &str) -> RewriteResult<()> {
        sqlx::query(
            "UPDATE migration_records
             SET migration_status = ?, error_message = ?, updated_at = ?
             WHERE source_location = ?",
        )
        .bind(MigrationStatus::Failed)
        .bind(message)
        .bind(Utc::now())
        .bind(source_location)
        .execute(&*self.db)
        .await?;
        Ok(())
    }

    /// Rewrite every content row whose stored reference resolves to this
    /// asset's source path. Updates carry an unchanged-value precondition;
    /// a row edited concurrently is skipped this run and picked up on the
    /// next one.
    async fn rewrite_rows(&self, asset: &DiscoveredAsset) -> RewriteResult<u64> {
        let canonical = asset.bucket.proxy_url(&asset.filename);
        let mut rewritten = 0;

        for target in &self.targets {
            let mut select = QueryBuilder::<Sqlite>::new(format!(
                "SELECT id, {} FROM {} WHERE {} LIKE ",
                target.column, target.table, target.column
            ));
            select.push_bind(format!("%{}%", asset.filename));
            let rows: Vec<(i64, String)> =
                select.build_query_as().fetch_all(&*self.db).await?;

            for (id, value) in rows {
                let Some(new_value) =
                    rewrite_value(&value, &asset.source_location, &self.resolver, &canonical)
                else {
                    continue;
                };
                let mut update = QueryBuilder::<Sqlite>::new(format!(
                    "UPDATE {} SET {} = ",
                    target.table, target.column
                ));
                update.push_bind(&new_value);
                update.push(" WHERE id = ");
                update.push_bind(id);
                update.push(format!(" AND {} = ", target.column));
                update.push_bind(&value);
                let result = update.build().execute(&*self.db).await?;
                if result.rows_affected() == 0 {
                    debug!(
                        table = target.table,
                        id, "row changed between read and write; skipping this run"
                    );
                } else {
                    rewritten += 1;
                }
            }
        }
        Ok(rewritten)
    }

    async fn checkpoint(
        &self,
        run_id: Uuid,
        summary: &RunSummary,
        completed: bool,
    ) -> RewriteResult<()> {
        sqlx::query(
            "UPDATE rewrite_runs
             SET scanned = ?, migrated = ?, skipped = ?, failed = ?, rewritten = ?, completed = ?
             WHERE id = ?",
        )
        .bind(summary.scanned as i64)
        .bind(summary.migrated as i64)
        .bind(summary.skipped as i64)
        .bind(summary.failed as i64)
        .bind(summary.rewritten as i64)
        .bind(completed)
        .bind(run_id)
        .execute(&*self.db)
        .await?;
        Ok(())
    }
}

/// Compute the rewritten form of one column value, or `None` when nothing
/// in it refers to the migrated asset. Handles both single path strings and
/// JSON arrays of paths.
fn rewrite_value(
    value: &str,
    source_location: &str,
    resolver: &Resolver,
    canonical: &str,
) -> Option<String> {
    if value.trim_start().starts_with('[') {
        if let Ok(entries) = serde_json::from_str::<Vec<String>>(value) {
            let mut changed = false;
            let rewritten: Vec<String> = entries
                .iter()
                .map(|entry| {
                    match rewrite_entry(entry, source_location, resolver, canonical) {
                        Some(new) => {
                            changed = true;
                            new
                        }
                        None => entry.clone(),
                    }
                })
                .collect();
            return if changed {
                serde_json::to_string(&rewritten).ok()
            } else {
                None
            };
        }
    }
    rewrite_entry(value, source_location, resolver, canonical)
}

/// Rewrite a single reference string when it resolves to the migrated
/// asset. Already-canonical, external, and unresolvable values are left
/// alone, which is what makes the rewrite idempotent.
fn rewrite_entry(
    entry: &str,
    source_location: &str,
    resolver: &Resolver,
    canonical: &str,
) -> Option<String> {
    let reference = classify(entry);
    match reference.kind {
        ReferenceKind::ProxyQualified
        | ReferenceKind::ExternalAbsolute
        | ReferenceKind::Unresolvable => None,
        _ => resolver
            .candidates(&reference)
            .iter()
            .any(|candidate| {
                matches!(candidate, CandidateLocation::Filesystem { path } if path == source_location)
            })
            .then(|| canonical.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Environment;
    use crate::services::object_store::{LocalObjectStore, ObjectStoreResult, StoredObject};
    use async_trait::async_trait;
    use sqlx::sqlite::SqlitePoolOptions;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tempfile::TempDir;

    /// Wraps the local store, failing uploads while the flag is set.
    struct FlakyStore {
        inner: LocalObjectStore,
        fail_puts: AtomicBool,
    }

    #[async_trait]
    impl ObjectStore for FlakyStore {
        async fn exists(&self, bucket: MediaBucket, key: &str) -> ObjectStoreResult<bool> {
            self.inner.exists(bucket, key).await
        }

        async fn get(&self, bucket: MediaBucket, key: &str) -> ObjectStoreResult<StoredObject> {
            self.inner.get(bucket, key).await
        }

        async fn put(
            &self,
            bucket: MediaBucket,
            key: &str,
            bytes: Bytes,
            content_type: &str,
        ) -> ObjectStoreResult<String> {
            if self.fail_puts.load(Ordering::SeqCst) {
                return Err(ObjectStoreError::Io(std::io::Error::new(
                    ErrorKind::ConnectionRefused,
                    "storage outage",
                )));
            }
            self.inner.put(bucket, key, bytes, content_type).await
        }
    }

    struct Fixture {
        web: TempDir,
        _objects: TempDir,
        db: Arc<SqlitePool>,
        store: Arc<FlakyStore>,
        rewriter: ReferenceRewriter,
    }

    async fn fixture() -> Fixture {
        let web = TempDir::new().unwrap();
        let objects = TempDir::new().unwrap();
        let db = Arc::new(
            SqlitePoolOptions::new()
                .max_connections(1)
                .connect("sqlite::memory:")
                .await
                .unwrap(),
        );
        let migration_sql = include_str!("../../migrations/0001_init.sql")
            .lines()
            .filter(|line| !line.trim_start().starts_with("--"))
            .collect::<Vec<_>>()
            .join("\n");
        for statement in migration_sql
            .split(';')
            .map(str::trim)
            .filter(|s| !s.is_empty())
        {
            sqlx::query(statement).execute(&*db).await.unwrap();
        }
        sqlx::query("CREATE TABLE pages (id INTEGER PRIMARY KEY, media TEXT NOT NULL)")
            .execute(&*db)
            .await
            .unwrap();

        let store = Arc::new(FlakyStore {
            inner: LocalObjectStore::new(objects.path()),
            fail_puts: AtomicBool::new(false),
        });
        let rewriter = ReferenceRewriter::new(
            db.clone(),
            store.clone(),
            Resolver::new(Environment::Development),
            web.path(),
            vec![ContentTarget::parse("pages.media").unwrap()],
            2,
        );
        Fixture {
            web,
            _objects: objects,
            db,
            store,
            rewriter,
        }
    }

    fn write_asset(fixture: &Fixture, rel: &str, bytes: &[u8]) {
        let path = fixture.web.path().join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, bytes).unwrap();
    }

    async fn insert_page(fixture: &Fixture, media: &str) -> i64 {
        sqlx::query_scalar("INSERT INTO pages (media) VALUES (?) RETURNING id")
            .bind(media)
            .fetch_one(&*fixture.db)
            .await
            .unwrap()
    }

    async fn page_media(fixture: &Fixture, id: i64) -> String {
        sqlx::query_scalar("SELECT media FROM pages WHERE id = ?")
            .bind(id)
            .fetch_one(&*fixture.db)
            .await
            .unwrap()
    }

    async fn record(fixture: &Fixture, source: &str) -> MigrationRecord {
        sqlx::query_as(
            "SELECT id, source_location, media_bucket, media_type, storage_key,
                    migration_status, verified, error_message, created_at, updated_at
             FROM migration_records WHERE source_location = ?",
        )
        .bind(source)
        .fetch_one(&*fixture.db)
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn migrates_verifies_and_rewrites_rows() {
        let f = fixture().await;
        write_asset(&f, "uploads/banner-slides/sunset.png", b"png");
        let single = insert_page(&f, "banner-slides/sunset.png").await;
        let array = insert_page(
            &f,
            r#"["/uploads/banner-slides/sunset.png","https://ext.example/x.png"]"#,
        )
        .await;
        let canonical = insert_page(&f, "/api/storage-proxy/BANNER/sunset.png").await;

        let summary = f.rewriter.run(RunScope::Full).await.unwrap();
        assert_eq!(summary.scanned, 1);
        assert_eq!(summary.migrated, 1);
        assert_eq!(summary.failed, 0);
        assert_eq!(summary.rewritten, 2);

        let rec = record(&f, "uploads/banner-slides/sunset.png").await;
        assert_eq!(rec.migration_status, MigrationStatus::Migrated);
        assert!(rec.verified);
        assert_eq!(rec.media_bucket, "BANNER");
        assert_eq!(rec.storage_key, "sunset.png");
        assert!(
            f.store
                .exists(MediaBucket::Banner, "sunset.png")
                .await
                .unwrap()
        );

        assert_eq!(
            page_media(&f, single).await,
            "/api/storage-proxy/BANNER/sunset.png"
        );
        assert_eq!(
            page_media(&f, array).await,
            r#"["/api/storage-proxy/BANNER/sunset.png","https://ext.example/x.png"]"#
        );
        // Already-canonical values stay byte-for-byte identical.
        assert_eq!(
            page_media(&f, canonical).await,
            "/api/storage-proxy/BANNER/sunset.png"
        );

        // The original file is never deleted by the rewrite.
        assert!(
            f.web
                .path()
                .join("uploads/banner-slides/sunset.png")
                .exists()
        );
    }

    #[tokio::test]
    async fn second_run_on_unchanged_data_is_a_no_op() {
        let f = fixture().await;
        write_asset(&f, "uploads/forum-media/pic.jpg", b"jpg");
        insert_page(&f, "/forum-media/pic.jpg").await;

        let first = f.rewriter.run(RunScope::Full).await.unwrap();
        assert_eq!(first.migrated, 1);
        assert_eq!(first.rewritten, 1);

        let second = f.rewriter.run(RunScope::Full).await.unwrap();
        assert_eq!(second.scanned, 1);
        assert_eq!(second.migrated, 0);
        assert_eq!(second.rewritten, 0);
        assert_eq!(second.skipped, 1);

        // Still one record, still verified: no regression, no duplicate.
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM migration_records")
            .fetch_one(&*f.db)
            .await
            .unwrap();
        assert_eq!(count, 1);
        let rec = record(&f, "uploads/forum-media/pic.jpg").await;
        assert_eq!(rec.migration_status, MigrationStatus::Migrated);
        assert!(rec.verified);
    }

    #[tokio::test]
    async fn failed_upload_is_captured_and_retried_without_duplicates() {
        let f = fixture().await;
        write_asset(&f, "uploads/vendor-media/v.png", b"png");
        let page = insert_page(&f, "vendor-media/v.png").await;

        f.store.fail_puts.store(true, Ordering::SeqCst);
        let outage = f.rewriter.run(RunScope::Full).await.unwrap();
        assert_eq!(outage.failed, 1);
        assert_eq!(outage.migrated, 0);

        let rec = record(&f, "uploads/vendor-media/v.png").await;
        assert_eq!(rec.migration_status, MigrationStatus::Failed);
        assert!(rec.error_message.as_deref().unwrap().contains("storage outage"));

        f.store.fail_puts.store(false, Ordering::SeqCst);
        let retry = f.rewriter.run(RunScope::Full).await.unwrap();
        assert_eq!(retry.migrated, 1);
        assert_eq!(retry.failed, 0);

        let rec = record(&f, "uploads/vendor-media/v.png").await;
        assert_eq!(rec.migration_status, MigrationStatus::Migrated);
        assert!(rec.verified);
        assert!(rec.error_message.is_none());
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM migration_records")
            .fetch_one(&*f.db)
            .await
            .unwrap();
        assert_eq!(count, 1);
        assert_eq!(
            page_media(&f, page).await,
            "/api/storage-proxy/VENDOR/v.png"
        );
    }

    #[tokio::test]
    async fn verify_only_leaves_pending_assets_untouched() {
        let f = fixture().await;
        write_asset(&f, "uploads/avatars/me.png", b"png");

        let summary = f.rewriter.run(RunScope::VerifyOnly).await.unwrap();
        assert_eq!(summary.scanned, 1);
        assert_eq!(summary.migrated, 0);
        assert_eq!(summary.skipped, 1);

        let rec = record(&f, "uploads/avatars/me.png").await;
        assert_eq!(rec.migration_status, MigrationStatus::Pending);
        assert!(!f.store.exists(MediaBucket::Avatars, "me.png").await.unwrap());
    }

    #[tokio::test]
    async fn batches_cover_every_discovered_asset_and_checkpoint_counts() {
        let f = fixture().await;
        write_asset(&f, "uploads/banner-slides/a.png", b"a");
        write_asset(&f, "banner-slides/b.png", b"b");
        write_asset(&f, "uploads/c.png", b"c");

        let summary = f.rewriter.run(RunScope::Full).await.unwrap();
        assert_eq!(summary.scanned, 3);
        assert_eq!(summary.migrated, 3);

        let (scanned, migrated, completed): (i64, i64, bool) = sqlx::query_as(
            "SELECT scanned, migrated, completed FROM rewrite_runs ORDER BY started_at DESC LIMIT 1",
        )
        .fetch_one(&*f.db)
        .await
        .unwrap();
        assert_eq!(scanned, 3);
        assert_eq!(migrated, 3);
        assert!(completed);
    }

    #[test]
    fn content_targets_reject_unsafe_identifiers() {
        assert!(ContentTarget::parse("pages.media").is_ok());
        assert!(ContentTarget::parse("pages").is_err());
        assert!(ContentTarget::parse("pages.media; DROP TABLE x").is_err());
        assert!(ContentTarget::parse("pa-ges.media").is_err());
        assert!(ContentTarget::parse(".media").is_err());
    }

    #[test]
    fn rewriting_a_canonical_value_is_a_no_op() {
        let resolver = Resolver::new(Environment::Development);
        assert_eq!(
            rewrite_value(
                "/api/storage-proxy/BANNER/sunset.png",
                "uploads/banner-slides/sunset.png",
                &resolver,
                "/api/storage-proxy/BANNER/sunset.png",
            ),
            None
        );
    }
}
