//! Read-only reporting over the rewriter's audit state.
//!
//! Operators notice missing-media and migration problems here and in the
//! server logs; end users never see them.

use crate::{errors::AppError, models::migration::RewriteRun, services::proxy_service::ProxyService};
use axum::{Json, extract::State, response::IntoResponse};
use serde::Serialize;

#[derive(Serialize)]
pub struct MigrationReport {
    /// Records discovered but not yet uploaded.
    pub pending: i64,
    /// Records uploaded, whether or not verified yet.
    pub migrated: i64,
    /// Records that passed the follow-up existence probe.
    pub verified: i64,
    /// Records whose last attempt raised; retried on the next run.
    pub failed: i64,
    /// Checkpointed counters of the most recent rewriter run, if any.
    pub last_run: Option<RewriteRun>,
}

/// GET `/api/migration-report` — counts of migration records by status plus
/// the latest run's checkpointed counters.
pub async fn migration_report(
    State(service): State<ProxyService>,
) -> Result<impl IntoResponse, AppError> {
    let count = |status: &'static str| {
        let db = service.db.clone();
        async move {
            sqlx::query_scalar::<_, i64>(
                "SELECT COUNT(*) FROM migration_records WHERE migration_status = ?",
            )
            .bind(status)
            .fetch_one(&*db)
            .await
        }
    };

    let pending = count("pending").await?;
    let migrated = count("migrated").await?;
    let failed = count("failed").await?;
    let verified: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM migration_records WHERE verified = 1")
            .fetch_one(&*service.db)
            .await?;

    let last_run = sqlx::query_as::<_, RewriteRun>(
        "SELECT id, started_at, scanned, migrated, skipped, failed, rewritten, completed
         FROM rewrite_runs ORDER BY started_at DESC LIMIT 1",
    )
    .fetch_optional(&*service.db)
    .await?;

    Ok(Json(MigrationReport {
        pending,
        migrated,
        verified,
        failed,
        last_run,
    }))
}
