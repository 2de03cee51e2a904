//! Health & readiness handlers.
//!
//! - GET /healthz  -> simple liveness ("ok")
//! - GET /readyz   -> readiness: migration schema reachable, web root readable

use crate::services::proxy_service::ProxyService;
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use std::collections::HashMap;
use tokio::fs;

/// `GET /healthz`
///
/// Liveness probe — always 200 OK, no I/O.
pub async fn healthz() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok".into(),
        }),
    )
}

/// `GET /readyz`
///
/// Readiness probe. The service can serve media once:
/// 1. the migration schema is reachable (a count over `migration_records`
///    proves both connectivity and that migrations ran), and
/// 2. the web root holding legacy files can be listed.
///
/// Placeholder availability is not checked: it is embedded in the binary
/// and cannot be missing.
pub async fn readyz(State(service): State<ProxyService>) -> impl IntoResponse {
    let schema_check = match sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM migration_records")
        .fetch_one(&*service.db)
        .await
    {
        Ok(_) => (true, None::<String>),
        Err(e) => (false, Some(format!("migration schema unavailable: {}", e))),
    };

    let web_root_check = match fs::read_dir(&service.web_root).await {
        Ok(_) => (true, None::<String>),
        Err(e) => (
            false,
            Some(format!(
                "web root {} unreadable: {}",
                service.web_root.display(),
                e
            )),
        ),
    };

    let overall_ok = schema_check.0 && web_root_check.0;

    let mut checks = HashMap::new();
    checks.insert(
        "schema",
        CheckStatus {
            ok: schema_check.0,
            error: schema_check.1,
        },
    );
    checks.insert(
        "web_root",
        CheckStatus {
            ok: web_root_check.0,
            error: web_root_check.1,
        },
    );

    let body = ReadyResponse {
        status: if overall_ok {
            "ok".into()
        } else {
            "error".into()
        },
        checks,
    };

    let status = if overall_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(body))
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
}

#[derive(Serialize)]
struct ReadyResponse {
    status: String,
    checks: HashMap<&'static str, CheckStatus>,
}

#[derive(Serialize)]
struct CheckStatus {
    ok: bool,
    error: Option<String>,
}
