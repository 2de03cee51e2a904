//! HTTP handlers for the media-serving surface.
//!
//! Both handlers rebuild the raw request path and hand it to
//! `ProxyService::respond`, so canonical and legacy routes share one
//! classification/resolution pipeline. Neither can fail: every request
//! gets a 200 with either the asset or the placeholder.

use crate::{models::reference::STORAGE_PROXY_PREFIX, services::proxy_service::ProxyService};
use axum::{
    extract::{Path, State},
    response::Response,
};

/// GET `/api/storage-proxy/{bucket}/{*key}` — canonical proxy endpoint.
pub async fn serve_proxy(
    State(service): State<ProxyService>,
    Path((bucket, key)): Path<(String, String)>,
) -> Response {
    service
        .respond(&format!("{STORAGE_PROXY_PREFIX}{bucket}/{key}"))
        .await
}

/// GET `/{dir}/{*key}` — legacy alias pass-through.
///
/// Accepts historical `/uploads/...` and bare bucket-directory paths so
/// stored absolute references keep working without a data migration being
/// a prerequisite for correctness.
pub async fn serve_legacy(
    State(service): State<ProxyService>,
    Path((dir, key)): Path<(String, String)>,
) -> Response {
    service.respond(&format!("/{dir}/{key}")).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::Environment,
        services::{
            object_store::LocalObjectStore,
            proxy_service::{MEDIA_SOURCE_HEADER, ProxyService},
            resolver::Resolver,
        },
    };
    use axum::http::StatusCode;
    use sqlx::sqlite::SqlitePoolOptions;
    use std::{sync::Arc, time::Duration};
    use tempfile::TempDir;

    async fn service(web_root: &std::path::Path) -> ProxyService {
        let db = Arc::new(
            SqlitePoolOptions::new()
                .max_connections(1)
                .connect("sqlite::memory:")
                .await
                .unwrap(),
        );
        ProxyService::new(
            db,
            Arc::new(LocalObjectStore::new(web_root.join("objects"))),
            Resolver::new(Environment::Development),
            web_root,
            Duration::from_millis(100),
            None,
        )
    }

    #[tokio::test]
    async fn every_route_shaped_request_gets_a_200() {
        let web = TempDir::new().unwrap();
        let svc = service(web.path()).await;

        let inputs = [
            ("FORUM".to_string(), "missing.jpg".to_string()),
            ("NOT_A_BUCKET".to_string(), "x".to_string()),
            ("FORUM".to_string(), "a/../../etc/passwd".to_string()),
            ("".to_string(), "".to_string()),
        ];
        for (bucket, key) in inputs {
            let response =
                serve_proxy(State(svc.clone()), Path((bucket.clone(), key.clone()))).await;
            assert_eq!(
                response.status(),
                StatusCode::OK,
                "bucket = {bucket:?}, key = {key:?}"
            );
        }
    }

    #[tokio::test]
    async fn legacy_alias_serves_the_uploads_twin() {
        let web = TempDir::new().unwrap();
        let dir = web.path().join("uploads/banner-slides");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("hero.png"), b"banner").unwrap();

        let svc = service(web.path()).await;
        let response = serve_legacy(
            State(svc),
            Path(("banner-slides".to_string(), "hero.png".to_string())),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response
                .headers()
                .get(MEDIA_SOURCE_HEADER)
                .and_then(|v| v.to_str().ok()),
            Some("filesystem:uploads/banner-slides/hero.png")
        );
    }
}
