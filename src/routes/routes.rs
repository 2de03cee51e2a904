//! Defines routes for the media proxy surface.
//!
//! ## Structure
//! - **Canonical endpoint**
//!   - `GET /api/storage-proxy/{bucket}/{*key}` — resolve and stream a
//!     media asset; serves the placeholder on a miss, never a 404
//!
//! - **Legacy aliases**
//!   - `GET /{dir}/{*key}` — historical `/uploads/...` and bare
//!     bucket-directory paths, routed through the same resolver
//!
//! - **Operations**
//!   - `GET /healthz` — liveness
//!   - `GET /readyz` — readiness (schema + web root)
//!   - `GET /api/migration-report` — migration-record counts
//!
//! The wildcard `*key` allows nested keys like `threads/2024/img.jpg`.
//! Static prefixes (`/api`, `/healthz`, `/readyz`) take precedence over the
//! `{dir}` catch-all, so the alias route cannot shadow them.

use crate::{
    handlers::{
        health_handlers::{healthz, readyz},
        proxy_handlers::{serve_legacy, serve_proxy},
        report_handlers::migration_report,
    },
    services::proxy_service::ProxyService,
};
use axum::{Router, routing::get};

/// Build and return the router for all media-proxy routes.
///
/// The router carries shared state (`ProxyService`) to all handlers.
pub fn routes() -> Router<ProxyService> {
    Router::new()
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        // canonical proxy endpoint + reporting
        .route("/api/storage-proxy/{bucket}/{*key}", get(serve_proxy))
        .route("/api/migration-report", get(migration_report))
        // legacy alias pass-through
        .route("/{dir}/{*key}", get(serve_legacy))
}
