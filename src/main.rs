use anyhow::Result;
use axum::Router;
use bytes::Bytes;
use sqlx::sqlite::SqlitePoolOptions;
use std::{fs, io::ErrorKind, path::Path, sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

mod config;
mod errors;
mod handlers;
mod models;
mod routes;
mod services;

use config::RunMode;
use services::{
    object_store::LocalObjectStore,
    proxy_service::{ProxyService, content_type_for},
    resolver::Resolver,
    rewriter::{ContentTarget, ReferenceRewriter, RunScope},
};

#[tokio::main]
async fn main() -> Result<()> {
    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // --- Parse config + run mode ---
    let (cfg, mode) = config::AppConfig::from_env_and_args()?;

    tracing::info!("Starting media-proxy with config: {:?}", cfg);

    // --- Ensure working directories exist ---
    for dir in [&cfg.web_root, &cfg.storage_dir] {
        if !Path::new(dir).exists() {
            fs::create_dir_all(dir)?;
            tracing::info!("Created directory at {}", dir);
        }
    }

    // --- Initialize SQLite connection ---
    let db_url = &cfg.database_url;
    tracing::debug!("Connecting using raw URL => {}", db_url);

    // Extract the local file path SQLx will use
    let db_path = db_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("file:");

    // Create parent directory if needed
    if let Some(parent) = Path::new(db_path).parent() {
        if !parent.exists() {
            fs::create_dir_all(parent)?;
            tracing::info!("Created missing directory {:?}", parent);
        }
    }

    let db: Arc<sqlx::Pool<sqlx::Sqlite>> = Arc::new(
        SqlitePoolOptions::new()
            .max_connections(5)
            .connect(db_url)
            .await?,
    );

    // --- Handle migration mode ---
    if mode == RunMode::Migrate {
        run_migrations(&db).await?;
        tracing::info!("Database migration complete.");
        return Ok(()); // exit after migration
    }

    // --- Initialize core services ---
    let store = Arc::new(LocalObjectStore::new(cfg.storage_dir.clone()));
    let resolver = Resolver::new(cfg.environment);

    // --- Handle rewrite mode ---
    if let RunMode::Rewrite { verify_only } = mode {
        let targets = cfg
            .content_targets
            .iter()
            .map(|spec| ContentTarget::parse(spec))
            .collect::<Result<Vec<_>, _>>()?;
        let rewriter = ReferenceRewriter::new(
            db.clone(),
            store,
            resolver,
            cfg.web_root.clone(),
            targets,
            cfg.batch_size,
        );
        let scope = if verify_only {
            RunScope::VerifyOnly
        } else {
            RunScope::Full
        };
        let summary = rewriter.run(scope).await?;
        tracing::info!(
            scanned = summary.scanned,
            migrated = summary.migrated,
            skipped = summary.skipped,
            failed = summary.failed,
            rewritten = summary.rewritten,
            "Reference rewrite complete."
        );
        return Ok(()); // exit after rewrite
    }

    // --- Load placeholder asset (embedded default when unset/unreadable) ---
    let placeholder = match &cfg.placeholder_path {
        Some(path) => match fs::read(path) {
            Ok(bytes) => Some((Bytes::from(bytes), content_type_for(path).to_string())),
            Err(err) => {
                tracing::warn!(
                    "Could not read placeholder {}: {}. Using embedded default.",
                    path,
                    err
                );
                None
            }
        },
        None => None,
    };

    let service = ProxyService::new(
        db,
        store,
        resolver,
        cfg.web_root.clone(),
        Duration::from_millis(cfg.probe_timeout_ms),
        placeholder,
    );

    // --- Build router ---
    let app: Router = routes::routes::routes().with_state(service);

    // --- Start server ---
    let addr = cfg.addr();
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err)
            if err.kind() == ErrorKind::PermissionDenied
                && matches!(cfg.host.as_str(), "0.0.0.0" | "::") =>
        {
            let fallback_addr = format!("127.0.0.1:{}", cfg.port);
            tracing::warn!(
                "Permission denied binding to {} ({}). Falling back to {}",
                addr,
                err,
                fallback_addr
            );
            TcpListener::bind(&fallback_addr).await?
        }
        Err(err) => return Err(err.into()),
    };

    tracing::info!("Server listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}

/// Run SQLite migrations from the embedded SQL file.
async fn run_migrations(db: &Arc<sqlx::Pool<sqlx::Sqlite>>) -> Result<()> {
    let sql = include_str!("../migrations/0001_init.sql");
    let statements = sql
        .split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>();

    tracing::info!("Running {} migration statements...", statements.len());

    for stmt in statements {
        tracing::debug!("Executing migration SQL: {}", stmt);
        sqlx::query(stmt).execute(&**db).await?;
    }

    Ok(())
}
