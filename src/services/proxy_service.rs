//! Request-path media serving.
//!
//! `ProxyService` is the shared state handed to every handler. Given a raw
//! request path it classifies, resolves, probes candidates strictly in
//! order, and streams the first hit. When every candidate misses it serves
//! the placeholder with HTTP 200 — this endpoint never returns an error
//! status; missing media is observable only through the structured log line
//! emitted here.

use crate::{
    models::reference::{CandidateLocation, ReferenceKind},
    services::{
        classifier::classify,
        object_store::ObjectStore,
        resolver::Resolver,
    },
};
use axum::{
    body::Body,
    http::{HeaderName, HeaderValue, StatusCode, header},
    response::{IntoResponse, Redirect, Response},
};
use bytes::Bytes;
use sqlx::SqlitePool;
use std::{io::ErrorKind, path::PathBuf, sync::Arc, time::Duration};
use tokio::{
    fs::{self, File},
    time::timeout,
};
use tokio_util::io::ReaderStream;
use tracing::{debug, warn};

/// Fallback asset served when no candidate location yields the real file.
/// A 1x1 transparent PNG, embedded so the fallback can never itself be
/// missing.
pub const PLACEHOLDER_PNG: &[u8] = &[
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44,
    0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1F,
    0x15, 0xC4, 0x89, 0x00, 0x00, 0x00, 0x0A, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9C, 0x63, 0x00,
    0x01, 0x00, 0x00, 0x05, 0x00, 0x01, 0x0D, 0x0A, 0x2D, 0xB4, 0x00, 0x00, 0x00, 0x00, 0x49,
    0x45, 0x4E, 0x44, 0xAE, 0x42, 0x60, 0x82,
];

/// Response header naming the candidate that satisfied the request.
/// Attached best-effort; the request never fails over it.
pub const MEDIA_SOURCE_HEADER: &str = "x-media-source";

/// Shared request-path state: the resolver, the object-storage client, the
/// web root holding legacy files, and the placeholder bytes.
#[derive(Clone)]
pub struct ProxyService {
    /// Shared SQLite pool; used by the health and report handlers.
    pub db: Arc<SqlitePool>,

    pub store: Arc<dyn ObjectStore>,
    pub resolver: Resolver,

    /// Directory containing the legacy `uploads/` tree and bare bucket
    /// directories. Filesystem candidates are relative to this root.
    pub web_root: PathBuf,

    /// Upper bound for a single candidate probe. A timed-out probe is a
    /// miss for that candidate only.
    pub probe_timeout: Duration,

    placeholder: Bytes,
    placeholder_content_type: String,
}

enum ProbeOutcome {
    Hit,
    Miss,
    Unavailable(String),
}

impl ProxyService {
    pub fn new(
        db: Arc<SqlitePool>,
        store: Arc<dyn ObjectStore>,
        resolver: Resolver,
        web_root: impl Into<PathBuf>,
        probe_timeout: Duration,
        placeholder: Option<(Bytes, String)>,
    ) -> Self {
        let (placeholder, placeholder_content_type) = placeholder.unwrap_or_else(|| {
            (
                Bytes::from_static(PLACEHOLDER_PNG),
                "image/png".to_string(),
            )
        });
        Self {
            db,
            store,
            resolver,
            web_root: web_root.into(),
            probe_timeout,
            placeholder,
            placeholder_content_type,
        }
    }

    /// Serve the asset a raw request path refers to.
    ///
    /// Always produces a response: the first candidate that exists, a
    /// redirect for external URLs, or the placeholder. Backend failures and
    /// timeouts are misses for the one candidate that raised them.
    pub async fn respond(&self, raw: &str) -> Response {
        let reference = classify(raw);
        if reference.kind == ReferenceKind::Unresolvable {
            debug!(reference = raw, "unresolvable media reference; serving placeholder");
            return self.placeholder_response();
        }

        let candidates = self.resolver.candidates(&reference);
        for candidate in &candidates {
            if let CandidateLocation::External { url } = candidate {
                return Redirect::temporary(url).into_response();
            }
            match self.probe(candidate).await {
                ProbeOutcome::Hit => {
                    if let Some(response) = self.serve_candidate(candidate).await {
                        return response;
                    }
                    // The file vanished between probe and open; fall through
                    // to the next candidate.
                }
                ProbeOutcome::Miss => {}
                ProbeOutcome::Unavailable(reason) => {
                    debug!(
                        candidate = %candidate.describe(),
                        reason,
                        "candidate unavailable; continuing"
                    );
                }
            }
        }

        let attempted: Vec<String> = candidates.iter().map(CandidateLocation::describe).collect();
        warn!(
            reference = raw,
            candidates = ?attempted,
            "all candidate locations exhausted; serving placeholder"
        );
        self.placeholder_response()
    }

    /// Existence check without reading the body, bounded by the probe
    /// timeout.
    async fn probe(&self, candidate: &CandidateLocation) -> ProbeOutcome {
        let check = async {
            match candidate {
                CandidateLocation::Filesystem { path } => {
                    match fs::metadata(self.web_root.join(path)).await {
                        Ok(meta) => Ok(meta.is_file()),
                        Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
                        Err(err) => Err(err.to_string()),
                    }
                }
                CandidateLocation::ObjectStorage { bucket, key } => self
                    .store
                    .exists(*bucket, key)
                    .await
                    .map_err(|err| err.to_string()),
                CandidateLocation::External { .. } => Ok(false),
            }
        };
        match timeout(self.probe_timeout, check).await {
            Ok(Ok(true)) => ProbeOutcome::Hit,
            Ok(Ok(false)) => ProbeOutcome::Miss,
            Ok(Err(reason)) => ProbeOutcome::Unavailable(reason),
            Err(_) => ProbeOutcome::Unavailable("probe timed out".to_string()),
        }
    }

    async fn serve_candidate(&self, candidate: &CandidateLocation) -> Option<Response> {
        match candidate {
            CandidateLocation::Filesystem { path } => {
                let file = File::open(self.web_root.join(path)).await.ok()?;
                let len = file.metadata().await.ok().map(|m| m.len());
                let body = Body::from_stream(ReaderStream::new(file));
                Some(self.asset_response(body, len, path, candidate))
            }
            CandidateLocation::ObjectStorage { bucket, key } => {
                let object = self.store.get(*bucket, key).await.ok()?;
                let body = Body::from_stream(ReaderStream::new(object.reader));
                Some(self.asset_response(body, Some(object.len), key, candidate))
            }
            CandidateLocation::External { .. } => None,
        }
    }

    fn asset_response(
        &self,
        body: Body,
        len: Option<u64>,
        name: &str,
        candidate: &CandidateLocation,
    ) -> Response {
        let mut response = Response::new(body);
        *response.status_mut() = StatusCode::OK;
        let headers = response.headers_mut();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static(content_type_for(name)),
        );
        if let Some(len) = len {
            if let Ok(value) = HeaderValue::from_str(&len.to_string()) {
                headers.insert(header::CONTENT_LENGTH, value);
            }
        }
        if let Ok(value) = HeaderValue::from_str(&candidate.describe()) {
            headers.insert(HeaderName::from_static(MEDIA_SOURCE_HEADER), value);
        }
        response
    }

    fn placeholder_response(&self) -> Response {
        let mut response = Response::new(Body::from(self.placeholder.clone()));
        *response.status_mut() = StatusCode::OK;
        let headers = response.headers_mut();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_str(&self.placeholder_content_type)
                .unwrap_or_else(|_| HeaderValue::from_static("image/png")),
        );
        if let Ok(value) = HeaderValue::from_str(&self.placeholder.len().to_string()) {
            headers.insert(header::CONTENT_LENGTH, value);
        }
        headers.insert(
            HeaderName::from_static(MEDIA_SOURCE_HEADER),
            HeaderValue::from_static("placeholder"),
        );
        response
    }
}

/// Fixed extension→MIME table used for responses.
/// Unknown extensions fall back to `application/octet-stream`.
pub fn content_type_for(name: &str) -> &'static str {
    let ext = name
        .rsplit('.')
        .next()
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "ico" => "image/x-icon",
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        "mov" => "video/quicktime",
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "pdf" => "application/pdf",
        _ => "application/octet-stream",
    }
}
