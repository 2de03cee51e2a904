//! Classification of stored media-reference strings.
//!
//! `classify` is the single source of truth for what a stored string means.
//! Both the request path and the offline rewriter go through it, so the two
//! can never disagree about where an asset lives. It is a pure function:
//! same input, same output, no I/O.

use crate::models::reference::{
    MediaBucket, MediaReference, ReferenceKind, STORAGE_PROXY_PREFIX,
};

/// Classify a raw media-reference string.
///
/// Empty or whitespace-only input yields `Unresolvable` rather than an
/// error; callers treat that as "no media". Precedence:
///
/// 1. `http(s)://...` — external, fetched directly.
/// 2. `/api/storage-proxy/{bucket}/{key}` — already canonical.
/// 3. An optional `uploads/` or `/uploads/` prefix is stripped, then a
///    known legacy directory segment fixes the bucket.
/// 4. Anything else keeps its basename under the `General` bucket.
pub fn classify(raw: &str) -> MediaReference {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return unresolvable(raw);
    }

    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        return MediaReference {
            raw: raw.to_string(),
            kind: ReferenceKind::ExternalAbsolute,
            bucket: MediaBucket::General,
            key: String::new(),
        };
    }

    if let Some(rest) = trimmed.strip_prefix(STORAGE_PROXY_PREFIX) {
        return match rest.split_once('/') {
            Some((segment, key)) if !basename(key).is_empty() => MediaReference {
                raw: raw.to_string(),
                kind: ReferenceKind::ProxyQualified,
                bucket: MediaBucket::from_segment(segment),
                key: key.trim_end_matches('/').to_string(),
            },
            // A bucket with no key cannot name an asset.
            _ => unresolvable(raw),
        };
    }

    let (remainder, uploads_stripped) = if let Some(r) = trimmed.strip_prefix("/uploads/") {
        (r, true)
    } else if let Some(r) = trimmed.strip_prefix("uploads/") {
        (r, true)
    } else {
        (trimmed, false)
    };

    let root_relative = uploads_stripped || remainder.starts_with('/');
    let bare = remainder.trim_start_matches('/');

    if let Some((dir, rest)) = bare.split_once('/') {
        if let Some(bucket) = MediaBucket::from_dir(dir) {
            let name = basename(rest);
            if name.is_empty() {
                return unresolvable(raw);
            }
            return MediaReference {
                raw: raw.to_string(),
                kind: if root_relative {
                    ReferenceKind::RootRelative
                } else {
                    ReferenceKind::FilesystemRelative
                },
                bucket,
                key: name.to_string(),
            };
        }
    }

    let name = basename(bare);
    if name.is_empty() {
        return unresolvable(raw);
    }
    MediaReference {
        raw: raw.to_string(),
        kind: ReferenceKind::FilesystemRelative,
        bucket: MediaBucket::General,
        key: name.to_string(),
    }
}

fn unresolvable(raw: &str) -> MediaReference {
    MediaReference {
        raw: raw.to_string(),
        kind: ReferenceKind::Unresolvable,
        bucket: MediaBucket::General,
        key: String::new(),
    }
}

/// Last non-empty path segment, or `""` when there is none.
fn basename(path: &str) -> &str {
    path.trim_end_matches('/').rsplit('/').next().unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_and_whitespace_are_unresolvable() {
        for raw in ["", "   ", "\t\n"] {
            let r = classify(raw);
            assert_eq!(r.kind, ReferenceKind::Unresolvable);
            assert_eq!(r.filename(), "");
        }
    }

    #[test]
    fn external_urls_pass_through() {
        let r = classify("https://cdn.example.com/a/b.png");
        assert_eq!(r.kind, ReferenceKind::ExternalAbsolute);
        let r = classify("http://example.com/x.jpg");
        assert_eq!(r.kind, ReferenceKind::ExternalAbsolute);
    }

    #[test]
    fn proxy_qualified_extracts_bucket_and_key() {
        let r = classify("/api/storage-proxy/FORUM/abc-123.jpg");
        assert_eq!(r.kind, ReferenceKind::ProxyQualified);
        assert_eq!(r.bucket, MediaBucket::Forum);
        assert_eq!(r.key, "abc-123.jpg");
        assert_eq!(r.filename(), "abc-123.jpg");
    }

    #[test]
    fn proxy_qualified_keeps_nested_keys() {
        let r = classify("/api/storage-proxy/FORUM/threads/2024/abc.jpg");
        assert_eq!(r.kind, ReferenceKind::ProxyQualified);
        assert_eq!(r.key, "threads/2024/abc.jpg");
        assert_eq!(r.filename(), "abc.jpg");
    }

    #[test]
    fn proxy_qualified_unknown_bucket_falls_back_to_default() {
        let r = classify("/api/storage-proxy/SOMETHING_ELSE/x.png");
        assert_eq!(r.kind, ReferenceKind::ProxyQualified);
        assert_eq!(r.bucket, MediaBucket::Default);
    }

    #[test]
    fn proxy_path_without_key_is_unresolvable() {
        assert_eq!(
            classify("/api/storage-proxy/FORUM").kind,
            ReferenceKind::Unresolvable
        );
        assert_eq!(
            classify("/api/storage-proxy/FORUM/").kind,
            ReferenceKind::Unresolvable
        );
    }

    #[test]
    fn bare_bucket_directory_is_filesystem_relative() {
        let r = classify("banner-slides/sunset.png");
        assert_eq!(r.kind, ReferenceKind::FilesystemRelative);
        assert_eq!(r.bucket, MediaBucket::Banner);
        assert_eq!(r.filename(), "sunset.png");
    }

    #[test]
    fn leading_slash_bucket_directory_is_root_relative() {
        let r = classify("/real-estate-media/1745824270395-146223667.jpg");
        assert_eq!(r.kind, ReferenceKind::RootRelative);
        assert_eq!(r.bucket, MediaBucket::RealEstate);
        assert_eq!(r.filename(), "1745824270395-146223667.jpg");
    }

    #[test]
    fn uploads_prefix_is_stripped_then_reclassified() {
        for raw in [
            "uploads/forum-media/pic.jpg",
            "/uploads/forum-media/pic.jpg",
        ] {
            let r = classify(raw);
            assert_eq!(r.kind, ReferenceKind::RootRelative, "raw = {raw}");
            assert_eq!(r.bucket, MediaBucket::Forum);
            assert_eq!(r.filename(), "pic.jpg");
        }
    }

    #[test]
    fn uploads_prefix_without_known_directory_is_general() {
        let r = classify("uploads/pic.jpg");
        assert_eq!(r.kind, ReferenceKind::FilesystemRelative);
        assert_eq!(r.bucket, MediaBucket::General);
        assert_eq!(r.filename(), "pic.jpg");
    }

    #[test]
    fn unknown_directory_keeps_basename_under_general() {
        let r = classify("/some-old-dir/asset.webp");
        assert_eq!(r.kind, ReferenceKind::FilesystemRelative);
        assert_eq!(r.bucket, MediaBucket::General);
        assert_eq!(r.filename(), "asset.webp");
    }

    #[test]
    fn bare_filename_is_general() {
        let r = classify("logo.svg");
        assert_eq!(r.kind, ReferenceKind::FilesystemRelative);
        assert_eq!(r.bucket, MediaBucket::General);
        assert_eq!(r.filename(), "logo.svg");
    }

    #[test]
    fn classification_is_pure() {
        let inputs = [
            "",
            "banner-slides/sunset.png",
            "/api/storage-proxy/FORUM/abc.jpg",
            "https://example.com/x.png",
            "uploads/vendor-media/v.jpg",
            "weird//path///",
        ];
        for raw in inputs {
            assert_eq!(classify(raw), classify(raw), "raw = {raw}");
        }
    }

    #[test]
    fn nonempty_input_yields_nonempty_filename_or_unresolvable() {
        let inputs = [
            "a",
            "a/b",
            "///",
            "/banner-slides/",
            "uploads/",
            "/api/storage-proxy/",
        ];
        for raw in inputs {
            let r = classify(raw);
            assert!(
                !r.filename().is_empty() || r.kind == ReferenceKind::Unresolvable,
                "raw = {raw:?} gave kind {:?} with empty filename",
                r.kind
            );
        }
    }
}
