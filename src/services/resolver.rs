//! Candidate-location resolution.
//!
//! Historical data was written inconsistently: sometimes with an `/uploads`
//! prefix, sometimes without, sometimes already migrated to object storage.
//! The resolver turns a classified reference into the fixed, deduplicated
//! priority order every consumer probes, so a reference resolves regardless
//! of which legacy location actually holds the file.

use crate::config::Environment;
use crate::models::reference::{CandidateLocation, MediaBucket, MediaReference, ReferenceKind};

/// Builds candidate-location lists for classified references.
///
/// Carries the injected deployment environment. The environment never
/// removes candidates from the read path — both development and production
/// probe every candidate — it only selects which directory root the
/// rewriter treats as writable when a directory has to be created.
#[derive(Clone, Copy, Debug)]
pub struct Resolver {
    env: Environment,
}

impl Resolver {
    pub fn new(env: Environment) -> Self {
        Self { env }
    }

    /// Candidate locations for `reference`, in probe order:
    ///
    /// 1. for proxy-qualified references, the literal bucket + key;
    /// 2. the uploads-qualified legacy path `uploads/<dir>/<filename>`;
    /// 3. the bare legacy path `<dir>/<filename>`;
    /// 4. object storage under the inferred bucket.
    ///
    /// Identical entries are deduplicated. The list is empty only for
    /// unresolvable references; external URLs yield a single entry that is
    /// fetched directly rather than probed.
    pub fn candidates(&self, reference: &MediaReference) -> Vec<CandidateLocation> {
        match reference.kind {
            ReferenceKind::Unresolvable => Vec::new(),
            ReferenceKind::ExternalAbsolute => vec![CandidateLocation::External {
                url: reference.raw.trim().to_string(),
            }],
            _ => {
                let mut out = Vec::with_capacity(4);
                if reference.kind == ReferenceKind::ProxyQualified {
                    push_unique(
                        &mut out,
                        CandidateLocation::ObjectStorage {
                            bucket: reference.bucket,
                            key: reference.key.clone(),
                        },
                    );
                }

                let filename = reference.filename();
                let (uploads_path, bare_path) = match reference.bucket.legacy_dir() {
                    Some(dir) => (
                        format!("uploads/{dir}/{filename}"),
                        format!("{dir}/{filename}"),
                    ),
                    None => (format!("uploads/{filename}"), filename.to_string()),
                };
                push_unique(&mut out, CandidateLocation::Filesystem { path: uploads_path });
                push_unique(&mut out, CandidateLocation::Filesystem { path: bare_path });
                push_unique(
                    &mut out,
                    CandidateLocation::ObjectStorage {
                        bucket: reference.bucket,
                        key: filename.to_string(),
                    },
                );
                out
            }
        }
    }

    /// Directory (relative to the web root) the rewriter may create for a
    /// bucket in this environment. Development keeps legacy files under the
    /// uploads root; production uses the bare directories.
    pub fn writable_dir(&self, bucket: MediaBucket) -> String {
        match (self.env, bucket.legacy_dir()) {
            (Environment::Development, Some(dir)) => format!("uploads/{dir}"),
            (Environment::Development, None) => "uploads".to_string(),
            (Environment::Production, Some(dir)) => dir.to_string(),
            (Environment::Production, None) => String::new(),
        }
    }
}

fn push_unique(out: &mut Vec<CandidateLocation>, candidate: CandidateLocation) {
    if !out.contains(&candidate) {
        out.push(candidate);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::classifier::classify;

    fn resolver() -> Resolver {
        Resolver::new(Environment::Development)
    }

    #[test]
    fn bare_bucket_path_resolves_in_priority_order() {
        let reference = classify("banner-slides/sunset.png");
        let candidates = resolver().candidates(&reference);
        assert_eq!(
            candidates,
            vec![
                CandidateLocation::Filesystem {
                    path: "uploads/banner-slides/sunset.png".into()
                },
                CandidateLocation::Filesystem {
                    path: "banner-slides/sunset.png".into()
                },
                CandidateLocation::ObjectStorage {
                    bucket: MediaBucket::Banner,
                    key: "sunset.png".into()
                },
            ]
        );
    }

    #[test]
    fn proxy_qualified_literal_location_comes_first() {
        let reference = classify("/api/storage-proxy/FORUM/abc-123.jpg");
        let candidates = resolver().candidates(&reference);
        assert_eq!(
            candidates[0],
            CandidateLocation::ObjectStorage {
                bucket: MediaBucket::Forum,
                key: "abc-123.jpg".into()
            }
        );
        // The object-storage fallback under the inferred bucket is identical
        // to the literal location here and must be deduplicated away.
        assert_eq!(candidates.len(), 3);
    }

    #[test]
    fn proxy_qualified_nested_key_keeps_literal_and_fallback() {
        let reference = classify("/api/storage-proxy/FORUM/threads/abc.jpg");
        let candidates = resolver().candidates(&reference);
        assert_eq!(
            candidates,
            vec![
                CandidateLocation::ObjectStorage {
                    bucket: MediaBucket::Forum,
                    key: "threads/abc.jpg".into()
                },
                CandidateLocation::Filesystem {
                    path: "uploads/forum-media/abc.jpg".into()
                },
                CandidateLocation::Filesystem {
                    path: "forum-media/abc.jpg".into()
                },
                CandidateLocation::ObjectStorage {
                    bucket: MediaBucket::Forum,
                    key: "abc.jpg".into()
                },
            ]
        );
    }

    #[test]
    fn general_bucket_uses_the_uploads_root_directly() {
        let reference = classify("logo.svg");
        let candidates = resolver().candidates(&reference);
        assert_eq!(
            candidates,
            vec![
                CandidateLocation::Filesystem {
                    path: "uploads/logo.svg".into()
                },
                CandidateLocation::Filesystem {
                    path: "logo.svg".into()
                },
                CandidateLocation::ObjectStorage {
                    bucket: MediaBucket::General,
                    key: "logo.svg".into()
                },
            ]
        );
    }

    #[test]
    fn unresolvable_references_have_no_candidates() {
        assert!(resolver().candidates(&classify("")).is_empty());
        assert!(resolver().candidates(&classify("   ")).is_empty());
    }

    #[test]
    fn external_references_resolve_to_a_single_direct_fetch() {
        let reference = classify("https://cdn.example.com/a.png");
        let candidates = resolver().candidates(&reference);
        assert_eq!(
            candidates,
            vec![CandidateLocation::External {
                url: "https://cdn.example.com/a.png".into()
            }]
        );
    }

    #[test]
    fn resolution_is_deterministic_and_duplicate_free() {
        let inputs = [
            "banner-slides/sunset.png",
            "/api/storage-proxy/FORUM/abc.jpg",
            "/real-estate-media/1.jpg",
            "uploads/vendor-media/v.png",
            "plain.png",
            "",
            "https://x.example/y.gif",
        ];
        let r = resolver();
        for raw in inputs {
            let reference = classify(raw);
            let first = r.candidates(&reference);
            let second = r.candidates(&reference);
            assert_eq!(first, second, "raw = {raw}");
            for (i, a) in first.iter().enumerate() {
                for b in &first[i + 1..] {
                    assert_ne!(a, b, "duplicate candidate for {raw}");
                }
            }
        }
    }

    #[test]
    fn environment_only_affects_the_writable_directory() {
        let reference = classify("/forum-media/a.jpg");
        let dev = Resolver::new(Environment::Development);
        let prod = Resolver::new(Environment::Production);
        assert_eq!(dev.candidates(&reference), prod.candidates(&reference));
        assert_eq!(dev.writable_dir(MediaBucket::Forum), "uploads/forum-media");
        assert_eq!(prod.writable_dir(MediaBucket::Forum), "forum-media");
        assert_eq!(dev.writable_dir(MediaBucket::General), "uploads");
        assert_eq!(prod.writable_dir(MediaBucket::General), "");
    }
}
