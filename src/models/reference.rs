//! Parsed media references and the locations they can resolve to.

use serde::{Deserialize, Serialize};

/// Path prefix of the canonical proxy-qualified reference form.
pub const STORAGE_PROXY_PREFIX: &str = "/api/storage-proxy/";

/// Logical media category.
///
/// Each bucket maps to an object-storage container and, for assets predating
/// the storage migration, to a legacy directory name under the web root.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MediaBucket {
    Calendar,
    Forum,
    Vendor,
    RealEstate,
    Avatars,
    Banner,
    /// Assets with no recognizable category. Legacy copies live directly
    /// under the uploads root rather than in a dedicated directory.
    General,
    /// Catch-all for proxy paths naming a bucket outside the fixed set.
    Default,
}

impl MediaBucket {
    pub const ALL: [MediaBucket; 8] = [
        MediaBucket::Calendar,
        MediaBucket::Forum,
        MediaBucket::Vendor,
        MediaBucket::RealEstate,
        MediaBucket::Avatars,
        MediaBucket::Banner,
        MediaBucket::General,
        MediaBucket::Default,
    ];

    /// Bucket name as it appears in proxy-qualified paths.
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaBucket::Calendar => "CALENDAR",
            MediaBucket::Forum => "FORUM",
            MediaBucket::Vendor => "VENDOR",
            MediaBucket::RealEstate => "REAL_ESTATE",
            MediaBucket::Avatars => "AVATARS",
            MediaBucket::Banner => "BANNER",
            MediaBucket::General => "GENERAL",
            MediaBucket::Default => "DEFAULT",
        }
    }

    /// Parse the bucket segment of a proxy-qualified path.
    ///
    /// Unknown segments fall back to [`MediaBucket::Default`] so that a
    /// malformed reference still resolves somewhere deterministic.
    pub fn from_segment(segment: &str) -> MediaBucket {
        Self::ALL
            .into_iter()
            .find(|b| b.as_str().eq_ignore_ascii_case(segment))
            .unwrap_or(MediaBucket::Default)
    }

    /// Legacy directory name holding this bucket's files under the web root.
    ///
    /// `General` and `Default` have no dedicated directory; their legacy
    /// files sit directly under the uploads root.
    pub fn legacy_dir(&self) -> Option<&'static str> {
        match self {
            MediaBucket::Calendar => Some("calendar-media"),
            MediaBucket::Forum => Some("forum-media"),
            MediaBucket::Vendor => Some("vendor-media"),
            MediaBucket::RealEstate => Some("real-estate-media"),
            MediaBucket::Avatars => Some("avatars"),
            MediaBucket::Banner => Some("banner-slides"),
            MediaBucket::General | MediaBucket::Default => None,
        }
    }

    /// Reverse lookup of [`Self::legacy_dir`].
    pub fn from_dir(dir: &str) -> Option<MediaBucket> {
        Self::ALL
            .into_iter()
            .find(|b| b.legacy_dir() == Some(dir))
    }

    /// Canonical proxy-qualified URL for a key stored under this bucket.
    pub fn proxy_url(&self, key: &str) -> String {
        format!("{}{}/{}", STORAGE_PROXY_PREFIX, self.as_str(), key)
    }
}

impl std::fmt::Display for MediaBucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Semantic type of a stored media-reference string.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReferenceKind {
    /// Relative path with no leading slash, e.g. `banner-slides/x.png`.
    FilesystemRelative,
    /// Root-relative path naming a known legacy directory, e.g.
    /// `/banner-slides/x.png` (with or without an `uploads/` prefix).
    RootRelative,
    /// Canonical `/api/storage-proxy/{bucket}/{key}` form.
    ProxyQualified,
    /// Fully qualified `http(s)://` URL; fetched directly, never probed.
    ExternalAbsolute,
    /// No usable filename could be extracted. Not an error: callers treat
    /// this as "no media" and serve the placeholder.
    Unresolvable,
}

/// A stored media-reference string, parsed and classified.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct MediaReference {
    /// The original stored string, untouched.
    pub raw: String,

    /// Semantic type of the reference.
    pub kind: ReferenceKind,

    /// Logical category inferred from the path, `General` when none matched.
    pub bucket: MediaBucket,

    /// Object-storage key. The full remainder for proxy-qualified paths,
    /// the basename for everything else. Empty only for `Unresolvable`
    /// and `ExternalAbsolute` references.
    pub key: String,
}

impl MediaReference {
    /// Basename of the key, stripped of any directory segments.
    pub fn filename(&self) -> &str {
        self.key.rsplit('/').next().unwrap_or("")
    }
}

/// One place to check for an asset during resolution. Ephemeral, never
/// persisted; produced in priority order by the resolver.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub enum CandidateLocation {
    /// A path relative to the configured web root.
    Filesystem { path: String },
    /// A bucket + key pair in object storage.
    ObjectStorage { bucket: MediaBucket, key: String },
    /// An absolute URL fetched directly by the client.
    External { url: String },
}

impl CandidateLocation {
    /// Short human-readable form, used for the `x-media-source` response
    /// header and for miss logging.
    pub fn describe(&self) -> String {
        match self {
            CandidateLocation::Filesystem { path } => format!("filesystem:{path}"),
            CandidateLocation::ObjectStorage { bucket, key } => {
                format!("object-storage:{bucket}/{key}")
            }
            CandidateLocation::External { url } => format!("external:{url}"),
        }
    }
}
