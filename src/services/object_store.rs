//! Object-storage seam and the bundled disk-backed implementation.
//!
//! The media layer depends on exactly three operations — `exists`, `get`,
//! `put` — expressed as a trait so a remote backend can replace the local
//! one without touching the resolver or the rewriter. `LocalObjectStore`
//! keeps payloads on disk sharded beneath
//! `base_path/{bucket}/{shard}/{shard}/{key}`.

use crate::models::reference::MediaBucket;
use async_trait::async_trait;
use bytes::Bytes;
use std::{
    io::{self, ErrorKind},
    path::PathBuf,
    pin::Pin,
};
use thiserror::Error;
use tokio::{
    fs::{self, File},
    io::{AsyncRead, AsyncWriteExt},
};
use tracing::debug;
use uuid::Uuid;

const MAX_OBJECT_KEY_LEN: usize = 1024;

#[derive(Debug, Error)]
pub enum ObjectStoreError {
    #[error("object `{key}` not found in bucket `{bucket}`")]
    ObjectNotFound { bucket: MediaBucket, key: String },
    #[error("invalid object key")]
    InvalidObjectKey,
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type ObjectStoreResult<T> = Result<T, ObjectStoreError>;

/// An object opened for reading: its byte length plus a streaming reader.
pub struct StoredObject {
    pub len: u64,
    pub reader: Pin<Box<dyn AsyncRead + Send>>,
}

impl std::fmt::Debug for StoredObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoredObject")
            .field("len", &self.len)
            .field("reader", &"<AsyncRead>")
            .finish()
    }
}

/// The narrow interface the media layer consumes from object storage.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Cheap existence check; the probe used by the responder and verifier.
    async fn exists(&self, bucket: MediaBucket, key: &str) -> ObjectStoreResult<bool>;

    /// Open an object for streaming out.
    async fn get(&self, bucket: MediaBucket, key: &str) -> ObjectStoreResult<StoredObject>;

    /// Store `bytes` under `bucket`/`key` and return the canonical
    /// proxy-qualified URL for the stored object.
    async fn put(
        &self,
        bucket: MediaBucket,
        key: &str,
        bytes: Bytes,
        content_type: &str,
    ) -> ObjectStoreResult<String>;
}

/// Disk-backed object store.
///
/// Two-level md5 shard directories keep per-directory file counts low;
/// writes go through a temp file with fsync and an atomic rename.
#[derive(Clone)]
pub struct LocalObjectStore {
    base_path: PathBuf,
}

impl LocalObjectStore {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    /// Basic key validation to avoid trivial path traversal vectors.
    ///
    /// Rejects empty or oversized keys, keys that begin with `/` or contain
    /// `..`, and keys with control characters or backslashes.
    fn ensure_key_safe(key: &str) -> ObjectStoreResult<()> {
        if key.is_empty() || key.len() > MAX_OBJECT_KEY_LEN {
            return Err(ObjectStoreError::InvalidObjectKey);
        }
        if key.starts_with('/') || key.contains("..") {
            return Err(ObjectStoreError::InvalidObjectKey);
        }
        if key
            .bytes()
            .any(|b| b.is_ascii_control() || b == b'\\' || b == b'\0')
        {
            return Err(ObjectStoreError::InvalidObjectKey);
        }
        Ok(())
    }

    /// Generate two-level shard identifiers for an object key.
    ///
    /// Uses MD5(bucket/key) and returns the first two bytes as lowercase
    /// hexadecimal strings (00–ff).
    fn object_shards(bucket: MediaBucket, key: &str) -> (String, String) {
        let digest = md5::compute(format!("{}/{}", bucket, key));
        (format!("{:02x}", digest[0]), format!("{:02x}", digest[1]))
    }

    /// Fully-qualified payload path: `base/{bucket}/{shard}/{shard}/{key}`.
    fn object_path(&self, bucket: MediaBucket, key: &str) -> PathBuf {
        let (shard_a, shard_b) = Self::object_shards(bucket, key);
        let mut path = self.base_path.clone();
        path.push(bucket.as_str().to_ascii_lowercase());
        path.push(shard_a);
        path.push(shard_b);
        path.push(key);
        path
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn exists(&self, bucket: MediaBucket, key: &str) -> ObjectStoreResult<bool> {
        Self::ensure_key_safe(key)?;
        match fs::metadata(self.object_path(bucket, key)).await {
            Ok(meta) => Ok(meta.is_file()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
            Err(err) => Err(ObjectStoreError::Io(err)),
        }
    }

    async fn get(&self, bucket: MediaBucket, key: &str) -> ObjectStoreResult<StoredObject> {
        Self::ensure_key_safe(key)?;
        let path = self.object_path(bucket, key);
        let file = File::open(&path).await.map_err(|err| {
            if err.kind() == ErrorKind::NotFound {
                ObjectStoreError::ObjectNotFound {
                    bucket,
                    key: key.to_string(),
                }
            } else {
                ObjectStoreError::Io(err)
            }
        })?;
        let len = file.metadata().await?.len();
        Ok(StoredObject {
            len,
            reader: Box::pin(file),
        })
    }

    async fn put(
        &self,
        bucket: MediaBucket,
        key: &str,
        bytes: Bytes,
        content_type: &str,
    ) -> ObjectStoreResult<String> {
        Self::ensure_key_safe(key)?;
        let file_path = self.object_path(bucket, key);
        let parent = file_path
            .parent()
            .map(|p| p.to_path_buf())
            .ok_or_else(|| {
                ObjectStoreError::Io(io::Error::new(
                    ErrorKind::Other,
                    "object path missing parent directory",
                ))
            })?;
        fs::create_dir_all(&parent).await?;

        let tmp_path = parent.join(format!(".tmp-{}", Uuid::new_v4()));
        let mut file = File::create(&tmp_path).await?;
        if let Err(err) = file.write_all(&bytes).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(ObjectStoreError::Io(err));
        }
        if let Err(err) = file.flush().await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(ObjectStoreError::Io(err));
        }
        if let Err(err) = file.sync_all().await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(ObjectStoreError::Io(err));
        }

        if let Err(err) = fs::rename(&tmp_path, &file_path).await {
            if err.kind() == ErrorKind::AlreadyExists {
                fs::remove_file(&file_path).await?;
                fs::rename(&tmp_path, &file_path).await?;
            } else {
                let _ = fs::remove_file(&tmp_path).await;
                return Err(ObjectStoreError::Io(err));
            }
        }

        let etag = format!("{:x}", md5::compute(&bytes));
        debug!(
            bucket = %bucket,
            key,
            content_type,
            size_bytes = bytes.len(),
            %etag,
            "stored object"
        );

        Ok(bucket.proxy_url(key))
    }
}
