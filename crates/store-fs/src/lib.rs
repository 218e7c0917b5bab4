//! Filesystem-backed object store.
//!
//! Treats a directory as a bucket: object keys map to paths below the
//! root, with `/` in keys becoming directory separators. Intended for
//! locally mounted object-store gateways and for integration tests.
//!
//! Uploads are published atomically: bytes are copied to a `.part`
//! sibling and renamed into place, so a reader (including the
//! engine's existence check) never observes a half-written object.
//! Optional metadata (e.g. a `sha256` checksum) is written to a
//! sidecar JSON file under a reserved `.caravan-meta/` tree.

use std::path::{Component, Path, PathBuf};

use caravan_engine::store::{ObjectMetadata, ObjectStore, ProgressFn, StoreError, UploadRequest};
use sha2::{Digest, Sha256};
use std::future::Future;
use std::pin::Pin;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::debug;

/// Reserved key prefix for metadata sidecars.
const META_DIR: &str = ".caravan-meta";

/// Validates that an object key stays inside the bucket directory.
///
/// Rejects empty keys, absolute paths, `..` traversal, Windows path
/// prefixes, and the reserved metadata tree.
pub fn validate_key(key: &str) -> Result<(), StoreError> {
    if key.is_empty() {
        return Err(StoreError::InvalidKey("empty key".into()));
    }

    let path = Path::new(key);
    if path.is_absolute() {
        return Err(StoreError::InvalidKey(format!(
            "absolute path not allowed: {key}"
        )));
    }

    let mut components = path.components();
    if components.clone().next() == Some(Component::Normal(META_DIR.as_ref())) {
        return Err(StoreError::InvalidKey(format!(
            "key uses reserved prefix {META_DIR}: {key}"
        )));
    }

    for component in &mut components {
        match component {
            Component::ParentDir => {
                return Err(StoreError::InvalidKey(format!(
                    "parent directory traversal not allowed: {key}"
                )));
            }
            Component::Prefix(_) | Component::RootDir => {
                return Err(StoreError::InvalidKey(format!(
                    "absolute path not allowed: {key}"
                )));
            }
            Component::CurDir | Component::Normal(_) => {}
        }
    }

    Ok(())
}

/// Object store over a local directory tree.
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    /// Opens (and creates if needed) the bucket directory.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn object_path(&self, key: &str) -> Result<PathBuf, StoreError> {
        validate_key(key)?;
        Ok(self.root.join(key))
    }

    fn meta_path(&self, key: &str) -> PathBuf {
        self.root.join(META_DIR).join(format!("{key}.json"))
    }

    /// Copies `src` into `dst` in `chunk_size` pieces, reporting each
    /// piece via `progress`. Returns the SHA-256 of the copied bytes.
    async fn copy_chunked(
        src: &Path,
        dst: &Path,
        chunk_size: usize,
        progress: &ProgressFn,
    ) -> Result<String, StoreError> {
        let mut reader = tokio::fs::File::open(src).await?;
        let mut writer = tokio::fs::File::create(dst).await?;
        let mut hasher = Sha256::new();
        let mut buf = vec![0u8; chunk_size.max(1)];

        loop {
            let n = reader.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            writer.write_all(&buf[..n]).await?;
            hasher.update(&buf[..n]);
            progress(n as u64);
        }
        writer.flush().await?;
        Ok(hex::encode(hasher.finalize()))
    }

    async fn write_metadata(
        &self,
        key: &str,
        metadata: &std::collections::BTreeMap<String, String>,
    ) -> Result<(), StoreError> {
        let path = self.meta_path(key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let content = serde_json::to_string_pretty(metadata)
            .map_err(|e| StoreError::Transport(format!("metadata encoding failed: {e}")))?;
        tokio::fs::write(&path, content).await?;
        Ok(())
    }
}

impl ObjectStore for FsObjectStore {
    fn head_object<'a>(
        &'a self,
        key: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<ObjectMetadata, StoreError>> + Send + 'a>> {
        Box::pin(async move {
            let path = self.object_path(key)?;
            let meta = tokio::fs::metadata(&path).await.map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    StoreError::NotFound(key.to_string())
                } else {
                    StoreError::Io(e)
                }
            })?;
            if !meta.is_file() {
                return Err(StoreError::NotFound(key.to_string()));
            }
            Ok(ObjectMetadata { size: meta.len() })
        })
    }

    fn upload_file<'a>(
        &'a self,
        request: &'a UploadRequest,
        progress: ProgressFn,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + 'a>> {
        Box::pin(async move {
            let path = self.object_path(&request.key)?;
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }

            let size = tokio::fs::metadata(&request.local_path).await?.len();
            // Below the threshold the whole file is one "chunk".
            let chunk_size = if size >= request.multipart_threshold {
                request.chunk_size as usize
            } else {
                size as usize
            };

            let tmp = part_path(&path);
            let copied = Self::copy_chunked(&request.local_path, &tmp, chunk_size, &progress).await;
            let digest = match copied {
                Ok(digest) => digest,
                Err(e) => {
                    let _ = tokio::fs::remove_file(&tmp).await;
                    return Err(e);
                }
            };

            // Verify against the caller-provided checksum before
            // publishing the object.
            if let Some(expected) = request.metadata.get("sha256") {
                if *expected != digest {
                    let _ = tokio::fs::remove_file(&tmp).await;
                    return Err(StoreError::Transport(format!(
                        "checksum mismatch for {}: expected {expected}, copied {digest}",
                        request.key
                    )));
                }
            }

            tokio::fs::rename(&tmp, &path).await?;

            if !request.metadata.is_empty() {
                self.write_metadata(&request.key, &request.metadata).await?;
            }

            debug!(key = %request.key, bytes = size, chunk_size, "object stored");
            Ok(())
        })
    }
}

fn part_path(path: &Path) -> PathBuf {
    let mut os = path.to_path_buf().into_os_string();
    os.push(".part");
    PathBuf::from(os)
}
