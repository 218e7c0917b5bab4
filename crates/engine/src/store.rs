//! Object-store transport trait, the seam between the engine and the
//! actual network/storage client.
//!
//! The engine never talks to a concrete store directly. An
//! implementation (filesystem-backed `caravan-store-fs`, an S3 client,
//! a mock in tests) provides HEAD-style metadata queries and the
//! upload primitive, including any multipart negotiation and
//! per-transfer checksum handling.

use std::collections::BTreeMap;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;

/// Errors from the object-store transport.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("object not found: {0}")]
    NotFound(String),

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("transport error: {0}")]
    Transport(String),
}

/// Metadata returned by a HEAD-style query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectMetadata {
    pub size: u64,
}

/// Callback receiving incremental byte deltas during an upload.
pub type ProgressFn = Arc<dyn Fn(u64) + Send + Sync>;

/// One upload handed to the transport.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub local_path: PathBuf,
    pub key: String,
    /// Files at or above this size take the multipart/chunked path.
    pub multipart_threshold: u64,
    pub chunk_size: u64,
    /// Opaque metadata attached to the object (e.g. a `sha256` entry).
    pub metadata: BTreeMap<String, String>,
}

/// Abstract object-store transport.
///
/// Boxed futures keep the trait object-safe so the engine can hold a
/// `dyn ObjectStore` and tests can substitute mocks.
pub trait ObjectStore: Send + Sync {
    /// Queries object metadata without fetching content. `Err` for a
    /// missing object as well as any transport failure.
    fn head_object<'a>(
        &'a self,
        key: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<ObjectMetadata, StoreError>> + Send + 'a>>;

    /// Uploads one local file, reporting incremental bytes via
    /// `progress` as they are transferred.
    fn upload_file<'a>(
        &'a self,
        request: &'a UploadRequest,
        progress: ProgressFn,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + 'a>>;
}
