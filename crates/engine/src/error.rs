//! Engine error types.

use std::path::PathBuf;

use crate::store::StoreError;

/// Errors produced by the upload engine.
///
/// Per-item transfer failures are *not* represented here; they are
/// captured in [`TaskOutcome::Failed`](crate::types::TaskOutcome) and
/// never abort a job. `UploadError` covers the fatal setup and
/// configuration cases plus internal I/O.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("source directory not found: {}", .0.display())]
    SourceNotFound(PathBuf),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("two local files map to the same remote key: {0}")]
    DuplicateKey(String),

    #[error("object store error: {0}")]
    Store(#[from] StoreError),
}
