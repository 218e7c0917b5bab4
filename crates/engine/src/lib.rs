//! Resumable bulk upload engine.
//!
//! This crate implements the **core logic** for uploading a large
//! directory tree to a remote object store: scan and filter, skip
//! detection against remote state, durable resume records, per-file
//! retry with exponential backoff, and bounded-concurrency
//! orchestration with aggregated progress. It is a library crate with
//! no UI or transport dependencies; callers provide an [`ObjectStore`]
//! implementation that bridges to the actual storage client.
//!
//! # Pipeline
//!
//! 1. **Scan**: recursively walk the source tree, apply the filter
//! 2. **Resume**: load prior state, skip keys already completed
//! 3. **Upload**: run tasks over a bounded pool, retrying transients
//! 4. **Checkpoint**: persist resume state periodically and at the end
//! 5. **Summarize**: return final accounting; clear state on success

pub mod error;
pub mod filter;
pub mod oracle;
pub mod orchestrator;
pub mod scanner;
pub mod state;
pub mod store;
pub mod task;
pub mod types;

// Re-export primary types for convenience.
pub use error::UploadError;
pub use filter::PathFilter;
pub use oracle::object_exists_with_size;
pub use orchestrator::UploadOrchestrator;
pub use scanner::{ScanOutcome, scan_source};
pub use state::{JobIdentity, ResumeRecord, ResumeStore, config_fingerprint};
pub use store::{ObjectMetadata, ObjectStore, ProgressFn, StoreError, UploadRequest};
pub use task::{UploadTask, backoff_delay, file_sha256};
pub use types::{
    JobState, SkipReason, TaskOutcome, UploadEvent, UploadJobConfig, WorkItem,
};
