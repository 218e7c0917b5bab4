//! Data types for upload jobs.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use crate::error::UploadError;

/// Files at or above this size are uploaded via the transport's
/// multipart/chunked path. 8 MiB.
pub const DEFAULT_MULTIPART_THRESHOLD: u64 = 8 * 1024 * 1024;

/// Default chunk size for multipart transfers: 8 MiB.
pub const DEFAULT_CHUNK_SIZE: u64 = 8 * 1024 * 1024;

/// Default number of concurrent upload workers.
pub const DEFAULT_MAX_CONCURRENCY: usize = 4;

/// Default number of attempts per file.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default base delay for exponential backoff between attempts.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Default number of successes between resume-state checkpoints.
pub const DEFAULT_CHECKPOINT_EVERY: u64 = 10;

/// Default exclude patterns: OS metadata, temp/log files, caches.
pub fn default_exclude_patterns() -> Vec<String> {
    vec![
        ".DS_Store".into(),
        "*.tmp".into(),
        "*.log".into(),
        "__pycache__".into(),
    ]
}

/// Default include patterns: everything.
pub fn default_include_patterns() -> Vec<String> {
    vec!["*".into()]
}

/// Immutable configuration for one upload job.
///
/// Validated once via [`validate`](Self::validate) before any work
/// starts; never mutated afterwards.
#[derive(Debug, Clone)]
pub struct UploadJobConfig {
    /// Local directory tree to upload.
    pub source_dir: PathBuf,
    /// Destination bucket/container name.
    pub bucket: String,
    /// Key prefix prepended to every remote key.
    pub key_prefix: String,
    /// A file is uploaded iff its base name matches at least one
    /// include pattern and no exclude pattern.
    pub include_patterns: Vec<String>,
    pub exclude_patterns: Vec<String>,
    /// Upper bound on concurrently running upload tasks.
    pub max_concurrency: usize,
    /// Attempts per file before it is recorded as failed.
    pub max_retries: u32,
    /// Base backoff delay; attempt `n` waits `retry_delay * 2^n`.
    pub retry_delay: Duration,
    /// Passed through to the transport; files at or above this size
    /// take the multipart path.
    pub multipart_threshold: u64,
    /// Passed through to the transport.
    pub chunk_size: u64,
    /// Attach a SHA-256 checksum as object metadata on upload.
    pub verify_checksums: bool,
    /// Load prior resume state and skip objects already present.
    pub resume: bool,
    /// Simulate uploads without contacting the transport.
    pub dry_run: bool,
    /// Persist resume state after every N successful uploads.
    pub checkpoint_every: u64,
}

impl UploadJobConfig {
    /// Creates a config for `source_dir` → `bucket` with default tuning.
    pub fn new(source_dir: impl Into<PathBuf>, bucket: impl Into<String>) -> Self {
        Self {
            source_dir: source_dir.into(),
            bucket: bucket.into(),
            key_prefix: String::new(),
            include_patterns: default_include_patterns(),
            exclude_patterns: default_exclude_patterns(),
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay: DEFAULT_RETRY_DELAY,
            multipart_threshold: DEFAULT_MULTIPART_THRESHOLD,
            chunk_size: DEFAULT_CHUNK_SIZE,
            verify_checksums: true,
            resume: true,
            dry_run: false,
            checkpoint_every: DEFAULT_CHECKPOINT_EVERY,
        }
    }

    /// Checks the config before any upload work begins.
    pub fn validate(&self) -> Result<(), UploadError> {
        if !self.source_dir.is_dir() {
            return Err(UploadError::SourceNotFound(self.source_dir.clone()));
        }
        if self.bucket.is_empty() {
            return Err(UploadError::InvalidConfig("bucket name is empty".into()));
        }
        if self.max_concurrency == 0 {
            return Err(UploadError::InvalidConfig(
                "max_concurrency must be at least 1".into(),
            ));
        }
        if self.max_retries == 0 {
            return Err(UploadError::InvalidConfig(
                "max_retries must be at least 1".into(),
            ));
        }
        if self.chunk_size == 0 {
            return Err(UploadError::InvalidConfig("chunk_size must be non-zero".into()));
        }
        if self.checkpoint_every == 0 {
            return Err(UploadError::InvalidConfig(
                "checkpoint_every must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// One file to upload. Produced by the scanner; immutable.
///
/// `remote_key` is unique within a job; the scanner rejects
/// collisions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    pub local_path: PathBuf,
    pub remote_key: String,
    pub size_bytes: u64,
}

/// Why an item was skipped rather than uploaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Marked complete in the loaded resume record.
    ResumeRecord,
    /// The destination already holds an object of the same size.
    RemoteMatch,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::ResumeRecord => write!(f, "completed in previous run"),
            SkipReason::RemoteMatch => write!(f, "already present at destination"),
        }
    }
}

/// Terminal result of one upload task.
#[derive(Debug, Clone)]
pub enum TaskOutcome {
    Uploaded { bytes: u64 },
    Skipped { reason: SkipReason },
    Failed { error: String, attempts: u32 },
}

/// Aggregated job progress, owned exclusively by the orchestrator.
///
/// `uploaded_files` and `uploaded_bytes` only grow; all mutation
/// happens at the orchestrator's single aggregation point, never from
/// concurrent tasks.
#[derive(Debug, Clone)]
pub struct JobState {
    pub total_files: u64,
    pub total_bytes: u64,
    pub uploaded_files: u64,
    pub uploaded_bytes: u64,
    pub failed_keys: BTreeSet<String>,
    pub skipped_keys: BTreeSet<String>,
    pub started_at: Instant,
}

impl JobState {
    pub fn new(total_files: u64, total_bytes: u64) -> Self {
        Self {
            total_files,
            total_bytes,
            uploaded_files: 0,
            uploaded_bytes: 0,
            failed_keys: BTreeSet::new(),
            skipped_keys: BTreeSet::new(),
            started_at: Instant::now(),
        }
    }

    /// Items with a terminal outcome so far. Never exceeds
    /// `total_files`; equals it exactly when the job has completed.
    pub fn accounted_files(&self) -> u64 {
        self.uploaded_files + self.failed_keys.len() as u64 + self.skipped_keys.len() as u64
    }

    /// True once every item has a terminal outcome. False for a
    /// cancelled job with unscheduled items.
    pub fn is_complete(&self) -> bool {
        self.accounted_files() == self.total_files
    }

    pub fn has_failures(&self) -> bool {
        !self.failed_keys.is_empty()
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }
}

/// Progress event emitted during a job, consumed by the reporter.
#[derive(Debug, Clone)]
pub enum UploadEvent {
    /// Incremental bytes transferred (approximate; includes bytes from
    /// attempts that later failed).
    BytesTransferred { bytes: u64 },
    /// An item was skipped.
    Skipped { key: String, reason: SkipReason },
    /// One attempt failed; the task will retry or give up.
    AttemptFailed { key: String, attempt: u32, error: String },
    /// An item finished uploading.
    Uploaded { key: String, bytes: u64 },
    /// An item exhausted its retries.
    Failed { key: String, error: String, attempts: u32 },
    /// The job finished.
    Completed { uploaded: u64, skipped: u64, failed: u64 },
}
