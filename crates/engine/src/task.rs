//! Single-file upload with bounded retries and exponential backoff.

use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use sha2::{Digest, Sha256};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::oracle::object_exists_with_size;
use crate::store::{ObjectStore, ProgressFn, UploadRequest};
use crate::types::{SkipReason, TaskOutcome, UploadEvent, UploadJobConfig, WorkItem};

/// Delay before the retry following 0-based attempt `attempt`:
/// `base * 2^attempt`.
pub fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    base * 2u32.saturating_pow(attempt)
}

/// Computes the SHA-256 of a file as a hex digest.
pub fn file_sha256(path: &Path) -> Result<String, std::io::Error> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 8192];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Uploads one work item, delegating the transfer to the object-store
/// transport. The retry backoff sleep happens inside the task, so the
/// concurrency slot stays occupied by the item that owns the retry.
pub struct UploadTask {
    store: Arc<dyn ObjectStore>,
    config: Arc<UploadJobConfig>,
    events: mpsc::Sender<UploadEvent>,
}

impl UploadTask {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        config: Arc<UploadJobConfig>,
        events: mpsc::Sender<UploadEvent>,
    ) -> Self {
        Self {
            store,
            config,
            events,
        }
    }

    /// Runs the task to a terminal outcome. Never returns an error:
    /// per-item failures are captured in [`TaskOutcome::Failed`].
    pub async fn run(&self, item: &WorkItem) -> TaskOutcome {
        // Dry runs never touch the transport, so the existence probe
        // is bypassed as well.
        if self.config.dry_run {
            self.emit_bytes(item.size_bytes).await;
            info!(key = %item.remote_key, bytes = item.size_bytes, "dry run, simulated upload");
            return TaskOutcome::Uploaded {
                bytes: item.size_bytes,
            };
        }

        if self.config.resume
            && object_exists_with_size(self.store.as_ref(), &item.remote_key, item.size_bytes)
                .await
        {
            info!(key = %item.remote_key, "skipping, object already present with matching size");
            self.emit_bytes(item.size_bytes).await;
            return TaskOutcome::Skipped {
                reason: SkipReason::RemoteMatch,
            };
        }

        let request = match self.build_request(item).await {
            Ok(request) => request,
            Err(e) => {
                error!(key = %item.remote_key, error = %e, "could not prepare upload");
                return TaskOutcome::Failed {
                    error: e.to_string(),
                    attempts: 0,
                };
            }
        };

        for attempt in 0..self.config.max_retries {
            let events = self.events.clone();
            // Progress is best-effort: a full channel drops the delta
            // rather than stalling the transfer.
            let progress: ProgressFn = Arc::new(move |bytes| {
                let _ = events.try_send(UploadEvent::BytesTransferred { bytes });
            });

            match self.store.upload_file(&request, progress).await {
                Ok(()) => {
                    info!(
                        key = %item.remote_key,
                        bytes = item.size_bytes,
                        attempts = attempt + 1,
                        "uploaded"
                    );
                    return TaskOutcome::Uploaded {
                        bytes: item.size_bytes,
                    };
                }
                Err(e) => {
                    warn!(
                        key = %item.remote_key,
                        attempt = attempt + 1,
                        error = %e,
                        "upload attempt failed"
                    );
                    let _ = self
                        .events
                        .send(UploadEvent::AttemptFailed {
                            key: item.remote_key.clone(),
                            attempt: attempt + 1,
                            error: e.to_string(),
                        })
                        .await;

                    if attempt + 1 < self.config.max_retries {
                        tokio::time::sleep(backoff_delay(self.config.retry_delay, attempt)).await;
                    } else {
                        error!(
                            key = %item.remote_key,
                            attempts = self.config.max_retries,
                            "giving up after exhausting retries"
                        );
                        return TaskOutcome::Failed {
                            error: e.to_string(),
                            attempts: self.config.max_retries,
                        };
                    }
                }
            }
        }

        // max_retries is validated to be >= 1, so the loop always
        // returns; this satisfies the compiler.
        TaskOutcome::Failed {
            error: "no attempts made".into(),
            attempts: 0,
        }
    }

    async fn build_request(&self, item: &WorkItem) -> Result<UploadRequest, std::io::Error> {
        let mut metadata = BTreeMap::new();
        if self.config.verify_checksums {
            let path = item.local_path.clone();
            let digest = tokio::task::spawn_blocking(move || file_sha256(&path))
                .await
                .map_err(std::io::Error::other)??;
            metadata.insert("sha256".to_string(), digest);
        }
        Ok(UploadRequest {
            local_path: item.local_path.clone(),
            key: item.remote_key.clone(),
            multipart_threshold: self.config.multipart_threshold,
            chunk_size: self.config.chunk_size,
            metadata,
        })
    }

    async fn emit_bytes(&self, bytes: u64) {
        let _ = self.events.send(UploadEvent::BytesTransferred { bytes }).await;
    }
}
