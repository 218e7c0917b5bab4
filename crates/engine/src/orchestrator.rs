//! Bounded-concurrency upload orchestration with resume checkpointing.
//!
//! Work items run on a semaphore-bounded pool of spawned tasks. Every
//! terminal outcome flows back through a single completion channel, so
//! all `JobState` mutation happens in one place and no counter update
//! can race.

use std::sync::Arc;

use tokio::sync::{Semaphore, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::error::UploadError;
use crate::state::{JobIdentity, ResumeRecord, ResumeStore, config_fingerprint};
use crate::store::ObjectStore;
use crate::task::UploadTask;
use crate::types::{JobState, SkipReason, TaskOutcome, UploadEvent, UploadJobConfig, WorkItem};

/// Runs upload tasks over a bounded worker pool and aggregates results.
pub struct UploadOrchestrator {
    store: Arc<dyn ObjectStore>,
    resume_store: ResumeStore,
    events_tx: mpsc::Sender<UploadEvent>,
    events_rx: Option<mpsc::Receiver<UploadEvent>>,
    cancel: CancellationToken,
}

impl UploadOrchestrator {
    pub fn new(store: Arc<dyn ObjectStore>, resume_store: ResumeStore) -> Self {
        let (events_tx, events_rx) = mpsc::channel(256);
        Self {
            store,
            resume_store,
            events_tx,
            events_rx: Some(events_rx),
            cancel: CancellationToken::new(),
        }
    }

    /// Takes the event receiver for the reporter. Can only be called
    /// once.
    pub fn take_events(&mut self) -> Option<mpsc::Receiver<UploadEvent>> {
        self.events_rx.take()
    }

    /// Returns the job-level stop signal. Once cancelled, no new task
    /// is scheduled; in-flight uploads finish and are counted.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Runs the job to completion and returns the final state.
    ///
    /// Per-item failures never abort the run; only setup-level errors
    /// (resume-state persistence) surface as `Err`. Events are
    /// discarded when no consumer took the receiver before the run.
    pub async fn run(
        &mut self,
        items: Vec<WorkItem>,
        config: &UploadJobConfig,
    ) -> Result<JobState, UploadError> {
        // Without a consumer the event channel would fill up and stall
        // the job. Closing the receiver turns every send into a no-op.
        drop(self.events_rx.take());

        let config = Arc::new(config.clone());
        let identity = JobIdentity::from_config(&config);
        let fingerprint = config_fingerprint(&config);

        // Dry runs never read or write resume state.
        let mut record = if config.resume && !config.dry_run {
            self.resume_store.load(&identity)
        } else {
            None
        }
        .unwrap_or_else(|| ResumeRecord::new(fingerprint.clone()));

        if record.config_fingerprint != fingerprint {
            // Same destination, different job setup. The completed keys
            // are still keyed by destination, so they remain usable.
            warn!("resume state was produced by a different job configuration");
            record.config_fingerprint = fingerprint;
        }

        let total_files = items.len() as u64;
        let total_bytes = items.iter().map(|i| i.size_bytes).sum();
        let mut state = JobState::new(total_files, total_bytes);

        info!(
            files = total_files,
            bytes = total_bytes,
            concurrency = config.max_concurrency,
            dry_run = config.dry_run,
            "starting upload job"
        );

        let semaphore = Arc::new(Semaphore::new(config.max_concurrency));
        let (done_tx, mut done_rx) = mpsc::channel::<(WorkItem, TaskOutcome)>(
            config.max_concurrency.max(1),
        );

        for item in items {
            if config.resume && record.is_completed(&item.remote_key) {
                // Completed in a previous run: account for it without
                // scheduling a task.
                state.skipped_keys.insert(item.remote_key.clone());
                let _ = self
                    .events_tx
                    .send(UploadEvent::BytesTransferred {
                        bytes: item.size_bytes,
                    })
                    .await;
                let _ = self
                    .events_tx
                    .send(UploadEvent::Skipped {
                        key: item.remote_key,
                        reason: SkipReason::ResumeRecord,
                    })
                    .await;
                continue;
            }

            let task = UploadTask::new(
                Arc::clone(&self.store),
                Arc::clone(&config),
                self.events_tx.clone(),
            );
            let semaphore = Arc::clone(&semaphore);
            let cancel = self.cancel.clone();
            let done = done_tx.clone();
            tokio::spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return;
                };
                if cancel.is_cancelled() {
                    // Unscheduled items stay unaccounted; the job ends
                    // incomplete and keeps its resume state.
                    return;
                }
                let outcome = task.run(&item).await;
                let _ = done.send((item, outcome)).await;
            });
        }
        drop(done_tx);

        // Single aggregation point: the only place JobState and the
        // resume record are mutated.
        let mut successes_since_checkpoint = 0u64;
        while let Some((item, outcome)) = done_rx.recv().await {
            match outcome {
                TaskOutcome::Uploaded { bytes } => {
                    state.uploaded_files += 1;
                    state.uploaded_bytes += bytes;
                    let _ = self
                        .events_tx
                        .send(UploadEvent::Uploaded {
                            key: item.remote_key.clone(),
                            bytes,
                        })
                        .await;

                    if !config.dry_run {
                        record.mark_completed(&item.remote_key);
                        successes_since_checkpoint += 1;
                        if successes_since_checkpoint >= config.checkpoint_every {
                            if let Err(e) = self.resume_store.save(&identity, &record) {
                                warn!(error = %e, "resume checkpoint failed");
                            }
                            successes_since_checkpoint = 0;
                        }
                    }
                }
                TaskOutcome::Skipped { reason } => {
                    state.skipped_keys.insert(item.remote_key.clone());
                    if !config.dry_run {
                        // Present at the destination counts as complete
                        // for future resumes.
                        record.mark_completed(&item.remote_key);
                    }
                    let _ = self
                        .events_tx
                        .send(UploadEvent::Skipped {
                            key: item.remote_key,
                            reason,
                        })
                        .await;
                }
                TaskOutcome::Failed { error, attempts } => {
                    state.failed_keys.insert(item.remote_key.clone());
                    error!(
                        key = %item.remote_key,
                        attempts,
                        error = %error,
                        "upload failed permanently"
                    );
                    let _ = self
                        .events_tx
                        .send(UploadEvent::Failed {
                            key: item.remote_key,
                            error,
                            attempts,
                        })
                        .await;
                }
            }
        }

        if !config.dry_run {
            // Unconditional final checkpoint, then drop the record
            // entirely once nothing is left to resume.
            self.resume_store.save(&identity, &record)?;
            if state.is_complete() && !state.has_failures() {
                self.resume_store.clear(&identity)?;
            }
        }

        let _ = self
            .events_tx
            .send(UploadEvent::Completed {
                uploaded: state.uploaded_files,
                skipped: state.skipped_keys.len() as u64,
                failed: state.failed_keys.len() as u64,
            })
            .await;

        info!(
            uploaded = state.uploaded_files,
            uploaded_bytes = state.uploaded_bytes,
            skipped = state.skipped_keys.len(),
            failed = state.failed_keys.len(),
            "upload job finished"
        );
        Ok(state)
    }
}
