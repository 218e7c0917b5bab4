//! Durable resume state for interrupted jobs.
//!
//! One JSON file per destination identity (bucket + prefix) records
//! which remote keys have completed. Saves go through a temp file and
//! rename so a crash mid-write leaves either the old record or the new
//! one, never a torn file.

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::error::UploadError;
use crate::types::UploadJobConfig;

/// Identifies the destination a resume record belongs to.
///
/// Distinct bucket/prefix pairs map to distinct state files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobIdentity {
    bucket: String,
    prefix: String,
}

impl JobIdentity {
    pub fn new(bucket: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            prefix: prefix.into(),
        }
    }

    pub fn from_config(config: &UploadJobConfig) -> Self {
        Self::new(config.bucket.clone(), config.key_prefix.clone())
    }

    /// State file name for this destination. The hash suffix keeps
    /// names unique even when sanitizing collapses bucket characters.
    fn file_name(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.bucket.as_bytes());
        hasher.update(b"\0");
        hasher.update(self.prefix.as_bytes());
        let digest = hex::encode(hasher.finalize());
        format!(
            ".caravan_state_{}_{}.json",
            sanitize(&self.bucket),
            &digest[..12]
        )
    }
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Fingerprint of the destination-relevant configuration fields,
/// stored in the record so a later run can detect it was produced by a
/// different job setup.
pub fn config_fingerprint(config: &UploadJobConfig) -> String {
    let mut hasher = Sha256::new();
    hasher.update(config.source_dir.to_string_lossy().as_bytes());
    hasher.update(b"\0");
    hasher.update(config.bucket.as_bytes());
    hasher.update(b"\0");
    hasher.update(config.key_prefix.as_bytes());
    hex::encode(hasher.finalize())
}

/// Persisted record of completed remote keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResumeRecord {
    /// remote key → completed flag.
    pub completed: BTreeMap<String, bool>,
    pub config_fingerprint: String,
    pub updated_at: DateTime<Utc>,
}

impl ResumeRecord {
    pub fn new(config_fingerprint: String) -> Self {
        Self {
            completed: BTreeMap::new(),
            config_fingerprint,
            updated_at: Utc::now(),
        }
    }

    pub fn mark_completed(&mut self, key: &str) {
        self.completed.insert(key.to_string(), true);
        self.updated_at = Utc::now();
    }

    pub fn is_completed(&self, key: &str) -> bool {
        self.completed.get(key).copied().unwrap_or(false)
    }

    pub fn completed_count(&self) -> usize {
        self.completed.values().filter(|done| **done).count()
    }
}

/// Loads, checkpoints, and clears resume records on disk.
pub struct ResumeStore {
    state_dir: PathBuf,
}

impl ResumeStore {
    /// `state_dir` is created on first save if missing.
    pub fn new(state_dir: impl Into<PathBuf>) -> Self {
        Self {
            state_dir: state_dir.into(),
        }
    }

    /// Path of the state file for `identity`.
    pub fn path_for(&self, identity: &JobIdentity) -> PathBuf {
        self.state_dir.join(identity.file_name())
    }

    /// Loads the record for `identity`.
    ///
    /// Absent, unreadable, or corrupt state is treated as "no prior
    /// state": corruption is logged as a warning, never fatal.
    pub fn load(&self, identity: &JobIdentity) -> Option<ResumeRecord> {
        let path = self.path_for(identity);
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "could not read resume state");
                return None;
            }
        };
        match serde_json::from_str::<ResumeRecord>(&content) {
            Ok(record) => {
                debug!(
                    path = %path.display(),
                    completed = record.completed_count(),
                    "resume state loaded"
                );
                Some(record)
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "resume state is corrupt, ignoring");
                None
            }
        }
    }

    /// Persists `record` atomically: write to a `.tmp` sibling, then
    /// rename over the target.
    pub fn save(&self, identity: &JobIdentity, record: &ResumeRecord) -> Result<(), UploadError> {
        std::fs::create_dir_all(&self.state_dir)?;
        let path = self.path_for(identity);
        let tmp = tmp_path(&path);

        let content = serde_json::to_string_pretty(record)?;
        std::fs::write(&tmp, content)?;
        std::fs::rename(&tmp, &path)?;

        debug!(
            path = %path.display(),
            completed = record.completed_count(),
            "resume state saved"
        );
        Ok(())
    }

    /// Removes the record. Called only when a job finishes with zero
    /// failures. Missing files are not an error.
    pub fn clear(&self, identity: &JobIdentity) -> Result<(), UploadError> {
        let path = self.path_for(identity);
        match std::fs::remove_file(&path) {
            Ok(()) => {
                debug!(path = %path.display(), "resume state cleared");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

fn tmp_path(path: &std::path::Path) -> PathBuf {
    let mut os = path.to_path_buf().into_os_string();
    os.push(".tmp");
    PathBuf::from(os)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample_config(dir: &std::path::Path) -> UploadJobConfig {
        let mut config = UploadJobConfig::new(dir, "photos");
        config.key_prefix = "vacation/2026".into();
        config
    }

    #[test]
    fn load_absent_returns_none() {
        let dir = TempDir::new().unwrap();
        let store = ResumeStore::new(dir.path());
        let identity = JobIdentity::new("photos", "");
        assert!(store.load(&identity).is_none());
    }

    #[test]
    fn save_load_roundtrip() {
        let dir = TempDir::new().unwrap();
        let store = ResumeStore::new(dir.path());
        let identity = JobIdentity::new("photos", "vacation");

        let mut record = ResumeRecord::new("fp".into());
        record.mark_completed("vacation/a.jpg");
        record.mark_completed("vacation/b.jpg");

        store.save(&identity, &record).unwrap();
        let loaded = store.load(&identity).unwrap();
        assert_eq!(loaded.completed, record.completed);
        assert_eq!(loaded.config_fingerprint, "fp");
        assert!(loaded.is_completed("vacation/a.jpg"));
        assert!(!loaded.is_completed("vacation/c.jpg"));
    }

    #[test]
    fn save_leaves_no_tmp_file() {
        let dir = TempDir::new().unwrap();
        let store = ResumeStore::new(dir.path());
        let identity = JobIdentity::new("photos", "");
        store
            .save(&identity, &ResumeRecord::new("fp".into()))
            .unwrap();

        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .filter(|n| n.ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty(), "tmp files left: {leftovers:?}");
    }

    #[test]
    fn corrupt_state_treated_as_absent() {
        let dir = TempDir::new().unwrap();
        let store = ResumeStore::new(dir.path());
        let identity = JobIdentity::new("photos", "");
        std::fs::write(store.path_for(&identity), "{not json").unwrap();
        assert!(store.load(&identity).is_none());
    }

    #[test]
    fn clear_removes_record() {
        let dir = TempDir::new().unwrap();
        let store = ResumeStore::new(dir.path());
        let identity = JobIdentity::new("photos", "");
        store
            .save(&identity, &ResumeRecord::new("fp".into()))
            .unwrap();
        assert!(store.path_for(&identity).exists());

        store.clear(&identity).unwrap();
        assert!(!store.path_for(&identity).exists());
        // Clearing twice is fine.
        store.clear(&identity).unwrap();
    }

    #[test]
    fn distinct_destinations_use_distinct_files() {
        let store = ResumeStore::new("/tmp");
        let a = JobIdentity::new("photos", "one");
        let b = JobIdentity::new("photos", "two");
        let c = JobIdentity::new("backups", "one");
        assert_ne!(store.path_for(&a), store.path_for(&b));
        assert_ne!(store.path_for(&a), store.path_for(&c));
    }

    #[test]
    fn sanitized_names_stay_distinct() {
        let store = ResumeStore::new("/tmp");
        // Both sanitize to the same prefix; the hash keeps them apart.
        let a = JobIdentity::new("my.bucket", "");
        let b = JobIdentity::new("my:bucket", "");
        assert_ne!(store.path_for(&a), store.path_for(&b));
    }

    #[test]
    fn fingerprint_tracks_destination_fields() {
        let dir = TempDir::new().unwrap();
        let config = sample_config(dir.path());
        let fp1 = config_fingerprint(&config);

        let mut other = config.clone();
        other.key_prefix = "different".into();
        assert_ne!(fp1, config_fingerprint(&other));

        // Tuning knobs do not affect the fingerprint.
        let mut tuned = config.clone();
        tuned.max_concurrency = 16;
        assert_eq!(fp1, config_fingerprint(&tuned));
    }

    #[test]
    fn completed_count_ignores_false_entries() {
        let mut record = ResumeRecord::new("fp".into());
        record.mark_completed("a");
        record.completed.insert("b".into(), false);
        assert_eq!(record.completed_count(), 1);
        assert!(!record.is_completed("b"));
    }
}
