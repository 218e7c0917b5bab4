//! Directory scanning for upload.
//!
//! Recursively walks the source tree, applies the path filter, and
//! produces work items with remote keys normalized to forward slashes.

use std::collections::HashSet;
use std::path::Path;

use tracing::debug;

use crate::error::UploadError;
use crate::filter::PathFilter;
use crate::types::WorkItem;

/// Result of a directory scan.
#[derive(Debug, Clone)]
pub struct ScanOutcome {
    pub items: Vec<WorkItem>,
    pub total_files: u64,
    pub total_bytes: u64,
}

/// Scans `root` recursively and returns work items for upload.
///
/// Remote keys are `prefix` joined to the root-relative path with `/`
/// separators (even on Windows). Symbolic links and other non-regular
/// entries are skipped silently. Two files mapping to the same remote
/// key is a configuration error.
pub fn scan_source(
    root: &Path,
    prefix: &str,
    filter: &PathFilter,
) -> Result<ScanOutcome, UploadError> {
    if !root.is_dir() {
        return Err(UploadError::SourceNotFound(root.to_path_buf()));
    }

    let mut items = Vec::new();
    let mut seen_keys = HashSet::new();
    walk_dir(root, root, prefix, filter, &mut items, &mut seen_keys)?;

    let total_bytes = items.iter().map(|i| i.size_bytes).sum();
    let outcome = ScanOutcome {
        total_files: items.len() as u64,
        total_bytes,
        items,
    };
    debug!(
        files = outcome.total_files,
        bytes = outcome.total_bytes,
        "scan complete"
    );
    Ok(outcome)
}

fn walk_dir(
    root: &Path,
    current: &Path,
    prefix: &str,
    filter: &PathFilter,
    items: &mut Vec<WorkItem>,
    seen_keys: &mut HashSet<String>,
) -> Result<(), UploadError> {
    for entry in std::fs::read_dir(current)? {
        let entry = entry?;
        let path = entry.path();
        // file_type() does not follow symlinks, so links fall through
        // both branches and are skipped.
        let file_type = entry.file_type()?;

        if file_type.is_dir() {
            walk_dir(root, &path, prefix, filter, items, seen_keys)?;
        } else if file_type.is_file() {
            let name = entry.file_name();
            if !filter.matches(&name.to_string_lossy()) {
                continue;
            }

            let rel_path = path.strip_prefix(root).map_err(std::io::Error::other)?;
            let rel_str = rel_path.to_string_lossy().replace('\\', "/");
            let remote_key = join_key(prefix, &rel_str);

            if !seen_keys.insert(remote_key.clone()) {
                return Err(UploadError::DuplicateKey(remote_key));
            }

            let size_bytes = entry.metadata()?.len();
            items.push(WorkItem {
                local_path: path,
                remote_key,
                size_bytes,
            });
        }
    }
    Ok(())
}

/// Joins a key prefix and a relative path, avoiding empty segments and
/// doubled slashes.
fn join_key(prefix: &str, rel: &str) -> String {
    let prefix = prefix.trim_matches('/');
    if prefix.is_empty() {
        rel.to_string()
    } else {
        format!("{prefix}/{rel}")
    }
}
