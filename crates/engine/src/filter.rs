//! Include/exclude filtering of scanned files.
//!
//! Patterns are shell-style globs matched against a file's base name
//! only, never its full path. Exclude patterns win over includes.

use glob::Pattern;

use crate::error::UploadError;
use crate::types::{default_exclude_patterns, default_include_patterns};

/// Decides per-file inclusion from compiled glob patterns.
///
/// Pure: the result depends only on the file name and the configured
/// patterns.
#[derive(Debug, Clone)]
pub struct PathFilter {
    includes: Vec<Pattern>,
    excludes: Vec<Pattern>,
}

impl PathFilter {
    /// Compiles the given patterns. A malformed pattern is a
    /// configuration error.
    pub fn new(include: &[String], exclude: &[String]) -> Result<Self, UploadError> {
        Ok(Self {
            includes: compile(include)?,
            excludes: compile(exclude)?,
        })
    }

    /// Filter with the default patterns: include everything, exclude
    /// common noise (`.DS_Store`, `*.tmp`, `*.log`, `__pycache__`).
    pub fn with_defaults() -> Result<Self, UploadError> {
        Self::new(&default_include_patterns(), &default_exclude_patterns())
    }

    /// Returns true iff `file_name` matches at least one include
    /// pattern and none of the exclude patterns.
    pub fn matches(&self, file_name: &str) -> bool {
        if self.excludes.iter().any(|p| p.matches(file_name)) {
            return false;
        }
        self.includes.iter().any(|p| p.matches(file_name))
    }
}

fn compile(patterns: &[String]) -> Result<Vec<Pattern>, UploadError> {
    patterns
        .iter()
        .map(|p| {
            Pattern::new(p)
                .map_err(|e| UploadError::InvalidConfig(format!("bad glob pattern {p:?}: {e}")))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter(include: &[&str], exclude: &[&str]) -> PathFilter {
        let include: Vec<String> = include.iter().map(|s| s.to_string()).collect();
        let exclude: Vec<String> = exclude.iter().map(|s| s.to_string()).collect();
        PathFilter::new(&include, &exclude).unwrap()
    }

    #[test]
    fn default_includes_everything_but_noise() {
        let f = PathFilter::with_defaults().unwrap();
        assert!(f.matches("photo.jpg"));
        assert!(f.matches("archive.tar.gz"));
        assert!(!f.matches(".DS_Store"));
        assert!(!f.matches("scratch.tmp"));
        assert!(!f.matches("debug.log"));
        assert!(!f.matches("__pycache__"));
    }

    #[test]
    fn exclude_wins_over_include() {
        let f = filter(&["*.log"], &["*.log"]);
        assert!(!f.matches("debug.log"));
    }

    #[test]
    fn unmatched_include_excludes() {
        let f = filter(&["*.jpg"], &[]);
        assert!(f.matches("photo.jpg"));
        assert!(!f.matches("notes.txt"));
    }

    #[test]
    fn multiple_includes_any_matches() {
        let f = filter(&["*.jpg", "*.png"], &[]);
        assert!(f.matches("a.jpg"));
        assert!(f.matches("b.png"));
        assert!(!f.matches("c.gif"));
    }

    #[test]
    fn result_is_call_order_independent() {
        let f = filter(&["*"], &["*.tmp"]);
        let first = f.matches("x.tmp");
        for _ in 0..10 {
            let _ = f.matches("other.txt");
        }
        assert_eq!(f.matches("x.tmp"), first);
    }

    #[test]
    fn bad_pattern_is_config_error() {
        let result = PathFilter::new(&["[".to_string()], &[]);
        assert!(matches!(
            result,
            Err(UploadError::InvalidConfig(_))
        ));
    }
}
