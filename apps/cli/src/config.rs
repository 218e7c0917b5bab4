//! Job configuration assembly: CLI flags or a JSON config file.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use caravan_engine::UploadJobConfig;
use caravan_engine::types::{
    DEFAULT_CHECKPOINT_EVERY, DEFAULT_CHUNK_SIZE, DEFAULT_MAX_CONCURRENCY, DEFAULT_MAX_RETRIES,
    DEFAULT_MULTIPART_THRESHOLD, default_exclude_patterns, default_include_patterns,
};
use serde::Deserialize;

use crate::args::Cli;

/// Fully assembled job settings, including CLI-only knobs that do not
/// belong in the engine config.
#[derive(Debug, Clone)]
pub struct JobSettings {
    pub config: UploadJobConfig,
    pub store_root: PathBuf,
    pub state_dir: PathBuf,
}

/// JSON config file schema. A file replaces all command-line options.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub source_dir: PathBuf,
    pub bucket: String,
    #[serde(default)]
    pub prefix: String,
    #[serde(default = "default_include_patterns")]
    pub include: Vec<String>,
    #[serde(default = "default_exclude_patterns")]
    pub exclude: Vec<String>,
    #[serde(default = "d_concurrency")]
    pub max_concurrency: usize,
    #[serde(default = "d_retries")]
    pub max_retries: u32,
    /// Base retry delay in seconds.
    #[serde(default = "d_retry_delay")]
    pub retry_delay_secs: f64,
    #[serde(default = "d_threshold")]
    pub multipart_threshold: u64,
    #[serde(default = "d_chunk")]
    pub chunk_size: u64,
    #[serde(default = "d_true")]
    pub verify_checksums: bool,
    #[serde(default = "d_true")]
    pub resume: bool,
    #[serde(default)]
    pub dry_run: bool,
    #[serde(default = "d_checkpoint")]
    pub checkpoint_every: u64,
    #[serde(default = "d_dot")]
    pub store_root: PathBuf,
    #[serde(default = "d_dot")]
    pub state_dir: PathBuf,
}

fn d_concurrency() -> usize {
    DEFAULT_MAX_CONCURRENCY
}
fn d_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}
fn d_retry_delay() -> f64 {
    1.0
}
fn d_threshold() -> u64 {
    DEFAULT_MULTIPART_THRESHOLD
}
fn d_chunk() -> u64 {
    DEFAULT_CHUNK_SIZE
}
fn d_checkpoint() -> u64 {
    DEFAULT_CHECKPOINT_EVERY
}
fn d_true() -> bool {
    true
}
fn d_dot() -> PathBuf {
    PathBuf::from(".")
}

impl FileConfig {
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("could not read config file {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("invalid config file {}", path.display()))
    }

    fn into_settings(self) -> JobSettings {
        JobSettings {
            config: UploadJobConfig {
                source_dir: self.source_dir,
                bucket: self.bucket,
                key_prefix: self.prefix,
                include_patterns: self.include,
                exclude_patterns: self.exclude,
                max_concurrency: self.max_concurrency,
                max_retries: self.max_retries,
                retry_delay: Duration::from_secs_f64(self.retry_delay_secs),
                multipart_threshold: self.multipart_threshold,
                chunk_size: self.chunk_size,
                verify_checksums: self.verify_checksums,
                resume: self.resume,
                dry_run: self.dry_run,
                checkpoint_every: self.checkpoint_every,
            },
            store_root: self.store_root,
            state_dir: self.state_dir,
        }
    }
}

/// Builds the job settings from the parsed CLI.
///
/// When `--config` is given the file wins entirely, mirroring the
/// positional/flag layer being an alternative to it.
pub fn build_settings(cli: Cli) -> anyhow::Result<JobSettings> {
    if let Some(path) = &cli.config {
        return Ok(FileConfig::load(path)?.into_settings());
    }

    // Clap enforces the positionals when --config is absent.
    let source_dir = cli
        .source_dir
        .ok_or_else(|| anyhow::anyhow!("source directory is required"))?;
    let bucket = cli
        .bucket
        .ok_or_else(|| anyhow::anyhow!("bucket name is required"))?;

    let include = if cli.include.is_empty() {
        default_include_patterns()
    } else {
        cli.include
    };
    let exclude = if cli.exclude.is_empty() {
        default_exclude_patterns()
    } else {
        cli.exclude
    };

    Ok(JobSettings {
        config: UploadJobConfig {
            source_dir,
            bucket,
            key_prefix: cli.prefix,
            include_patterns: include,
            exclude_patterns: exclude,
            max_concurrency: cli.max_concurrency,
            max_retries: cli.max_retries,
            retry_delay: Duration::from_secs(1),
            multipart_threshold: cli.multipart_threshold,
            chunk_size: DEFAULT_CHUNK_SIZE,
            verify_checksums: !cli.no_checksums,
            resume: !cli.no_resume,
            dry_run: cli.dry_run,
            checkpoint_every: cli.checkpoint_every,
        },
        store_root: cli.store_root,
        state_dir: cli.state_dir,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn minimal_file_config_uses_defaults() {
        let json = r#"{"source_dir": "/data", "bucket": "b"}"#;
        let config: FileConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.max_concurrency, 4);
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.retry_delay_secs, 1.0);
        assert!(config.verify_checksums);
        assert!(config.resume);
        assert!(!config.dry_run);
        assert!(config.exclude.contains(&".DS_Store".to_string()));
    }

    #[test]
    fn unknown_field_is_an_error() {
        let json = r#"{"source_dir": "/data", "bucket": "b", "bogus": 1}"#;
        assert!(serde_json::from_str::<FileConfig>(json).is_err());
    }

    #[test]
    fn file_config_overrides() {
        let json = r#"{
            "source_dir": "/data",
            "bucket": "b",
            "prefix": "p/q",
            "max_concurrency": 9,
            "retry_delay_secs": 0.5,
            "dry_run": true
        }"#;
        let settings = serde_json::from_str::<FileConfig>(json)
            .unwrap()
            .into_settings();
        assert_eq!(settings.config.key_prefix, "p/q");
        assert_eq!(settings.config.max_concurrency, 9);
        assert_eq!(settings.config.retry_delay, Duration::from_millis(500));
        assert!(settings.config.dry_run);
    }

    #[test]
    fn cli_flags_map_to_config() {
        let cli = Cli::try_parse_from([
            "caravan",
            "/data",
            "bucket",
            "--prefix",
            "backups",
            "--max-retries",
            "5",
            "--no-checksums",
        ])
        .unwrap();
        let settings = build_settings(cli).unwrap();
        assert_eq!(settings.config.bucket, "bucket");
        assert_eq!(settings.config.key_prefix, "backups");
        assert_eq!(settings.config.max_retries, 5);
        assert!(!settings.config.verify_checksums);
        assert!(settings.config.resume);
    }

    #[test]
    fn config_file_replaces_flags() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("job.json");
        std::fs::write(
            &path,
            r#"{"source_dir": "/from-file", "bucket": "file-bucket"}"#,
        )
        .unwrap();

        let cli = Cli::try_parse_from([
            "caravan",
            "--config",
            path.to_str().unwrap(),
        ])
        .unwrap();
        let settings = build_settings(cli).unwrap();
        assert_eq!(settings.config.bucket, "file-bucket");
        assert_eq!(settings.config.source_dir, PathBuf::from("/from-file"));
    }

    #[test]
    fn missing_config_file_errors() {
        let cli = Cli::try_parse_from(["caravan", "--config", "/no/such/file.json"]).unwrap();
        assert!(build_settings(cli).is_err());
    }
}
