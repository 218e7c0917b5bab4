//! Command-line interface definition.

use std::path::PathBuf;

use clap::Parser;

/// Upload a directory tree to an object store, resuming interrupted
/// jobs without re-uploading completed objects.
#[derive(Debug, Parser)]
#[command(name = "caravan", version, about)]
pub struct Cli {
    /// Source directory to upload.
    #[arg(value_name = "SOURCE_DIR", required_unless_present = "config")]
    pub source_dir: Option<PathBuf>,

    /// Destination bucket name.
    #[arg(value_name = "BUCKET", required_unless_present = "config")]
    pub bucket: Option<String>,

    /// Key prefix prepended to every uploaded object.
    #[arg(short, long, default_value = "")]
    pub prefix: String,

    /// JSON configuration file. Replaces all other options.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Root directory under which buckets live.
    #[arg(long, default_value = ".", env = "CARAVAN_STORE_ROOT")]
    pub store_root: PathBuf,

    /// Directory for resume-state files.
    #[arg(long, default_value = ".")]
    pub state_dir: PathBuf,

    /// Maximum concurrent uploads.
    #[arg(long, default_value_t = 4)]
    pub max_concurrency: usize,

    /// Multipart upload threshold in bytes.
    #[arg(long, default_value_t = 8 * 1024 * 1024)]
    pub multipart_threshold: u64,

    /// Maximum attempts per file.
    #[arg(long, default_value_t = 3)]
    pub max_retries: u32,

    /// Persist resume state after every N successful uploads.
    #[arg(long, default_value_t = 10)]
    pub checkpoint_every: u64,

    /// Disable resume capability.
    #[arg(long)]
    pub no_resume: bool,

    /// Disable checksum metadata.
    #[arg(long)]
    pub no_checksums: bool,

    /// Report what would be uploaded without uploading.
    #[arg(long)]
    pub dry_run: bool,

    /// File patterns to exclude (repeatable).
    #[arg(long = "exclude", value_name = "PATTERN")]
    pub exclude: Vec<String>,

    /// File patterns to include (repeatable).
    #[arg(long = "include", value_name = "PATTERN")]
    pub include: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn positional_args_parse() {
        let cli = Cli::try_parse_from(["caravan", "/data/photos", "my-bucket"]).unwrap();
        assert_eq!(cli.source_dir.unwrap(), PathBuf::from("/data/photos"));
        assert_eq!(cli.bucket.as_deref(), Some("my-bucket"));
        assert_eq!(cli.max_concurrency, 4);
        assert!(!cli.dry_run);
    }

    #[test]
    fn positionals_required_without_config() {
        assert!(Cli::try_parse_from(["caravan"]).is_err());
        assert!(Cli::try_parse_from(["caravan", "/data/only-source"]).is_err());
    }

    #[test]
    fn config_file_makes_positionals_optional() {
        let cli = Cli::try_parse_from(["caravan", "--config", "job.json"]).unwrap();
        assert!(cli.source_dir.is_none());
        assert_eq!(cli.config.unwrap(), PathBuf::from("job.json"));
    }

    #[test]
    fn repeatable_patterns() {
        let cli = Cli::try_parse_from([
            "caravan",
            "/src",
            "bucket",
            "--exclude",
            "*.log",
            "--exclude",
            "*.bak",
            "--include",
            "*.jpg",
        ])
        .unwrap();
        assert_eq!(cli.exclude, vec!["*.log", "*.bak"]);
        assert_eq!(cli.include, vec!["*.jpg"]);
    }

    #[test]
    fn toggles_parse() {
        let cli = Cli::try_parse_from([
            "caravan", "/src", "bucket", "--no-resume", "--no-checksums", "--dry-run",
        ])
        .unwrap();
        assert!(cli.no_resume);
        assert!(cli.no_checksums);
        assert!(cli.dry_run);
    }
}
