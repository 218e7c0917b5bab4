//! Caravan entry point.

mod args;
mod config;
mod report;

use std::process::ExitCode;
use std::sync::Arc;

use caravan_engine::{PathFilter, ResumeStore, UploadOrchestrator, scan_source};
use caravan_store_fs::FsObjectStore;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::args::Cli;
use crate::config::{JobSettings, build_settings};

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    let settings = match build_settings(cli) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("configuration error: {e:#}");
            return ExitCode::from(2);
        }
    };

    match run(settings).await {
        // Exit 0 only when every item succeeded or was skipped.
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::from(2)
        }
    }
}

async fn run(settings: JobSettings) -> anyhow::Result<bool> {
    let JobSettings {
        config,
        store_root,
        state_dir,
    } = settings;

    config.validate()?;

    tracing::info!(
        source = %config.source_dir.display(),
        bucket = %config.bucket,
        prefix = %config.key_prefix,
        dry_run = config.dry_run,
        "starting caravan upload"
    );

    let filter = PathFilter::new(&config.include_patterns, &config.exclude_patterns)?;
    let scan = scan_source(&config.source_dir, &config.key_prefix, &filter)?;

    if scan.items.is_empty() {
        println!("No files matched; nothing to upload.");
        return Ok(true);
    }
    println!(
        "Found {} files ({} bytes) to upload to {}/{}",
        scan.total_files, scan.total_bytes, config.bucket, config.key_prefix
    );
    if config.dry_run {
        println!("DRY RUN: no objects will actually be uploaded.");
    }

    // Reaching the bucket directory is a setup concern: fail before
    // any task is scheduled.
    let store = Arc::new(FsObjectStore::open(store_root.join(&config.bucket))?);

    let mut orchestrator = UploadOrchestrator::new(store, ResumeStore::new(state_dir));

    // Ctrl-C stops scheduling new uploads; in-flight ones finish.
    let cancel = orchestrator.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, finishing in-flight uploads");
            cancel.cancel();
        }
    });

    let progress = orchestrator
        .take_events()
        .map(|events| report::spawn_progress(events, scan.total_bytes));

    let state = orchestrator.run(scan.items, &config).await?;
    drop(orchestrator);
    if let Some(handle) = progress {
        let _ = handle.await;
    }

    report::print_summary(&state, config.dry_run);
    Ok(state.is_complete() && !state.has_failures())
}
