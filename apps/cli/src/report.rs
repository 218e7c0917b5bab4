//! Progress rendering and the final summary.

use caravan_engine::{JobState, UploadEvent};
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Drains upload events into an indicatif byte-progress bar on a
/// background task. Finishes when the orchestrator drops its sender.
pub fn spawn_progress(
    mut events: mpsc::Receiver<UploadEvent>,
    total_bytes: u64,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let pb = ProgressBar::new(total_bytes);
        pb.set_style(
            ProgressStyle::with_template(
                "{spinner:.green} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta})",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> "),
        );

        while let Some(event) = events.recv().await {
            match event {
                UploadEvent::BytesTransferred { bytes } => pb.inc(bytes),
                UploadEvent::Skipped { key, reason } => {
                    pb.println(format!("skipped {key}: {reason}"));
                }
                UploadEvent::AttemptFailed { key, attempt, error } => {
                    pb.println(format!("attempt {attempt} failed for {key}: {error}"));
                }
                UploadEvent::Failed { key, error, attempts } => {
                    pb.println(format!("FAILED {key} after {attempts} attempts: {error}"));
                }
                UploadEvent::Uploaded { .. } => {}
                UploadEvent::Completed { .. } => break,
            }
        }
        pb.finish_and_clear();
    })
}

fn human_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.2} {}", UNITS[unit])
    }
}

/// Prints the final accounting for a finished (or cancelled) job.
pub fn print_summary(state: &JobState, dry_run: bool) {
    let elapsed = state.elapsed();
    println!();
    println!("Upload summary");
    println!("  total files:  {}", state.total_files);
    println!("  uploaded:     {}", state.uploaded_files);
    println!("  skipped:      {}", state.skipped_keys.len());
    println!("  failed:       {}", state.failed_keys.len());
    println!("  total size:   {}", human_bytes(state.total_bytes));
    println!("  duration:     {:.1}s", elapsed.as_secs_f64());
    if elapsed.as_secs_f64() > 0.0 && state.uploaded_bytes > 0 {
        let per_sec = state.uploaded_bytes as f64 / elapsed.as_secs_f64();
        println!("  avg speed:    {}/s", human_bytes(per_sec as u64));
    }

    if !state.failed_keys.is_empty() {
        println!();
        println!("Failed objects:");
        for key in &state.failed_keys {
            println!("  - {key}");
        }
    }

    println!();
    if dry_run {
        println!("Dry run: no objects were uploaded.");
    } else if state.failed_keys.is_empty() && state.is_complete() {
        println!("All files uploaded successfully.");
    } else if !state.is_complete() {
        println!("Job stopped before completion; resume state was kept.");
    } else {
        println!(
            "Upload completed with {} failure(s).",
            state.failed_keys.len()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn human_bytes_units() {
        assert_eq!(human_bytes(0), "0 B");
        assert_eq!(human_bytes(512), "512 B");
        assert_eq!(human_bytes(2048), "2.00 KiB");
        assert_eq!(human_bytes(6 * 1024 * 1024), "6.00 MiB");
    }

    #[tokio::test]
    async fn progress_task_ends_when_sender_drops() {
        let (tx, rx) = mpsc::channel(8);
        let handle = spawn_progress(rx, 100);
        tx.send(UploadEvent::BytesTransferred { bytes: 50 })
            .await
            .unwrap();
        drop(tx);
        handle.await.unwrap();
    }
}
