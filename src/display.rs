//! Terminal progress display
//!
//! One overall bar plus one bar per download worker, driven entirely by
//! [`ProgressEvent`]s from the library.

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use polydown::download::{Outcome, ProgressCallback, ProgressEvent, TaskReport};

pub struct Display {
    multi: MultiProgress,
    overall: ProgressBar,
    workers: Mutex<HashMap<usize, ProgressBar>>,
}

impl Display {
    pub fn new() -> Arc<Self> {
        let multi = MultiProgress::new();
        let overall = multi.add(ProgressBar::new_spinner());
        overall.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} [{elapsed_precise}] {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        overall.enable_steady_tick(Duration::from_millis(100));
        overall.set_message("Fetching asset list...");

        Arc::new(Self {
            multi,
            overall,
            workers: Mutex::new(HashMap::new()),
        })
    }

    /// Event subscriber to hand to the runner
    pub fn callback(self: &Arc<Self>) -> ProgressCallback {
        let display = Arc::clone(self);
        Arc::new(move |event: ProgressEvent| display.handle(event))
    }

    fn handle(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::AssetsFound { count } => {
                self.overall
                    .set_message(format!("Found {} assets, fetching file metadata...", count));
            }
            ProgressEvent::MetadataFailed { asset_id, error } => {
                self.overall
                    .println(format!("Error fetching metadata for {}: {}", asset_id, error));
            }
            ProgressEvent::TasksQueued { total, workers } => {
                self.overall.set_style(
                    ProgressStyle::default_bar()
                        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) | {msg}")
                        .unwrap_or_else(|_| ProgressStyle::default_bar())
                        .progress_chars("=>-"),
                );
                self.overall.set_length(total as u64);
                self.overall.set_position(0);
                self.overall
                    .set_message(format!("Downloading with {} workers", workers));
            }
            ProgressEvent::TaskStarted { worker, filename } => {
                let pb = self.worker_bar(worker);
                pb.reset();
                pb.set_length(0);
                pb.set_message(truncate_name(&filename, 40));
            }
            ProgressEvent::TaskProgress {
                worker,
                downloaded,
                total,
            } => {
                let pb = self.worker_bar(worker);
                if let Some(total) = total {
                    pb.set_length(total);
                }
                pb.set_position(downloaded);
            }
            ProgressEvent::TaskFinished {
                worker,
                report,
                completed,
                total: _,
            } => {
                self.overall.set_position(completed as u64);
                self.overall.set_message(status_line(&report));
                if let Some(line) = notice(&report) {
                    self.overall.println(line);
                }
                let pb = self.worker_bar(worker);
                pb.set_message("idle");
            }
        }
    }

    fn worker_bar(&self, worker: usize) -> ProgressBar {
        let mut workers = self.workers.lock().unwrap_or_else(|e| e.into_inner());
        workers
            .entry(worker)
            .or_insert_with(|| {
                let pb = self
                    .multi
                    .insert_before(&self.overall, ProgressBar::new(0));
                pb.set_style(
                    ProgressStyle::default_bar()
                        .template("  {spinner:.blue} {wide_msg} [{bar:30.white/dim}] {bytes}/{total_bytes} {bytes_per_sec}")
                        .unwrap_or_else(|_| ProgressStyle::default_bar())
                        .progress_chars("=>-"),
                );
                pb.enable_steady_tick(Duration::from_millis(100));
                pb
            })
            .clone()
    }

    /// Tear down all bars before the summary is printed
    pub fn finish(&self) {
        let workers = self.workers.lock().unwrap_or_else(|e| e.into_inner());
        for pb in workers.values() {
            pb.finish_and_clear();
        }
        self.overall.finish_and_clear();
        let _ = self.multi.clear();
    }
}

fn status_line(report: &TaskReport) -> String {
    let verb = match report.outcome {
        Outcome::Downloaded => "Downloaded",
        Outcome::DownloadedOverwrite => "Overwritten",
        Outcome::Exists => "Exists",
        Outcome::Failed => "Failed",
    };
    format!("{}: {}", verb, truncate_name(&report.filename, 40))
}

/// Lines worth keeping above the bars
fn notice(report: &TaskReport) -> Option<String> {
    match report.outcome {
        Outcome::Failed => Some(format!(
            "Failed: {} - {}",
            report.filename,
            report.error.as_deref().unwrap_or("unknown error")
        )),
        _ if !report.verified => Some(format!("MD5 mismatch: {}", report.path.display())),
        _ => None,
    }
}

fn truncate_name(name: &str, max: usize) -> String {
    if name.chars().count() <= max {
        name.to_string()
    } else {
        let keep: String = name.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", keep)
    }
}
