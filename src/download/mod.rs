//! Download phase: per-task executor, worker pool, events, cancellation.

mod cancel;
mod controller;
mod events;
mod executor;

pub use cancel::{CancelHandle, Cancellation};
pub use controller::{DownloadController, DEFAULT_CONCURRENCY};
pub use events::{ProgressCallback, ProgressEvent};
pub use executor::{Executor, Outcome, TaskReport};

/// A task that ended in [`Outcome::Failed`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedDownload {
    pub filename: String,
    pub url: String,
    pub error: String,
}

/// Tally of a download run
#[derive(Debug, Default, Clone)]
pub struct RunResult {
    pub downloaded: usize,
    /// Already on disk, not fetched
    pub existing: usize,
    pub failed: usize,
    /// Tasks that ended unverified: MD5 mismatches plus failed tasks
    pub corrupted: usize,
    /// Files on disk whose MD5 did not match
    pub corrupted_files: Vec<String>,
    pub failed_files: Vec<FailedDownload>,
    /// Tasks with no outcome because the run was cancelled
    pub not_run: usize,
    pub cancelled: bool,
}

impl RunResult {
    /// Tasks that reached an outcome
    pub fn completed(&self) -> usize {
        self.downloaded + self.existing + self.failed
    }
}
