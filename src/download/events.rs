//! Progress events emitted by the runner and the download workers.
//!
//! The core only produces data; formatting is left to whoever subscribes.

use std::sync::Arc;

use super::executor::TaskReport;

#[derive(Debug, Clone)]
pub enum ProgressEvent {
    /// Asset listing resolved (after the iteration cap)
    AssetsFound { count: usize },
    /// File metadata for one asset could not be fetched
    MetadataFailed { asset_id: String, error: String },
    /// All metadata fetched, downloads about to start
    TasksQueued { total: usize, workers: usize },
    /// A worker picked up a task
    TaskStarted { worker: usize, filename: String },
    /// Bytes received for a worker's current task
    TaskProgress {
        worker: usize,
        downloaded: u64,
        total: Option<u64>,
    },
    /// A worker finished a task; `completed` only ever increases
    TaskFinished {
        worker: usize,
        report: TaskReport,
        completed: usize,
        total: usize,
    },
}

/// Subscriber for progress events
pub type ProgressCallback = Arc<dyn Fn(ProgressEvent) + Send + Sync>;
