//! Single-task download: skip, fetch, or overwrite, then verify

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::hash;
use crate::http::{download_to_file, ByteProgress, HttpClient};
use crate::tasks::DownloadTask;

/// How a task ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Fetched, nothing was there before
    Downloaded,
    /// Fetched over an existing file
    DownloadedOverwrite,
    /// Already present, not fetched
    Exists,
    Failed,
}

/// Result of executing one task
#[derive(Debug, Clone)]
pub struct TaskReport {
    pub filename: String,
    pub path: PathBuf,
    pub outcome: Outcome,
    /// Digest matched (always true without a digest, always false on failure)
    pub verified: bool,
    /// Root cause for failed tasks
    pub error: Option<String>,
}

/// Runs [`DownloadTask`]s against the network and local disk
#[derive(Clone)]
pub struct Executor {
    http: HttpClient,
}

impl Executor {
    pub fn new(http: HttpClient) -> Self {
        Self { http }
    }

    /// Execute a task. Never fails: transport and filesystem errors become
    /// [`Outcome::Failed`] so one bad file cannot abort the batch.
    ///
    /// The skip path (present and no overwrite) makes no network request.
    pub async fn execute(&self, task: &DownloadTask, progress: Option<ByteProgress<'_>>) -> TaskReport {
        let path = task.target_path();
        let pre_existing = is_file(&path).await;

        if pre_existing && !task.overwrite {
            let verified = verify(&path, task.expected_md5.as_deref()).await;
            debug!("Exists: {} (verified: {})", task.filename, verified);
            return TaskReport {
                filename: task.filename.clone(),
                path,
                outcome: Outcome::Exists,
                verified,
                error: None,
            };
        }

        match self.fetch(task, &path, progress).await {
            Ok(bytes) => {
                let verified = verify(&path, task.expected_md5.as_deref()).await;
                if !verified {
                    warn!("MD5 mismatch: {}", path.display());
                }
                debug!("Downloaded: {} ({} bytes, verified: {})", task.filename, bytes, verified);
                TaskReport {
                    filename: task.filename.clone(),
                    path,
                    outcome: if pre_existing {
                        Outcome::DownloadedOverwrite
                    } else {
                        Outcome::Downloaded
                    },
                    verified,
                    error: None,
                }
            }
            Err(e) => {
                warn!("Failed: {} - {:#}", task.filename, e);
                TaskReport {
                    filename: task.filename.clone(),
                    path,
                    outcome: Outcome::Failed,
                    verified: false,
                    error: Some(root_cause(&e)),
                }
            }
        }
    }

    async fn fetch(&self, task: &DownloadTask, path: &Path, progress: Option<ByteProgress<'_>>) -> Result<u64> {
        tokio::fs::create_dir_all(&task.destination_folder)
            .await
            .with_context(|| format!("Failed to create {}", task.destination_folder.display()))?;

        download_to_file(&self.http, &task.url, path, task.expected_size, progress).await
    }
}

async fn is_file(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|meta| meta.is_file())
        .unwrap_or(false)
}

/// Hash off the async runtime
async fn verify(path: &Path, expected: Option<&str>) -> bool {
    let Some(expected) = expected.filter(|e| !e.trim().is_empty()) else {
        return true;
    };

    let path = path.to_path_buf();
    let expected = expected.to_string();
    tokio::task::spawn_blocking(move || hash::verify_md5(&path, Some(&expected)))
        .await
        .unwrap_or(false)
}

/// Extract the root cause error message (skip context chain)
fn root_cause(e: &anyhow::Error) -> String {
    let msg = e.root_cause().to_string();
    if msg.chars().count() > 80 {
        format!("{}...", msg.chars().take(77).collect::<String>())
    } else {
        msg
    }
}
