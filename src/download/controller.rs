//! Bounded worker pool over a shared task queue.
//!
//! A fixed number of workers pull from one queue until it is empty, so a
//! worker stuck on a large archive does not hold back the small textures
//! queued behind it. Every task that is pulled produces exactly one
//! recorded outcome unless the run is cancelled while it is in flight.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::cancel::Cancellation;
use super::events::{ProgressCallback, ProgressEvent};
use super::executor::{Executor, Outcome, TaskReport};
use super::{FailedDownload, RunResult};
use crate::http::ByteProgress;
use crate::tasks::DownloadTask;

/// Default number of concurrent downloads
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Runs a task list through a pool of download workers
pub struct DownloadController {
    executor: Executor,
    concurrency: usize,
    events: Option<ProgressCallback>,
    cancel: Cancellation,
}

/// Shared state for one run
struct RunContext {
    executor: Executor,
    queue: Mutex<VecDeque<DownloadTask>>,
    total: usize,
    events: Option<ProgressCallback>,
    // Counters
    downloaded: AtomicUsize,
    existing: AtomicUsize,
    failed: AtomicUsize,
    corrupted: AtomicUsize,
    /// Completion counter; held while emitting so reported counts never go backwards
    completed: std::sync::Mutex<usize>,
    corrupted_files: std::sync::Mutex<Vec<String>>,
    failed_files: std::sync::Mutex<Vec<FailedDownload>>,
}

impl DownloadController {
    pub fn new(executor: Executor, concurrency: usize) -> Self {
        Self {
            executor,
            concurrency: concurrency.max(1),
            events: None,
            cancel: Cancellation::never(),
        }
    }

    pub fn with_events(mut self, events: ProgressCallback) -> Self {
        self.events = Some(events);
        self
    }

    pub fn with_cancellation(mut self, cancel: Cancellation) -> Self {
        self.cancel = cancel;
        self
    }

    /// Execute every task and tally the outcomes
    pub async fn run(&self, tasks: Vec<DownloadTask>) -> RunResult {
        let total = tasks.len();
        if total == 0 {
            return RunResult::default();
        }

        let workers = self.concurrency.min(total);
        info!("Downloading {} files with {} workers", total, workers);

        let ctx = Arc::new(RunContext {
            executor: self.executor.clone(),
            queue: Mutex::new(tasks.into_iter().collect()),
            total,
            events: self.events.clone(),
            downloaded: AtomicUsize::new(0),
            existing: AtomicUsize::new(0),
            failed: AtomicUsize::new(0),
            corrupted: AtomicUsize::new(0),
            completed: std::sync::Mutex::new(0),
            corrupted_files: std::sync::Mutex::new(Vec::new()),
            failed_files: std::sync::Mutex::new(Vec::new()),
        });

        ctx.emit(ProgressEvent::TasksQueued { total, workers });

        let handles: Vec<_> = (0..workers)
            .map(|id| tokio::spawn(worker(id, Arc::clone(&ctx), self.cancel.clone())))
            .collect();

        for handle in handles {
            if let Err(e) = handle.await {
                warn!("Download worker crashed: {}", e);
            }
        }

        let mut result = RunResult {
            downloaded: ctx.downloaded.load(Ordering::Relaxed),
            existing: ctx.existing.load(Ordering::Relaxed),
            failed: ctx.failed.load(Ordering::Relaxed),
            corrupted: ctx.corrupted.load(Ordering::Relaxed),
            corrupted_files: take(&ctx.corrupted_files),
            failed_files: take(&ctx.failed_files),
            not_run: 0,
            cancelled: self.cancel.is_cancelled(),
        };
        result.not_run = total.saturating_sub(result.completed());
        result
    }
}

async fn worker(id: usize, ctx: Arc<RunContext>, mut cancel: Cancellation) {
    loop {
        if cancel.is_cancelled() {
            break;
        }

        let next = ctx.queue.lock().await.pop_front();
        let Some(task) = next else {
            break;
        };

        ctx.emit(ProgressEvent::TaskStarted {
            worker: id,
            filename: task.filename.clone(),
        });

        let on_bytes = |downloaded: u64, total: Option<u64>| {
            ctx.emit(ProgressEvent::TaskProgress {
                worker: id,
                downloaded,
                total,
            })
        };
        let progress: ByteProgress<'_> = &on_bytes;

        let report = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("Worker {} abandoned {} on cancel", id, task.filename);
                break;
            }
            report = ctx.executor.execute(&task, Some(progress)) => report,
        };

        ctx.record(id, &task, report);
    }
}

impl RunContext {
    fn emit(&self, event: ProgressEvent) {
        if let Some(events) = &self.events {
            events(event);
        }
    }

    fn record(&self, worker: usize, task: &DownloadTask, report: TaskReport) {
        match report.outcome {
            Outcome::Failed => {
                self.failed.fetch_add(1, Ordering::Relaxed);
                lock(&self.failed_files).push(FailedDownload {
                    filename: report.filename.clone(),
                    url: task.url.clone(),
                    error: report.error.clone().unwrap_or_default(),
                });
            }
            Outcome::Exists => {
                self.existing.fetch_add(1, Ordering::Relaxed);
            }
            Outcome::Downloaded | Outcome::DownloadedOverwrite => {
                self.downloaded.fetch_add(1, Ordering::Relaxed);
            }
        }

        // Failed tasks are unverified too and count here; only files left on
        // disk go in the corrupted list.
        if !report.verified {
            self.corrupted.fetch_add(1, Ordering::Relaxed);
            if report.outcome != Outcome::Failed {
                lock(&self.corrupted_files).push(report.filename.clone());
            }
        }

        let mut completed = lock(&self.completed);
        *completed += 1;
        self.emit(ProgressEvent::TaskFinished {
            worker,
            report,
            completed: *completed,
            total: self.total,
        });
    }
}

/// Poisoning only happens if a subscriber panicked; the data is still usable
fn lock<T>(mutex: &std::sync::Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn take<T>(mutex: &std::sync::Mutex<Vec<T>>) -> Vec<T> {
    std::mem::take(&mut *lock(mutex))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::HttpClient;
    use std::path::Path;
    use std::time::{Duration, Instant};
    use wiremock::matchers::{method, path, path_regex};
    use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

    /// Records when each request arrives, then answers after `hold`
    struct Recorder {
        arrivals: Arc<std::sync::Mutex<Vec<Instant>>>,
        hold: Duration,
    }

    impl Respond for Recorder {
        fn respond(&self, _request: &Request) -> ResponseTemplate {
            self.arrivals.lock().unwrap().push(Instant::now());
            ResponseTemplate::new(200)
                .set_body_bytes(b"payload".to_vec())
                .set_delay(self.hold)
        }
    }

    /// Most requests that were being held at the same moment
    fn peak_overlap(arrivals: &[Instant], hold: Duration) -> usize {
        arrivals
            .iter()
            .map(|&t| arrivals.iter().filter(|&&s| s <= t && t < s + hold).count())
            .max()
            .unwrap_or(0)
    }

    fn controller(concurrency: usize) -> DownloadController {
        DownloadController::new(Executor::new(HttpClient::new().unwrap()), concurrency)
    }

    fn task(server: &MockServer, folder: &Path, name: &str, md5: Option<&str>) -> DownloadTask {
        DownloadTask {
            url: format!("{}/{}", server.uri(), name),
            destination_folder: folder.to_path_buf(),
            filename: name.to_string(),
            expected_md5: md5.map(str::to_string),
            expected_size: None,
            overwrite: false,
        }
    }

    async fn serve(server: &MockServer, name: &str, status: u16, calls: u64) {
        Mock::given(method("GET"))
            .and(path(format!("/{}", name)))
            .respond_with(ResponseTemplate::new(status).set_body_bytes(format!("body of {}", name).into_bytes()))
            .expect(calls)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_every_task_runs_exactly_once() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();
        let mut tasks = Vec::new();
        for i in 0..12 {
            let name = format!("file_{:02}.bin", i);
            serve(&server, &name, 200, 1).await;
            tasks.push(task(&server, dir.path(), &name, None));
        }

        let result = controller(3).run(tasks).await;

        assert_eq!(result.downloaded, 12);
        assert_eq!(result.existing + result.failed + result.corrupted, 0);
        assert_eq!(result.completed(), 12);
        assert_eq!(result.not_run, 0);
        assert!(!result.cancelled);
        for i in 0..12 {
            let name = format!("file_{:02}.bin", i);
            assert_eq!(
                std::fs::read_to_string(dir.path().join(&name)).unwrap(),
                format!("body of {}", name)
            );
        }
    }

    #[tokio::test]
    async fn test_mixed_outcomes_are_tallied() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();

        serve(&server, "new.bin", 200, 1).await;
        serve(&server, "present.bin", 200, 0).await;
        serve(&server, "broken.bin", 503, 1).await;
        serve(&server, "bad_md5.bin", 200, 1).await;
        std::fs::write(dir.path().join("present.bin"), b"already here").unwrap();

        let tasks = vec![
            task(&server, dir.path(), "new.bin", None),
            task(&server, dir.path(), "present.bin", None),
            task(&server, dir.path(), "broken.bin", Some("00000000000000000000000000000000")),
            task(&server, dir.path(), "bad_md5.bin", Some("00000000000000000000000000000000")),
        ];

        let result = controller(2).run(tasks).await;

        assert_eq!(result.downloaded, 2);
        assert_eq!(result.existing, 1);
        assert_eq!(result.failed, 1);
        // The failed task is unverified as well
        assert_eq!(result.corrupted, 2);
        assert_eq!(result.corrupted_files, vec!["bad_md5.bin".to_string()]);
        assert_eq!(result.failed_files.len(), 1);
        assert_eq!(result.failed_files[0].filename, "broken.bin");
        assert!(result.failed_files[0].error.contains("HTTP 503"));
        assert_eq!(result.completed(), 4);
    }

    #[tokio::test]
    async fn test_progress_events_are_monotonic() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();
        let mut tasks = Vec::new();
        for i in 0..8 {
            let name = format!("f{}.bin", i);
            serve(&server, &name, 200, 1).await;
            tasks.push(task(&server, dir.path(), &name, None));
        }

        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let queued = Arc::new(AtomicUsize::new(0));
        let events: ProgressCallback = {
            let seen = Arc::clone(&seen);
            let queued = Arc::clone(&queued);
            Arc::new(move |event: ProgressEvent| match event {
                ProgressEvent::TaskFinished { completed, total, .. } => {
                    assert_eq!(total, 8);
                    seen.lock().unwrap().push(completed);
                }
                ProgressEvent::TasksQueued { workers, .. } => {
                    queued.store(workers, Ordering::Relaxed);
                }
                _ => {}
            })
        };

        controller(4).with_events(events).run(tasks).await;

        assert_eq!(queued.load(Ordering::Relaxed), 4);
        assert_eq!(*seen.lock().unwrap(), (1..=8).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_in_flight_downloads_bounded_by_pool_size() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();
        let arrivals = Arc::new(std::sync::Mutex::new(Vec::new()));
        let hold = Duration::from_millis(200);
        Mock::given(method("GET"))
            .and(path_regex(r"^/f\d+\.bin$"))
            .respond_with(Recorder {
                arrivals: Arc::clone(&arrivals),
                hold,
            })
            .expect(6)
            .mount(&server)
            .await;

        let tasks = (0..6)
            .map(|i| task(&server, dir.path(), &format!("f{}.bin", i), None))
            .collect();
        let result = controller(2).run(tasks).await;

        assert_eq!(result.downloaded, 6);
        let arrivals = arrivals.lock().unwrap();
        assert_eq!(arrivals.len(), 6);
        assert_eq!(peak_overlap(&arrivals, hold), 2);
    }

    #[tokio::test]
    async fn test_pool_larger_than_queue() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();
        serve(&server, "only.bin", 200, 1).await;

        let result = controller(16)
            .run(vec![task(&server, dir.path(), "only.bin", None)])
            .await;
        assert_eq!(result.downloaded, 1);
    }

    #[tokio::test]
    async fn test_empty_run() {
        let result = controller(4).run(Vec::new()).await;
        assert_eq!(result.completed(), 0);
        assert_eq!(result.not_run, 0);
    }

    #[tokio::test]
    async fn test_cancel_before_start_issues_no_requests() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();
        serve(&server, "a.bin", 200, 0).await;
        serve(&server, "b.bin", 200, 0).await;

        let (handle, cancel) = Cancellation::pair();
        handle.cancel();

        let result = controller(2)
            .with_cancellation(cancel)
            .run(vec![
                task(&server, dir.path(), "a.bin", None),
                task(&server, dir.path(), "b.bin", None),
            ])
            .await;

        assert!(result.cancelled);
        assert_eq!(result.completed(), 0);
        assert_eq!(result.not_run, 2);
    }

    #[tokio::test]
    async fn test_cancel_abandons_in_flight_download() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();
        Mock::given(method("GET"))
            .and(path("/slow.bin"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_bytes(b"slow".to_vec())
                    .set_delay(Duration::from_secs(30)),
            )
            .mount(&server)
            .await;

        let (handle, cancel) = Cancellation::pair();
        let tasks = vec![task(&server, dir.path(), "slow.bin", None)];
        let run = tokio::spawn(async move { controller(1).with_cancellation(cancel).run(tasks).await });

        tokio::time::sleep(Duration::from_millis(200)).await;
        handle.cancel();

        let result = tokio::time::timeout(Duration::from_secs(10), run)
            .await
            .expect("run should stop promptly")
            .unwrap();

        assert!(result.cancelled);
        assert_eq!(result.completed(), 0);
        assert_eq!(result.not_run, 1);
        assert!(!dir.path().join("slow.bin").exists());
        assert!(!dir.path().join("slow.bin.part").exists());
    }
}
