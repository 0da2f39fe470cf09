//! HTTP client and streaming file fetch with progress tracking

use anyhow::{bail, Context, Result};
use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// Connection timeout: time to establish TCP connection
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Read timeout: maximum time to wait for data between chunks
const READ_TIMEOUT: Duration = Duration::from_secs(60);

/// How often to invoke the progress callback (in milliseconds)
const CALLBACK_INTERVAL_MS: u128 = 250;

/// Shared HTTP client for catalog requests and file downloads
#[derive(Clone)]
pub struct HttpClient {
    client: reqwest::Client,
}

impl HttpClient {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("polydown/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(CONNECT_TIMEOUT)
            .read_timeout(READ_TIMEOUT)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client })
    }

    /// Get the underlying reqwest client
    pub fn inner(&self) -> &reqwest::Client {
        &self.client
    }
}

/// Progress callback: (downloaded_bytes, total_bytes if known)
pub type ByteProgress<'a> = &'a (dyn Fn(u64, Option<u64>) + Send + Sync);

/// A `.part` file that is removed unless the download is committed.
///
/// Dropping the guard (error, cancellation, panic) deletes the partial file,
/// so an interrupted fetch never leaves a truncated file under the final name.
struct PartialFile {
    path: PathBuf,
    committed: bool,
}

impl PartialFile {
    fn for_target(target: &Path) -> Self {
        let mut name = target.file_name().unwrap_or_default().to_os_string();
        name.push(".part");
        Self {
            path: target.with_file_name(name),
            committed: false,
        }
    }

    /// Move the partial file over the target
    async fn commit(mut self, target: &Path) -> Result<()> {
        tokio::fs::rename(&self.path, target)
            .await
            .with_context(|| format!("Failed to move download into place: {}", target.display()))?;
        self.committed = true;
        Ok(())
    }
}

impl Drop for PartialFile {
    fn drop(&mut self) {
        if !self.committed {
            let _ = std::fs::remove_file(&self.path);
        }
    }
}

/// Fetch `url` into `output_path`, replacing any existing file.
///
/// The parent directory must exist. Any non-2xx status is an error.
/// `expected_size` is used as the progress total when the server does not
/// report a content length. Returns the number of bytes written.
pub async fn download_to_file(
    client: &HttpClient,
    url: &str,
    output_path: &Path,
    expected_size: Option<u64>,
    progress: Option<ByteProgress<'_>>,
) -> Result<u64> {
    let response = client
        .inner()
        .get(url)
        .send()
        .await
        .with_context(|| format!("Connection failed: {}", truncate_url(url)))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        bail!("HTTP {} - {}", status.as_u16(), truncate_error(&body));
    }

    let total_size = response.content_length().or(expected_size);

    let partial = PartialFile::for_target(output_path);
    let mut file = File::create(&partial.path)
        .await
        .with_context(|| format!("Failed to create {}", partial.path.display()))?;

    let mut downloaded = 0u64;
    let mut last_callback_time = Instant::now();
    let mut stream = response.bytes_stream();

    while let Some(chunk_result) = stream.next().await {
        let chunk = chunk_result.context("Failed to read chunk")?;
        file.write_all(&chunk)
            .await
            .context("Failed to write chunk")?;
        downloaded += chunk.len() as u64;

        if let Some(callback) = progress {
            let now = Instant::now();
            if now.duration_since(last_callback_time).as_millis() >= CALLBACK_INTERVAL_MS {
                callback(downloaded, total_size);
                last_callback_time = now;
            }
        }
    }

    file.flush().await.context("Failed to flush file")?;
    drop(file);

    if let Some(callback) = progress {
        callback(downloaded, total_size);
    }

    partial.commit(output_path).await?;
    debug!("Fetched {} bytes -> {}", downloaded, output_path.display());
    Ok(downloaded)
}

/// Truncate URL for error messages
pub fn truncate_url(url: &str) -> String {
    if url.chars().count() > 80 {
        format!("{}...", url.chars().take(77).collect::<String>())
    } else {
        url.to_string()
    }
}

/// Truncate error body for display
fn truncate_error(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.chars().count() > 100 {
        format!("{}...", trimmed.chars().take(97).collect::<String>())
    } else if trimmed.is_empty() {
        "No details".to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_http_client_creation() {
        let client = HttpClient::new();
        assert!(client.is_ok());
    }

    #[test]
    fn test_truncate_url() {
        let long = format!("https://example.com/{}", "a".repeat(100));
        let short = truncate_url(&long);
        assert_eq!(short.chars().count(), 80);
        assert!(short.ends_with("..."));
        assert_eq!(truncate_url("https://example.com/x"), "https://example.com/x");
    }

    #[tokio::test]
    async fn test_download_writes_body_and_reports_progress() -> Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/file.bin"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"0123456789".to_vec()))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir()?;
        let target = dir.path().join("file.bin");
        let last = AtomicU64::new(0);
        let callback = |done: u64, _total: Option<u64>| last.store(done, Ordering::Relaxed);
        let progress: ByteProgress<'_> = &callback;

        let client = HttpClient::new()?;
        let url = format!("{}/file.bin", server.uri());
        let written = download_to_file(&client, &url, &target, None, Some(progress)).await?;

        assert_eq!(written, 10);
        assert_eq!(std::fs::read(&target)?, b"0123456789");
        assert_eq!(last.load(Ordering::Relaxed), 10);
        assert!(!dir.path().join("file.bin.part").exists());
        Ok(())
    }

    #[tokio::test]
    async fn test_error_status_leaves_no_files() -> Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing.bin"))
            .respond_with(ResponseTemplate::new(404).set_body_string("not found"))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir()?;
        let target = dir.path().join("missing.bin");
        let client = HttpClient::new()?;
        let url = format!("{}/missing.bin", server.uri());

        let err = download_to_file(&client, &url, &target, None, None)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("HTTP 404"));
        assert!(!target.exists());
        assert!(!dir.path().join("missing.bin.part").exists());
        Ok(())
    }
}
