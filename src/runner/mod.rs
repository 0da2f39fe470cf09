//! Run orchestrator
//!
//! Coordinates the phases of a download run:
//! 1. Validate: asset type against `/types`, category against `/categories`
//! 2. List: asset ids for the type/category, capped by `max_assets`
//! 3. Metadata: `/files/{asset}` fan-out (own concurrency bound), task generation
//! 4. Download: worker pool over the flattened task list
//!
//! Only validation and an unreachable catalog abort the run. A single asset's
//! metadata failing, or a single file failing, is recorded and the run goes on.

pub mod config;

pub use config::{ConfigError, RunConfig, DEFAULT_METADATA_CONCURRENCY};

use anyhow::{anyhow, Context, Result};
use std::future::Future;
use std::path::PathBuf;
use std::time::Instant;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::catalog::{AssetType, CatalogClient, CategoryFilter};
use crate::download::{
    Cancellation, DownloadController, Executor, ProgressCallback, ProgressEvent, RunResult,
};
use crate::http::HttpClient;
use crate::paths;
use crate::tasks::{generate_tasks, DownloadTask};

/// An asset whose file metadata could not be fetched
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataFailure {
    pub asset_id: String,
    pub error: String,
}

/// Everything the final report needs
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub asset_type: AssetType,
    pub output_dir: PathBuf,
    /// Assets processed (after the cap)
    pub assets: usize,
    /// Download tasks generated
    pub tasks: usize,
    pub metadata_failures: Vec<MetadataFailure>,
    pub result: RunResult,
}

impl RunSummary {
    pub fn cancelled(&self) -> bool {
        self.result.cancelled
    }
}

/// What a run produced
#[derive(Debug, Clone)]
pub enum RunOutcome {
    /// `-c` without a value: the categories, nothing downloaded
    Categories {
        asset_type: String,
        categories: Vec<String>,
    },
    /// Interrupted before any asset was listed
    Cancelled,
    Finished(RunSummary),
}

impl RunOutcome {
    pub fn cancelled(&self) -> bool {
        match self {
            RunOutcome::Cancelled => true,
            RunOutcome::Finished(summary) => summary.cancelled(),
            RunOutcome::Categories { .. } => false,
        }
    }
}

/// Main run orchestrator
pub struct Runner {
    config: RunConfig,
    http: HttpClient,
    catalog: CatalogClient,
    events: Option<ProgressCallback>,
    cancel: Cancellation,
}

impl Runner {
    /// Create a runner with the given configuration
    pub fn new(config: RunConfig) -> Result<Self> {
        config.validate()?;

        let http = HttpClient::new()?;
        let catalog = CatalogClient::new(http.clone(), &config.api_url)?;

        Ok(Self {
            config,
            http,
            catalog,
            events: None,
            cancel: Cancellation::never(),
        })
    }

    pub fn with_events(mut self, events: ProgressCallback) -> Self {
        self.events = Some(events);
        self
    }

    pub fn with_cancellation(mut self, cancel: Cancellation) -> Self {
        self.cancel = cancel;
        self
    }

    fn emit(&self, event: ProgressEvent) {
        if let Some(events) = &self.events {
            events(event);
        }
    }

    /// Run all phases
    pub async fn run(&self) -> Result<RunOutcome> {
        let started = Instant::now();

        // Phase 1: validate against the catalog
        let Some(asset_type) = self.unless_cancelled(self.check_asset_type()).await? else {
            return Ok(RunOutcome::Cancelled);
        };

        match &self.config.category {
            CategoryFilter::ListRequested => {
                let categories = self.catalog.categories(asset_type.as_str());
                let Some(categories) = self
                    .unless_cancelled(async { categories.await.context("Error fetching categories") })
                    .await?
                else {
                    return Ok(RunOutcome::Cancelled);
                };
                return Ok(RunOutcome::Categories {
                    asset_type: asset_type.to_string(),
                    categories,
                });
            }
            CategoryFilter::Named(category) => {
                if self
                    .unless_cancelled(self.check_category(asset_type, category))
                    .await?
                    .is_none()
                {
                    return Ok(RunOutcome::Cancelled);
                }
            }
            CategoryFilter::Unset => {}
        }

        if self.config.format.is_some() && asset_type != AssetType::Hdris {
            warn!("--format only applies to hdris, ignoring it for {}", asset_type);
        }

        if self.cancel.is_cancelled() {
            return Ok(RunOutcome::Cancelled);
        }

        let output_dir = &self.config.output_dir;
        if !output_dir.exists() {
            info!("Creating download folder {}", output_dir.display());
        }
        tokio::fs::create_dir_all(output_dir)
            .await
            .with_context(|| format!("Failed to create download folder {}", output_dir.display()))?;

        // Phase 2: list assets
        let listing = self.catalog.assets(asset_type.as_str(), self.config.category.name());
        let Some(mut assets) = self
            .unless_cancelled(async { listing.await.context("Error fetching asset list") })
            .await?
        else {
            return Ok(RunOutcome::Cancelled);
        };
        if let Some(cap) = self.config.max_assets {
            assets.truncate(cap);
        }
        info!("Found {} assets", assets.len());
        self.emit(ProgressEvent::AssetsFound { count: assets.len() });

        // Phase 3: metadata and task generation
        let (tasks, metadata_failures) = self.collect_tasks(asset_type, &assets).await;
        info!(
            "Generated {} download tasks ({} metadata failures) in {:?}",
            tasks.len(),
            metadata_failures.len(),
            started.elapsed()
        );

        let mut summary = RunSummary {
            asset_type,
            output_dir: output_dir.clone(),
            assets: assets.len(),
            tasks: tasks.len(),
            metadata_failures,
            result: RunResult::default(),
        };

        if self.cancel.is_cancelled() {
            summary.result.cancelled = true;
            summary.result.not_run = tasks.len();
            return Ok(RunOutcome::Finished(summary));
        }

        // Phase 4: download
        let mut controller = DownloadController::new(Executor::new(self.http.clone()), self.config.concurrency)
            .with_cancellation(self.cancel.clone());
        if let Some(events) = &self.events {
            controller = controller.with_events(events.clone());
        }
        summary.result = controller.run(tasks).await;

        info!("Run finished in {:?}", started.elapsed());
        Ok(RunOutcome::Finished(summary))
    }

    /// Race a catalog call against cancellation; `Ok(None)` when cancelled first
    async fn unless_cancelled<T>(&self, call: impl Future<Output = Result<T>>) -> Result<Option<T>> {
        let mut cancel = self.cancel.clone();
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("Cancelled before the catalog answered");
                Ok(None)
            }
            result = call => result.map(Some),
        }
    }

    async fn check_asset_type(&self) -> Result<AssetType> {
        let available = self
            .catalog
            .asset_types()
            .await
            .context("Error connecting to the catalog API")?;

        let given = self.config.asset_type.trim();
        if !available.iter().any(|t| t == given) {
            return Err(ConfigError::InvalidAssetType {
                given: given.to_string(),
                available,
            }
            .into());
        }

        given
            .parse::<AssetType>()
            .map_err(|_| ConfigError::UnsupportedAssetType(given.to_string()).into())
    }

    async fn check_category(&self, asset_type: AssetType, category: &str) -> Result<()> {
        let categories = self
            .catalog
            .categories(asset_type.as_str())
            .await
            .context("Error validating category")?;

        if categories.iter().any(|c| c == category) {
            Ok(())
        } else {
            Err(ConfigError::InvalidCategory {
                category: category.to_string(),
                asset_type: asset_type.to_string(),
            }
            .into())
        }
    }

    /// Fetch every asset's metadata (bounded) and generate tasks in asset order
    async fn collect_tasks(
        &self,
        asset_type: AssetType,
        assets: &[String],
    ) -> (Vec<DownloadTask>, Vec<MetadataFailure>) {
        let semaphore = Semaphore::new(self.config.metadata_concurrency);

        let fetches = assets.iter().map(|asset_id| {
            let semaphore = &semaphore;
            let mut cancel = self.cancel.clone();
            async move {
                if !paths::is_safe_component(asset_id) {
                    return Some(Err(anyhow!("Invalid asset id: {:?}", asset_id)));
                }
                let _permit = semaphore.acquire().await.ok()?;
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => None,
                    files = self.catalog.files(asset_id) => Some(files),
                }
            }
        });
        let results = futures::future::join_all(fetches).await;

        let options = self.config.generate_options(asset_type);
        let mut tasks = Vec::new();
        let mut failures = Vec::new();

        for (asset_id, result) in assets.iter().zip(results) {
            match result {
                Some(Ok(files)) => {
                    let generated = generate_tasks(asset_type, asset_id, &files, &self.config.output_dir, &options);
                    debug!("{}: {} tasks", asset_id, generated.len());
                    tasks.extend(generated);
                }
                Some(Err(e)) => {
                    warn!("Error fetching metadata for {}: {:#}", asset_id, e);
                    let error = format!("{:#}", e);
                    self.emit(ProgressEvent::MetadataFailed {
                        asset_id: asset_id.clone(),
                        error: error.clone(),
                    });
                    failures.push(MetadataFailure {
                        asset_id: asset_id.clone(),
                        error,
                    });
                }
                None => {}
            }
        }

        (tasks, failures)
    }
}
