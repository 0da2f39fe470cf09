//! Run configuration
//!
//! Defines the configuration structure for one download run.

use std::path::PathBuf;

use crate::catalog::{AssetType, CategoryFilter, HdriFormat, DEFAULT_API_URL};
use crate::download::DEFAULT_CONCURRENCY;
use crate::tasks::GenerateOptions;

/// Default number of concurrent `/files` requests
pub const DEFAULT_METADATA_CONCURRENCY: usize = 10;

/// Configuration for a download run
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Asset type as typed by the user; validated against `/types`
    pub asset_type: String,

    pub category: CategoryFilter,

    /// Download root (created if missing)
    pub output_dir: PathBuf,

    /// Size labels to download; empty means all
    pub sizes: Vec<String>,

    /// Cap on the number of assets (not files)
    pub max_assets: Option<usize>,

    /// HDRI format; ignored for other asset types
    pub format: Option<HdriFormat>,

    pub overwrite: bool,

    /// Also fetch the 8K tonemapped JPG (HDRIs only)
    pub tonemapped: bool,

    /// Fetch preview/render/thumbnail images
    pub include_images: bool,

    /// Concurrent file downloads
    pub concurrency: usize,

    /// Concurrent metadata requests
    pub metadata_concurrency: usize,

    /// Catalog API base URL
    pub api_url: String,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            asset_type: String::new(),
            category: CategoryFilter::Unset,
            output_dir: PathBuf::from("."),
            sizes: Vec::new(),
            max_assets: None,
            format: None,
            overwrite: false,
            tonemapped: false,
            include_images: true,
            concurrency: DEFAULT_CONCURRENCY,
            metadata_concurrency: DEFAULT_METADATA_CONCURRENCY,
            api_url: DEFAULT_API_URL.to_string(),
        }
    }
}

impl RunConfig {
    /// Validate the parts that do not need the catalog
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.asset_type.trim().is_empty() {
            return Err(ConfigError::MissingAssetType);
        }

        if self.concurrency == 0 {
            return Err(ConfigError::ZeroConcurrency("concurrent"));
        }

        if self.metadata_concurrency == 0 {
            return Err(ConfigError::ZeroConcurrency("metadata-concurrency"));
        }

        if !(self.api_url.starts_with("http://") || self.api_url.starts_with("https://")) {
            return Err(ConfigError::InvalidApiUrl(self.api_url.clone()));
        }

        Ok(())
    }

    /// Generator filters for a resolved asset type
    pub fn generate_options(&self, asset_type: AssetType) -> GenerateOptions {
        GenerateOptions {
            sizes: self.sizes.clone(),
            overwrite: self.overwrite,
            include_images: self.include_images,
            tonemapped: self.tonemapped,
            format: match asset_type {
                AssetType::Hdris => self.format,
                _ => None,
            },
        }
    }
}

/// Configuration errors, all detected before any download starts
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("<asset_type> is required")]
    MissingAssetType,

    #[error("'{given}' is not a valid asset type (available: {})", .available.join(", "))]
    InvalidAssetType { given: String, available: Vec<String> },

    #[error("'{0}' is listed by the catalog but has no download layout")]
    UnsupportedAssetType(String),

    #[error("'{category}' is not a valid category for {asset_type}. Pass an empty '-c' to list the categories")]
    InvalidCategory { category: String, asset_type: String },

    #[error("--{0} must be at least 1")]
    ZeroConcurrency(&'static str),

    #[error("Invalid API URL: {0}")]
    InvalidApiUrl(String),
}
