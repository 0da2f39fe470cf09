//! Poly Haven catalog API.
//!
//! The catalog is the source of truth for which asset types and categories
//! exist, which assets belong to them, and which files each asset offers.

mod client;
mod types;

pub use client::{CatalogClient, DEFAULT_API_URL};
pub use types::{sorted_by_resolution, AssetFiles, BlendFile, BlendSize, FileInfo};

use std::fmt;
use std::str::FromStr;

/// Asset types the task generator knows how to lay out on disk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssetType {
    Hdris,
    Textures,
    Models,
}

impl AssetType {
    pub const ALL: [AssetType; 3] = [AssetType::Hdris, AssetType::Textures, AssetType::Models];

    /// Name used by the catalog API (`/types`, `?t=`)
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetType::Hdris => "hdris",
            AssetType::Textures => "textures",
            AssetType::Models => "models",
        }
    }
}

impl fmt::Display for AssetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Unknown asset type: {0}")]
pub struct UnknownAssetType(pub String);

impl FromStr for AssetType {
    type Err = UnknownAssetType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AssetType::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownAssetType(s.to_string()))
    }
}

/// HDRI file formats offered by the catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, clap::ValueEnum)]
pub enum HdriFormat {
    Hdr,
    Exr,
}

impl HdriFormat {
    /// Formats tried when no format is requested, in emission order
    pub const DEFAULT_ORDER: [HdriFormat; 2] = [HdriFormat::Exr, HdriFormat::Hdr];

    /// Key used in the `hdri` file metadata
    pub fn key(&self) -> &'static str {
        match self {
            HdriFormat::Hdr => "hdr",
            HdriFormat::Exr => "exr",
        }
    }
}

impl fmt::Display for HdriFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// What the user asked for with `-c/--category`
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CategoryFilter {
    /// Flag omitted: no category filter
    #[default]
    Unset,
    /// Flag given without a value: list categories and stop
    ListRequested,
    /// Flag given with a value: filter by this category
    Named(String),
}

impl CategoryFilter {
    /// `None` -> Unset, `Some("")` -> ListRequested, `Some(name)` -> Named
    pub fn from_arg(arg: Option<String>) -> Self {
        match arg {
            None => CategoryFilter::Unset,
            Some(name) if name.trim().is_empty() => CategoryFilter::ListRequested,
            Some(name) => CategoryFilter::Named(name.trim().to_string()),
        }
    }

    /// Category to pass to the asset listing, if any
    pub fn name(&self) -> Option<&str> {
        match self {
            CategoryFilter::Named(name) => Some(name),
            _ => None,
        }
    }
}
