//! Typed view of `/files/{asset}` responses.
//!
//! HDRI:
//! ```text
//! { "hdri": { "1k": { "hdr": {url, md5, size}, "exr": {...} }, ... }, ... }
//! ```
//! Models and textures:
//! ```text
//! { "blend": { "1k": { "blend": {url, md5, size, include: { "textures/x.jpg": {url, md5, size} }} }, ... }, ... }
//! ```
//! Other top-level keys (gltf, fbx, tonemapped, ...) are ignored.

use serde::Deserialize;
use std::collections::BTreeMap;

/// A single downloadable file
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FileInfo {
    pub url: String,
    #[serde(default)]
    pub md5: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
}

/// The .blend archive for one resolution, with the texture maps it references
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BlendFile {
    pub url: String,
    #[serde(default)]
    pub md5: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub include: BTreeMap<String, FileInfo>,
}

/// Entry under `blend.<size>`
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct BlendSize {
    #[serde(default)]
    pub blend: Option<BlendFile>,
}

/// File metadata for one asset
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct AssetFiles {
    /// size -> format -> file
    #[serde(default)]
    pub hdri: BTreeMap<String, BTreeMap<String, FileInfo>>,

    /// size -> blend archive
    #[serde(default)]
    pub blend: BTreeMap<String, BlendSize>,
}

impl AssetFiles {
    pub fn from_json(json: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(json)
    }
}

/// Numeric part of a size label: "1k" -> 1, "16k" -> 16
fn resolution(label: &str) -> Option<u32> {
    let digits: String = label.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}

/// Entries of a size-keyed map ordered by resolution ascending.
///
/// Labels without a numeric prefix sort after all numeric ones, by name.
pub fn sorted_by_resolution<V>(map: &BTreeMap<String, V>) -> Vec<(&str, &V)> {
    let mut entries: Vec<(&str, &V)> = map.iter().map(|(k, v)| (k.as_str(), v)).collect();
    entries.sort_by(|(a, _), (b, _)| {
        let ka = resolution(a).unwrap_or(u32::MAX);
        let kb = resolution(b).unwrap_or(u32::MAX);
        ka.cmp(&kb).then_with(|| a.cmp(b))
    });
    entries
}
