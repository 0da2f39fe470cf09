//! Download task generation.
//!
//! Turns the per-asset file metadata into a flat, ordered list of
//! [`DownloadTask`]s. The output depends only on the inputs: sizes are
//! visited by resolution, formats in a fixed order, texture includes by key,
//! and preview images in table order.

mod images;

pub use images::{image_roles, ImageRole};

use std::path::{Path, PathBuf};
use tracing::warn;

use crate::catalog::{sorted_by_resolution, AssetFiles, AssetType, HdriFormat};
use crate::paths;

/// A single file to fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadTask {
    pub url: String,
    /// Created on demand before the fetch
    pub destination_folder: PathBuf,
    pub filename: String,
    /// MD5 hex digest; `None` means existence alone decides skips
    pub expected_md5: Option<String>,
    /// Size advertised by the catalog, used for progress only
    pub expected_size: Option<u64>,
    pub overwrite: bool,
}

impl DownloadTask {
    /// Task whose filename is the last segment of its URL
    pub fn from_url(
        url: impl Into<String>,
        destination_folder: impl Into<PathBuf>,
        expected_md5: Option<String>,
        expected_size: Option<u64>,
        overwrite: bool,
    ) -> Self {
        let url = url.into();
        let filename = paths::filename_from_url(&url);
        Self {
            url,
            destination_folder: destination_folder.into(),
            filename,
            expected_md5,
            expected_size,
            overwrite,
        }
    }

    pub fn target_path(&self) -> PathBuf {
        self.destination_folder.join(&self.filename)
    }
}

/// User filters applied while generating tasks
#[derive(Debug, Clone, Default)]
pub struct GenerateOptions {
    /// Size labels to keep ("1k", "2k", ...). Empty keeps every size.
    pub sizes: Vec<String>,
    pub overwrite: bool,
    pub include_images: bool,
    /// Also fetch the 8K tonemapped JPG (HDRIs only)
    pub tonemapped: bool,
    /// HDRI format; `None` tries exr then hdr
    pub format: Option<HdriFormat>,
}

impl GenerateOptions {
    fn accepts_size(&self, size: &str) -> bool {
        self.sizes.is_empty() || self.sizes.iter().any(|s| s == size)
    }

    fn formats(&self) -> Vec<HdriFormat> {
        match self.format {
            Some(format) => vec![format],
            None => HdriFormat::DEFAULT_ORDER.to_vec(),
        }
    }
}

/// Build every download task for one asset
pub fn generate_tasks(
    asset_type: AssetType,
    asset_id: &str,
    files: &AssetFiles,
    root: &Path,
    options: &GenerateOptions,
) -> Vec<DownloadTask> {
    if !paths::is_safe_component(asset_id) {
        warn!("Skipping asset with unusable id {:?}", asset_id);
        return Vec::new();
    }

    let mut tasks = match asset_type {
        AssetType::Hdris => hdri_tasks(files, root, options),
        AssetType::Textures | AssetType::Models => blend_tasks(asset_id, files, root, options),
    };

    if options.include_images {
        let image_folder = match asset_type {
            AssetType::Hdris => root.to_path_buf(),
            AssetType::Textures | AssetType::Models => paths::asset_folder(root, asset_id),
        };
        tasks.extend(image_tasks(asset_type, asset_id, &image_folder, options));
    }

    tasks.retain(|task| {
        let keep = paths::is_safe_component(&task.filename);
        if !keep {
            warn!("Skipping {}: URL does not end in a file name", task.url);
        }
        keep
    });
    tasks
}

fn hdri_tasks(files: &AssetFiles, root: &Path, options: &GenerateOptions) -> Vec<DownloadTask> {
    let formats = options.formats();
    let mut tasks = Vec::new();

    for (size, by_format) in sorted_by_resolution(&files.hdri) {
        if !options.accepts_size(size) {
            continue;
        }
        for format in &formats {
            if let Some(file) = by_format.get(format.key()) {
                tasks.push(DownloadTask::from_url(
                    &file.url,
                    root,
                    file.md5.clone(),
                    file.size,
                    options.overwrite,
                ));
            }
        }
    }

    tasks
}

fn blend_tasks(
    asset_id: &str,
    files: &AssetFiles,
    root: &Path,
    options: &GenerateOptions,
) -> Vec<DownloadTask> {
    let mut tasks = Vec::new();

    for (size, entry) in sorted_by_resolution(&files.blend) {
        if !options.accepts_size(size) {
            continue;
        }
        let Some(blend) = &entry.blend else {
            continue;
        };

        tasks.push(DownloadTask::from_url(
            &blend.url,
            paths::size_folder(root, asset_id, size),
            blend.md5.clone(),
            blend.size,
            options.overwrite,
        ));

        let textures = paths::textures_folder(root, asset_id, size);
        for texture in blend.include.values() {
            tasks.push(DownloadTask::from_url(
                &texture.url,
                &textures,
                texture.md5.clone(),
                texture.size,
                options.overwrite,
            ));
        }
    }

    tasks
}

fn image_tasks(
    asset_type: AssetType,
    asset_id: &str,
    folder: &Path,
    options: &GenerateOptions,
) -> Vec<DownloadTask> {
    image_roles(asset_type)
        .iter()
        .filter(|role| !role.tonemapped || options.tonemapped)
        .map(|role| {
            let url = role.url(asset_id);
            let ext = paths::extension_from_url(&url).unwrap_or_else(|| "png".to_string());
            DownloadTask {
                filename: format!("{}_{}.{}", asset_id, role.key, ext),
                url,
                destination_folder: folder.to_path_buf(),
                expected_md5: None,
                expected_size: None,
                overwrite: options.overwrite,
            }
        })
        .collect()
}
