//! Destination path derivation
//!
//! Model and texture downloads are laid out as:
//! `root/<asset>/<asset>_<size>/` for the .blend archive and
//! `root/<asset>/<asset>_<size>/textures/` for its included maps.
//! HDRIs land directly in the root folder.

use std::path::{Component, Path, PathBuf};

/// Leaf filename from the last path segment of a URL
/// `https://dl.polyhaven.org/file/ph-assets/HDRIs/hdr/1k/aerial_rocks_1k.hdr` -> `aerial_rocks_1k.hdr`
///
/// Query strings and fragments are ignored.
pub fn filename_from_url(url: &str) -> String {
    let without_query = url.split(['?', '#']).next().unwrap_or(url);
    without_query
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(without_query)
        .to_string()
}

/// Extension of the last path segment of a URL, without the dot
pub fn extension_from_url(url: &str) -> Option<String> {
    let name = filename_from_url(url);
    name.rsplit_once('.')
        .map(|(_, ext)| ext.to_string())
        .filter(|ext| !ext.is_empty())
}

/// True if `name` is exactly one normal path component.
///
/// Rejects empty names, `.`/`..`, absolute paths and anything with a separator
/// between two components, so joining it onto a folder stays inside that folder.
pub fn is_safe_component(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

/// `root/<asset>`
pub fn asset_folder(root: &Path, asset_id: &str) -> PathBuf {
    root.join(asset_id)
}

/// `root/<asset>/<asset>_<size>`
pub fn size_folder(root: &Path, asset_id: &str, size: &str) -> PathBuf {
    asset_folder(root, asset_id).join(format!("{}_{}", asset_id, size))
}

/// `root/<asset>/<asset>_<size>/textures`
pub fn textures_folder(root: &Path, asset_id: &str, size: &str) -> PathBuf {
    size_folder(root, asset_id, size).join("textures")
}
