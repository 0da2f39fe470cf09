//! Preview image roles per asset type.
//!
//! Adding an asset type or a render is a table change here, nothing else.

use crate::catalog::AssetType;

/// One preview image an asset publishes on the CDN
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageRole {
    /// Used in the local filename: `{asset}_{key}.{ext}`
    pub key: &'static str,
    /// URL template, `{id}` is replaced by the asset id
    pub template: &'static str,
    /// Only emitted when the tonemapped preview is requested
    pub tonemapped: bool,
}

const fn role(key: &'static str, template: &'static str) -> ImageRole {
    ImageRole {
        key,
        template,
        tonemapped: false,
    }
}

const HDRI_ROLES: &[ImageRole] = &[
    role("thumb", "https://cdn.polyhaven.com/asset_img/thumbs/{id}.png"),
    role("primary", "https://cdn.polyhaven.com/asset_img/primary/{id}.png"),
    role("renders_lone_monk", "https://cdn.polyhaven.com/asset_img/renders/{id}/lone_monk.png"),
    ImageRole {
        key: "Tonemapped8K",
        template: "https://dl.polyhaven.org/file/ph-assets/HDRIs/extra/Tonemapped%20JPG/{id}.jpg",
        tonemapped: true,
    },
];

const TEXTURE_ROLES: &[ImageRole] = &[
    role("primary", "https://cdn.polyhaven.com/asset_img/primary/{id}.png"),
    role("thumb", "https://cdn.polyhaven.com/asset_img/thumbs/{id}.png"),
    role("renders_clay", "https://cdn.polyhaven.com/asset_img/renders/{id}/clay.png"),
];

const MODEL_ROLES: &[ImageRole] = &[
    role("primary", "https://cdn.polyhaven.com/asset_img/primary/{id}.png"),
    role("renders_clay", "https://cdn.polyhaven.com/asset_img/renders/{id}/clay.png"),
    role("renders_orth_front", "https://cdn.polyhaven.com/asset_img/renders/{id}/orth_front.png"),
    role("renders_orth_side", "https://cdn.polyhaven.com/asset_img/renders/{id}/orth_side.png"),
    role("renders_orth_top", "https://cdn.polyhaven.com/asset_img/renders/{id}/orth_top.png"),
];

/// Roles for an asset type, in emission order
pub fn image_roles(asset_type: AssetType) -> &'static [ImageRole] {
    match asset_type {
        AssetType::Hdris => HDRI_ROLES,
        AssetType::Textures => TEXTURE_ROLES,
        AssetType::Models => MODEL_ROLES,
    }
}

impl ImageRole {
    pub fn url(&self, asset_id: &str) -> String {
        self.template.replace("{id}", asset_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_hdris_have_tonemapped_role() {
        assert_eq!(image_roles(AssetType::Hdris).iter().filter(|r| r.tonemapped).count(), 1);
        assert!(!image_roles(AssetType::Textures).iter().any(|r| r.tonemapped));
        assert!(!image_roles(AssetType::Models).iter().any(|r| r.tonemapped));
    }

    #[test]
    fn test_role_keys_unique_per_type() {
        for t in AssetType::ALL {
            let roles = image_roles(t);
            let mut keys: Vec<_> = roles.iter().map(|r| r.key).collect();
            keys.sort();
            keys.dedup();
            assert_eq!(keys.len(), roles.len(), "duplicate role for {}", t);
        }
    }

    #[test]
    fn test_url_substitution() {
        let thumb = image_roles(AssetType::Hdris)[0];
        assert_eq!(
            thumb.url("aerial_rocks"),
            "https://cdn.polyhaven.com/asset_img/thumbs/aerial_rocks.png"
        );
    }
}
