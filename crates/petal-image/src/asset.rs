//! Build-time asset manifests and the registry that hands them out.

use serde::{Deserialize, Serialize};

use crate::geometry::Size;
use crate::source::AssetId;

fn default_scales() -> Vec<f64> {
    vec![1.0]
}

/// Everything known about a registered asset. Immutable once registered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetManifest {
    /// Base URL the asset files are served from, without a trailing `/`.
    pub http_server_location: String,
    /// File stem.
    pub name: String,
    /// File extension (`png`, `jpg`, ...).
    #[serde(rename = "type")]
    pub kind: String,
    /// Pixel densities available on the server, in declaration order.
    #[serde(default = "default_scales")]
    pub scales: Vec<f64>,
    /// Intrinsic width at scale 1.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    /// Intrinsic height at scale 1.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
}

impl AssetManifest {
    /// Manifest for `{location}/{name}.{kind}` at scale 1 only.
    #[must_use]
    pub fn new(
        http_server_location: impl Into<String>,
        name: impl Into<String>,
        kind: impl Into<String>,
    ) -> Self {
        Self {
            http_server_location: http_server_location.into(),
            name: name.into(),
            kind: kind.into(),
            scales: default_scales(),
            width: None,
            height: None,
        }
    }

    /// Replace the available scales.
    #[must_use]
    pub fn with_scales(mut self, scales: &[f64]) -> Self {
        self.scales = scales.to_vec();
        self
    }

    /// Attach intrinsic dimensions.
    #[must_use]
    pub const fn with_size(mut self, width: f64, height: f64) -> Self {
        self.width = Some(width);
        self.height = Some(height);
        self
    }

    /// The URI of the file for `scale`: `{location}/{name}@{scale}x.{kind}`,
    /// with no suffix at scale 1.
    #[must_use]
    pub fn uri_for_scale(&self, scale: f64) -> String {
        let suffix = if (scale - 1.0).abs() < f64::EPSILON {
            String::new()
        } else {
            format!("@{scale}x")
        };
        format!(
            "{}/{}{suffix}.{}",
            self.http_server_location, self.name, self.kind
        )
    }

    /// Intrinsic dimensions, when both are known.
    #[must_use]
    pub fn size(&self) -> Option<Size> {
        Some(Size::new(self.width?, self.height?))
    }
}

/// Resolves asset handles to manifests.
pub trait AssetRegistry {
    /// The manifest registered under `id`, if any.
    fn asset_by_id(&self, id: AssetId) -> Option<&AssetManifest>;
}

/// In-memory registry. Handles are assigned in registration order,
/// starting at 1.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssetMap {
    assets: Vec<AssetManifest>,
}

impl AssetMap {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `manifest` and return its handle.
    pub fn register(&mut self, manifest: AssetManifest) -> AssetId {
        self.assets.push(manifest);
        AssetId(self.assets.len())
    }

    /// Number of registered assets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.assets.len()
    }

    /// Whether nothing has been registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }
}

impl AssetRegistry for AssetMap {
    fn asset_by_id(&self, id: AssetId) -> Option<&AssetManifest> {
        id.0.checked_sub(1).and_then(|index| self.assets.get(index))
    }
}

impl FromIterator<AssetManifest> for AssetMap {
    fn from_iter<I: IntoIterator<Item = AssetManifest>>(iter: I) -> Self {
        Self {
            assets: iter.into_iter().collect(),
        }
    }
}
