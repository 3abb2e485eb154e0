//! Source resolution: from a [`Source`] to a fetchable request and known
//! intrinsic dimensions.
//!
//! Everything here is a pure function of its inputs and runs on every
//! render.

use petal_common::url::escape_svg_data_uri;

use crate::asset::{AssetManifest, AssetRegistry};
use crate::error::AssetNotFoundError;
use crate::geometry::Size;
use crate::source::{ImageRequest, Source};

/// Properties of the display the image is rendered on.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImageEnvironment {
    /// Device pixels per CSS pixel.
    pub device_pixel_ratio: f64,
}

impl Default for ImageEnvironment {
    fn default() -> Self {
        Self {
            device_pixel_ratio: 1.0,
        }
    }
}

/// Pick the scale closest to `preferred`.
///
/// Ties go to the scale listed first. An empty list behaves as `[1]`.
#[must_use]
pub fn select_scale(scales: &[f64], preferred: f64) -> f64 {
    let Some((&first, rest)) = scales.split_first() else {
        return 1.0;
    };
    rest.iter().fold(first, |best, &candidate| {
        if (candidate - preferred).abs() < (best - preferred).abs() {
            candidate
        } else {
            best
        }
    })
}

fn lookup<'r, R>(registry: &'r R, source: &Source) -> Result<Option<&'r AssetManifest>, AssetNotFoundError>
where
    R: AssetRegistry + ?Sized,
{
    match source {
        Source::Handle(id) => registry
            .asset_by_id(*id)
            .map(Some)
            .ok_or(AssetNotFoundError { id: *id }),
        _ => Ok(None),
    }
}

/// Resolve `source` into the request the loader should issue.
///
/// Returns `Ok(None)` when there is nothing to load: no source, an empty
/// URI, or an empty descriptor list. For descriptor lists only the first
/// entry is considered.
///
/// # Errors
///
/// Returns [`AssetNotFoundError`] if `source` is a handle the registry does
/// not know.
pub fn resolve_request<R>(
    source: Option<&Source>,
    registry: &R,
    environment: &ImageEnvironment,
) -> Result<Option<ImageRequest>, AssetNotFoundError>
where
    R: AssetRegistry + ?Sized,
{
    let Some(source) = source else {
        return Ok(None);
    };

    let request = match source {
        Source::Handle(_) => lookup(registry, source)?.map(|manifest| {
            let scale = select_scale(&manifest.scales, environment.device_pixel_ratio);
            ImageRequest::new(manifest.uri_for_scale(scale))
        }),
        Source::Uri(uri) => Some(ImageRequest::new(uri.clone())),
        Source::Descriptor(descriptor) => {
            Some(ImageRequest::with_options(descriptor.uri.clone(), descriptor))
        }
        Source::Descriptors(descriptors) => descriptors
            .first()
            .map(|first| ImageRequest::with_options(first.uri.clone(), first)),
    };

    Ok(request
        .filter(|request| !request.uri.is_empty())
        .map(|mut request| {
            request.uri = escape_svg_data_uri(&request.uri).into_owned();
            request
        }))
}

/// Resolve `source` into the URI to display.
///
/// # Errors
///
/// Returns [`AssetNotFoundError`] if `source` is a handle the registry does
/// not know.
pub fn resolve_uri<R>(
    source: Option<&Source>,
    registry: &R,
    environment: &ImageEnvironment,
) -> Result<Option<String>, AssetNotFoundError>
where
    R: AssetRegistry + ?Sized,
{
    Ok(resolve_request(source, registry, environment)?.map(|request| request.uri))
}

/// Intrinsic dimensions known without loading anything.
///
/// Handles use the manifest's size; a single descriptor uses its `width`
/// and `height` when both are given. URIs and descriptor lists carry none.
///
/// # Errors
///
/// Returns [`AssetNotFoundError`] if `source` is a handle the registry does
/// not know.
pub fn resolve_dimensions<R>(
    source: Option<&Source>,
    registry: &R,
) -> Result<Option<Size>, AssetNotFoundError>
where
    R: AssetRegistry + ?Sized,
{
    match source {
        Some(handle @ Source::Handle(_)) => {
            Ok(lookup(registry, handle)?.and_then(AssetManifest::size))
        }
        Some(Source::Descriptor(descriptor)) => Ok(descriptor
            .width
            .zip(descriptor.height)
            .map(|(width, height)| Size::new(width, height))),
        Some(Source::Uri(_) | Source::Descriptors(_)) | None => Ok(None),
    }
}
