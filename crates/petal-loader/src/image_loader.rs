//! Image byte pipeline: fetch, detect format, and probe natural size.
//!
//! 1. **Fetch** - [`fetch_image_bytes()`] consolidates HTTP, `data:` URL,
//!    and local file reads into a single function.
//! 2. **Detect** - [`detect_format()`] determines whether bytes are SVG or
//!    raster using extension, MIME type, and magic-byte sniffing.
//! 3. **Probe** - [`SizeProbe`] with [`SvgProbe`] and [`RasterProbe`]
//!    implementations. Only headers are read; nothing is rasterized.
//!
//! The [`ImageProbePipeline`] ties detection and probing together behind a
//! single `probe(bytes, uri)` entry point.

use std::fs;
use std::io::Cursor;

use petal_common::net::{DataUrl, FetchError, Fetcher, HttpRequest};
use petal_common::url::{is_data_uri, strip_url_decorations};
use petal_image::geometry::Size;
use petal_image::source::ImageRequest;
use thiserror::Error;

/// Detected image format.
///
/// Only two variants are needed: the `image` crate handles raster sub-format
/// detection (PNG/JPEG/GIF/WebP/...) internally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    /// SVG vector image (parsed via usvg).
    Svg,
    /// Raster image (PNG, JPEG, GIF, WebP, etc., read via the `image` crate).
    Raster,
}

/// Why the natural size of some bytes could not be determined.
#[derive(Debug, Error)]
pub enum ProbeError {
    /// The SVG document did not parse.
    #[error("failed to parse SVG: {0}")]
    Svg(#[from] usvg::Error),
    /// The raster header could not be read.
    #[error("could not decode image ({0})")]
    Raster(#[from] image::ImageError),
    /// The raster format could not be guessed.
    #[error("could not read image ({0})")]
    Io(#[from] std::io::Error),
    /// No registered probe handles the format.
    #[error("no probe available for format {0:?}")]
    NoProbe(ImageFormat),
}

/// Detect whether `bytes` fetched from `uri` are an SVG or a raster image.
///
/// Uses a three-step strategy:
///
/// 1. **Extension check** - fast path for `.svg` in `uri`, ignoring any
///    query string or fragment.
/// 2. **Data URL MIME check** - `data:image/svg` prefix.
/// 3. **Magic-byte sniffing** - trims leading whitespace and checks the
///    first 256 bytes for `<?xml` or `<svg` prefixes.
///
/// Anything else is [`ImageFormat::Raster`].
#[must_use]
pub fn detect_format(uri: &str, bytes: &[u8]) -> ImageFormat {
    if std::path::Path::new(strip_url_decorations(uri))
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("svg"))
    {
        return ImageFormat::Svg;
    }

    if uri
        .get(..14)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("data:image/svg"))
    {
        return ImageFormat::Svg;
    }

    let trimmed = bytes
        .iter()
        .skip_while(|b| b.is_ascii_whitespace())
        .take(256)
        .copied()
        .collect::<Vec<u8>>();

    if trimmed.starts_with(b"<?xml") || trimmed.starts_with(b"<svg") {
        return ImageFormat::Svg;
    }

    ImageFormat::Raster
}

/// Reads the natural size of an encoded image.
pub trait SizeProbe: Send + Sync {
    /// Human-readable name (for diagnostics).
    fn name(&self) -> &'static str;

    /// Whether this probe handles the given format.
    fn supports(&self, format: ImageFormat) -> bool;

    /// Read the natural size of `bytes`.
    ///
    /// # Errors
    ///
    /// Returns a [`ProbeError`] if the bytes are not a readable image.
    fn probe(&self, bytes: &[u8]) -> Result<Size, ProbeError>;
}

/// Reads the SVG viewport size via usvg.
#[derive(Debug, Default, Clone, Copy)]
pub struct SvgProbe;

impl SizeProbe for SvgProbe {
    fn name(&self) -> &'static str {
        "SVG (usvg)"
    }

    fn supports(&self, format: ImageFormat) -> bool {
        format == ImageFormat::Svg
    }

    fn probe(&self, bytes: &[u8]) -> Result<Size, ProbeError> {
        let tree = usvg::Tree::from_data(bytes, &usvg::Options::default())?;
        let size = tree.size();
        Ok(Size::new(
            f64::from(size.width()),
            f64::from(size.height()),
        ))
    }
}

/// Reads raster headers (PNG, JPEG, GIF, WebP, ...) via the `image` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct RasterProbe;

impl SizeProbe for RasterProbe {
    fn name(&self) -> &'static str {
        "Raster (image crate)"
    }

    fn supports(&self, format: ImageFormat) -> bool {
        format == ImageFormat::Raster
    }

    fn probe(&self, bytes: &[u8]) -> Result<Size, ProbeError> {
        let (width, height) = image::ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()?
            .into_dimensions()?;
        Ok(Size::new(f64::from(width), f64::from(height)))
    }
}

/// Fetch the bytes behind `request`.
///
/// `http:`/`https:` URIs go through `fetcher` with the request's method,
/// headers, and body, plus a `Cache-Control` header derived from its cache
/// policy. `data:` URLs are decoded in place. Anything else is read as a
/// local path, with an optional `file://` prefix.
///
/// # Errors
///
/// Returns a [`FetchError`] if the fetch fails (network error, bad status,
/// file not found, or invalid data URL).
pub fn fetch_image_bytes(fetcher: &Fetcher, request: &ImageRequest) -> Result<Vec<u8>, FetchError> {
    let uri = request.uri.as_str();
    if uri.starts_with("http://") || uri.starts_with("https://") {
        let mut headers = request.headers.clone();
        if let Some(value) = request.cache.cache_control() {
            headers.push(("Cache-Control".to_string(), value.to_string()));
        }
        fetcher.fetch_bytes(&HttpRequest {
            url: uri,
            method: request.method.as_deref(),
            headers: &headers,
            body: request.body.as_deref(),
        })
    } else if is_data_uri(uri) {
        DataUrl::parse(uri)?.decode()
    } else {
        let path = uri.strip_prefix("file://").unwrap_or(uri);
        fs::read(path).map_err(|source| FetchError::File {
            path: path.to_string(),
            source,
        })
    }
}

/// Detects the format of fetched bytes and dispatches to the matching
/// probe.
pub struct ImageProbePipeline {
    probes: Vec<Box<dyn SizeProbe>>,
}

impl ImageProbePipeline {
    /// Create a pipeline with the default probes (SVG + raster).
    #[must_use]
    pub fn new() -> Self {
        Self {
            probes: vec![Box::new(SvgProbe), Box::new(RasterProbe)],
        }
    }

    /// Detect the format of `bytes` fetched from `uri` and read their
    /// natural size.
    ///
    /// # Errors
    ///
    /// Returns a [`ProbeError`] if no probe supports the detected format or
    /// if probing fails.
    pub fn probe(&self, bytes: &[u8], uri: &str) -> Result<Size, ProbeError> {
        let format = detect_format(uri, bytes);
        let probe = self
            .probes
            .iter()
            .find(|probe| probe.supports(format))
            .ok_or(ProbeError::NoProbe(format))?;
        log::trace!(target: "petal::loader", "probing {uri} with {}", probe.name());
        probe.probe(bytes)
    }
}

impl Default for ImageProbePipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ImageProbePipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.probes.iter().map(|probe| probe.name()))
            .finish()
    }
}
