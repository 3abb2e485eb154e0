//! Presentation parameters derived from props, style, and load state.
//!
//! The image paints as a CSS background of its root box, so most of what
//! is derived here is background and filter values.
//!
//! - [CSS Backgrounds and Borders Level 3](https://www.w3.org/TR/css-backgrounds-3/)
//! - [Filter Effects Module Level 1](https://www.w3.org/TR/filter-effects-1/)

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize, Serializer};
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};

use crate::geometry::{LayoutRect, Size};
use crate::state::LoadState;

/// How source pixels are fitted into the image box.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
    EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ResizeMode {
    /// Centered at natural size, scaled down to fit if larger than the box.
    Center,
    /// Scaled uniformly to fit inside the box.
    Contain,
    /// Scaled uniformly to fill the box, cropping the overflow.
    #[default]
    Cover,
    /// Natural size, anchored top-left.
    None,
    /// Tiled at natural size, scaled down to fit if larger than the box.
    Repeat,
    /// Stretched to the box, ignoring aspect ratio.
    Stretch,
}

impl ResizeMode {
    /// Whether this mode sizes its background from the measured box.
    #[must_use]
    pub const fn needs_layout(self) -> bool {
        matches!(self, Self::Center | Self::Repeat)
    }

    /// The background rules this mode maps to, before any pixel override.
    ///
    /// [§ 3.6 'background-position'](https://www.w3.org/TR/css-backgrounds-3/#background-position)
    /// [§ 3.4 'background-repeat'](https://www.w3.org/TR/css-backgrounds-3/#background-repeat)
    /// [§ 3.9 'background-size'](https://www.w3.org/TR/css-backgrounds-3/#background-size)
    #[must_use]
    pub const fn background(self) -> BackgroundStyle {
        let base = BackgroundStyle {
            position: "center",
            repeat: "no-repeat",
            size: BackgroundSize::Cover,
        };
        match self {
            Self::Center => BackgroundStyle {
                size: BackgroundSize::Auto,
                ..base
            },
            Self::Contain => BackgroundStyle {
                size: BackgroundSize::Contain,
                ..base
            },
            Self::Cover => base,
            Self::None => BackgroundStyle {
                position: "0",
                size: BackgroundSize::Auto,
                ..base
            },
            Self::Repeat => BackgroundStyle {
                position: "0",
                repeat: "repeat",
                size: BackgroundSize::Auto,
            },
            Self::Stretch => BackgroundStyle {
                size: BackgroundSize::Stretch,
                ..base
            },
        }
    }
}

/// A `background-size` value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BackgroundSize {
    /// `auto`
    Auto,
    /// `contain`
    Contain,
    /// `cover`
    Cover,
    /// `100% 100%`
    Stretch,
    /// Explicit `{w}px {h}px`.
    Pixels(Size),
}

impl fmt::Display for BackgroundSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auto => f.write_str("auto"),
            Self::Contain => f.write_str("contain"),
            Self::Cover => f.write_str("cover"),
            Self::Stretch => f.write_str("100% 100%"),
            Self::Pixels(size) => write!(f, "{}px {}px", size.width, size.height),
        }
    }
}

impl Serialize for BackgroundSize {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Background rules for the image box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BackgroundStyle {
    /// `background-position`
    pub position: &'static str,
    /// `background-repeat`
    pub repeat: &'static str,
    /// `background-size`
    pub size: BackgroundSize,
}

static NEXT_FILTER_ID: AtomicU64 = AtomicU64::new(0);

/// Names the tint filter definition generated for one image.
///
/// Filter definitions live in a document-wide namespace, so every image
/// allocates its own id once, at construction. Ids are unique within a
/// process run and are not stable across runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct FilterId(u64);

impl FilterId {
    /// Take the next id from the process-wide counter.
    #[must_use]
    pub fn allocate() -> Self {
        Self(NEXT_FILTER_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// The raw counter value.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for FilterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tint-{}", self.0)
    }
}

/// One entry of the `filter` chain.
///
/// [§ 13.1 Filter Functions](https://www.w3.org/TR/filter-effects-1/#filter-functions)
#[derive(Debug, Clone, PartialEq)]
pub enum FilterPrimitive {
    /// A filter value supplied through style, used verbatim.
    Custom(String),
    /// `blur(<radius>px)`
    Blur(f64),
    /// `url(#tint-N)`, referencing the image's generated tint filter.
    Tint(FilterId),
}

impl fmt::Display for FilterPrimitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Custom(value) => f.write_str(value),
            Self::Blur(radius) => write!(f, "blur({radius}px)"),
            Self::Tint(id) => write!(f, "url(#{id})"),
        }
    }
}

impl Serialize for FilterPrimitive {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Style passed to the image.
///
/// `resize_mode` and `tint_color` are accepted here for compatibility only;
/// the props of the same name take precedence and their use here is
/// reported as deprecated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageStyle {
    /// Deprecated: use the `resize_mode` prop.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resize_mode: Option<ResizeMode>,
    /// Deprecated: use the `tint_color` prop.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tint_color: Option<String>,
    /// A CSS `filter` value placed first in the filter chain.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
    /// Every other declaration, forwarded to the root untouched.
    #[serde(flatten)]
    pub rest: BTreeMap<String, serde_json::Value>,
}

/// Use of a deprecated style property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Deprecation {
    /// `style.resizeMode`
    StyleResizeMode,
    /// `style.tintColor`
    StyleTintColor,
}

impl Deprecation {
    /// Deduplication key.
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::StyleResizeMode => "Image.style.resizeMode",
            Self::StyleTintColor => "Image.style.tintColor",
        }
    }

    /// Developer-facing message.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::StyleResizeMode => {
                "Image: style.resizeMode is deprecated. Please use props.resizeMode."
            }
            Self::StyleTintColor => {
                "Image: style.tintColor is deprecated. Please use props.tintColor."
            }
        }
    }
}

/// Inputs to [`derive_presentation`].
#[derive(Debug, Clone, Copy)]
pub struct PresentationInput<'a> {
    /// The style prop.
    pub style: &'a ImageStyle,
    /// The `resize_mode` prop.
    pub resize_mode: Option<ResizeMode>,
    /// The `tint_color` prop.
    pub tint_color: Option<&'a str>,
    /// The `blur_radius` prop, in pixels.
    pub blur_radius: Option<f64>,
    /// Current load state.
    pub state: LoadState,
    /// Whether a `default_source` is configured.
    pub has_default_source: bool,
    /// Natural size of the loaded image.
    pub natural_size: Option<Size>,
    /// Last measured box.
    pub layout: Option<LayoutRect>,
    /// The image's tint filter id.
    pub filter_id: FilterId,
}

/// Everything the composition layer needs to paint the image box.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PresentationParams {
    /// Effective resize mode.
    pub resize_mode: ResizeMode,
    /// Filter chain, in application order.
    pub filters: Vec<FilterPrimitive>,
    /// Effective tint color.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tint_color: Option<String>,
    /// Background rules, with any pixel override applied.
    pub background: BackgroundStyle,
    /// Explicit background size computed for `center` and `repeat`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub background_size_override: Option<Size>,
    /// Whether the primary source (rather than the default) is shown.
    pub display_source: bool,
    /// Deprecated style usage found while deriving.
    #[serde(skip)]
    pub deprecations: Vec<Deprecation>,
}

impl PresentationParams {
    /// The chain as a CSS `filter` value, or `None` when empty.
    #[must_use]
    pub fn filter_css(&self) -> Option<String> {
        if self.filters.is_empty() {
            return None;
        }
        Some(
            self.filters
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(" "),
        )
    }
}

/// Whether the primary source is shown rather than the default source.
///
/// The primary source shows once loaded, and while loading when there is
/// no default to show instead.
#[must_use]
pub const fn should_display_source(state: LoadState, has_default_source: bool) -> bool {
    matches!(state, LoadState::Loaded) || (matches!(state, LoadState::Loading) && !has_default_source)
}

/// Explicit background size for `center` and `repeat`.
///
/// The image is scaled down (never up) until it fits the measured box:
/// `scale = min(1, box.w / natural.w, box.h / natural.h)`, and each side
/// is rounded up to a whole pixel. `None` for other modes or while either
/// size is unknown or empty.
#[must_use]
pub fn background_size_override(
    mode: ResizeMode,
    natural: Option<Size>,
    layout: Option<LayoutRect>,
) -> Option<Size> {
    if !mode.needs_layout() {
        return None;
    }
    let natural = natural.filter(Size::is_positive)?;
    let layout = layout.map(|rect| rect.size()).filter(Size::is_positive)?;

    let scale = 1.0_f64
        .min(layout.width / natural.width)
        .min(layout.height / natural.height);
    Some(Size::new(
        (scale * natural.width).ceil(),
        (scale * natural.height).ceil(),
    ))
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

/// Derive presentation parameters. Pure; recomputed on every render.
///
/// Precedence: props over deprecated style values over defaults. The
/// filter chain is the style filter, then blur, then the tint reference.
#[must_use]
pub fn derive_presentation(input: &PresentationInput<'_>) -> PresentationParams {
    let style = input.style;
    let mut deprecations = Vec::new();
    if style.resize_mode.is_some() {
        deprecations.push(Deprecation::StyleResizeMode);
    }
    if style.tint_color.is_some() {
        deprecations.push(Deprecation::StyleTintColor);
    }

    let resize_mode = input
        .resize_mode
        .or(style.resize_mode)
        .unwrap_or_default();
    let tint_color =
        non_empty(input.tint_color).or_else(|| non_empty(style.tint_color.as_deref()));

    let mut filters = Vec::new();
    if let Some(custom) = non_empty(style.filter.as_deref()) {
        filters.push(FilterPrimitive::Custom(custom.to_string()));
    }
    if let Some(radius) = input.blur_radius.filter(|r| *r > 0.0) {
        filters.push(FilterPrimitive::Blur(radius));
    }
    if tint_color.is_some() {
        filters.push(FilterPrimitive::Tint(input.filter_id));
    }

    let background_size_override =
        background_size_override(resize_mode, input.natural_size, input.layout);
    let mut background = resize_mode.background();
    if let Some(size) = background_size_override {
        background.size = BackgroundSize::Pixels(size);
    }

    PresentationParams {
        resize_mode,
        filters,
        tint_color: tint_color.map(str::to_string),
        background,
        background_size_override,
        display_source: should_display_source(input.state, input.has_default_source),
        deprecations,
    }
}
