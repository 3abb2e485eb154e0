//! The image component.
//!
//! An [`Image`] ties the pieces together for one mounted image:
//!
//! 1. **Resolve**: the `source` prop is resolved into a request on every
//!    mount, update, and render.
//! 2. **Coordinate**: the [`LoadCoordinator`] is synced with that request,
//!    which only reaches the context's loader when the resolved URI
//!    changed. Dropping the image aborts whatever is still outstanding.
//! 3. **Present**: [`Image::render`] derives presentation parameters from
//!    props and the current load state and describes the root node.

use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use petal_common::warning::OnceWarnings;
use serde::Serialize;

use crate::asset::AssetRegistry;
use crate::error::AssetNotFoundError;
use crate::events::{Callback, ErrorEvent, LayoutEvent, LoadEndEvent, LoadEvent, Notify};
use crate::geometry::{HostNodeId, LayoutRect, Size};
use crate::loader::{RequestHandle, SharedLoader};
use crate::presentation::{
    FilterId, ImageStyle, PresentationInput, PresentationParams, ResizeMode, derive_presentation,
};
use crate::resolve::{ImageEnvironment, resolve_dimensions, resolve_request, resolve_uri};
use crate::source::Source;
use crate::state::{LoadCoordinator, LoadHandlers, LoadState};

/// Props accepted by [`Image`].
#[derive(Clone, Default)]
pub struct ImageProps {
    /// What to show.
    pub source: Option<Source>,
    /// What to show until `source` has loaded, or if it fails.
    pub default_source: Option<Source>,
    /// How to fit the image into its box. Defaults to `cover`.
    pub resize_mode: Option<ResizeMode>,
    /// Color applied to every non-transparent pixel.
    pub tint_color: Option<String>,
    /// Blur radius in pixels.
    pub blur_radius: Option<f64>,
    /// Whether the image can be dragged out of the page.
    pub draggable: bool,
    /// Text alternative, exposed as the accessible name.
    pub accessibility_label: Option<String>,
    /// Style of the root box.
    pub style: ImageStyle,
    /// A load started.
    pub on_load_start: Option<Notify>,
    /// A load succeeded.
    pub on_load: Option<Callback<LoadEvent>>,
    /// A load failed.
    pub on_error: Option<Callback<ErrorEvent>>,
    /// A load ended.
    pub on_load_end: Option<Callback<LoadEndEvent>>,
    /// The root box was measured.
    pub on_layout: Option<Callback<LayoutEvent>>,
    /// Unrecognized attributes, forwarded to the root node.
    pub attributes: BTreeMap<String, String>,
}

impl ImageProps {
    /// Props showing `source`.
    #[must_use]
    pub fn new(source: impl Into<Source>) -> Self {
        Self {
            source: Some(source.into()),
            ..Self::default()
        }
    }

    /// Set the fallback source.
    #[must_use]
    pub fn with_default_source(mut self, source: impl Into<Source>) -> Self {
        self.default_source = Some(source.into());
        self
    }

    /// Set the resize mode.
    #[must_use]
    pub const fn with_resize_mode(mut self, mode: ResizeMode) -> Self {
        self.resize_mode = Some(mode);
        self
    }

    /// Set the tint color.
    #[must_use]
    pub fn with_tint_color(mut self, color: impl Into<String>) -> Self {
        self.tint_color = Some(color.into());
        self
    }

    /// Set the blur radius.
    #[must_use]
    pub const fn with_blur_radius(mut self, radius: f64) -> Self {
        self.blur_radius = Some(radius);
        self
    }

    /// Set the style.
    #[must_use]
    pub fn with_style(mut self, style: ImageStyle) -> Self {
        self.style = style;
        self
    }

    /// Set the `on_load_start` callback.
    #[must_use]
    pub fn on_load_start(mut self, f: impl Fn() + 'static) -> Self {
        self.on_load_start = Some(Rc::new(f));
        self
    }

    /// Set the `on_load` callback.
    #[must_use]
    pub fn on_load(mut self, f: impl Fn(&LoadEvent) + 'static) -> Self {
        self.on_load = Some(Rc::new(f));
        self
    }

    /// Set the `on_error` callback.
    #[must_use]
    pub fn on_error(mut self, f: impl Fn(&ErrorEvent) + 'static) -> Self {
        self.on_error = Some(Rc::new(f));
        self
    }

    /// Set the `on_load_end` callback.
    #[must_use]
    pub fn on_load_end(mut self, f: impl Fn(&LoadEndEvent) + 'static) -> Self {
        self.on_load_end = Some(Rc::new(f));
        self
    }

    /// Set the `on_layout` callback.
    #[must_use]
    pub fn on_layout(mut self, f: impl Fn(&LayoutEvent) + 'static) -> Self {
        self.on_layout = Some(Rc::new(f));
        self
    }

    fn handlers(&self) -> LoadHandlers {
        LoadHandlers {
            on_load_start: self.on_load_start.clone(),
            on_load: self.on_load.clone(),
            on_error: self.on_error.clone(),
            on_load_end: self.on_load_end.clone(),
        }
    }

    fn effective_resize_mode(&self) -> ResizeMode {
        self.resize_mode
            .or(self.style.resize_mode)
            .unwrap_or_default()
    }
}

impl fmt::Debug for ImageProps {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageProps")
            .field("source", &self.source)
            .field("default_source", &self.default_source)
            .field("resize_mode", &self.resize_mode)
            .field("tint_color", &self.tint_color)
            .field("blur_radius", &self.blur_radius)
            .field("draggable", &self.draggable)
            .field("accessibility_label", &self.accessibility_label)
            .field("style", &self.style)
            .field("attributes", &self.attributes)
            .finish_non_exhaustive()
    }
}

/// Collaborators shared by every image of one composition root.
#[derive(Clone)]
pub struct ImageContext {
    /// Resolves asset handles.
    pub registry: Rc<dyn AssetRegistry>,
    /// Issues and aborts loads.
    pub loader: SharedLoader,
    /// Display properties.
    pub environment: ImageEnvironment,
    /// Receives deprecation warnings, once per key.
    pub warnings: Rc<OnceWarnings>,
}

impl ImageContext {
    /// Context with a default environment that logs warnings.
    #[must_use]
    pub fn new(registry: Rc<dyn AssetRegistry>, loader: SharedLoader) -> Self {
        Self {
            registry,
            loader,
            environment: ImageEnvironment::default(),
            warnings: Rc::new(OnceWarnings::default()),
        }
    }

    /// Replace the environment.
    #[must_use]
    pub const fn with_environment(mut self, environment: ImageEnvironment) -> Self {
        self.environment = environment;
        self
    }

    /// Replace the warning deduplicator.
    #[must_use]
    pub fn with_warnings(mut self, warnings: Rc<OnceWarnings>) -> Self {
        self.warnings = warnings;
        self
    }
}

impl fmt::Debug for ImageContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageContext")
            .field("environment", &self.environment)
            .field("warnings", &self.warnings)
            .finish_non_exhaustive()
    }
}

/// The hidden `<img>` kept alongside the background, so the image can be
/// dragged and is exposed to assistive technology.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HiddenImage {
    /// The displayed URI.
    pub src: String,
    /// Alternative text.
    pub alt: String,
    /// Whether dragging is enabled.
    pub draggable: bool,
}

/// The generated tint filter definition: flood the tint color, then keep it
/// only where the source is opaque.
///
/// ```text
/// <filter id="tint-N">
///   <feFlood flood-color="{color}" />
///   <feComposite in2="SourceAlpha" operator="in" />
/// </filter>
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TintFilter {
    /// The id referenced from the filter chain.
    pub id: FilterId,
    /// The flood color.
    pub color: String,
}

/// Description of the root node for the composition layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderedImage {
    /// The attached host node, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root: Option<HostNodeId>,
    /// Attributes of the root node.
    pub attributes: BTreeMap<String, String>,
    /// Style declarations forwarded untouched.
    pub style: BTreeMap<String, serde_json::Value>,
    /// Derived presentation.
    pub presentation: PresentationParams,
    /// The URI currently shown, primary or default.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_uri: Option<String>,
    /// `background-image` value.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub background_image: Option<String>,
    /// Intrinsic size of the primary source, used as the default box size.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intrinsic_size: Option<Size>,
    /// Hidden `<img>` description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hidden_image: Option<HiddenImage>,
    /// Tint filter definition.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tint_filter: Option<TintFilter>,
    /// Whether the root box should be measured and reported through
    /// [`Image::handle_layout`].
    pub wants_layout: bool,
}

/// `(effective resize mode, has on_layout)`: a change of either means the
/// root has to be measured again.
type LayoutKey = (ResizeMode, bool);

fn layout_key(props: &ImageProps) -> LayoutKey {
    (props.effective_resize_mode(), props.on_layout.is_some())
}

const fn wants_layout((mode, has_on_layout): LayoutKey) -> bool {
    mode.needs_layout() || has_on_layout
}

/// One mounted image.
pub struct Image {
    props: ImageProps,
    context: ImageContext,
    filter_id: FilterId,
    coordinator: LoadCoordinator,
    layout: Option<LayoutRect>,
    layout_key: LayoutKey,
    needs_measure: bool,
    root: Option<HostNodeId>,
}

impl Image {
    /// Mount an image and start loading its source.
    ///
    /// A source the loader already has starts `Loaded`, without a load or
    /// any lifecycle callback.
    ///
    /// # Errors
    ///
    /// Returns [`AssetNotFoundError`] if `source` is an unregistered handle.
    pub fn mount(props: ImageProps, context: ImageContext) -> Result<Self, AssetNotFoundError> {
        let request = resolve_request(
            props.source.as_ref(),
            &*context.registry,
            &context.environment,
        )?;

        let coordinator = LoadCoordinator::new(request.as_ref(), &*context.loader.borrow());
        coordinator.set_handlers(props.handlers());
        let key = layout_key(&props);

        let mut image = Self {
            props,
            context,
            filter_id: FilterId::allocate(),
            coordinator,
            layout: None,
            layout_key: key,
            needs_measure: wants_layout(key),
            root: None,
        };
        let _ = image
            .coordinator
            .sync(request.as_ref(), &mut *image.context.loader.borrow_mut());
        Ok(image)
    }

    /// Apply new props.
    ///
    /// A load is issued only if the resolved URI changed; the previous
    /// request is aborted first. New callbacks take effect immediately,
    /// including for a load already in flight.
    ///
    /// # Errors
    ///
    /// Returns [`AssetNotFoundError`] if the new `source` is an unregistered
    /// handle. The image keeps its previous props in that case.
    pub fn update(&mut self, props: ImageProps) -> Result<(), AssetNotFoundError> {
        let request = resolve_request(
            props.source.as_ref(),
            &*self.context.registry,
            &self.context.environment,
        )?;

        self.coordinator.set_handlers(props.handlers());
        let key = layout_key(&props);
        if key != self.layout_key {
            self.layout_key = key;
            self.needs_measure = wants_layout(key);
        }
        self.props = props;

        let _ = self
            .coordinator
            .sync(request.as_ref(), &mut *self.context.loader.borrow_mut());
        Ok(())
    }

    /// Describe the root node for the current props and load state.
    ///
    /// Deprecated style usage is reported to the context's warnings here.
    ///
    /// # Errors
    ///
    /// Returns [`AssetNotFoundError`] if the displayed source, or the
    /// primary source's dimensions, need an unregistered handle.
    pub fn render(&self) -> Result<RenderedImage, AssetNotFoundError> {
        let props = &self.props;
        let registry = &*self.context.registry;

        let presentation = derive_presentation(&self.presentation_input());
        for deprecation in &presentation.deprecations {
            let _ = self
                .context
                .warnings
                .warn_once(deprecation.key(), deprecation.message());
        }

        let displayed = if presentation.display_source {
            props.source.as_ref()
        } else {
            props.default_source.as_ref()
        };
        let display_uri = resolve_uri(displayed, registry, &self.context.environment)?;
        let intrinsic_size = resolve_dimensions(props.source.as_ref(), registry)?;

        let mut attributes = props.attributes.clone();
        if let Some(label) = &props.accessibility_label {
            let _ = attributes.insert("aria-label".to_string(), label.clone());
            let _ = attributes.insert("role".to_string(), "img".to_string());
        }

        let hidden_image = display_uri.as_ref().map(|src| HiddenImage {
            src: src.clone(),
            alt: props.accessibility_label.clone().unwrap_or_default(),
            draggable: props.draggable,
        });
        let tint_filter = presentation.tint_color.as_ref().map(|color| TintFilter {
            id: self.filter_id,
            color: color.clone(),
        });

        Ok(RenderedImage {
            root: self.root,
            attributes,
            style: props.style.rest.clone(),
            background_image: display_uri.as_ref().map(|uri| format!("url(\"{uri}\")")),
            display_uri,
            intrinsic_size,
            hidden_image,
            tint_filter,
            wants_layout: wants_layout(self.layout_key),
            presentation,
        })
    }

    /// Record a measurement of the root box.
    ///
    /// The box is kept, and `on_layout` called, only when something uses
    /// it: a `center`/`repeat` resize mode or an `on_layout` callback.
    pub fn handle_layout(&mut self, event: &LayoutEvent) {
        if !wants_layout(self.layout_key) {
            return;
        }
        self.layout = Some(event.layout);
        self.needs_measure = false;
        if let Some(on_layout) = &self.props.on_layout {
            on_layout(event);
        }
    }

    /// Tear down. Same as dropping the image: the outstanding request is
    /// aborted.
    pub fn unmount(self) {
        drop(self);
    }

    /// Attach the host node the composition layer rendered for this image.
    pub const fn attach_root(&mut self, node: HostNodeId) {
        self.root = Some(node);
    }

    /// The attached host node.
    #[must_use]
    pub const fn root(&self) -> Option<HostNodeId> {
        self.root
    }

    /// Whether the root box has to be measured: set on mount and whenever
    /// the resize mode or the presence of `on_layout` changes, cleared by
    /// [`handle_layout`](Self::handle_layout).
    #[must_use]
    pub const fn needs_measure(&self) -> bool {
        self.needs_measure
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> LoadState {
        self.coordinator.state()
    }

    /// The last kept measurement of the root box.
    #[must_use]
    pub const fn layout(&self) -> Option<LayoutRect> {
        self.layout
    }

    /// This image's tint filter id.
    #[must_use]
    pub const fn filter_id(&self) -> FilterId {
        self.filter_id
    }

    /// Handle of the outstanding request, if any.
    #[must_use]
    pub const fn pending_request(&self) -> Option<RequestHandle> {
        self.coordinator.pending()
    }

    /// Current props.
    #[must_use]
    pub const fn props(&self) -> &ImageProps {
        &self.props
    }

    /// Presentation for the current state, without describing the root.
    #[must_use]
    pub fn presentation(&self) -> PresentationParams {
        derive_presentation(&self.presentation_input())
    }

    fn presentation_input(&self) -> PresentationInput<'_> {
        PresentationInput {
            style: &self.props.style,
            resize_mode: self.props.resize_mode,
            tint_color: self.props.tint_color.as_deref(),
            blur_radius: self.props.blur_radius,
            state: self.coordinator.state(),
            has_default_source: self.props.default_source.is_some(),
            natural_size: self.coordinator.natural_size(),
            layout: self.layout,
            filter_id: self.filter_id,
        }
    }
}

impl Drop for Image {
    fn drop(&mut self) {
        // Dropped from inside a loader callback: the request already settled
        // or its callback only holds a weak reference, so nothing leaks.
        let Ok(mut loader) = self.context.loader.try_borrow_mut() else {
            log::debug!(target: "petal::image", "loader busy, skipping abort on drop");
            return;
        };
        self.coordinator.release(&mut *loader);
    }
}

impl fmt::Debug for Image {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Image")
            .field("props", &self.props)
            .field("filter_id", &self.filter_id)
            .field("coordinator", &self.coordinator)
            .field("layout", &self.layout)
            .field("root", &self.root)
            .finish_non_exhaustive()
    }
}
