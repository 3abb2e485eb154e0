//! Lifecycle and rendering tests for the image component, driven through
//! a [`ManualImageLoader`].

use std::cell::RefCell;
use std::rc::Rc;

use petal_common::warning::{OnceWarnings, RecordingSink};
use petal_image::asset::{AssetManifest, AssetMap};
use petal_image::events::LayoutEvent;
use petal_image::geometry::{HostNodeId, LayoutRect, Size};
use petal_image::loader::{LoaderCall, ManualImageLoader};
use petal_image::presentation::{BackgroundSize, ImageStyle};
use petal_image::resolve::ImageEnvironment;
use petal_image::source::AssetId;
use petal_image::{
    Image, ImageContext, ImageProps, LoadError, LoadState, ResizeMode, Source, SourceDescriptor,
};

type EventLog = Rc<RefCell<Vec<String>>>;
type Loader = Rc<RefCell<ManualImageLoader>>;

fn loader() -> Loader {
    Rc::new(RefCell::new(ManualImageLoader::new()))
}

fn context(loader: &Loader) -> ImageContext {
    ImageContext::new(Rc::new(AssetMap::new()), loader.clone())
        .with_warnings(Rc::new(OnceWarnings::silent()))
}

/// Props for `source` whose callbacks append to `log`.
fn recorded(source: impl Into<Source>, log: &EventLog) -> ImageProps {
    let start = Rc::clone(log);
    let load = Rc::clone(log);
    let error = Rc::clone(log);
    let end = Rc::clone(log);
    ImageProps::new(source)
        .on_load_start(move || start.borrow_mut().push("start".to_string()))
        .on_load(move |e| load.borrow_mut().push(format!("load {}", e.uri)))
        .on_error(move |e| error.borrow_mut().push(format!("error {}", e.error)))
        .on_load_end(move |e| end.borrow_mut().push(format!("end {} {}", e.uri, e.state)))
}

#[test]
fn test_cached_source_mounts_loaded_without_events() {
    let loader = loader();
    loader.borrow_mut().insert_cached("https://example.com/a.png", Some(Size::new(4.0, 3.0)));
    let log = EventLog::default();

    let image = Image::mount(
        recorded("https://example.com/a.png", &log),
        context(&loader),
    )
    .unwrap();

    assert_eq!(image.state(), LoadState::Loaded);
    assert!(loader.borrow().calls().is_empty());
    assert!(log.borrow().is_empty());
    assert_eq!(image.pending_request(), None);
}

#[test]
fn test_successful_load_fires_start_load_end() {
    let loader = loader();
    let log = EventLog::default();
    let image = Image::mount(recorded("a.png", &log), context(&loader)).unwrap();
    assert_eq!(image.state(), LoadState::Loading);

    let handle = image.pending_request().unwrap();
    assert!(loader.borrow_mut().succeed(handle, Some(Size::new(10.0, 10.0))));

    assert_eq!(image.state(), LoadState::Loaded);
    assert_eq!(
        *log.borrow(),
        vec!["start", "load a.png", "end a.png loaded"]
    );
}

#[test]
fn test_failed_load_fires_error_then_end_once() {
    let loader = loader();
    let log = EventLog::default();
    let image = Image::mount(recorded("a.png", &log), context(&loader)).unwrap();

    let handle = image.pending_request().unwrap();
    assert!(loader.borrow_mut().fail(handle, LoadError::Network("connection refused".to_string())));
    assert!(!loader.borrow_mut().fail(handle, LoadError::Status(500)));

    assert_eq!(image.state(), LoadState::Errored);
    assert_eq!(
        *log.borrow(),
        vec![
            "start",
            "error Failed to load resource a.png (connection refused)",
            "end a.png errored",
        ]
    );
}

#[test]
fn test_source_change_aborts_before_loading_again() {
    let loader = loader();
    let log = EventLog::default();
    let mut image = Image::mount(recorded("a.png", &log), context(&loader)).unwrap();
    let first = image.pending_request().unwrap();

    image.update(recorded("b.png", &log)).unwrap();
    let second = image.pending_request().unwrap();

    assert_eq!(
        loader.borrow().calls(),
        &[
            LoaderCall::Load {
                handle: first,
                uri: "a.png".to_string()
            },
            LoaderCall::Abort(first),
            LoaderCall::Load {
                handle: second,
                uri: "b.png".to_string()
            },
        ]
    );

    // The stale request can no longer settle.
    assert!(!loader.borrow_mut().succeed(first, None));
    assert!(loader.borrow_mut().succeed(second, None));
    assert_eq!(
        *log.borrow(),
        vec!["start", "start", "load b.png", "end b.png loaded"]
    );
}

#[test]
fn test_same_uri_update_issues_no_load() {
    let loader = loader();
    let log = EventLog::default();
    let mut image = Image::mount(recorded("a.png", &log), context(&loader)).unwrap();

    let descriptor = SourceDescriptor::new("a.png").with_size(10.0, 10.0);
    image.update(recorded(descriptor, &log)).unwrap();

    assert_eq!(loader.borrow().calls().len(), 1);
    assert_eq!(*log.borrow(), vec!["start"]);
}

#[test]
fn test_replaced_handlers_apply_to_inflight_load() {
    let loader = loader();
    let old = EventLog::default();
    let new = EventLog::default();
    let mut image = Image::mount(recorded("a.png", &old), context(&loader)).unwrap();
    let handle = image.pending_request().unwrap();

    image.update(recorded("a.png", &new)).unwrap();
    assert!(loader.borrow_mut().succeed(handle, None));

    assert_eq!(*old.borrow(), vec!["start"]);
    assert_eq!(*new.borrow(), vec!["load a.png", "end a.png loaded"]);
}

#[test]
fn test_unmount_aborts_outstanding_request() {
    let loader = loader();
    let log = EventLog::default();
    let image = Image::mount(recorded("a.png", &log), context(&loader)).unwrap();
    let handle = image.pending_request().unwrap();

    image.unmount();

    assert_eq!(loader.borrow().calls().last(), Some(&LoaderCall::Abort(handle)));
    assert!(loader.borrow().live_requests().is_empty());
    assert_eq!(*log.borrow(), vec!["start"]);
}

#[test]
fn test_dropped_image_aborts_and_ignores_late_result() {
    let loader = loader();
    let log = EventLog::default();
    let image = Image::mount(recorded("a.png", &log), context(&loader)).unwrap();
    let handle = image.pending_request().unwrap();

    drop(image);

    // Dropping without unmount still releases the request.
    assert_eq!(loader.borrow().calls().last(), Some(&LoaderCall::Abort(handle)));
    assert!(loader.borrow().live_requests().is_empty());
    assert!(!loader.borrow_mut().succeed(handle, None));
    assert_eq!(*log.borrow(), vec!["start"]);
}

#[test]
fn test_default_source_shown_until_loaded() {
    let loader = loader();
    let props = ImageProps::default().with_default_source("fallback.png");
    let mut image = Image::mount(props, context(&loader)).unwrap();

    assert_eq!(image.state(), LoadState::Idle);
    assert!(loader.borrow().calls().is_empty());
    let rendered = image.render().unwrap();
    assert_eq!(rendered.display_uri.as_deref(), Some("fallback.png"));
    assert_eq!(
        rendered.background_image.as_deref(),
        Some("url(\"fallback.png\")")
    );

    let props = ImageProps::new("a.png").with_default_source("fallback.png");
    image.update(props).unwrap();
    assert_eq!(image.state(), LoadState::Loading);
    assert_eq!(
        image.render().unwrap().display_uri.as_deref(),
        Some("fallback.png")
    );

    assert!(loader.borrow_mut().succeed(image.pending_request().unwrap(), None));
    assert_eq!(image.render().unwrap().display_uri.as_deref(), Some("a.png"));
}

#[test]
fn test_loading_without_default_shows_source() {
    let loader = loader();
    let image = Image::mount(ImageProps::new("a.png"), context(&loader)).unwrap();
    let rendered = image.render().unwrap();
    assert_eq!(rendered.display_uri.as_deref(), Some("a.png"));
    assert_eq!(
        rendered.hidden_image.map(|hidden| hidden.src),
        Some("a.png".to_string())
    );
}

#[test]
fn test_deprecated_style_warns_once_per_key() {
    let sink = Rc::new(RecordingSink::new());
    let warnings = Rc::new(OnceWarnings::new(Rc::clone(&sink)));
    let loader = loader();
    let ctx = ImageContext::new(Rc::new(AssetMap::new()), loader.clone()).with_warnings(warnings);
    let style = ImageStyle {
        resize_mode: Some(ResizeMode::Contain),
        tint_color: Some("red".to_string()),
        ..ImageStyle::default()
    };

    let first = Image::mount(
        ImageProps::new("a.png").with_style(style.clone()),
        ctx.clone(),
    )
    .unwrap();
    let second = Image::mount(ImageProps::new("b.png").with_style(style), ctx).unwrap();

    let _ = first.render().unwrap();
    let _ = first.render().unwrap();
    let rendered = second.render().unwrap();

    let keys: Vec<_> = sink.records().into_iter().map(|(key, _)| key).collect();
    assert_eq!(keys, vec!["Image.style.resizeMode", "Image.style.tintColor"]);
    assert_eq!(rendered.presentation.resize_mode, ResizeMode::Contain);
    assert_eq!(rendered.presentation.tint_color.as_deref(), Some("red"));
}

#[test]
fn test_tint_references_own_filter() {
    let loader = loader();
    let a = Image::mount(
        ImageProps::new("a.png").with_tint_color("#f00"),
        context(&loader),
    )
    .unwrap();
    let b = Image::mount(
        ImageProps::new("b.png").with_tint_color("#0f0"),
        context(&loader),
    )
    .unwrap();
    assert_ne!(a.filter_id(), b.filter_id());

    let rendered = a.render().unwrap();
    let tint = rendered.tint_filter.unwrap();
    assert_eq!(tint.id, a.filter_id());
    assert_eq!(tint.color, "#f00");
    assert_eq!(
        rendered.presentation.filter_css(),
        Some(format!("url(#{})", a.filter_id()))
    );
}

#[test]
fn test_center_mode_sizes_background_from_layout() {
    let loader = loader();
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    let props = ImageProps::new("a.png")
        .with_resize_mode(ResizeMode::Center)
        .on_layout(move |e| sink.borrow_mut().push(e.layout));
    let mut image = Image::mount(props, context(&loader)).unwrap();
    assert!(image.needs_measure());
    assert!(loader.borrow_mut().succeed(image.pending_request().unwrap(), Some(Size::new(400.0, 200.0))));

    let layout = LayoutRect::sized(100.0, 100.0);
    image.handle_layout(&LayoutEvent::new(layout));

    assert!(!image.needs_measure());
    assert_eq!(*seen.borrow(), vec![layout]);
    let rendered = image.render().unwrap();
    assert!(rendered.wants_layout);
    assert_eq!(
        rendered.presentation.background.size,
        BackgroundSize::Pixels(Size::new(100.0, 50.0))
    );
}

#[test]
fn test_layout_ignored_when_nothing_uses_it() {
    let loader = loader();
    let mut image = Image::mount(ImageProps::new("a.png"), context(&loader)).unwrap();
    assert!(!image.needs_measure());

    image.handle_layout(&LayoutEvent::new(LayoutRect::sized(50.0, 50.0)));
    assert_eq!(image.layout(), None);
    assert!(!image.render().unwrap().wants_layout);

    image
        .update(ImageProps::new("a.png").with_resize_mode(ResizeMode::Repeat))
        .unwrap();
    assert!(image.needs_measure());
}

#[test]
fn test_asset_handle_resolves_for_device_scale() {
    let mut assets = AssetMap::new();
    let id = assets.register(
        AssetManifest::new("/assets", "logo", "png")
            .with_scales(&[1.0, 2.0, 3.0])
            .with_size(24.0, 12.0),
    );
    let loader = loader();
    let ctx = ImageContext::new(Rc::new(assets), loader.clone())
        .with_environment(ImageEnvironment { device_pixel_ratio: 2.4 });

    let image = Image::mount(ImageProps::new(id), ctx.clone()).unwrap();
    assert_eq!(
        loader.borrow().calls(),
        &[LoaderCall::Load {
            handle: image.pending_request().unwrap(),
            uri: "/assets/logo@2x.png".to_string()
        }]
    );
    assert_eq!(
        image.render().unwrap().intrinsic_size,
        Some(Size::new(24.0, 12.0))
    );

    let missing = Image::mount(ImageProps::new(AssetId(99)), ctx).unwrap_err();
    assert_eq!(missing.id, AssetId(99));
}

#[test]
fn test_accessibility_and_forwarded_attributes() {
    let loader = loader();
    let mut props = ImageProps::new("a.png");
    props.accessibility_label = Some("A red flower".to_string());
    props.draggable = true;
    let _ = props
        .attributes
        .insert("data-testid".to_string(), "hero".to_string());

    let mut image = Image::mount(props, context(&loader)).unwrap();
    image.attach_root(HostNodeId(3));
    let rendered = image.render().unwrap();

    assert_eq!(rendered.root, Some(HostNodeId(3)));
    assert_eq!(rendered.attributes["aria-label"], "A red flower");
    assert_eq!(rendered.attributes["role"], "img");
    assert_eq!(rendered.attributes["data-testid"], "hero");
    let hidden = rendered.hidden_image.unwrap();
    assert_eq!(hidden.alt, "A red flower");
    assert!(hidden.draggable);
}
