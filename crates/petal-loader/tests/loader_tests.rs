//! End-to-end tests for `FetchImageLoader`, using `data:` URLs and local
//! files only.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use petal_common::net::DataUrl;
use petal_image::asset::AssetMap;
use petal_image::events::{LayoutEvent, LoadEvent};
use petal_image::geometry::{LayoutRect, Size};
use petal_image::presentation::BackgroundSize;
use petal_image::source::{CachePolicy, ImageRequest};
use petal_image::{
    Image, ImageContext, ImageLoader, ImageProps, LoadError, LoadState, ResizeMode,
};
use petal_loader::{FetchConfig, FetchImageLoader};

const PNG_1X1: &str = "data:image/png;base64,iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNkYPhfDwAChwGA60e6kgAAAABJRU5ErkJggg==";
const WAIT: Duration = Duration::from_secs(10);

type Outcomes = Rc<RefCell<Vec<Result<LoadEvent, LoadError>>>>;

fn loader() -> FetchImageLoader {
    FetchImageLoader::new(&FetchConfig::default()).unwrap()
}

fn shared_loader() -> Rc<RefCell<FetchImageLoader>> {
    Rc::new(RefCell::new(loader()))
}

fn context(loader: &Rc<RefCell<FetchImageLoader>>) -> ImageContext {
    ImageContext::new(Rc::new(AssetMap::new()), loader.clone())
}

fn load(loader: &mut FetchImageLoader, request: &ImageRequest, outcomes: &Outcomes) {
    let sink = Rc::clone(outcomes);
    let _ = loader.load(request, Box::new(move |r| sink.borrow_mut().push(r)));
}

fn temp_png(name: &str) -> String {
    let path = std::env::temp_dir().join(format!("petal-{}-{name}.png", std::process::id()));
    let bytes = DataUrl::parse(PNG_1X1).unwrap().decode().unwrap();
    std::fs::write(&path, bytes).unwrap();
    path.to_string_lossy().into_owned()
}

#[test]
fn test_data_url_png_reports_natural_size() {
    let mut loader = loader();
    let outcomes = Outcomes::default();
    load(&mut loader, &ImageRequest::new(PNG_1X1), &outcomes);

    assert!(loader.pump_until_idle(WAIT));
    assert_eq!(
        *outcomes.borrow(),
        vec![Ok(LoadEvent::new(PNG_1X1, Some(Size::new(1.0, 1.0))))]
    );
}

#[test]
fn test_svg_data_uri_is_probed_after_escaping() {
    let mut loader = loader();
    let outcomes = Outcomes::default();
    let uri = "data:image/svg+xml;utf8,%3Csvg%20xmlns%3D%22http%3A%2F%2Fwww.w3.org%2F2000%2Fsvg%22%20width%3D%2232%22%20height%3D%2216%22%3E%3C%2Fsvg%3E";
    load(&mut loader, &ImageRequest::new(uri), &outcomes);

    assert!(loader.pump_until_idle(WAIT));
    assert_eq!(
        outcomes.borrow()[0].as_ref().map(|event| event.size),
        Ok(Some(Size::new(32.0, 16.0)))
    );
}

#[test]
fn test_file_is_cached_after_load() {
    let path = temp_png("cached");
    let mut loader = loader();
    let outcomes = Outcomes::default();
    assert!(!loader.has(&path));

    load(&mut loader, &ImageRequest::new(path.clone()), &outcomes);
    assert!(loader.pump_until_idle(WAIT));
    assert!(loader.has(&path));
    assert_eq!(loader.cached_size(&path), Some(Size::new(1.0, 1.0)));

    // Served from the cache even though the file is gone.
    std::fs::remove_file(&path).unwrap();
    load(&mut loader, &ImageRequest::new(path.clone()), &outcomes);
    assert_eq!(loader.pump(), 1);
    assert!(outcomes.borrow()[1].is_ok());

    // A reload goes back to the source.
    let mut reload = ImageRequest::new(path);
    reload.cache = CachePolicy::Reload;
    load(&mut loader, &reload, &outcomes);
    assert!(loader.pump_until_idle(WAIT));
    assert!(matches!(outcomes.borrow()[2], Err(LoadError::Network(_))));
}

#[test]
fn test_aborted_request_is_never_delivered() {
    let mut loader = loader();
    let outcomes = Outcomes::default();
    let sink = Rc::clone(&outcomes);
    let handle = loader.load(
        &ImageRequest::new(PNG_1X1),
        Box::new(move |r| sink.borrow_mut().push(r)),
    );
    loader.abort(handle);

    assert!(loader.pump_until_idle(WAIT));
    assert_eq!(loader.outstanding(), 0);
    assert!(outcomes.borrow().is_empty());
}

#[test]
fn test_image_reports_missing_file() {
    let loader = shared_loader();
    let errors = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&errors);
    let props =
        ImageProps::new("/nonexistent/petal/missing.png").on_error(move |e| sink.borrow_mut().push(e.error.clone()));
    let image = Image::mount(props, context(&loader)).unwrap();

    assert_eq!(image.state(), LoadState::Loading);
    assert!(loader.borrow_mut().pump_until_idle(WAIT));
    assert_eq!(image.state(), LoadState::Errored);

    let errors = errors.borrow();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].starts_with("Failed to load resource /nonexistent/petal/missing.png ("));
}

#[test]
fn test_image_with_data_uri_mounts_loaded() {
    let loader = shared_loader();
    let image = Image::mount(ImageProps::new(PNG_1X1), context(&loader)).unwrap();

    assert_eq!(image.state(), LoadState::Loaded);
    assert_eq!(loader.borrow().outstanding(), 0);
}

#[test]
fn test_centered_data_uri_uses_inline_size() {
    let loader = shared_loader();
    let props = ImageProps::new(PNG_1X1).with_resize_mode(ResizeMode::Center);
    let mut image = Image::mount(props, context(&loader)).unwrap();
    image.handle_layout(&LayoutEvent::new(LayoutRect::sized(100.0, 100.0)));

    assert_eq!(image.state(), LoadState::Loaded);
    let presentation = image.presentation();
    assert_eq!(
        presentation.background_size_override,
        Some(Size::new(1.0, 1.0))
    );
    assert_eq!(
        presentation.background.size,
        BackgroundSize::Pixels(Size::new(1.0, 1.0))
    );
}

#[test]
fn test_dropped_image_releases_fetch() {
    let loader = shared_loader();
    let path = temp_png("dropped");
    let image = Image::mount(ImageProps::new(path.clone()), context(&loader)).unwrap();
    assert_eq!(loader.borrow().outstanding(), 1);

    drop(image);
    assert_eq!(loader.borrow().outstanding(), 0);
    assert!(loader.borrow_mut().pump_until_idle(WAIT));
    assert!(!loader.borrow().has(&path));
    std::fs::remove_file(path).unwrap();
}
