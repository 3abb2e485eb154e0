//! The Petal image primitive.
//!
//! # Scope
//!
//! This crate provides:
//! - **Source Resolution** - asset handles, URIs, and request descriptors
//!   turned into a concrete [`ImageRequest`](source::ImageRequest)
//! - **Load Lifecycle** - the `idle → loading → loaded | errored` state
//!   machine, with abort-on-change and stale-result suppression
//! - **Presentation** - background rules, filter chains, and the pixel
//!   override for `center`/`repeat`
//! - **Component** - [`Image`], composing the above for one mounted image
//!
//! Fetching is not done here. A host plugs in an
//! [`ImageLoader`](loader::ImageLoader); `petal-loader` ships one backed by
//! HTTP, `data:` URLs, and files.
//!
//! # Example
//!
//! ```
//! use std::cell::RefCell;
//! use std::rc::Rc;
//!
//! use petal_image::{Image, ImageContext, ImageProps, LoadState};
//! use petal_image::asset::AssetMap;
//! use petal_image::loader::ManualImageLoader;
//!
//! let loader = Rc::new(RefCell::new(ManualImageLoader::new()));
//! let context = ImageContext::new(Rc::new(AssetMap::new()), loader.clone());
//! let image = Image::mount(ImageProps::new("https://example.com/a.png"), context)
//!     .expect("plain URIs always resolve");
//!
//! assert_eq!(image.state(), LoadState::Loading);
//! drop(image);
//! assert!(loader.borrow().live_requests().is_empty());
//! ```

pub mod asset;
pub mod component;
pub mod error;
pub mod events;
pub mod geometry;
pub mod loader;
pub mod presentation;
pub mod resolve;
pub mod source;
pub mod state;

pub use component::{HiddenImage, Image, ImageContext, ImageProps, RenderedImage, TintFilter};
pub use error::AssetNotFoundError;
pub use loader::{ImageLoader, LoadError, RequestHandle, SharedLoader};
pub use presentation::ResizeMode;
pub use source::{Source, SourceDescriptor};
pub use state::LoadState;
