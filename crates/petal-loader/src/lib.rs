//! A concrete image loader for Petal.
//!
//! # Scope
//!
//! This crate provides:
//! - **Fetching** - HTTP (with request method, headers, body, and cache
//!   policy), `data:` URLs, and local files
//! - **Size Probing** - natural dimensions read from raster headers or the
//!   SVG viewport, without rasterizing
//! - **Caching** - a bounded LRU record of loaded URIs
//! - **Delivery** - results handed back on the owner's thread by
//!   [`FetchImageLoader::pump`]
//!
//! # Not Yet Implemented
//!
//! - Decoded pixel caching (only URIs and sizes are remembered)
//! - Cancelling a fetch already running on a worker thread; its result is
//!   discarded instead

pub mod fetch;
pub mod image_loader;
pub mod uri_cache;

pub use fetch::{FetchConfig, FetchImageLoader};
pub use image_loader::{ImageFormat, ImageProbePipeline, ProbeError, detect_format};
pub use uri_cache::ImageUriCache;
