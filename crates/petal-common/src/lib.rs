//! Common utilities for the Petal image primitive.
//!
//! This crate provides shared infrastructure used by the image crates:
//! - **Warnings** - once-per-key deprecation warnings routed to an injected sink
//! - **URIs** - `data:` URL parsing and SVG data-URI escaping
//! - **Networking** - blocking HTTP fetches carrying request options

pub mod net;
pub mod url;
pub mod warning;
