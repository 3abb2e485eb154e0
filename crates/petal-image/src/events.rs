//! Payloads delivered to the image's event callbacks.

use std::rc::Rc;

use serde::Serialize;

use crate::geometry::{HostNodeId, LayoutRect, Size};
use crate::loader::LoadError;
use crate::state::LoadState;

/// A shared event callback.
///
/// Callbacks are invoked on the update thread only. They receive shared
/// references; use interior mutability to record anything.
pub type Callback<E> = Rc<dyn Fn(&E)>;

/// Callback without a payload.
pub type Notify = Rc<dyn Fn()>;

/// A successful load.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoadEvent {
    /// The URI that was loaded.
    pub uri: String,
    /// Natural size of the loaded image, if the loader could tell.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<Size>,
}

impl LoadEvent {
    /// Load event for `uri` with a known natural size.
    #[must_use]
    pub fn new(uri: impl Into<String>, size: Option<Size>) -> Self {
        Self {
            uri: uri.into(),
            size,
        }
    }
}

/// A failed load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorEvent {
    /// Diagnostic naming the failed URI.
    pub error: String,
}

impl ErrorEvent {
    /// Diagnostic for `uri` failing with `reason`.
    #[must_use]
    pub fn for_uri(uri: &str, reason: &LoadError) -> Self {
        Self {
            error: format!("Failed to load resource {uri} ({reason})"),
        }
    }
}

/// End of a load, successful or not.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadEndEvent {
    /// The URI whose load ended.
    pub uri: String,
    /// The state the load ended in: `Loaded` or `Errored`.
    pub state: LoadState,
}

/// A layout measurement of the image's root node.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LayoutEvent {
    /// The measured box.
    pub layout: LayoutRect,
    /// The node that was measured.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<HostNodeId>,
    /// When the measurement was taken, in milliseconds.
    pub timestamp: f64,
}

impl LayoutEvent {
    /// A measurement of `layout` with no target and timestamp 0.
    #[must_use]
    pub const fn new(layout: LayoutRect) -> Self {
        Self {
            layout,
            target: None,
            timestamp: 0.0,
        }
    }
}
