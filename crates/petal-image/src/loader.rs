//! The image loader seam.
//!
//! The core never fetches anything itself. It asks an [`ImageLoader`] to
//! start a load, hands it a callback, and keeps the returned
//! [`RequestHandle`] so the load can be aborted when the source changes or
//! the image goes away.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::rc::Rc;

use serde::Serialize;
use strum_macros::{AsRefStr, Display, EnumString};
use thiserror::Error;

use crate::events::LoadEvent;
use crate::geometry::Size;
use crate::source::ImageRequest;

/// Identifies one load issued by a loader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct RequestHandle(u64);

impl RequestHandle {
    /// Wrap a loader-assigned id.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// The loader-assigned id.
    #[must_use]
    pub const fn id(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RequestHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Why a load failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    /// The resource could not be retrieved.
    #[error("{0}")]
    Network(String),
    /// The server answered with a non-success status code.
    #[error("{0}")]
    Status(u16),
    /// The bytes are not an image the loader understands.
    #[error("unsupported image: {0}")]
    Unsupported(String),
    /// The request asked for a cached copy and there was none.
    #[error("not cached")]
    NotCached,
}

/// Receives the outcome of a load. Called at most once.
pub type LoadCallback = Box<dyn FnOnce(Result<LoadEvent, LoadError>)>;

/// A loader shared by every image of one composition root.
pub type SharedLoader = Rc<RefCell<dyn ImageLoader>>;

/// Where a cached URI lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display, EnumString, AsRefStr)]
pub enum CacheStatus {
    /// Held by the loader's cache.
    #[serde(rename = "disk/memory")]
    #[strum(serialize = "disk/memory")]
    DiskMemory,
}

/// Fetches images on behalf of image components.
///
/// # Contract
///
/// - `load` must not invoke `on_settle` before returning; it is invoked
///   later, on the update thread, at most once.
/// - After `abort(handle)` the callback for `handle` is never invoked.
///   Aborting a settled or already aborted handle does nothing.
/// - A load may never settle. Nothing here enforces a timeout.
pub trait ImageLoader {
    /// Whether `uri` is already loaded and can be shown without waiting.
    fn has(&self, uri: &str) -> bool;

    /// Natural size of an already loaded `uri`, if known.
    fn cached_size(&self, _uri: &str) -> Option<Size> {
        None
    }

    /// Begin loading `request`.
    fn load(&mut self, request: &ImageRequest, on_settle: LoadCallback) -> RequestHandle;

    /// Stop caring about `handle`.
    fn abort(&mut self, handle: RequestHandle);

    /// Load `uri` only to learn its natural size.
    fn get_size(
        &mut self,
        uri: &str,
        on_size: Box<dyn FnOnce(Result<Size, LoadError>)>,
    ) -> RequestHandle {
        self.load(
            &ImageRequest::new(uri),
            Box::new(move |outcome| {
                on_size(outcome.and_then(|event| {
                    event
                        .size
                        .ok_or_else(|| LoadError::Unsupported("size unknown".to_string()))
                }));
            }),
        )
    }

    /// Warm the cache for `uri`. `on_done` receives whether it succeeded.
    fn prefetch(&mut self, uri: &str, on_done: Box<dyn FnOnce(bool)>) -> RequestHandle {
        self.load(
            &ImageRequest::new(uri),
            Box::new(move |outcome| on_done(outcome.is_ok())),
        )
    }

    /// Cache status of every cached URI among `uris`. Uncached URIs are
    /// left out.
    fn query_cache(&self, uris: &[&str]) -> BTreeMap<String, CacheStatus> {
        uris.iter()
            .filter(|uri| self.has(uri))
            .map(|uri| ((*uri).to_string(), CacheStatus::DiskMemory))
            .collect()
    }
}

/// A loader call, as recorded by [`ManualImageLoader`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoaderCall {
    /// `load` was called.
    Load {
        /// The handle that was returned.
        handle: RequestHandle,
        /// The requested URI.
        uri: String,
    },
    /// `abort` was called.
    Abort(RequestHandle),
}

/// A loader that settles requests only when told to.
///
/// Hosts that drive fetching themselves (and tests) use it to decide
/// exactly when, and how, each load completes. Every call is recorded.
#[derive(Default)]
pub struct ManualImageLoader {
    next_id: u64,
    cached: HashMap<String, Option<Size>>,
    pending: BTreeMap<RequestHandle, (ImageRequest, LoadCallback)>,
    calls: Vec<LoaderCall>,
}

impl ManualImageLoader {
    /// A loader with an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `uri` as already loaded.
    pub fn insert_cached(&mut self, uri: impl Into<String>, size: Option<Size>) {
        let _ = self.cached.insert(uri.into(), size);
    }

    /// Every call so far, in order.
    #[must_use]
    pub fn calls(&self) -> &[LoaderCall] {
        &self.calls
    }

    /// Handles that are neither settled nor aborted.
    #[must_use]
    pub fn live_requests(&self) -> Vec<RequestHandle> {
        self.pending.keys().copied().collect()
    }

    /// The request behind a live handle.
    #[must_use]
    pub fn request(&self, handle: RequestHandle) -> Option<&ImageRequest> {
        self.pending.get(&handle).map(|(request, _)| request)
    }

    /// The most recently issued handle.
    #[must_use]
    pub fn last_handle(&self) -> Option<RequestHandle> {
        self.calls.iter().rev().find_map(|call| match call {
            LoaderCall::Load { handle, .. } => Some(*handle),
            LoaderCall::Abort(_) => None,
        })
    }

    /// Complete `handle` successfully. Returns `false` if it was not live.
    pub fn succeed(&mut self, handle: RequestHandle, size: Option<Size>) -> bool {
        let Some((request, on_settle)) = self.pending.remove(&handle) else {
            return false;
        };
        let _ = self.cached.insert(request.uri.clone(), size);
        on_settle(Ok(LoadEvent::new(request.uri, size)));
        true
    }

    /// Fail `handle` with `error`. Returns `false` if it was not live.
    pub fn fail(&mut self, handle: RequestHandle, error: LoadError) -> bool {
        let Some((_, on_settle)) = self.pending.remove(&handle) else {
            return false;
        };
        on_settle(Err(error));
        true
    }
}

impl ImageLoader for ManualImageLoader {
    fn has(&self, uri: &str) -> bool {
        self.cached.contains_key(uri)
    }

    fn cached_size(&self, uri: &str) -> Option<Size> {
        self.cached.get(uri).copied().flatten()
    }

    fn load(&mut self, request: &ImageRequest, on_settle: LoadCallback) -> RequestHandle {
        self.next_id += 1;
        let handle = RequestHandle::new(self.next_id);
        let _ = self
            .pending
            .insert(handle, (request.clone(), on_settle));
        self.calls.push(LoaderCall::Load {
            handle,
            uri: request.uri.clone(),
        });
        handle
    }

    fn abort(&mut self, handle: RequestHandle) {
        let _ = self.pending.remove(&handle);
        self.calls.push(LoaderCall::Abort(handle));
    }
}

impl fmt::Debug for ManualImageLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManualImageLoader")
            .field("cached", &self.cached)
            .field("pending", &self.pending.keys().collect::<Vec<_>>())
            .field("calls", &self.calls)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_aborted_request_never_settles() {
        let mut loader = ManualImageLoader::new();
        let settled = Rc::new(RefCell::new(0));
        let counter = Rc::clone(&settled);
        let handle = loader.load(
            &ImageRequest::new("a.png"),
            Box::new(move |_| *counter.borrow_mut() += 1),
        );

        loader.abort(handle);
        loader.abort(handle);

        assert!(!loader.succeed(handle, None));
        assert_eq!(*settled.borrow(), 0);
        assert_eq!(
            loader.calls(),
            &[
                LoaderCall::Load {
                    handle,
                    uri: "a.png".to_string()
                },
                LoaderCall::Abort(handle),
                LoaderCall::Abort(handle),
            ]
        );
    }

    #[test]
    fn test_success_populates_cache() {
        let mut loader = ManualImageLoader::new();
        let handle = loader.load(&ImageRequest::new("a.png"), Box::new(|_| {}));
        assert!(!loader.has("a.png"));

        assert!(loader.succeed(handle, Some(Size::new(2.0, 3.0))));
        assert!(loader.has("a.png"));
        assert_eq!(loader.cached_size("a.png"), Some(Size::new(2.0, 3.0)));
        assert!(loader.live_requests().is_empty());
    }

    #[test]
    fn test_get_size_reports_size_or_error() {
        let mut loader = ManualImageLoader::new();
        let sizes = Rc::new(RefCell::new(Vec::new()));

        let sink = Rc::clone(&sizes);
        let ok = loader.get_size("a.png", Box::new(move |r| sink.borrow_mut().push(r)));
        let sink = Rc::clone(&sizes);
        let unknown = loader.get_size("b.png", Box::new(move |r| sink.borrow_mut().push(r)));

        assert!(loader.succeed(ok, Some(Size::new(5.0, 6.0))));
        assert!(loader.succeed(unknown, None));

        let sizes = sizes.borrow();
        assert_eq!(sizes[0], Ok(Size::new(5.0, 6.0)));
        assert!(matches!(sizes[1], Err(LoadError::Unsupported(_))));
    }

    #[test]
    fn test_prefetch_and_query_cache() {
        let mut loader = ManualImageLoader::new();
        let done = Rc::new(RefCell::new(None));
        let sink = Rc::clone(&done);
        let handle = loader.prefetch("a.png", Box::new(move |ok| *sink.borrow_mut() = Some(ok)));
        assert!(loader.succeed(handle, None));
        assert_eq!(*done.borrow(), Some(true));

        let status = loader.query_cache(&["a.png", "b.png"]);
        assert_eq!(status.len(), 1);
        assert_eq!(status.get("a.png"), Some(&CacheStatus::DiskMemory));
        assert_eq!(CacheStatus::DiskMemory.to_string(), "disk/memory");
    }
}
