//! The load lifecycle of one image.
//!
//! ```text
//!            uri changes             loader: ok
//!   Idle ──────────────────▶ Loading ───────────▶ Loaded
//!                              │  ▲
//!                  loader: err │  │ uri changes
//!                              ▼  │
//!                            Errored
//! ```
//!
//! [`LoadCoordinator`] is keyed on the resolved URI: it only talks to the
//! loader when that URI differs from the one it last acted on. Every
//! request it starts is aborted before the next one starts, and on
//! [`LoadCoordinator::release`].

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use serde::Serialize;
use strum_macros::{AsRefStr, Display};

use crate::events::{Callback, ErrorEvent, LoadEndEvent, LoadEvent, Notify};
use crate::geometry::Size;
use crate::loader::{ImageLoader, LoadError, RequestHandle};
use crate::source::ImageRequest;

/// Fetch progress for the current resolved URI.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Display, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum LoadState {
    /// Nothing has been requested.
    #[default]
    Idle,
    /// A request is in flight.
    Loading,
    /// The current URI loaded.
    Loaded,
    /// The current URI failed to load.
    Errored,
}

/// Lifecycle callbacks. Each is optional.
#[derive(Clone, Default)]
pub struct LoadHandlers {
    /// A load started.
    pub on_load_start: Option<Notify>,
    /// A load succeeded.
    pub on_load: Option<Callback<LoadEvent>>,
    /// A load failed.
    pub on_error: Option<Callback<ErrorEvent>>,
    /// A load ended, after `on_load` or `on_error`.
    pub on_load_end: Option<Callback<LoadEndEvent>>,
}

impl fmt::Debug for LoadHandlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadHandlers")
            .field("on_load_start", &self.on_load_start.is_some())
            .field("on_load", &self.on_load.is_some())
            .field("on_error", &self.on_error.is_some())
            .field("on_load_end", &self.on_load_end.is_some())
            .finish()
    }
}

/// State reachable from loader callbacks.
#[derive(Debug, Default)]
struct Shared {
    state: LoadState,
    natural_size: Option<Size>,
    handlers: LoadHandlers,
}

/// Applies a loader outcome. Borrows are released before any handler runs.
fn settle(shared: &RefCell<Shared>, uri: &str, outcome: Result<LoadEvent, LoadError>) {
    let handlers = {
        let mut shared = shared.borrow_mut();
        match &outcome {
            Ok(event) => {
                shared.state = LoadState::Loaded;
                shared.natural_size = event.size;
            }
            Err(_) => shared.state = LoadState::Errored,
        }
        shared.handlers.clone()
    };

    let state = match outcome {
        Ok(event) => {
            if let Some(on_load) = &handlers.on_load {
                on_load(&event);
            }
            LoadState::Loaded
        }
        Err(reason) => {
            if let Some(on_error) = &handlers.on_error {
                on_error(&ErrorEvent::for_uri(uri, &reason));
            }
            LoadState::Errored
        }
    };

    if let Some(on_load_end) = &handlers.on_load_end {
        on_load_end(&LoadEndEvent {
            uri: uri.to_string(),
            state,
        });
    }
}

/// Owns the load state and the single in-flight request of one image.
#[derive(Debug)]
pub struct LoadCoordinator {
    shared: Rc<RefCell<Shared>>,
    current: Option<String>,
    pending: Option<RequestHandle>,
}

impl LoadCoordinator {
    /// Initial state for an image about to mount with `initial` as its
    /// resolved request.
    ///
    /// If the loader already has the URI the state starts as `Loaded` and
    /// the URI counts as handled: the first [`sync`](Self::sync) issues no
    /// load and fires no events. Otherwise the state starts `Idle`.
    #[must_use]
    pub fn new<L>(initial: Option<&ImageRequest>, loader: &L) -> Self
    where
        L: ImageLoader + ?Sized,
    {
        let mut shared = Shared::default();
        let mut current = None;
        if let Some(request) = initial.filter(|request| loader.has(&request.uri)) {
            shared.state = LoadState::Loaded;
            shared.natural_size = loader.cached_size(&request.uri);
            current = Some(request.uri.clone());
        }
        Self {
            shared: Rc::new(RefCell::new(shared)),
            current,
            pending: None,
        }
    }

    /// Replace the callbacks used by future notifications, including those
    /// of a load already in flight.
    pub fn set_handlers(&self, handlers: LoadHandlers) {
        self.shared.borrow_mut().handlers = handlers;
    }

    /// Bring the lifecycle in line with `request`.
    ///
    /// Does nothing unless the resolved URI differs from the last one acted
    /// on. On a change the outstanding request is aborted; then, if there is
    /// a new URI, the state becomes `Loading`, `on_load_start` fires, and a
    /// new load is issued. A change to "nothing" leaves the state as is.
    ///
    /// Returns `true` if the URI changed.
    pub fn sync<L>(&mut self, request: Option<&ImageRequest>, loader: &mut L) -> bool
    where
        L: ImageLoader + ?Sized,
    {
        let uri = request.map(|request| request.uri.as_str());
        if self.current.as_deref() == uri {
            return false;
        }

        self.abort_pending(loader);
        self.current = uri.map(str::to_string);

        let Some(request) = request else {
            return true;
        };

        let on_load_start = {
            let mut shared = self.shared.borrow_mut();
            shared.state = LoadState::Loading;
            shared.natural_size = None;
            shared.handlers.on_load_start.clone()
        };
        if let Some(on_load_start) = on_load_start {
            on_load_start();
        }

        let weak: Weak<RefCell<Shared>> = Rc::downgrade(&self.shared);
        let uri = request.uri.clone();
        let handle = loader.load(
            request,
            Box::new(move |outcome| {
                if let Some(shared) = weak.upgrade() {
                    settle(&shared, &uri, outcome);
                }
            }),
        );
        self.pending = Some(handle);
        true
    }

    /// Abort the outstanding request, if any. Call when the image goes away.
    pub fn release<L>(&mut self, loader: &mut L)
    where
        L: ImageLoader + ?Sized,
    {
        self.abort_pending(loader);
    }

    fn abort_pending<L>(&mut self, loader: &mut L)
    where
        L: ImageLoader + ?Sized,
    {
        if let Some(handle) = self.pending.take() {
            loader.abort(handle);
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> LoadState {
        self.shared.borrow().state
    }

    /// Natural size reported by the last successful load.
    #[must_use]
    pub fn natural_size(&self) -> Option<Size> {
        self.shared.borrow().natural_size
    }

    /// The resolved URI last acted on.
    #[must_use]
    pub fn current_uri(&self) -> Option<&str> {
        self.current.as_deref()
    }

    /// Handle of the most recent request, until it is aborted.
    #[must_use]
    pub const fn pending(&self) -> Option<RequestHandle> {
        self.pending
    }
}
