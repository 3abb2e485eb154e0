//! An [`ImageLoader`] that fetches on worker threads.
//!
//! Each `load` spawns a thread that fetches the bytes and probes their
//! natural size. Results come back over a channel and are only delivered
//! by [`FetchImageLoader::pump`], called by the owner on the update thread.
//! A result whose request was aborted in the meantime is dropped there.

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender, unbounded};
use petal_common::net::{DataUrl, FetchError, Fetcher, TIMEOUT, USER_AGENT};
use petal_common::url::is_data_uri;
use petal_image::events::LoadEvent;
use petal_image::geometry::Size;
use petal_image::loader::{ImageLoader, LoadCallback, LoadError, RequestHandle};
use petal_image::source::{CachePolicy, ImageRequest};

use crate::image_loader::{ImageProbePipeline, fetch_image_bytes};
use crate::uri_cache::{DEFAULT_CAPACITY, ImageUriCache};

/// Settings for a [`FetchImageLoader`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchConfig {
    /// Per-request HTTP timeout.
    pub timeout: Duration,
    /// `User-Agent` sent with every HTTP request.
    pub user_agent: String,
    /// Number of loaded URIs remembered.
    pub cache_capacity: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout: TIMEOUT,
            user_agent: USER_AGENT.to_string(),
            cache_capacity: DEFAULT_CAPACITY,
        }
    }
}

/// The outcome of one request, tagged with its handle.
struct Completion {
    handle: RequestHandle,
    result: Result<Option<Size>, LoadError>,
}

struct InFlight {
    uri: String,
    on_settle: LoadCallback,
}

fn load_error(error: FetchError) -> LoadError {
    match error {
        FetchError::Status(status) => LoadError::Status(status.as_u16()),
        other => LoadError::Network(other.to_string()),
    }
}

fn fetch_and_probe(
    fetcher: &Fetcher,
    probes: &ImageProbePipeline,
    request: &ImageRequest,
) -> Result<Option<Size>, LoadError> {
    let bytes = fetch_image_bytes(fetcher, request).map_err(load_error)?;
    probes
        .probe(&bytes, &request.uri)
        .map(Some)
        .map_err(|error| LoadError::Unsupported(error.to_string()))
}

/// Loads images from HTTP, `data:` URLs, and local files.
///
/// Not thread-safe itself: create it, call `load`/`abort`/`pump` on one
/// thread. Only the fetching happens elsewhere.
pub struct FetchImageLoader {
    fetcher: Fetcher,
    probes: Arc<ImageProbePipeline>,
    cache: RefCell<ImageUriCache>,
    next_id: u64,
    inflight: HashMap<RequestHandle, InFlight>,
    ready: VecDeque<Completion>,
    sender: Sender<Completion>,
    receiver: Receiver<Completion>,
}

impl FetchImageLoader {
    /// Create a loader with the given settings.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Client`] if the HTTP client cannot be built.
    pub fn new(config: &FetchConfig) -> Result<Self, FetchError> {
        let (sender, receiver) = unbounded();
        Ok(Self {
            fetcher: Fetcher::new(config.timeout, &config.user_agent)?,
            probes: Arc::new(ImageProbePipeline::new()),
            cache: RefCell::new(ImageUriCache::new(config.cache_capacity)),
            next_id: 0,
            inflight: HashMap::new(),
            ready: VecDeque::new(),
            sender,
            receiver,
        })
    }

    /// Deliver every result that has arrived, in arrival order. Returns the
    /// number of callbacks invoked.
    pub fn pump(&mut self) -> usize {
        while let Ok(completion) = self.receiver.try_recv() {
            self.ready.push_back(completion);
        }

        let mut delivered = 0;
        while let Some(Completion { handle, result }) = self.ready.pop_front() {
            let Some(InFlight { uri, on_settle }) = self.inflight.remove(&handle) else {
                log::debug!(target: "petal::loader", "discarding result of aborted request {handle}");
                continue;
            };
            let outcome = match result {
                Ok(size) => {
                    log::debug!(target: "petal::loader", "loaded {uri} ({handle})");
                    self.cache.borrow_mut().insert(uri.clone(), size);
                    Ok(LoadEvent::new(uri, size))
                }
                Err(error) => {
                    log::debug!(target: "petal::loader", "failed {uri} ({handle}): {error}");
                    Err(error)
                }
            };
            on_settle(outcome);
            delivered += 1;
        }
        delivered
    }

    /// Pump until no request is outstanding or `timeout` elapses. Returns
    /// `true` if everything settled.
    pub fn pump_until_idle(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            let _ = self.pump();
            if self.inflight.is_empty() {
                return true;
            }
            let Some(remaining) = deadline.checked_duration_since(Instant::now()) else {
                return false;
            };
            match self.receiver.recv_timeout(remaining) {
                Ok(completion) => self.ready.push_back(completion),
                Err(_) => return false,
            }
        }
    }

    /// Number of requests neither settled nor aborted.
    #[must_use]
    pub fn outstanding(&self) -> usize {
        self.inflight.len()
    }

    fn probe_inline(&self, uri: &str) -> Option<Size> {
        let decoded = DataUrl::parse(uri).and_then(|data| data.decode());
        let bytes = match decoded {
            Ok(bytes) => bytes,
            Err(error) => {
                log::debug!(target: "petal::loader", "unreadable data URI: {error}");
                return None;
            }
        };
        match self.probes.probe(&bytes, uri) {
            Ok(size) => Some(size),
            Err(error) => {
                log::debug!(target: "petal::loader", "cannot size data URI: {error}");
                None
            }
        }
    }

    fn spawn_fetch(&self, handle: RequestHandle, request: ImageRequest) {
        let fetcher = self.fetcher.clone();
        let probes = Arc::clone(&self.probes);
        let sender = self.sender.clone();
        let spawned = thread::Builder::new()
            .name(format!("petal-fetch-{}", handle.id()))
            .spawn(move || {
                let result = fetch_and_probe(&fetcher, &probes, &request);
                // The loader may be gone; nobody is waiting then.
                let _ = sender.send(Completion { handle, result });
            });
        if let Err(error) = spawned {
            log::warn!(target: "petal::loader", "could not spawn fetch thread: {error}");
            let _ = self.sender.send(Completion {
                handle,
                result: Err(LoadError::Network(error.to_string())),
            });
        }
    }
}

impl ImageLoader for FetchImageLoader {
    fn has(&self, uri: &str) -> bool {
        self.cache.borrow().has(uri)
    }

    /// Sizes of `data:` URIs are probed from the inline bytes on first ask
    /// and remembered.
    fn cached_size(&self, uri: &str) -> Option<Size> {
        let known = self.cache.borrow().size(uri);
        if known.is_some() || !is_data_uri(uri) {
            return known;
        }
        let size = self.probe_inline(uri)?;
        self.cache.borrow_mut().insert(uri, Some(size));
        Some(size)
    }

    fn load(&mut self, request: &ImageRequest, on_settle: LoadCallback) -> RequestHandle {
        self.next_id += 1;
        let handle = RequestHandle::new(self.next_id);
        let _ = self.inflight.insert(
            handle,
            InFlight {
                uri: request.uri.clone(),
                on_settle,
            },
        );

        let cached = if request.cache == CachePolicy::Reload {
            None
        } else {
            self.cache.borrow_mut().get(&request.uri)
        };

        if let Some(size) = cached {
            log::debug!(target: "petal::loader", "serving {} from cache ({handle})", request.uri);
            self.ready.push_back(Completion {
                handle,
                result: Ok(size),
            });
        } else if request.cache == CachePolicy::OnlyIfCached
            && !self.cache.borrow().has(&request.uri)
        {
            self.ready.push_back(Completion {
                handle,
                result: Err(LoadError::NotCached),
            });
        } else {
            log::debug!(target: "petal::loader", "fetching {} ({handle})", request.uri);
            self.spawn_fetch(handle, request.clone());
        }
        handle
    }

    fn abort(&mut self, handle: RequestHandle) {
        if self.inflight.remove(&handle).is_some() {
            log::debug!(target: "petal::loader", "aborted {handle}");
        }
    }
}

impl std::fmt::Debug for FetchImageLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchImageLoader")
            .field("cache", &self.cache)
            .field("outstanding", &self.inflight.len())
            .field("ready", &self.ready.len())
            .finish_non_exhaustive()
    }
}
