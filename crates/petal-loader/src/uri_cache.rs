//! Bounded record of URIs that have loaded successfully.

use std::num::NonZeroUsize;

use lru::LruCache;
use petal_common::url::is_data_uri;
use petal_image::geometry::Size;

/// Default number of remembered URIs.
pub const DEFAULT_CAPACITY: usize = 256;

/// Remembers which URIs have loaded, and their natural size.
///
/// `data:` URIs carry their bytes inline and always count as cached. Past
/// `capacity` entries the least recently used one is forgotten.
#[derive(Debug)]
pub struct ImageUriCache {
    entries: LruCache<String, Option<Size>>,
}

impl ImageUriCache {
    /// An empty cache holding at most `capacity` URIs (at least one).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: LruCache::new(capacity),
        }
    }

    /// Whether `uri` can be shown without loading.
    #[must_use]
    pub fn has(&self, uri: &str) -> bool {
        is_data_uri(uri) || self.entries.contains(uri)
    }

    /// The recorded entry for `uri`, marking it as recently used.
    ///
    /// `Some(size)` means the URI loaded before; `size` is its natural size
    /// if that was known. `data:` URIs only have an entry once loaded or
    /// probed.
    pub fn get(&mut self, uri: &str) -> Option<Option<Size>> {
        self.entries.get(uri).copied()
    }

    /// Natural size of a loaded `uri`, without touching recency.
    #[must_use]
    pub fn size(&self, uri: &str) -> Option<Size> {
        self.entries.peek(uri).copied().flatten()
    }

    /// Record a successful load of `uri`, evicting the least recently used
    /// entry if the cache is full.
    pub fn insert(&mut self, uri: impl Into<String>, size: Option<Size>) {
        let uri = uri.into();
        let replaced = self.entries.push(uri.clone(), size);
        if let Some((evicted, _)) = replaced.filter(|(key, _)| *key != uri) {
            log::debug!(target: "petal::loader", "evicting {evicted} from image cache");
        }
    }

    /// Forget `uri`. Returns whether it was present.
    pub fn remove(&mut self, uri: &str) -> bool {
        self.entries.pop(uri).is_some()
    }

    /// Number of recorded URIs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Maximum number of recorded URIs.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.entries.cap().get()
    }
}

impl Default for ImageUriCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
