//! Developer warnings, deduplicated per key.
//!
//! Used by the image component to report deprecated style usage. Each
//! distinct key is reported once for the lifetime of the [`OnceWarnings`]
//! that saw it, so two independently composed trees (or two tests) never
//! share "already warned" state.

use std::cell::RefCell;
use std::collections::HashSet;
use std::fmt;
use std::rc::Rc;

/// Destination for warnings that passed deduplication.
pub trait WarningSink {
    /// Report a warning identified by `key`.
    fn emit(&self, key: &str, message: &str);
}

impl<S: WarningSink + ?Sized> WarningSink for Rc<S> {
    fn emit(&self, key: &str, message: &str) {
        (**self).emit(key, message);
    }
}

/// Forwards warnings to the `log` facade at `warn` level.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl WarningSink for LogSink {
    fn emit(&self, key: &str, message: &str) {
        log::warn!(target: "petal", "[{key}] {message}");
    }
}

/// Discards every warning.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl WarningSink for NullSink {
    fn emit(&self, _key: &str, _message: &str) {}
}

/// Keeps every warning it receives, in order. Useful for assertions.
#[derive(Debug, Default)]
pub struct RecordingSink {
    records: RefCell<Vec<(String, String)>>,
}

impl RecordingSink {
    /// Create an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All `(key, message)` pairs received so far.
    #[must_use]
    pub fn records(&self) -> Vec<(String, String)> {
        self.records.borrow().clone()
    }
}

impl WarningSink for RecordingSink {
    fn emit(&self, key: &str, message: &str) {
        self.records
            .borrow_mut()
            .push((key.to_string(), message.to_string()));
    }
}

/// Deduplicating front for a [`WarningSink`].
pub struct OnceWarnings {
    sink: Box<dyn WarningSink>,
    warned: RefCell<HashSet<String>>,
}

impl OnceWarnings {
    /// Wrap `sink` with an empty "already warned" set.
    pub fn new(sink: impl WarningSink + 'static) -> Self {
        Self {
            sink: Box::new(sink),
            warned: RefCell::new(HashSet::new()),
        }
    }

    /// Deduplicator that drops everything.
    #[must_use]
    pub fn silent() -> Self {
        Self::new(NullSink)
    }

    /// Warn about `key` unless it was already reported.
    ///
    /// Returns `true` if the warning was forwarded to the sink.
    ///
    /// # Example
    /// ```ignore
    /// warnings.warn_once("Image.style.resizeMode", "style.resizeMode is deprecated");
    /// ```
    pub fn warn_once(&self, key: &str, message: &str) -> bool {
        let first = self.warned.borrow_mut().insert(key.to_string());
        if first {
            self.sink.emit(key, message);
        }
        first
    }

    /// Whether `key` has been reported.
    #[must_use]
    pub fn has_warned(&self, key: &str) -> bool {
        self.warned.borrow().contains(key)
    }

    /// Forget every reported key.
    pub fn clear(&self) {
        self.warned.borrow_mut().clear();
    }
}

impl Default for OnceWarnings {
    fn default() -> Self {
        Self::new(LogSink)
    }
}

impl fmt::Debug for OnceWarnings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OnceWarnings")
            .field("warned", &self.warned.borrow().len())
            .finish_non_exhaustive()
    }
}
