//! Errors raised while resolving sources.

use thiserror::Error;

use crate::source::AssetId;

/// An asset handle that was never registered.
///
/// Handles are produced at build time, so this is a broken precondition
/// rather than a transient failure. It is never retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("image: asset with ID \"{id}\" could not be found. Please check the image source or packager.")]
pub struct AssetNotFoundError {
    /// The unknown handle.
    pub id: AssetId,
}
