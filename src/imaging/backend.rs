//! Image processing backend trait and shared types.
//!
//! The [`ImageBackend`] trait is the single seam between cache management and
//! pixel work: resize a source to a breakpoint width, drop embedded profiles,
//! encode with the configured quality/compression, optionally sharpen, and
//! write the result to the given output path.
//!
//! Two implementations ship with the crate:
//! - [`RustBackend`](super::rust_backend::RustBackend): pure Rust via the
//!   `image` crate, no system dependencies. The default.
//! - [`MagickBackend`](super::magick_backend::MagickBackend): shells out to
//!   GraphicsMagick (`gm convert`) or ImageMagick (`magick`).
//!
//! Backends are synchronous; the generator runs them on tokio's blocking pool.

use super::params::ResizeParams;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Processing failed: {0}")]
    ProcessingFailed(String),
}

/// Trait for image processing backends.
///
/// Implementations must write a complete file to `params.output` or return
/// an error. The caller owns the output path and will delete it on failure.
pub trait ImageBackend: Send + Sync {
    /// Human-readable backend name for diagnostics.
    fn name(&self) -> &'static str;

    /// Resize `params.source` to `params.width` and encode it to `params.output`.
    fn resize(&self, params: &ResizeParams) -> Result<(), BackendError>;
}
