//! Image processing behind a swappable backend.
//!
//! | Operation | Backend |
//! |---|---|
//! | **Resize → JPEG/PNG/GIF/WebP** | [`RustBackend`]: `image` crate, Lanczos3 + `unsharpen` |
//! | **Resize via CLI** | [`MagickBackend`]: `gm convert` or `magick` |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for dimension math (unit testable)
//! - **Parameters**: Data structures describing image operations
//! - **Backend**: [`ImageBackend`] trait + implementations
//! - **Operations**: High-level functions combining parameters + backend

pub mod backend;
mod calculations;
pub mod magick_backend;
pub mod operations;
mod params;
pub mod rust_backend;

pub use backend::{BackendError, ImageBackend};
pub use calculations::calculate_fit_to_width;
pub use magick_backend::{MagickBackend, MagickFlavor};
pub use operations::{DerivativeConfig, create_derivative, plan_derivative};
pub use params::{Compression, Quality, ResizeParams, Sharpening};
pub use rust_backend::RustBackend;
