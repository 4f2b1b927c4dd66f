//! # Adaptive Images
//!
//! Axum middleware that serves every visitor an image sized for their
//! screen. Originals stay where they are; the middleware picks one of a few
//! configured breakpoint widths per request, makes sure a derivative at that
//! width exists in an on-disk cache, and rewrites the request so the
//! downstream static file service sends the derivative instead.
//!
//! ```text
//! GET /img/photo.jpg            Cookie: resolution=412,2.625
//!   → effective width 1081px → breakpoint 1382
//!   → <root>/ai-cache/1382/photo.jpg (generated on first request)
//!   → downstream serves /ai-cache/1382/photo.jpg
//!   → Vary: Accept, Cache-Control, Expires
//! ```
//!
//! # Usage
//!
//! ```no_run
//! use adaptive_images::{AdaptiveConfig, AdaptiveImages};
//! use axum::Router;
//!
//! # fn build() -> Result<Router, adaptive_images::ConfigError> {
//! let adaptive = AdaptiveImages::new("public", AdaptiveConfig::default())?;
//! let app = adaptive.apply(Router::new() /* .fallback_service(ServeDir::new("public")) */);
//! # Ok(app)
//! # }
//! ```
//!
//! Clients report their viewport with a cookie set by one line of script:
//! `document.cookie = 'resolution=' + Math.max(screen.width, screen.height)
//! + ',' + (window.devicePixelRatio || 1) + '; path=/'`.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`middleware`] | The axum middleware and its shared state, [`AdaptiveImages`] |
//! | [`eligibility`] | Which requests are adapted at all |
//! | [`resolution`] | Cookie parsing and breakpoint selection |
//! | [`breakpoints`] | The immutable, pre-sorted breakpoint set |
//! | [`device`] | Mobile user-agent classification, the fallback signal |
//! | [`cache`] | Cache layout and freshness checks |
//! | [`generate`] | Single-flight derivative generation with atomic writes |
//! | [`rewrite`] | URI rewriting and response headers |
//! | [`config`] | `adaptive-images.toml` loading and validation |
//! | [`imaging`] | Image backends: pure Rust or GraphicsMagick/ImageMagick |
//!
//! # Design Decisions
//!
//! ## The Filesystem Is the Index
//!
//! Every request stats its cache entry; nothing about the cache is held in
//! memory. Deleting the cache directory, or a single derivative, is always
//! safe and takes effect on the next request.
//!
//! ## Never Fail a Request
//!
//! The middleware only ever rewrites or passes through. If a derivative
//! cannot be produced the request continues to the original image untouched,
//! and the failure is logged at `warn`.
//!
//! ## Generation Is Single-Flight and Atomic
//!
//! A burst of requests for an uncached image triggers one resize, not one per
//! request. The result is written to a hidden sibling file and renamed into
//! place, so no request ever sees a half-written image.
//!
//! ## Swappable Collaborators
//!
//! Pixel work sits behind [`ImageBackend`] and device detection behind
//! [`MobileClassifier`]. The default backend is pure Rust; the `magick`
//! processor shells out to GraphicsMagick or ImageMagick for deployments
//! that already rely on them.

pub mod breakpoints;
pub mod cache;
pub mod config;
pub mod device;
pub mod eligibility;
pub mod generate;
pub mod imaging;
pub mod middleware;
pub mod resolution;
pub mod rewrite;

pub use breakpoints::BreakpointSet;
pub use config::{AdaptiveConfig, ConfigError, Processor, load_config, parse_config};
pub use device::{MobileClassifier, UserAgentClassifier};
pub use generate::GenerateError;
pub use imaging::{BackendError, Compression, ImageBackend, ResizeParams};
pub use middleware::{AdaptiveImages, adapt};
