//! The axum middleware tying the pipeline together.
//!
//! ```text
//! request ─► eligible? ─no─────────────────────────────────────► next
//!               │yes
//!               ▼
//!         select resolution ─► resolve cache paths ─► fresh? ─yes─┐
//!                                                       │no       │
//!                                                       ▼         ▼
//!                                                  generate ─ok─► rewrite URI ─► next ─► add headers
//!                                                       │err
//!                                                       └──────► next (untouched)
//! ```
//!
//! The middleware never answers a request itself: every path ends in the
//! downstream handler, usually a static file service rooted at the same
//! directory.

use crate::breakpoints::BreakpointSet;
use crate::cache::{CachePaths, check_freshness};
use crate::config::{AdaptiveConfig, ConfigError, Processor};
use crate::device::{MobileClassifier, UserAgentClassifier};
use crate::eligibility::{ImageTypes, eligible_path};
use crate::generate::CacheImageGenerator;
use crate::imaging::{ImageBackend, MagickBackend, MagickFlavor, RustBackend};
use crate::resolution::{ClientSignal, RESOLUTION_COOKIE, select_resolution};
use crate::rewrite::RequestRewriter;
use axum::Router;
use axum::extract::{Request, State};
use axum::http::Uri;
use axum::http::request::Parts;
use axum::middleware::{Next, from_fn_with_state};
use axum::response::Response;
use axum_extra::extract::cookie::CookieJar;
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::warn;

/// Per-request diagnostics, emitted only with `debug = true`.
macro_rules! diag {
    ($enabled:expr, $($arg:tt)+) => {
        if $enabled {
            tracing::debug!($($arg)+);
        }
    };
}

/// Shared middleware state. Cheap to clone.
#[derive(Clone)]
pub struct AdaptiveImages {
    inner: Arc<Inner>,
}

struct Inner {
    root: PathBuf,
    config: AdaptiveConfig,
    breakpoints: BreakpointSet,
    image_types: ImageTypes,
    cache_prefix: String,
    classifier: Arc<dyn MobileClassifier>,
    generator: CacheImageGenerator,
    rewriter: RequestRewriter,
}

impl AdaptiveImages {
    /// Middleware serving images below `root`, with the backend chosen by
    /// `config.processor` and user-agent based mobile detection.
    pub fn new(root: impl Into<PathBuf>, config: AdaptiveConfig) -> Result<Self, ConfigError> {
        let backend = backend_for(&config);
        Self::with_collaborators(root, config, backend, Arc::new(UserAgentClassifier))
    }

    /// Like [`new`](Self::new) with an explicit backend and classifier.
    pub fn with_collaborators(
        root: impl Into<PathBuf>,
        config: AdaptiveConfig,
        backend: Arc<dyn ImageBackend>,
        classifier: Arc<dyn MobileClassifier>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let breakpoints = BreakpointSet::new(config.breakpoints.iter().copied())?;
        let image_types = ImageTypes::new(&config.image_types);
        let cache_prefix = format!("/{}", config.cache_path.trim_matches('/'));
        let generator = CacheImageGenerator::new(
            backend,
            config.derivative_config(),
            config.generation_timeout(),
        );
        let rewriter = RequestRewriter::from_config(&config);

        Ok(Self {
            inner: Arc::new(Inner {
                root: root.into(),
                config,
                breakpoints,
                image_types,
                cache_prefix,
                classifier,
                generator,
                rewriter,
            }),
        })
    }

    pub fn root(&self) -> &Path {
        &self.inner.root
    }

    pub fn config(&self) -> &AdaptiveConfig {
        &self.inner.config
    }

    pub fn breakpoints(&self) -> &BreakpointSet {
        &self.inner.breakpoints
    }

    /// Wrap every route of `router` with this middleware.
    ///
    /// Axum runs route layers after routing, so a rewritten request is not
    /// routed again: it reaches whichever route or fallback matched the
    /// original path, with the cache path as its URI. Serve the root through
    /// that handler, typically `fallback_service(ServeDir::new(root))`.
    /// Routes or `nest_service` mounts at other paths do not see the
    /// derivative.
    pub fn apply<S>(&self, router: Router<S>) -> Router<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        router.layer(from_fn_with_state(self.clone(), adapt))
    }

    /// Work out where the request with head `request` should be served from.
    ///
    /// Returns the rewritten URI when a usable cache entry exists (generating
    /// it first if needed), or `None` to pass the request through untouched.
    pub async fn prepare(&self, request: &Parts) -> Option<Uri> {
        let inner = &self.inner;
        let debug = inner.config.debug;

        let path = eligible_path(request, &inner.image_types, &inner.cache_prefix)?;

        let headers = &request.headers;
        let signal = CookieJar::from_headers(headers)
            .get(RESOLUTION_COOKIE)
            .and_then(|cookie| ClientSignal::parse(cookie.value()));
        let is_mobile = signal.is_none() && inner.classifier.is_mobile(headers);
        let resolution = select_resolution(signal.as_ref(), is_mobile, &inner.breakpoints);

        let paths = CachePaths::resolve(&inner.root, &inner.config.cache_path, resolution, &path)?;
        let seen = inner.generator.completed_generations(&paths.key);
        let freshness = check_freshness(
            &paths.cache_file,
            inner.config.watch_cache,
            inner.config.cache_period,
        )
        .await;
        diag!(
            debug,
            path = %path,
            resolution,
            ?signal,
            is_mobile,
            ?freshness,
            "adaptive image request"
        );

        if freshness.needs_generation() {
            if !is_file(&paths.original_image).await {
                diag!(debug, original = %paths.original_image.display(), "original not found");
                return None;
            }
            if let Err(e) = inner.generator.generate_since(&paths, seen).await {
                warn!(
                    original = %paths.original_image.display(),
                    cache_file = %paths.cache_file.display(),
                    backend = inner.generator.backend_name(),
                    "failed to generate derivative: {e}"
                );
                return None;
            }
            diag!(debug, cache_file = %paths.cache_file.display(), "derivative generated");
        }

        let rewritten = inner.rewriter.rewrite_uri(&request.uri, &paths.public_path);
        if rewritten.is_none() {
            warn!(public_path = %paths.public_path, "cache path is not a valid URI");
        }
        rewritten
    }
}

/// Middleware function, installed with `from_fn_with_state`.
pub async fn adapt(
    State(adaptive): State<AdaptiveImages>,
    request: Request,
    next: Next,
) -> Response {
    let (mut head, body) = request.into_parts();
    let Some(uri) = adaptive.prepare(&head).await else {
        return next.run(Request::from_parts(head, body)).await;
    };

    diag!(adaptive.inner.config.debug, from = %head.uri, to = %uri, "rewriting request");
    head.uri = uri;
    let mut response = next.run(Request::from_parts(head, body)).await;
    adaptive
        .inner
        .rewriter
        .apply_headers(response.headers_mut(), Utc::now());
    response
}

fn backend_for(config: &AdaptiveConfig) -> Arc<dyn ImageBackend> {
    match config.processor {
        Processor::Rust => Arc::new(RustBackend::new()),
        Processor::Magick => Arc::new(MagickBackend::new(MagickFlavor::from_use_image_magick(
            config.use_image_magick,
        ))),
    }
}

async fn is_file(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .is_ok_and(|m| m.is_file())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::backend::tests::MockBackend;
    use axum::body::Body;
    use axum::http::header::{ACCEPT, COOKIE, USER_AGENT};
    use std::fs;
    use tempfile::TempDir;

    struct FixedClassifier(bool);

    impl MobileClassifier for FixedClassifier {
        fn is_mobile(&self, _headers: &axum::http::HeaderMap) -> bool {
            self.0
        }
    }

    fn setup(mobile: bool) -> (TempDir, Arc<MockBackend>, AdaptiveImages) {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("img")).unwrap();
        fs::write(tmp.path().join("img/photo.jpg"), "original").unwrap();
        let backend = Arc::new(MockBackend::new());
        let adaptive = AdaptiveImages::with_collaborators(
            tmp.path(),
            AdaptiveConfig::default(),
            backend.clone(),
            Arc::new(FixedClassifier(mobile)),
        )
        .unwrap();
        (tmp, backend, adaptive)
    }

    fn image_request(uri: &str, cookie: &str) -> Parts {
        Request::builder()
            .uri(uri)
            .header(COOKIE, cookie)
            .header(ACCEPT, "image/*")
            .body(Body::empty())
            .unwrap()
            .into_parts()
            .0
    }

    #[tokio::test]
    async fn cookie_selects_breakpoint() {
        let (tmp, backend, adaptive) = setup(false);
        let uri = adaptive
            .prepare(&image_request("/img/photo.jpg", "resolution=800,1"))
            .await
            .unwrap();

        assert_eq!(uri, "/ai-cache/992/photo.jpg");
        assert!(tmp.path().join("ai-cache/992/photo.jpg").exists());
        assert_eq!(backend.get_operations()[0].width, 992);
    }

    #[tokio::test]
    async fn mobile_without_signal_gets_smallest() {
        let (_tmp, _backend, adaptive) = setup(true);
        let uri = adaptive
            .prepare(&image_request("/img/photo.jpg", "session=abc"))
            .await
            .unwrap();
        assert_eq!(uri, "/ai-cache/480/photo.jpg");
    }

    #[tokio::test]
    async fn classifier_ignored_when_signal_present() {
        let (_tmp, _backend, adaptive) = setup(true);
        let uri = adaptive
            .prepare(&image_request("/img/photo.jpg", "resolution=1200,1"))
            .await
            .unwrap();
        assert_eq!(uri, "/ai-cache/1382/photo.jpg");
    }

    #[tokio::test]
    async fn fresh_entry_is_not_regenerated() {
        let (_tmp, backend, adaptive) = setup(false);
        let request = image_request("/img/photo.jpg", "resolution=800,1");

        adaptive.prepare(&request).await.unwrap();
        adaptive.prepare(&request).await.unwrap();

        assert_eq!(backend.get_operations().len(), 1);
    }

    #[tokio::test]
    async fn missing_original_passes_through_without_side_effects() {
        let (tmp, backend, adaptive) = setup(false);
        let result = adaptive
            .prepare(&image_request("/img/missing.jpg", "resolution=800,1"))
            .await;

        assert!(result.is_none());
        assert!(backend.get_operations().is_empty());
        assert!(!tmp.path().join("ai-cache").exists());
    }

    #[tokio::test]
    async fn generation_failure_passes_through() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("photo.jpg"), "original").unwrap();
        let adaptive = AdaptiveImages::with_collaborators(
            tmp.path(),
            AdaptiveConfig::default(),
            Arc::new(MockBackend::failing()),
            Arc::new(FixedClassifier(false)),
        )
        .unwrap();

        let result = adaptive
            .prepare(&image_request("/photo.jpg", "resolution=800,1"))
            .await;
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn ineligible_request_is_ignored() {
        let (tmp, backend, adaptive) = setup(false);
        let request = Request::builder()
            .uri("/img/photo.jpg")
            .header(ACCEPT, "image/*")
            .header(USER_AGENT, "test")
            .body(Body::empty())
            .unwrap()
            .into_parts()
            .0;

        assert!(adaptive.prepare(&request).await.is_none());
        assert!(backend.get_operations().is_empty());
        assert!(!tmp.path().join("ai-cache").exists());
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = AdaptiveConfig {
            breakpoints: vec![],
            ..AdaptiveConfig::default()
        };
        assert!(matches!(
            AdaptiveImages::new("/srv", config),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn breakpoints_are_normalized_once() {
        let config = AdaptiveConfig {
            breakpoints: vec![480, 1382, 768],
            ..AdaptiveConfig::default()
        };
        let adaptive = AdaptiveImages::new("/srv", config).unwrap();
        assert_eq!(adaptive.breakpoints().descending(), &[1382, 768, 480]);
        assert_eq!(adaptive.root(), Path::new("/srv"));
    }
}
