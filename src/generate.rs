//! Cache entry generation.
//!
//! Produces the derivative for a [`CachePaths`] entry: creates the resolution
//! directory, runs the image backend on tokio's blocking pool, and moves the
//! finished file into place.
//!
//! ## Atomic writes
//!
//! The backend writes to a hidden staging file next to the target
//! (`.<pid>-<n>-<basename>`, so the extension and therefore the output format
//! are kept) which is then renamed onto the cache file. Rename within one
//! directory is atomic, so a concurrent freshness check sees either the old
//! entry, no entry, or the complete new one. Failed attempts remove their
//! staging file.
//!
//! ## Single-flight
//!
//! Concurrent misses for the same [`CacheKey`] share one generation. The
//! first request registers an in-flight cell; later requests for the same key
//! await that cell and receive the same outcome, success or error. The entry
//! is removed from the registry when the generation completes, so the next
//! miss after a failure retries.
//!
//! A request can see the entry missing, then lose the race and arrive after
//! the generation it should have joined has already been retired. Each key
//! therefore also counts completed generations: callers note the count before
//! their freshness check and [`CacheImageGenerator::generate_since`] returns
//! early if it has moved on.

use crate::cache::{CacheKey, CachePaths};
use crate::imaging::{BackendError, DerivativeConfig, ImageBackend, create_derivative};
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::OnceCell;

/// Why a derivative could not be produced.
///
/// Sources are behind `Arc` so every request waiting on one generation can
/// receive its own copy of the error.
#[derive(Error, Debug, Clone)]
pub enum GenerateError {
    #[error("failed to create cache directory {}: {source}", .path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: Arc<io::Error>,
    },
    #[error("image processing failed: {0}")]
    Backend(#[source] Arc<BackendError>),
    #[error("failed to move derivative into place: {0}")]
    Commit(#[source] Arc<io::Error>),
    #[error("image processing timed out after {0:?}")]
    Timeout(Duration),
    #[error("image processing task did not complete: {0}")]
    Join(String),
}

type Outcome = Result<(), GenerateError>;
type Flight = Arc<OnceCell<Outcome>>;

static STAGING_COUNTER: AtomicU64 = AtomicU64::new(0);

/// In-flight generations plus a count of completed ones per key.
#[derive(Default)]
struct Registry {
    in_flight: HashMap<CacheKey, Flight>,
    completed: HashMap<CacheKey, u64>,
}

/// Writes derivatives into the cache, one generation per key at a time.
pub struct CacheImageGenerator {
    backend: Arc<dyn ImageBackend>,
    derivative: DerivativeConfig,
    timeout: Option<Duration>,
    registry: Mutex<Registry>,
}

impl CacheImageGenerator {
    pub fn new(
        backend: Arc<dyn ImageBackend>,
        derivative: DerivativeConfig,
        timeout: Option<Duration>,
    ) -> Self {
        Self {
            backend,
            derivative,
            timeout,
            registry: Mutex::new(Registry::default()),
        }
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Number of successful generations of `key` so far.
    ///
    /// Read this before checking freshness and pass it to
    /// [`generate_since`](Self::generate_since).
    pub fn completed_generations(&self, key: &CacheKey) -> u64 {
        self.lock_registry().completed.get(key).copied().unwrap_or(0)
    }

    /// Generate the entry for `paths`, or join a generation already running.
    pub async fn generate(&self, paths: &CachePaths) -> Outcome {
        let seen = self.completed_generations(&paths.key);
        self.generate_since(paths, seen).await
    }

    /// Like [`generate`](Self::generate), but a no-op if a generation of the
    /// key has completed since the caller observed `seen` completions.
    ///
    /// A request that found the entry missing just before a concurrent
    /// generation committed it would otherwise start a second one.
    pub async fn generate_since(&self, paths: &CachePaths, seen: u64) -> Outcome {
        let Some(flight) = self.join_in_flight(&paths.key, seen) else {
            return Ok(());
        };
        let outcome = flight.get_or_init(|| self.run(paths)).await.clone();
        self.finish_in_flight(&paths.key, &flight, outcome.is_ok());
        outcome
    }

    /// Number of keys currently being generated.
    pub fn in_flight_count(&self) -> usize {
        self.lock_registry().in_flight.len()
    }

    fn lock_registry(&self) -> std::sync::MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn join_in_flight(&self, key: &CacheKey, seen: u64) -> Option<Flight> {
        let mut registry = self.lock_registry();
        if registry.completed.get(key).copied().unwrap_or(0) > seen {
            return None;
        }
        Some(Arc::clone(
            registry
                .in_flight
                .entry(key.clone())
                .or_insert_with(|| Arc::new(OnceCell::new())),
        ))
    }

    /// Retire `flight`. The first caller to get here removes it and, on
    /// success, bumps the completion count under the same lock.
    fn finish_in_flight(&self, key: &CacheKey, flight: &Flight, succeeded: bool) {
        let mut registry = self.lock_registry();
        let current = registry
            .in_flight
            .get(key)
            .is_some_and(|f| Arc::ptr_eq(f, flight));
        if !current {
            return;
        }
        registry.in_flight.remove(key);
        if succeeded {
            *registry.completed.entry(key.clone()).or_default() += 1;
        }
    }

    async fn run(&self, paths: &CachePaths) -> Outcome {
        tokio::fs::create_dir_all(&paths.cache_dir)
            .await
            .map_err(|e| GenerateError::CreateDir {
                path: paths.cache_dir.clone(),
                source: Arc::new(e),
            })?;

        let staging = staging_path(&paths.cache_dir, &paths.key.basename);
        let source = paths.original_image.clone();
        let target = paths.cache_file.clone();
        let width = paths.key.resolution;
        let derivative = self.derivative;
        let backend = Arc::clone(&self.backend);

        // Resize and rename both happen on the blocking pool, so a timed-out
        // task still either commits a complete file or cleans up after itself.
        let task = tokio::task::spawn_blocking(move || {
            let result = create_derivative(backend.as_ref(), &source, &staging, width, &derivative)
                .map_err(|e| GenerateError::Backend(Arc::new(e)))
                .and_then(|()| {
                    std::fs::rename(&staging, &target)
                        .map_err(|e| GenerateError::Commit(Arc::new(e)))
                });
            if result.is_err() {
                let _ = std::fs::remove_file(&staging);
            }
            result
        });

        let joined = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, task)
                .await
                .map_err(|_| GenerateError::Timeout(limit))?,
            None => task.await,
        };
        joined.map_err(|e| GenerateError::Join(e.to_string()))?
    }
}

/// Hidden sibling of the cache file that keeps its extension.
fn staging_path(cache_dir: &Path, basename: &str) -> PathBuf {
    let n = STAGING_COUNTER.fetch_add(1, Ordering::Relaxed);
    cache_dir.join(format!(".{}-{}-{}", std::process::id(), n, basename))
}
