//! Derivative image cache on the filesystem.
//!
//! Resizing is the expensive part of serving an adaptive image, so every
//! derivative is written once and reused until it goes stale. This module
//! owns the two pure-ish halves of the cache protocol: where an entry lives
//! and whether an existing entry is still usable. Writing entries is the
//! [generator](crate::generate)'s job.
//!
//! # Design
//!
//! ## Cache keys
//!
//! An entry is identified by `(resolution, basename)`: the breakpoint it was
//! generated for and the file name of the original. Two requests with the
//! same key always resolve to the same file:
//!
//! ```text
//! <root>/<cache_path>/<resolution>/<basename>
//! e.g. public/ai-cache/992/photo.jpg
//! ```
//!
//! Originals in different directories that share a file name share a cache
//! entry per breakpoint.
//!
//! ## No in-memory index
//!
//! The filesystem is the source of truth. Every request runs a fresh `stat`;
//! nothing is remembered between requests, so external edits to the cache
//! directory (or deleting it) are always picked up.
//!
//! ## Freshness
//!
//! - stat fails for any reason → [`Freshness::Missing`] (regenerate).
//! - `watch_cache` on → [`Freshness::Stale`] once the entry is strictly older
//!   than `cache_period` seconds, otherwise [`Freshness::Fresh`].
//! - `watch_cache` off → any existing entry is fresh.
//!
//! Stale entries are overwritten in place. Entries are never deleted.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Identity of one derivative.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub resolution: u32,
    pub basename: String,
}

/// All paths involved in serving one derivative.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachePaths {
    pub key: CacheKey,
    /// `<root>/<cache_path>/<resolution>`
    pub cache_dir: PathBuf,
    /// `<cache_dir>/<basename>`
    pub cache_file: PathBuf,
    /// The requested image under the root.
    pub original_image: PathBuf,
    /// Percent-encoded URL path of `cache_file` relative to the root.
    pub public_path: String,
}

impl CachePaths {
    /// Derive cache and original paths for a decoded request path.
    ///
    /// Pure: no filesystem access. Leading and repeated slashes are ignored
    /// and only plain segments are joined, so the results never leave
    /// `root`. Returns `None` for a path without a file name or with `..`
    /// segments.
    pub fn resolve(
        root: &Path,
        cache_path: &str,
        resolution: u32,
        request_path: &str,
    ) -> Option<Self> {
        let request_segments = segments(request_path)?;
        let basename = request_segments.last()?.to_string();
        let cache_segments = segments(cache_path)?;

        let original_image = join_all(root, &request_segments);
        let cache_dir = join_all(root, &cache_segments).join(resolution.to_string());
        let cache_file = cache_dir.join(&basename);

        let mut public_path = String::new();
        for segment in &cache_segments {
            public_path.push('/');
            public_path.push_str(&urlencoding::encode(segment));
        }
        public_path.push_str(&format!("/{}/{}", resolution, urlencoding::encode(&basename)));

        Some(Self {
            key: CacheKey {
                resolution,
                basename,
            },
            cache_dir,
            cache_file,
            original_image,
            public_path,
        })
    }
}

/// Split a URL-style path into plain segments.
fn segments(path: &str) -> Option<Vec<&str>> {
    let parts: Vec<&str> = path
        .split(['/', '\\'])
        .filter(|s| !s.is_empty() && *s != ".")
        .collect();
    if parts.iter().any(|s| *s == "..") {
        return None;
    }
    Some(parts)
}

fn join_all(root: &Path, segments: &[&str]) -> PathBuf {
    segments
        .iter()
        .fold(root.to_path_buf(), |path, segment| path.join(segment))
}

/// State of a cache entry on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// No usable file; generate it.
    Missing,
    /// File exists but is older than the cache period; regenerate it.
    Stale,
    /// File can be served as-is.
    Fresh,
}

impl Freshness {
    pub fn needs_generation(self) -> bool {
        !matches!(self, Freshness::Fresh)
    }
}

/// Classify an existing entry by age. `age == cache_period` is still fresh.
pub fn classify_age(age_secs: u64, cache_period: u64) -> Freshness {
    if age_secs > cache_period {
        Freshness::Stale
    } else {
        Freshness::Fresh
    }
}

/// Whole seconds between `modified` and `now`; future timestamps count as 0.
pub fn age_secs(modified: SystemTime, now: SystemTime) -> u64 {
    now.duration_since(modified)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Check the entry at `cache_file`.
pub async fn check_freshness(cache_file: &Path, watch_cache: bool, cache_period: u64) -> Freshness {
    let metadata = match tokio::fs::metadata(cache_file).await {
        Ok(m) if m.is_file() => m,
        _ => return Freshness::Missing,
    };
    if !watch_cache {
        return Freshness::Fresh;
    }
    match metadata.modified() {
        Ok(modified) => classify_age(age_secs(modified, SystemTime::now()), cache_period),
        // Unknown age cannot be proven fresh
        Err(_) => Freshness::Stale,
    }
}
