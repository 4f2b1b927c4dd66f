//! Eligibility filter.
//!
//! Decides whether a request is a candidate for adaptation at all. Ineligible
//! requests are handed to the next handler untouched, before any filesystem
//! access happens.
//!
//! A request is eligible when all of the following hold:
//! 1. the method is `GET` or `HEAD`;
//! 2. it carries a `Cookie` header;
//! 3. its path has one of the configured image extensions;
//! 4. it carries an `Accept` header;
//! 5. its decoded path stays inside the root and outside the cache directory.

use axum::http::header::{ACCEPT, COOKIE};
use axum::http::Method;
use axum::http::request::Parts;
use std::borrow::Cow;

/// Normalized set of eligible extensions (lowercase, no leading dot).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageTypes(Vec<String>);

impl ImageTypes {
    pub fn new<S: AsRef<str>>(types: &[S]) -> Self {
        Self(
            types
                .iter()
                .map(|t| t.as_ref().trim_start_matches('.').to_ascii_lowercase())
                .filter(|t| !t.is_empty())
                .collect(),
        )
    }

    /// Whether the final path segment ends in an eligible extension.
    pub fn matches(&self, path: &str) -> bool {
        let file_name = path.rsplit('/').next().unwrap_or(path);
        match file_name.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() => {
                self.0.iter().any(|t| t.eq_ignore_ascii_case(ext))
            }
            _ => false,
        }
    }
}

/// Return the decoded request path if the request should be adapted.
///
/// `cache_prefix` is the cache directory as a URL path (`/ai-cache`);
/// requests already pointing into it are served as-is.
pub fn eligible_path(
    request: &Parts,
    image_types: &ImageTypes,
    cache_prefix: &str,
) -> Option<String> {
    if request.method != Method::GET && request.method != Method::HEAD {
        return None;
    }
    if !request.headers.contains_key(COOKIE) {
        return None;
    }

    let path = decode_path(request.uri.path())?;
    if !image_types.matches(&path) || !request.headers.contains_key(ACCEPT) {
        return None;
    }
    if path.split('/').any(|segment| segment == "..") {
        return None;
    }
    if is_within(&path, cache_prefix) {
        return None;
    }
    Some(path)
}

fn decode_path(raw: &str) -> Option<String> {
    urlencoding::decode(raw).ok().map(Cow::into_owned)
}

fn is_within(path: &str, prefix: &str) -> bool {
    let prefix = prefix.trim_end_matches('/');
    path.strip_prefix(prefix)
        .is_some_and(|rest| rest.starts_with('/'))
}
