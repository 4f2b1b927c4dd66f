//! Request rewriting and response headers for adapted images.
//!
//! Once a cache entry is usable the request URI is pointed at it, so the
//! downstream file server serves the derivative instead of the original. The
//! response then gets `Vary: Accept` and, when enabled, `Cache-Control` and
//! `Expires`.

use crate::config::AdaptiveConfig;
use axum::http::header::{CACHE_CONTROL, EXPIRES, VARY};
use axum::http::uri::PathAndQuery;
use axum::http::{HeaderMap, HeaderValue, Uri};
use chrono::{DateTime, TimeDelta, Utc};

/// `IMF-fixdate` as used by HTTP date headers.
const HTTP_DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestRewriter {
    set_expiration_headers: bool,
    cache_period: u64,
    max_age: u64,
}

impl RequestRewriter {
    pub fn from_config(config: &AdaptiveConfig) -> Self {
        Self {
            set_expiration_headers: config.set_expiration_headers,
            cache_period: config.cache_period,
            max_age: config.max_age(),
        }
    }

    /// `uri` with its path replaced by `public_path` and the query dropped.
    ///
    /// Scheme and authority of absolute-form URIs are kept. Returns `None`
    /// if `public_path` is not a valid URI path.
    pub fn rewrite_uri(&self, uri: &Uri, public_path: &str) -> Option<Uri> {
        let path = PathAndQuery::try_from(public_path).ok()?;
        let mut parts = uri.clone().into_parts();
        parts.path_and_query = Some(path);
        Uri::from_parts(parts).ok()
    }

    /// Add the adaptive headers to a downstream response.
    pub fn apply_headers(&self, headers: &mut HeaderMap, now: DateTime<Utc>) {
        add_vary_accept(headers);
        if !self.set_expiration_headers {
            return;
        }

        let cache_control = format!("public, max-age={}", self.max_age);
        if let Ok(value) = HeaderValue::from_str(&cache_control) {
            headers.insert(CACHE_CONTROL, value);
        }
        if let Ok(value) = HeaderValue::from_str(&http_date(self.expires_at(now))) {
            headers.insert(EXPIRES, value);
        }
    }

    fn expires_at(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        i64::try_from(self.cache_period)
            .ok()
            .and_then(TimeDelta::try_seconds)
            .and_then(|period| now.checked_add_signed(period))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

/// Format a timestamp as an HTTP date (`Sun, 06 Nov 1994 08:49:37 GMT`).
pub fn http_date(at: DateTime<Utc>) -> String {
    at.format(HTTP_DATE_FORMAT).to_string()
}

/// Make sure `Vary` lists `Accept`, keeping whatever the downstream set.
///
/// Nothing is added when `Accept` (any case) or `*` is already present.
/// Multiple `Vary` fields are equivalent to one comma-joined field, so the
/// new value is appended as its own field.
pub fn add_vary_accept(headers: &mut HeaderMap) {
    let covered = headers
        .get_all(VARY)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(str::trim)
        .any(|field| field == "*" || field.eq_ignore_ascii_case("accept"));
    if !covered {
        headers.append(VARY, HeaderValue::from_static("Accept"));
    }
}
