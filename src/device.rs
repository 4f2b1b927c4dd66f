//! Mobile user-agent classification.
//!
//! Only consulted when the client sent no resolution signal. The
//! [`MobileClassifier`] trait lets callers plug in their own detection (or a
//! fixed answer in tests); [`UserAgentClassifier`] is the default.

use axum::http::HeaderMap;
use axum::http::header::USER_AGENT;
use regex::Regex;
use std::sync::LazyLock;

/// Decides whether a request comes from a mobile device.
pub trait MobileClassifier: Send + Sync {
    fn is_mobile(&self, headers: &HeaderMap) -> bool;
}

static MOBILE_UA: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(android|bb\d+|meego).+mobile|armv7l|avantgo|bada/|blackberry|blazer|compal|elaine|fennec|hiptop|iemobile|ip(hone|od)|iris|kindle|lge |maemo|midp|mmp|mobile.+firefox|netfront|opera m(ob|in)i|palm( os)?|phone|p(ixi|re)/|plucker|pocket|psp|series[46]0|samsungbrowser.*mobile|symbian|treo|up\.(browser|link)|vodafone|wap|windows (ce|phone)|xda|xiino",
    )
    .expect("mobile user-agent pattern must compile")
});

/// Pattern match on the `User-Agent` header. Tablets count as non-mobile.
#[derive(Debug, Clone, Copy, Default)]
pub struct UserAgentClassifier;

impl UserAgentClassifier {
    pub fn is_mobile_user_agent(user_agent: &str) -> bool {
        MOBILE_UA.is_match(user_agent)
    }
}

impl MobileClassifier for UserAgentClassifier {
    fn is_mobile(&self, headers: &HeaderMap) -> bool {
        headers
            .get(USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .is_some_and(Self::is_mobile_user_agent)
    }
}
