//! Link predicates: the one parameter that separates the harvest modes.

use url::Url;

/// Path fragments that mark a request as an API call.
pub const API_KEYWORDS: [&str; 4] = ["/api/", "/v1/", "/v2/", "/rest/"];

/// Substring that marks a React Server Components payload request.
pub const RSC_MARKER: &str = ".rsc";

/// A pure test applied to a candidate URL or anchor href.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkPredicate {
    /// URL contains at least one of the needles.
    UrlContainsAny(Vec<String>),
    /// Href, after trimming whitespace, starts with the prefix.
    HrefStartsWith(String),
    /// Href is exactly the value, untrimmed.
    HrefEquals(String),
    /// URL resolves to the same host and port as the base.
    SameHost(Url),
}

impl LinkPredicate {
    /// Requests that look like API endpoints.
    pub fn api_endpoints() -> Self {
        Self::UrlContainsAny(API_KEYWORDS.iter().map(|k| k.to_string()).collect())
    }

    /// React Server Components payload requests.
    pub fn rsc_payloads() -> Self {
        Self::UrlContainsAny(vec![RSC_MARKER.to_string()])
    }

    /// In-page anchors (`#`, `#top`, ...).
    pub fn hash_links() -> Self {
        Self::HrefStartsWith("#".to_string())
    }

    /// Placeholder anchors whose href is a bare `#`.
    pub fn placeholder_links() -> Self {
        Self::HrefEquals("#".to_string())
    }

    /// Links that stay on `base`'s host.
    pub fn internal_to(base: &Url) -> Self {
        Self::SameHost(base.clone())
    }

    /// Test a URL or raw href.
    pub fn matches(&self, candidate: &str) -> bool {
        match self {
            Self::UrlContainsAny(needles) => needles.iter().any(|n| candidate.contains(n.as_str())),
            Self::HrefStartsWith(prefix) => candidate.trim().starts_with(prefix.as_str()),
            Self::HrefEquals(value) => candidate == value,
            Self::SameHost(base) => base
                .join(candidate.trim())
                .map(|u| same_netloc(base, &u))
                .unwrap_or(false),
        }
    }
}

/// Host and explicit port match. The scheme is not compared, so an
/// `http://` link to the same host counts as internal.
pub fn same_netloc(a: &Url, b: &Url) -> bool {
    a.host_str().is_some() && a.host_str() == b.host_str() && a.port() == b.port()
}
