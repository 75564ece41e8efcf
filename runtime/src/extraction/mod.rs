//! Link extraction: predicates, deduplication, and the harvest pipeline.
//!
//! The five harvest modes differ only in their input (observed network
//! traffic, rendered DOM anchors, or fetched HTML) and their predicate.
//! The input is picked by the `pipeline` entry point a mode runs through.

pub mod anchors;
pub mod links;
pub mod pipeline;
pub mod predicate;
pub mod routes;

use links::DedupKey;
use predicate::LinkPredicate;
use serde::{Deserialize, Serialize};
use url::Url;

/// Which class of links to harvest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HarvestMode {
    /// Requests to API-looking paths, observed while the page loads.
    ApiRoutes,
    /// React Server Components payload requests, observed while scrolling
    /// and clicking through the page.
    RscRoutes,
    /// Paths of same-host links in the rendered DOM.
    Routes,
    /// Anchors whose href starts with `#`, from static HTML.
    HashLinks,
    /// Anchors whose href is exactly `#`, from static HTML.
    PlaceholderLinks,
}

impl HarvestMode {
    /// The predicate for this mode. `base` only matters for `Routes`.
    pub fn predicate(&self, base: &Url) -> LinkPredicate {
        match self {
            Self::ApiRoutes => LinkPredicate::api_endpoints(),
            Self::RscRoutes => LinkPredicate::rsc_payloads(),
            Self::Routes => LinkPredicate::internal_to(base),
            Self::HashLinks => LinkPredicate::hash_links(),
            Self::PlaceholderLinks => LinkPredicate::placeholder_links(),
        }
    }

    /// RSC payloads are keyed by URL; everything else by method and URL.
    pub fn dedup_key(&self) -> DedupKey {
        match self {
            Self::RscRoutes => DedupKey::Url,
            _ => DedupKey::MethodAndUrl,
        }
    }

    /// Snake-case name used in report file names.
    pub fn slug(&self) -> &'static str {
        match self {
            Self::ApiRoutes => "api_routes",
            Self::RscRoutes => "rsc_routes",
            Self::Routes => "routes",
            Self::HashLinks => "hash_links",
            Self::PlaceholderLinks => "placeholder_links",
        }
    }

    /// Human-readable label for console output.
    pub fn label(&self) -> &'static str {
        match self {
            Self::ApiRoutes => "API routes",
            Self::RscRoutes => "RSC routes",
            Self::Routes => "routes",
            Self::HashLinks => "hash links",
            Self::PlaceholderLinks => "placeholder links",
        }
    }
}

impl std::fmt::Display for HarvestMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}
