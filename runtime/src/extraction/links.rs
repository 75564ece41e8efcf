//! Observed links and the deduplicating set they are collected into.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;

/// A request or link observed on a page.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObservedLink {
    /// HTTP method, `GET` unless another was observed.
    pub method: String,
    /// Absolute URL.
    pub url: String,
}

impl ObservedLink {
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            url: url.into(),
        }
    }

    /// A `GET` link.
    pub fn get(url: impl Into<String>) -> Self {
        Self::new("GET", url)
    }
}

// Sorted by URL first so output reads as a route listing.
impl Ord for ObservedLink {
    fn cmp(&self, other: &Self) -> Ordering {
        self.url
            .cmp(&other.url)
            .then_with(|| self.method.cmp(&other.method))
    }
}

impl PartialOrd for ObservedLink {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// What makes two observed links the same entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DedupKey {
    /// One entry per `(method, url)` pair.
    MethodAndUrl,
    /// One entry per URL; the smallest link wins so the result does not
    /// depend on arrival order.
    Url,
}

/// Unordered, deduplicated collection filled during traversal.
#[derive(Debug, Clone)]
pub struct LinkSet {
    key: DedupKey,
    links: HashMap<(String, String), ObservedLink>,
}

impl LinkSet {
    pub fn new(key: DedupKey) -> Self {
        Self {
            key,
            links: HashMap::new(),
        }
    }

    fn key_of(&self, link: &ObservedLink) -> (String, String) {
        match self.key {
            DedupKey::MethodAndUrl => (link.method.clone(), link.url.clone()),
            DedupKey::Url => (String::new(), link.url.clone()),
        }
    }

    /// Insert a link. Returns `true` if it opened a new entry.
    pub fn insert(&mut self, link: ObservedLink) -> bool {
        let key = self.key_of(&link);
        match self.links.get_mut(&key) {
            Some(existing) => {
                if link < *existing {
                    *existing = link;
                }
                false
            }
            None => {
                self.links.insert(key, link);
                true
            }
        }
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    /// Materialize into a sorted sequence.
    pub fn into_sorted(self) -> Vec<ObservedLink> {
        let mut links: Vec<ObservedLink> = self.links.into_values().collect();
        links.sort();
        links
    }
}

impl Extend<ObservedLink> for LinkSet {
    fn extend<T: IntoIterator<Item = ObservedLink>>(&mut self, iter: T) {
        for link in iter {
            self.insert(link);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_and_url_dedup() {
        let mut set = LinkSet::new(DedupKey::MethodAndUrl);
        assert!(set.insert(ObservedLink::get("https://a/api/x")));
        assert!(!set.insert(ObservedLink::get("https://a/api/x")));
        assert!(set.insert(ObservedLink::new("POST", "https://a/api/x")));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_url_dedup_is_order_independent() {
        let mut first = LinkSet::new(DedupKey::Url);
        first.insert(ObservedLink::new("POST", "https://a/x.rsc"));
        first.insert(ObservedLink::get("https://a/x.rsc"));

        let mut second = LinkSet::new(DedupKey::Url);
        second.insert(ObservedLink::get("https://a/x.rsc"));
        second.insert(ObservedLink::new("POST", "https://a/x.rsc"));

        assert_eq!(first.into_sorted(), second.into_sorted());
    }

    #[test]
    fn test_sorted_by_url_then_method() {
        let mut set = LinkSet::new(DedupKey::MethodAndUrl);
        set.extend([
            ObservedLink::get("https://a/v2/b"),
            ObservedLink::new("POST", "https://a/api/a"),
            ObservedLink::get("https://a/api/a"),
        ]);
        let sorted = set.into_sorted();
        let pairs: Vec<(&str, &str)> = sorted
            .iter()
            .map(|l| (l.method.as_str(), l.url.as_str()))
            .collect();
        assert_eq!(
            pairs,
            vec![
                ("GET", "https://a/api/a"),
                ("POST", "https://a/api/a"),
                ("GET", "https://a/v2/b"),
            ]
        );
    }
}
