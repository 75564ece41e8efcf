//! Internal-route normalization.
//!
//! Links are resolved against the base URL, kept only when they satisfy the
//! mode's predicate (the same host as the base), and reduced to their path. Query strings and fragments are
//! dropped, so `/a?x=1` and `/a#b` collapse into `/a`.

use super::predicate::LinkPredicate;
use std::collections::BTreeSet;
use url::Url;

/// Sorted, deduplicated paths of the links among `hrefs` that satisfy
/// `predicate` once resolved against `base`.
pub fn normalize_routes<'a, I>(base: &Url, hrefs: I, predicate: &LinkPredicate) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let routes: BTreeSet<String> = hrefs
        .into_iter()
        .filter_map(|href| base.join(href.trim()).ok())
        .filter(|link| predicate.matches(link.as_str()))
        .map(|link| link.path().to_string())
        .collect();
    routes.into_iter().collect()
}

/// Absolute URL of a route on the base site.
pub fn full_url(base: &Url, route: &str) -> String {
    base.join(route)
        .map(|u| u.to_string())
        .unwrap_or_else(|_| route.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://shop.example.com/").unwrap()
    }

    fn internal(hrefs: &[&str]) -> Vec<String> {
        let base = base();
        normalize_routes(&base, hrefs.iter().copied(), &LinkPredicate::internal_to(&base))
    }

    #[test]
    fn test_keeps_only_internal_paths() {
        let hrefs = [
            "https://shop.example.com/cart?item=2",
            "https://shop.example.com/about#team",
            "https://other.example.com/about",
            "https://SHOP.example.com/Contact",
            "/pricing",
            "mailto:sales@example.com",
        ];
        let routes = internal(&hrefs);
        assert_eq!(routes, vec!["/Contact", "/about", "/cart", "/pricing"]);
    }

    #[test]
    fn test_routes_are_deduplicated_and_sorted() {
        let hrefs = ["/b", "/a", "/b?page=2", "/a#x", "/"];
        let routes = internal(&hrefs);
        assert_eq!(routes, vec!["/", "/a", "/b"]);
    }

    #[test]
    fn test_no_foreign_host_survives() {
        let hrefs = [
            "https://evil.test/shop.example.com/",
            "//cdn.example.com/app.js",
            "http://shop.example.com:8080/x",
        ];
        assert!(internal(&hrefs).is_empty());
    }

    #[test]
    fn test_predicate_decides_which_links_count() {
        // A predicate built for another host selects that host's paths.
        let base = base();
        let hrefs = ["/cart", "https://blog.example.com/post-1", "https://blog.example.com/"];
        let blog = Url::parse("https://blog.example.com/").unwrap();
        let routes = normalize_routes(&base, hrefs, &LinkPredicate::internal_to(&blog));
        assert_eq!(routes, vec!["/", "/post-1"]);

        let api = normalize_routes(&base, ["/api/v1/users", "/about"], &LinkPredicate::api_endpoints());
        assert_eq!(api, vec!["/api/v1/users"]);
    }

    #[test]
    fn test_full_url_joins_against_base() {
        let base = Url::parse("https://shop.example.com/en/").unwrap();
        assert_eq!(full_url(&base, "/cart"), "https://shop.example.com/cart");
    }
}
