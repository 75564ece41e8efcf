//! Anchor-tag extraction from static HTML.
//!
//! `scraper` types are `!Send`; everything here is synchronous and finishes
//! with owned `AnchorLink`s before returning.

use super::predicate::LinkPredicate;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};

/// An `<a href>` element found on a page.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AnchorLink {
    /// Page the anchor was found on.
    pub page_url: String,
    /// The href attribute, trimmed.
    pub href: String,
    /// Stripped text content.
    pub text: String,
    /// Values of the `class` attribute.
    pub classes: Vec<String>,
    /// The `name` attribute.
    pub name: Option<String>,
}

/// Parse every `<a href>` on a page, in document order.
pub fn parse_anchors(html: &str, page_url: &str) -> Vec<(String, AnchorLink)> {
    let document = Html::parse_document(html);
    let selector = Selector::parse("a[href]").expect("anchor selector is valid");

    document
        .select(&selector)
        .filter_map(|el| {
            let raw = el.value().attr("href")?;
            let anchor = AnchorLink {
                page_url: page_url.to_string(),
                href: raw.trim().to_string(),
                text: stripped_text(&el),
                classes: el.value().classes().map(String::from).collect(),
                name: el.value().attr("name").map(String::from),
            };
            Some((raw.to_string(), anchor))
        })
        .collect()
}

/// Anchors on the page whose raw href satisfies `predicate`, deduplicated
/// and sorted by page, href, then text.
pub fn extract_anchors(html: &str, page_url: &str, predicate: &LinkPredicate) -> Vec<AnchorLink> {
    let mut anchors: Vec<AnchorLink> = parse_anchors(html, page_url)
        .into_iter()
        .filter(|(raw, _)| predicate.matches(raw))
        .map(|(_, anchor)| anchor)
        .collect();
    sort_and_dedup(&mut anchors);
    anchors
}

/// Sort by page, href, then text, and keep one anchor per
/// `(page_url, href, text)`.
pub fn sort_and_dedup(anchors: &mut Vec<AnchorLink>) {
    anchors.sort();
    anchors.dedup_by(|a, b| a.page_url == b.page_url && a.href == b.href && a.text == b.text);
}

/// Text nodes with surrounding whitespace removed, joined without separator.
fn stripped_text(el: &ElementRef<'_>) -> String {
    el.text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .concat()
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = "https://site.test/";

    #[test]
    fn test_hash_links_example() {
        let html = r##"<html><body>
            <a href="#">A</a>
            <a href="#top">B</a>
            <a href="/x">C</a>
        </body></html>"##;
        let links = extract_anchors(html, PAGE, &LinkPredicate::hash_links());
        let pairs: Vec<(&str, &str)> = links
            .iter()
            .map(|a| (a.text.as_str(), a.href.as_str()))
            .collect();
        assert_eq!(pairs, vec![("A", "#"), ("B", "#top")]);
    }

    #[test]
    fn test_placeholder_links_keep_class_and_name() {
        let html = r##"<nav>
            <a href="#" class="btn primary" name="cta"> Sign <b>up</b> </a>
            <a href="#menu">Menu</a>
            <a>No href</a>
        </nav>"##;
        let links = extract_anchors(html, PAGE, &LinkPredicate::placeholder_links());
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].text, "Signup");
        let mut classes = links[0].classes.clone();
        classes.sort();
        assert_eq!(classes, vec!["btn", "primary"]);
        assert_eq!(links[0].name.as_deref(), Some("cta"));
    }

    #[test]
    fn test_duplicates_collapse() {
        let html = r##"<a href="#">Top</a><p>...</p><a href="#" class="footer">Top</a>"##;
        let links = extract_anchors(html, PAGE, &LinkPredicate::hash_links());
        assert_eq!(links.len(), 1);
    }

    #[test]
    fn test_hash_href_is_trimmed() {
        let html = r##"<a href="  #faq ">FAQ</a>"##;
        let links = extract_anchors(html, PAGE, &LinkPredicate::hash_links());
        assert_eq!(links[0].href, "#faq");
        assert_eq!(links[0].page_url, PAGE);
    }

    #[test]
    fn test_empty_text_is_empty_string() {
        let html = r##"<a href="#"><img src="x.png"></a>"##;
        let links = extract_anchors(html, PAGE, &LinkPredicate::hash_links());
        assert_eq!(links[0].text, "");
    }
}
