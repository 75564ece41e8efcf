//! The extraction pipeline: observe, classify, deduplicate, sort.
//!
//! Browser harvests never fail. A page that cannot be loaded yields an
//! empty result together with a `NavigationOutcome::Failed` explaining why.
//! Static harvests do fail: a fetch error ends the run before anything is
//! written.

use super::anchors::{extract_anchors, sort_and_dedup, AnchorLink};
use super::links::{DedupKey, LinkSet, ObservedLink};
use super::predicate::LinkPredicate;
use super::routes::normalize_routes;
use crate::acquisition::http_client::HttpClient;
use crate::error::HarvestResult;
use crate::live::session::{NavigationOutcome, NavigationPlan, PageSession};
use crate::renderer::{ObservedRequest, Renderer};
use serde::Serialize;
use tracing::{debug, info, warn};
use url::Url;

/// Script returning every anchor's resolved `href`.
const COLLECT_HREFS_JS: &str =
    "Array.from(document.querySelectorAll('a[href]')).map(e => e.href)";

/// Keep the requests that satisfy `predicate`, deduplicated by `key` and
/// sorted by URL then method.
pub fn extract_from_requests<I>(requests: I, predicate: &LinkPredicate, key: DedupKey) -> Vec<ObservedLink>
where
    I: IntoIterator<Item = ObservedRequest>,
{
    let mut set = LinkSet::new(key);
    for request in requests {
        if predicate.matches(&request.url) {
            debug!(method = request.method.as_str(), url = request.url.as_str(), "matched request");
            set.insert(ObservedLink::new(request.method, request.url));
        }
    }
    set.into_sorted()
}

/// Result of a network-observation harvest.
#[derive(Debug, Clone, Serialize)]
pub struct NetworkHarvest {
    pub navigation: NavigationOutcome,
    /// Requests seen in total, matched or not.
    pub requests_seen: usize,
    pub links: Vec<ObservedLink>,
}

/// Result of an internal-route harvest.
#[derive(Debug, Clone, Serialize)]
pub struct RouteHarvest {
    pub navigation: NavigationOutcome,
    pub routes: Vec<String>,
}

/// Load `url` in a fresh tab and keep the outgoing requests that satisfy
/// `predicate`. The observer is registered before navigation and the tab
/// is closed on every path; requests are read only after the close so none
/// still in flight are lost.
pub async fn harvest_requests(
    renderer: &dyn Renderer,
    url: &str,
    plan: &NavigationPlan,
    predicate: &LinkPredicate,
    key: DedupKey,
) -> NetworkHarvest {
    let mut session = match PageSession::open(renderer, true).await {
        Ok(session) => session,
        Err(e) => {
            warn!("{e:#}");
            return NetworkHarvest {
                navigation: NavigationOutcome::Failed {
                    reason: format!("{e:#}"),
                },
                requests_seen: 0,
                links: Vec::new(),
            };
        }
    };

    let navigation = session.load(url, plan).await;
    let requests = session.close().await;

    let requests_seen = requests.len();
    let links = if navigation.is_failed() {
        Vec::new()
    } else {
        extract_from_requests(requests, predicate, key)
    };
    info!(requests_seen, matched = links.len(), "network harvest finished");

    NetworkHarvest {
        navigation,
        requests_seen,
        links,
    }
}

/// Load `base` in a fresh tab and collect the paths of the links that
/// satisfy `predicate` once the plan's interactions have run.
pub async fn harvest_routes(
    renderer: &dyn Renderer,
    base: &Url,
    plan: &NavigationPlan,
    predicate: &LinkPredicate,
) -> RouteHarvest {
    let mut session = match PageSession::open(renderer, false).await {
        Ok(session) => session,
        Err(e) => {
            warn!("{e:#}");
            return RouteHarvest {
                navigation: NavigationOutcome::Failed {
                    reason: format!("{e:#}"),
                },
                routes: Vec::new(),
            };
        }
    };

    let navigation = session.load(base.as_str(), plan).await;
    let hrefs = if navigation.is_failed() {
        Vec::new()
    } else {
        match session.context().execute_js(COLLECT_HREFS_JS).await {
            Ok(value) => hrefs_from_json(&value),
            Err(e) => {
                warn!("failed to collect links: {e:#}");
                Vec::new()
            }
        }
    };
    session.close().await;

    let routes = normalize_routes(base, hrefs.iter().map(String::as_str), predicate);
    info!(links = hrefs.len(), routes = routes.len(), "route harvest finished");
    RouteHarvest { navigation, routes }
}

fn hrefs_from_json(value: &serde_json::Value) -> Vec<String> {
    value
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|v| v.as_str().map(String::from))
                .collect()
        })
        .unwrap_or_default()
}

/// Fetch each page once and keep the anchors whose href satisfies
/// `predicate`. The first fetch failure ends the harvest.
pub async fn harvest_anchors(
    client: &HttpClient,
    pages: &[String],
    predicate: &LinkPredicate,
) -> HarvestResult<Vec<AnchorLink>> {
    let mut anchors = Vec::new();
    for page in pages {
        let response = client.get(page).await?;
        if response.final_url != *page {
            debug!(page = page.as_str(), final_url = response.final_url.as_str(), "followed redirect");
        }
        let found = extract_anchors(&response.body, page, predicate);
        info!(page = page.as_str(), found = found.len(), "parsed anchors");
        anchors.extend(found);
    }
    sort_and_dedup(&mut anchors);
    Ok(anchors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::live::testing::{ScriptedContext, ScriptedRenderer};
    use crate::renderer::{LoadState, NoopRenderer};

    fn req(method: &str, url: &str) -> ObservedRequest {
        ObservedRequest {
            method: method.to_string(),
            url: url.to_string(),
        }
    }

    #[test]
    fn test_api_requests_example() {
        let requests = vec![
            req("GET", "https://site/api/v1/users"),
            req("GET", "https://site/assets/app.js"),
            req("GET", "https://site/v2/orders"),
        ];
        let links = extract_from_requests(requests, &LinkPredicate::api_endpoints(), DedupKey::MethodAndUrl);
        let urls: Vec<&str> = links.iter().map(|l| l.url.as_str()).collect();
        assert_eq!(urls, vec!["https://site/api/v1/users", "https://site/v2/orders"]);
    }

    #[test]
    fn test_output_independent_of_arrival_order() {
        let mut requests = vec![
            req("POST", "https://site/api/b"),
            req("GET", "https://site/api/a"),
            req("GET", "https://site/api/b"),
            req("GET", "https://site/api/a"),
        ];
        let p = LinkPredicate::api_endpoints();
        let forward = extract_from_requests(requests.clone(), &p, DedupKey::MethodAndUrl);
        requests.reverse();
        let backward = extract_from_requests(requests, &p, DedupKey::MethodAndUrl);
        assert_eq!(forward, backward);
        assert_eq!(forward.len(), 3);
    }

    #[tokio::test]
    async fn test_harvest_collects_requests_from_interactions() {
        let ctx = ScriptedContext::new()
            .with_navigation_requests([
                ("GET", "https://site.test/_next/static/app.js"),
                ("GET", "https://site.test/index.rsc?_rsc=1"),
            ])
            .with_js_requests("querySelectorAll('a", [("GET", "https://site.test/about.rsc?_rsc=2")]);
        let handle = ctx.handle();
        let renderer = ScriptedRenderer::new(ctx);

        let mut plan = NavigationPlan::rsc_routes(1);
        plan.interactions.retain(|step| {
            matches!(step, crate::live::interact::Interaction::ClickLinks { .. })
        });
        if let Some(crate::live::interact::Interaction::ClickLinks { pause_ms, .. }) =
            plan.interactions.first_mut()
        {
            *pause_ms = 0;
        }

        let harvest = harvest_requests(
            &renderer,
            "https://site.test/",
            &plan,
            &LinkPredicate::rsc_payloads(),
            DedupKey::Url,
        )
        .await;

        assert_eq!(harvest.requests_seen, 3);
        let urls: Vec<&str> = harvest.links.iter().map(|l| l.url.as_str()).collect();
        assert_eq!(
            urls,
            vec![
                "https://site.test/about.rsc?_rsc=2",
                "https://site.test/index.rsc?_rsc=1"
            ]
        );
        assert!(handle.is_closed());
    }

    #[tokio::test]
    async fn test_navigation_timeout_yields_empty_result() {
        let ctx = ScriptedContext::new()
            .with_navigation_requests([("GET", "https://site.test/api/config")])
            .failing_navigation(LoadState::NetworkIdle)
            .failing_navigation(LoadState::DomContentLoaded);
        let handle = ctx.handle();
        let renderer = ScriptedRenderer::new(ctx);

        let harvest = harvest_requests(
            &renderer,
            "https://site.test/",
            &NavigationPlan::api_routes(),
            &LinkPredicate::api_endpoints(),
            DedupKey::MethodAndUrl,
        )
        .await;

        assert!(harvest.navigation.is_failed());
        assert!(harvest.links.is_empty());
        assert!(handle.is_closed());
    }

    #[tokio::test]
    async fn test_missing_browser_is_not_fatal() {
        let harvest = harvest_requests(
            &NoopRenderer,
            "https://site.test/",
            &NavigationPlan::api_routes(),
            &LinkPredicate::api_endpoints(),
            DedupKey::MethodAndUrl,
        )
        .await;
        assert!(harvest.navigation.is_failed());
        assert!(harvest.links.is_empty());
    }

    #[tokio::test]
    async fn test_route_harvest_filters_foreign_hosts() {
        let ctx = ScriptedContext::new().with_js_result(
            "a[href]",
            serde_json::json!([
                "https://site.test/pricing?plan=pro",
                "https://site.test/",
                "https://cdn.other.test/lib.js",
                "https://site.test/pricing",
            ]),
        );
        let renderer = ScriptedRenderer::new(ctx);
        let base = Url::parse("https://site.test/").unwrap();
        let plan = NavigationPlan::new(crate::live::session::LoadAttempt::new(LoadState::Load, 100));

        let harvest = harvest_routes(&renderer, &base, &plan, &LinkPredicate::internal_to(&base)).await;
        assert_eq!(harvest.routes, vec!["/", "/pricing"]);
    }

    #[tokio::test]
    async fn test_route_harvest_applies_given_predicate() {
        let ctx = ScriptedContext::new().with_js_result(
            "a[href]",
            serde_json::json!([
                "https://site.test/api/v1/users",
                "https://site.test/about",
                "https://cdn.other.test/v2/lib.js",
            ]),
        );
        let renderer = ScriptedRenderer::new(ctx);
        let base = Url::parse("https://site.test/").unwrap();
        let plan = NavigationPlan::new(crate::live::session::LoadAttempt::new(LoadState::Load, 100));

        let harvest = harvest_routes(&renderer, &base, &plan, &LinkPredicate::api_endpoints()).await;
        assert_eq!(harvest.routes, vec!["/api/v1/users", "/v2/lib.js"]);
    }

    #[tokio::test]
    async fn test_requests_relayed_after_navigation_are_kept() {
        let ctx = ScriptedContext::new()
            .with_navigation_requests([
                ("GET", "https://site.test/api/v1/users"),
                ("GET", "https://site.test/app.js"),
            ])
            .relayed(std::time::Duration::from_millis(20));
        let handle = ctx.handle();
        let renderer = ScriptedRenderer::new(ctx);

        let harvest = harvest_requests(
            &renderer,
            "https://site.test/",
            &NavigationPlan::new(crate::live::session::LoadAttempt::new(LoadState::Load, 100)),
            &LinkPredicate::api_endpoints(),
            DedupKey::MethodAndUrl,
        )
        .await;

        assert_eq!(harvest.requests_seen, 2);
        assert_eq!(harvest.links, vec![ObservedLink::get("https://site.test/api/v1/users")]);
        assert!(handle.is_closed());
    }
}
