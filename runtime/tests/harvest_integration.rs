//! End-to-end harvest runs: acquire, filter, report.
//!
//! Browser modes run against a scripted render context; static modes run
//! against a local mock HTTP server. No test needs Chromium or the network.

use route_harvest::acquisition::http_client::HttpClient;
use route_harvest::extraction::pipeline::{harvest_anchors, harvest_requests, harvest_routes};
use route_harvest::extraction::HarvestMode;
use route_harvest::live::session::{NavigationOutcome, NavigationPlan};
use route_harvest::live::testing::{ScriptedContext, ScriptedRenderer};
use route_harvest::renderer::LoadState;
use route_harvest::report::table::{hash_links_table, requests_table, routes_table, Cell};
use route_harvest::report::{report_path, xlsx::write_report};
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ── Network observation ──

#[tokio::test]
async fn api_routes_degraded_load_still_reports() {
    let ctx = ScriptedContext::new()
        .with_navigation_requests([
            ("GET", "https://shop.test/api/v1/users"),
            ("GET", "https://shop.test/assets/app.js"),
            ("POST", "https://shop.test/rest/cart"),
            ("GET", "https://shop.test/v2/orders"),
            ("GET", "https://shop.test/api/v1/users"),
        ])
        .failing_navigation(LoadState::NetworkIdle);
    let handle = ctx.handle();
    let renderer = ScriptedRenderer::new(ctx);

    let target = Url::parse("https://www.shop.test/").unwrap();
    let mode = HarvestMode::ApiRoutes;
    let harvest = harvest_requests(
        &renderer,
        "https://shop.test/",
        &NavigationPlan::api_routes(),
        &mode.predicate(&target),
        mode.dedup_key(),
    )
    .await;

    assert!(matches!(
        harvest.navigation,
        NavigationOutcome::Degraded {
            state: LoadState::DomContentLoaded,
            ..
        }
    ));
    // Both navigation attempts emit the same requests.
    assert_eq!(harvest.requests_seen, 10);
    let found: Vec<(&str, &str)> = harvest
        .links
        .iter()
        .map(|l| (l.method.as_str(), l.url.as_str()))
        .collect();
    assert_eq!(
        found,
        vec![
            ("GET", "https://shop.test/api/v1/users"),
            ("POST", "https://shop.test/rest/cart"),
            ("GET", "https://shop.test/v2/orders"),
        ]
    );
    assert!(handle.is_closed());

    let dir = tempfile::tempdir().unwrap();
    let path = report_path(dir.path(), &target, mode, None);
    write_report(&path, &requests_table(mode, &harvest.links)).unwrap();
    assert!(dir.path().join("shop.test_api_routes.xlsx").exists());
}

// ── Rendered DOM ──

#[tokio::test]
async fn internal_routes_settle_fallback_and_host_filter() {
    let ctx = ScriptedContext::new()
        .failing_load_state(LoadState::NetworkIdle)
        .with_js_result(
            "a[href]",
            serde_json::json!([
                "https://site.test/blog/post-1#comments",
                "https://site.test/",
                "https://site.test/about",
                "https://twitter.com/site",
                "https://site.test/about?ref=nav",
            ]),
        );
    let handle = ctx.handle();
    let renderer = ScriptedRenderer::new(ctx);
    let base = Url::parse("https://site.test/").unwrap();

    let harvest = harvest_routes(
        &renderer,
        &base,
        &NavigationPlan::internal_routes(),
        &HarvestMode::Routes.predicate(&base),
    )
    .await;

    assert_eq!(
        harvest.navigation,
        NavigationOutcome::Loaded {
            state: LoadState::NetworkIdle
        }
    );
    assert_eq!(harvest.routes, vec!["/", "/about", "/blog/post-1"]);
    assert_eq!(
        handle.waited_states(),
        vec![LoadState::NetworkIdle, LoadState::Load]
    );
    assert!(handle.is_closed());

    let table = routes_table(&base, &harvest.routes);
    assert_eq!(table.rows[2][2], Cell::from("https://site.test/blog/post-1"));
}

// ── Static HTML ──

async fn serve(server: &MockServer, route: &str, html: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_string(html.to_string()))
        .mount(server)
        .await;
}

#[tokio::test]
async fn hash_links_across_pages_into_one_report() {
    let server = MockServer::start().await;
    serve(
        &server,
        "/",
        r##"<nav><a href="#">  Menu </a><a href="#top">Top</a><a href="/x">C</a></nav>"##,
    )
    .await;
    serve(
        &server,
        "/about",
        r##"<a href="#team"><span>Our</span> <b>team</b></a><a href="#top">Top</a>"##,
    )
    .await;

    let pages = vec![format!("{}/", server.uri()), format!("{}/about", server.uri())];
    let client = HttpClient::new(5_000);
    let mode = HarvestMode::HashLinks;
    let first = Url::parse(&pages[0]).unwrap();
    let anchors = harvest_anchors(&client, &pages, &mode.predicate(&first))
        .await
        .unwrap();

    let summary: Vec<(&str, &str)> = anchors
        .iter()
        .map(|a| (a.href.as_str(), a.text.as_str()))
        .collect();
    assert_eq!(
        summary,
        vec![("#", "Menu"), ("#top", "Top"), ("#team", "Ourteam"), ("#top", "Top")]
    );

    let dir = tempfile::tempdir().unwrap();
    let table = hash_links_table(&anchors, chrono::Local::now());
    assert_eq!(table.summary.as_ref().map(|s| s.total), Some(4));
    let path = report_path(&dir.path().join("reports"), &first, mode, None);
    write_report(&path, &table).unwrap();
    assert!(path.exists());
}

#[tokio::test]
async fn placeholder_links_exact_match_only() {
    let server = MockServer::start().await;
    serve(
        &server,
        "/",
        r##"<a href="#" class="btn primary" name="cta">Buy</a><a href="#faq">FAQ</a><a href=" # ">Pad</a>"##,
    )
    .await;

    let client = HttpClient::new(5_000);
    let page = server.uri();
    let anchors = harvest_anchors(
        &client,
        std::slice::from_ref(&page),
        &HarvestMode::PlaceholderLinks.predicate(&Url::parse(&page).unwrap()),
    )
    .await
    .unwrap();

    assert_eq!(anchors.len(), 1);
    assert_eq!(anchors[0].text, "Buy");
    let mut classes = anchors[0].classes.clone();
    classes.sort();
    assert_eq!(classes, vec!["btn", "primary"]);
    assert_eq!(anchors[0].name.as_deref(), Some("cta"));
}

#[tokio::test]
async fn server_error_aborts_static_harvest() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let client = HttpClient::new(5_000);
    let err = harvest_anchors(
        &client,
        &[server.uri()],
        &HarvestMode::HashLinks.predicate(&Url::parse(&server.uri()).unwrap()),
    )
    .await
    .unwrap_err();
    assert!(err.is_fetch_failure());
}
