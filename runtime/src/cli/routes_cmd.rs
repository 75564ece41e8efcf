//! `harvest routes`: internal routes of a rendered page.

use super::output::{self, Styled};
use super::{launch_renderer, parse_target, shutdown_renderer, ReportArgs};
use crate::extraction::pipeline::harvest_routes;
use crate::extraction::routes::full_url;
use crate::extraction::HarvestMode;
use crate::live::session::{NavigationOutcome, NavigationPlan};
use crate::renderer::chromium::LaunchOptions;
use crate::report::table::routes_table;
use anyhow::Result;

/// Render `url`, collect its same-host links, and write the route report.
pub async fn run(url: &str, timeout_ms: Option<u64>, report: &ReportArgs) -> Result<()> {
    let target = parse_target(url)?;
    let mut plan = NavigationPlan::internal_routes();
    if let Some(ms) = timeout_ms {
        plan = plan.with_primary_timeout(ms);
    }
    let s = Styled::new();

    if !output::is_quiet() && !output::is_json() {
        eprintln!();
        eprintln!("  {} routes of {}", s.bold("Harvesting"), s.dim(target.as_str()));
    }

    let renderer = launch_renderer(&LaunchOptions::desktop()).await;
    let predicate = HarvestMode::Routes.predicate(&target);
    let harvest = harvest_routes(renderer.as_ref(), &target, &plan, &predicate).await;
    shutdown_renderer(renderer).await;

    let path = if harvest.routes.is_empty() {
        None
    } else {
        Some(report.write(&target, HarvestMode::Routes, &routes_table(&target, &harvest.routes))?)
    };

    if output::is_json() {
        let routes: Vec<_> = harvest
            .routes
            .iter()
            .map(|r| serde_json::json!({ "route": r, "url": full_url(&target, r) }))
            .collect();
        output::print_json(&serde_json::json!({
            "mode": HarvestMode::Routes,
            "url": target.as_str(),
            "navigation": &harvest.navigation,
            "results": routes,
            "report": path.as_ref().map(|p| p.display().to_string()),
        }));
        return Ok(());
    }

    if !output::is_quiet() {
        if let NavigationOutcome::Failed { reason } = &harvest.navigation {
            eprintln!("  {} Navigation failed: {}", s.fail_sym(), s.red(reason));
        }
        if !harvest.routes.is_empty() {
            eprintln!(
                "  {} Found {}",
                s.ok_sym(),
                output::plural(harvest.routes.len(), "route", "routes")
            );
        }
    }

    for (i, route) in harvest.routes.iter().enumerate() {
        println!("  {:>4}. {route}", i + 1);
    }

    if !output::is_quiet() {
        match path {
            Some(p) => eprintln!("  {} Saved {}", s.ok_sym(), s.cyan(&p.display().to_string())),
            None => eprintln!("  {} No routes found; no report written.", s.warn_sym()),
        }
        eprintln!();
    }
    Ok(())
}
