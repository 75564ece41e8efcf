//! `harvest api-routes` and `harvest rsc-routes`.

use super::output::{self, Styled};
use super::{launch_renderer, parse_target, shutdown_renderer, ReportArgs};
use crate::extraction::pipeline::{harvest_requests, NetworkHarvest};
use crate::extraction::HarvestMode;
use crate::live::session::{NavigationOutcome, NavigationPlan};
use crate::renderer::chromium::LaunchOptions;
use crate::report::table::requests_table;
use anyhow::{bail, Result};

/// Options shared by the network-observation subcommands.
#[derive(Debug, Clone, Default)]
pub struct NetworkOptions {
    /// Override for the primary navigation timeout.
    pub timeout_ms: Option<u64>,
    /// How many internal links to click (RSC only).
    pub clicks: usize,
    pub report: ReportArgs,
}

/// Navigation plan for a network-observation mode.
pub fn plan_for(mode: HarvestMode, options: &NetworkOptions) -> Result<NavigationPlan> {
    let plan = match mode {
        HarvestMode::ApiRoutes => NavigationPlan::api_routes(),
        HarvestMode::RscRoutes => NavigationPlan::rsc_routes(options.clicks),
        other => bail!("{other} are not collected from network traffic"),
    };
    Ok(match options.timeout_ms {
        Some(ms) => plan.with_primary_timeout(ms),
        None => plan,
    })
}

/// Load `url`, record its requests, and write the matching ones to a report.
pub async fn run(mode: HarvestMode, url: &str, options: &NetworkOptions) -> Result<()> {
    let target = parse_target(url)?;
    let plan = plan_for(mode, options)?;
    let s = Styled::new();

    if !output::is_quiet() && !output::is_json() {
        eprintln!();
        eprintln!("  {} {} {}", s.bold("Harvesting"), mode, s.dim(target.as_str()));
    }

    let renderer = launch_renderer(&LaunchOptions::default()).await;
    let harvest = harvest_requests(
        renderer.as_ref(),
        target.as_str(),
        &plan,
        &mode.predicate(&target),
        mode.dedup_key(),
    )
    .await;
    shutdown_renderer(renderer).await;

    let report = if harvest.links.is_empty() {
        None
    } else {
        Some(options.report.write(&target, mode, &requests_table(mode, &harvest.links))?)
    };

    if output::is_json() {
        output::print_json(&serde_json::json!({
            "mode": mode,
            "url": target.as_str(),
            "navigation": &harvest.navigation,
            "requests_seen": harvest.requests_seen,
            "results": &harvest.links,
            "report": report.as_ref().map(|p| p.display().to_string()),
        }));
        return Ok(());
    }

    print_listing(&s, mode, &harvest);

    if !output::is_quiet() {
        match report {
            Some(path) => eprintln!("  {} Saved {}", s.ok_sym(), s.cyan(&path.display().to_string())),
            None => eprintln!("  {} No {mode} found; no report written.", s.warn_sym()),
        }
        eprintln!();
    }
    Ok(())
}

fn print_listing(s: &Styled, mode: HarvestMode, harvest: &NetworkHarvest) {
    if !output::is_quiet() {
        match &harvest.navigation {
            NavigationOutcome::Loaded { state } => {
                eprintln!("  {} Page reached {state}", s.ok_sym());
            }
            NavigationOutcome::Degraded { state, reason } => {
                eprintln!("  {} Page reached {state} after fallback", s.warn_sym());
                if output::is_verbose() {
                    eprintln!("    {}", s.dim(reason));
                }
            }
            NavigationOutcome::Failed { reason } => {
                eprintln!("  {} Navigation failed: {}", s.fail_sym(), s.red(reason));
            }
        }
        eprintln!(
            "  {} observed, {} matched",
            output::plural(harvest.requests_seen, "request", "requests"),
            harvest.links.len()
        );
        if !harvest.links.is_empty() {
            eprintln!();
            eprintln!("  Found {}:", output::plural(harvest.links.len(), "link", "links"));
        }
    }

    for link in &harvest.links {
        println!("  {:<7} {}", link.method, link.url);
    }
    if !harvest.links.is_empty() && !output::is_quiet() {
        eprintln!();
    }
    tracing::debug!(%mode, results = harvest.links.len(), "listing printed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::LoadState;

    #[test]
    fn test_plan_for_network_modes() {
        let options = NetworkOptions {
            clicks: 2,
            ..Default::default()
        };
        let api = plan_for(HarvestMode::ApiRoutes, &options).unwrap();
        assert_eq!(api.primary.state, LoadState::NetworkIdle);
        assert!(api.fallback.is_some());

        let rsc = plan_for(HarvestMode::RscRoutes, &options).unwrap();
        assert_eq!(rsc.primary.state, LoadState::Load);
    }

    #[test]
    fn test_plan_for_timeout_override() {
        let options = NetworkOptions {
            timeout_ms: Some(5_000),
            ..Default::default()
        };
        let plan = plan_for(HarvestMode::ApiRoutes, &options).unwrap();
        assert_eq!(plan.primary.timeout_ms, 5_000);
    }

    #[test]
    fn test_plan_for_rejects_static_modes() {
        assert!(plan_for(HarvestMode::HashLinks, &NetworkOptions::default()).is_err());
    }
}
