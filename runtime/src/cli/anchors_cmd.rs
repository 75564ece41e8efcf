//! `harvest hash-links` and `harvest placeholder-links`.

use super::output::{self, Styled};
use super::{parse_target, ReportArgs};
use crate::acquisition::http_client::HttpClient;
use crate::extraction::anchors::AnchorLink;
use crate::extraction::pipeline::harvest_anchors;
use crate::extraction::HarvestMode;
use crate::report::table::{hash_links_table, placeholder_table, ReportTable, NO_TEXT};
use anyhow::{bail, Context, Result};

/// Default per-request timeout for static fetches.
pub const DEFAULT_FETCH_TIMEOUT_MS: u64 = 30_000;

/// Fetch every page in `urls`, collect the anchors `mode` selects, and write
/// one report named after the first page. A failed fetch aborts the run
/// before anything is written.
pub async fn run(mode: HarvestMode, urls: &[String], timeout_ms: u64, report: &ReportArgs) -> Result<()> {
    let table_for: fn(&[AnchorLink]) -> ReportTable = match mode {
        HarvestMode::HashLinks => |anchors| hash_links_table(anchors, chrono::Local::now()),
        HarvestMode::PlaceholderLinks => placeholder_table,
        other => bail!("{other} are not collected from static HTML"),
    };

    let targets = urls
        .iter()
        .map(|u| parse_target(u))
        .collect::<Result<Vec<_>, _>>()?;
    let Some(first) = targets.first() else {
        bail!("no URL given");
    };
    let pages: Vec<String> = targets.iter().map(|u| u.to_string()).collect();
    let s = Styled::new();

    if !output::is_quiet() && !output::is_json() {
        eprintln!();
        eprintln!(
            "  {} {mode} from {}",
            s.bold("Harvesting"),
            output::plural(pages.len(), "page", "pages")
        );
    }

    let client = HttpClient::new(timeout_ms);
    let anchors = harvest_anchors(&client, &pages, &mode.predicate(first))
        .await
        .context("no report written")?;

    let path = if anchors.is_empty() {
        None
    } else {
        Some(report.write(first, mode, &table_for(&anchors))?)
    };

    if output::is_json() {
        output::print_json(&serde_json::json!({
            "mode": mode,
            "pages": pages,
            "results": &anchors,
            "report": path.as_ref().map(|p| p.display().to_string()),
        }));
        return Ok(());
    }

    if !anchors.is_empty() && !output::is_quiet() {
        eprintln!(
            "  {} Found {}",
            s.ok_sym(),
            output::plural(anchors.len(), "link", "links")
        );
    }

    for anchor in &anchors {
        let text = if anchor.text.is_empty() { NO_TEXT } else { anchor.text.as_str() };
        if pages.len() > 1 {
            println!("  {:<10} {text}  {}", anchor.href, s.dim(&anchor.page_url));
        } else {
            println!("  {:<10} {text}", anchor.href);
        }
    }

    if !output::is_quiet() {
        match path {
            Some(p) => eprintln!("  {} Saved {}", s.ok_sym(), s.cyan(&p.display().to_string())),
            None => eprintln!("  {} No {mode} found; no report written.", s.warn_sym()),
        }
        eprintln!();
    }
    Ok(())
}
