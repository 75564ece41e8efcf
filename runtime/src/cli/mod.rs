//! CLI subcommand implementations for the `harvest` binary.

pub mod anchors_cmd;
pub mod doctor;
pub mod network_cmd;
pub mod output;
pub mod routes_cmd;

use crate::error::HarvestError;
use crate::extraction::HarvestMode;
use crate::renderer::chromium::{ChromiumRenderer, LaunchOptions};
use crate::renderer::{NoopRenderer, Renderer};
use crate::report::table::ReportTable;
use crate::report::xlsx::write_report;
use crate::report::{report_path, DEFAULT_REPORTS_DIR};
use anyhow::Result;
use clap::Args;
use std::path::PathBuf;
use tracing::{info, warn};
use url::Url;

/// Where and how the spreadsheet is written.
#[derive(Debug, Clone, Args)]
pub struct ReportArgs {
    /// Directory for the generated report
    #[arg(long, default_value = DEFAULT_REPORTS_DIR)]
    pub out_dir: PathBuf,

    /// Append today's date to the report file name
    #[arg(long)]
    pub dated: bool,
}

impl Default for ReportArgs {
    fn default() -> Self {
        Self {
            out_dir: PathBuf::from(DEFAULT_REPORTS_DIR),
            dated: false,
        }
    }
}

impl ReportArgs {
    /// Write `table` for `target` and return the file path.
    pub fn write(&self, target: &Url, mode: HarvestMode, table: &ReportTable) -> Result<PathBuf> {
        let date = self.dated.then(|| chrono::Local::now().date_naive());
        let path = report_path(&self.out_dir, target, mode, date);
        write_report(&path, table)?;
        Ok(path)
    }
}

/// Parse a command-line URL.
pub fn parse_target(raw: &str) -> Result<Url, HarvestError> {
    Url::parse(raw.trim()).map_err(|source| HarvestError::InvalidUrl {
        url: raw.to_string(),
        source,
    })
}

/// Launch Chromium, or fall back to a renderer that cannot open pages.
pub async fn launch_renderer(options: &LaunchOptions) -> Box<dyn Renderer> {
    match ChromiumRenderer::launch(options).await {
        Ok(renderer) => {
            info!("Chromium renderer initialized");
            Box::new(renderer)
        }
        Err(e) => {
            warn!("Browser unavailable, no pages can be rendered: {e:#}");
            Box::new(NoopRenderer)
        }
    }
}

/// Shut the renderer down, logging rather than failing.
pub async fn shutdown_renderer(renderer: Box<dyn Renderer>) {
    if let Err(e) = renderer.shutdown().await {
        warn!("renderer shutdown failed: {e:#}");
    }
}
