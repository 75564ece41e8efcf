//! Spreadsheet reports.
//!
//! One report per run, named after the target host and the harvest mode,
//! written into an output directory created on demand.

pub mod table;
pub mod xlsx;

use crate::extraction::HarvestMode;
use chrono::NaiveDate;
use std::path::{Path, PathBuf};
use url::Url;

/// Default output directory, relative to the working directory.
pub const DEFAULT_REPORTS_DIR: &str = "reports";

/// Host without a leading `www.`, or `site` for host-less URLs.
pub fn host_stem(url: &Url) -> String {
    match url.host_str() {
        Some(host) => host.strip_prefix("www.").unwrap_or(host).to_string(),
        None => "site".to_string(),
    }
}

/// `<host>_<mode>[_<date>].xlsx`
pub fn report_file_name(url: &Url, mode: HarvestMode, date: Option<NaiveDate>) -> String {
    let stem = host_stem(url);
    match date {
        Some(d) => format!("{stem}_{}_{}.xlsx", mode.slug(), d.format("%Y-%m-%d")),
        None => format!("{stem}_{}.xlsx", mode.slug()),
    }
}

/// Full path of the report inside `out_dir`.
pub fn report_path(out_dir: &Path, url: &Url, mode: HarvestMode, date: Option<NaiveDate>) -> PathBuf {
    out_dir.join(report_file_name(url, mode, date))
}
