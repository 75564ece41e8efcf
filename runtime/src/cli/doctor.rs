//! Environment readiness check.

use super::output::{self, print_check, Styled};
use crate::renderer::chromium::find_chromium;
use crate::report::DEFAULT_REPORTS_DIR;
use anyhow::Result;
use std::path::Path;

/// Check Chromium availability and whether reports can be written.
pub async fn run() -> Result<()> {
    let chromium = find_chromium();
    let reports_ok = dir_writable(Path::new(DEFAULT_REPORTS_DIR));

    if output::is_json() {
        output::print_json(&serde_json::json!({
            "os": std::env::consts::OS,
            "arch": std::env::consts::ARCH,
            "chromium": chromium.as_ref().map(|p| p.display().to_string()),
            "reports_writable": reports_ok,
            "ready": chromium.is_some(),
        }));
        return Ok(());
    }

    let s = Styled::new();
    eprintln!();
    eprintln!("  {}", s.bold("Route Harvest Doctor"));
    eprintln!();
    print_check(
        s.ok_sym(),
        "Platform",
        &format!("{} / {}", std::env::consts::OS, std::env::consts::ARCH),
    );

    match &chromium {
        Some(path) => print_check(s.ok_sym(), "Chromium", &path.display().to_string()),
        None => print_check(
            s.fail_sym(),
            "Chromium",
            "not found; set HARVEST_CHROMIUM_PATH or install Chrome",
        ),
    }

    if reports_ok {
        print_check(s.ok_sym(), "Reports dir", DEFAULT_REPORTS_DIR);
    } else {
        print_check(s.warn_sym(), "Reports dir", "not writable from here; use --out-dir");
    }

    eprintln!();
    if chromium.is_some() {
        eprintln!("  Status: {}", s.green("READY"));
    } else {
        eprintln!("  Status: {}", s.yellow("STATIC MODES ONLY"));
        eprintln!("  {}", s.dim("hash-links and placeholder-links work without a browser."));
    }
    eprintln!();
    Ok(())
}

/// Whether `dir` exists and is writable, or could be created.
fn dir_writable(dir: &Path) -> bool {
    let existing = dir
        .ancestors()
        .find(|p| p.exists())
        .unwrap_or_else(|| Path::new("."));
    std::fs::metadata(existing)
        .map(|m| m.is_dir() && !m.permissions().readonly())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dir_writable_for_missing_child_of_tempdir() {
        let dir = tempfile::tempdir().unwrap();
        assert!(dir_writable(&dir.path().join("a/b")));
    }

    #[test]
    fn test_dir_writable_false_for_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("f");
        std::fs::write(&file, b"x").unwrap();
        assert!(!dir_writable(&file));
    }
}
