//! Tabular layout of each report, independent of the file format.

use crate::extraction::anchors::AnchorLink;
use crate::extraction::links::ObservedLink;
use crate::extraction::routes::full_url;
use crate::extraction::HarvestMode;
use chrono::{DateTime, Local};
use url::Url;

/// Placeholder for anchors without text in hash-link reports.
pub const NO_TEXT: &str = "(no text)";

/// A single cell value.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Text(String),
    Number(f64),
}

impl From<&str> for Cell {
    fn from(s: &str) -> Self {
        Cell::Text(s.to_string())
    }
}

impl From<String> for Cell {
    fn from(s: String) -> Self {
        Cell::Text(s)
    }
}

impl From<usize> for Cell {
    fn from(n: usize) -> Self {
        Cell::Number(n as f64)
    }
}

/// Visual treatment of the data sheet.
#[derive(Debug, Clone, PartialEq)]
pub enum TableStyle {
    /// Header row as plain text.
    Plain,
    /// Bold, colored, centered header; columns fitted to content.
    BoldHeader { color: u32 },
    /// Filled header with white bold text, thin borders on every cell,
    /// wrapped data cells, and fixed column widths.
    Banded { fill: u32, widths: Vec<f64> },
}

/// Second sheet with run metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    pub title: String,
    pub title_color: u32,
    pub generated_at: String,
    pub total: usize,
}

/// A report ready to be written.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportTable {
    pub sheet: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
    pub style: TableStyle,
    pub summary: Option<Summary>,
}

impl ReportTable {
    fn new(sheet: &str, headers: &[&str], style: TableStyle) -> Self {
        Self {
            sheet: sheet.to_string(),
            headers: headers.iter().map(|h| h.to_string()).collect(),
            rows: Vec::new(),
            style,
            summary: None,
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// `HTTP Method | URL` for network-observation modes.
pub fn requests_table(mode: HarvestMode, links: &[ObservedLink]) -> ReportTable {
    let sheet = match mode {
        HarvestMode::RscRoutes => "RSC Routes",
        _ => "API Routes",
    };
    let mut table = ReportTable::new(sheet, &["HTTP Method", "URL"], TableStyle::Plain);
    table.rows = links
        .iter()
        .map(|l| vec![Cell::from(l.method.as_str()), Cell::from(l.url.as_str())])
        .collect();
    table
}

/// `S.No | Route | Full URL | HTTP Method` for internal routes.
pub fn routes_table(base: &Url, routes: &[String]) -> ReportTable {
    let mut table = ReportTable::new(
        "Routes",
        &["S.No", "Route", "Full URL", "HTTP Method"],
        TableStyle::BoldHeader { color: 0x1F4E78 },
    );
    table.rows = routes
        .iter()
        .enumerate()
        .map(|(i, route)| {
            vec![
                Cell::from(i + 1),
                Cell::from(route.as_str()),
                Cell::from(full_url(base, route)),
                Cell::from("GET"),
            ]
        })
        .collect();
    table
}

/// `# | Page URL | Link Text | Hash Link`, plus a summary sheet.
pub fn hash_links_table(anchors: &[AnchorLink], generated_at: DateTime<Local>) -> ReportTable {
    let mut table = ReportTable::new(
        "Hash Links",
        &["#", "Page URL", "Link Text", "Hash Link"],
        TableStyle::Banded {
            fill: 0x1E88E5,
            widths: vec![6.0, 60.0, 40.0, 25.0],
        },
    );
    table.rows = anchors
        .iter()
        .enumerate()
        .map(|(i, a)| {
            let text = if a.text.is_empty() { NO_TEXT } else { a.text.as_str() };
            vec![
                Cell::from(i + 1),
                Cell::from(a.page_url.as_str()),
                Cell::from(text),
                Cell::from(a.href.as_str()),
            ]
        })
        .collect();
    table.summary = Some(Summary {
        title: "Hash Link Report".to_string(),
        title_color: 0x1E88E5,
        generated_at: generated_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        total: anchors.len(),
    });
    table
}

/// `Text | Href | Class | Name` for placeholder anchors.
pub fn placeholder_table(anchors: &[AnchorLink]) -> ReportTable {
    let mut table = ReportTable::new("Links", &["Text", "Href", "Class", "Name"], TableStyle::Plain);
    table.rows = anchors
        .iter()
        .map(|a| {
            vec![
                Cell::from(a.text.as_str()),
                Cell::from(a.href.as_str()),
                Cell::from(a.classes.join(" ")),
                Cell::from(a.name.clone().unwrap_or_default()),
            ]
        })
        .collect();
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn anchor(text: &str, href: &str) -> AnchorLink {
        AnchorLink {
            page_url: "https://site.test/".to_string(),
            href: href.to_string(),
            text: text.to_string(),
            classes: vec!["nav".to_string(), "link".to_string()],
            name: None,
        }
    }

    #[test]
    fn test_routes_table_numbers_rows_and_joins_urls() {
        let base = Url::parse("https://site.test/").unwrap();
        let table = routes_table(&base, &["/".to_string(), "/about".to_string()]);
        assert_eq!(table.headers, vec!["S.No", "Route", "Full URL", "HTTP Method"]);
        assert_eq!(
            table.rows[1],
            vec![
                Cell::Number(2.0),
                Cell::from("/about"),
                Cell::from("https://site.test/about"),
                Cell::from("GET"),
            ]
        );
    }

    #[test]
    fn test_hash_table_fills_missing_text_and_summary() {
        let at = Local.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap();
        let table = hash_links_table(&[anchor("", "#"), anchor("Top", "#top")], at);
        assert_eq!(table.rows[0][2], Cell::from(NO_TEXT));
        assert_eq!(table.rows[1][2], Cell::from("Top"));
        let summary = table.summary.unwrap();
        assert_eq!(summary.total, 2);
        assert_eq!(summary.generated_at, "2026-01-02 03:04:05");
    }

    #[test]
    fn test_placeholder_table_joins_classes() {
        let table = placeholder_table(&[anchor("Menu", "#")]);
        assert_eq!(
            table.rows[0],
            vec![
                Cell::from("Menu"),
                Cell::from("#"),
                Cell::from("nav link"),
                Cell::from(""),
            ]
        );
    }

    #[test]
    fn test_requests_table_sheet_names() {
        let links = vec![ObservedLink::get("https://site.test/a.rsc")];
        assert_eq!(requests_table(HarvestMode::RscRoutes, &links).sheet, "RSC Routes");
        assert_eq!(requests_table(HarvestMode::ApiRoutes, &links).sheet, "API Routes");
        assert_eq!(requests_table(HarvestMode::ApiRoutes, &[]).len(), 0);
    }
}
