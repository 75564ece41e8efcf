//! `.xlsx` writer for `ReportTable`s.

use super::table::{Cell, ReportTable, Summary, TableStyle};
use crate::error::{HarvestError, HarvestResult};
use rust_xlsxwriter::{Color, Format, FormatAlign, FormatBorder, Workbook, Worksheet, XlsxError};
use std::path::Path;
use tracing::{debug, warn};

/// Longest string a worksheet cell accepts, in characters.
const MAX_CELL_CHARS: usize = 32_767;

/// Write `table` to `path`, creating the parent directory if needed.
pub fn write_report(path: &Path, table: &ReportTable) -> HarvestResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let report_err = |source| HarvestError::Report {
        path: path.to_path_buf(),
        source,
    };

    let mut workbook = build_workbook(table).map_err(report_err)?;
    workbook.save(path).map_err(report_err)?;
    debug!(path = %path.display(), rows = table.len(), "report saved");
    Ok(())
}

fn build_workbook(table: &ReportTable) -> Result<Workbook, XlsxError> {
    let mut workbook = Workbook::new();

    {
        let sheet = workbook.add_worksheet();
        sheet.set_name(&table.sheet)?;
        write_data_sheet(sheet, table)?;
    }

    if let Some(summary) = &table.summary {
        let sheet = workbook.add_worksheet();
        sheet.set_name("Summary")?;
        write_summary_sheet(sheet, summary)?;
    }

    Ok(workbook)
}

fn write_data_sheet(sheet: &mut Worksheet, table: &ReportTable) -> Result<(), XlsxError> {
    let (header_format, cell_format) = match &table.style {
        TableStyle::Plain => (Format::new().set_bold(), Format::new()),
        TableStyle::BoldHeader { color } => (
            Format::new()
                .set_bold()
                .set_font_color(Color::RGB(*color))
                .set_align(FormatAlign::Center),
            Format::new(),
        ),
        TableStyle::Banded { fill, .. } => (
            Format::new()
                .set_bold()
                .set_font_color(Color::White)
                .set_background_color(Color::RGB(*fill))
                .set_border(FormatBorder::Thin)
                .set_align(FormatAlign::Center)
                .set_align(FormatAlign::VerticalCenter),
            Format::new()
                .set_border(FormatBorder::Thin)
                .set_align(FormatAlign::VerticalCenter)
                .set_text_wrap(),
        ),
    };

    for (col, header) in table.headers.iter().enumerate() {
        sheet.write_string_with_format(0, col as u16, header.as_str(), &header_format)?;
    }

    for (i, row) in table.rows.iter().enumerate() {
        let r = (i + 1) as u32;
        for (col, cell) in row.iter().enumerate() {
            let c = col as u16;
            match cell {
                Cell::Text(s) => sheet.write_string_with_format(r, c, cell_text(s), &cell_format)?,
                Cell::Number(n) => sheet.write_number_with_format(r, c, *n, &cell_format)?,
            };
        }
    }

    match &table.style {
        TableStyle::Banded { widths, .. } => {
            for (col, width) in widths.iter().enumerate() {
                sheet.set_column_width(col as u16, *width)?;
            }
        }
        TableStyle::BoldHeader { .. } => {
            sheet.autofit();
        }
        TableStyle::Plain => {}
    }

    Ok(())
}

/// `text` cut to the cell limit.
fn cell_text(text: &str) -> &str {
    match text.char_indices().nth(MAX_CELL_CHARS) {
        Some((end, _)) => {
            warn!(chars = text.chars().count(), "cell text truncated to {MAX_CELL_CHARS} characters");
            &text[..end]
        }
        None => text,
    }
}

fn write_summary_sheet(sheet: &mut Worksheet, summary: &Summary) -> Result<(), XlsxError> {
    let title = Format::new()
        .set_bold()
        .set_font_size(16)
        .set_font_color(Color::RGB(summary.title_color));

    sheet.write_string_with_format(0, 0, summary.title.as_str(), &title)?;
    sheet.write_string(2, 0, "Generated On:")?;
    sheet.write_string(2, 1, summary.generated_at.as_str())?;
    sheet.write_string(3, 0, "Total Links Found:")?;
    sheet.write_number(3, 1, summary.total as f64)?;
    sheet.set_column_width(0, 25)?;
    sheet.set_column_width(1, 50)?;
    Ok(())
}
