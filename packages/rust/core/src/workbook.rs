//! Excel workbook with the use case catalogue of a proposal.
//!
//! One sheet: a title block, one row per use case ordered by category, and a
//! summary block with per-category counts.

use proposalgen_shared::{Document, ProposalError, Result, UseCaseCategory};
use rust_xlsxwriter::{Color, Format, Workbook, XlsxError};

pub const USE_CASE_SHEET: &str = "AI Use Cases";

const COLUMNS: [(&str, f64); 7] = [
    ("#", 5.0),
    ("Use case", 40.0),
    ("Category", 28.0),
    ("Description", 60.0),
    ("ROI", 24.0),
    ("Complexity", 14.0),
    ("Resources", 18.0),
];

const HEADER_ROW: u32 = 3;

/// Render the use case catalogue as `.xlsx` bytes.
pub fn render_workbook(doc: &Document) -> Result<Vec<u8>> {
    build(doc)
        .map_err(|e| ProposalError::Serialization(format!("workbook rendering failed: {e}")))
}

fn build(doc: &Document) -> std::result::Result<Vec<u8>, XlsxError> {
    let title = Format::new().set_bold().set_font_size(16);
    let header = Format::new()
        .set_bold()
        .set_font_color(Color::White)
        .set_background_color(Color::RGB(0x1F4E79));
    let wrap = Format::new().set_text_wrap();
    let bold = Format::new().set_bold();

    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name(USE_CASE_SHEET)?;

    sheet.write_string_with_format(0, 0, format!("AI Use Cases for {}", doc.company), &title)?;
    sheet.write_string(1, 0, format!("Industry: {}", doc.industry))?;

    for (col, (name, width)) in (0u16..).zip(COLUMNS) {
        sheet.write_string_with_format(HEADER_ROW, col, name, &header)?;
        sheet.set_column_width(col, width)?;
    }
    sheet.set_freeze_panes(HEADER_ROW + 1, 0)?;

    let mut row = HEADER_ROW + 1;
    let mut number = 0u32;
    for category in UseCaseCategory::ALL {
        for use_case in doc.use_cases.iter().filter(|u| u.category == category) {
            number += 1;
            let resources = if doc.pending_resources.contains(&use_case.title) {
                "resource pending"
            } else {
                "available"
            };
            sheet.write_number(row, 0, number)?;
            sheet.write_string(row, 1, use_case.title.as_str())?;
            sheet.write_string(row, 2, category.label())?;
            sheet.write_string_with_format(row, 3, use_case.description.as_str(), &wrap)?;
            sheet.write_string(row, 4, use_case.roi.as_str())?;
            sheet.write_string(row, 5, use_case.complexity.as_str())?;
            sheet.write_string(row, 6, resources)?;
            row += 1;
        }
    }

    row += 1;
    sheet.write_string_with_format(row, 1, "Summary", &bold)?;
    row += 1;

    let mut summary = vec![("Total use cases", doc.use_cases.len())];
    summary.extend(UseCaseCategory::ALL.into_iter().map(|category| {
        let count = doc
            .use_cases
            .iter()
            .filter(|u| u.category == category)
            .count();
        (category.label(), count)
    }));
    summary.push(("Resources pending", doc.pending_resources.len()));
    summary.push(("Citations", doc.citations.len()));

    for (label, value) in summary {
        sheet.write_string(row, 1, label)?;
        sheet.write_number(row, 2, value as f64)?;
        row += 1;
    }

    workbook.save_to_buffer()
}
