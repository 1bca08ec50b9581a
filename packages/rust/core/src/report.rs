//! Report files for a finished run.
//!
//! The Markdown report and the use case workbook are rendered from the
//! [`Document`] alone; the JSON dump is the whole [`Run`]. Every file is
//! written atomically (temp file, then rename) and checksummed.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use proposalgen_shared::{Document, ProposalError, Result, Run, UseCaseCategory};
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument};

use crate::workbook::render_workbook;

/// One file written for a report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportFile {
    pub path: PathBuf,
    pub sha256: String,
    pub size_bytes: usize,
}

/// Files written by [`write_report`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportFiles {
    /// Only runs with a document get a Markdown report and a workbook.
    pub markdown: Option<ReportFile>,
    pub workbook: Option<ReportFile>,
    pub json: ReportFile,
}

// ---------------------------------------------------------------------------
// Markdown
// ---------------------------------------------------------------------------

/// Render the consolidated proposal as Markdown.
pub fn render_markdown(doc: &Document) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# AI Adoption Proposal: {}\n", doc.company);
    let _ = writeln!(out, "*Industry: {}*\n", doc.industry);

    for (i, section) in doc.sections.iter().enumerate() {
        let _ = writeln!(out, "## {}. {}\n", i + 1, section.title);
        let _ = writeln!(out, "{}\n", section.body.trim());
    }

    if !doc.use_cases.is_empty() {
        out.push_str("## Appendix A: Use Case Catalogue\n\n");
        for category in UseCaseCategory::ALL {
            let in_category: Vec<_> = doc
                .use_cases
                .iter()
                .filter(|u| u.category == category)
                .collect();
            if in_category.is_empty() {
                continue;
            }
            let _ = writeln!(out, "### {} ({})\n", category.label(), in_category.len());
            out.push_str("| Use case | ROI | Complexity | Resources |\n");
            out.push_str("|---|---|---|---|\n");
            for use_case in in_category {
                let resources = if doc.pending_resources.contains(&use_case.title) {
                    "resource pending"
                } else {
                    "available"
                };
                let _ = writeln!(
                    out,
                    "| {} | {} | {} | {} |",
                    cell(&use_case.title),
                    cell(&use_case.roi),
                    cell(&use_case.complexity),
                    resources
                );
            }
            out.push('\n');
        }
    }

    if !doc.pending_resources.is_empty() {
        out.push_str("## Appendix B: Resources Pending\n\n");
        for title in &doc.pending_resources {
            let _ = writeln!(out, "- {title}: resource pending");
        }
        out.push('\n');
    }

    if !doc.citations.is_empty() {
        out.push_str("## References\n\n");
        for (i, citation) in doc.citations.iter().enumerate() {
            let _ = writeln!(
                out,
                "{}. [{}]({}) ({})",
                i + 1,
                citation.title.replace(['[', ']'], ""),
                citation.url,
                citation.tier.as_str()
            );
        }
    }

    out
}

/// Table cell text: single line, no pipes, dash when empty.
fn cell(text: &str) -> String {
    let text = text.trim();
    if text.is_empty() {
        return "-".into();
    }
    text.replace('|', "/").replace(['\n', '\r'], " ")
}

// ---------------------------------------------------------------------------
// Files
// ---------------------------------------------------------------------------

/// Write `<company>_<run-id>.md` and `.xlsx` (when the run has a document)
/// and `<company>_<run-id>.json` into `dir`.
#[instrument(skip_all, fields(run_id = %run.id, dir = %dir.display()))]
pub fn write_report(dir: &Path, run: &Run) -> Result<ReportFiles> {
    std::fs::create_dir_all(dir).map_err(|e| ProposalError::io(dir, e))?;
    let stem = format!("{}_{}", run.input.company_slug(), run.id);

    let (markdown, workbook) = match &run.document {
        Some(doc) => {
            let markdown = write_atomic(
                &dir.join(format!("{stem}.md")),
                render_markdown(doc).as_bytes(),
            )?;
            let workbook =
                write_atomic(&dir.join(format!("{stem}.xlsx")), &render_workbook(doc)?)?;
            (Some(markdown), Some(workbook))
        }
        None => (None, None),
    };

    let json = serde_json::to_string_pretty(run)
        .map_err(|e| ProposalError::Serialization(format!("run serialization failed: {e}")))?;
    let json = write_atomic(&dir.join(format!("{stem}.json")), json.as_bytes())?;

    info!(
        markdown = markdown.is_some(),
        workbook = workbook.is_some(),
        "report written"
    );
    Ok(ReportFiles {
        markdown,
        workbook,
        json,
    })
}

fn write_atomic(target: &Path, content: &[u8]) -> Result<ReportFile> {
    let file_name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let temp = target.with_file_name(format!(".{file_name}.tmp"));

    std::fs::write(&temp, content).map_err(|e| ProposalError::io(&temp, e))?;
    std::fs::rename(&temp, target).map_err(|e| ProposalError::io(target, e))?;

    let mut hasher = Sha256::new();
    hasher.update(content);
    let sha256 = format!("{:x}", hasher.finalize());

    debug!(path = %target.display(), size = content.len(), "wrote report file");
    Ok(ReportFile {
        path: target.to_path_buf(),
        sha256,
        size_bytes: content.len(),
    })
}

#[cfg(test)]
mod tests {
    use proposalgen_shared::{
        Citation, DocumentSection, FailureKind, FailureReason, ProposalInput, SectionKind,
        StageName, TrustTier, UseCase,
    };

    use calamine::Reader;

    use super::*;

    fn temp_dir() -> PathBuf {
        std::env::temp_dir().join(format!("proposalgen-report-{}", uuid::Uuid::now_v7()))
    }

    fn document() -> Document {
        Document {
            company: "Acme Foods".into(),
            industry: "Food & Beverage".into(),
            sections: SectionKind::ALL
                .iter()
                .map(|k| DocumentSection {
                    title: k.title().into(),
                    body: format!("About {}.", k.title()),
                })
                .collect(),
            use_cases: vec![
                UseCase {
                    title: "Demand forecasting".into(),
                    category: UseCaseCategory::PredictiveAnalytics,
                    description: "Forecast demand.".into(),
                    roi: "10% less waste".into(),
                    complexity: "medium".into(),
                },
                UseCase {
                    title: "Label OCR".into(),
                    category: UseCaseCategory::ComputerVision,
                    description: "Read labels.".into(),
                    roi: "".into(),
                    complexity: "low | medium".into(),
                },
            ],
            citations: vec![Citation {
                url: "https://www.fao.org/report".into(),
                title: "FAO [2024] report".into(),
                tier: TrustTier::Primary,
            }],
            pending_resources: vec!["Label OCR".into()],
        }
    }

    #[test]
    fn markdown_has_numbered_sections_and_references() {
        let md = render_markdown(&document());
        assert!(md.starts_with("# AI Adoption Proposal: Acme Foods\n"));
        assert!(md.contains("## 1. Executive Summary"));
        assert!(md.contains("## 8. Next Steps"));
        assert!(md.contains("1. [FAO 2024 report](https://www.fao.org/report) (primary)"));
    }

    #[test]
    fn use_case_table_marks_pending_resources() {
        let md = render_markdown(&document());
        // category order follows the fixed catalogue, not insertion order
        let cv = md.find("### Computer Vision (1)").unwrap();
        let pa = md.find("### Predictive Analytics & ML (1)").unwrap();
        assert!(cv < pa);
        assert!(md.contains("| Label OCR | - | low / medium | resource pending |"));
        assert!(md.contains("| Demand forecasting | 10% less waste | medium | available |"));
        assert!(md.contains("- Label OCR: resource pending"));
    }

    #[test]
    fn rendering_is_deterministic() {
        assert_eq!(render_markdown(&document()), render_markdown(&document()));
    }

    #[test]
    fn write_report_writes_all_files() {
        let dir = temp_dir();
        let mut run = Run::new(ProposalInput::new("Acme Foods", "Food & Beverage").unwrap());
        run.document = Some(document());

        let files = write_report(&dir, &run).unwrap();
        let md = files.markdown.expect("markdown written");
        assert_eq!(
            md.path.file_name().unwrap().to_string_lossy(),
            format!("acme-foods_{}.md", run.id)
        );
        assert_eq!(md.sha256.len(), 64);
        assert_eq!(std::fs::read_to_string(&md.path).unwrap(), render_markdown(&document()));

        let xlsx = files.workbook.expect("workbook written");
        assert_eq!(
            xlsx.path.file_name().unwrap().to_string_lossy(),
            format!("acme-foods_{}.xlsx", run.id)
        );
        let mut book = calamine::open_workbook_auto(&xlsx.path).unwrap();
        let range = book
            .worksheet_range(crate::workbook::USE_CASE_SHEET)
            .unwrap();
        let use_case_rows = range
            .rows()
            .filter(|r| r.iter().any(|c| c.to_string() == "Label OCR"))
            .count();
        assert_eq!(use_case_rows, 1);

        let back: Run =
            serde_json::from_str(&std::fs::read_to_string(&files.json.path).unwrap()).unwrap();
        assert_eq!(back, run);

        let leftovers = std::fs::read_dir(&dir)
            .unwrap()
            .filter(|e| e.as_ref().unwrap().file_name().to_string_lossy().ends_with(".tmp"))
            .count();
        assert_eq!(leftovers, 0);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn failed_run_gets_json_only() {
        let dir = temp_dir();
        let mut run = Run::new(ProposalInput::new("Acme", "Retail").unwrap());
        run.fail(FailureReason::new(
            StageName::Research,
            FailureKind::ModelUnavailable,
            "HTTP 503",
        ))
        .unwrap();

        let files = write_report(&dir, &run).unwrap();
        assert!(files.markdown.is_none());
        assert!(files.workbook.is_none());
        assert!(files.json.path.exists());
        let _ = std::fs::remove_dir_all(&dir);
    }
}
