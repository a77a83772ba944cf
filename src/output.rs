//! CLI output formatting for the `scan` and `render` commands.
//!
//! # Output Format
//!
//! ## Scan
//!
//! ```text
//! Source 700x500, grid 7x5 (cell 100x100)
//! Candidates (2 of 35 cells)
//! 001 100x100+300+200
//!     score 17256.25, variance 16256.25, skin 1.000
//! 002 100x100+0+0
//!     score 1320.00, variance 1320.00, skin 0.000
//! ```
//!
//! ## Render
//!
//! ```text
//! Card 12345678 → card.png (1080x1350)
//!     Background: solid fill
//!     Logo: placed at 880,40 (160x80)
//!     Thumbnails: 1 placed, 1 skipped
//!         002 100x100+650+450: outside source
//!     Text: 14 lines
//!     OCR: ok
//! ```
//!
//! # Architecture
//!
//! Each command has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure: no I/O, no side effects.

use crate::imaging::{CellScore, LogoOutcome, RenderReport, SkipReason};
use crate::ocr::OcrOutcome;
use crate::types::Candidate;
use std::path::Path;

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

// ============================================================================
// Scan
// ============================================================================

pub fn format_scan_output(
    source: (u32, u32),
    grid: (u32, u32),
    cells: &[CellScore],
    candidates: &[Candidate],
) -> Vec<String> {
    let mut lines = Vec::new();
    let cell = cells
        .first()
        .map(|c| format!("cell {}x{}", c.region.width, c.region.height))
        .unwrap_or_else(|| "image smaller than grid".to_string());
    lines.push(format!(
        "Source {}x{}, grid {}x{} ({})",
        source.0, source.1, grid.0, grid.1, cell
    ));

    if candidates.is_empty() {
        lines.push("No candidates".to_string());
        return lines;
    }
    lines.push(format!(
        "Candidates ({} of {} cells)",
        candidates.len(),
        cells.len()
    ));
    for (i, c) in candidates.iter().enumerate() {
        lines.push(format!("{} {}", format_index(i + 1), c.region));
        lines.push(format!(
            "{}score {:.2}, variance {:.2}, skin {:.3}",
            indent(1),
            c.score(),
            c.variance,
            c.skin_ratio
        ));
    }
    lines
}

pub fn print_scan_output(
    source: (u32, u32),
    grid: (u32, u32),
    cells: &[CellScore],
    candidates: &[Candidate],
) {
    for line in format_scan_output(source, grid, cells, candidates) {
        println!("{}", line);
    }
}

// ============================================================================
// Render
// ============================================================================

fn logo_line(logo: &LogoOutcome) -> String {
    match logo {
        LogoOutcome::Placed {
            x,
            y,
            width,
            height,
        } => format!("placed at {},{} ({}x{})", x, y, width, height),
        LogoOutcome::NotConfigured => "not configured".to_string(),
        LogoOutcome::Missing { path } => format!("missing ({})", path.display()),
        LogoOutcome::Failed { reason } => format!("failed: {}", reason),
    }
}

fn skip_reason(reason: SkipReason) -> &'static str {
    match reason {
        SkipReason::OutsideSource => "outside source",
        SkipReason::EmptySlot => "empty slot",
        SkipReason::NoRoom => "no room above footer",
    }
}

pub fn format_render_report(
    identifier: &str,
    output: &Path,
    report: &RenderReport,
    ocr: &OcrOutcome,
) -> Vec<String> {
    let mut lines = vec![format!(
        "Card {} → {} ({}x{})",
        identifier,
        output.display(),
        report.canvas.0,
        report.canvas.1
    )];
    let background = if report.background_template {
        "template"
    } else {
        "solid fill"
    };
    lines.push(format!("{}Background: {}", indent(1), background));
    lines.push(format!("{}Logo: {}", indent(1), logo_line(&report.logo)));
    lines.push(format!(
        "{}Thumbnails: {} placed, {} skipped",
        indent(1),
        report.thumbnails_placed,
        report.skipped.len()
    ));
    for skipped in &report.skipped {
        lines.push(format!(
            "{}{} {}: {}",
            indent(2),
            format_index(skipped.rank + 1),
            skipped.region,
            skip_reason(skipped.reason)
        ));
    }
    let truncated = if report.truncated { " (truncated)" } else { "" };
    lines.push(format!(
        "{}Text: {} lines{}",
        indent(1),
        report.lines_drawn,
        truncated
    ));
    match &ocr.failure {
        Some(reason) => lines.push(format!("{}OCR: failed: {}", indent(1), reason)),
        None => lines.push(format!("{}OCR: ok", indent(1))),
    }
    lines
}

pub fn print_render_report(identifier: &str, output: &Path, report: &RenderReport, ocr: &OcrOutcome) {
    for line in format_render_report(identifier, output, report, ocr) {
        println!("{}", line);
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::SkippedThumbnail;
    use crate::types::Region;

    fn cell(x: u32, y: u32) -> CellScore {
        CellScore {
            region: Region::new(x, y, 100, 100),
            variance: 0.0,
            skin_ratio: 0.0,
        }
    }

    #[test]
    fn format_index_pads() {
        assert_eq!(format_index(1), "001");
        assert_eq!(format_index(42), "042");
        assert_eq!(format_index(100), "100");
    }

    #[test]
    fn scan_output_lists_ranked_candidates() {
        let cells = vec![cell(0, 0), cell(100, 0)];
        let candidates = vec![
            Candidate {
                region: Region::new(100, 0, 100, 100),
                variance: 16256.25,
                skin_ratio: 1.0,
            },
            Candidate {
                region: Region::new(0, 0, 100, 100),
                variance: 1320.0,
                skin_ratio: 0.0,
            },
        ];
        let lines = format_scan_output((200, 100), (2, 1), &cells, &candidates);
        assert_eq!(
            lines,
            vec![
                "Source 200x100, grid 2x1 (cell 100x100)",
                "Candidates (2 of 2 cells)",
                "001 100x100+100+0",
                "    score 17256.25, variance 16256.25, skin 1.000",
                "002 100x100+0+0",
                "    score 1320.00, variance 1320.00, skin 0.000",
            ]
        );
    }

    #[test]
    fn scan_output_without_candidates() {
        let lines = format_scan_output((6, 4), (7, 5), &[], &[]);
        assert_eq!(
            lines,
            vec![
                "Source 6x4, grid 7x5 (image smaller than grid)",
                "No candidates"
            ]
        );
    }

    #[test]
    fn render_report_shows_degraded_paths() {
        let report = RenderReport {
            canvas: (1080, 1350),
            background_template: false,
            logo: LogoOutcome::Missing {
                path: "assets/logo.png".into(),
            },
            thumbnails_placed: 1,
            skipped: vec![SkippedThumbnail {
                rank: 1,
                region: Region::new(650, 450, 100, 100),
                reason: SkipReason::OutsideSource,
            }],
            lines_drawn: 80,
            truncated: true,
        };
        let ocr = OcrOutcome {
            text: String::new(),
            failure: Some("OCR timed out after 20s".to_string()),
        };
        let lines = format_render_report("12345678", Path::new("card.png"), &report, &ocr);
        assert_eq!(
            lines,
            vec![
                "Card 12345678 → card.png (1080x1350)",
                "    Background: solid fill",
                "    Logo: missing (assets/logo.png)",
                "    Thumbnails: 1 placed, 1 skipped",
                "        002 100x100+650+450: outside source",
                "    Text: 80 lines (truncated)",
                "    OCR: failed: OCR timed out after 20s",
            ]
        );
    }

    #[test]
    fn render_report_happy_path() {
        let report = RenderReport {
            canvas: (1080, 1350),
            background_template: true,
            logo: LogoOutcome::Placed {
                x: 880,
                y: 40,
                width: 160,
                height: 80,
            },
            thumbnails_placed: 3,
            skipped: vec![],
            lines_drawn: 14,
            truncated: false,
        };
        let lines =
            format_render_report("12345678", Path::new("out.png"), &report, &OcrOutcome::default());
        assert_eq!(lines[1], "    Background: template");
        assert_eq!(lines[2], "    Logo: placed at 880,40 (160x80)");
        assert_eq!(lines[3], "    Thumbnails: 3 placed, 0 skipped");
        assert_eq!(lines[4], "    Text: 14 lines");
        assert_eq!(lines[5], "    OCR: ok");
    }
}
