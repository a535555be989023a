//! CLI output formatting for all commands.
//!
//! # Output Format
//!
//! ## Clean
//!
//! ```text
//! Removed 2 entries from docs
//!     index.html
//!     posts
//! ```
//!
//! ## Process
//!
//! ```text
//! posts/homelab-dns/index.html
//!     images: 3 optimized, 1 missing
//!     carousels: 1
//!     preload: yes
//! about/index.html: unchanged
//!
//! Passthrough
//!     src/assets/fonts → assets/fonts (4 files)
//!
//! Processed 12 pages, rewrote 7
//! Images: 18 optimized, 1 missing, 0 failed
//! Cache: 30 cached, 6 encoded (36 total)
//! ```
//!
//! ## Export
//!
//! ```text
//! posts/homelab-dns/llms.txt
//! Skipped (not rendered): draft-post
//! Exported 5 posts
//! ```
//!
//! # Architecture
//!
//! Each command has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure: no I/O, no side effects.

use crate::export::ExportReport;
use crate::site::{BuildReport, PageResult};
use crate::transform::PageReport;
use std::path::{Path, PathBuf};

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// Singular or plural noun for a count.
fn plural(n: usize, one: &str, many: &str) -> String {
    format!("{} {}", n, if n == 1 { one } else { many })
}

/// Display `path` relative to `base` when possible.
fn display_relative(path: &Path, base: &Path) -> String {
    path.strip_prefix(base)
        .unwrap_or(path)
        .display()
        .to_string()
}

/// Non-zero counters of a page, one per line.
fn report_lines(report: &PageReport) -> Vec<String> {
    let mut lines = Vec::new();
    let images = [
        (report.images_optimized, "optimized"),
        (report.images_missing, "missing"),
        (report.images_failed, "failed"),
    ]
    .iter()
    .filter(|(n, _)| *n > 0)
    .map(|(n, label)| format!("{n} {label}"))
    .collect::<Vec<_>>();
    if !images.is_empty() {
        lines.push(format!("images: {}", images.join(", ")));
    }
    if report.carousels > 0 {
        lines.push(format!("carousels: {}", report.carousels));
    }
    if report.preloaded {
        lines.push("preload: yes".to_string());
    }
    if report.links > 0 {
        lines.push(format!("asset links: {}", report.links));
    }
    if report.details > 0 {
        lines.push(format!("details: {}", report.details));
    }
    lines
}

// ============================================================================
// Clean
// ============================================================================

pub fn format_clean_output(removed: &[PathBuf], output: &Path) -> Vec<String> {
    if removed.is_empty() {
        return vec![format!("Nothing to clean in {}", output.display())];
    }
    let mut lines = vec![format!(
        "Removed {} from {}",
        plural(removed.len(), "entry", "entries"),
        output.display()
    )];
    for path in removed {
        lines.push(format!("{}{}", indent(1), display_relative(path, output)));
    }
    lines
}

pub fn print_clean_output(removed: &[PathBuf], output: &Path) {
    for line in format_clean_output(removed, output) {
        println!("{}", line);
    }
}

// ============================================================================
// Process
// ============================================================================

/// Format one finished page as display lines.
///
/// Changed pages list their non-zero counters as indented context; unchanged
/// pages take a single line.
pub fn format_page_result(result: &PageResult) -> Vec<String> {
    let path = result.path.display();
    if !result.written {
        return vec![format!("{path}: unchanged")];
    }
    let mut lines = vec![path.to_string()];
    lines.extend(
        report_lines(&result.report)
            .into_iter()
            .map(|l| format!("{}{}", indent(1), l)),
    );
    lines
}

/// Format the summary printed after all pages are done.
pub fn format_build_summary(report: &BuildReport) -> Vec<String> {
    let mut lines = Vec::new();

    if !report.passthrough.is_empty() {
        lines.push(String::new());
        lines.push("Passthrough".to_string());
        for copy in &report.passthrough {
            lines.push(format!(
                "{}{} \u{2192} {} ({})",
                indent(1),
                copy.entry.from,
                copy.entry.to,
                plural(copy.files, "file", "files")
            ));
        }
    }

    let totals = report.totals();
    lines.push(String::new());
    lines.push(format!(
        "Processed {}, rewrote {}",
        plural(report.pages.len(), "page", "pages"),
        report.written_pages()
    ));
    lines.push(format!(
        "Images: {} optimized, {} missing, {} failed",
        totals.images_optimized, totals.images_missing, totals.images_failed
    ));
    lines.push(format!("Cache: {}", report.cache));
    lines
}

pub fn print_build_summary(report: &BuildReport) {
    for line in format_build_summary(report) {
        println!("{}", line);
    }
}

// ============================================================================
// Export
// ============================================================================

pub fn format_export_output(report: &ExportReport, output: &Path) -> Vec<String> {
    let mut lines: Vec<String> = report
        .written
        .iter()
        .map(|p| display_relative(p, output))
        .collect();
    if !report.skipped.is_empty() {
        lines.push(format!(
            "Skipped (not rendered): {}",
            report.skipped.join(", ")
        ));
    }
    lines.push(format!(
        "Exported {}",
        plural(report.written.len(), "post", "posts")
    ));
    lines
}

pub fn print_export_output(report: &ExportReport, output: &Path) {
    for line in format_export_output(report, output) {
        println!("{}", line);
    }
}
