//! Progress display and run summary.

use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use sitefreeze_core::ExportReport;

/// Per-page crawl progress. Length is unknown up front (the sitemap is
/// built mid-run), so the bar counts completed pages.
pub fn crawl_progress(quiet: bool) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {pos} pages  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb
}

/// Print the run summary and itemize any failed pages.
pub fn print_summary(report: &ExportReport, quiet: bool) {
    if quiet {
        return;
    }

    if report.failures.is_empty() {
        println!(
            "{} {} pages exported ({} fetch attempts)",
            "✓".green().bold(),
            report.pages_written,
            report.attempts
        );
    } else {
        println!(
            "{} {} of {} pages exported, {} failed",
            "⚠".yellow().bold(),
            report.pages_written,
            report.pages_total,
            report.failures.len()
        );
        for failure in &report.failures {
            eprintln!("  {} {}: {}", "✗".red(), failure.path, failure.error);
        }
    }

    let assets = &report.assets;
    if assets.files_copied > 0 {
        println!("  uploads: {} files copied from local source", assets.files_copied);
    } else if assets.files_downloaded > 0 || assets.failures > 0 {
        println!(
            "  uploads: {} downloaded, {} failed",
            assets.files_downloaded, assets.failures
        );
    }
}
