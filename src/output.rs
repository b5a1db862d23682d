//! Output formatting and styling module.
//!
//! All user-facing terminal output goes through [`OutputFormatter`]; library
//! diagnostics go through `log` instead.

use crate::batch::BatchReport;
use crate::models::{CleanupSettings, CustomFolderAlias, RedirectRule};
use crate::rules::ApplyReport;
use crate::schedule::{CategoryOutcome, PassReport};
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;

/// Manages all CLI output with consistent styling and formatting.
///
/// - Success messages (green with ✓)
/// - Error messages (red with ✗)
/// - Warning messages (yellow with ⚠)
/// - Info messages (cyan)
/// - Progress bars and report tables
pub struct OutputFormatter;

impl OutputFormatter {
    /// Prints a success message in green with a checkmark.
    ///
    /// ```no_run
    /// use peanut::output::OutputFormatter;
    /// OutputFormatter::success("Rule added");
    /// ```
    pub fn success(message: &str) {
        println!("{} {}", "✓".green(), message);
    }

    /// Prints an error message in red with an X mark, on stderr.
    pub fn error(message: &str) {
        eprintln!("{} {}", "✗".red(), message);
    }

    pub fn warning(message: &str) {
        println!("{} {}", "⚠".yellow(), message);
    }

    pub fn info(message: &str) {
        println!("{}", message.cyan());
    }

    pub fn plain(message: &str) {
        println!("{}", message);
    }

    pub fn header(header: &str) {
        println!("\n{}", header.bold());
    }

    /// Creates a progress bar; the length is set by the operation using it.
    ///
    /// ```no_run
    /// use peanut::output::OutputFormatter;
    /// let pb = OutputFormatter::create_progress_bar();
    /// pb.set_length(10);
    /// pb.inc(1);
    /// pb.finish_and_clear();
    /// ```
    pub fn create_progress_bar() -> ProgressBar {
        let pb = ProgressBar::new(0);
        if let Ok(style) =
            ProgressStyle::default_bar().template("{spinner:.cyan} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        {
            pb.set_style(style.progress_chars("█▓░"));
        }
        pb
    }

    /// Prints the schedule and category flags.
    pub fn settings_table(settings: &CleanupSettings, remaining: &str) {
        Self::header("AUTO CLEAN");
        println!("{:<16} | {}", "Frequency".bold(), settings.frequency);
        println!("{:<16} | {}", "Next pass in".bold(), remaining);
        println!("{}", "-".repeat(32));
        for category in crate::models::CleanupCategory::PASS_ORDER {
            let state = if settings.is_enabled(category) {
                "on".green()
            } else {
                "off".dimmed()
            };
            println!("{:<16} | {}", category.label(), state);
        }
    }

    /// Prints the per-category outcome of a cleanup pass.
    pub fn pass_summary(report: &PassReport) {
        if !report.executed {
            Self::info("Cleanup is not due yet. Use --force to run it now.");
            return;
        }

        Self::header("CLEANUP SUMMARY");
        let width = report
            .categories
            .iter()
            .map(|(c, _)| c.label().len())
            .max()
            .unwrap_or(0)
            .max(8);

        println!("{:<width$} | {}", "Category".bold(), "Result".bold(), width = width);
        println!("{}", "-".repeat(width + 24));
        for (category, outcome) in &report.categories {
            let result = match outcome {
                CategoryOutcome::Completed(r) if r.failures.is_empty() => format!(
                    "{} removed, {}",
                    r.removed.len().to_string().green(),
                    format_bytes(r.bytes_freed)
                ),
                CategoryOutcome::Completed(r) => format!(
                    "{} removed, {} failed",
                    r.removed.len().to_string().green(),
                    r.failures.len().to_string().red()
                ),
                CategoryOutcome::Failed(reason) => reason.red().to_string(),
            };
            println!("{:<width$} | {}", category.label(), result, width = width);
        }
        println!("{}", "-".repeat(width + 24));
        println!(
            "{:<width$} | {} removed, {} freed",
            "Total".bold(),
            report.files_removed().to_string().green().bold(),
            format_bytes(report.bytes_freed()),
            width = width
        );
    }

    pub fn rules_table(rules: &[RedirectRule]) {
        if rules.is_empty() {
            Self::info("No redirect rules.");
            return;
        }
        Self::header("REDIRECT RULES");
        let keyword_width = rules.iter().map(|r| r.keyword.len()).max().unwrap_or(0).max(7);
        let source_width = rules.iter().map(|r| r.source.len()).max().unwrap_or(0).max(6);
        println!(
            "{:>4} | {:<kw$} | {:<src$} | {}",
            "Id".bold(),
            "Keyword".bold(),
            "Source".bold(),
            "Destination".bold(),
            kw = keyword_width,
            src = source_width
        );
        println!("{}", "-".repeat(keyword_width + source_width + 30));
        for rule in rules {
            println!(
                "{:>4} | {:<kw$} | {:<src$} | {}",
                rule.id,
                rule.keyword,
                rule.source,
                rule.destination,
                kw = keyword_width,
                src = source_width
            );
        }
    }

    pub fn apply_summary(report: &ApplyReport) {
        for (from, to) in &report.moved {
            println!("  {} → {}", from.display(), to.display().to_string().green());
        }
        for (id, reason) in &report.skipped_rules {
            Self::warning(&format!("Rule {} skipped: {}", id, reason));
        }
        Self::failures(&report.failed);
        Self::success(&format!("{} files moved", report.moved.len()));
    }

    pub fn custom_folders(slots: &[(u8, Option<CustomFolderAlias>)]) {
        Self::header("CUSTOM FOLDERS");
        for (slot, alias) in slots {
            match alias {
                Some(a) => println!("  {} | {} ({})", slot, a.display_name.bold(), a.path),
                None => println!("  {} | {}", slot, "unset".dimmed()),
            }
        }
    }

    /// Prints the outcome of a batch operation, with `verb` in past tense.
    pub fn batch_summary(verb: &str, report: &BatchReport) {
        for (path, reason) in &report.skipped {
            println!("  {} {}: {}", "-".yellow(), path.display(), reason);
        }
        Self::failures(&report.failed);

        let message = format!("{} of {} {}", report.completed.len(), report.total(), verb);
        if report.failed.is_empty() {
            Self::success(&message);
        } else {
            Self::warning(&message);
        }
    }

    fn failures(failed: &[(PathBuf, String)]) {
        for (path, reason) in failed {
            eprintln!("  {} {}: {}", "✗".red(), path.display(), reason);
        }
    }
}

/// Formats a byte count with a binary unit.
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} B", bytes)
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}
