use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};

use crate::core::models::outcome::{AppOutcome, RunSummary};

static QUIET: AtomicBool = AtomicBool::new(false);

/// Suppress everything but errors and run summaries.
pub fn set_quiet(quiet: bool) {
    QUIET.store(quiet, Ordering::Relaxed);
}

fn quiet() -> bool {
    QUIET.load(Ordering::Relaxed)
}

/// Print a success message.
pub fn success(msg: &str) {
    if !quiet() {
        println!("  {} {}", "✓".green(), msg);
    }
}

/// Print a warning message.
pub fn warning(msg: &str) {
    if !quiet() {
        println!("  {} {}", "⚠".yellow(), msg);
    }
}

/// Print an error message.
pub fn error(msg: &str) {
    eprintln!("  {} {}", "✗".red(), msg);
}

/// Print a header line.
pub fn header(msg: &str) {
    if !quiet() {
        println!("\n{}", msg.bold());
    }
}

/// Print an indented key/value line.
pub fn detail(label: &str, value: &str) {
    if !quiet() {
        println!("  {:<12} {}", format!("{label}:").dimmed(), value);
    }
}

/// Start a spinner; hidden in quiet mode.
pub fn spinner(msg: &str) -> ProgressBar {
    if quiet() {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("  {spinner:.cyan} {msg}") {
        pb.set_style(style.tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ "));
    }
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Per-application outcome table. Printed even in quiet mode.
pub fn summary(summary: &RunSummary, run_log: &Path) {
    println!("\n{}", format!("{} summary", capitalize(&summary.operation.to_string())).bold());

    for (app, outcome) in &summary.outcomes {
        let symbol = match outcome {
            AppOutcome::Success(_) => "✓".green(),
            AppOutcome::Skipped(_) => "-".dimmed(),
            AppOutcome::Failed(_) => "✗".red(),
        };
        println!(
            "  {symbol} {:<10} {:<8} {}",
            app,
            outcome.label(),
            outcome.detail().dimmed()
        );
    }

    for note in &summary.notes {
        println!("  {} {note}", "•".dimmed());
    }
    if let Some(err) = &summary.sync_error {
        println!("  {} sync failed: {err}", "✗".red());
    }
    println!("  {}", format!("Run log: {}", run_log.display()).dimmed());
}

/// Format a byte count as a human-readable string.
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["KB", "MB", "GB", "TB"];
    if bytes < 1024 {
        return format!("{bytes} B");
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.1} {}", UNITS[unit])
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_bytes_units() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(120 * 1024 * 1024), "120.0 MB");
    }

    #[test]
    fn capitalize_operation() {
        assert_eq!(capitalize("restore"), "Restore");
        assert_eq!(capitalize(""), "");
    }
}
