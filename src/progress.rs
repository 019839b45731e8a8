//! Progress reporting for the walker
//!
//! Provides real-time progress display using indicatif progress bars.

use crate::walker::{WalkProgress, WalkResult};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Progress reporter that displays walk status
#[derive(Clone)]
pub struct ProgressReporter {
    /// Progress bar
    bar: ProgressBar,
}

impl ProgressReporter {
    /// Create a new progress reporter
    pub fn new() -> Self {
        let bar = ProgressBar::new_spinner();

        // A bad template only loses the spinner glyphs
        if let Ok(spinner) = ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
        {
            bar.set_style(spinner.tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"));
        }

        bar.enable_steady_tick(Duration::from_millis(100));

        Self { bar }
    }

    /// Update the progress display
    pub fn update(&self, progress: &WalkProgress) {
        let msg = format!(
            "Depth: {} | Visited: {} | Failed: {} | Rate: {:.0}/s | Queue: {} | In flight: {}/{}",
            progress.depth,
            format_number(progress.visited),
            format_number(progress.failed),
            progress.rate(),
            progress.queued,
            progress.in_flight,
            progress.capacity,
        );

        self.bar.set_message(msg);
    }

    /// Set a status message
    pub fn set_status(&self, status: &str) {
        self.bar.set_message(status.to_string());
    }

    /// Finish the progress display with a final message
    pub fn finish(&self, message: &str) {
        self.bar.finish_with_message(message.to_string());
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

/// Format a number with thousands separators
pub fn format_number(n: u64) -> String {
    let s = n.to_string();
    let bytes: Vec<_> = s.bytes().rev().collect();

    let chunks: Vec<String> = bytes
        .chunks(3)
        .map(|chunk| chunk.iter().rev().map(|&b| b as char).collect::<String>())
        .collect();

    chunks.into_iter().rev().collect::<Vec<_>>().join(",")
}

/// Print a summary of the walk results
pub fn print_summary(result: &WalkResult) {
    let duration_secs = result.duration.as_secs_f64();
    let rate = if duration_secs > 0.0 {
        result.visited.len() as f64 / duration_secs
    } else {
        0.0
    };

    println!();
    if result.cancelled {
        let reason = result
            .cancel_reason
            .map_or_else(|| "cancelled".to_string(), |r| r.to_string());
        println!(
            "{} ({})",
            style("Walk Stopped Early").yellow().bold(),
            reason
        );
    } else {
        println!("{}", style("Walk Complete").green().bold());
    }
    println!("{}", style("─".repeat(50)).dim());
    println!(
        "  {} {}",
        style("Visited:").bold(),
        format_number(result.visited.len() as u64)
    );
    println!(
        "  {} {}",
        style("Dispatched:").bold(),
        format_number(result.stats.dispatched)
    );
    println!(
        "  {} {} depth, {} excluded, {} duplicate",
        style("Skipped:").bold(),
        format_number(result.stats.skipped_depth),
        format_number(result.stats.excluded),
        format_number(result.stats.duplicates),
    );
    println!(
        "  {} {}",
        style("Peak in flight:").bold(),
        result.stats.peak_concurrency
    );
    if result.stats.backpressure_events > 0 {
        println!(
            "  {} {}",
            style("Queue full waits:").bold(),
            format_number(result.stats.backpressure_events)
        );
    }
    println!(
        "  {} {:.2}s ({:.0} tasks/sec)",
        style("Duration:").bold(),
        duration_secs,
        rate
    );
    println!(
        "  {} {}",
        style("Started:").bold(),
        result.started_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    if !result.errors.is_empty() {
        println!(
            "  {} {}",
            style("Errors:").yellow().bold(),
            format_number(result.errors.len() as u64)
        );
    }
    println!();
}

/// Print a header at the start of the walk
pub fn print_header(source: &str, max_depth: u32, concurrency: usize, workers: usize) {
    println!();
    println!(
        "{} {}",
        style("link-walker").cyan().bold(),
        env!("CARGO_PKG_VERSION")
    );
    println!("{}", style("─".repeat(50)).dim());
    println!("  {} {}", style("Source:").bold(), source);
    println!("  {} {}", style("Max depth:").bold(), max_depth);
    println!("  {} {}", style("Concurrency:").bold(), concurrency);
    println!("  {} {}", style("Workers:").bold(), workers);
    println!();
}
