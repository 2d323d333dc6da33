//! Progress reporting for the dispatcher
//!
//! Provides a live spinner using indicatif and the start/finish banners.

use crate::dispatch::{DispatchReport, StatsSnapshot};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Progress information for display
#[derive(Debug, Clone, Copy)]
pub struct DispatchProgress {
    /// Counters at this instant
    pub stats: StatsSnapshot,

    /// Jobs waiting in the queue
    pub queue_depth: usize,

    /// Total drivers
    pub workers: usize,

    /// Elapsed time
    pub elapsed: Duration,
}

impl DispatchProgress {
    /// Completed jobs per second
    pub fn reports_per_second(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.stats.reports_collected as f64 / secs
        } else {
            0.0
        }
    }

    /// Share of generated jobs that were dropped, 0.0 to 1.0
    pub fn drop_ratio(&self) -> f64 {
        if self.stats.jobs_generated == 0 {
            0.0
        } else {
            self.stats.jobs_dropped as f64 / self.stats.jobs_generated as f64
        }
    }
}

/// Progress reporter that displays dispatch status
pub struct ProgressReporter {
    /// Progress bar
    bar: ProgressBar,
}

impl ProgressReporter {
    /// Create a new progress reporter
    pub fn new() -> Self {
        let bar = ProgressBar::new_spinner();

        bar.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} [{elapsed_precise}] {msg}")
                .expect("Invalid progress template")
                .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"),
        );

        bar.enable_steady_tick(Duration::from_millis(100));

        Self { bar }
    }

    /// Update the progress display
    pub fn update(&self, progress: &DispatchProgress) {
        let msg = format!(
            "Jobs: {} | Dropped: {} ({:.0}%) | Completed: {} | Rate: {:.1}/s | Queue: {} | Drivers: {}",
            format_number(progress.stats.jobs_generated),
            format_number(progress.stats.jobs_dropped),
            progress.drop_ratio() * 100.0,
            format_number(progress.stats.reports_collected),
            progress.reports_per_second(),
            progress.queue_depth,
            progress.workers,
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
fn format_number(n: u64) -> String {
    let s = n.to_string();
    let bytes: Vec<_> = s.bytes().rev().collect();

    let chunks: Vec<String> = bytes
        .chunks(3)
        .map(|chunk| chunk.iter().rev().map(|&b| b as char).collect::<String>())
        .collect();

    chunks.into_iter().rev().collect::<Vec<_>>().join(",")
}

/// Print a summary of the run
pub fn print_summary(report: &DispatchReport) {
    let stats = &report.stats;
    let duration_secs = report.duration.as_secs_f64();

    println!();
    println!("{}", style("Dispatch Complete").green().bold());
    println!("{}", style("─".repeat(50)).dim());
    println!(
        "  {} {}",
        style("Jobs generated:").bold(),
        format_number(stats.jobs_generated)
    );
    println!(
        "  {} {}",
        style("Jobs queued:").bold(),
        format_number(stats.jobs_accepted)
    );
    if stats.jobs_dropped > 0 {
        println!(
            "  {} {}",
            style("Jobs dropped:").yellow().bold(),
            format_number(stats.jobs_dropped)
        );
    }
    println!(
        "  {} {} ({} distance units)",
        style("Trips reported:").bold(),
        format_number(stats.reports_collected),
        format_number(stats.distance_collected)
    );
    for worker in &report.workers {
        println!(
            "    {} {} trips, {} reported, {} driven",
            style(format!("driver {}:", worker.worker_id)).dim(),
            worker.jobs_completed,
            format_number(worker.distance_reported),
            format_number(worker.distance_driven)
        );
    }
    println!(
        "  {} {}",
        style("Sentinels sent:").bold(),
        stats.sentinels_sent
    );
    println!(
        "  {} {} removed",
        style("Queues:").bold(),
        report.teardown.removed.len()
    );
    println!("  {} {:.1}s", style("Duration:").bold(), duration_secs);
    println!();
}

/// Print a header at the start of the run
pub fn print_header(workers: usize, run_for: Option<Duration>, queue_capacity: usize) {
    let run_for = match run_for {
        Some(d) => format!("{}s", d.as_secs()),
        None => "until interrupted".to_string(),
    };

    println!();
    println!(
        "{} {}",
        style("fleet-dispatch").cyan().bold(),
        env!("CARGO_PKG_VERSION")
    );
    println!("{}", style("─".repeat(50)).dim());
    println!("  {} {}", style("Drivers:").bold(), workers);
    println!("  {} {}", style("Run time:").bold(), run_for);
    println!("  {} {}", style("Queue capacity:").bold(), queue_capacity);
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(1000), "1,000");
        assert_eq!(format_number(1234567), "1,234,567");
    }

    #[test]
    fn test_progress_rates() {
        let progress = DispatchProgress {
            stats: StatsSnapshot {
                jobs_generated: 40,
                jobs_dropped: 10,
                reports_collected: 20,
                ..Default::default()
            },
            queue_depth: 3,
            workers: 2,
            elapsed: Duration::from_secs(10),
        };

        assert!((progress.reports_per_second() - 2.0).abs() < 1e-9);
        assert!((progress.drop_ratio() - 0.25).abs() < 1e-9);
    }
}
