//! Progress reporting for set and role installs.
//!
//! The install engine emits events to a [`ProgressObserver`]; it never
//! prints. [`ConsoleReporter`] renders the events for a terminal,
//! [`SilentReporter`] drops them. Pure helpers for bars, ETA and description
//! truncation live here too so they can be tested without a terminal.

use crate::catalog::JobRole;
use crate::executor::InstallResult;
use crate::installer::{RoleReport, SetReport, failure_hint};
use crate::theme::{Symbols, Theme};
use std::time::Duration;

/// Receives install events. Every method defaults to doing nothing.
pub trait ProgressObserver {
    /// Set already recorded in the manifest; nothing will be installed
    fn set_skipped(&self, _set_id: &str) {}

    fn set_started(&self, _set_id: &str, _name: &str, _total: usize) {}

    /// `position` is 1-based. `description` is already truncated.
    fn package_started(
        &self,
        _position: usize,
        _total: usize,
        _package: &str,
        _description: Option<&str>,
    ) {
    }

    /// An attempt failed and another one will follow
    fn attempt_failed(&self, _package: &str, _attempt: u32, _max: u32, _error: &str) {}

    fn package_finished(&self, _result: &InstallResult) {}

    /// Periodic estimate of the time left in the current set
    fn eta(&self, _completed: usize, _remaining: usize, _estimate: Duration) {}

    fn set_finished(&self, _report: &SetReport) {}

    fn role_started(&self, _role: &JobRole, _total_packages: usize) {}

    fn role_finished(&self, _report: &RoleReport) {}

    fn warning(&self, _message: &str) {}
}

/// Observer that ignores everything
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentReporter;

impl ProgressObserver for SilentReporter {}

// ============================================================================
// Pure helpers
// ============================================================================

/// Shorten `text` to at most `max` characters, ending in `...` when cut.
///
/// ```
/// use envkit::progress::truncate_description;
///
/// assert_eq!(truncate_description("short", 35), "short");
/// assert_eq!(truncate_description("abcdefghij", 8), "abcde...");
/// ```
pub fn truncate_description(text: &str, max: usize) -> String {
    let text = text.trim();
    if text.chars().count() <= max {
        return text.to_string();
    }
    let keep = max.saturating_sub(3);
    let mut cut: String = text.chars().take(keep).collect();
    cut.truncate(cut.trim_end().len());
    cut.push_str("...");
    cut
}

/// Proportional bar, e.g. `███░░░░░░░` for 3 of 10
pub fn render_bar(done: usize, total: usize, width: usize) -> String {
    let filled = if total == 0 {
        width
    } else {
        (done.min(total) * width) / total
    };
    let mut bar = String::with_capacity(width * 3);
    bar.extend(std::iter::repeat_n(Symbols::BAR_FILLED, filled));
    bar.extend(std::iter::repeat_n(Symbols::BAR_EMPTY, width - filled));
    bar
}

/// Compact human duration: `42s`, `3m 05s`, `1h 02m`
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs < 60 {
        if secs == 0 && duration.as_millis() > 0 {
            return format!("{:.1}s", duration.as_secs_f64());
        }
        format!("{}s", secs)
    } else if secs < 3600 {
        format!("{}m {:02}s", secs / 60, secs % 60)
    } else {
        format!("{}h {:02}m", secs / 3600, (secs % 3600) / 60)
    }
}

/// Mean-time-per-package ETA, reported every `interval` completions
#[derive(Debug, Clone)]
pub struct EtaTracker {
    interval: usize,
    completed: usize,
    total_elapsed: Duration,
}

impl EtaTracker {
    pub fn new(interval: usize) -> Self {
        Self {
            interval: interval.max(1),
            completed: 0,
            total_elapsed: Duration::ZERO,
        }
    }

    pub fn record(&mut self, elapsed: Duration) {
        self.completed += 1;
        self.total_elapsed += elapsed;
    }

    pub fn completed(&self) -> usize {
        self.completed
    }

    /// True right after every `interval`-th completion
    pub fn is_due(&self) -> bool {
        self.completed > 0 && self.completed % self.interval == 0
    }

    /// Mean elapsed per completed package times `remaining`
    pub fn estimate(&self, remaining: usize) -> Duration {
        if self.completed == 0 {
            return Duration::ZERO;
        }
        let mean = self.total_elapsed / self.completed as u32;
        mean * remaining as u32
    }
}

// ============================================================================
// Console rendering
// ============================================================================

const BAR_WIDTH: usize = 20;
const BANNER_WIDTH: usize = 60;

/// Renders install progress to stdout
#[derive(Debug, Clone)]
pub struct ConsoleReporter {
    /// Width the package name column is padded to
    pub name_width: usize,
}

impl ConsoleReporter {
    pub fn new() -> Self {
        Self { name_width: 24 }
    }
}

impl Default for ConsoleReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressObserver for ConsoleReporter {
    fn set_skipped(&self, set_id: &str) {
        println!(
            "{} {} already installed, skipping",
            Theme::info(Symbols::SKIP),
            Theme::header(set_id)
        );
    }

    fn set_started(&self, set_id: &str, name: &str, total: usize) {
        println!();
        println!(
            "{} {} {}",
            Theme::header(format!("Installing {}", name)),
            Theme::muted(format!("[{}]", set_id)),
            Theme::highlight(format!("({} packages)", total))
        );
    }

    fn package_started(
        &self,
        position: usize,
        total: usize,
        package: &str,
        description: Option<&str>,
    ) {
        let bar = render_bar(position - 1, total, BAR_WIDTH);
        println!(
            "  {} {:>3}/{:<3} {:<width$} {}",
            Theme::progress(bar),
            position,
            total,
            package,
            Theme::muted(description.unwrap_or("")),
            width = self.name_width
        );
    }

    fn attempt_failed(&self, package: &str, attempt: u32, max: u32, error: &str) {
        let last_line = error.lines().last().unwrap_or("").trim();
        println!(
            "      {} {} attempt {}/{} failed, retrying: {}",
            Theme::warning(Symbols::RETRY),
            package,
            attempt,
            max,
            Theme::muted(truncate_description(last_line, 70))
        );
    }

    fn package_finished(&self, result: &InstallResult) {
        if result.success {
            println!(
                "      {} {}",
                Theme::success(Symbols::OK),
                Theme::muted(format_duration(result.elapsed))
            );
        } else {
            println!(
                "      {} failed after {} attempt(s)",
                Theme::error(Symbols::FAIL),
                result.attempts
            );
        }
    }

    fn eta(&self, completed: usize, remaining: usize, estimate: Duration) {
        println!(
            "  {} {} done, {} left, about {} remaining",
            Theme::info("ETA"),
            completed,
            remaining,
            Theme::highlight(format_duration(estimate))
        );
    }

    fn set_finished(&self, report: &SetReport) {
        println!(
            "  {} {} installed, {} failed in {}",
            if report.failed() == 0 {
                Theme::success(Symbols::OK)
            } else {
                Theme::warning(Symbols::WARN)
            },
            Theme::success(report.succeeded()),
            if report.failed() == 0 {
                Theme::muted(0)
            } else {
                Theme::error(report.failed())
            },
            format_duration(report.elapsed)
        );
        for result in report.results.iter().filter(|r| !r.success) {
            println!("    {} {}", Theme::error(Symbols::FAIL), result.package);
            if let Some(hint) = result.error.as_deref().and_then(failure_hint) {
                println!("      {}", Theme::muted(hint));
            }
        }
    }

    fn role_started(&self, role: &JobRole, total_packages: usize) {
        println!();
        println!("{}", Theme::rule(BANNER_WIDTH));
        println!("{}", Theme::header(&role.name));
        if !role.description.is_empty() {
            println!("{}", role.description);
        }
        println!(
            "{} sets, {} unique packages",
            Theme::highlight(role.sets.len()),
            Theme::highlight(total_packages)
        );
        if !role.install_time.is_empty() || !role.disk_size.is_empty() {
            println!(
                "Estimated time: {}  Disk: {}",
                Theme::highlight(&role.install_time),
                Theme::highlight(&role.disk_size)
            );
        }
        println!("{}", Theme::rule(BANNER_WIDTH));
    }

    fn role_finished(&self, report: &RoleReport) {
        println!();
        println!("{}", Theme::rule(BANNER_WIDTH));
        println!(
            "{} {}: {} installed, {} failed across {} sets in {}",
            if report.is_clean() {
                Theme::success(Symbols::OK)
            } else {
                Theme::warning(Symbols::WARN)
            },
            Theme::header(&report.name),
            Theme::success(report.succeeded()),
            if report.failed() == 0 {
                Theme::muted(0)
            } else {
                Theme::error(report.failed())
            },
            report.sets.len(),
            format_duration(report.elapsed)
        );
        if !report.unavailable_sets.is_empty() {
            println!(
                "  {} unavailable sets: {}",
                Theme::warning(Symbols::WARN),
                report.unavailable_sets.join(", ")
            );
        }
        println!("{}", Theme::rule(BANNER_WIDTH));
    }

    fn warning(&self, message: &str) {
        println!("{} {}", Theme::warning(Symbols::WARN), message);
    }
}
