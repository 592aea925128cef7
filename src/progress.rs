//! Progress bar and logging utilities.
//!
//! Provides helpers for creating progress bars and spinners, with support
//! for log-only mode where progress bars are hidden for tail-friendly output.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::time::Duration;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ProgressMode {
    /// Interactive progress bars on stderr
    #[default]
    Bars,
    /// No bars; periodic `[phase] n/total` lines instead
    LogOnly,
    /// Nothing at all (library callers, tests)
    Quiet,
}

/// Progress reporting handle, passed to long-running phases.
#[derive(Clone, Copy, Debug, Default)]
pub struct Progress {
    mode: ProgressMode,
}

impl Progress {
    pub fn new(mode: ProgressMode) -> Self {
        Self { mode }
    }

    pub fn quiet() -> Self {
        Self::new(ProgressMode::Quiet)
    }

    pub fn is_log_only(&self) -> bool {
        self.mode == ProgressMode::LogOnly
    }

    fn shows_bars(&self) -> bool {
        self.mode == ProgressMode::Bars
    }

    /// Create a progress bar with consistent styling.
    /// Outside `Bars` mode, the progress bar is hidden.
    pub fn bar(&self, len: u64, msg: &str) -> ProgressBar {
        let pb = ProgressBar::new(len);
        if self.shows_bars() {
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("{msg} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec}, ETA: {eta})")
                    .unwrap()
                    .progress_chars("=> "),
            );
        } else {
            pb.set_draw_target(ProgressDrawTarget::hidden());
        }
        pb.set_message(msg.to_string());
        pb
    }

    /// Create a spinner for indeterminate progress.
    /// Outside `Bars` mode, the spinner is hidden.
    pub fn spinner(&self, msg: &str) -> ProgressBar {
        let pb = ProgressBar::new_spinner();
        if self.shows_bars() {
            pb.set_style(
                ProgressStyle::default_spinner()
                    .template("{msg} {spinner} [{elapsed_precise}]")
                    .unwrap(),
            );
            pb.enable_steady_tick(Duration::from_millis(100));
        } else {
            pb.set_draw_target(ProgressDrawTarget::hidden());
        }
        pb.set_message(msg.to_string());
        pb
    }

    /// Log progress periodically for tail-friendly output.
    /// Only logs in log-only mode and at specified intervals.
    pub fn log(&self, phase: &str, current: u64, total: u64, interval: u64) {
        if let Some(line) = self.log_line(phase, current, total, interval) {
            eprintln!("{}", line);
        }
    }

    fn log_line(&self, phase: &str, current: u64, total: u64, interval: u64) -> Option<String> {
        if !self.is_log_only() || total == 0 {
            return None;
        }
        if current % interval.max(1) == 0 || current == total {
            let pct = 100.0 * current as f64 / total as f64;
            Some(format!("[{}] {}/{} ({:.1}%)", phase, current, total, pct))
        } else {
            None
        }
    }
}

/// Format duration in human-readable format
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs_f64();
    if secs < 60.0 {
        format!("{:.1}s", secs)
    } else {
        let mins = secs / 60.0;
        format!("{:.1}m", mins)
    }
}
