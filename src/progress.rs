//! Progress bars and tail-friendly progress logging.
//!
//! In log-only mode every bar is hidden and [`log_progress`] emits periodic
//! `tracing` events instead.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Once;
use std::time::Duration;
use tracing::info;

use crate::reconcile::{Phase, Progress};

/// Set from `--log-only` in main.
pub static LOG_ONLY: AtomicBool = AtomicBool::new(false);

pub fn set_log_only(value: bool) {
    LOG_ONLY.store(value, Ordering::Relaxed);
}

pub fn is_log_only() -> bool {
    LOG_ONLY.load(Ordering::Relaxed)
}

pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs_f64();
    if secs < 60.0 {
        format!("{:.1}s", secs)
    } else {
        format!("{:.1}m", secs / 60.0)
    }
}

fn bar_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("{msg} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec}, ETA: {eta})")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ")
}

/// Progress bar with the shared style; hidden in log-only mode.
pub fn create_progress_bar(len: u64, msg: &str) -> ProgressBar {
    let pb = ProgressBar::new(len);
    if is_log_only() {
        pb.set_draw_target(ProgressDrawTarget::hidden());
    } else {
        pb.set_style(bar_style());
    }
    pb.set_message(msg.to_string());
    pb
}

/// Spinner for loading steps with no known length.
pub fn create_spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if is_log_only() {
        pb.set_draw_target(ProgressDrawTarget::hidden());
    } else {
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{msg} {spinner} [{elapsed_precise}]")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.enable_steady_tick(Duration::from_millis(100));
    }
    pb.set_message(msg.to_string());
    pb
}

/// Log every `interval` items (and at completion), only in log-only mode.
pub fn log_progress(phase: &str, current: u64, total: u64, interval: u64) {
    if is_log_only() && should_log(current, total, interval) {
        let pct = 100.0 * current as f64 / total as f64;
        info!("[{}] {}/{} ({:.1}%)", phase, current, total, pct);
    }
}

fn should_log(current: u64, total: u64, interval: u64) -> bool {
    total > 0 && interval > 0 && (current % interval == 0 || current == total)
}

/// One bar per reconciliation phase, fed from the reconciler's progress callback.
///
/// Events from the parallel pass arrive out of order, so each event counts
/// as one step and `done` is ignored; bars finish only in [`PhaseBars::finish`].
pub struct PhaseBars {
    exact: ProgressBar,
    similarity: ProgressBar,
    exact_len: Once,
    similarity_len: Once,
}

impl PhaseBars {
    pub fn new() -> Self {
        Self {
            exact: create_progress_bar(0, Phase::Exact.label()),
            similarity: create_progress_bar(0, Phase::Similarity.label()),
            exact_len: Once::new(),
            similarity_len: Once::new(),
        }
    }

    pub fn update(&self, progress: Progress) {
        let (bar, len) = match progress.phase {
            Phase::Exact => (&self.exact, &self.exact_len),
            Phase::Similarity => (&self.similarity, &self.similarity_len),
        };
        len.call_once(|| bar.set_length(progress.total as u64));
        bar.inc(1);
        log_progress(progress.phase.label(), bar.position(), progress.total as u64, 1_000);
    }

    pub fn finish(&self) {
        self.exact.finish();
        self.similarity.finish();
    }
}

impl Default for PhaseBars {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_millis(1500)), "1.5s");
        assert_eq!(format_duration(Duration::from_secs(90)), "1.5m");
    }

    #[test]
    fn test_should_log() {
        assert!(should_log(1_000, 5_000, 1_000));
        assert!(should_log(4_321, 4_321, 1_000));
        assert!(!should_log(999, 5_000, 1_000));
        assert!(!should_log(0, 0, 1_000));
    }

    #[test]
    fn test_phase_bars_count_out_of_order_events() {
        let bars = PhaseBars::new();
        for done in [2, 1, 3] {
            bars.update(Progress {
                phase: Phase::Similarity,
                done,
                total: 3,
            });
        }
        assert_eq!(bars.similarity.length(), Some(3));
        assert_eq!(bars.similarity.position(), 3);
        assert!(!bars.similarity.is_finished());
        assert_eq!(bars.exact.position(), 0);

        bars.finish();
        assert!(bars.similarity.is_finished());
    }
}
