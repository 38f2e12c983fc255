//! Progress tracking for export operations
//!
//! This module provides a progress bar for interactive exports, giving users
//! real-time feedback while pages are written. Scheduled runs disable the bar
//! and rely on the returned status instead.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use indicatif::{ProgressBar, ProgressStyle};

/// Progress tracker for export operations
///
/// Tracks the entry offset against the matching total and displays a
/// progress bar with entries per second.
pub struct ProgressTracker {
    /// Number of entries processed so far, resumed offset included
    processed: AtomicU64,
    /// Start time of the operation
    start_time: Instant,
    /// Offset the invocation started at, excluded from the speed figure
    start_offset: u64,
    /// Progress bar (optional, can be disabled)
    bar: Option<ProgressBar>,
}

impl ProgressTracker {
    /// Create a new progress tracker
    ///
    /// # Arguments
    /// * `total` - Number of matching entries
    /// * `start_offset` - Offset the invocation resumes from
    /// * `enable_bar` - Whether to display a progress bar
    pub fn new(total: u64, start_offset: u64, enable_bar: bool) -> Self {
        let bar = if enable_bar {
            let bar = ProgressBar::new(total);
            if let Ok(style) = ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} entries {msg}")
            {
                bar.set_style(style.progress_chars("#>-"));
            }
            bar.set_position(start_offset.min(total));
            Some(bar)
        } else {
            None
        };

        Self {
            processed: AtomicU64::new(start_offset),
            start_time: Instant::now(),
            start_offset,
            bar,
        }
    }

    /// Update progress with the current offset
    pub fn update(&self, offset: u64) {
        self.processed.store(offset, Ordering::Relaxed);

        if let Some(ref bar) = self.bar {
            bar.set_position(offset.min(bar.length().unwrap_or(offset)));

            let elapsed = self.start_time.elapsed().as_secs_f64();
            if elapsed > 0.0 {
                let speed = offset.saturating_sub(self.start_offset) as f64 / elapsed;
                bar.set_message(format!("({:.0} entries/sec)", speed));
            }
        }
    }

    /// Entries processed so far
    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    /// Finish and clear the progress bar
    pub fn finish(&self) {
        if let Some(ref bar) = self.bar {
            bar.finish_and_clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_tracker_resumed_offset() {
        let tracker = ProgressTracker::new(45, 20, false);
        assert_eq!(tracker.processed(), 20);
        tracker.update(40);
        assert_eq!(tracker.processed(), 40);
        tracker.finish();
    }
}
