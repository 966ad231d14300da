//! Progress reporting for the counterparty loop
//!
//! Thin wrapper over an indicatif progress bar. Hidden when disabled or when
//! stderr is not a terminal.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::io::IsTerminal;

/// Progress indicator over counterparties
pub struct SyncProgress {
    bar: ProgressBar,
}

impl SyncProgress {
    pub fn new(total: usize, enabled: bool) -> Self {
        if !enabled || !std::io::stderr().is_terminal() {
            return Self::hidden();
        }

        let bar = ProgressBar::with_draw_target(Some(total as u64), ProgressDrawTarget::stderr());
        match ProgressStyle::with_template("{msg} [{bar:40.cyan/blue}] {pos}/{len} ({eta})") {
            Ok(style) => bar.set_style(style.progress_chars("█▓▒░")),
            Err(e) => tracing::debug!(error = %e, "Progress template rejected, using default style"),
        }
        bar.set_message("Синхронизация компаний и контактов");

        Self { bar }
    }

    pub fn hidden() -> Self {
        Self {
            bar: ProgressBar::hidden(),
        }
    }

    pub fn inc(&self) {
        self.bar.inc(1);
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }

    pub fn is_finished(&self) -> bool {
        self.bar.is_finished()
    }
}

impl Drop for SyncProgress {
    fn drop(&mut self) {
        if !self.bar.is_finished() {
            self.bar.finish_and_clear();
        }
    }
}
