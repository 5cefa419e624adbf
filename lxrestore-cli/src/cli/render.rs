//! Terminal rendering for the restore pipeline: an indicatif download bar
//! and the import spinner.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use lxrestore::prelude::*;

use super::terminal::ActiveBar;

const DOWNLOAD_TEMPLATE: &str =
    "{msg} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta})";

/// Download bar. Draws nothing when disabled.
pub struct DownloadProgress {
    bar: ProgressBar,
    active: ActiveBar,
}

impl DownloadProgress {
    pub fn new(enabled: bool, backup_name: &str, active: ActiveBar) -> Self {
        let bar = ProgressBar::with_draw_target(Some(0), draw_target(enabled));
        let style = ProgressStyle::with_template(DOWNLOAD_TEMPLATE)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> ");
        bar.set_style(style);
        bar.set_message(backup_name.to_string());
        Self { bar, active }
    }
}

impl TransferProgress for DownloadProgress {
    fn begin(&mut self, total: u64) {
        self.bar.set_length(total);
        self.bar.set_position(0);
        self.active.set(&self.bar);
    }

    fn advance(&mut self, state: &ProgressState) {
        self.bar.set_position(state.transferred());
    }

    fn finish(&mut self, completed: bool) {
        self.active.clear();
        if completed {
            self.bar.finish_and_clear();
        } else {
            self.bar.abandon();
        }
    }
}

/// Import spinner, advanced by the status task.
pub struct SpinnerStatus {
    bar: ProgressBar,
    active: ActiveBar,
}

impl SpinnerStatus {
    pub fn new(enabled: bool, active: ActiveBar) -> Self {
        let bar = ProgressBar::with_draw_target(None, draw_target(enabled));
        let style = ProgressStyle::with_template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        bar.set_style(style);
        Self { bar, active }
    }
}

impl StatusRenderer for SpinnerStatus {
    fn start(&mut self, message: &str) {
        self.bar.set_message(message.to_string());
        self.active.set(&self.bar);
        self.bar.tick();
    }

    fn tick(&mut self) {
        self.bar.tick();
    }

    fn stop(&mut self, outcome: &UiOutcome) {
        self.active.clear();
        match outcome {
            UiOutcome::Succeeded => self.bar.finish_with_message("Instance started"),
            UiOutcome::Failed { operation, message } => self
                .bar
                .abandon_with_message(format!("{operation} failed: {message}")),
            UiOutcome::Abandoned => self.bar.abandon_with_message("Import interrupted"),
        }
    }
}

fn draw_target(enabled: bool) -> ProgressDrawTarget {
    if enabled {
        ProgressDrawTarget::stderr()
    } else {
        ProgressDrawTarget::hidden()
    }
}
