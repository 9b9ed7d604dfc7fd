//! Progress spinners.

use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

use super::theme::PipequeueTheme;

/// A spinner shown while a run is in progress.
pub struct ProgressSpinner {
    bar: ProgressBar,
    theme: PipequeueTheme,
}

impl ProgressSpinner {
    /// Create a spinner with a message.
    pub fn new(message: &str) -> Self {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::default_spinner()
                .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
                .template("{spinner:.magenta} {msg}")
                .expect("spinner template must parse"),
        );
        bar.set_message(message.to_string());
        bar.enable_steady_tick(Duration::from_millis(80));
        Self {
            bar,
            theme: PipequeueTheme::detect(),
        }
    }

    /// Create a spinner that draws nothing.
    pub fn hidden() -> Self {
        Self {
            bar: ProgressBar::hidden(),
            theme: PipequeueTheme::plain(),
        }
    }

    /// Replace the spinner message.
    pub fn set_message(&self, msg: &str) {
        self.bar.set_message(msg.to_string());
    }

    /// Stop and leave a success line.
    pub fn finish_success(&self, msg: &str) {
        self.finish(self.theme.format_info(msg));
    }

    /// Stop and leave a warning line.
    pub fn finish_warning(&self, msg: &str) {
        self.finish(self.theme.format_warning(msg));
    }

    /// Stop and leave an error line.
    pub fn finish_error(&self, msg: &str) {
        self.finish(self.theme.format_error(msg));
    }

    fn finish(&self, line: String) {
        self.bar.set_style(
            ProgressStyle::default_spinner()
                .template("{msg}")
                .expect("finish template must parse"),
        );
        self.bar.finish_with_message(line);
    }
}
