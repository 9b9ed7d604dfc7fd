//! User-facing notifications.
//!
//! This module provides:
//! - [`Notifier`] trait the engine reports run outcomes through
//! - [`ConsoleNotifier`] writing styled lines to the terminal
//! - [`RecordingNotifier`] capturing messages for assertions
//! - [`ProgressSpinner`] for long-running CLI work
//!
//! # Example
//!
//! ```
//! use pipequeue::ui::{Notifier, RecordingNotifier};
//!
//! let notifier = RecordingNotifier::new();
//! notifier.warning("Not connected");
//! assert_eq!(notifier.warnings(), vec!["Not connected".to_string()]);
//! ```

pub mod mock;
pub mod spinner;
pub mod terminal;
pub mod theme;

pub use mock::RecordingNotifier;
pub use spinner::ProgressSpinner;
pub use terminal::ConsoleNotifier;
pub use theme::{should_use_colors, PipequeueTheme};

/// Sink for messages meant for the person driving the engine.
///
/// Called from worker threads, so implementations take `&self`.
pub trait Notifier: Send + Sync {
    /// Report progress or a normal outcome.
    fn info(&self, msg: &str);

    /// Report something the user should act on.
    fn warning(&self, msg: &str);

    /// Report a failure.
    fn error(&self, msg: &str);
}
