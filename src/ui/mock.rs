//! Recording notifier for testing.
//!
//! `RecordingNotifier` implements [`Notifier`] and captures every message
//! for later assertion.
//!
//! # Example
//!
//! ```
//! use pipequeue::ui::{Notifier, RecordingNotifier};
//!
//! let notifier = RecordingNotifier::new();
//! notifier.info("Task completed");
//! notifier.error("Failed to connect");
//!
//! assert!(notifier.infos().contains(&"Task completed".to_string()));
//! assert_eq!(notifier.errors().len(), 1);
//! ```

use std::sync::{Mutex, MutexGuard, PoisonError};

use super::Notifier;

/// Severity of a recorded message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Warning,
    Error,
}

/// Notifier that keeps every message in memory.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    messages: Mutex<Vec<(Level, String)>>,
}

impl RecordingNotifier {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    fn messages(&self) -> MutexGuard<'_, Vec<(Level, String)>> {
        self.messages.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn push(&self, level: Level, msg: &str) {
        self.messages().push((level, msg.to_string()));
    }

    fn at(&self, level: Level) -> Vec<String> {
        self.messages()
            .iter()
            .filter(|(l, _)| *l == level)
            .map(|(_, m)| m.clone())
            .collect()
    }

    /// All messages in the order they arrived.
    pub fn all(&self) -> Vec<(Level, String)> {
        self.messages().clone()
    }

    /// Informational messages.
    pub fn infos(&self) -> Vec<String> {
        self.at(Level::Info)
    }

    /// Warning messages.
    pub fn warnings(&self) -> Vec<String> {
        self.at(Level::Warning)
    }

    /// Error messages.
    pub fn errors(&self) -> Vec<String> {
        self.at(Level::Error)
    }

    /// Forget everything recorded so far.
    pub fn clear(&self) {
        self.messages().clear();
    }
}

impl Notifier for RecordingNotifier {
    fn info(&self, msg: &str) {
        self.push(Level::Info, msg);
    }

    fn warning(&self, msg: &str) {
        self.push(Level::Warning, msg);
    }

    fn error(&self, msg: &str) {
        self.push(Level::Error, msg);
    }
}
