//! Terminal notifier.

use console::Term;

use super::theme::PipequeueTheme;
use super::Notifier;

/// Writes notifications to stderr using the terminal theme.
#[derive(Debug, Clone)]
pub struct ConsoleNotifier {
    term: Term,
    theme: PipequeueTheme,
}

impl Default for ConsoleNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl ConsoleNotifier {
    /// Create a notifier for stderr, colored when the terminal allows.
    pub fn new() -> Self {
        Self {
            term: Term::stderr(),
            theme: PipequeueTheme::detect(),
        }
    }

    fn write(&self, line: String) {
        // Nothing sensible to do if stderr is gone.
        let _ = self.term.write_line(&line);
    }
}

impl Notifier for ConsoleNotifier {
    fn info(&self, msg: &str) {
        self.write(self.theme.format_info(msg));
    }

    fn warning(&self, msg: &str) {
        self.write(self.theme.format_warning(msg));
    }

    fn error(&self, msg: &str) {
        self.write(self.theme.format_error(msg));
    }
}
