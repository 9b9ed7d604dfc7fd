//! Visual theme for terminal output.

use console::{Style, Term};

/// Pipequeue's terminal theme.
#[derive(Debug, Clone)]
pub struct PipequeueTheme {
    /// Style for informational messages (green).
    pub info: Style,
    /// Style for warning messages (orange).
    pub warning: Style,
    /// Style for error messages (red bold).
    pub error: Style,
    /// Style for dim/secondary text.
    pub dim: Style,
    /// Style for task names (bold).
    pub highlight: Style,
}

impl Default for PipequeueTheme {
    fn default() -> Self {
        Self::new()
    }
}

impl PipequeueTheme {
    /// Create the colored theme.
    pub fn new() -> Self {
        Self {
            info: Style::new().green(),
            warning: Style::new().color256(208),
            error: Style::new().red().bold(),
            dim: Style::new().dim(),
            highlight: Style::new().bold(),
        }
    }

    /// Create a theme without colors (for non-TTY or NO_COLOR).
    pub fn plain() -> Self {
        Self {
            info: Style::new(),
            warning: Style::new(),
            error: Style::new(),
            dim: Style::new(),
            highlight: Style::new(),
        }
    }

    /// Pick the colored or plain theme for stderr.
    pub fn detect() -> Self {
        Self::detect_for(&Term::stderr())
    }

    /// Pick the colored or plain theme for output written to `term`.
    pub fn detect_for(term: &Term) -> Self {
        if colors_enabled_for(term) {
            Self::new()
        } else {
            Self::plain()
        }
    }

    /// Format an informational message.
    pub fn format_info(&self, msg: &str) -> String {
        format!("{}", self.info.apply_to(format!("✓ {}", msg)))
    }

    /// Format a warning message.
    pub fn format_warning(&self, msg: &str) -> String {
        format!("{}", self.warning.apply_to(format!("⚠ {}", msg)))
    }

    /// Format an error message.
    pub fn format_error(&self, msg: &str) -> String {
        format!("{}", self.error.apply_to(format!("✗ {}", msg)))
    }

    /// Format one queue entry line: name, entry task and repeat count.
    pub fn format_entry(&self, name: &str, entry: &str, repeat: u32) -> String {
        format!(
            "{} {}",
            self.highlight.apply_to(format!("◆ {}", name)),
            self.dim.apply_to(format!("({} x{})", entry, repeat))
        )
    }
}

/// Check if colors should be enabled on stderr.
pub fn should_use_colors() -> bool {
    colors_enabled_for(&Term::stderr())
}

fn colors_enabled_for(term: &Term) -> bool {
    if std::env::var("NO_COLOR").is_ok() {
        return false;
    }
    term.is_term()
}
