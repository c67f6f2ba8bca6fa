//! Colored terminal output utilities.
//!
//! Status messages go to stderr; posting content goes to stdout so it can be
//! piped.

use console::{Style, Term};

/// Terminal output formatter.
pub(crate) struct Output {
    term: Term,
    stdout: Term,
    green: Style,
    yellow: Style,
    red: Style,
    cyan_bold: Style,
    dim: Style,
}

impl Output {
    /// Create a new output formatter.
    #[must_use]
    pub(crate) fn new() -> Self {
        Self {
            term: Term::stderr(),
            stdout: Term::stdout(),
            green: Style::new().green(),
            yellow: Style::new().yellow(),
            red: Style::new().red(),
            cyan_bold: Style::new().cyan().bold(),
            dim: Style::new().dim(),
        }
    }

    /// Print an info message.
    pub(crate) fn info(&self, msg: &str) {
        let _ = self.term.write_line(msg);
    }

    /// Print a success message (green).
    pub(crate) fn success(&self, msg: &str) {
        let _ = self.term.write_line(&self.green.apply_to(msg).to_string());
    }

    /// Print a warning message (yellow).
    pub(crate) fn warning(&self, msg: &str) {
        let _ = self.term.write_line(&self.yellow.apply_to(msg).to_string());
    }

    /// Print an error message (red).
    pub(crate) fn error(&self, msg: &str) {
        let _ = self.term.write_line(&self.red.apply_to(msg).to_string());
    }

    /// Write posting content to stdout, unstyled.
    pub(crate) fn content(&self, text: &str) {
        let _ = self.stdout.write_line(text);
    }

    /// Write one listing row to stdout: highlighted id, dimmed date, summary.
    pub(crate) fn row(&self, id: &str, date: &str, summary: &str) {
        let _ = self.stdout.write_line(&format!(
            "{}  {}  {summary}",
            self.cyan_bold.apply_to(id),
            self.dim.apply_to(date)
        ));
    }
}
