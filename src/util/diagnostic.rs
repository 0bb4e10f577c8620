//! User-facing diagnostic messages.
//!
//! Every fatal error is rendered with its root cause, the context that led
//! to it, and suggested fixes.

use std::fmt;

/// Common suggestion messages for consistent error handling.
pub mod suggestions {
    /// Suggestion when a configure option is not recognised.
    pub const SEE_HELP: &str = "Run with `--help` to list the available options";

    /// Suggestion when a required feature could not be enabled.
    pub const SEE_LOG: &str = "Inspect config.log in the build directory for the failing command";

    /// Suggestion for defects in the check catalogue.
    pub const FIX_CATALOGUE: &str =
        "This is a bug in the check catalogue, not in your configuration";
}

/// Severity level for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Bug,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Bug => write!(f, "internal error"),
        }
    }
}

/// A diagnostic message with optional suggestions.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    /// Primary message
    pub message: String,
    /// Severity level
    pub severity: Severity,
    /// Diagnostic code (e.g. `autoprobe::option::unknown`)
    pub code: Option<String>,
    /// Additional context lines
    pub context: Vec<String>,
    /// Suggested fixes
    pub suggestions: Vec<String>,
}

impl Diagnostic {
    fn with_severity(severity: Severity, message: impl Into<String>) -> Self {
        Diagnostic {
            message: message.into(),
            severity,
            code: None,
            context: Vec::new(),
            suggestions: Vec::new(),
        }
    }

    /// Create a new error diagnostic.
    pub fn error(message: impl Into<String>) -> Self {
        Self::with_severity(Severity::Error, message)
    }

    /// Create a diagnostic for a defect in the check catalogue.
    pub fn bug(message: impl Into<String>) -> Self {
        Self::with_severity(Severity::Bug, message)
    }

    /// Attach a diagnostic code.
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Add context to the diagnostic.
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context.push(context.into());
        self
    }

    /// Add a suggestion for fixing the issue.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }

    /// Format the diagnostic for terminal output.
    pub fn format(&self, color: bool) -> String {
        let mut output = String::new();

        let severity_str = if color {
            match self.severity {
                Severity::Error => "\x1b[1;31merror\x1b[0m",
                Severity::Bug => "\x1b[1;35minternal error\x1b[0m",
            }
        } else {
            match self.severity {
                Severity::Error => "error",
                Severity::Bug => "internal error",
            }
        };

        match self.code {
            Some(ref code) => output.push_str(&format!("{}[{}]: {}\n", severity_str, code, self.message)),
            None => output.push_str(&format!("{}: {}\n", severity_str, self.message)),
        }

        for ctx in &self.context {
            output.push_str(&format!("  -> {}\n", ctx));
        }

        if !self.suggestions.is_empty() {
            output.push('\n');
            let help_prefix = if color {
                "\x1b[1;32mhelp\x1b[0m"
            } else {
                "help"
            };
            output.push_str(&format!("{}: consider:\n", help_prefix));
            for (i, suggestion) in self.suggestions.iter().enumerate() {
                output.push_str(&format!("  {}. {}\n", i + 1, suggestion));
            }
        }

        output
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format(false))
    }
}

/// Print a diagnostic to stderr.
pub fn emit(diagnostic: &Diagnostic, color: bool) {
    eprint!("{}", diagnostic.format(color));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagnostic_formatting() {
        let diag = Diagnostic::error("feature `zlib` is required but could not be enabled")
            .with_code("autoprobe::check::required")
            .with_context("outcome: no")
            .with_suggestion("Install the zlib development package")
            .with_suggestion(suggestions::SEE_LOG);

        let output = diag.format(false);
        assert!(output.starts_with("error[autoprobe::check::required]: feature `zlib`"));
        assert!(output.contains("  -> outcome: no"));
        assert!(output.contains("help: consider:"));
        assert!(output.contains("1. Install the zlib"));
        assert!(output.contains("2. Inspect config.log"));
    }

    #[test]
    fn test_bug_presentation_differs() {
        let output = Diagnostic::bug("unknown dependency `x11`").format(false);
        assert!(output.starts_with("internal error: unknown dependency"));
    }
}
