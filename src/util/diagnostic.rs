//! User-facing diagnostics.
//!
//! Chain and registration errors render as a headline, the place they come
//! from, the steps or items involved, and what to try next:
//!
//! ```text
//! error: invalid build step `WebSteps::routes`: step methods must be `pub`
//!   --> src/web.rs:12
//!   = ...
//!
//! help: Run `buildchain describe --src <dir>` to see how each step was analysed
//! ```

use std::fmt;

/// Suggestions shared by several diagnostics.
pub mod suggestions {
    pub const NO_SOURCES: &str = "Pass the crate's `src` directory with `--src`";

    pub const STEP_SIGNATURE: &str =
        "Run `buildchain describe --src <dir>` to see how each step was analysed";

    pub const UNKNOWN_ITEM: &str =
        "Implement `BuildItem` for the type with `type Kind = Simple` or `type Kind = Multi`, \
         or declare it with `--item NAME=simple|multi`";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

impl Severity {
    fn label(self) -> &'static str {
        match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
        }
    }

    /// ANSI style: bold red or bold yellow.
    fn style(self) -> &'static str {
        match self {
            Severity::Error => "1;31",
            Severity::Warning => "1;33",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A diagnostic message with optional location, notes and suggestions.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub message: String,
    pub severity: Severity,
    /// Where the problem was declared, usually `path:line`
    pub location: Option<String>,
    /// Steps, items and other participants
    pub context: Vec<String>,
    pub suggestions: Vec<String>,
}

impl Diagnostic {
    pub fn error(message: impl Into<String>) -> Self {
        Diagnostic::new(Severity::Error, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Diagnostic::new(Severity::Warning, message)
    }

    fn new(severity: Severity, message: impl Into<String>) -> Self {
        Diagnostic {
            message: message.into(),
            severity,
            location: None,
            context: Vec::new(),
            suggestions: Vec::new(),
        }
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context.push(context.into());
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    /// Render for a terminal, with ANSI colors when `color` is set.
    pub fn format(&self, color: bool) -> String {
        let mut output = format!(
            "{}: {}\n",
            paint(self.severity.label(), self.severity.style(), color),
            self.message
        );
        if let Some(location) = &self.location {
            output.push_str(&format!("  --> {}\n", location));
        }
        for line in &self.context {
            output.push_str(&format!("  = {}\n", line));
        }

        let help = paint("help", "1;32", color);
        match self.suggestions.as_slice() {
            [] => {}
            [only] => output.push_str(&format!("\n{}: {}\n", help, only)),
            many => {
                output.push_str(&format!("\n{}: try one of:\n", help));
                for (i, suggestion) in many.iter().enumerate() {
                    output.push_str(&format!("  {}. {}\n", i + 1, suggestion));
                }
            }
        }
        output
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.format(false))
    }
}

fn paint(text: &str, style: &str, color: bool) -> String {
    if color {
        format!("\x1b[{}m{}\x1b[0m", style, text)
    } else {
        text.to_string()
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
    fn test_error_with_suggestions() {
        let diag = Diagnostic::error("nothing produces `ConfigItem`")
            .with_context("`web.setup` requires it")
            .with_suggestion("Register a step producing `ConfigItem`")
            .with_suggestion("Consume `ConfigItem` optionally in `web.setup`");

        let output = diag.format(false);
        assert!(output.starts_with("error: nothing produces `ConfigItem`\n"));
        assert!(output.contains("  = `web.setup` requires it\n"));
        assert!(output.contains("help: try one of:\n"));
        assert!(output.contains("  1. Register a step"));
        assert!(output.contains("  2. Consume"));
    }

    #[test]
    fn test_warning_with_location() {
        let diag = Diagnostic::warning("step can never run")
            .with_location("src/steps.rs:4")
            .with_suggestion(suggestions::STEP_SIGNATURE);
        assert!(!diag.is_error());

        let output = diag.to_string();
        assert!(output.starts_with("warning: step can never run\n  --> src/steps.rs:4\n"));
        assert!(output.ends_with(&format!("help: {}\n", suggestions::STEP_SIGNATURE)));
    }

    #[test]
    fn test_color() {
        let output = Diagnostic::error("boom").format(true);
        assert!(output.starts_with("\x1b[1;31merror\x1b[0m: boom"));
    }
}
