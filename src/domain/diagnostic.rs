//! Diagnostic value object
//!
//! Diagnostics are the single channel through which compilation problems,
//! addon resolution warnings and watch status messages reach the user.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;

/// Severity of a diagnostic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticCategory {
    Error,
    Warning,
    Message,
}

impl DiagnosticCategory {
    /// Lowercase label used in console and JSON output
    pub fn label(&self) -> &'static str {
        match self {
            DiagnosticCategory::Error => "error",
            DiagnosticCategory::Warning => "warning",
            DiagnosticCategory::Message => "info",
        }
    }
}

/// 1-based line and column inside a file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl Position {
    /// Compute the line/column of a byte offset within `text`.
    pub fn from_offset(text: &str, offset: usize) -> Self {
        let offset = offset.min(text.len());
        let before = &text[..offset];
        let line = before.matches('\n').count() + 1;
        let column = match before.rfind('\n') {
            Some(newline) => offset - newline,
            None => offset + 1,
        };
        Self { line, column }
    }
}

/// A user-visible problem or status message
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub category: DiagnosticCategory,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
    pub message: String,
    /// Follow-up lines of a message chain, most specific last
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub chain: Vec<String>,
}

impl Diagnostic {
    fn new(category: DiagnosticCategory, message: impl Into<String>) -> Self {
        Self {
            category,
            code: None,
            file: None,
            position: None,
            message: message.into(),
            chain: Vec::new(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(DiagnosticCategory::Error, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(DiagnosticCategory::Warning, message)
    }

    pub fn message(message: impl Into<String>) -> Self {
        Self::new(DiagnosticCategory::Message, message)
    }

    pub fn with_code(mut self, code: u32) -> Self {
        self.code = Some(code);
        self
    }

    pub fn with_file(mut self, file: impl Into<PathBuf>) -> Self {
        self.file = Some(file.into());
        self
    }

    pub fn with_position(mut self, position: Position) -> Self {
        self.position = Some(position);
        self
    }

    pub fn with_chain(mut self, line: impl Into<String>) -> Self {
        self.chain.push(line.into());
        self
    }

    pub fn is_error(&self) -> bool {
        self.category == DiagnosticCategory::Error
    }

    /// The file this diagnostic points at, if any
    pub fn file(&self) -> Option<&Path> {
        self.file.as_deref()
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(file) = &self.file {
            write!(f, "{}", file.display())?;
            if let Some(pos) = self.position {
                write!(f, ":{}:{}", pos.line, pos.column)?;
            }
            write!(f, " - ")?;
        }
        write!(f, "{}", self.category.label())?;
        if let Some(code) = self.code {
            write!(f, " TP{code}")?;
        }
        write!(f, ": {}", self.message)?;
        for line in &self.chain {
            write!(f, "\n  {line}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn position_from_offset_first_line() {
        let pos = Position::from_offset("const x = 1;", 6);
        assert_eq!(pos, Position { line: 1, column: 7 });
    }

    #[test]
    fn position_from_offset_later_line() {
        let text = "a\nbc\ndef";
        let pos = Position::from_offset(text, text.find('f').unwrap());
        assert_eq!(pos, Position { line: 3, column: 3 });
    }

    #[test]
    fn display_with_file_and_position() {
        let diag = Diagnostic::error("Unterminated string literal.")
            .with_code(1002)
            .with_file("src/a.ts")
            .with_position(Position { line: 2, column: 5 });
        assert_eq!(
            diag.to_string(),
            "src/a.ts:2:5 - error TP1002: Unterminated string literal."
        );
    }

    #[test]
    fn display_without_file() {
        let diag = Diagnostic::warning("Missing addons: x");
        assert_eq!(diag.to_string(), "warning: Missing addons: x");
    }

    #[test]
    fn display_includes_chain() {
        let diag = Diagnostic::error("top").with_chain("detail");
        assert_eq!(diag.to_string(), "error: top\n  detail");
    }
}
