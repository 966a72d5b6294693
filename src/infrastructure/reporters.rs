//! Reporter implementations
//!
//! - `ConsoleReporter`: human output on stderr, colored on terminals
//! - `JsonReporter`: NDJSON events for CI/automation
//! - `CollectingReporter`: keeps everything in memory

use std::cell::RefCell;
use std::io::{self, Write};
use std::sync::Mutex;

use crossterm::style::{Color, Stylize};
use is_terminal::IsTerminal;

use crate::domain::ports::Reporter;
use crate::domain::{Diagnostic, DiagnosticCategory};

fn category_color(category: DiagnosticCategory) -> Color {
    match category {
        DiagnosticCategory::Error => Color::Red,
        DiagnosticCategory::Warning => Color::Yellow,
        DiagnosticCategory::Message => Color::Cyan,
    }
}

/// Decide whether stderr output should be colored.
///
/// `NO_COLOR` and `TERM=dumb` disable color even on a terminal.
pub fn stderr_supports_color(get_env: impl Fn(&str) -> Option<String>) -> bool {
    let no_color = get_env("NO_COLOR").is_some();
    let dumb = get_env("TERM").is_some_and(|t| t == "dumb");
    io::stderr().is_terminal() && !no_color && !dumb
}

/// Human readable diagnostics on stderr
pub struct ConsoleReporter {
    color: bool,
    writer: Mutex<Box<dyn Write + Send>>,
}

impl ConsoleReporter {
    /// Write to stderr, coloring when it is a terminal
    pub fn stderr() -> Self {
        Self {
            color: stderr_supports_color(|k| std::env::var(k).ok()),
            writer: Mutex::new(Box::new(io::stderr())),
        }
    }

    /// Write to a custom writer (for testing)
    pub fn with_writer<W: Write + Send + 'static>(writer: W, color: bool) -> Self {
        Self {
            color,
            writer: Mutex::new(Box::new(writer)),
        }
    }

    /// Render one diagnostic, including its message chain
    pub fn format(&self, diagnostic: &Diagnostic) -> String {
        let mut out = String::new();
        if let Some(file) = diagnostic.file() {
            out.push_str(&file.display().to_string());
            if let Some(pos) = diagnostic.position {
                out.push_str(&format!(":{}:{}", pos.line, pos.column));
            }
            out.push_str(" - ");
        }

        let mut label = diagnostic.category.label().to_string();
        if let Some(code) = diagnostic.code {
            label.push_str(&format!(" TP{code}"));
        }
        if self.color {
            let styled = label.as_str().with(category_color(diagnostic.category));
            out.push_str(&format!("{styled}"));
        } else {
            out.push_str(&label);
        }
        out.push_str(": ");
        out.push_str(&diagnostic.message);

        for (depth, line) in diagnostic.chain.iter().enumerate() {
            out.push('\n');
            out.push_str(&"  ".repeat(depth + 1));
            out.push_str(line);
        }
        out
    }

    fn write_line(&self, text: &str, new_line: &str) {
        if let Ok(mut writer) = self.writer.lock() {
            let _ = write!(writer, "{text}{new_line}");
            let _ = writer.flush();
        }
    }
}

impl Reporter for ConsoleReporter {
    fn report_diagnostic(&self, diagnostic: &Diagnostic) {
        let text = self.format(diagnostic);
        self.write_line(&text, "\n");
    }

    fn report_watch_status(&self, diagnostic: &Diagnostic, new_line: &str) {
        let time = chrono::Local::now().format("%H:%M:%S").to_string();
        let time = if self.color {
            format!("{}", time.as_str().dark_grey())
        } else {
            time
        };
        self.write_line(&format!("[{time}] {}", diagnostic.message), new_line);
    }
}

/// NDJSON diagnostics on stdout
pub struct JsonReporter {
    writer: Mutex<Box<dyn Write + Send>>,
}

impl JsonReporter {
    pub fn stdout() -> Self {
        Self {
            writer: Mutex::new(Box::new(io::stdout())),
        }
    }

    /// Write to a custom writer (for testing)
    pub fn with_writer<W: Write + Send + 'static>(writer: W) -> Self {
        Self {
            writer: Mutex::new(Box::new(writer)),
        }
    }

    fn write_event(&self, event: serde_json::Value) {
        if let Ok(mut writer) = self.writer.lock() {
            let _ = writeln!(writer, "{event}");
            let _ = writer.flush();
        }
    }
}

impl Reporter for JsonReporter {
    fn report_diagnostic(&self, diagnostic: &Diagnostic) {
        self.write_event(serde_json::json!({
            "event": "diagnostic",
            "diagnostic": diagnostic,
        }));
    }

    fn report_watch_status(&self, diagnostic: &Diagnostic, _new_line: &str) {
        self.write_event(serde_json::json!({
            "event": "watch_status",
            "time": chrono::Utc::now().to_rfc3339(),
            "message": diagnostic.message,
        }));
    }
}

/// Keeps every reported diagnostic in memory
#[derive(Debug, Default)]
pub struct CollectingReporter {
    diagnostics: RefCell<Vec<Diagnostic>>,
    watch_statuses: RefCell<Vec<Diagnostic>>,
}

impl CollectingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.diagnostics.borrow().clone()
    }

    pub fn errors(&self) -> Vec<Diagnostic> {
        self.filtered(DiagnosticCategory::Error)
    }

    pub fn warnings(&self) -> Vec<Diagnostic> {
        self.filtered(DiagnosticCategory::Warning)
    }

    fn filtered(&self, category: DiagnosticCategory) -> Vec<Diagnostic> {
        self.diagnostics
            .borrow()
            .iter()
            .filter(|d| d.category == category)
            .cloned()
            .collect()
    }

    /// Messages of every watch status report, in order
    pub fn watch_statuses(&self) -> Vec<String> {
        self.watch_statuses
            .borrow()
            .iter()
            .map(|d| d.message.clone())
            .collect()
    }

    pub fn clear(&self) {
        self.diagnostics.borrow_mut().clear();
        self.watch_statuses.borrow_mut().clear();
    }
}

impl Reporter for CollectingReporter {
    fn report_diagnostic(&self, diagnostic: &Diagnostic) {
        self.diagnostics.borrow_mut().push(diagnostic.clone());
    }

    fn report_watch_status(&self, diagnostic: &Diagnostic, _new_line: &str) {
        self.watch_statuses.borrow_mut().push(diagnostic.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Position;
    use std::sync::Arc;

    #[derive(Clone, Default)]
    struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

    impl SharedBuffer {
        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn sample() -> Diagnostic {
        Diagnostic::error("Unterminated string literal.")
            .with_code(1002)
            .with_file("/p/a.ts")
            .with_position(Position { line: 3, column: 9 })
    }

    #[test]
    fn console_format_without_color() {
        let reporter = ConsoleReporter::with_writer(SharedBuffer::default(), false);
        assert_eq!(
            reporter.format(&sample()),
            "/p/a.ts:3:9 - error TP1002: Unterminated string literal."
        );
        assert_eq!(
            reporter.format(&Diagnostic::warning("Missing addons: X")),
            "warning: Missing addons: X"
        );
    }

    #[test]
    fn console_format_includes_chain() {
        let reporter = ConsoleReporter::with_writer(SharedBuffer::default(), false);
        let diag = Diagnostic::error("outer").with_chain("inner").with_chain("innermost");
        assert_eq!(reporter.format(&diag), "error: outer\n  inner\n    innermost");
    }

    #[test]
    fn console_colors_label_when_enabled() {
        let reporter = ConsoleReporter::with_writer(SharedBuffer::default(), true);
        assert!(reporter.format(&sample()).contains("\u{1b}["));
    }

    #[test]
    fn console_watch_status_uses_given_new_line() {
        let buffer = SharedBuffer::default();
        let reporter = ConsoleReporter::with_writer(buffer.clone(), false);
        reporter.report_watch_status(&Diagnostic::message("Watching."), "\r\n");
        let out = buffer.contents();
        assert!(out.starts_with('['));
        assert!(out.ends_with("] Watching.\r\n"));
    }

    #[test]
    fn json_reporter_writes_ndjson() {
        let buffer = SharedBuffer::default();
        let reporter = JsonReporter::with_writer(buffer.clone());
        reporter.report_diagnostic(&sample());
        reporter.report_watch_status(&Diagnostic::message("Watching."), "\n");

        let out = buffer.contents();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["event"], "diagnostic");
        assert_eq!(first["diagnostic"]["category"], "error");
        assert_eq!(first["diagnostic"]["code"], 1002);
        let second: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second["event"], "watch_status");
        assert_eq!(second["message"], "Watching.");
    }

    #[test]
    fn collecting_reporter_filters_by_category() {
        let reporter = CollectingReporter::new();
        reporter.report_diagnostic(&sample());
        reporter.report_diagnostic(&Diagnostic::warning("w"));
        reporter.report_watch_status(&Diagnostic::message("status"), "\n");

        assert_eq!(reporter.diagnostics().len(), 2);
        assert_eq!(reporter.errors().len(), 1);
        assert_eq!(reporter.warnings()[0].message, "w");
        assert_eq!(reporter.watch_statuses(), vec!["status"]);

        reporter.clear();
        assert!(reporter.diagnostics().is_empty());
    }
}
