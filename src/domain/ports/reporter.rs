//! Reporter port
//!
//! Converts diagnostics into user-visible output. Consumed by every layer.

use crate::domain::diagnostic::Diagnostic;

/// Trait for receiving diagnostics
///
/// Implementations can be:
/// - ConsoleReporter: colored human output on stderr
/// - JsonReporter: NDJSON event stream for CI
/// - CollectingReporter: keeps everything in memory
pub trait Reporter {
    /// Report a compile, configuration or addon diagnostic
    fn report_diagnostic(&self, diagnostic: &Diagnostic);

    /// Report a watch-mode status line (file changed, pass finished, ...)
    fn report_watch_status(&self, diagnostic: &Diagnostic, new_line: &str);
}

/// No-op reporter for silent operation
pub struct NoopReporter;

impl Reporter for NoopReporter {
    fn report_diagnostic(&self, _diagnostic: &Diagnostic) {}

    fn report_watch_status(&self, _diagnostic: &Diagnostic, _new_line: &str) {}
}
