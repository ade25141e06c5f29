// Collects compiler diagnostics as "line:column message" entries.

use std::cell::RefCell;
use std::fmt;

use capnp_schema_compiler::{ErrorReporter, SourcePos};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub line: u32,
    pub column: u32,
    pub message: String,
}

impl Diagnostic {
    pub fn new(line: u32, column: u32, message: impl Into<String>) -> Self {
        Self {
            line,
            column,
            // One diagnostic is one output line.
            message: message.into().replace(['\r', '\n'], " "),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{} {}", self.line, self.column, self.message)
    }
}

/// Records every reported problem in report order. Any entry makes the
/// compile fail.
#[derive(Debug, Default)]
pub struct DiagnosticCollector {
    diagnostics: RefCell<Vec<Diagnostic>>,
}

impl DiagnosticCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn report(&self, line: u32, column: u32, message: &str) {
        tracing::trace!(line, column, message, "diagnostic");
        self.diagnostics
            .borrow_mut()
            .push(Diagnostic::new(line, column, message));
    }

    pub fn has_errors(&self) -> bool {
        !self.diagnostics.borrow().is_empty()
    }

    pub fn len(&self) -> usize {
        self.diagnostics.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.diagnostics.into_inner()
    }
}

impl ErrorReporter for DiagnosticCollector {
    fn add_error(&self, _path: &str, start: SourcePos, _end: SourcePos, message: &str) {
        self.report(start.line, start.column, message);
    }

    fn had_errors(&self) -> bool {
        self.has_errors()
    }
}
