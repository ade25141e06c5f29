// Error reporting surface shared by the loader and the compiler.

use crate::ast::Span;

/// A resolved position inside a source file. Line and column are 1-based,
/// `byte` is the 0-based offset into the file text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SourcePos {
    pub byte: u32,
    pub line: u32,
    pub column: u32,
}

/// Receives every problem found while loading or compiling a schema.
///
/// Implementations decide what to do with them; the compiler never stops at
/// the first error, so a reporter may be called many times per compile.
pub trait ErrorReporter {
    fn add_error(&self, path: &str, start: SourcePos, end: SourcePos, message: &str);

    fn had_errors(&self) -> bool;
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{message}")]
pub struct ParseError {
    pub span: Span,
    pub message: String,
}

impl ParseError {
    pub fn new(span: Span, message: impl Into<String>) -> Self {
        Self {
            span,
            message: message.into(),
        }
    }
}

/// Byte offset to line/column lookup for one file.
#[derive(Debug, Clone)]
pub struct LineIndex {
    starts: Vec<u32>,
}

impl LineIndex {
    pub fn new(source: &str) -> Self {
        let mut starts = vec![0];
        for (i, b) in source.bytes().enumerate() {
            if b == b'\n' {
                starts.push(i as u32 + 1);
            }
        }
        Self { starts }
    }

    pub fn position(&self, byte: u32) -> SourcePos {
        let line = self.starts.partition_point(|&start| start <= byte);
        let line_start = self.starts[line - 1];
        SourcePos {
            byte,
            line: line as u32,
            column: byte - line_start + 1,
        }
    }
}
