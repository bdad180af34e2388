//! Compiler diagnostics with file/line/column spans.
//!
//! Every rejected batch carries the full list of diagnostics, ordered
//! by file, then line, then column, so two runs over the same sources
//! report identically.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// A half-open span inside one source line, 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct SourceSpan {
    pub line: usize,
    pub col: usize,
    pub len: usize,
}

impl SourceSpan {
    #[inline]
    pub fn new(line: usize, col: usize, len: usize) -> Self {
        Self {
            line,
            col,
            len: len.max(1),
        }
    }
}

/// One compiler error, pinned to a source location.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub file: PathBuf,
    pub span: SourceSpan,
    pub message: String,
    /// The offending source line, kept for caret rendering.
    pub line_text: Option<String>,
}

impl Diagnostic {
    pub fn new(
        file: impl Into<PathBuf>,
        span: SourceSpan,
        message: impl Into<String>,
        line_text: Option<String>,
    ) -> Self {
        Self {
            file: file.into(),
            span,
            message: message.into(),
            line_text,
        }
    }

    /// Render as `file:line:col: message` plus a caret line when the
    /// source text is available.
    pub fn render(&self) -> String {
        let mut out = format!(
            "{}:{}:{}: {}",
            self.file.display(),
            self.span.line,
            self.span.col,
            self.message
        );
        if let Some(text) = &self.line_text {
            let num = format!("{:>4}", self.span.line);
            out.push('\n');
            out.push_str(&num);
            out.push_str(" | ");
            out.push_str(text);
            out.push('\n');
            out.push_str(&" ".repeat(num.len()));
            out.push_str(" | ");
            out.push_str(&" ".repeat(self.span.col - 1));
            out.push_str(&"^".repeat(self.span.len));
        }
        out
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}: {}",
            self.file.display(),
            self.span.line,
            self.span.col,
            self.message
        )
    }
}

/// A rejected batch: no class from the batch is emitted.
#[derive(Debug, Clone, Error)]
#[error("compilation failed with {} error(s)", diagnostics.len())]
pub struct CompileFailure {
    pub diagnostics: Vec<Diagnostic>,
}

impl CompileFailure {
    /// Sort diagnostics into reporting order (file, line, column).
    pub fn new(mut diagnostics: Vec<Diagnostic>) -> Self {
        diagnostics.sort_by(|a, b| (&a.file, a.span).cmp(&(&b.file, b.span)));
        Self { diagnostics }
    }

    /// Full multi-line report with caret lines.
    pub fn render(&self) -> String {
        self.diagnostics
            .iter()
            .map(Diagnostic::render)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_places_caret_under_token() {
        let diag = Diagnostic::new(
            "demo/Post.unit",
            SourceSpan::new(3, 14, 5),
            "unknown type `strng`",
            Some("field title: strng".to_string()),
        );
        let rendered = diag.render();
        let lines: Vec<_> = rendered.lines().collect();
        assert_eq!(lines[0], "demo/Post.unit:3:14: unknown type `strng`");
        assert_eq!(lines[1], "   3 | field title: strng");
        assert_eq!(lines[2], "     |              ^^^^^");
    }

    #[test]
    fn test_failure_orders_diagnostics() {
        let failure = CompileFailure::new(vec![
            Diagnostic::new("b.unit", SourceSpan::new(1, 1, 1), "late", None),
            Diagnostic::new("a.unit", SourceSpan::new(9, 1, 1), "second", None),
            Diagnostic::new("a.unit", SourceSpan::new(2, 5, 1), "first", None),
        ]);
        let messages: Vec<_> = failure.diagnostics.iter().map(|d| d.message.as_str()).collect();
        assert_eq!(messages, ["first", "second", "late"]);
    }

    #[test]
    fn test_failure_display_counts_errors() {
        let failure = CompileFailure::new(vec![
            Diagnostic::new("a.unit", SourceSpan::new(1, 1, 1), "x", None),
            Diagnostic::new("a.unit", SourceSpan::new(2, 1, 1), "y", None),
        ]);
        assert_eq!(failure.to_string(), "compilation failed with 2 error(s)");
    }

    #[test]
    fn test_span_len_never_zero() {
        assert_eq!(SourceSpan::new(1, 1, 0).len, 1);
    }
}
