use std::fmt;

use ariadne::{Color, Label, Report, ReportKind, Source};
use serde::Serialize;

use crate::span::{LineIndex, Span};

/// Severity of a compiler diagnostic. Ember never aborts on the first
/// error; diagnostics are collected and reported together (§7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Severity {
    Error,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
        }
    }
}

/// A single diagnostic with an optional secondary span (e.g. "declared here").
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    pub span: Span,
    pub related: Option<(String, Span)>,
}

impl Diagnostic {
    pub fn error(message: impl Into<String>, span: Span) -> Self {
        Self {
            severity: Severity::Error,
            message: message.into(),
            span,
            related: None,
        }
    }

    pub fn warning(message: impl Into<String>, span: Span) -> Self {
        Self {
            severity: Severity::Warning,
            message: message.into(),
            span,
            related: None,
        }
    }

    pub fn with_related(mut self, message: impl Into<String>, span: Span) -> Self {
        self.related = Some((message.into(), span));
        self
    }

    /// One-line plain-text rendering, for scripts and test assertions:
    /// `error: <line>:<col>: <message>`.
    pub fn render_plain(&self, file: &str, index: &LineIndex) -> String {
        let (line, col) = index.line_col(self.span.start);
        format!("{file}:{line}:{col}: {}: {}", self.severity, self.message)
    }

    /// Rich terminal rendering with a source-line caret, via `ariadne`.
    pub fn render_pretty(&self, file: &str, src: &str) -> String {
        let kind = match self.severity {
            Severity::Error => ReportKind::Error,
            Severity::Warning => ReportKind::Warning,
        };
        let mut builder = Report::build(
            kind,
            (file, self.span.start as usize..self.span.end as usize),
        )
        .with_message(&self.message)
            .with_label(
                Label::new((file, self.span.start as usize..self.span.end as usize))
                    .with_message(&self.message)
                    .with_color(Color::Red),
            );
        if let Some((msg, span)) = &self.related {
            builder = builder.with_label(
                Label::new((file, span.start as usize..span.end as usize))
                    .with_message(msg)
                    .with_color(Color::Blue),
            );
        }
        let report = builder.finish();
        let mut buf = Vec::new();
        let _ = report.write((file, Source::from(src)), &mut buf);
        String::from_utf8_lossy(&buf).into_owned()
    }
}

/// An ordered collection of diagnostics accumulated by a compiler phase.
#[derive(Debug, Clone, Default)]
pub struct DiagnosticBag {
    diagnostics: Vec<Diagnostic>,
}

impl DiagnosticBag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diag: Diagnostic) {
        self.diagnostics.push(diag);
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    pub fn len(&self) -> usize {
        self.diagnostics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter()
    }
}

impl IntoIterator for DiagnosticBag {
    type Item = Diagnostic;
    type IntoIter = std::vec::IntoIter<Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.diagnostics.into_iter()
    }
}

impl Extend<Diagnostic> for DiagnosticBag {
    fn extend<T: IntoIterator<Item = Diagnostic>>(&mut self, iter: T) {
        self.diagnostics.extend(iter);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_render_has_line_and_column() {
        let idx = LineIndex::new("let x = 1\nlet y = x + z\n");
        let diag = Diagnostic::error("unknown identifier: z", Span::new(23, 24));
        let rendered = diag.render_plain("t.ember", &idx);
        assert_eq!(rendered, "t.ember:2:13: error: unknown identifier: z");
    }

    #[test]
    fn bag_tracks_error_presence() {
        let mut bag = DiagnosticBag::new();
        assert!(!bag.has_errors());
        bag.push(Diagnostic::warning("unused variable", Span::new(0, 1)));
        assert!(!bag.has_errors());
        bag.push(Diagnostic::error("type mismatch", Span::new(2, 3)));
        assert!(bag.has_errors());
        assert_eq!(bag.len(), 2);
    }
}
