use std::fmt;

use ember_common::Span;

/// A parse error, optionally carrying a related span (e.g. "opened here"
/// for an unclosed delimiter).
#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub message: String,
    pub span: Span,
    pub related: Option<(String, Span)>,
}

impl ParseError {
    pub fn new(message: impl Into<String>, span: Span) -> Self {
        Self {
            message: message.into(),
            span,
            related: None,
        }
    }

    pub fn with_related(mut self, message: impl Into<String>, span: Span) -> Self {
        self.related = Some((message.into(), span));
        self
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ParseError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_uses_message() {
        let err = ParseError::new("expected ';'", Span::new(0, 1));
        assert_eq!(err.to_string(), "expected ';'");
    }

    #[test]
    fn with_related_is_additive() {
        let err = ParseError::new("unclosed '{'", Span::new(5, 6))
            .with_related("opened here", Span::new(0, 1));
        assert_eq!(err.related.unwrap().0, "opened here");
    }
}
