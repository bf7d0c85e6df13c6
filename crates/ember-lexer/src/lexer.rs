use ember_common::Span;

use crate::error::{LexError, LexErrorKind};
use crate::token::{Token, TokenKind};

/// Scans Ember source text into a flat token stream.
///
/// The lexer never aborts on the first bad character: it records an error
/// and keeps going, matching the "accumulate, don't abort" error
/// philosophy the rest of the pipeline follows.
pub struct Lexer<'src> {
    src: &'src str,
    bytes: &'src [u8],
    pos: usize,
    errors: Vec<LexError>,
}

impl<'src> Lexer<'src> {
    pub fn new(src: &'src str) -> Self {
        Self {
            src,
            bytes: src.as_bytes(),
            pos: 0,
            errors: Vec::new(),
        }
    }

    /// Tokenizes the whole input, returning the tokens (terminated with
    /// `Eof`) and any errors encountered along the way.
    pub fn tokenize(mut self) -> (Vec<Token>, Vec<LexError>) {
        let mut tokens = Vec::new();
        loop {
            self.skip_trivia();
            let start = self.pos;
            let Some(c) = self.peek() else {
                tokens.push(Token::new(TokenKind::Eof, Span::new(start as u32, start as u32)));
                break;
            };
            let kind = self.scan_token(c);
            let end = self.pos;
            tokens.push(Token::new(kind, Span::new(start as u32, end as u32)));
        }
        (tokens, self.errors)
    }

    fn scan_token(&mut self, c: char) -> TokenKind {
        match c {
            '0'..='9' => self.scan_number(),
            '"' => self.scan_string(),
            '\'' => self.scan_char(),
            c if is_ident_start(c) => self.scan_ident(),
            _ => self.scan_operator(c),
        }
    }

    fn scan_operator(&mut self, c: char) -> TokenKind {
        let start = self.pos;
        self.bump();
        macro_rules! two {
            ($second:expr, $two_kind:expr, $one_kind:expr) => {
                if self.peek() == Some($second) {
                    self.bump();
                    $two_kind
                } else {
                    $one_kind
                }
            };
        }
        match c {
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '{' => TokenKind::LBrace,
            '}' => TokenKind::RBrace,
            '[' => TokenKind::LBracket,
            ']' => TokenKind::RBracket,
            ',' => TokenKind::Comma,
            ':' => TokenKind::Colon,
            ';' => TokenKind::Semicolon,
            '.' => TokenKind::Dot,
            '?' => TokenKind::Question,
            '+' => {
                if self.peek() == Some('+') {
                    self.bump();
                    TokenKind::PlusPlus
                } else {
                    two!('=', TokenKind::PlusEq, TokenKind::Plus)
                }
            }
            '-' => {
                if self.peek() == Some('-') {
                    self.bump();
                    TokenKind::MinusMinus
                } else if self.peek() == Some('>') {
                    self.bump();
                    TokenKind::Arrow
                } else {
                    two!('=', TokenKind::MinusEq, TokenKind::Minus)
                }
            }
            '*' => two!('=', TokenKind::StarEq, TokenKind::Star),
            '/' => two!('=', TokenKind::SlashEq, TokenKind::Slash),
            '%' => two!('=', TokenKind::PercentEq, TokenKind::Percent),
            '=' => two!('=', TokenKind::EqEq, TokenKind::Eq),
            '!' => two!('=', TokenKind::NotEq, TokenKind::Bang),
            '<' => two!('=', TokenKind::LtEq, TokenKind::Lt),
            '>' => two!('=', TokenKind::GtEq, TokenKind::Gt),
            '&' => {
                if self.peek() == Some('&') {
                    self.bump();
                    TokenKind::AndAnd
                } else {
                    self.push_error(LexErrorKind::UnexpectedCharacter('&'), start);
                    TokenKind::AndAnd
                }
            }
            '|' => {
                if self.peek() == Some('|') {
                    self.bump();
                    TokenKind::OrOr
                } else {
                    self.push_error(LexErrorKind::UnexpectedCharacter('|'), start);
                    TokenKind::OrOr
                }
            }
            other => {
                self.push_error(LexErrorKind::UnexpectedCharacter(other), start);
                TokenKind::Eof
            }
        }
    }

    fn scan_ident(&mut self) -> TokenKind {
        let start = self.pos;
        while self.peek().is_some_and(is_ident_continue) {
            self.bump();
        }
        let text = &self.src[start..self.pos];
        TokenKind::keyword_from_str(text).unwrap_or_else(|| TokenKind::Ident(text.to_string()))
    }

    fn scan_number(&mut self) -> TokenKind {
        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.bump();
        }
        let mut is_float = false;
        if self.peek() == Some('.') && self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) {
            is_float = true;
            self.bump();
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.bump();
            }
        }
        if matches!(self.peek(), Some('e') | Some('E')) {
            is_float = true;
            self.bump();
            if matches!(self.peek(), Some('+') | Some('-')) {
                self.bump();
            }
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.bump();
            }
        }
        let text = &self.src[start..self.pos];
        if is_float {
            match text.parse::<f64>() {
                Ok(v) => TokenKind::Float(v),
                Err(_) => {
                    self.push_error(LexErrorKind::InvalidNumberLiteral(text.to_string()), start);
                    TokenKind::Float(0.0)
                }
            }
        } else {
            match text.parse::<i64>() {
                Ok(v) => TokenKind::Int(v),
                Err(_) => {
                    self.push_error(LexErrorKind::InvalidNumberLiteral(text.to_string()), start);
                    TokenKind::Int(0)
                }
            }
        }
    }

    fn scan_string(&mut self) -> TokenKind {
        let start = self.pos;
        self.bump(); // opening quote
        let mut value = String::new();
        loop {
            match self.peek() {
                None | Some('\n') => {
                    self.push_error(LexErrorKind::UnterminatedString, start);
                    break;
                }
                Some('"') => {
                    self.bump();
                    break;
                }
                Some('\\') => {
                    let esc_start = self.pos;
                    self.bump();
                    match self.peek() {
                        Some(e) => {
                            self.bump();
                            match escape_char(e) {
                                Some(c) => value.push(c),
                                None => self.push_error(
                                    LexErrorKind::InvalidEscapeSequence(e),
                                    esc_start,
                                ),
                            }
                        }
                        None => self.push_error(LexErrorKind::UnterminatedString, start),
                    }
                }
                Some(c) => {
                    value.push(c);
                    self.bump();
                }
            }
        }
        TokenKind::Str(value)
    }

    fn scan_char(&mut self) -> TokenKind {
        let start = self.pos;
        self.bump(); // opening quote
        let value = match self.peek() {
            Some('\\') => {
                self.bump();
                let esc_start = self.pos;
                match self.peek() {
                    Some(e) => {
                        self.bump();
                        escape_char(e).unwrap_or_else(|| {
                            self.push_error(LexErrorKind::InvalidEscapeSequence(e), esc_start);
                            '\0'
                        })
                    }
                    None => {
                        self.push_error(LexErrorKind::UnterminatedChar, start);
                        '\0'
                    }
                }
            }
            Some(c) => {
                self.bump();
                c
            }
            None => {
                self.push_error(LexErrorKind::UnterminatedChar, start);
                '\0'
            }
        };
        if self.peek() == Some('\'') {
            self.bump();
        } else {
            self.push_error(LexErrorKind::UnterminatedChar, start);
        }
        TokenKind::Char(value)
    }

    fn skip_trivia(&mut self) {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() => {
                    self.bump();
                }
                Some('/') if self.peek_at(1) == Some('/') => {
                    while self.peek().is_some_and(|c| c != '\n') {
                        self.bump();
                    }
                }
                _ => break,
            }
        }
    }

    fn push_error(&mut self, kind: LexErrorKind, start: usize) {
        self.errors
            .push(LexError::new(kind, Span::new(start as u32, self.pos as u32)));
    }

    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn peek_at(&self, n: usize) -> Option<char> {
        self.src[self.pos..].chars().nth(n)
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }
}

fn is_ident_start(c: char) -> bool {
    c == '_' || c.is_alphabetic()
}

fn is_ident_continue(c: char) -> bool {
    c == '_' || c.is_alphanumeric()
}

fn escape_char(e: char) -> Option<char> {
    Some(match e {
        'n' => '\n',
        't' => '\t',
        'r' => '\r',
        '\\' => '\\',
        '"' => '"',
        '\'' => '\'',
        '0' => '\0',
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        let (tokens, errors) = Lexer::new(src).tokenize();
        assert!(errors.is_empty(), "unexpected errors: {errors:?}");
        tokens.into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn lexes_simple_decl() {
        let kinds = kinds("let x = 1;");
        assert_eq!(
            kinds,
            vec![
                TokenKind::KwLet,
                TokenKind::Ident("x".into()),
                TokenKind::Eq,
                TokenKind::Int(1),
                TokenKind::Semicolon,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn lexes_string_with_escape() {
        let kinds = kinds(r#""a\nb""#);
        assert_eq!(kinds, vec![TokenKind::Str("a\nb".into()), TokenKind::Eof]);
    }

    #[test]
    fn lexes_float() {
        let kinds = kinds("3.14");
        assert_eq!(kinds, vec![TokenKind::Float(3.14), TokenKind::Eof]);
    }

    #[test]
    fn lexes_operators() {
        let kinds = kinds("+ += ++ == != <= >= && ||");
        assert_eq!(
            kinds,
            vec![
                TokenKind::Plus,
                TokenKind::PlusEq,
                TokenKind::PlusPlus,
                TokenKind::EqEq,
                TokenKind::NotEq,
                TokenKind::LtEq,
                TokenKind::GtEq,
                TokenKind::AndAnd,
                TokenKind::OrOr,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn skips_line_comments() {
        let kinds = kinds("1 // a comment\n2");
        assert_eq!(
            kinds,
            vec![TokenKind::Int(1), TokenKind::Int(2), TokenKind::Eof]
        );
    }

    #[test]
    fn reports_unexpected_character() {
        let (_, errors) = Lexer::new("let x = @;").tokenize();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, LexErrorKind::UnexpectedCharacter('@'));
    }

    #[test]
    fn reports_unterminated_string() {
        let (_, errors) = Lexer::new("\"abc").tokenize();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, LexErrorKind::UnterminatedString);
    }

    #[test]
    fn lexes_a_class_and_function_declaration() {
        let kinds = kinds("class Box { var x: int = 0 }\nfunc f(n: int): int? { n }");
        assert_eq!(
            kinds,
            vec![
                TokenKind::KwClass,
                TokenKind::Ident("Box".into()),
                TokenKind::LBrace,
                TokenKind::KwVar,
                TokenKind::Ident("x".into()),
                TokenKind::Colon,
                TokenKind::KwInt,
                TokenKind::Eq,
                TokenKind::Int(0),
                TokenKind::RBrace,
                TokenKind::KwFunc,
                TokenKind::Ident("f".into()),
                TokenKind::LParen,
                TokenKind::Ident("n".into()),
                TokenKind::Colon,
                TokenKind::KwInt,
                TokenKind::RParen,
                TokenKind::Colon,
                TokenKind::KwInt,
                TokenKind::Question,
                TokenKind::LBrace,
                TokenKind::Ident("n".into()),
                TokenKind::RBrace,
                TokenKind::Eof,
            ]
        );
    }
}
