use ember_common::Span;

/// A lexical token: a classified slice of source text plus its location.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    pub fn new(kind: TokenKind, span: Span) -> Self {
        Self { kind, span }
    }
}

/// Every lexical category the scanner produces. Keywords are distinguished
/// from general identifiers up front so the parser never has to compare
/// strings.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // Literals
    Int(i64),
    Float(f64),
    Str(String),
    Char(char),
    Ident(String),

    // Keywords
    /// `true`
    KwTrue,
    /// `false`
    KwFalse,
    /// `let`
    KwLet,
    /// `var`
    KwVar,
    /// `func`
    KwFunc,
    /// `struct`
    KwStruct,
    /// `class`
    KwClass,
    /// `extern`
    KwExtern,
    /// `if`
    KwIf,
    /// `else`
    KwElse,
    /// `while`
    KwWhile,
    /// `for`
    KwFor,
    /// `break`
    KwBreak,
    /// `continue`
    KwContinue,
    /// `return`
    KwReturn,
    /// `weak`
    KwWeak,
    /// `int`
    KwInt,
    /// `float`
    KwFloat,
    /// `string`
    KwString,
    /// `bool`
    KwBool,
    /// `char`
    KwChar,
    /// `void`
    KwVoid,

    // Punctuation
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Comma,
    Colon,
    Semicolon,
    Dot,
    Question,
    Arrow,

    // Operators
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    PlusPlus,
    MinusMinus,
    Eq,
    EqEq,
    NotEq,
    Lt,
    Gt,
    LtEq,
    GtEq,
    AndAnd,
    OrOr,
    Bang,
    PlusEq,
    MinusEq,
    StarEq,
    SlashEq,
    PercentEq,

    Eof,
}

impl TokenKind {
    pub fn keyword_from_str(s: &str) -> Option<TokenKind> {
        Some(match s {
            "true" => TokenKind::KwTrue,
            "false" => TokenKind::KwFalse,
            "let" => TokenKind::KwLet,
            "var" => TokenKind::KwVar,
            "func" => TokenKind::KwFunc,
            "struct" => TokenKind::KwStruct,
            "class" => TokenKind::KwClass,
            "extern" => TokenKind::KwExtern,
            "if" => TokenKind::KwIf,
            "else" => TokenKind::KwElse,
            "while" => TokenKind::KwWhile,
            "for" => TokenKind::KwFor,
            "break" => TokenKind::KwBreak,
            "continue" => TokenKind::KwContinue,
            "return" => TokenKind::KwReturn,
            "weak" => TokenKind::KwWeak,
            "int" => TokenKind::KwInt,
            "float" => TokenKind::KwFloat,
            "string" => TokenKind::KwString,
            "bool" => TokenKind::KwBool,
            "char" => TokenKind::KwChar,
            "void" => TokenKind::KwVoid,
            _ => return None,
        })
    }
}
