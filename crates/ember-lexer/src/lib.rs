//! Tokenizer for the Ember source language. A thin collaborator: it has no
//! opinion about grammar, only about what counts as a token.

pub mod error;
pub mod lexer;
pub mod token;

pub use error::{LexError, LexErrorKind};
pub use lexer::Lexer;
pub use token::{Token, TokenKind};
