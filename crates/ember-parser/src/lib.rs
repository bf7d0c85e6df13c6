//! Recursive-descent parser for the Ember source language. Produces a
//! plain, owned AST (see `ast`) with every node carrying a line number and
//! a dense id; it has no opinion about types — that is `ember-typeck`'s
//! job.

pub mod ast;
pub mod error;
pub mod parser;
pub mod type_spec;

pub use ast::*;
pub use error::ParseError;
pub use parser::parse;
pub use type_spec::TypeSpec;
