//! Semantic analysis: type resolution, flow-sensitive optional narrowing,
//! and fresh-value tracking for the compiler's middle tier.
//!
//! Analysis never touches the filesystem or stdout; it takes a [`Program`]
//! and returns an [`Analysis`] plus any [`SemanticError`]s. Callers decide
//! how to report or act on those errors.

pub mod analyze;
pub mod error;
pub mod registry;
pub mod symtab;
pub mod ty;

pub use analyze::{analyze, Analysis, FunctionSig};
pub use error::{SemanticError, SemanticErrorKind};
pub use registry::{resolve_type_spec, FieldLayout, TypeLayout, TypeRegistry};
pub use symtab::{Scope, Symbol};
pub use ty::{TypeKind, TypeRef};
