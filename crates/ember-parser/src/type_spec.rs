/// The parser's view of a type annotation: unresolved, may name a struct or
/// class that has not been registered yet. Semantic analysis turns this
/// into a canonical `TypeRef` (see `ember-typeck::ty`).
#[derive(Debug, Clone, PartialEq)]
pub enum TypeSpec {
    Int,
    Float,
    Str,
    Bool,
    Char,
    Void,
    /// A struct, class, or otherwise-unresolved type name.
    Named(String),
    Optional(Box<TypeSpec>),
    Array(Box<TypeSpec>),
    Hash(Box<TypeSpec>, Box<TypeSpec>),
    Tuple(Vec<TypeSpec>),
    Object(Vec<(String, TypeSpec)>),
}
