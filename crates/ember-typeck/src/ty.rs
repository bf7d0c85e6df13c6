use std::fmt;

/// The resolved, canonical representation of a type. Two `TypeRef`s are
/// equal iff structurally equal; for `Struct`/`Class` that means equal
/// `name`s, for containers it means recursively equal element/key types.
/// The `optional` flag participates in equality: `int` and `int?` are
/// distinct types.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeRef {
    pub kind: TypeKind,
    pub optional: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeKind {
    Unknown,
    Int,
    Float,
    Bool,
    Char,
    Str,
    Void,
    Array(Box<TypeRef>),
    Hash(Box<TypeRef>, Box<TypeRef>),
    Struct(String),
    Class(String),
}

impl TypeRef {
    pub fn make(kind: TypeKind) -> Self {
        Self {
            kind,
            optional: false,
        }
    }

    pub fn unknown() -> Self {
        Self::make(TypeKind::Unknown)
    }

    pub fn void() -> Self {
        Self::make(TypeKind::Void)
    }

    pub fn int() -> Self {
        Self::make(TypeKind::Int)
    }

    pub fn float() -> Self {
        Self::make(TypeKind::Float)
    }

    pub fn bool_() -> Self {
        Self::make(TypeKind::Bool)
    }

    pub fn char_() -> Self {
        Self::make(TypeKind::Char)
    }

    pub fn string() -> Self {
        Self::make(TypeKind::Str)
    }

    pub fn array(elem: TypeRef) -> Self {
        Self::make(TypeKind::Array(Box::new(elem)))
    }

    pub fn hash(key: TypeRef, value: TypeRef) -> Self {
        Self::make(TypeKind::Hash(Box::new(key), Box::new(value)))
    }

    pub fn named(is_class: bool, name: impl Into<String>) -> Self {
        let name = name.into();
        Self::make(if is_class {
            TypeKind::Class(name)
        } else {
            TypeKind::Struct(name)
        })
    }

    /// Wraps in `optional`, flattening `T??` to `T?` (§4.1).
    pub fn make_optional(self) -> Self {
        Self {
            kind: self.kind,
            optional: true,
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self.kind, TypeKind::Unknown)
    }

    pub fn is_void(&self) -> bool {
        matches!(self.kind, TypeKind::Void) && !self.optional
    }

    /// A type whose values live on the heap behind a refcounted pointer:
    /// string, array, hash, and class (but not struct, which is a value
    /// type copied inline).
    pub fn is_reference_type(&self) -> bool {
        matches!(
            self.kind,
            TypeKind::Str | TypeKind::Array(_) | TypeKind::Hash(_, _) | TypeKind::Class(_)
        )
    }

    pub fn is_primitive(&self) -> bool {
        matches!(
            self.kind,
            TypeKind::Int | TypeKind::Float | TypeKind::Bool | TypeKind::Char
        )
    }

    pub fn non_optional(&self) -> TypeRef {
        TypeRef {
            kind: self.kind.clone(),
            optional: false,
        }
    }

    pub fn struct_or_class_name(&self) -> Option<&str> {
        match &self.kind {
            TypeKind::Struct(n) | TypeKind::Class(n) => Some(n),
            _ => None,
        }
    }

    pub fn is_class(&self) -> bool {
        matches!(self.kind, TypeKind::Class(_))
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            TypeKind::Unknown => write!(f, "unknown")?,
            TypeKind::Int => write!(f, "int")?,
            TypeKind::Float => write!(f, "float")?,
            TypeKind::Bool => write!(f, "bool")?,
            TypeKind::Char => write!(f, "char")?,
            TypeKind::Str => write!(f, "string")?,
            TypeKind::Void => write!(f, "void")?,
            TypeKind::Array(elem) => write!(f, "[{elem}]")?,
            TypeKind::Hash(k, v) => write!(f, "[{k}: {v}]")?,
            TypeKind::Struct(n) | TypeKind::Class(n) => write!(f, "{n}")?,
        }
        if self.optional {
            write!(f, "?")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn optional_of_optional_flattens() {
        let t = TypeRef::int().make_optional().make_optional();
        assert_eq!(t, TypeRef::int().make_optional());
    }

    #[test]
    fn optional_flag_is_part_of_identity() {
        assert_ne!(TypeRef::int(), TypeRef::int().make_optional());
    }

    #[test]
    fn struct_equality_is_by_name() {
        let a = TypeRef::named(false, "Point");
        let b = TypeRef::named(false, "Point");
        let c = TypeRef::named(false, "Vec2");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn struct_is_value_type_class_is_reference_type() {
        assert!(!TypeRef::named(false, "Point").is_reference_type());
        assert!(TypeRef::named(true, "Box").is_reference_type());
    }
}
