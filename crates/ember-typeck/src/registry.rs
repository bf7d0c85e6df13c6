use rustc_hash::FxHashMap;

use ember_parser::ExprNode;

use crate::ty::TypeRef;

/// One field of a struct or class layout, in declaration order.
#[derive(Debug, Clone)]
pub struct FieldLayout {
    pub name: String,
    pub ty: TypeRef,
    pub is_const: bool,
    pub is_weak: bool,
    pub default: Option<ExprNode>,
}

/// The registered shape of a struct or class: its ordered fields and
/// whether it is a reference type (`class`) or a value type (`struct`).
#[derive(Debug, Clone)]
pub struct TypeLayout {
    pub name: String,
    pub is_class: bool,
    pub fields: Vec<FieldLayout>,
}

impl TypeLayout {
    pub fn field(&self, name: &str) -> Option<&FieldLayout> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// Global, flat, name-keyed map from type name to layout. Frozen after
/// semantic analysis completes; every lookup after that point is
/// read-only (§3 invariant).
#[derive(Debug, Default, Clone)]
pub struct TypeRegistry {
    layouts: FxHashMap<String, TypeLayout>,
    /// Counters for synthesizing unique names for anonymous tuple/object
    /// shapes (`__Tuple0`, `__Obj0`, ...).
    tuple_counter: u32,
    obj_counter: u32,
    /// Structural-shape -> synthesized-name cache so that two literal
    /// shapes with identical ordered field types collapse to one name.
    tuple_shapes: FxHashMap<Vec<TypeRef>, String>,
    obj_shapes: FxHashMap<Vec<(String, TypeRef)>, String>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn define(&mut self, layout: TypeLayout) -> Result<(), String> {
        if self.layouts.contains_key(&layout.name) {
            return Err(format!("duplicate type definition: {}", layout.name));
        }
        self.layouts.insert(layout.name.clone(), layout);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&TypeLayout> {
        self.layouts.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.layouts.contains_key(name)
    }

    pub fn is_class(&self, name: &str) -> bool {
        self.layouts.get(name).is_some_and(|l| l.is_class)
    }

    /// Interns an anonymous tuple shape, returning its canonical `TypeRef`.
    pub fn intern_tuple(&mut self, elem_types: Vec<TypeRef>) -> TypeRef {
        if let Some(name) = self.tuple_shapes.get(&elem_types) {
            return TypeRef::named(true, name.clone());
        }
        let name = format!("__Tuple{}", self.tuple_counter);
        self.tuple_counter += 1;
        let fields = elem_types
            .iter()
            .enumerate()
            .map(|(i, ty)| FieldLayout {
                name: format!("_{i}"),
                ty: ty.clone(),
                is_const: false,
                is_weak: false,
                default: None,
            })
            .collect();
        self.layouts.insert(
            name.clone(),
            TypeLayout {
                name: name.clone(),
                is_class: false,
                fields,
            },
        );
        self.tuple_shapes.insert(elem_types, name.clone());
        TypeRef::named(false, name)
    }

    /// Interns an anonymous object shape (field name + type pairs, in
    /// literal order), returning its canonical `TypeRef`.
    pub fn intern_object(&mut self, fields: Vec<(String, TypeRef)>) -> TypeRef {
        if let Some(name) = self.obj_shapes.get(&fields) {
            return TypeRef::named(false, name.clone());
        }
        let name = format!("__Obj{}", self.obj_counter);
        self.obj_counter += 1;
        let layout_fields = fields
            .iter()
            .map(|(n, ty)| FieldLayout {
                name: n.clone(),
                ty: ty.clone(),
                is_const: false,
                is_weak: false,
                default: None,
            })
            .collect();
        self.layouts.insert(
            name.clone(),
            TypeLayout {
                name: name.clone(),
                is_class: false,
                fields: layout_fields,
            },
        );
        self.obj_shapes.insert(fields, name.clone());
        TypeRef::named(false, name)
    }

    /// Open Question (b): resolves a bare name used in a typed empty
    /// literal (`[]: Name`) by trying the registry first, then the table
    /// of primitive-kind names.
    pub fn resolve_named_kind(&self, name: &str) -> Option<TypeRef> {
        if let Some(layout) = self.layouts.get(name) {
            return Some(TypeRef::named(layout.is_class, name));
        }
        Some(match name {
            "int" => TypeRef::int(),
            "float" => TypeRef::float(),
            "bool" => TypeRef::bool_(),
            "char" => TypeRef::char_(),
            "string" => TypeRef::string(),
            "void" => TypeRef::void(),
            _ => return None,
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = &TypeLayout> {
        self.layouts.values()
    }
}

/// Resolves a parser-side `TypeSpec` into a canonical `TypeRef` (§4.1).
/// An unresolved named spec whose name is registered as a `class`
/// resolves to `Class`; otherwise `Struct` (this lets a struct be
/// referenced before, or even without, an explicit definition appearing
/// lexically first — matching the spec's registry-lookup resolution
/// rule). An unknown name resolves to `Unknown`, which propagates rather
/// than panicking (§4.1, "Unknown kinds propagate").
pub fn resolve_type_spec(spec: &ember_parser::TypeSpec, registry: &mut TypeRegistry) -> TypeRef {
    use ember_parser::TypeSpec as TS;
    match spec {
        TS::Int => TypeRef::int(),
        TS::Float => TypeRef::float(),
        TS::Str => TypeRef::string(),
        TS::Bool => TypeRef::bool_(),
        TS::Char => TypeRef::char_(),
        TS::Void => TypeRef::void(),
        TS::Named(name) => {
            if let Some(layout) = registry.get(name) {
                TypeRef::named(layout.is_class, name.clone())
            } else {
                TypeRef::unknown()
            }
        }
        TS::Optional(inner) => resolve_type_spec(inner, registry).make_optional(),
        TS::Array(elem) => TypeRef::array(resolve_type_spec(elem, registry)),
        TS::Hash(key, val) => {
            TypeRef::hash(resolve_type_spec(key, registry), resolve_type_spec(val, registry))
        }
        TS::Tuple(items) => {
            let resolved = items.iter().map(|t| resolve_type_spec(t, registry)).collect();
            registry.intern_tuple(resolved)
        }
        TS::Object(fields) => {
            let resolved = fields
                .iter()
                .map(|(n, t)| (n.clone(), resolve_type_spec(t, registry)))
                .collect();
            registry.intern_object(resolved)
        }
    }
}

pub fn equals(a: &TypeRef, b: &TypeRef) -> bool {
    a == b
}

pub fn clone_ty(t: &TypeRef) -> TypeRef {
    t.clone()
}
