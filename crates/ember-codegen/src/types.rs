//! Mapping from resolved `TypeRef`s to C types, and emission of struct and
//! class layouts plus the lifecycle (alloc/retain/release) and collection
//! (hashcode/equality) helpers generated per type.

use std::fmt::Write as _;

use ember_typeck::{TypeKind, TypeRef, TypeRegistry};

/// Renders the reserved-prefix C identifier for a user type name.
pub fn c_type_name(name: &str) -> String {
    format!("Ember_{name}")
}

/// The C type used to store a value of `ty` in a struct field, parameter,
/// or local variable slot.
pub fn c_type(ty: &TypeRef) -> String {
    if ty.optional && ty.is_primitive() {
        return match ty.kind {
            TypeKind::Int => "EmberOptInt".to_string(),
            TypeKind::Float => "EmberOptFloat".to_string(),
            TypeKind::Bool => "EmberOptBool".to_string(),
            TypeKind::Char => "EmberOptChar".to_string(),
            _ => unreachable!("is_primitive() only matches Int/Float/Bool/Char"),
        };
    }
    match &ty.kind {
        TypeKind::Unknown => unreachable!("unknown type reached codegen"),
        TypeKind::Void => "void".to_string(),
        TypeKind::Int => "int64_t".to_string(),
        TypeKind::Float => "double".to_string(),
        TypeKind::Bool => "bool".to_string(),
        TypeKind::Char => "char".to_string(),
        TypeKind::Str => "EmberString*".to_string(),
        TypeKind::Array(_) => "EmberArray*".to_string(),
        TypeKind::Hash(_, _) => "EmberHash*".to_string(),
        TypeKind::Struct(name) => c_type_name(name),
        // A reference type is optional by nullability: the pointer itself
        // doubles as the "has value" flag, `NULL` meaning "none".
        TypeKind::Class(name) => format!("{}*", c_type_name(name)),
    }
}

pub fn c_release_call(ty: &TypeRef, c_name: &str) -> String {
    if ty.optional && ty.is_primitive() {
        // Primitive optionals are plain structs with no heap payload.
        return format!("/* {c_name}: no-op release (primitive optional) */");
    }
    match &ty.kind {
        TypeKind::Str => format!("ember_string_release({c_name});"),
        TypeKind::Array(_) => format!("ember_array_release({c_name});"),
        TypeKind::Hash(_, _) => format!("ember_hash_release({c_name});"),
        TypeKind::Class(name) => format!("{}_release({c_name});", c_type_name(name).to_lowercase()),
        _ => unreachable!("c_release_call called on a non-refcounted type"),
    }
}

pub fn c_retain_call(ty: &TypeRef, c_name: &str) -> String {
    match &ty.kind {
        TypeKind::Str => format!("ember_string_retain({c_name})"),
        TypeKind::Array(_) => format!("ember_array_retain({c_name})"),
        TypeKind::Hash(_, _) => format!("ember_hash_retain({c_name})"),
        TypeKind::Class(name) => format!("{}_retain({c_name})", c_type_name(name).to_lowercase()),
        _ => c_name.to_string(),
    }
}

/// Emits the struct/class layout declarations for the header: one `struct`
/// per registered type (and per interned anonymous tuple/object shape).
/// Classes get an `_rc` refcount header slot; structs don't.
pub fn emit_type_decls(registry: &TypeRegistry, out: &mut String) {
    let mut names: Vec<&str> = registry.iter().map(|l| l.name.as_str()).collect();
    names.sort_unstable();
    for name in names {
        let layout = registry.get(name).expect("name came from iter()");
        let c_name = c_type_name(&layout.name);
        writeln!(out, "typedef struct {c_name} {{").unwrap();
        if layout.is_class {
            writeln!(out, "    int32_t _rc;").unwrap();
        }
        for field in &layout.fields {
            // A weak field stores the same C type as a strong one; only
            // retain/release emission (not layout) distinguishes them.
            writeln!(out, "    {} {};", c_type(&field.ty), field.name).unwrap();
        }
        writeln!(out, "}} {c_name};\n").unwrap();
    }
}

/// Emits alloc/retain/release lifecycle helpers and the field-wise release
/// walk for every registered class. Structs don't get heap lifecycle
/// helpers since they're copied inline; their refcounted fields are
/// released directly at the call site via `emit_struct_field_releases`.
pub fn emit_class_lifecycle(registry: &TypeRegistry, out: &mut String) {
    let mut names: Vec<&str> = registry
        .iter()
        .filter(|l| l.is_class)
        .map(|l| l.name.as_str())
        .collect();
    names.sort_unstable();
    for name in names {
        let layout = registry.get(name).expect("name came from iter()");
        let c_name = c_type_name(name);
        let lower = c_name.to_lowercase();

        writeln!(
            out,
            "static {c_name}* {lower}_alloc(void) {{\n    {c_name}* self = ({c_name}*)calloc(1, sizeof({c_name}));\n    self->_rc = 1;\n    return self;\n}}\n"
        )
        .unwrap();

        writeln!(
            out,
            "static {c_name}* {lower}_retain({c_name}* self) {{\n    if (self != NULL) {{ self->_rc++; }}\n    return self;\n}}\n"
        )
        .unwrap();

        writeln!(out, "static void {lower}_release({c_name}* self) {{").unwrap();
        writeln!(out, "    if (self == NULL) {{ return; }}").unwrap();
        writeln!(out, "    if (--self->_rc > 0) {{ return; }}").unwrap();
        for field in &layout.fields {
            if field.is_weak || !field.ty.is_reference_type() {
                continue;
            }
            writeln!(out, "    {}", c_release_call(&field.ty, &format!("self->{}", field.name))).unwrap();
        }
        writeln!(out, "    free(self);\n}}\n").unwrap();

        writeln!(
            out,
            "static EmberValue {lower}_vtable_retain(EmberValue v) {{ {lower}_retain(({c_name}*)v.as.ptr); return v; }}"
        )
        .unwrap();
        writeln!(
            out,
            "static void {lower}_vtable_release(EmberValue v) {{ {lower}_release(({c_name}*)v.as.ptr); }}"
        )
        .unwrap();
        writeln!(
            out,
            "static const EmberValueVTable {lower}_vtable = {{ {lower}_vtable_retain, {lower}_vtable_release, ember_value_eq_ptr, ember_value_hash_ptr }};\n"
        )
        .unwrap();
    }
}

/// The initializer text for a binding declared without a value
/// (`var x: T;`). Optional primitives start out empty; reference types
/// start out null (a class pointer doubling as its own "none" marker is
/// the same trick `c_type` uses for nullability); structs zero-initialize
/// field-by-field via an empty compound literal.
pub fn c_default_init(ty: &TypeRef) -> String {
    if ty.optional && ty.is_primitive() {
        return "{ ._has = false }".to_string();
    }
    match &ty.kind {
        TypeKind::Int => "0".to_string(),
        TypeKind::Float => "0.0".to_string(),
        TypeKind::Bool => "false".to_string(),
        TypeKind::Char => "'\\0'".to_string(),
        TypeKind::Str | TypeKind::Array(_) | TypeKind::Hash(_, _) | TypeKind::Class(_) => {
            "NULL".to_string()
        }
        TypeKind::Struct(_) => "{0}".to_string(),
        TypeKind::Void | TypeKind::Unknown => unreachable!("no default init for this type"),
    }
}

/// Wraps a C expression of type `ty` into an `EmberValue`, the tagged
/// union arrays and hashes store their elements as. The container itself
/// decides whether to retain a reference-typed payload (it owns one
/// vtable-selected retain/release pair per element, not per box).
pub fn c_box_value(ty: &TypeRef, c_expr: &str) -> String {
    match &ty.kind {
        TypeKind::Int => format!("ember_value_from_int({c_expr})"),
        TypeKind::Float => format!("ember_value_from_float({c_expr})"),
        TypeKind::Bool => format!("ember_value_from_bool({c_expr})"),
        TypeKind::Char => format!("ember_value_from_char({c_expr})"),
        TypeKind::Str | TypeKind::Array(_) | TypeKind::Hash(_, _) | TypeKind::Class(_) => {
            format!("ember_value_from_ptr((void*){c_expr})")
        }
        TypeKind::Struct(_) => panic!("structs cannot be stored in arrays/hashes directly"),
        TypeKind::Void | TypeKind::Unknown => unreachable!("no boxed form for this type"),
    }
}

/// The inverse of [`c_box_value`]: unwraps an `EmberValue` back to `ty`'s
/// native C representation.
pub fn c_unbox_value(ty: &TypeRef, c_expr: &str) -> String {
    match &ty.kind {
        TypeKind::Int => format!("ember_value_as_int({c_expr})"),
        TypeKind::Float => format!("ember_value_as_float({c_expr})"),
        TypeKind::Bool => format!("ember_value_as_bool({c_expr})"),
        TypeKind::Char => format!("ember_value_as_char({c_expr})"),
        TypeKind::Str => format!("(EmberString*)ember_value_as_ptr({c_expr})"),
        TypeKind::Array(_) => format!("(EmberArray*)ember_value_as_ptr({c_expr})"),
        TypeKind::Hash(_, _) => format!("(EmberHash*)ember_value_as_ptr({c_expr})"),
        TypeKind::Class(name) => format!("({}*)ember_value_as_ptr({c_expr})", c_type_name(name)),
        TypeKind::Struct(_) => panic!("structs cannot be stored in arrays/hashes directly"),
        TypeKind::Void | TypeKind::Unknown => unreachable!("no boxed form for this type"),
    }
}

/// Names the element-type vtable an array/hash of `ty` elements installs
/// at construction (`ember_vtable_int`, `ember_vtable_string`, ...). One
/// vtable constant exists per primitive kind, per registered class, and
/// for nested arrays/hashes (whose retain/release just bump/drop the
/// inner container's own refcount, letting its own vtable take it from
/// there). Structs-by-value aren't directly supported as container
/// elements (§4.1 only allows primitives, strings, classes, and nested
/// arrays/hashes).
pub fn c_element_vtable(ty: &TypeRef) -> String {
    match &ty.kind {
        TypeKind::Int => "ember_vtable_int".to_string(),
        TypeKind::Float => "ember_vtable_float".to_string(),
        TypeKind::Bool => "ember_vtable_bool".to_string(),
        TypeKind::Char => "ember_vtable_char".to_string(),
        TypeKind::Str => "ember_vtable_string".to_string(),
        TypeKind::Class(name) => format!("{}_vtable", c_type_name(name).to_lowercase()),
        TypeKind::Array(_) => "ember_vtable_array".to_string(),
        TypeKind::Hash(_, _) => "ember_vtable_hash".to_string(),
        _ => "ember_vtable_opaque".to_string(),
    }
}

/// Emits the releases for a value-typed (struct) local's refcounted
/// fields, recursing into nested value structs — used at scope exit for
/// struct-valued bindings, which the ARC scope stack does not track
/// itself (only heap-refcounted bindings are).
pub fn emit_struct_field_releases(registry: &TypeRegistry, ty: &TypeRef, c_expr: &str, out: &mut Vec<String>) {
    let TypeKind::Struct(name) = &ty.kind else {
        return;
    };
    let Some(layout) = registry.get(name) else {
        return;
    };
    for field in &layout.fields {
        if field.is_weak {
            continue;
        }
        let field_expr = format!("{c_expr}.{}", field.name);
        if field.ty.is_reference_type() {
            out.push(c_release_call(&field.ty, &field_expr));
        } else if matches!(field.ty.kind, TypeKind::Struct(_)) {
            emit_struct_field_releases(registry, &field.ty, &field_expr, out);
        }
    }
}
