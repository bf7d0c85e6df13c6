//! String literal storage and the `+` flattening/folding pipeline
//! described in §4.4 ("String concatenation").

use ember_parser::{BinOpKind, ExprKind, ExprNode};
use ember_typeck::{Analysis, TypeRef};

/// Flattens a left-associative chain of `+` whose overall type is string
/// into its non-`+` leaves, left to right. `"a" + "b" + c` (parsed as
/// `("a" + "b") + c`) becomes `["a", "b", c]`.
pub fn flatten_concat<'a>(expr: &'a ExprNode, out: &mut Vec<&'a ExprNode>) {
    if let ExprKind::Binary {
        op: BinOpKind::Add,
        lhs,
        rhs,
    } = &expr.kind
    {
        flatten_concat(lhs, out);
        flatten_concat(rhs, out);
    } else {
        out.push(expr);
    }
}

/// Returns the runtime coercion function name for converting a leaf's
/// static type into an `EmberString*`, or `None` if the leaf is already a
/// string (no coercion needed).
pub fn string_coercion_fn(analysis: &Analysis, leaf: &ExprNode) -> Option<&'static str> {
    let ty = analysis.type_of(leaf.id);
    if ty == TypeRef::string() {
        return None;
    }
    Some(match ty.kind {
        ember_typeck::TypeKind::Int => "ember_string_from_int",
        ember_typeck::TypeKind::Float => "ember_string_from_float",
        ember_typeck::TypeKind::Bool => "ember_string_from_bool",
        ember_typeck::TypeKind::Char => "ember_string_from_char",
        _ => unreachable!("non-primitive, non-string operand in a string concatenation"),
    })
}

/// Registry of string literal constants seen during codegen, each given a
/// dense id used to name its static storage (`__ember_strlit_<id>`).
#[derive(Default)]
pub struct StringLiteralTable {
    literals: Vec<String>,
}

impl StringLiteralTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intern(&mut self, s: &str) -> u32 {
        if let Some(pos) = self.literals.iter().position(|existing| existing == s) {
            return pos as u32;
        }
        self.literals.push(s.to_string());
        (self.literals.len() - 1) as u32
    }

    pub fn c_name(id: u32) -> String {
        format!("__ember_strlit_{id}")
    }

    /// Emits the immortal static storage for every interned literal.
    /// `EmberString` ends in a flexible array member, so each literal gets
    /// its own fixed-size shadow struct sized to fit, cast to
    /// `EmberString*` at the point of use — the standard trick for
    /// statically allocating a type with a trailing flexible array member.
    /// `_rc = -1` marks it immortal so retain/release treat it as a no-op.
    pub fn emit(&self, out: &mut String) {
        use std::fmt::Write as _;
        for (id, lit) in self.literals.iter().enumerate() {
            let name = Self::c_name(id as u32);
            writeln!(
                out,
                "static struct {{ int32_t _rc; int32_t _len; char _data[{cap}]; }} {name}_storage = {{ -1, {len}, {data:?} }};",
                cap = lit.len() + 1,
                len = lit.len(),
                data = lit,
            )
            .unwrap();
            writeln!(out, "static EmberString* {name} = (EmberString*)&{name}_storage;\n").unwrap();
        }
    }
}
