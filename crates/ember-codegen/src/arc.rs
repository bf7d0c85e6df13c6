//! The ARC scope stack: the central piece of state that drives retain and
//! release placement during statement emission.
//!
//! A scope is pushed on block entry, loop entry, and function entry, and
//! popped on block exit. Each binding of a refcounted value is recorded in
//! the scope that declared it so releases can be emitted in reverse
//! declaration order when the scope closes.

use crate::types::{c_release_call, emit_struct_field_releases};
use ember_typeck::{TypeKind, TypeRef, TypeRegistry};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    Block,
    Loop,
    Function,
}

struct Binding {
    c_name: String,
    ty: TypeRef,
}

struct ScopeFrame {
    kind: ScopeKind,
    bindings: Vec<Binding>,
}

/// Tracks nested lexical scopes during emission of a single function body.
#[derive(Default)]
pub struct ArcScopes {
    frames: Vec<ScopeFrame>,
}

impl ArcScopes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, kind: ScopeKind) {
        self.frames.push(ScopeFrame {
            kind,
            bindings: Vec::new(),
        });
    }

    /// Records a binding in the innermost scope, if it owns anything that
    /// needs releasing at scope exit: a refcounted value directly, or a
    /// struct carrying refcounted fields (recursively, through nested
    /// value structs). Plain primitives are never tracked.
    pub fn bind(&mut self, c_name: impl Into<String>, ty: TypeRef) {
        if !ty.is_reference_type() && !matches!(ty.kind, TypeKind::Struct(_)) {
            return;
        }
        let frame = self.frames.last_mut().expect("bind with no open scope");
        frame.bindings.push(Binding {
            c_name: c_name.into(),
            ty,
        });
    }

    /// Pops the innermost scope, returning release statements for its
    /// bindings in reverse declaration order.
    pub fn pop(&mut self, registry: &TypeRegistry) -> Vec<String> {
        let frame = self.frames.pop().expect("pop with no open scope");
        release_statements(&frame.bindings, registry)
    }

    /// Emits releases for every scope from the innermost up to and
    /// including the nearest enclosing loop scope, without actually
    /// popping them (used by `break`/`continue`, which only unwind the C
    /// stack when the `break`/`continue` statement itself is emitted).
    pub fn releases_through_loop(&self, registry: &TypeRegistry) -> Vec<String> {
        let mut out = Vec::new();
        for frame in self.frames.iter().rev() {
            out.extend(release_statements(&frame.bindings, registry));
            if frame.kind == ScopeKind::Loop {
                break;
            }
        }
        out
    }

    /// Emits releases for every currently open scope (used by `return`).
    pub fn releases_all(&self, registry: &TypeRegistry) -> Vec<String> {
        let mut out = Vec::new();
        for frame in self.frames.iter().rev() {
            out.extend(release_statements(&frame.bindings, registry));
        }
        out
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn in_loop(&self) -> bool {
        self.frames.iter().any(|f| f.kind == ScopeKind::Loop)
    }
}

fn release_statements(bindings: &[Binding], registry: &TypeRegistry) -> Vec<String> {
    let mut out = Vec::new();
    for b in bindings.iter().rev() {
        if b.ty.is_reference_type() {
            out.push(c_release_call(&b.ty, &b.c_name));
        } else {
            emit_struct_field_releases(registry, &b.ty, &b.c_name, &mut out);
        }
    }
    out
}
