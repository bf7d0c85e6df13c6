use rustc_hash::FxHashMap;

use crate::ty::TypeRef;

/// A resolved name binding: a variable, constant, parameter, or function.
#[derive(Debug, Clone)]
pub struct Symbol {
    pub name: String,
    pub ty: TypeRef,
    pub is_const: bool,
    pub is_extern: bool,
    pub is_function: bool,
    pub param_types: Vec<TypeRef>,
}

impl Symbol {
    pub fn variable(name: impl Into<String>, ty: TypeRef, is_const: bool) -> Self {
        Self {
            name: name.into(),
            ty,
            is_const,
            is_extern: false,
            is_function: false,
            param_types: Vec::new(),
        }
    }

    pub fn function(name: impl Into<String>, return_ty: TypeRef, param_types: Vec<TypeRef>) -> Self {
        Self {
            name: name.into(),
            ty: return_ty,
            is_const: true,
            is_extern: false,
            is_function: true,
            param_types,
        }
    }
}

/// One lexical scope: a chained hash table plus a parent link. `lookup`
/// searches inner-to-outer; redeclaration within the *same* scope is an
/// error the caller (the analyzer) reports.
pub struct Scope<'p> {
    symbols: FxHashMap<String, Symbol>,
    parent: Option<&'p Scope<'p>>,
}

impl<'p> Scope<'p> {
    pub fn root() -> Self {
        Self {
            symbols: FxHashMap::default(),
            parent: None,
        }
    }

    pub fn child(parent: &'p Scope<'p>) -> Self {
        Self {
            symbols: FxHashMap::default(),
            parent: Some(parent),
        }
    }

    /// Adds a symbol to this scope. Returns `Err` if the name is already
    /// declared in this exact scope (shadowing an outer scope is fine).
    pub fn add(&mut self, symbol: Symbol) -> Result<(), String> {
        if self.symbols.contains_key(&symbol.name) {
            return Err(format!("duplicate declaration: {}", symbol.name));
        }
        self.symbols.insert(symbol.name.clone(), symbol);
        Ok(())
    }

    /// Overwrites (or inserts) a binding in this scope unconditionally;
    /// used for narrowing shadows, which must shadow even a same-named
    /// outer binding without trying to detect redeclaration.
    pub fn shadow(&mut self, symbol: Symbol) {
        self.symbols.insert(symbol.name.clone(), symbol);
    }

    pub fn lookup(&self, name: &str) -> Option<&Symbol> {
        if let Some(sym) = self.symbols.get(name) {
            return Some(sym);
        }
        self.parent.and_then(|p| p.lookup(name))
    }

    pub fn lookup_local(&self, name: &str) -> Option<&Symbol> {
        self.symbols.get(name)
    }

    pub fn get_mut_local(&mut self, name: &str) -> Option<&mut Symbol> {
        self.symbols.get_mut(name)
    }

    pub fn locals(&self) -> impl Iterator<Item = &Symbol> {
        self.symbols.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_searches_outer_scopes() {
        let mut root = Scope::root();
        root.add(Symbol::variable("x", TypeRef::int(), false)).unwrap();
        let child = Scope::child(&root);
        assert!(child.lookup("x").is_some());
        assert!(child.lookup("y").is_none());
    }

    #[test]
    fn redeclaration_in_same_scope_errors() {
        let mut scope = Scope::root();
        scope.add(Symbol::variable("x", TypeRef::int(), false)).unwrap();
        assert!(scope.add(Symbol::variable("x", TypeRef::int(), false)).is_err());
    }

    #[test]
    fn shadowing_inner_scope_hides_outer() {
        let mut root = Scope::root();
        root.add(Symbol::variable("x", TypeRef::int().make_optional(), false))
            .unwrap();
        let mut child = Scope::child(&root);
        child.shadow(Symbol::variable("x", TypeRef::int(), false));
        assert_eq!(child.lookup("x").unwrap().ty, TypeRef::int());
        assert_eq!(root.lookup("x").unwrap().ty, TypeRef::int().make_optional());
    }
}
