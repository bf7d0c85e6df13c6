use rustc_hash::{FxHashMap, FxHashSet};

use ember_parser::{
    Arg, BinOpKind, Block, ExprKind, ExprNode, ExternItem, FuncDef, NodeId, Program, StmtKind,
    StmtNode, TypeDef, UnOp,
};

use crate::error::{type_mismatch, SemanticError, SemanticErrorKind};
use crate::registry::{resolve_type_spec, FieldLayout, TypeLayout, TypeRegistry};
use crate::symtab::{Scope, Symbol};
use crate::ty::{TypeKind, TypeRef};

/// Everything the code generator needs that the analyzer computed: the
/// per-node resolved type table, the set of "fresh" nodes, and the set of
/// identifier occurrences that read a narrowed (unwrapped) optional
/// binding rather than the wrapper itself.
pub struct Analysis {
    pub types: FxHashMap<NodeId, TypeRef>,
    pub fresh: FxHashSet<NodeId>,
    pub narrowed: FxHashSet<NodeId>,
    pub registry: TypeRegistry,
    pub functions: FxHashMap<String, FunctionSig>,
}

/// A resolved top-level function signature, kept around after analysis so
/// the code generator can emit forward prototypes and call-site argument
/// wrapping without re-deriving them from the AST.
#[derive(Debug, Clone)]
pub struct FunctionSig {
    pub params: Vec<TypeRef>,
    pub return_ty: TypeRef,
    pub is_extern: bool,
}

impl Analysis {
    pub fn type_of(&self, id: NodeId) -> TypeRef {
        self.types.get(&id).cloned().unwrap_or_else(TypeRef::unknown)
    }

    pub fn is_fresh(&self, id: NodeId) -> bool {
        self.fresh.contains(&id)
    }

    pub fn is_narrowed(&self, id: NodeId) -> bool {
        self.narrowed.contains(&id)
    }
}

pub fn analyze(program: &Program) -> (Analysis, Vec<SemanticError>) {
    let mut cx = Analyzer::default();
    cx.run(program);
    let analysis = Analysis {
        types: cx.types,
        fresh: cx.fresh,
        narrowed: cx.narrowed,
        registry: cx.registry,
        functions: cx.functions,
    };
    (analysis, cx.errors)
}

#[derive(Default)]
struct Analyzer {
    registry: TypeRegistry,
    errors: Vec<SemanticError>,
    types: FxHashMap<NodeId, TypeRef>,
    fresh: FxHashSet<NodeId>,
    narrowed: FxHashSet<NodeId>,
    functions: FxHashMap<String, FunctionSig>,
    /// Zero while processing top-level statements directly, incremented
    /// on entry to any nested block. `func`/`struct`/`class`/`extern`
    /// are only legal at depth zero — C has no portable nested-function
    /// equivalent, so the code generator may assume they never recur.
    block_depth: u32,
    loop_depth: u32,
    in_function: bool,
    current_return_type: Option<TypeRef>,
    // Per active loop: the inferred type of its break values, and whether
    // any break with a value has been seen yet.
    loop_result_stack: Vec<(Option<TypeRef>, bool)>,
}

/// True for the literal conditions the analyzer treats as "statically
/// always true" when deciding a `while` expression's optional-ness
/// (§4.3): bare `true`, or `!false`.
fn is_always_true(cond: &ExprNode) -> bool {
    match &cond.kind {
        ExprKind::Bool(true) => true,
        ExprKind::Unary {
            op: UnOp::Not,
            operand,
        } => matches!(operand.kind, ExprKind::Bool(false)),
        _ => false,
    }
}

impl Analyzer {
    fn err(&mut self, line: u32, kind: SemanticErrorKind) {
        self.errors.push(SemanticError::new(line, kind));
    }

    fn set_type(&mut self, id: NodeId, ty: TypeRef) {
        self.types.insert(id, ty);
    }

    fn type_of(&self, id: NodeId) -> TypeRef {
        self.types.get(&id).cloned().unwrap_or_else(TypeRef::unknown)
    }

    fn mark_fresh(&mut self, id: NodeId) {
        self.fresh.insert(id);
    }

    fn run(&mut self, program: &Program) {
        // Pass 1: register type definitions in source order (§5a).
        for stmt in &program.stmts {
            if let StmtKind::TypeDef(def) = &stmt.kind {
                self.register_type_def(def, stmt.line);
            }
        }
        // Pass 2: pre-register top-level function signatures so mutual
        // recursion works (§4.2, §5b). Extern declarations are visible
        // from the start too.
        let mut root = Scope::root();
        for stmt in &program.stmts {
            match &stmt.kind {
                StmtKind::FuncDef(def) => self.predeclare_function(def, &mut root, stmt.line),
                StmtKind::ExternBlock(items) => self.declare_externs(items, &mut root, stmt.line),
                _ => {}
            }
        }
        // Pass 3: analyze every top-level statement (function bodies
        // included) against the fully-populated root scope.
        for stmt in &program.stmts {
            self.analyze_stmt(stmt, &mut root);
        }

        for sym in root.locals() {
            if sym.is_function {
                self.functions.insert(
                    sym.name.clone(),
                    FunctionSig {
                        params: sym.param_types.clone(),
                        return_ty: sym.ty.clone(),
                        is_extern: sym.is_extern,
                    },
                );
            }
        }
    }

    fn register_type_def(&mut self, def: &TypeDef, line: u32) {
        let mut fields = Vec::new();
        let mut seen = FxHashSet::default();
        for f in &def.fields {
            if !seen.insert(f.name.clone()) {
                self.err(line, SemanticErrorKind::DuplicateDeclaration(f.name.clone()));
                continue;
            }
            let ty = match &f.type_spec {
                Some(spec) => resolve_type_spec(spec, &mut self.registry),
                None => match &f.default {
                    Some(default) => {
                        // Field typing is inferred from its default value
                        // when no explicit annotation is present.
                        self.infer_default_field_type(default)
                    }
                    None => TypeRef::unknown(),
                },
            };
            fields.push(FieldLayout {
                name: f.name.clone(),
                ty,
                is_const: f.is_const,
                is_weak: f.is_weak,
                default: f.default.clone(),
            });
        }
        let layout = TypeLayout {
            name: def.name.clone(),
            is_class: def.is_class,
            fields,
        };
        if let Err(msg) = self.registry.define(layout) {
            self.err(line, SemanticErrorKind::DuplicateDeclaration(msg));
        }
    }

    /// A best-effort literal-only type inference used solely for
    /// unannotated struct/class field defaults.
    fn infer_default_field_type(&mut self, expr: &ExprNode) -> TypeRef {
        match &expr.kind {
            ExprKind::Int(_) => TypeRef::int(),
            ExprKind::Float(_) => TypeRef::float(),
            ExprKind::Str(_) => TypeRef::string(),
            ExprKind::Bool(_) => TypeRef::bool_(),
            ExprKind::Char(_) => TypeRef::char_(),
            _ => TypeRef::unknown(),
        }
    }

    fn predeclare_function(&mut self, def: &FuncDef, scope: &mut Scope, line: u32) {
        let param_types = def
            .params
            .iter()
            .map(|p| resolve_type_spec(&p.type_spec, &mut self.registry))
            .collect();
        // Placeholder return type of `void` until the body is analyzed,
        // matching the original's "register before analyzing body" trick
        // that makes self- and mutual recursion work.
        let return_ty = def
            .return_type
            .as_ref()
            .map(|t| resolve_type_spec(t, &mut self.registry))
            .unwrap_or_else(TypeRef::void);
        let sym = Symbol::function(def.name.clone(), return_ty, param_types);
        if scope.add(sym).is_err() {
            self.err(line, SemanticErrorKind::DuplicateDeclaration(def.name.clone()));
        }
    }

    fn declare_externs(&mut self, items: &[ExternItem], scope: &mut Scope, line: u32) {
        for item in items {
            let sym = match item {
                ExternItem::Func {
                    name,
                    params,
                    return_type,
                } => {
                    let param_types = params
                        .iter()
                        .map(|p| resolve_type_spec(&p.type_spec, &mut self.registry))
                        .collect();
                    let ret = return_type
                        .as_ref()
                        .map(|t| resolve_type_spec(t, &mut self.registry))
                        .unwrap_or_else(TypeRef::void);
                    let mut sym = Symbol::function(name.clone(), ret, param_types);
                    sym.is_extern = true;
                    sym
                }
                ExternItem::Var { name, type_spec } => {
                    let ty = resolve_type_spec(type_spec, &mut self.registry);
                    let mut sym = Symbol::variable(name.clone(), ty, false);
                    sym.is_extern = true;
                    sym
                }
                ExternItem::Let { name, type_spec } => {
                    let ty = resolve_type_spec(type_spec, &mut self.registry);
                    let mut sym = Symbol::variable(name.clone(), ty, true);
                    sym.is_extern = true;
                    sym
                }
            };
            let name = sym.name.clone();
            if scope.add(sym).is_err() {
                self.err(line, SemanticErrorKind::DuplicateDeclaration(name));
            }
        }
    }

    // ---- statements -----------------------------------------------------

    fn analyze_block(&mut self, block: &Block, parent: &Scope) {
        let mut scope = Scope::child(parent);
        self.block_depth += 1;
        for stmt in &block.stmts {
            self.analyze_stmt(stmt, &mut scope);
        }
        self.block_depth -= 1;
    }

    fn analyze_stmt(&mut self, stmt: &StmtNode, scope: &mut Scope) {
        match &stmt.kind {
            StmtKind::Expr(expr) => {
                self.analyze_expr(expr, scope);
            }
            StmtKind::Decl {
                name,
                is_const,
                type_spec,
                value,
            } => {
                let value_ty = value.as_ref().map(|v| {
                    self.analyze_expr(v, scope);
                    self.type_of(v.id)
                });
                let declared_ty = type_spec
                    .as_ref()
                    .map(|t| resolve_type_spec(t, &mut self.registry));
                let ty = match (declared_ty, value_ty) {
                    (Some(declared), Some(actual)) => {
                        if !self.types_compatible(&declared, &actual) {
                            self.err(stmt.line, type_mismatch(&declared, &actual));
                        }
                        declared
                    }
                    (Some(declared), None) => declared,
                    (None, Some(actual)) => actual,
                    (None, None) => TypeRef::unknown(),
                };
                let sym = Symbol::variable(name.clone(), ty, *is_const);
                if scope.add(sym).is_err() {
                    self.err(stmt.line, SemanticErrorKind::DuplicateDeclaration(name.clone()));
                }
            }
            StmtKind::Break(value) => {
                if self.loop_depth == 0 {
                    self.err(stmt.line, SemanticErrorKind::BreakOutOfContext);
                } else {
                    self.analyze_break_continue_value(value.as_ref(), scope, stmt.line);
                }
            }
            StmtKind::Continue(value) => {
                if self.loop_depth == 0 {
                    self.err(stmt.line, SemanticErrorKind::ContinueOutOfContext);
                } else {
                    self.analyze_break_continue_value(value.as_ref(), scope, stmt.line);
                }
            }
            StmtKind::Return(value) => {
                if !self.in_function {
                    self.err(stmt.line, SemanticErrorKind::ReturnOutOfContext);
                    return;
                }
                if let Some(v) = value {
                    self.analyze_expr(v, scope);
                    let actual = self.type_of(v.id);
                    if let Some(expected) = self.current_return_type.clone() {
                        if !expected.is_unknown() && !self.types_compatible(&expected, &actual) {
                            self.err(stmt.line, type_mismatch(&expected, &actual));
                        }
                    }
                }
            }
            StmtKind::FuncDef(def) => {
                if self.block_depth > 0 {
                    self.err(stmt.line, SemanticErrorKind::TopLevelOnly("func"));
                } else {
                    self.analyze_function_body(def, scope, stmt.line);
                }
            }
            StmtKind::TypeDef(_) => {
                if self.block_depth > 0 {
                    self.err(stmt.line, SemanticErrorKind::TopLevelOnly("struct/class"));
                }
                // Top-level definitions are already registered in pass 1.
            }
            StmtKind::ExternBlock(_) => {
                if self.block_depth > 0 {
                    self.err(stmt.line, SemanticErrorKind::TopLevelOnly("extern"));
                }
                // Top-level externs are already declared in pass 2.
            }
        }
    }

    fn analyze_break_continue_value(
        &mut self,
        value: Option<&ExprNode>,
        scope: &mut Scope,
        line: u32,
    ) {
        let Some(value) = value else { return };
        self.analyze_expr(value, scope);
        let actual = self.type_of(value.id);
        let Some(frame) = self.loop_result_stack.last_mut() else {
            return;
        };
        match &frame.0 {
            None => {
                frame.0 = Some(actual);
                frame.1 = true;
            }
            Some(expected) => {
                if !expected.is_unknown() && !actual.is_unknown() && expected != &actual {
                    let expected = expected.clone();
                    self.err(line, type_mismatch(&expected, &actual));
                } else {
                    frame.1 = true;
                }
            }
        }
    }

    fn analyze_function_body(&mut self, def: &FuncDef, scope: &mut Scope, _line: u32) {
        let param_types: Vec<TypeRef> = def
            .params
            .iter()
            .map(|p| resolve_type_spec(&p.type_spec, &mut self.registry))
            .collect();
        let declared_return = def
            .return_type
            .as_ref()
            .map(|t| resolve_type_spec(t, &mut self.registry));

        let prev_in_function = self.in_function;
        let prev_return = self.current_return_type.take();
        self.in_function = true;
        self.current_return_type = declared_return.clone();

        let last_expr_ty;
        {
            let mut fn_scope = Scope::child(scope);
            for (p, ty) in def.params.iter().zip(param_types.iter()) {
                // Parameters are const within the function body.
                let _ = fn_scope.add(Symbol::variable(p.name.clone(), ty.clone(), true));
            }

            let mut body_scope = Scope::child(&fn_scope);
            let mut trailing = TypeRef::void();
            self.block_depth += 1;
            for (i, s) in def.body.stmts.iter().enumerate() {
                self.analyze_stmt(s, &mut body_scope);
                if i == def.body.stmts.len() - 1 {
                    if let StmtKind::Expr(e) = &s.kind {
                        trailing = self.type_of(e.id);
                    }
                }
            }
            self.block_depth -= 1;
            last_expr_ty = trailing;
        }

        self.in_function = prev_in_function;
        self.current_return_type = prev_return;

        // Infer the return type from the trailing expression when no
        // explicit annotation was given, then patch the pre-registered
        // function symbol (§4.2's "patched after body analysis").
        let inferred_return = declared_return.unwrap_or(last_expr_ty);
        match scope.get_mut_local(&def.name) {
            Some(sym) => {
                sym.ty = inferred_return;
                sym.param_types = param_types;
            }
            // A nested (non-top-level) function definition was never
            // pre-registered in pass 2, so declare it now instead.
            None => {
                let _ = scope.add(Symbol::function(def.name.clone(), inferred_return, param_types));
            }
        }
    }

    fn types_compatible(&self, expected: &TypeRef, actual: &TypeRef) -> bool {
        if expected.is_unknown() || actual.is_unknown() {
            return true;
        }
        if expected == actual {
            return true;
        }
        // A non-optional argument may be implicitly wrapped into a
        // primitive-optional parameter (§4.3).
        if expected.optional && !actual.optional && expected.kind == actual.kind {
            return true;
        }
        false
    }

    // ---- expressions ------------------------------------------------------

    fn analyze_expr(&mut self, expr: &ExprNode, scope: &mut Scope) {
        match &expr.kind {
            ExprKind::Int(_) => self.set_type(expr.id, TypeRef::int()),
            ExprKind::Float(_) => self.set_type(expr.id, TypeRef::float()),
            ExprKind::Bool(_) => self.set_type(expr.id, TypeRef::bool_()),
            ExprKind::Char(_) => self.set_type(expr.id, TypeRef::char_()),
            ExprKind::Str(_) => self.set_type(expr.id, TypeRef::string()),
            ExprKind::Ident(name) => self.analyze_ident(expr, name, scope),
            ExprKind::Binary { op, lhs, rhs } => self.analyze_binary(expr, *op, lhs, rhs, scope),
            ExprKind::Unary { op, operand } => self.analyze_unary(expr, *op, operand, scope),
            ExprKind::Assign { target, value } => self.analyze_assign(expr, target, value, scope),
            ExprKind::CompoundAssign { op, target, value } => {
                self.analyze_compound_assign(expr, *op, target, value, scope)
            }
            ExprKind::IncDec { target, .. } => {
                self.check_lvalue(target, scope, expr.line);
                self.analyze_expr(target, scope);
                let ty = self.type_of(target.id);
                self.set_type(expr.id, ty);
            }
            ExprKind::Call { callee, args } => self.analyze_call(expr, callee, args, scope),
            ExprKind::FieldAccess { object, field } => {
                self.analyze_field_access(expr, object, field, scope)
            }
            ExprKind::Index { object, index } => self.analyze_index(expr, object, index, scope),
            ExprKind::OptionalCheck { operand } => {
                self.analyze_expr(operand, scope);
                let ty = self.type_of(operand.id);
                if !ty.optional && !ty.is_reference_type() {
                    self.err(
                        expr.line,
                        SemanticErrorKind::OptionalMisuse(
                            "'?' requires an optional or a reference-typed operand".into(),
                        ),
                    );
                }
                self.set_type(expr.id, TypeRef::bool_());
            }
            ExprKind::If {
                cond,
                then_branch,
                else_branch,
                is_value_form,
            } => self.analyze_if(expr, cond, then_branch, else_branch.as_ref(), *is_value_form, scope),
            ExprKind::While {
                cond,
                body,
                is_value_form,
            } => self.analyze_while(expr, cond, body, *is_value_form, scope),
            ExprKind::For {
                init,
                cond,
                update,
                body,
                is_value_form,
            } => self.analyze_for(expr, init.as_deref(), cond.as_deref(), update.as_deref(), body, *is_value_form, scope),
            ExprKind::Tuple(items) => {
                for it in items {
                    self.analyze_expr(it, scope);
                }
                let elem_types = items.iter().map(|i| self.type_of(i.id)).collect();
                let ty = self.registry.intern_tuple(elem_types);
                self.set_type(expr.id, ty);
                self.mark_fresh(expr.id);
            }
            ExprKind::ObjectLiteral(fields) => {
                for (_, v) in fields {
                    self.analyze_expr(v, scope);
                }
                let resolved = fields
                    .iter()
                    .map(|(n, v)| (n.clone(), self.type_of(v.id)))
                    .collect();
                let ty = self.registry.intern_object(resolved);
                self.set_type(expr.id, ty);
                self.mark_fresh(expr.id);
            }
            ExprKind::ArrayLiteral(items) => {
                let mut elem_ty = TypeRef::unknown();
                for it in items {
                    self.analyze_expr(it, scope);
                    let t = self.type_of(it.id);
                    if !t.is_unknown() {
                        elem_ty = t;
                    }
                }
                self.set_type(expr.id, TypeRef::array(elem_ty));
                self.mark_fresh(expr.id);
            }
            ExprKind::HashLiteral(pairs) => {
                let mut key_ty = TypeRef::unknown();
                let mut val_ty = TypeRef::unknown();
                for (k, v) in pairs {
                    self.analyze_expr(k, scope);
                    self.analyze_expr(v, scope);
                    let kt = self.type_of(k.id);
                    let vt = self.type_of(v.id);
                    if !kt.is_unknown() {
                        key_ty = kt;
                    }
                    if !vt.is_unknown() {
                        val_ty = vt;
                    }
                }
                self.set_type(expr.id, TypeRef::hash(key_ty, val_ty));
                self.mark_fresh(expr.id);
            }
            ExprKind::TypedEmptyArray(name) => {
                // Open Question (b): registry lookup first, primitive
                // table second.
                let elem = self.registry.resolve_named_kind(name).unwrap_or_else(|| {
                    self.err(expr.line, SemanticErrorKind::UndefinedName(name.clone()));
                    TypeRef::unknown()
                });
                self.set_type(expr.id, TypeRef::array(elem));
                self.mark_fresh(expr.id);
            }
            ExprKind::TypedEmptyHash(key, val) => {
                let key_ty = self.registry.resolve_named_kind(key).unwrap_or_else(|| {
                    self.err(expr.line, SemanticErrorKind::UndefinedName(key.clone()));
                    TypeRef::unknown()
                });
                let val_ty = self.registry.resolve_named_kind(val).unwrap_or_else(|| {
                    self.err(expr.line, SemanticErrorKind::UndefinedName(val.clone()));
                    TypeRef::unknown()
                });
                self.set_type(expr.id, TypeRef::hash(key_ty, val_ty));
                self.mark_fresh(expr.id);
            }
        }
    }

    fn analyze_ident(&mut self, expr: &ExprNode, name: &str, scope: &Scope) {
        match scope.lookup(name) {
            Some(sym) => {
                self.set_type(expr.id, sym.ty.clone());
            }
            None => {
                self.err(expr.line, SemanticErrorKind::UndefinedName(name.to_string()));
                self.set_type(expr.id, TypeRef::unknown());
            }
        }
    }

    fn analyze_binary(
        &mut self,
        expr: &ExprNode,
        op: BinOpKind,
        lhs: &ExprNode,
        rhs: &ExprNode,
        scope: &mut Scope,
    ) {
        self.analyze_expr(lhs, scope);
        self.analyze_expr(rhs, scope);
        let lt = self.type_of(lhs.id);
        let rt = self.type_of(rhs.id);
        if lt.is_void() || rt.is_void() {
            self.err(
                expr.line,
                SemanticErrorKind::TypeMismatch {
                    expected: "a value".into(),
                    actual: "void".into(),
                },
            );
        }
        let ty = match op {
            BinOpKind::Add if lt.kind == TypeKind::Str || rt.kind == TypeKind::Str => {
                self.mark_fresh(expr.id);
                TypeRef::string()
            }
            BinOpKind::Add | BinOpKind::Sub | BinOpKind::Mul | BinOpKind::Div | BinOpKind::Rem => {
                if lt.kind == TypeKind::Float || rt.kind == TypeKind::Float {
                    TypeRef::float()
                } else {
                    TypeRef::int()
                }
            }
            BinOpKind::Eq
            | BinOpKind::NotEq
            | BinOpKind::Lt
            | BinOpKind::Gt
            | BinOpKind::LtEq
            | BinOpKind::GtEq
            | BinOpKind::And
            | BinOpKind::Or => TypeRef::bool_(),
        };
        self.set_type(expr.id, ty);
    }

    fn analyze_unary(&mut self, expr: &ExprNode, _op: UnOp, operand: &ExprNode, scope: &mut Scope) {
        self.analyze_expr(operand, scope);
        let ty = self.type_of(operand.id);
        self.set_type(expr.id, ty);
    }

    fn analyze_assign(&mut self, expr: &ExprNode, target: &ExprNode, value: &ExprNode, scope: &mut Scope) {
        self.check_lvalue(target, scope, expr.line);
        self.analyze_expr(target, scope);
        self.analyze_expr(value, scope);
        let target_ty = self.type_of(target.id);
        let value_ty = self.type_of(value.id);
        if !self.types_compatible(&target_ty, &value_ty) {
            self.err(expr.line, type_mismatch(&target_ty, &value_ty));
        }
        self.set_type(expr.id, target_ty);
    }

    fn analyze_compound_assign(
        &mut self,
        expr: &ExprNode,
        _op: BinOpKind,
        target: &ExprNode,
        value: &ExprNode,
        scope: &mut Scope,
    ) {
        self.check_lvalue(target, scope, expr.line);
        self.analyze_expr(target, scope);
        self.analyze_expr(value, scope);
        let ty = self.type_of(target.id);
        self.set_type(expr.id, ty);
    }

    /// Validates that `expr` may appear on the left of `=`/`+=`/`++` etc.
    /// Walks nested field-access chains to find the root binding, matching
    /// the original implementation's lvalue check.
    fn check_lvalue(&mut self, expr: &ExprNode, scope: &Scope, line: u32) {
        match &expr.kind {
            ExprKind::Ident(name) => match scope.lookup(name) {
                Some(sym) if sym.is_extern => {
                    self.err(line, SemanticErrorKind::AssignToExtern(name.clone()))
                }
                Some(sym) if sym.is_const => {
                    self.err(line, SemanticErrorKind::AssignToConst(name.clone()))
                }
                _ => {}
            },
            ExprKind::FieldAccess { object, field } => {
                self.check_lvalue(object, scope, line);
                let obj_ty = self.type_of(object.id);
                if let Some(name) = obj_ty.struct_or_class_name() {
                    if let Some(layout) = self.registry.get(name) {
                        if let Some(f) = layout.field(field) {
                            if f.is_const {
                                self.err(
                                    line,
                                    SemanticErrorKind::AssignToImmutableField(field.clone()),
                                );
                            }
                        }
                    }
                }
            }
            ExprKind::Index { object, .. } => self.check_lvalue(object, scope, line),
            _ => self.err(
                line,
                SemanticErrorKind::InvalidLvalue("target is not a variable, field, or index expression".into()),
            ),
        }
    }

    fn analyze_call(&mut self, expr: &ExprNode, callee: &str, args: &[Arg], scope: &mut Scope) {
        // Struct/class construction: callee names a registered type.
        if self.registry.contains(callee) {
            self.analyze_struct_init(expr, callee, args, scope);
            return;
        }
        if callee == "print" {
            if args.len() != 1 {
                self.err(
                    expr.line,
                    SemanticErrorKind::ArityMismatch {
                        expected: 1,
                        actual: args.len(),
                    },
                );
            } else {
                self.analyze_expr(&args[0].value, scope);
                let ty = self.type_of(args[0].value.id);
                // `print` accepts any primitive or string, coercing to a
                // display string the same way `+` does when concatenating
                // a non-string operand.
                if ty != TypeRef::string() && !ty.is_primitive() {
                    self.err(expr.line, type_mismatch(&TypeRef::string(), &ty));
                }
            }
            self.set_type(expr.id, TypeRef::void());
            return;
        }
        let Some(sym) = scope.lookup(callee).cloned() else {
            self.err(expr.line, SemanticErrorKind::UndefinedName(callee.to_string()));
            for a in args {
                self.analyze_expr(&a.value, scope);
            }
            self.set_type(expr.id, TypeRef::unknown());
            return;
        };
        if !sym.is_function {
            self.err(expr.line, SemanticErrorKind::NotCallable(callee.to_string()));
        }
        if args.len() != sym.param_types.len() {
            self.err(
                expr.line,
                SemanticErrorKind::ArityMismatch {
                    expected: sym.param_types.len(),
                    actual: args.len(),
                },
            );
        }
        for (i, a) in args.iter().enumerate() {
            self.analyze_expr(&a.value, scope);
            if let Some(expected) = sym.param_types.get(i) {
                let actual = self.type_of(a.value.id);
                if !self.types_compatible(expected, &actual) {
                    self.err(expr.line, type_mismatch(expected, &actual));
                }
            }
        }
        let ret = sym.ty.clone();
        if ret.is_reference_type() {
            self.mark_fresh(expr.id);
        }
        self.set_type(expr.id, ret);
    }

    fn analyze_struct_init(&mut self, expr: &ExprNode, type_name: &str, args: &[Arg], scope: &mut Scope) {
        let is_class = self.registry.is_class(type_name);
        let field_names: Vec<String> = self
            .registry
            .get(type_name)
            .map(|l| l.fields.iter().map(|f| f.name.clone()).collect())
            .unwrap_or_default();
        let mut provided = FxHashSet::default();
        for a in args {
            self.analyze_expr(&a.value, scope);
            let Some(name) = &a.name else {
                self.err(
                    expr.line,
                    SemanticErrorKind::InvalidLvalue(
                        "struct/class construction requires named arguments".into(),
                    ),
                );
                continue;
            };
            if !field_names.contains(name) {
                self.err(
                    expr.line,
                    SemanticErrorKind::UnknownField {
                        ty: type_name.to_string(),
                        field: name.clone(),
                    },
                );
                continue;
            }
            provided.insert(name.clone());
            let expected = self
                .registry
                .get(type_name)
                .and_then(|l| l.field(name))
                .map(|f| f.ty.clone());
            if let Some(expected) = expected {
                let actual = self.type_of(a.value.id);
                if !self.types_compatible(&expected, &actual) {
                    self.err(expr.line, type_mismatch(&expected, &actual));
                }
            }
        }
        let missing: Vec<String> = if let Some(layout) = self.registry.get(type_name) {
            layout
                .fields
                .iter()
                .filter(|f| f.default.is_none() && !provided.contains(&f.name))
                .map(|f| f.name.clone())
                .collect()
        } else {
            Vec::new()
        };
        for field in missing {
            self.err(
                expr.line,
                SemanticErrorKind::StructInitMissingField {
                    ty: type_name.to_string(),
                    field,
                },
            );
        }
        self.set_type(expr.id, TypeRef::named(is_class, type_name));
        if is_class {
            self.mark_fresh(expr.id);
        }
    }

    fn analyze_field_access(&mut self, expr: &ExprNode, object: &ExprNode, field: &str, scope: &mut Scope) {
        self.analyze_expr(object, scope);
        let obj_ty = self.type_of(object.id);
        if obj_ty.kind == TypeKind::Str && field == "length" {
            self.set_type(expr.id, TypeRef::int());
            return;
        }
        let Some(name) = obj_ty.struct_or_class_name() else {
            if !obj_ty.is_unknown() {
                self.err(
                    expr.line,
                    SemanticErrorKind::UnknownField {
                        ty: obj_ty.to_string(),
                        field: field.to_string(),
                    },
                );
            }
            self.set_type(expr.id, TypeRef::unknown());
            return;
        };
        let name = name.to_string();
        match self.registry.get(&name).and_then(|l| l.field(field)) {
            Some(f) => self.set_type(expr.id, f.ty.clone()),
            None => {
                self.err(
                    expr.line,
                    SemanticErrorKind::UnknownField {
                        ty: name,
                        field: field.to_string(),
                    },
                );
                self.set_type(expr.id, TypeRef::unknown());
            }
        }
    }

    fn analyze_index(&mut self, expr: &ExprNode, object: &ExprNode, index: &ExprNode, scope: &mut Scope) {
        self.analyze_expr(object, scope);
        self.analyze_expr(index, scope);
        let obj_ty = self.type_of(object.id);
        let ty = match &obj_ty.kind {
            TypeKind::Str => TypeRef::char_(),
            TypeKind::Array(elem) => (**elem).clone(),
            TypeKind::Hash(_, val) => (**val).clone(),
            TypeKind::Unknown => TypeRef::unknown(),
            _ => {
                self.err(
                    expr.line,
                    SemanticErrorKind::TypeMismatch {
                        expected: "array, hash, or string".into(),
                        actual: obj_ty.to_string(),
                    },
                );
                TypeRef::unknown()
            }
        };
        self.set_type(expr.id, ty);
    }

    fn analyze_if(
        &mut self,
        expr: &ExprNode,
        cond: &ExprNode,
        then_branch: &Block,
        else_branch: Option<&Block>,
        is_value_form: bool,
        scope: &mut Scope,
    ) {
        self.analyze_expr(cond, scope);

        // Flow-sensitive narrowing: `if x?` on a bare identifier bound to
        // an optional primitive shadows `x` inside the then-branch with a
        // non-optional binding of the underlying kind.
        let narrow = self.narrowing_target(cond, scope);

        let then_ty = {
            let mut then_scope = Scope::child(scope);
            if let Some((name, underlying)) = &narrow {
                // Shadow the binding with its unwrapped, non-optional
                // type for the extent of the then-branch.
                then_scope.shadow(Symbol::variable(name.clone(), underlying.clone(), true));
            }
            self.analyze_block_in(then_branch, &mut then_scope);
            self.block_trailing_type(then_branch)
        };

        // Mark narrowed Ident occurrences: any Ident node inside the
        // then-branch resolving to the narrowed name whose resolved type
        // matches the underlying (non-optional) kind.
        if let Some((name, underlying)) = &narrow {
            self.tag_narrowed_idents(then_branch, name, underlying);
        }

        let else_ty = else_branch.map(|b| {
            self.analyze_block(b, scope);
            self.block_trailing_type(b)
        });

        // Statement-form `if` never produces a value, so it never gets a
        // result temp regardless of what the branches evaluate to (§9 Open
        // Question (a)). Branch types still get analyzed above for their
        // own internal errors, but they don't feed a result here.
        let result_ty = if !is_value_form {
            TypeRef::void()
        } else {
            match else_ty {
                Some(else_ty) => {
                    if then_ty.is_unknown() || else_ty.is_unknown() {
                        TypeRef::unknown()
                    } else if then_ty.kind == else_ty.kind {
                        then_ty
                    } else {
                        self.err(expr.line, type_mismatch(&then_ty, &else_ty));
                        TypeRef::unknown()
                    }
                }
                None => then_ty.make_optional(),
            }
        };
        if result_ty.is_reference_type() {
            self.mark_fresh(expr.id);
        }
        self.set_type(expr.id, result_ty);
    }

    fn analyze_block_in(&mut self, block: &Block, scope: &mut Scope) {
        self.block_depth += 1;
        for stmt in &block.stmts {
            self.analyze_stmt(stmt, scope);
        }
        self.block_depth -= 1;
    }

    fn block_trailing_type(&self, block: &Block) -> TypeRef {
        match block.stmts.last() {
            Some(StmtNode {
                kind: StmtKind::Expr(e),
                ..
            }) => self.type_of(e.id),
            _ => TypeRef::void(),
        }
    }

    /// Recognizes `x?` where `x` is a bare identifier bound to an
    /// optional primitive type, returning `(name, underlying_type)`.
    fn narrowing_target(&self, cond: &ExprNode, scope: &Scope) -> Option<(String, TypeRef)> {
        let ExprKind::OptionalCheck { operand } = &cond.kind else {
            return None;
        };
        let ExprKind::Ident(name) = &operand.kind else {
            return None;
        };
        let sym = scope.lookup(name)?;
        if sym.ty.optional && sym.ty.is_primitive() {
            Some((name.clone(), sym.ty.non_optional()))
        } else {
            None
        }
    }

    fn tag_narrowed_idents(&mut self, block: &Block, name: &str, underlying: &TypeRef) {
        for stmt in &block.stmts {
            self.tag_narrowed_in_stmt(stmt, name, underlying);
        }
    }

    fn tag_narrowed_in_stmt(&mut self, stmt: &StmtNode, name: &str, underlying: &TypeRef) {
        match &stmt.kind {
            StmtKind::Expr(e) => self.tag_narrowed_in_expr(e, name, underlying),
            StmtKind::Decl { value: Some(v), .. } => self.tag_narrowed_in_expr(v, name, underlying),
            StmtKind::Break(Some(v)) | StmtKind::Continue(Some(v)) | StmtKind::Return(Some(v)) => {
                self.tag_narrowed_in_expr(v, name, underlying)
            }
            _ => {}
        }
    }

    fn tag_narrowed_in_expr(&mut self, expr: &ExprNode, name: &str, underlying: &TypeRef) {
        if let ExprKind::Ident(n) = &expr.kind {
            if n == name && self.types.get(&expr.id) == Some(underlying) {
                self.narrowed.insert(expr.id);
            }
        }
        for child in direct_children(expr) {
            self.tag_narrowed_in_expr(child, name, underlying);
        }
    }

    fn analyze_while(
        &mut self,
        expr: &ExprNode,
        cond: &ExprNode,
        body: &Block,
        is_value_form: bool,
        scope: &mut Scope,
    ) {
        self.analyze_expr(cond, scope);
        self.loop_depth += 1;
        self.loop_result_stack.push((None, false));
        self.analyze_block(body, scope);
        let (result_ty, has_value) = self.loop_result_stack.pop().unwrap();
        self.loop_depth -= 1;

        // Statement-form loops never produce a result temp (§9 Open
        // Question (a)), even if a `break` inside carries a value.
        let ty = if !is_value_form {
            TypeRef::void()
        } else {
            match result_ty {
                Some(t) if is_always_true(cond) => t,
                Some(t) => t.make_optional(),
                None => TypeRef::void(),
            }
        };
        let _ = has_value;
        if ty.is_reference_type() {
            self.mark_fresh(expr.id);
        }
        self.set_type(expr.id, ty);
    }

    fn analyze_for(
        &mut self,
        expr: &ExprNode,
        init: Option<&StmtNode>,
        cond: Option<&ExprNode>,
        update: Option<&StmtNode>,
        body: &Block,
        is_value_form: bool,
        scope: &mut Scope,
    ) {
        let mut for_scope = Scope::child(scope);
        if let Some(init) = init {
            self.analyze_stmt(init, &mut for_scope);
        }
        if let Some(cond) = cond {
            self.analyze_expr(cond, &mut for_scope);
        }
        self.loop_depth += 1;
        self.loop_result_stack.push((None, false));
        self.analyze_block(body, &for_scope);
        if let Some(update) = update {
            self.analyze_stmt(update, &mut for_scope);
        }
        let (result_ty, _) = self.loop_result_stack.pop().unwrap();
        self.loop_depth -= 1;

        // A value-form `for` expression is always optional (§4.3): it may
        // run zero iterations and never reach a `break`. Statement-form
        // never produces a result temp at all (§9 Open Question (a)).
        let ty = if !is_value_form {
            TypeRef::void()
        } else {
            result_ty.map(|t| t.make_optional()).unwrap_or_else(TypeRef::void)
        };
        if ty.is_reference_type() {
            self.mark_fresh(expr.id);
        }
        self.set_type(expr.id, ty);
    }
}

fn direct_children(expr: &ExprNode) -> Vec<&ExprNode> {
    match &expr.kind {
        ExprKind::Binary { lhs, rhs, .. } => vec![&**lhs, &**rhs],
        ExprKind::Unary { operand, .. } => vec![&**operand],
        ExprKind::Assign { target, value } => vec![&**target, &**value],
        ExprKind::CompoundAssign { target, value, .. } => vec![&**target, &**value],
        ExprKind::IncDec { target, .. } => vec![&**target],
        ExprKind::Call { args, .. } => args.iter().map(|a| &a.value).collect(),
        ExprKind::FieldAccess { object, .. } => vec![&**object],
        ExprKind::Index { object, index } => vec![&**object, &**index],
        ExprKind::OptionalCheck { operand } => vec![&**operand],
        ExprKind::Tuple(items) => items.iter().collect(),
        ExprKind::ObjectLiteral(fields) => fields.iter().map(|(_, v)| v).collect(),
        ExprKind::ArrayLiteral(items) => items.iter().collect(),
        ExprKind::HashLiteral(pairs) => pairs.iter().flat_map(|(k, v)| [k, v]).collect(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analyze_src(src: &str) -> (Analysis, Vec<SemanticError>, Program) {
        let (program, parse_errors) = ember_parser::parse(src);
        assert!(parse_errors.is_empty(), "unexpected parse errors: {parse_errors:?}");
        let (analysis, errors) = analyze(&program);
        (analysis, errors, program)
    }

    fn first_decl_value_id(program: &Program) -> NodeId {
        for stmt in &program.stmts {
            if let StmtKind::Decl { value: Some(v), .. } = &stmt.kind {
                return v.id;
            }
            if let StmtKind::FuncDef(def) = &stmt.kind {
                for s in &def.body.stmts {
                    if let StmtKind::Decl { value: Some(v), .. } = &s.kind {
                        return v.id;
                    }
                }
            }
        }
        panic!("no decl with a value found");
    }

    #[test]
    fn string_concatenation_infers_string_and_is_fresh() {
        let (analysis, errors, program) = analyze_src(r#"var a = "foo" + "bar";"#);
        assert!(errors.is_empty(), "{errors:?}");
        let id = first_decl_value_id(&program);
        assert_eq!(analysis.type_of(id), TypeRef::string());
        assert!(analysis.is_fresh(id));
    }

    #[test]
    fn array_literal_is_fresh_and_typed_by_element() {
        let (analysis, errors, program) = analyze_src("var a = [1, 2, 3];");
        assert!(errors.is_empty(), "{errors:?}");
        let id = first_decl_value_id(&program);
        assert_eq!(analysis.type_of(id), TypeRef::array(TypeRef::int()));
        assert!(analysis.is_fresh(id));
    }

    #[test]
    fn if_without_else_wraps_result_in_optional() {
        let (analysis, errors, program) = analyze_src(
            r#"
            func f(x: int) -> int {
                var y = if x > 0 { 1 };
                return 0;
            }
            "#,
        );
        assert!(errors.is_empty(), "{errors:?}");
        let id = first_decl_value_id(&program);
        assert_eq!(analysis.type_of(id), TypeRef::int().make_optional());
    }

    #[test]
    fn narrowing_marks_unwrapped_identifier_inside_then_branch() {
        let (analysis, errors, _program) = analyze_src(
            r#"
            func f(x: int?) -> int {
                if x? {
                    return x + 1;
                }
                return 0;
            }
            "#,
        );
        assert!(errors.is_empty(), "{errors:?}");
        assert!(!analysis.narrowed.is_empty());
    }

    #[test]
    fn undefined_name_is_reported() {
        let (_analysis, errors, _program) = analyze_src("var a = b + 1;");
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0].kind, SemanticErrorKind::UndefinedName(_)));
    }

    #[test]
    fn break_outside_loop_is_reported() {
        let (_analysis, errors, _program) = analyze_src("break;");
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, SemanticErrorKind::BreakOutOfContext);
    }

    #[test]
    fn struct_construction_requires_all_fields() {
        let (_analysis, errors, _program) = analyze_src(
            r#"
            struct Point {
                let x: int;
                let y: int;
            }
            var p = Point(x: 1);
            "#,
        );
        assert_eq!(errors.len(), 1);
        assert!(matches!(
            errors[0].kind,
            SemanticErrorKind::StructInitMissingField { .. }
        ));
    }

    #[test]
    fn class_construction_is_fresh() {
        let (analysis, errors, program) = analyze_src(
            r#"
            class Box {
                var value: int;
            }
            var b = Box(value: 1);
            "#,
        );
        assert!(errors.is_empty(), "{errors:?}");
        let id = first_decl_value_id(&program);
        assert!(analysis.is_fresh(id));
        assert!(analysis.type_of(id).is_reference_type());
    }
}
