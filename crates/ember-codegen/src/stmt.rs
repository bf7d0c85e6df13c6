//! Statement and function-body emission: the part of codegen that drives
//! the ARC scope stack (`arc::ArcScopes`) and decides where retains and
//! releases land.

use ember_parser::{FuncDef, StmtKind, StmtNode, TypeSpec};

use crate::arc::ScopeKind;
use crate::emit::Codegen;
use crate::types::{c_default_init, c_retain_call, c_release_call, c_type};

impl<'a> Codegen<'a> {
    /// Emits one top-level function: prototype-compatible signature,
    /// parameter bindings pushed onto a `Function`-kind ARC scope, the
    /// body, and (for non-void functions whose last statement is a bare
    /// expression rather than an explicit `return`) the implicit return
    /// synthesized from that trailing value.
    pub(crate) fn emit_function(&mut self, def: &FuncDef, out: &mut String) {
        use std::fmt::Write as _;

        let sig = self
            .analysis
            .functions
            .get(&def.name)
            .cloned()
            .unwrap_or_else(|| panic!("function '{}' missing from analysis", def.name));

        let prev_return_ty = std::mem::replace(&mut self.current_return_ty, sig.return_ty.clone());

        let ret = c_type(&sig.return_ty);
        let params = if def.params.is_empty() {
            "void".to_string()
        } else {
            def.params
                .iter()
                .zip(sig.params.iter())
                .map(|(p, ty)| format!("{} {}", c_type(ty), p.name))
                .collect::<Vec<_>>()
                .join(", ")
        };
        self.push(format!("{ret} {}({params}) {{", def.name));
        self.indent += 1;
        self.arc.push(ScopeKind::Function);
        for (p, ty) in def.params.iter().zip(sig.params.iter()) {
            self.arc.bind(p.name.clone(), ty.clone());
        }

        let stmts = &def.body.stmts;
        let mut implicit_return_emitted = false;
        let mut last_was_return = false;
        for (i, stmt) in stmts.iter().enumerate() {
            let is_last = i + 1 == stmts.len();
            if is_last && !sig.return_ty.is_void() {
                if let StmtKind::Expr(e) = &stmt.kind {
                    self.emit_line_marker(stmt.line);
                    let val = self.emit_expr(e);
                    let ty = self.analysis.type_of(e.id);
                    let val = self.maybe_retain(&ty, e.id, &val);
                    let tmp = self.fresh_tmp("ret");
                    self.push(format!("{} {tmp} = {val};", c_type(&ty)));
                    for line in self.arc.releases_all(&self.analysis.registry) {
                        self.push(line);
                    }
                    self.push(format!("return {tmp};"));
                    implicit_return_emitted = true;
                    continue;
                }
            }
            last_was_return = matches!(stmt.kind, StmtKind::Return(_));
            self.emit_stmt(stmt);
        }

        if !implicit_return_emitted && !last_was_return {
            for line in self.arc.pop(&self.analysis.registry) {
                self.push(line);
            }
            if !sig.return_ty.is_void() {
                // A function whose declared return type is non-void but
                // whose body doesn't end in a value-producing statement
                // is a semantic-analysis bug, not a codegen concern.
                self.push("return (".to_string() + &c_type(&sig.return_ty) + "){0};");
            }
        } else {
            // The scope was consumed by releases_all()/emit_stmt's own
            // Return handling; pop it without re-emitting its releases.
            self.arc.pop(&self.analysis.registry);
        }
        self.indent -= 1;
        self.push("}");

        writeln!(out, "{}\n", self.take_body().join("\n")).unwrap();
        self.current_return_ty = prev_return_ty;
    }

    /// Emits one statement. `Expr`/`Decl` may push multiple lines (ANF
    /// temporaries, retains/releases); `Break`/`Continue`/`Return` always
    /// end the current basic block.
    pub(crate) fn emit_stmt(&mut self, stmt: &StmtNode) {
        self.emit_line_marker(stmt.line);
        match &stmt.kind {
            StmtKind::Expr(e) => self.emit_expr_stmt(e),
            StmtKind::Decl {
                name,
                type_spec,
                value,
                ..
            } => self.emit_decl(name, type_spec.as_ref(), value.as_ref()),
            StmtKind::Break(value) => self.emit_break_or_continue(value.as_ref(), "break"),
            StmtKind::Continue(value) => self.emit_break_or_continue(value.as_ref(), "continue"),
            StmtKind::Return(value) => self.emit_return(value.as_ref()),
            StmtKind::FuncDef(_) | StmtKind::TypeDef(_) | StmtKind::ExternBlock(_) => {
                unreachable!("nested declarations are rejected during semantic analysis")
            }
        }
    }

    fn emit_expr_stmt(&mut self, e: &ember_parser::ExprNode) {
        let val = self.emit_expr(e);
        let ty = self.analysis.type_of(e.id);
        if ty.is_void() {
            return;
        }
        self.push(format!("(void){val};"));
        if ty.is_reference_type() && self.analysis.is_fresh(e.id) {
            self.push(c_release_call(&ty, &val));
        }
    }

    fn emit_decl(&mut self, name: &str, type_spec: Option<&TypeSpec>, value: Option<&ember_parser::ExprNode>) {
        let ty = match (type_spec, value) {
            (Some(spec), _) => ember_typeck::resolve_type_spec(spec, &mut self.var_registry),
            (None, Some(v)) => self.analysis.type_of(v.id),
            (None, None) => unreachable!("decl with neither a type nor a value"),
        };
        let c_ty = c_type(&ty);
        match value {
            Some(v) => {
                let val = self.emit_expr(v);
                let val = self.maybe_retain(&ty, v.id, &val);
                self.push(format!("{c_ty} {name} = {val};"));
            }
            None => {
                self.push(format!("{c_ty} {name} = {};", c_default_init(&ty)));
            }
        }
        self.arc.bind(name.to_string(), ty);
    }

    /// `break <e>` / `continue <e>` publish their optional value into the
    /// nearest enclosing loop's result slot before unwinding. Only one
    /// `break`/`continue` ever executes per loop invocation, so there is
    /// never a previously published value to release first.
    fn emit_break_or_continue(&mut self, value: Option<&ember_parser::ExprNode>, kw: &str) {
        if let Some(v) = value {
            if let Some(Some(slot)) = self.loop_slots.last().cloned() {
                let val = self.emit_expr(v);
                let ty = self.analysis.type_of(v.id);
                let val = self.maybe_retain(&ty, v.id, &val);
                self.push(format!("{slot} = {val};"));
            } else {
                // Loop isn't in expression position; evaluate for side
                // effects and drop a fresh result on the floor.
                let val = self.emit_expr(v);
                let ty = self.analysis.type_of(v.id);
                if ty.is_reference_type() && self.analysis.is_fresh(v.id) {
                    self.push(c_release_call(&ty, &val));
                }
            }
        }
        for line in self.arc.releases_through_loop(&self.analysis.registry) {
            self.push(line);
        }
        self.push(format!("{kw};"));
    }

    fn emit_return(&mut self, value: Option<&ember_parser::ExprNode>) {
        match value {
            Some(v) => {
                let val = self.emit_expr(v);
                let ty = self.analysis.type_of(v.id);
                let val = self.maybe_retain(&ty, v.id, &val);
                let tmp = self.fresh_tmp("ret");
                self.push(format!("{} {tmp} = {val};", c_type(&ty)));
                for line in self.arc.releases_all(&self.analysis.registry) {
                    self.push(line);
                }
                self.push(format!("return {tmp};"));
            }
            None => {
                for line in self.arc.releases_all(&self.analysis.registry) {
                    self.push(line);
                }
                self.push("return;");
            }
        }
    }

    /// Retains `val` (of type `ty`, produced by the node `src_id`) unless
    /// the producing expression was already a fresh, uniquely-owned value
    /// — transferring a fresh value into a new owner needs no retain.
    pub(crate) fn maybe_retain(&self, ty: &ember_typeck::TypeRef, src_id: ember_parser::NodeId, val: &str) -> String {
        if ty.is_reference_type() && !self.analysis.is_fresh(src_id) {
            c_retain_call(ty, val)
        } else {
            val.to_string()
        }
    }
}
