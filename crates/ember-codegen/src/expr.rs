//! Expression lowering. Every `ExprKind` becomes a C expression *text*
//! fragment; anything that needs its own statement (a call, a branch, a
//! container push) is pushed onto the current function body first and the
//! fragment returned is just the name of the temporary holding the result.
//! This is what replaces the GCC statement-expression (`({ ... })`) idiom:
//! nothing in this module ever emits one.

use ember_parser::{Arg, BinOpKind, ExprKind, ExprNode, IncDecOp, UnOp};
use ember_typeck::{TypeKind, TypeRef};

use crate::arc::ScopeKind;
use crate::emit::Codegen;
use crate::strings::{flatten_concat, string_coercion_fn};
use crate::types::{c_box_value, c_element_vtable, c_release_call, c_type, c_type_name, c_unbox_value};

impl<'a> Codegen<'a> {
    pub(crate) fn emit_expr(&mut self, expr: &ExprNode) -> String {
        match &expr.kind {
            ExprKind::Int(v) => v.to_string(),
            ExprKind::Float(v) => format!("{v:?}"),
            ExprKind::Bool(b) => b.to_string(),
            ExprKind::Char(c) => format!("'{}'", escape_c_char(*c)),
            ExprKind::Str(s) => {
                let id = self.strings.intern(s);
                crate::strings::StringLiteralTable::c_name(id)
            }
            ExprKind::Ident(name) => {
                if self.analysis.is_narrowed(expr.id) {
                    format!("{name}._val")
                } else {
                    name.clone()
                }
            }
            ExprKind::Binary { op: BinOpKind::Add, lhs, rhs } if self.analysis.type_of(expr.id).kind == TypeKind::Str => {
                self.emit_string_concat(lhs, rhs)
            }
            ExprKind::Binary { op, lhs, rhs } => self.emit_binary(*op, lhs, rhs),
            ExprKind::Unary { op, operand } => self.emit_unary(*op, operand),
            ExprKind::Assign { target, value } => self.emit_assign(target, value),
            ExprKind::CompoundAssign { op, target, value } => self.emit_compound_assign(*op, target, value),
            ExprKind::IncDec { op, prefix, target } => self.emit_inc_dec(*op, *prefix, target),
            ExprKind::Call { callee, args } => self.emit_call(expr, callee, args),
            ExprKind::FieldAccess { object, field } => self.emit_field_access(object, field),
            ExprKind::Index { object, index } => self.emit_index_get(expr, object, index),
            ExprKind::OptionalCheck { operand } => self.emit_optional_check(operand),
            ExprKind::If {
                cond,
                then_branch,
                else_branch,
                is_value_form,
            } => self.emit_if(expr, cond, then_branch, else_branch.as_ref(), *is_value_form),
            ExprKind::While { cond, body, is_value_form } => self.emit_while(expr, cond, body, *is_value_form),
            ExprKind::For {
                init,
                cond,
                update,
                body,
                is_value_form,
            } => self.emit_for(expr, init.as_deref(), cond.as_deref(), update.as_deref(), body, *is_value_form),
            ExprKind::Tuple(items) => self.emit_tuple(expr, items),
            ExprKind::ObjectLiteral(fields) => self.emit_object_literal(expr, fields),
            ExprKind::ArrayLiteral(items) => self.emit_array_literal(expr, items),
            ExprKind::HashLiteral(pairs) => self.emit_hash_literal(expr, pairs),
            ExprKind::TypedEmptyArray(_) => {
                let TypeKind::Array(elem) = &self.analysis.type_of(expr.id).kind else {
                    unreachable!("TypedEmptyArray always resolves to Array")
                };
                let tmp = self.fresh_tmp("arr");
                self.push(format!(
                    "EmberArray* {tmp} = ember_array_new(0, &{});",
                    c_element_vtable(elem)
                ));
                tmp
            }
            ExprKind::TypedEmptyHash(..) => {
                let TypeKind::Hash(key, val) = &self.analysis.type_of(expr.id).kind else {
                    unreachable!("TypedEmptyHash always resolves to Hash")
                };
                let tmp = self.fresh_tmp("hash");
                self.push(format!(
                    "EmberHash* {tmp} = ember_hash_new(&{}, &{});",
                    c_element_vtable(key),
                    c_element_vtable(val)
                ));
                tmp
            }
        }
    }

    fn emit_string_concat(&mut self, lhs: &ExprNode, rhs: &ExprNode) -> String {
        let mut leaves = Vec::new();
        flatten_concat(lhs, &mut leaves);
        flatten_concat(rhs, &mut leaves);
        let mut acc: Option<String> = None;
        for leaf in leaves {
            let coerced = self.emit_string_leaf(leaf);
            acc = Some(match acc {
                None => coerced,
                Some(prev) => {
                    let tmp = self.fresh_tmp("concat");
                    self.push(format!("EmberString* {tmp} = ember_string_concat({prev}, {coerced});"));
                    self.push(c_release_call(&TypeRef::string(), &prev));
                    self.push(c_release_call(&TypeRef::string(), &coerced));
                    tmp
                }
            });
        }
        acc.expect("string concatenation always has at least two leaves")
    }

    /// Evaluates and coerces one leaf of a `+` chain to `EmberString*`,
    /// always returning a value this call's caller owns outright.
    fn emit_string_leaf(&mut self, leaf: &ExprNode) -> String {
        let val = self.emit_expr(leaf);
        match string_coercion_fn(self.analysis, leaf) {
            Some(coerce_fn) => format!("{coerce_fn}({val})"),
            None => self.maybe_retain(&TypeRef::string(), leaf.id, &val),
        }
    }

    fn emit_binary(&mut self, op: BinOpKind, lhs: &ExprNode, rhs: &ExprNode) -> String {
        let lt = self.analysis.type_of(lhs.id);
        let l = self.emit_expr(lhs);
        let r = self.emit_expr(rhs);
        if lt.kind == TypeKind::Str && matches!(op, BinOpKind::Eq | BinOpKind::NotEq) {
            let eq = format!("ember_string_equals({l}, {r})");
            return if op == BinOpKind::Eq { eq } else { format!("(!{eq})") };
        }
        format!("({l} {} {r})", c_bin_op(op))
    }

    fn emit_unary(&mut self, op: UnOp, operand: &ExprNode) -> String {
        let v = self.emit_expr(operand);
        match op {
            UnOp::Neg => format!("(-{v})"),
            UnOp::Pos => format!("(+{v})"),
            UnOp::Not => format!("(!{v})"),
        }
    }

    /// Plain-variable, field, or index assignment. Reference-typed
    /// targets retain the incoming value into a temp *before* releasing
    /// the old one, so a self-assignment (`x = x`) never drops the last
    /// reference early.
    pub(crate) fn emit_assign(&mut self, target: &ExprNode, value: &ExprNode) -> String {
        if let ExprKind::Index { object, index } = &target.kind {
            return self.emit_index_set(target, object, index, value);
        }

        let ty = self.analysis.type_of(target.id);
        let val = self.emit_expr(value);
        let val = self.maybe_retain(&ty, value.id, &val);

        if !ty.is_reference_type() {
            let lv = self.emit_lvalue(target);
            self.push(format!("{lv} = {val};"));
            return lv;
        }

        let tmp = self.fresh_tmp("assign");
        self.push(format!("{} {tmp} = {val};", c_type(&ty)));
        let lv = self.emit_lvalue(target);
        self.push(c_release_call(&ty, &lv));
        self.push(format!("{lv} = {tmp};"));
        lv
    }

    fn emit_compound_assign(&mut self, op: BinOpKind, target: &ExprNode, value: &ExprNode) -> String {
        if let ExprKind::Index { object, index } = &target.kind {
            let elem_ty = self.analysis.type_of(target.id);
            let (obj_tmp, key_tmp, obj_ty) = self.emit_index_target(object, index);
            let current = self.emit_index_current(&obj_tmp, &key_tmp, &obj_ty, &elem_ty);
            let rhs = self.emit_expr(value);
            let result_tmp = self.fresh_tmp("ca");
            self.push(format!("{} {result_tmp} = ({current} {} {rhs});", c_type(&elem_ty), c_bin_op(op)));
            self.emit_index_write(&obj_tmp, &key_tmp, &obj_ty, &elem_ty, &result_tmp);
            return result_tmp;
        }
        let lv = self.emit_lvalue(target);
        let rhs = self.emit_expr(value);
        let result = format!("({lv} {} {rhs})", c_bin_op(op));
        self.push(format!("{lv} = {result};"));
        lv
    }

    fn emit_inc_dec(&mut self, op: IncDecOp, prefix: bool, target: &ExprNode) -> String {
        if let ExprKind::Index { object, index } = &target.kind {
            let elem_ty = self.analysis.type_of(target.id);
            let (obj_tmp, key_tmp, obj_ty) = self.emit_index_target(object, index);
            let current = self.emit_index_current(&obj_tmp, &key_tmp, &obj_ty, &elem_ty);
            let old_tmp = self.fresh_tmp("old");
            self.push(format!("{} {old_tmp} = {current};", c_type(&elem_ty)));
            let op_s = match op {
                IncDecOp::Inc => "+",
                IncDecOp::Dec => "-",
            };
            let new_tmp = self.fresh_tmp("new");
            self.push(format!("{} {new_tmp} = ({old_tmp} {op_s} 1);", c_type(&elem_ty)));
            self.emit_index_write(&obj_tmp, &key_tmp, &obj_ty, &elem_ty, &new_tmp);
            return if prefix { new_tmp } else { old_tmp };
        }
        let lv = self.emit_lvalue(target);
        let op_s = match op {
            IncDecOp::Inc => "++",
            IncDecOp::Dec => "--",
        };
        if prefix {
            format!("({op_s}{lv})")
        } else {
            format!("({lv}{op_s})")
        }
    }

    /// Evaluates an index target's container and key/index exactly once
    /// each into temporaries, since compound-assignment and inc/dec both
    /// need to read the current element and then write a new one back.
    fn emit_index_target(&mut self, object: &ExprNode, index: &ExprNode) -> (String, String, TypeRef) {
        let obj_ty = self.analysis.type_of(object.id);
        let obj = self.emit_expr(object);
        let obj_tmp = self.fresh_tmp("idxobj");
        self.push(format!("{} {obj_tmp} = {obj};", c_type(&obj_ty)));
        let idx = self.emit_expr(index);
        let key_tmp = match &obj_ty.kind {
            TypeKind::Array(_) => {
                let idx_tmp = self.fresh_tmp("idx");
                self.push(format!("int64_t {idx_tmp} = {idx};"));
                idx_tmp
            }
            TypeKind::Hash(key_ty, _) => {
                let key_tmp = self.fresh_tmp("key");
                self.push(format!("{} {key_tmp} = {idx};", c_type(key_ty)));
                key_tmp
            }
            _ => unreachable!("index target must be array or hash"),
        };
        (obj_tmp, key_tmp, obj_ty)
    }

    fn emit_index_current(&mut self, obj_tmp: &str, key_tmp: &str, obj_ty: &TypeRef, elem_ty: &TypeRef) -> String {
        match &obj_ty.kind {
            TypeKind::Array(_) => c_unbox_value(elem_ty, &format!("ember_array_get({obj_tmp}, {key_tmp})")),
            TypeKind::Hash(key_ty, _) => {
                let boxed_key = c_box_value(key_ty, key_tmp);
                c_unbox_value(elem_ty, &format!("ember_hash_get({obj_tmp}, {boxed_key})"))
            }
            _ => unreachable!("index target must be array or hash"),
        }
    }

    fn emit_index_write(&mut self, obj_tmp: &str, key_tmp: &str, obj_ty: &TypeRef, elem_ty: &TypeRef, new_val: &str) {
        let boxed = c_box_value(elem_ty, new_val);
        match &obj_ty.kind {
            TypeKind::Array(_) => self.push(format!("ember_array_set({obj_tmp}, {key_tmp}, {boxed});")),
            TypeKind::Hash(key_ty, _) => {
                let boxed_key = c_box_value(key_ty, key_tmp);
                self.push(format!("ember_hash_set({obj_tmp}, {boxed_key}, {boxed});"));
            }
            _ => unreachable!("index target must be array or hash"),
        }
    }

    /// Resolves the C lvalue text for an identifier or field-access chain.
    /// Array/hash element targets aren't raw C lvalues (elements are boxed
    /// `EmberValue`s behind accessor calls) and are handled separately by
    /// `emit_assign`/`emit_compound_assign`/`emit_inc_dec`'s own
    /// `Index`-target branches before `emit_lvalue` is ever reached.
    fn emit_lvalue(&mut self, expr: &ExprNode) -> String {
        match &expr.kind {
            ExprKind::Ident(name) => name.clone(),
            ExprKind::FieldAccess { object, field } => self.emit_field_access(object, field),
            ExprKind::Index { .. } => {
                panic!("array/hash element assignment goes through emit_assign's container path")
            }
            other => unreachable!("not an lvalue: {other:?}"),
        }
    }

    fn emit_field_access(&mut self, object: &ExprNode, field: &str) -> String {
        let obj_ty = self.analysis.type_of(object.id);
        let obj = self.emit_expr(object);
        if obj_ty.kind == TypeKind::Str && field == "length" {
            return format!("{obj}->_len");
        }
        let op = if obj_ty.is_class() { "->" } else { "." };
        format!("{obj}{op}{field}")
    }

    fn emit_index_get(&mut self, expr: &ExprNode, object: &ExprNode, index: &ExprNode) -> String {
        let obj_ty = self.analysis.type_of(object.id);
        let obj = self.emit_expr(object);
        let idx = self.emit_expr(index);
        match &obj_ty.kind {
            TypeKind::Str => format!("ember_string_char_at({obj}, {idx})"),
            TypeKind::Array(elem) => {
                let boxed = format!("ember_array_get({obj}, {idx})");
                c_unbox_value(elem, &boxed)
            }
            TypeKind::Hash(key_ty, val) => {
                let boxed_key = c_box_value(key_ty, &idx);
                let boxed = format!("ember_hash_get({obj}, {boxed_key})");
                c_unbox_value(val, &boxed)
            }
            _ => {
                let _ = expr;
                unreachable!("index target must be string, array, or hash")
            }
        }
    }

    /// Array/hash element assignment. Elements are boxed `EmberValue`s, so
    /// this never goes through `emit_lvalue` — `ember_array_set`/
    /// `ember_hash_set` already release the outgoing element via the
    /// container's installed vtable before overwriting it.
    fn emit_index_set(&mut self, target: &ExprNode, object: &ExprNode, index: &ExprNode, value: &ExprNode) -> String {
        let obj_ty = self.analysis.type_of(object.id);
        let elem_ty = self.analysis.type_of(target.id);
        let obj = self.emit_expr(object);
        let idx = self.emit_expr(index);
        let val = self.emit_expr(value);
        let val = self.maybe_retain(&elem_ty, value.id, &val);
        let boxed = c_box_value(&elem_ty, &val);
        match &obj_ty.kind {
            TypeKind::Array(_) => self.push(format!("ember_array_set({obj}, {idx}, {boxed});")),
            TypeKind::Hash(key_ty, _) => {
                let key_ty = (**key_ty).clone();
                let boxed_key = c_box_value(&key_ty, &idx);
                self.push(format!("ember_hash_set({obj}, {boxed_key}, {boxed});"));
            }
            _ => unreachable!("index assignment target must be array or hash"),
        }
        val
    }

    fn emit_optional_check(&mut self, operand: &ExprNode) -> String {
        let ty = self.analysis.type_of(operand.id);
        let v = self.emit_expr(operand);
        if ty.is_primitive() {
            format!("{v}._has")
        } else {
            format!("({v} != NULL)")
        }
    }

    /// Lowers a value-form `if`/`while`/`for` by declaring a named result
    /// temp ahead of the construct and assigning into it from each
    /// branch/iteration, rather than nesting the construct inside a GCC
    /// statement expression.
    fn emit_if(
        &mut self,
        expr: &ExprNode,
        cond: &ExprNode,
        then_branch: &ember_parser::Block,
        else_branch: Option<&ember_parser::Block>,
        is_value_form: bool,
    ) -> String {
        let result_ty = self.analysis.type_of(expr.id);
        let slot = is_value_form.then(|| {
            let tmp = self.fresh_tmp("if");
            self.push(format!("{} {tmp};", c_type(&result_ty)));
            tmp
        });

        let cond_val = self.emit_expr(cond);
        self.push(format!("if ({cond_val}) {{"));
        self.indent += 1;
        self.arc.push(ScopeKind::Block);
        self.emit_branch_body(then_branch, slot.as_deref(), &result_ty);
        for line in self.arc.pop(&self.analysis.registry) {
            self.push(line);
        }
        self.indent -= 1;

        if let Some(else_branch) = else_branch {
            self.push("} else {");
            self.indent += 1;
            self.arc.push(ScopeKind::Block);
            self.emit_branch_body(else_branch, slot.as_deref(), &result_ty);
            for line in self.arc.pop(&self.analysis.registry) {
                self.push(line);
            }
            self.indent -= 1;
        } else if let Some(slot) = &slot {
            self.push("} else {");
            self.indent += 1;
            self.push(format!("{slot} = {};", crate::types::c_default_init(&result_ty)));
            self.indent -= 1;
        }
        self.push("}");
        slot.unwrap_or_default()
    }

    /// Emits a block's statements, treating a trailing bare-expression
    /// statement as the block's value (published into `slot` if the
    /// enclosing construct is in value position).
    fn emit_branch_body(&mut self, block: &ember_parser::Block, slot: Option<&str>, result_ty: &TypeRef) {
        let stmts = &block.stmts;
        for (i, stmt) in stmts.iter().enumerate() {
            let is_last = i + 1 == stmts.len();
            if is_last {
                if let (Some(slot), ember_parser::StmtKind::Expr(e)) = (slot, &stmt.kind) {
                    let val = self.emit_expr(e);
                    let val = self.maybe_retain(result_ty, e.id, &val);
                    self.push(format!("{slot} = {val};"));
                    continue;
                }
            }
            self.emit_stmt(stmt);
        }
    }

    fn emit_while(&mut self, expr: &ExprNode, cond: &ExprNode, body: &ember_parser::Block, is_value_form: bool) -> String {
        let result_ty = self.analysis.type_of(expr.id);
        let slot = is_value_form.then(|| {
            let tmp = self.fresh_tmp("loop");
            self.push(format!("{} {tmp};", c_type(&result_ty)));
            if result_ty.optional {
                self.push(format!("{tmp} = {};", crate::types::c_default_init(&result_ty)));
            }
            tmp
        });
        self.loop_slots.push(slot.clone());

        // The condition is re-evaluated every iteration, so it's emitted
        // directly as a C `while` condition rather than hoisted — it must
        // not itself require statement-splitting (enforced by the parser
        // only allowing simple boolean expressions in loop conditions).
        let cond_val = self.emit_expr(cond);
        self.push(format!("while ({cond_val}) {{"));
        self.indent += 1;
        self.arc.push(ScopeKind::Loop);
        for stmt in &body.stmts {
            self.emit_stmt(stmt);
        }
        for line in self.arc.pop(&self.analysis.registry) {
            self.push(line);
        }
        self.indent -= 1;
        self.push("}");

        self.loop_slots.pop();
        slot.unwrap_or_default()
    }

    #[allow(clippy::too_many_arguments)]
    fn emit_for(
        &mut self,
        expr: &ExprNode,
        init: Option<&ember_parser::StmtNode>,
        cond: Option<&ExprNode>,
        update: Option<&ember_parser::StmtNode>,
        body: &ember_parser::Block,
        is_value_form: bool,
    ) -> String {
        let result_ty = self.analysis.type_of(expr.id);
        self.arc.push(ScopeKind::Block);
        if let Some(init) = init {
            self.emit_stmt(init);
        }

        let slot = is_value_form.then(|| {
            let tmp = self.fresh_tmp("loop");
            self.push(format!("{} {tmp};", c_type(&result_ty)));
            if result_ty.optional {
                self.push(format!("{tmp} = {};", crate::types::c_default_init(&result_ty)));
            }
            tmp
        });
        self.loop_slots.push(slot.clone());

        let cond_val = cond.map(|c| self.emit_expr(c)).unwrap_or_else(|| "true".to_string());
        self.push(format!("while ({cond_val}) {{"));
        self.indent += 1;
        self.arc.push(ScopeKind::Loop);
        for stmt in &body.stmts {
            self.emit_stmt(stmt);
        }
        if let Some(update) = update {
            self.emit_stmt(update);
        }
        for line in self.arc.pop(&self.analysis.registry) {
            self.push(line);
        }
        self.indent -= 1;
        self.push("}");

        self.loop_slots.pop();
        for line in self.arc.pop(&self.analysis.registry) {
            self.push(line);
        }
        slot.unwrap_or_default()
    }

    fn emit_tuple(&mut self, expr: &ExprNode, items: &[ExprNode]) -> String {
        let ty = self.analysis.type_of(expr.id);
        let name = ty.struct_or_class_name().expect("tuple resolves to an interned struct").to_string();
        let vals: Vec<String> = items.iter().map(|it| self.emit_expr(it)).collect();
        let vals: Vec<String> = items
            .iter()
            .zip(vals)
            .map(|(it, v)| {
                let elem_ty = self.analysis.type_of(it.id);
                self.maybe_retain(&elem_ty, it.id, &v)
            })
            .collect();
        let inits = vals
            .iter()
            .enumerate()
            .map(|(i, v)| format!("._{i} = {v}"))
            .collect::<Vec<_>>()
            .join(", ");
        format!("({}){{ {inits} }}", c_type_name(&name))
    }

    fn emit_object_literal(&mut self, expr: &ExprNode, fields: &[(String, ExprNode)]) -> String {
        let ty = self.analysis.type_of(expr.id);
        let name = ty.struct_or_class_name().expect("object literal resolves to an interned struct").to_string();
        let inits: Vec<String> = fields
            .iter()
            .map(|(field_name, v)| {
                let val = self.emit_expr(v);
                let elem_ty = self.analysis.type_of(v.id);
                let val = self.maybe_retain(&elem_ty, v.id, &val);
                format!(".{field_name} = {val}")
            })
            .collect();
        format!("({}){{ {} }}", c_type_name(&name), inits.join(", "))
    }

    fn emit_array_literal(&mut self, expr: &ExprNode, items: &[ExprNode]) -> String {
        let TypeKind::Array(elem_ty) = &self.analysis.type_of(expr.id).kind else {
            unreachable!("array literal always resolves to Array")
        };
        let elem_ty = (**elem_ty).clone();
        let tmp = self.fresh_tmp("arr");
        self.push(format!(
            "EmberArray* {tmp} = ember_array_new({}, &{});",
            items.len(),
            c_element_vtable(&elem_ty)
        ));
        for it in items {
            let val = self.emit_expr(it);
            let val = self.maybe_retain(&elem_ty, it.id, &val);
            self.push(format!("ember_array_push({tmp}, {});", c_box_value(&elem_ty, &val)));
        }
        tmp
    }

    fn emit_hash_literal(&mut self, expr: &ExprNode, pairs: &[(ExprNode, ExprNode)]) -> String {
        let TypeKind::Hash(key_ty, val_ty) = &self.analysis.type_of(expr.id).kind else {
            unreachable!("hash literal always resolves to Hash")
        };
        let (key_ty, val_ty) = ((**key_ty).clone(), (**val_ty).clone());
        let tmp = self.fresh_tmp("hash");
        self.push(format!(
            "EmberHash* {tmp} = ember_hash_new(&{}, &{});",
            c_element_vtable(&key_ty),
            c_element_vtable(&val_ty)
        ));
        for (k, v) in pairs {
            let kv = self.emit_expr(k);
            let kv = self.maybe_retain(&key_ty, k.id, &kv);
            let vv = self.emit_expr(v);
            let vv = self.maybe_retain(&val_ty, v.id, &vv);
            self.push(format!(
                "ember_hash_set({tmp}, {}, {});",
                c_box_value(&key_ty, &kv),
                c_box_value(&val_ty, &vv)
            ));
        }
        tmp
    }

    fn emit_call(&mut self, expr: &ExprNode, callee: &str, args: &[Arg]) -> String {
        if self.analysis.registry.contains(callee) {
            return self.emit_construction(expr, callee, args);
        }
        if callee == "print" {
            // Coerce non-string primitives to a display string the same
            // way a `+` concatenation leaf would, then release the
            // coerced (always owned) string after printing it.
            let s = self.emit_string_leaf(&args[0].value);
            self.push(format!("ember_print({s});"));
            self.push(c_release_call(&TypeRef::string(), &s));
            return String::new();
        }

        let sig = self
            .analysis
            .functions
            .get(callee)
            .cloned()
            .unwrap_or_else(|| panic!("call to '{callee}' missing from analysis"));
        let arg_vals: Vec<String> = args
            .iter()
            .zip(sig.params.iter())
            .map(|(a, param_ty)| {
                let val = self.emit_expr(&a.value);
                let val = if param_ty.is_reference_type() {
                    self.maybe_retain(param_ty, a.value.id, &val)
                } else {
                    val
                };
                // An optional-primitive parameter accepts a bare value at
                // the call site; wrap it into the designated-initializer
                // form the parameter's struct type expects.
                let actual_ty = self.analysis.type_of(a.value.id);
                if param_ty.optional && param_ty.is_primitive() && !actual_ty.optional {
                    format!("({}){{ ._has = true, ._val = {val} }}", c_type(param_ty))
                } else {
                    val
                }
            })
            .collect();
        let call = format!("{callee}({})", arg_vals.join(", "));

        if sig.return_ty.is_void() {
            self.push(format!("{call};"));
            return String::new();
        }
        let tmp = self.fresh_tmp("call");
        self.push(format!("{} {tmp} = {call};", c_type(&sig.return_ty)));
        tmp
    }

    fn emit_construction(&mut self, expr: &ExprNode, type_name: &str, args: &[Arg]) -> String {
        let is_class = self.analysis.registry.is_class(type_name);
        let layout = self
            .analysis
            .registry
            .get(type_name)
            .unwrap_or_else(|| panic!("type '{type_name}' missing from registry"))
            .clone();

        let mut field_vals: Vec<(String, String)> = Vec::new();
        for field in &layout.fields {
            if let Some(a) = args.iter().find(|a| a.name.as_deref() == Some(field.name.as_str())) {
                let val = self.emit_expr(&a.value);
                let val = self.maybe_retain(&field.ty, a.value.id, &val);
                field_vals.push((field.name.clone(), val));
            } else if let Some(default) = &field.default {
                let val = self.emit_expr(default);
                let val = self.maybe_retain(&field.ty, default.id, &val);
                field_vals.push((field.name.clone(), val));
            }
        }

        if !is_class {
            let c_name = c_type_name(type_name);
            let inits = field_vals
                .iter()
                .map(|(n, v)| format!(".{n} = {v}"))
                .collect::<Vec<_>>()
                .join(", ");
            return format!("({c_name}){{ {inits} }}");
        }

        let c_name = c_type_name(type_name);
        let lower = c_name.to_lowercase();
        let tmp = self.fresh_tmp("obj");
        self.push(format!("{c_name}* {tmp} = {lower}_alloc();"));
        for (name, val) in &field_vals {
            self.push(format!("{tmp}->{name} = {val};"));
        }
        let _ = expr;
        tmp
    }
}

fn c_bin_op(op: BinOpKind) -> &'static str {
    match op {
        BinOpKind::Add => "+",
        BinOpKind::Sub => "-",
        BinOpKind::Mul => "*",
        BinOpKind::Div => "/",
        BinOpKind::Rem => "%",
        BinOpKind::Eq => "==",
        BinOpKind::NotEq => "!=",
        BinOpKind::Lt => "<",
        BinOpKind::Gt => ">",
        BinOpKind::LtEq => "<=",
        BinOpKind::GtEq => ">=",
        BinOpKind::And => "&&",
        BinOpKind::Or => "||",
    }
}

fn escape_c_char(c: char) -> String {
    match c {
        '\'' => "\\'".to_string(),
        '\\' => "\\\\".to_string(),
        '\n' => "\\n".to_string(),
        '\t' => "\\t".to_string(),
        '\r' => "\\r".to_string(),
        '\0' => "\\0".to_string(),
        _ => c.to_string(),
    }
}
