//! Top-level orchestration: walks the analyzed program once and produces
//! the header (`<base>.h`) and body (`<base>.c`) source text described in
//! §4.4.

use std::fmt::Write as _;

use ember_parser::{ExternItem, FuncDef, Program, StmtKind};
use ember_typeck::{Analysis, TypeRef, TypeRegistry};

use crate::arc::{ArcScopes, ScopeKind};
use crate::strings::StringLiteralTable;
use crate::types::{c_type, emit_class_lifecycle, emit_type_decls};

/// The two files a compilation unit produces.
pub struct GeneratedUnit {
    pub header: String,
    pub body: String,
}

/// Shared emission state threaded through `expr.rs`/`stmt.rs`. Fields are
/// `pub(crate)` so sibling modules can extend `Codegen` with their own
/// `impl` blocks.
pub struct Codegen<'a> {
    pub(crate) analysis: &'a Analysis,
    pub(crate) strings: StringLiteralTable,
    pub(crate) arc: ArcScopes,
    pub(crate) body: Vec<String>,
    pub(crate) indent: usize,
    pub(crate) tmp_counter: u32,
    pub(crate) current_return_ty: TypeRef,
    /// Scratch registry used to resolve `TypeSpec`s that don't carry a
    /// resolved `TypeRef` of their own (declarations without initializers).
    /// Cloned once from the frozen analysis registry so interning counters
    /// for anonymous shapes don't collide with it.
    pub(crate) var_registry: TypeRegistry,
    /// One entry per currently open loop; `Some(slot)` when that loop is
    /// used in expression position and needs its `break`/`continue` value
    /// published into the named result temp, `None` otherwise.
    pub(crate) loop_slots: Vec<Option<String>>,
    /// Name emitted in `#line` directives ahead of each statement, mapping
    /// generated C back to the Ember source for debuggers and `cc`
    /// diagnostics. `None` for inputs with no stable filename (stdin).
    pub(crate) source_name: Option<String>,
    last_line_emitted: u32,
}

impl<'a> Codegen<'a> {
    fn new(analysis: &'a Analysis, source_name: Option<String>) -> Self {
        Self {
            analysis,
            strings: StringLiteralTable::new(),
            arc: ArcScopes::new(),
            body: Vec::new(),
            indent: 0,
            tmp_counter: 0,
            current_return_ty: TypeRef::void(),
            var_registry: analysis.registry.clone(),
            loop_slots: Vec::new(),
            source_name,
            last_line_emitted: 0,
        }
    }

    /// Emits a `#line` directive if `line` differs from the last one
    /// emitted, so the C compiler's own diagnostics point back at the
    /// Ember source rather than the generated file.
    pub(crate) fn emit_line_marker(&mut self, line: u32) {
        let Some(name) = self.source_name.clone() else {
            return;
        };
        if line == self.last_line_emitted {
            return;
        }
        self.last_line_emitted = line;
        self.push(format!("#line {line} \"{name}\""));
    }

    pub(crate) fn fresh_tmp(&mut self, prefix: &str) -> String {
        let id = self.tmp_counter;
        self.tmp_counter += 1;
        format!("__ember_{prefix}_{id}")
    }

    pub(crate) fn push(&mut self, line: impl AsRef<str>) {
        let indent = "    ".repeat(self.indent);
        self.body.push(format!("{indent}{}", line.as_ref()));
    }

    pub(crate) fn take_body(&mut self) -> Vec<String> {
        std::mem::take(&mut self.body)
    }
}

/// `base` is the output base name (`<base>.c`/`<base>.h`); it names the
/// include guard and the header's self-include, per §6. `source_name`, if
/// given, is the path `#line` directives in the body attribute generated
/// code back to.
pub fn generate(program: &Program, analysis: &Analysis, base: &str, source_name: Option<&str>) -> GeneratedUnit {
    let guard = include_guard(base);
    let header_name = format!("{base}.h");

    let mut header = String::new();
    writeln!(header, "#ifndef {guard}").unwrap();
    writeln!(header, "#define {guard}\n").unwrap();
    writeln!(header, "#include <stdint.h>").unwrap();
    writeln!(header, "#include <stdbool.h>").unwrap();
    writeln!(header, "#include <stdlib.h>").unwrap();
    writeln!(header, "#include \"ember_runtime.h\"\n").unwrap();

    emit_type_decls(&analysis.registry, &mut header);
    emit_extern_decls(program, analysis, &mut header);
    emit_function_prototypes(program, analysis, &mut header);

    writeln!(header, "#endif /* {guard} */").unwrap();

    let mut body = String::new();
    writeln!(body, "#include \"{header_name}\"\n").unwrap();
    emit_class_lifecycle(&analysis.registry, &mut body);

    let mut cg = Codegen::new(analysis, source_name.map(str::to_string));
    let mut functions_out = String::new();
    for stmt in &program.stmts {
        if let StmtKind::FuncDef(def) = &stmt.kind {
            cg.emit_function(def, &mut functions_out);
        }
    }

    // Top-level non-function statements run before `main` reaches user
    // code; the original's `main.c` wraps them in a synthesized entry
    // point when the source has no `main` function. They get their own
    // ARC scope just like a function body would, so bindings made at the
    // top level are released once execution falls off the end.
    cg.arc.push(ScopeKind::Function);
    for stmt in &program.stmts {
        match &stmt.kind {
            StmtKind::FuncDef(_) | StmtKind::TypeDef(_) | StmtKind::ExternBlock(_) => {}
            _ => cg.emit_stmt(stmt),
        }
    }
    for line in cg.arc.pop(&analysis.registry) {
        cg.push(line);
    }
    let top_level = cg.take_body();

    // String literals must be emitted before anything that references
    // them, so collect them last and prepend.
    let mut literals = String::new();
    cg.strings.emit(&mut literals);
    body.push_str(&literals);
    body.push_str(&functions_out);

    if !top_level.is_empty() && !has_main(program) {
        writeln!(body, "int main(void) {{").unwrap();
        for line in &top_level {
            writeln!(body, "    {line}").unwrap();
        }
        writeln!(body, "    return 0;\n}}").unwrap();
    }

    GeneratedUnit { header, body }
}

/// Uppercases the base name and turns `.`/`-` into `_`, per §6.
fn include_guard(base: &str) -> String {
    let stem = base.rsplit(['/', '\\']).next().unwrap_or(base);
    let mut guard: String = stem
        .chars()
        .map(|c| if c == '.' || c == '-' { '_' } else { c.to_ascii_uppercase() })
        .collect();
    guard.push_str("_H");
    guard
}

fn has_main(program: &Program) -> bool {
    program.stmts.iter().any(|s| matches!(&s.kind, StmtKind::FuncDef(f) if f.name == "main"))
}

fn emit_extern_decls(program: &Program, analysis: &Analysis, out: &mut String) {
    let mut var_registry = analysis.registry.clone();
    for stmt in &program.stmts {
        let StmtKind::ExternBlock(items) = &stmt.kind else {
            continue;
        };
        for item in items {
            match item {
                ExternItem::Func { name, params, .. } => {
                    let sig = analysis
                        .functions
                        .get(name)
                        .unwrap_or_else(|| panic!("extern function '{name}' missing from analysis"));
                    let ret = c_type(&sig.return_ty);
                    let param_list = if params.is_empty() {
                        "void".to_string()
                    } else {
                        params
                            .iter()
                            .zip(sig.params.iter())
                            .map(|(p, ty)| format!("{} {}", c_type(ty), p.name))
                            .collect::<Vec<_>>()
                            .join(", ")
                    };
                    writeln!(out, "extern {ret} {name}({param_list});").unwrap();
                }
                ExternItem::Var { name, type_spec } | ExternItem::Let { name, type_spec } => {
                    let ty = ember_typeck::resolve_type_spec(type_spec, &mut var_registry);
                    writeln!(out, "extern {} {name};", c_type(&ty)).unwrap();
                }
            }
        }
    }
    writeln!(out).unwrap();
}

fn emit_function_prototypes(program: &Program, analysis: &Analysis, out: &mut String) {
    for stmt in &program.stmts {
        if let StmtKind::FuncDef(def) = &stmt.kind {
            write_prototype(def, analysis, out);
        }
    }
    writeln!(out).unwrap();
}

fn write_prototype(def: &FuncDef, analysis: &Analysis, out: &mut String) {
    let sig = analysis
        .functions
        .get(&def.name)
        .unwrap_or_else(|| panic!("function '{}' missing from analysis", def.name));
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
    writeln!(out, "{ret} {}({params});", def.name).unwrap();
}
