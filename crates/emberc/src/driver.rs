//! The `parse -> analyze -> codegen -> compile` pipeline invoked by `main.rs`.

use std::io::Read as _;
use std::path::{Path, PathBuf};
use std::process::Command;

use ember_common::LineIndex;

/// Everything the driver needs, already resolved from CLI flags.
pub struct Options {
    pub input: Option<PathBuf>,
    pub ast: bool,
    pub check: bool,
    pub compile: bool,
    pub output: Option<PathBuf>,
    pub color: bool,
}

/// Reads `emit-runtime`'s target directory and writes the vendored header
/// there. A standalone action; it never touches the rest of the pipeline.
pub fn emit_runtime(dir: &Path) -> Result<(), String> {
    let path = ember_runtime::write_to(dir).map_err(|e| format!("failed to write runtime header: {e}"))?;
    log::info!("wrote {}", path.display());
    Ok(())
}

/// Runs the full pipeline. `Ok(())` on success; `Err(message)` carries a
/// one-line summary already preceded by per-diagnostic output on stderr.
pub fn run(opts: &Options) -> Result<(), String> {
    let (source, file_name) = read_input(opts.input.as_deref())?;
    log::debug!("read {} bytes from {}", source.len(), file_name);

    log::debug!("parsing");
    let (program, parse_errors) = ember_parser::parse(&source);
    if !parse_errors.is_empty() {
        report_parse_errors(&parse_errors, &source, &file_name, opts.color);
        return Err("parsing failed".to_string());
    }

    if opts.ast {
        println!("{program:#?}");
        return Ok(());
    }

    log::debug!("analyzing");
    let (analysis, semantic_errors) = ember_typeck::analyze(&program);
    if !semantic_errors.is_empty() {
        report_semantic_errors(&semantic_errors, &file_name);
        return Err("semantic analysis failed".to_string());
    }

    if opts.check {
        return Ok(());
    }

    let base = resolve_output_base(opts.output.as_deref(), opts.input.as_deref());
    let base_str = base.to_string_lossy().into_owned();
    let base_name = base
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| base_str.clone());

    log::debug!("generating code (base: {base_str})");
    let source_name = opts.input.as_ref().map(|p| p.to_string_lossy().into_owned());
    let unit = ember_codegen::generate(&program, &analysis, &base_name, source_name.as_deref());

    let dir = base.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or_else(|| Path::new("."));
    let header_path = dir.join(format!("{base_name}.h"));
    let body_path = dir.join(format!("{base_name}.c"));
    std::fs::write(&header_path, &unit.header).map_err(|e| format!("failed to write '{}': {e}", header_path.display()))?;
    std::fs::write(&body_path, &unit.body).map_err(|e| format!("failed to write '{}': {e}", body_path.display()))?;
    ember_runtime::write_to(dir).map_err(|e| format!("failed to write runtime header: {e}"))?;

    if opts.compile {
        log::debug!("invoking system C compiler");
        compile_native(&body_path, &base)?;
    }

    Ok(())
}

fn read_input(input: Option<&Path>) -> Result<(String, String), String> {
    match input {
        Some(path) => {
            let source = std::fs::read_to_string(path).map_err(|e| format!("failed to read '{}': {e}", path.display()))?;
            Ok((source, path.to_string_lossy().into_owned()))
        }
        None => {
            let mut source = String::new();
            std::io::stdin()
                .read_to_string(&mut source)
                .map_err(|e| format!("failed to read standard input: {e}"))?;
            Ok((source, "<stdin>".to_string()))
        }
    }
}

fn resolve_output_base(output: Option<&Path>, input: Option<&Path>) -> PathBuf {
    if let Some(out) = output {
        return out.to_path_buf();
    }
    match input {
        Some(path) => {
            let stem = path.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_else(|| "a".to_string());
            path.with_file_name(stem)
        }
        None => PathBuf::from("a"),
    }
}

fn report_parse_errors(errors: &[ember_parser::ParseError], source: &str, file: &str, color: bool) {
    let index = LineIndex::new(source);
    for err in errors {
        let diag = to_common_diag(err);
        if color {
            eprint!("{}", diag.render_pretty(file, source));
        } else {
            eprintln!("{}", diag.render_plain(file, &index));
        }
    }
}

fn to_common_diag(err: &ember_parser::ParseError) -> ember_common::Diagnostic {
    let diag = ember_common::Diagnostic::error(err.message.clone(), err.span);
    match &err.related {
        Some((msg, span)) => diag.with_related(msg.clone(), *span),
        None => diag,
    }
}

fn report_semantic_errors(errors: &[ember_typeck::SemanticError], file: &str) {
    for err in errors {
        eprintln!("{file}: error: {err}");
    }
}

fn compile_native(body_path: &Path, output: &Path) -> Result<(), String> {
    let cc = std::env::var("CC").unwrap_or_else(|_| "cc".to_string());
    let dir = body_path.parent().unwrap_or_else(|| Path::new("."));

    let mut cmd = Command::new(&cc);
    cmd.arg(body_path).arg("-I").arg(dir).arg("-o").arg(output);

    let result = cmd
        .output()
        .map_err(|e| format!("failed to invoke C compiler ('{cc}'): {e}"))?;

    if !result.status.success() {
        let stderr = String::from_utf8_lossy(&result.stderr);
        return Err(format!("C compilation failed:\n{stderr}"));
    }
    Ok(())
}
