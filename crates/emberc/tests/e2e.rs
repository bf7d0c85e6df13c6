//! End-to-end tests for the `emberc` binary: each writes an Ember source
//! file to a temp directory, invokes the compiled driver, and asserts on
//! exit codes and generated output.

use std::path::Path;
use std::process::Command;

fn emberc() -> &'static str {
    env!("CARGO_BIN_EXE_emberc")
}

fn write_source(dir: &Path, name: &str, contents: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, contents).expect("failed to write source file");
    path
}

#[test]
fn check_accepts_a_well_typed_program() {
    let dir = tempfile::tempdir().unwrap();
    let src = write_source(
        dir.path(),
        "main.ember",
        "func f(n: int): int { if n == 0 { 1 } else { n * f(n - 1) } } print(f(5));",
    );

    let output = Command::new(emberc()).arg(&src).arg("--check").output().expect("failed to run emberc");

    assert!(
        output.status.success(),
        "expected --check to succeed, stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
}

#[test]
fn check_rejects_an_undefined_name() {
    let dir = tempfile::tempdir().unwrap();
    let src = write_source(dir.path(), "main.ember", "print(missing);");

    let output = Command::new(emberc()).arg(&src).arg("--check").output().expect("failed to run emberc");

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("undefined name"), "stderr was: {stderr}");
}

#[test]
fn check_rejects_a_parse_error() {
    let dir = tempfile::tempdir().unwrap();
    let src = write_source(dir.path(), "main.ember", "func f(n: int): int {");

    let output = Command::new(emberc()).arg(&src).arg("--check").output().expect("failed to run emberc");

    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn ast_dump_prints_parsed_program_and_exits_zero() {
    let dir = tempfile::tempdir().unwrap();
    let src = write_source(dir.path(), "main.ember", "let x = 1;");

    let output = Command::new(emberc()).arg(&src).arg("--ast").output().expect("failed to run emberc");

    assert!(output.status.success());
    assert!(!output.stdout.is_empty());
}

#[test]
fn compile_writes_header_and_body_with_guard_named_after_the_base() {
    let dir = tempfile::tempdir().unwrap();
    let src = write_source(dir.path(), "greet.ember", "print(\"hi\");");
    let base = dir.path().join("greet");

    let output = Command::new(emberc())
        .arg(&src)
        .arg("-o")
        .arg(&base)
        .output()
        .expect("failed to run emberc");

    assert!(
        output.status.success(),
        "compile failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let header = std::fs::read_to_string(dir.path().join("greet.h")).expect("missing greet.h");
    assert!(header.contains("#ifndef GREET_H"));
    assert!(header.contains("ember_runtime.h"));

    let body = std::fs::read_to_string(dir.path().join("greet.c")).expect("missing greet.c");
    assert!(body.contains("#include \"greet.h\""));
    assert!(body.contains("int main(void)"));

    assert!(dir.path().join("ember_runtime.h").exists());
}

#[test]
fn emit_runtime_copies_the_header_without_compiling_anything() {
    let dir = tempfile::tempdir().unwrap();

    let output = Command::new(emberc())
        .arg("--emit-runtime")
        .arg(dir.path())
        .output()
        .expect("failed to run emberc");

    assert!(output.status.success());
    assert!(dir.path().join("ember_runtime.h").exists());
}

#[test]
fn compile_and_run_a_recursive_function() {
    let dir = tempfile::tempdir().unwrap();
    let src = write_source(
        dir.path(),
        "fact.ember",
        "func f(n: int): int { if n == 0 { 1 } else { n * f(n - 1) } } print(f(5));",
    );
    let base = dir.path().join("fact");

    let compile = Command::new(emberc())
        .arg(&src)
        .arg("-o")
        .arg(&base)
        .arg("-c")
        .output()
        .expect("failed to run emberc");

    assert!(
        compile.status.success(),
        "compile failed: {}",
        String::from_utf8_lossy(&compile.stderr)
    );

    let run = Command::new(&base).output().expect("failed to run compiled binary");
    assert!(run.status.success());
    assert_eq!(String::from_utf8_lossy(&run.stdout).trim(), "120");
}

#[test]
fn compile_and_run_array_index_compound_assign_and_inc_dec() {
    let dir = tempfile::tempdir().unwrap();
    let src = write_source(
        dir.path(),
        "arr.ember",
        "var a = [1, 2, 3]; a[0] += 10; var old = a[1]++; print(a[0]); print(old); print(a[1]);",
    );
    let base = dir.path().join("arr");

    let compile = Command::new(emberc())
        .arg(&src)
        .arg("-o")
        .arg(&base)
        .arg("-c")
        .output()
        .expect("failed to run emberc");

    assert!(
        compile.status.success(),
        "compile failed: {}",
        String::from_utf8_lossy(&compile.stderr)
    );

    let run = Command::new(&base).output().expect("failed to run compiled binary");
    assert!(run.status.success());
    assert_eq!(String::from_utf8_lossy(&run.stdout).trim(), "11\n2\n3");
}
