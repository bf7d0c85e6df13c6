//! Command-line surface for `emberc`.
//!
//! One positional input (stdin when omitted) and the flags described in
//! the external-interfaces section of the design notes.

use std::path::PathBuf;

use clap::Parser;

#[derive(Parser)]
#[command(name = "emberc", version, about = "Translates Ember source to portable ARC-managed C")]
pub struct Cli {
    /// Source file to compile. Reads from standard input when omitted.
    pub input: Option<PathBuf>,

    /// Print the parsed AST and exit without running analysis.
    #[arg(long)]
    pub ast: bool,

    /// Run semantic analysis and report diagnostics without generating C.
    #[arg(long)]
    pub check: bool,

    /// Invoke the system C compiler on the generated source to produce a
    /// native binary.
    #[arg(short = 'c', long = "compile")]
    pub compile: bool,

    /// Output base name; `<base>.c` and `<base>.h` are written alongside
    /// it. Defaults to the input file's stem, or `a` for stdin input.
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,

    /// Copy the runtime header into `<dir>` and exit without compiling
    /// anything else.
    #[arg(long = "emit-runtime", value_name = "DIR")]
    pub emit_runtime: Option<PathBuf>,

    /// Disable ariadne's colored diagnostic rendering.
    #[arg(long = "no-color")]
    pub no_color: bool,

    /// Trace each pipeline stage (parse, analyze, codegen, compile) on
    /// standard error.
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// Colored rendering is off when `--no-color` is passed or when
    /// `NO_COLOR` is set in the environment, per convention.
    pub fn color_enabled(&self) -> bool {
        !self.no_color && std::env::var_os("NO_COLOR").is_none()
    }
}
