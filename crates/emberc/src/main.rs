//! `emberc`: translates Ember source to portable C, optionally compiling
//! it to a native binary via the system C compiler.

mod cli;
mod driver;

use std::process;

use clap::Parser as _;

fn main() {
    let cli = cli::Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    if let Some(dir) = &cli.emit_runtime {
        if let Err(e) = driver::emit_runtime(dir) {
            eprintln!("error: {e}");
            process::exit(1);
        }
        return;
    }

    let opts = driver::Options {
        input: cli.input.clone(),
        ast: cli.ast,
        check: cli.check,
        compile: cli.compile,
        output: cli.output.clone(),
        color: cli.color_enabled(),
    };

    if let Err(e) = driver::run(&opts) {
        eprintln!("error: {e}");
        process::exit(1);
    }
}
