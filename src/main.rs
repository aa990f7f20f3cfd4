//! Entry point: parses arguments, wires the parsed [`cli::Cli`] into a
//! [`supervisor::Invocation`], and runs it.
//!
//! Grounded on `cmd/errmark.c`'s `main` for the overall shape (parse, then
//! hand off to the run loop, then `exit` with the child's status) and on
//! the teacher's `main.rs` for splitting ambient logging (`env_logger`,
//! independent of the tool's own `-v`/`-d` diagnostics) from argument
//! parsing.

mod cli;
mod color;
mod diagnostics;
mod errors;
mod marks;
mod ptrace;
mod register;
mod supervisor;
mod switch;

use std::env;
use std::ffi::OsString;

fn main() {
    env_logger::init();

    let mut args = env::args_os();
    let program_name = args
        .next()
        .map(|a| a.to_string_lossy().into_owned())
        .unwrap_or_else(|| "errmark".to_string());
    let raw_args: Vec<OsString> = args.collect();

    let parsed = cli::parse(&program_name, raw_args);

    let invocation = supervisor::Invocation {
        argv: parsed.argv,
        verbose: parsed.verbose,
        debug: parsed.debug,
        // The original tool always sleeps one second after a traced write
        // when running with --debug; there is no flag to disable it.
        slow: true,
        nullify: parsed.nullify,
        copy_path: parsed.copy_path,
        marks: parsed.marks,
    };

    match supervisor::run(invocation) {
        Ok(code) => {
            log::debug!("child exited with status {}", code);
            std::process::exit(code);
        }
        Err(err) => {
            log::error!("failed to run child: {}", err);
            eprintln!("{}: {}", program_name, err);
            std::process::exit(2);
        }
    }
}
