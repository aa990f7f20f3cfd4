//! Command-line parsing.
//!
//! Grounded on `cmd/errmark.c`'s option loop (leading `+` in its
//! `getopt_long` short-option string, so parsing stops at the first
//! non-option argument and everything after is the child's own argv) and
//! on the teacher's `cli.rs` for the `clap::{App, Arg}` builder style.
//! Unlike the teacher, option parsing here is driven by hand over the raw
//! argv rather than through `clap::App::get_matches`, because two pieces
//! of original behavior (stopping at the first positional and an
//! error-budget of more than 10 bad options) don't fit `clap`'s own
//! parse-or-bail model; `clap` is still used, further down, to build the
//! the `App` that renders `--help`'s usage text.

use crate::color;
use crate::marks::MarkerTable;
use clap::{App, Arg};
use std::ffi::OsString;

const VERSION: &str = env!("CARGO_PKG_VERSION");

pub struct Cli {
    pub verbose: bool,
    pub debug: bool,
    pub marks: MarkerTable,
    pub copy_path: Option<String>,
    pub argv: Vec<OsString>,
    /// False only when `--no-nullify` is given. Undocumented escape
    /// hatch (spec.md §9) for debugging the tracer itself: with it, the
    /// kernel performs the real write alongside the tracer's own, instead
    /// of the tracer suppressing it.
    pub nullify: bool,
}

fn build_app() -> App<'static, 'static> {
    App::new("errmark")
        .version(VERSION)
        .about("Runs a program, marking its stderr bytes in the merged output.")
        .arg(
            Arg::with_name("verbose")
                .short("v")
                .long("verbose")
                .help("Enable verbose diagnostics on stderr"),
        )
        .arg(
            Arg::with_name("debug")
                .short("d")
                .long("debug")
                .help("Enable debug diagnostics (implies --verbose)"),
        )
        .arg(
            Arg::with_name("mark")
                .short("m")
                .long("mark")
                .value_name("SPEC")
                .takes_value(true)
                .multiple(true)
                .number_of_values(1)
                .help("Install a fd:START:END marker (fd is 1 or 2)"),
        )
        .arg(
            Arg::with_name("color")
                .long("color")
                .value_name("NAME")
                .takes_value(true)
                .help("Shorthand: install a named ANSI color as the fd-2 marker"),
        )
        .arg(
            Arg::with_name("copy")
                .short("c")
                .long("copy")
                .value_name("FILE")
                .takes_value(true)
                .help("Mirror all stderr bytes, unmarked, into FILE"),
        )
        .arg(
            Arg::with_name("no-nullify")
                .long("no-nullify")
                .help("Debug escape hatch: let the kernel perform the real write too"),
        )
}

/// True for any token that `build_app`'s `App` recognises as an option
/// (by itself, for flags, or as a prefix, for `--long=value`), used only
/// to decide where option parsing ends and the child's own argv begins.
fn looks_like_known_option(token: &str) -> bool {
    const KNOWN: &[&str] = &[
        "-h", "--help", "-?", "-V", "--version", "-v", "--verbose", "-d", "--debug", "-m",
        "--mark", "-c", "--copy", "--color", "--no-nullify",
    ];
    let bare = token.split('=').next().unwrap_or(token);
    KNOWN.contains(&bare)
}

/// Parses `raw_args` (everything after `argv[0]`). Never returns on
/// `--help`/`--version`/a fatal parse error — those paths print to the
/// appropriate stream and call `std::process::exit`, matching the
/// original's inline `exit()` calls from its option handlers.
pub fn parse(program_name: &str, raw_args: Vec<OsString>) -> Cli {
    let mut err_count = 0usize;
    let mut split_at = raw_args.len();

    // A manual index, not `.enumerate()`: a separate-value option (e.g.
    // `--mark '2:<E>:</E>:'`) must advance the scan *past* its value
    // token too, so that value is never re-examined as a candidate
    // program name. `.enumerate()` always hands back `i + 1` on the next
    // iteration regardless of what `split_at` was set to, which silently
    // undoes any attempt to skip ahead by more than one token.
    let mut i = 0usize;
    while i < raw_args.len() {
        let arg = &raw_args[i];
        let token = match arg.to_str() {
            Some(t) => t,
            None => {
                split_at = i;
                break;
            }
        };

        if token == "-?" || token == "-h" || token == "--help" {
            print!("{}", app_help_text());
            std::process::exit(0);
        }
        if token == "-V" || token == "--version" {
            println!("{} {}", program_name, VERSION);
            std::process::exit(0);
        }
        if !token.starts_with('-') || token == "-" {
            split_at = i;
            break;
        }
        if !looks_like_known_option(token) {
            eprintln!("{}: unknown option, '{}'", program_name, token);
            err_count += 1;
            if err_count > 10 {
                eprintln!("{}: Too many option errors.", program_name);
                break;
            }
            i += 1;
            continue;
        }
        // values for -m/--mark, -c/--copy, --color are consumed below by
        // clap; here we only need to recognise that the token is valid so
        // the scan can continue past it and, if it takes a value not
        // joined with '=', skip that value token too so it is never
        // mistaken for the traced program's name.
        i += if needs_separate_value(token) { 2 } else { 1 };
        split_at = i;
    }

    if err_count > 0 {
        eprintln!("usage: {} [ <options> ] <program> [ <args...> ]", program_name);
        std::process::exit(1);
    }

    if split_at > raw_args.len() {
        eprintln!("{}: option requires an argument.", program_name);
        std::process::exit(2);
    }

    let option_args = &raw_args[..split_at];
    let command_args = &raw_args[split_at..];

    if command_args.is_empty() {
        eprintln!("{}: Must supply at least a command name.", program_name);
        eprintln!("usage: {} [ <options> ] <program> [ <args...> ]", program_name);
        std::process::exit(2);
    }

    // Only the recognised option tokens are handed to clap: every token in
    // `option_args` was already confirmed against `looks_like_known_option`
    // above, so clap needs no positional `Arg` to accept them, and the
    // traced program's own argv never has to pass through `clap` at all.
    let mut full = vec![OsString::from(program_name)];
    full.extend(option_args.iter().cloned());

    let matches = build_app().get_matches_from(full);

    let debug = matches.is_present("debug");
    let verbose = matches.is_present("verbose") || debug;

    let mut marks = MarkerTable::new();

    if let Some(specs) = matches.values_of("mark") {
        for spec in specs {
            if let Err(err) = marks.parse_and_set(spec) {
                eprintln!("{}: --mark='{}': {}", program_name, spec, err);
                std::process::exit(2);
            }
            if verbose {
                eprintln!("{}: --mark='{}'", program_name, spec);
            }
        }
    }

    if let Some(name) = matches.value_of("color") {
        match color::lookup(name) {
            Some((start, end)) => {
                marks.set(2, start, end).expect("fd 2 is always valid");
            }
            None => {
                eprintln!("{}: Unknown color, '{}'.", program_name, name);
                eprintln!("Known color names are:");
                eprintln!("    {}", color::known_names());
                std::process::exit(2);
            }
        }
    }

    let copy_path = matches.value_of("copy").map(str::to_string);
    let nullify = !matches.is_present("no-nullify");

    let mut argv: Vec<OsString> = vec![command_args[0].clone()];
    argv.extend(command_args[1..].iter().cloned());

    if verbose {
        eprintln!("{}: running: {:?}", program_name, argv);
    }

    Cli {
        verbose,
        debug,
        marks,
        copy_path,
        argv,
        nullify,
    }
}

fn needs_separate_value(token: &str) -> bool {
    let bare = token.split('=').next().unwrap_or(token);
    matches!(bare, "-m" | "--mark" | "-c" | "--copy" | "--color") && !token.contains('=')
}

fn app_help_text() -> String {
    let mut buf = Vec::new();
    build_app().write_long_help(&mut buf).ok();
    String::from_utf8_lossy(&buf).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognises_every_documented_option() {
        for opt in [
            "-h", "--help", "-?", "-V", "--version", "-v", "--verbose", "-d", "--debug", "-m",
            "--mark", "-c", "--copy", "--color", "--no-nullify",
        ] {
            assert!(looks_like_known_option(opt), "{} should be known", opt);
        }
        assert!(!looks_like_known_option("--bogus"));
    }

    #[test]
    fn long_option_with_equals_is_recognised() {
        assert!(looks_like_known_option("--mark=1:a:b"));
        assert!(needs_separate_value("--mark"));
        assert!(!needs_separate_value("--mark=1:a:b"));
    }

    /// Regression test: a separate-value option's value token (here
    /// `--mark`'s `2:<E>:</E>:`) must not be mistaken for the program to
    /// run. This is spec.md §8 scenario 1 exactly as invoked on a shell
    /// command line.
    #[test]
    fn separate_value_option_is_skipped_when_locating_the_program_boundary() {
        let raw_args: Vec<OsString> = vec!["--mark", "2:<E>:</E>:", "sh", "-c", "echo hi"]
            .into_iter()
            .map(OsString::from)
            .collect();

        let cli = parse("errmark", raw_args);

        assert_eq!(
            cli.argv,
            vec![
                OsString::from("sh"),
                OsString::from("-c"),
                OsString::from("echo hi"),
            ]
        );
        let marker = cli.marks.get(2).unwrap();
        assert_eq!(marker.start.as_deref(), Some("<E>"));
        assert_eq!(marker.end.as_deref(), Some("</E>"));
    }

    /// Same regression, for `--color` and `--copy`, both of which also
    /// take a separate value.
    #[test]
    fn multiple_separate_value_options_are_all_skipped() {
        let raw_args: Vec<OsString> = vec![
            "--color", "red", "--copy", "err.log", "sh", "-c", "echo hi",
        ]
        .into_iter()
        .map(OsString::from)
        .collect();

        let cli = parse("errmark", raw_args);

        assert_eq!(
            cli.argv,
            vec![
                OsString::from("sh"),
                OsString::from("-c"),
                OsString::from("echo hi"),
            ]
        );
        assert_eq!(cli.copy_path.as_deref(), Some("err.log"));
    }
}
