//! usm CLI — inspect user-script and user-style metadata.
//!
//! Subcommands:
//! - `parse <file> [--user-matches "<p> ..."] [--user-exclude-matches "<p> ..."]` — print the descriptor as JSON
//! - `expand <pattern>` — print the `.tld` expansion, one pattern per line
//! - `match <file> <url>... [--exclude <pattern>...] [--trace]` — does the source apply to a page?
//! - `check <file>` — parse and validate every pattern

use std::process;

use tracing_subscriber::EnvFilter;
use usm::{check_descriptor, normalize, try_parse, Evaluator, ScriptDescriptor};

/// Log filter variable. Defaults to `warn`.
const LOG_ENV: &str = "USM_LOG";

fn main() {
    setup_tracing();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        print_usage();
        process::exit(1);
    }

    let result = match args[1].as_str() {
        "parse" => cmd_parse(&args[2..]),
        "expand" => cmd_expand(&args[2..]),
        "match" => cmd_match(&args[2..]),
        "check" => cmd_check(&args[2..]),
        "--help" | "-h" | "help" => {
            print_usage();
            Ok(())
        }
        other => {
            eprintln!("error: unknown command \"{other}\"");
            print_usage();
            process::exit(1);
        }
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        process::exit(1);
    }
}

fn setup_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

// ═══════════════════════════════════════════════════════════════════════════════
// Commands
// ═══════════════════════════════════════════════════════════════════════════════

fn cmd_parse(args: &[String]) -> Result<(), String> {
    let opts = parse_options(args)?;
    let [path] = opts.positional.as_slice() else {
        return Err("parse requires exactly one source file".into());
    };

    let descriptor = load_source(path, &opts)?;
    let json = serde_json::to_string_pretty(&descriptor)
        .map_err(|e| format!("failed to serialize descriptor: {e}"))?;
    println!("{json}");
    Ok(())
}

#[allow(clippy::unnecessary_wraps)] // Uniform return type for all commands
fn cmd_expand(args: &[String]) -> Result<(), String> {
    let [pattern] = args else {
        return Err("expand requires exactly one pattern".into());
    };
    for p in normalize(pattern).into_vec() {
        println!("{p}");
    }
    Ok(())
}

fn cmd_match(args: &[String]) -> Result<(), String> {
    let opts = parse_options(args)?;
    let Some((path, urls)) = opts.positional.split_first() else {
        return Err("match requires a source file and at least one URL".into());
    };
    if urls.is_empty() {
        return Err("match requires at least one URL".into());
    }

    let descriptor = load_source(path, &opts)?;
    let evaluator = Evaluator::compile(&descriptor, opts.excludes.as_slice());

    if opts.trace {
        let trace = evaluator.evaluate_with_trace(urls);
        println!("{trace}");
        for step in &trace.steps {
            let mark = if step.matched { "fired" } else { "-" };
            println!("  {:<16} {mark}", step.step.as_str());
        }
    } else if evaluator.evaluate(urls) {
        println!("applies");
    } else {
        println!("skipped");
    }
    Ok(())
}

fn cmd_check(args: &[String]) -> Result<(), String> {
    let opts = parse_options(args)?;
    let [path] = opts.positional.as_slice() else {
        return Err("check requires exactly one source file".into());
    };

    let descriptor = load_source(path, &opts)?;
    if descriptor.name.is_empty() {
        eprintln!("warning: metadata block has no @name");
    }

    let errors = check_descriptor(&descriptor);
    if errors.is_empty() {
        println!("Source valid");
        return Ok(());
    }
    for e in &errors {
        eprintln!("  {e}");
    }
    Err(format!("{} invalid pattern(s)", errors.len()))
}

// ═══════════════════════════════════════════════════════════════════════════════
// Source loading
// ═══════════════════════════════════════════════════════════════════════════════

fn load_source(path: &str, opts: &Options) -> Result<ScriptDescriptor, String> {
    let text =
        std::fs::read_to_string(path).map_err(|e| format!("failed to read \"{path}\": {e}"))?;
    try_parse(&text, &opts.user_matches, &opts.user_exclude_matches)
        .map_err(|e| format!("\"{path}\": {e}"))
}

// ═══════════════════════════════════════════════════════════════════════════════
// Argument parsing
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Default, PartialEq)]
struct Options {
    positional: Vec<String>,
    user_matches: String,
    user_exclude_matches: String,
    excludes: Vec<String>,
    trace: bool,
}

fn parse_options(args: &[String]) -> Result<Options, String> {
    let mut opts = Options::default();
    let mut i = 0;

    let value = |i: usize, flag: &str| -> Result<String, String> {
        args.get(i)
            .cloned()
            .ok_or_else(|| format!("{flag} requires a value"))
    };

    while i < args.len() {
        match args[i].as_str() {
            "--user-matches" => {
                i += 1;
                opts.user_matches = value(i, "--user-matches")?;
            }
            "--user-exclude-matches" => {
                i += 1;
                opts.user_exclude_matches = value(i, "--user-exclude-matches")?;
            }
            "--exclude" => {
                i += 1;
                while i < args.len() && !args[i].starts_with("--") {
                    opts.excludes.push(args[i].clone());
                    i += 1;
                }
                continue;
            }
            "--trace" => opts.trace = true,
            flag if flag.starts_with("--") => {
                return Err(format!("unexpected argument \"{flag}\""));
            }
            positional => opts.positional.push(positional.to_owned()),
        }
        i += 1;
    }

    Ok(opts)
}

fn print_usage() {
    eprintln!(
        "Usage: usm <command> [options]

Commands:
  parse <file> [--user-matches \"<p> ...\"] [--user-exclude-matches \"<p> ...\"]
                                           Print the parsed descriptor as JSON
  expand <pattern>                         Print the .tld expansion of a match pattern
  match <file> <url>... [--exclude <p>...] [--trace]
                                           Print whether the source applies to the page
  check <file>                             Validate every pattern in the source
  help                                     Show this help

Environment:
  USM_LOG                                  Log filter (default: warn)"
    );
}
