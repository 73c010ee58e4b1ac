//! devkit CLI entry point.
//!
//! Usage:
//!   devkit                     # Interactive REPL
//!   devkit -c <snippet>        # Evaluate a snippet and exit
//!   devkit -c '!<command>'     # Run a shell command and exit

use std::env;
use std::process::ExitCode;

use anyhow::{Context, Result};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn main() -> ExitCode {
    // Initialize tracing (respects RUST_LOG env var)
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    match run() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:?}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<ExitCode> {
    let args: Vec<String> = env::args().collect();

    match args.get(1).map(|s| s.as_str()) {
        None => {
            devkit_repl::run()?;
            Ok(ExitCode::SUCCESS)
        }

        Some("--help" | "-h") => {
            print_help();
            Ok(ExitCode::SUCCESS)
        }

        Some("--version" | "-V") => {
            println!("devkit {}", env!("CARGO_PKG_VERSION"));
            Ok(ExitCode::SUCCESS)
        }

        Some("-c") => {
            let snippet = args.get(2).context("-c requires a snippet argument")?;
            run_snippet(snippet)
        }

        Some(unknown) => {
            eprintln!("Unknown option: {unknown}");
            eprintln!("Run 'devkit --help' for usage.");
            Ok(ExitCode::FAILURE)
        }
    }
}

fn print_help() {
    println!(
        r#"devkit v{}

Usage:
  devkit                       Interactive REPL
  devkit -c <snippet>          Evaluate a snippet and exit
  devkit -c '!<command>'       Run a shell command and exit

Options:
  -c <snippet>                 Evaluate and exit
  -h, --help                   Show this help
  -V, --version                Show version

Environment:
  DEV_CWD, DEV_RETAIN, DEV_OWNERS, DEV_VIRTUAL_VARS, ...
                               Override defaults (see the README)
  RUST_LOG                     Tracing filter (e.g. devkit_kernel=debug)

Examples:
  devkit                       # Start the interactive REPL
  devkit -c 'print(6 * 7)'     # Evaluate a snippet
  devkit -c '!uname -a'        # Run a shell command
"#,
        env!("CARGO_PKG_VERSION")
    );
}

/// Evaluate one snippet (or shell escape) and exit.
fn run_snippet(snippet: &str) -> Result<ExitCode> {
    let mut repl = devkit_repl::Repl::new()?;
    if let Some(output) = repl.process_line(snippet)? {
        println!("{output}");
    }
    Ok(ExitCode::SUCCESS)
}
