// ABOUTME: Command-line front-end: argument parsing, file/REPL mode, diagnostics setup

mod config;

use clap::Parser;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use schemeful::env::{self, Env};
use schemeful::expand::process_top;
use schemeful::reader::{read_one, Reader, StrSource};
use std::path::PathBuf;
use std::process::ExitCode;
use std::rc::Rc;

/// A tree-walking Scheme-flavored Lisp interpreter.
#[derive(Parser, Debug)]
#[command(name = "schemeful")]
#[command(version = config::VERSION)]
#[command(about = "A tree-walking Scheme-flavored Lisp interpreter")]
struct Cli {
    /// Source file to process; omitted starts the REPL directly
    file: Option<PathBuf>,

    /// Raise diagnostic verbosity to include per-form traces
    #[arg(long)]
    trace: bool,

    /// After processing `file`, drop into the REPL with the accumulated environments
    #[arg(long)]
    repl: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.trace);

    let mut env: Env = Vec::new();
    let mut menv: Env = Vec::new();

    if let Some(path) = &cli.file {
        if run_file(path, &mut env, &mut menv).is_err() {
            return ExitCode::FAILURE;
        }
        if !cli.repl {
            return ExitCode::SUCCESS;
        }
    }

    run_repl(&mut env, &mut menv);
    ExitCode::SUCCESS
}

fn init_logging(trace: bool) {
    let default_level = if trace { "trace" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp(None)
        .init();
}

/// Processes each top-level form in `path` under `env`/`menv`. Returns `Err`
/// only for the hard failure of not being able to open the file; individual
/// form failures are soft — logged and skipped, per the top-level driver's
/// error policy.
fn run_file(path: &PathBuf, env: &mut Env, menv: &mut Env) -> Result<(), ()> {
    let contents = std::fs::read_to_string(path).map_err(|e| {
        eprintln!("Cannot open {}: {e}", path.display());
    })?;

    let mut reader = Reader::new(StrSource::new(&contents));
    loop {
        match reader.read() {
            Ok(None) => break,
            Ok(Some(form)) => {
                process_top(&form, env, menv);
            }
            Err(e) => {
                log::error!("Failed to read s-expression: {e}");
                break;
            }
        }
    }
    Ok(())
}

fn run_repl(env: &mut Env, menv: &mut Env) {
    println!("{}", config::WELCOME_MESSAGE);
    println!("{}", config::WELCOME_SUBTITLE);

    let mut rl = match DefaultEditor::new() {
        Ok(rl) => rl,
        Err(e) => {
            eprintln!("Failed to initialize REPL: {e}");
            return;
        }
    };

    loop {
        match rl.readline("> ") {
            Ok(line) => {
                if line.trim().is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(line.as_str());

                match read_one(&line) {
                    Ok(None) => continue,
                    Ok(Some(form)) => {
                        let result = process_top(&form, env, menv);
                        println!("{result}");
                        env::define(env, Rc::from("?"), result);
                    }
                    Err(e) => log::error!("Failed to read s-expression: {e}"),
                }
            }
            Err(ReadlineError::Interrupted) => continue,
            Err(ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("{e}");
                break;
            }
        }
    }
}
