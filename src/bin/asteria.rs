use std::{path::PathBuf, process::ExitCode};

use clap::{Parser, Subcommand};

use asteria::{AsteriaError, Interpreter, Repl};

#[derive(Parser)]
#[command(author, version, about = "Asteria language interpreter")]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run an Asteria script file; extra arguments are passed to the script
    Run {
        script: PathBuf,
        args: Vec<String>,
    },
    /// Start an interactive REPL session
    Repl,
    /// Evaluate a snippet of Asteria code
    Eval { source: String },
}

fn main() -> ExitCode {
    let args = Args::parse();
    let result = match args.command.unwrap_or(Command::Repl) {
        Command::Run { script, args } => run_script(script, args),
        Command::Repl => {
            let mut repl = Repl::new();
            repl.run()
        }
        Command::Eval { source } => {
            let interpreter = Interpreter::new();
            interpreter.eval_string(&source).map(|value| {
                println!("{value}");
            })
        }
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}

fn run_script(path: PathBuf, args: Vec<String>) -> Result<(), AsteriaError> {
    let interpreter = Interpreter::new();
    let program = interpreter.load_file(&path)?;
    let args = args.into_iter().map(asteria::Value::String).collect();
    let value = interpreter.execute(&program, args)?;
    if !matches!(value, asteria::Value::Null) {
        println!("{value}");
    }
    Ok(())
}
