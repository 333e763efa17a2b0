use rustyline::{error::ReadlineError, DefaultEditor};

use crate::{
    diagnostics::{AsteriaError, Result},
    runtime::Interpreter,
};

pub struct Repl {
    interpreter: Interpreter,
}

impl Default for Repl {
    fn default() -> Self {
        Self::new()
    }
}

impl Repl {
    pub fn new() -> Self {
        Self {
            interpreter: Interpreter::new(),
        }
    }

    pub fn run(&mut self) -> Result<()> {
        let mut editor = DefaultEditor::new()
            .map_err(|err| AsteriaError::from(std::io::Error::other(err)))?;
        loop {
            match editor.readline(">> ") {
                Ok(line) => {
                    let trimmed = line.trim();
                    if trimmed == ":quit" || trimmed == ":exit" {
                        break;
                    }
                    if trimmed.is_empty() {
                        continue;
                    }
                    editor.add_history_entry(trimmed).ok();
                    match self.interpreter.eval_string(trimmed) {
                        Ok(value) => println!("{value}"),
                        Err(AsteriaError::Parser(err)) => eprintln!("{err}"),
                        Err(AsteriaError::Runtime(exception)) => eprintln!("{exception}"),
                        Err(other) => eprintln!("error: {other}"),
                    }
                }
                Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
                Err(err) => {
                    return Err(AsteriaError::from(std::io::Error::other(err)));
                }
            }
        }
        Ok(())
    }
}
