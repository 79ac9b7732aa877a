use std::fs;
use std::io;

use anyhow::{bail, Context, Result};
use clap::Parser;

use skiff_common::error::report_err;
use skiff_interpreter::Interpreter;

#[derive(Debug, Parser)]
#[command(about, author, disable_help_subcommand = true, version)]
pub struct Cmd {
    /// Script to execute; starts the interactive shell when omitted.
    path: Option<String>,
}

impl Cmd {
    pub fn run(&self) -> Result<()> {
        match &self.path {
            Some(path) => run_file(path),
            None => crate::repl::run(),
        }
    }
}

fn run_file(path: &str) -> Result<()> {
    let source =
        fs::read_to_string(path).with_context(|| format!("could not read file: {path}"))?;
    let mut stdout = io::stdout().lock();
    let mut interpreter = Interpreter::new(&mut stdout);
    let errors = interpreter.run(&source);
    if !errors.is_empty() {
        let mut stderr = io::stderr().lock();
        for err in &errors {
            report_err(&mut stderr, &source, err);
        }
        bail!("program exited with errors");
    }
    Ok(())
}
