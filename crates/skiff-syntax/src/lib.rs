pub mod ast;
pub mod lexer;
pub mod parser;

use skiff_common::error::ErrorS;

use crate::ast::Program;
use crate::parser::Parser;

/// Runs the front half of the pipeline: lexing, then parsing. Lexical
/// errors abort before the parser runs; parse errors abort before the
/// program is handed back.
pub fn parse(source: &str) -> Result<Program, Vec<ErrorS>> {
    let mut tokens = Vec::new();
    let mut errors = Vec::new();
    for item in lexer::Lexer::new(source) {
        match item {
            Ok(token) => tokens.push(token),
            Err(err) => errors.push(err),
        }
    }
    if !errors.is_empty() {
        return Err(errors);
    }
    Parser::new(tokens, source.len()).parse()
}
