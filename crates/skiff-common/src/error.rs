use std::io::Write;

use thiserror::Error;

use crate::types::{Span, Spanned};

pub type Result<T, E = ErrorS> = std::result::Result<T, E>;
pub type ErrorS = Spanned<Error>;

#[derive(Debug, Error, Eq, PartialEq)]
pub enum Error {
    #[error("Error: {0}")]
    Parse(ParseError),
    #[error("Error: {0}")]
    Resolve(ResolveError),
    #[error("RuntimeError: {0}")]
    Runtime(RuntimeError),
    #[error("Error: {0}")]
    Scan(ScanError),
}

macro_rules! impl_from_error {
    ($($variant:ident => $error:ty),+) => {$(
        impl From<$error> for Error {
            fn from(e: $error) -> Self {
                Error::$variant(e)
            }
        }
    )+};
}

impl_from_error!(Parse => ParseError, Resolve => ResolveError, Runtime => RuntimeError, Scan => ScanError);

#[derive(Debug, Error, Eq, PartialEq)]
pub enum ScanError {
    #[error("Unexpected character: {0}")]
    UnexpectedCharacter(String),
    #[error("Unterminated block comment")]
    UnterminatedComment,
    #[error("Unterminated string")]
    UnterminatedString,
}

#[derive(Debug, Error, Eq, PartialEq)]
pub enum ParseError {
    #[error("Expected expression")]
    ExpectedExpression,
    #[error("Expected {0}")]
    ExpectedToken(&'static str),
    #[error("Invalid assignment target")]
    InvalidAssignmentTarget,
    #[error("Can't have more than 255 arguments")]
    TooManyArgs,
    #[error("Can't have more than 255 parameters")]
    TooManyParams,
}

#[derive(Debug, Error, Eq, PartialEq)]
pub enum ResolveError {
    #[error("A variable with the same name already exists in this scope")]
    AlreadyDeclared,
    #[error("Can't use 'break' outside of a loop")]
    BreakOutsideLoop,
    #[error("Can't use 'continue' outside of a loop")]
    ContinueOutsideLoop,
    #[error("Can't read local variable in its own initializer")]
    ReadInInitializer,
    #[error("Can't return from top-level code")]
    ReturnOutsideFunction,
}

#[derive(Debug, Error, Eq, PartialEq)]
pub enum RuntimeError {
    #[error("Expected {exp_args} arguments but got {got_args}")]
    ArityMismatch { exp_args: usize, got_args: usize },
    #[error("Divide by zero")]
    DivideByZero,
    #[error("Operands must be two numbers or two strings")]
    InvalidOperands,
    #[error("Only instances have fields")]
    NoFields,
    #[error("Only instances have properties")]
    NoProperties,
    #[error("Operand must be a number")]
    NonNumericOperand,
    #[error("Can only call functions")]
    NotCallable,
    #[error("Redeclaration of {name:?}")]
    Redeclaration { name: String },
    #[error("Undefined property {name:?}")]
    UndefinedProperty { name: String },
    #[error("Undefined variable {name:?}")]
    UndefinedVariable { name: String },
    #[error("Uninitialized variable {name:?}")]
    UninitializedVariable { name: String },
    #[error("Unable to write to output")]
    WriteFailed,
}

/// Renders a diagnostic in the fixed single-line format, deriving the
/// 1-based line number from the error's span.
pub fn report_err(writer: &mut dyn Write, source: &str, (err, span): &ErrorS) {
    let offset = span.start.min(source.len());
    let line = source[..offset].matches('\n').count() + 1;
    let result = match err {
        Error::Parse(err) => match source.get(span.clone()) {
            Some(lexeme) if !lexeme.is_empty() => {
                writeln!(writer, "[Line {line}] Error at {lexeme}: {err}")
            }
            _ => writeln!(writer, "[Line {line}] Error at end: {err}"),
        },
        err => writeln!(writer, "[Line {line}] {err}"),
    };
    result.expect("failed to write diagnostic");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(source: &str, err: ErrorS) -> String {
        let mut buffer = Vec::new();
        report_err(&mut buffer, source, &err);
        String::from_utf8(buffer).unwrap()
    }

    #[test]
    fn report_derives_line_numbers() {
        let source = "var a;\nprint a;\n";
        let err = Error::Runtime(RuntimeError::UninitializedVariable { name: "a".to_string() });
        assert_eq!(
            render(source, (err, 13..14)),
            "[Line 2] RuntimeError: Uninitialized variable \"a\"\n"
        );
    }

    #[test]
    fn report_quotes_parse_lexeme() {
        let source = "print 1\nprint 2;\n";
        let err = Error::Parse(ParseError::ExpectedToken("';' after value"));
        assert_eq!(
            render(source, (err, 8..13)),
            "[Line 2] Error at print: Expected ';' after value\n"
        );
    }

    #[test]
    fn report_marks_end_of_input() {
        let source = "{ print 1;";
        let err = Error::Parse(ParseError::ExpectedToken("'}' after block"));
        assert_eq!(render(source, (err, 10..10)), "[Line 1] Error at end: Expected '}' after block\n");
    }
}
