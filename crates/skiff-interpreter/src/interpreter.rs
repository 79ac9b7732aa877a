use crate::env::Env;
use crate::object::{Class, Function, Native, Object};

use skiff_common::error::{Error, ErrorS, Result, RuntimeError};
use skiff_common::types::Span;
use skiff_syntax::ast::{Expr, ExprLiteral, ExprS, OpInfix, OpPrefix, Program, Stmt, StmtS, Var};

use std::io::Write;

/// The outcome of executing a statement: either control falls through, or
/// a `break`/`continue`/`return` is unwinding toward the construct that
/// absorbs it. Signals travel alongside the error channel, never in it,
/// so they can never surface as user-visible diagnostics.
#[derive(Debug)]
pub enum Exec {
    Normal,
    Break,
    Continue,
    Return(Object),
}

pub struct Interpreter<'stdout> {
    globals: Env,
    stdout: &'stdout mut dyn Write,
}

impl<'stdout> Interpreter<'stdout> {
    pub fn new(stdout: &'stdout mut dyn Write) -> Self {
        let mut globals = Env::default();
        globals
            .define("clock", Some(Object::Native(Native::Clock)))
            .unwrap_or_else(|()| unreachable!("\"clock\" redefined in a fresh global frame"));
        Self { globals, stdout }
    }

    /// Runs a whole program through the pipeline. Each stage's errors
    /// abort before the next stage; the global frame is only touched once
    /// evaluation actually starts, so a failed line leaves it intact.
    pub fn run(&mut self, source: &str) -> Vec<ErrorS> {
        let mut program = match skiff_syntax::parse(source) {
            Ok(program) => program,
            Err(errors) => return errors,
        };
        let errors = crate::resolve(&mut program);
        if !errors.is_empty() {
            return errors;
        }
        if let Err(err) = self.run_program(&program) {
            return vec![err];
        }
        Vec::new()
    }

    fn run_program(&mut self, program: &Program) -> Result<()> {
        let env = &mut self.globals.clone();
        for stmt_s in &program.stmts {
            match self.run_stmt(env, stmt_s)? {
                Exec::Normal => {}
                _ => unreachable!("control-flow signal escaped to the top level"),
            }
        }
        Ok(())
    }

    pub(crate) fn run_stmt(&mut self, env: &mut Env, stmt_s: &StmtS) -> Result<Exec> {
        let (stmt, span) = stmt_s;
        match stmt {
            Stmt::Block(block) => {
                let env = &mut Env::with_parent(env);
                for stmt_s in &block.stmts {
                    match self.run_stmt(env, stmt_s)? {
                        Exec::Normal => {}
                        signal => return Ok(signal),
                    }
                }
                Ok(Exec::Normal)
            }
            Stmt::Break => Ok(Exec::Break),
            Stmt::Class(class) => {
                // The name is bound before the class object is built, so
                // the methods close over a frame that already contains it.
                env.define(&class.name, Some(Object::Nil)).map_err(|()| {
                    (
                        Error::Runtime(RuntimeError::Redeclaration { name: class.name.clone() }),
                        span.clone(),
                    )
                })?;
                let object = Object::Class(Class::new(class, env));
                env.set(&class.name, object)
                    .unwrap_or_else(|()| unreachable!("class name was defined above"));
                Ok(Exec::Normal)
            }
            Stmt::Continue => Ok(Exec::Continue),
            Stmt::Expr(expr) => {
                self.run_expr(env, &expr.value)?;
                Ok(Exec::Normal)
            }
            Stmt::For(for_) => {
                let env = &mut Env::with_parent(env);
                if let Some(init) = &for_.init {
                    self.run_stmt(env, init)?;
                }
                loop {
                    let cond = match &for_.cond {
                        Some(cond) => self.run_expr(env, cond)?.bool(),
                        None => true,
                    };
                    if !cond {
                        break;
                    }
                    match self.run_stmt(env, &for_.body)? {
                        Exec::Break => break,
                        // `continue` skips the rest of the body; the
                        // increment below still runs.
                        Exec::Normal | Exec::Continue => {}
                        signal @ Exec::Return(_) => return Ok(signal),
                    }
                    if let Some(incr) = &for_.incr {
                        self.run_expr(env, incr)?;
                    }
                }
                Ok(Exec::Normal)
            }
            Stmt::Fun(fun) => {
                let function = Object::Function(Function::new(fun, env));
                env.define(&fun.name, Some(function)).map_err(|()| {
                    (
                        Error::Runtime(RuntimeError::Redeclaration { name: fun.name.clone() }),
                        span.clone(),
                    )
                })?;
                Ok(Exec::Normal)
            }
            Stmt::If(if_) => {
                if self.run_expr(env, &if_.cond)?.bool() {
                    self.run_stmt(env, &if_.then)
                } else if let Some(else_) = &if_.else_ {
                    self.run_stmt(env, else_)
                } else {
                    Ok(Exec::Normal)
                }
            }
            Stmt::Print(print) => {
                let value = self.run_expr(env, &print.value)?;
                writeln!(self.stdout, "{}", value)
                    .map_err(|_| (Error::Runtime(RuntimeError::WriteFailed), span.clone()))?;
                Ok(Exec::Normal)
            }
            Stmt::Return(return_) => {
                let object = match &return_.value {
                    Some(value) => self.run_expr(env, value)?,
                    None => Object::Nil,
                };
                Ok(Exec::Return(object))
            }
            Stmt::Var(var) => {
                let value = match &var.value {
                    Some(value) => Some(self.run_expr(env, value)?),
                    None => None,
                };
                env.define(&var.name, value).map_err(|()| {
                    (
                        Error::Runtime(RuntimeError::Redeclaration { name: var.name.clone() }),
                        span.clone(),
                    )
                })?;
                Ok(Exec::Normal)
            }
            Stmt::While(while_) => {
                while self.run_expr(env, &while_.cond)?.bool() {
                    match self.run_stmt(env, &while_.body)? {
                        Exec::Break => break,
                        Exec::Normal | Exec::Continue => {}
                        signal @ Exec::Return(_) => return Ok(signal),
                    }
                }
                Ok(Exec::Normal)
            }
        }
    }

    fn run_expr(&mut self, env: &mut Env, expr_s: &ExprS) -> Result<Object> {
        let (expr, span) = expr_s;
        match expr {
            Expr::Assign(assign) => {
                let value = self.run_expr(env, &assign.value)?;
                self.set_var(env, &assign.var, value.clone(), span)?;
                Ok(value)
            }
            Expr::Call(call) => {
                let callee = self.run_expr(env, &call.callee)?;
                if !matches!(
                    callee,
                    Object::Class(_) | Object::Function(_) | Object::Native(_)
                ) {
                    return Err((Error::Runtime(RuntimeError::NotCallable), span.clone()));
                }
                let mut args = Vec::with_capacity(call.args.len());
                for arg in &call.args {
                    args.push(self.run_expr(env, arg)?);
                }
                callee.call(self, args, span)
            }
            Expr::Get(get) => {
                let object = self.run_expr(env, &get.object)?;
                object.get(&get.name, span)
            }
            Expr::Infix(infix) => {
                let lt = self.run_expr(env, &infix.lt)?;
                let mut rt = || self.run_expr(env, &infix.rt);
                match infix.op {
                    // The deciding operand is returned unmodified.
                    OpInfix::LogicAnd => {
                        if lt.bool() {
                            rt()
                        } else {
                            Ok(lt)
                        }
                    }
                    OpInfix::LogicOr => {
                        if lt.bool() {
                            Ok(lt)
                        } else {
                            rt()
                        }
                    }
                    op => {
                        let rt = rt()?;
                        match (op, lt.clone(), rt.clone()) {
                            (OpInfix::Add, Object::Number(a), Object::Number(b)) => {
                                Ok(Object::Number(a + b))
                            }
                            (OpInfix::Add, Object::String(ref a), Object::String(ref b)) => {
                                Ok(Object::String(a.clone() + b.as_str()))
                            }
                            (OpInfix::Subtract, Object::Number(a), Object::Number(b)) => {
                                Ok(Object::Number(a - b))
                            }
                            (OpInfix::Multiply, Object::Number(a), Object::Number(b)) => {
                                Ok(Object::Number(a * b))
                            }
                            (OpInfix::Divide, Object::Number(a), Object::Number(b)) => {
                                if b == 0.0 {
                                    Err((Error::Runtime(RuntimeError::DivideByZero), span.clone()))
                                } else {
                                    Ok(Object::Number(a / b))
                                }
                            }
                            (OpInfix::Less, Object::Number(a), Object::Number(b)) => {
                                Ok(Object::Bool(a < b))
                            }
                            (OpInfix::LessEqual, Object::Number(a), Object::Number(b)) => {
                                Ok(Object::Bool(a <= b))
                            }
                            (OpInfix::Greater, Object::Number(a), Object::Number(b)) => {
                                Ok(Object::Bool(a > b))
                            }
                            (OpInfix::GreaterEqual, Object::Number(a), Object::Number(b)) => {
                                Ok(Object::Bool(a >= b))
                            }
                            (OpInfix::Equal, a, b) => Ok(Object::Bool(a == b)),
                            (OpInfix::NotEqual, a, b) => Ok(Object::Bool(a != b)),
                            (OpInfix::Add, _, _) => {
                                Err((Error::Runtime(RuntimeError::InvalidOperands), span.clone()))
                            }
                            _ => Err((
                                Error::Runtime(RuntimeError::NonNumericOperand),
                                span.clone(),
                            )),
                        }
                    }
                }
            }
            Expr::Lambda(lambda) => Ok(Object::Function(Function::lambda(lambda, env))),
            Expr::Literal(literal) => Ok(match literal {
                ExprLiteral::Bool(bool) => Object::Bool(*bool),
                ExprLiteral::Nil => Object::Nil,
                ExprLiteral::Number(number) => Object::Number(*number),
                ExprLiteral::String(string) => Object::String(string.clone()),
            }),
            Expr::Prefix(prefix) => {
                let rt = self.run_expr(env, &prefix.rt)?;
                match prefix.op {
                    OpPrefix::Negate => match rt {
                        Object::Number(number) => Ok(Object::Number(-number)),
                        _ => Err((
                            Error::Runtime(RuntimeError::NonNumericOperand),
                            span.clone(),
                        )),
                    },
                    OpPrefix::Not => Ok(Object::Bool(!rt.bool())),
                }
            }
            Expr::Set(set) => {
                let object = self.run_expr(env, &set.object)?;
                match object {
                    Object::Instance(ref instance) => {
                        let value = self.run_expr(env, &set.value)?;
                        instance.set_field(&set.name, value.clone());
                        Ok(value)
                    }
                    _ => Err((Error::Runtime(RuntimeError::NoFields), span.clone())),
                }
            }
            Expr::Ternary(ternary) => {
                // Only the chosen branch is evaluated.
                if self.run_expr(env, &ternary.cond)?.bool() {
                    self.run_expr(env, &ternary.then)
                } else {
                    self.run_expr(env, &ternary.else_)
                }
            }
            Expr::Var(var) => self.get_var(env, &var.var, span),
        }
    }

    fn get_var(&self, env: &Env, var: &Var, span: &Span) -> Result<Object> {
        let slot = match var.depth {
            Some(depth) => env.get_at(&var.name, depth).unwrap_or_else(|| {
                unreachable!("variable was resolved but could not be found: {:?}", var.name)
            }),
            None => self.globals.get(&var.name).ok_or_else(|| {
                (
                    Error::Runtime(RuntimeError::UndefinedVariable { name: var.name.clone() }),
                    span.clone(),
                )
            })?,
        };
        slot.ok_or_else(|| {
            (
                Error::Runtime(RuntimeError::UninitializedVariable { name: var.name.clone() }),
                span.clone(),
            )
        })
    }

    fn set_var(&mut self, env: &mut Env, var: &Var, value: Object, span: &Span) -> Result<()> {
        match var.depth {
            Some(depth) => {
                env.set_at(&var.name, value, depth).unwrap_or_else(|()| {
                    unreachable!("variable was resolved but could not be found: {:?}", var.name)
                });
                Ok(())
            }
            None => self.globals.set(&var.name, value).map_err(|()| {
                (
                    Error::Runtime(RuntimeError::UndefinedVariable { name: var.name.clone() }),
                    span.clone(),
                )
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;

    fn run(interpreter_source: &[&str]) -> (String, Vec<ErrorS>) {
        let mut output = Vec::new();
        let mut errors = Vec::new();
        {
            let mut interpreter = Interpreter::new(&mut output);
            for source in interpreter_source {
                errors.extend(interpreter.run(source));
            }
        }
        (String::from_utf8(output).unwrap(), errors)
    }

    #[test]
    fn globals_persist_across_runs() {
        let (output, errors) = run(&["var a = 1;", "a = a + 1;", "print a;"]);
        assert_eq!(errors, Vec::new());
        assert_eq!(output, "2\n");
    }

    #[test]
    fn fresh_interpreters_are_independent() {
        let (_, errors) = run(&["var a = 1;"]);
        assert_eq!(errors, Vec::new());
        let (_, errors) = run(&["var a = 1;"]);
        assert_eq!(errors, Vec::new());
    }

    #[test]
    fn failed_line_leaves_globals_usable() {
        let (output, errors) = run(&["var a = 1;", "print b;", "print a;"]);
        assert_eq!(
            errors,
            vec![(
                Error::Runtime(RuntimeError::UndefinedVariable { name: "b".to_string() }),
                6..7,
            )]
        );
        assert_eq!(output, "1\n");
    }

    #[test]
    fn parse_errors_suppress_evaluation() {
        let (output, errors) = run(&["print 1; print 2"]);
        assert_eq!(output, "");
        assert!(matches!(errors.as_slice(), [(Error::Parse(_), _)]));
    }

    #[test]
    fn redeclaring_a_global_is_a_runtime_error() {
        let (_, errors) = run(&["var a = 1;", "var a = 2;"]);
        assert_eq!(
            errors,
            vec![(
                Error::Runtime(RuntimeError::Redeclaration { name: "a".to_string() }),
                0..10,
            )]
        );
    }

    #[test]
    fn clock_is_bound_in_globals() {
        let (output, errors) = run(&["print clock() > 0;"]);
        assert_eq!(errors, Vec::new());
        assert_eq!(output, "true\n");
    }
}
