use crate::env::Env;
use crate::interpreter::Exec;
use crate::object::{Callable, Object};
use crate::Interpreter;

use gc::{Finalize, Gc, Trace};
use skiff_common::error::Result;
use skiff_common::types::Span;
use skiff_syntax::ast::{ExprLambda, StmtBlock, StmtFun};

use std::fmt::{self, Display, Formatter};
use std::ops::Deref;

#[derive(Clone, Debug, Finalize, Trace)]
pub struct Function(Gc<FunctionImpl>);

impl Function {
    pub fn new(decl: &StmtFun, env: &Env) -> Self {
        Self(Gc::new(FunctionImpl {
            name: Some(decl.name.clone()),
            params: decl.params.clone(),
            body: decl.body.clone(),
            env: env.clone(),
            is_init: false,
        }))
    }

    /// A method closes over the frame the class was declared in; `init`
    /// is flagged as the constructor.
    pub fn method(decl: &StmtFun, env: &Env) -> Self {
        Self(Gc::new(FunctionImpl {
            name: Some(decl.name.clone()),
            params: decl.params.clone(),
            body: decl.body.clone(),
            env: env.clone(),
            is_init: decl.name == "init",
        }))
    }

    pub fn lambda(decl: &ExprLambda, env: &Env) -> Self {
        Self(Gc::new(FunctionImpl {
            name: None,
            params: decl.params.clone(),
            body: decl.body.clone(),
            env: env.clone(),
            is_init: false,
        }))
    }

    /// Pairs the function with an instance by interposing a frame that
    /// binds `this` between the function and its closure.
    pub fn bind(&self, this: Object) -> Function {
        let mut env = Env::with_parent(&self.env);
        env.define("this", Some(this))
            .unwrap_or_else(|()| unreachable!("\"this\" bound twice in a fresh frame"));
        Self(Gc::new(FunctionImpl {
            name: self.name.clone(),
            params: self.params.clone(),
            body: self.body.clone(),
            env,
            is_init: self.is_init,
        }))
    }

    fn this(&self) -> Object {
        self.env
            .get("this")
            .flatten()
            .unwrap_or_else(|| unreachable!("\"this\" not bound in initializer"))
    }
}

impl Callable for Function {
    fn arity(&self) -> usize {
        self.params.len()
    }

    fn call_unchecked(
        &self,
        interpreter: &mut Interpreter,
        args: Vec<Object>,
        _span: &Span,
    ) -> Result<Object> {
        let env = &mut Env::with_parent(&self.env);
        for (param, arg) in self.params.iter().zip(args) {
            env.define(param, Some(arg))
                .unwrap_or_else(|()| unreachable!("duplicate parameter passed the resolver"));
        }
        for stmt_s in &self.body.stmts {
            match interpreter.run_stmt(env, stmt_s)? {
                Exec::Normal => {}
                Exec::Return(object) => {
                    // A constructor always answers with its instance, even
                    // on an explicit return.
                    return Ok(if self.is_init { self.this() } else { object });
                }
                Exec::Break | Exec::Continue => {
                    unreachable!("loop signal escaped its enclosing function")
                }
            }
        }
        Ok(if self.is_init { self.this() } else { Object::Nil })
    }
}

impl Display for Function {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "<fun {}>", name),
            None => write!(f, "<lambda>"),
        }
    }
}

impl Deref for Function {
    type Target = FunctionImpl;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Eq for Function {}

impl PartialEq for Function {
    fn eq(&self, other: &Self) -> bool {
        Gc::ptr_eq(&self.0, &other.0)
    }
}

#[derive(Debug, Finalize, Trace)]
pub struct FunctionImpl {
    pub name: Option<String>,
    #[unsafe_ignore_trace]
    pub params: Vec<String>,
    #[unsafe_ignore_trace]
    pub body: StmtBlock,
    pub env: Env,
    pub is_init: bool,
}
