mod callable;
mod class;
mod function;
mod instance;
mod native;

use std::fmt::{self, Display, Formatter};

pub use callable::Callable;
pub use class::Class;
pub use function::Function;
use gc::{Finalize, Trace};
pub use instance::Instance;
pub use native::Native;

use skiff_common::error::{Error, Result, RuntimeError};
use skiff_common::types::Span;

use crate::Interpreter;

#[derive(Clone, Debug, Finalize, Trace)]
pub enum Object {
    Bool(bool),
    Class(Class),
    Function(Function),
    Instance(Instance),
    Native(Native),
    Nil,
    Number(f64),
    String(String),
}

impl Object {
    /// Truthiness: everything except `null` and `false`.
    pub fn bool(&self) -> bool {
        !matches!(self, Object::Nil | Object::Bool(false))
    }

    pub fn get(&self, name: &str, span: &Span) -> Result<Object> {
        let instance = match &self {
            Object::Instance(instance) => instance,
            _ => return Err((Error::Runtime(RuntimeError::NoProperties), span.clone())),
        };

        // Fields shadow methods.
        if let Some(object) = instance.field(name) {
            return Ok(object);
        }

        instance.class().method(name, self.clone()).ok_or_else(|| {
            (
                Error::Runtime(RuntimeError::UndefinedProperty { name: name.to_string() }),
                span.clone(),
            )
        })
    }

    pub fn call(
        &self,
        interpreter: &mut Interpreter,
        args: Vec<Object>,
        span: &Span,
    ) -> Result<Object> {
        match &self {
            Object::Class(class) => class.call(interpreter, args, span),
            Object::Function(function) => function.call(interpreter, args, span),
            Object::Native(native) => native.call(interpreter, args, span),
            _ => unreachable!("callee was vetted before the arguments were evaluated"),
        }
    }
}

impl Display for Object {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Object::Bool(bool) => write!(f, "{}", bool),
            Object::Class(class) => write!(f, "{}", class),
            Object::Function(function) => write!(f, "{}", function),
            Object::Instance(instance) => write!(f, "{}", instance),
            Object::Native(native) => write!(f, "{}", native),
            Object::Nil => write!(f, "null"),
            Object::Number(number) => write!(f, "{}", number),
            Object::String(string) => write!(f, "{}", string),
        }
    }
}

impl PartialEq for Object {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Object::Bool(b1), Object::Bool(b2)) => b1 == b2,
            (Object::Class(c1), Object::Class(c2)) => c1 == c2,
            (Object::Function(f1), Object::Function(f2)) => f1 == f2,
            (Object::Instance(i1), Object::Instance(i2)) => i1 == i2,
            (Object::Native(n1), Object::Native(n2)) => n1 == n2,
            (Object::Nil, Object::Nil) => true,
            (Object::Number(n1), Object::Number(n2)) => n1 == n2,
            (Object::String(s1), Object::String(s2)) => s1 == s2,
            _ => false,
        }
    }
}
