use std::fmt::{self, Display, Formatter};
use std::ops::Deref;

use gc::{Finalize, Gc, Trace};
use rustc_hash::FxHashMap;
use skiff_common::error::Result;
use skiff_common::types::Span;
use skiff_syntax::ast::StmtClass;

use crate::env::Env;
use crate::object::{Callable, Function, Instance, Object};
use crate::Interpreter;

#[derive(Clone, Debug, Finalize, Trace)]
pub struct Class(Gc<ClassImpl>);

impl Class {
    pub fn new(decl: &StmtClass, env: &Env) -> Self {
        let methods = decl
            .methods
            .iter()
            .map(|(method, _)| (method.name.clone(), Function::method(method, env)))
            .collect();
        Self(Gc::new(ClassImpl { name: decl.name.clone(), methods }))
    }

    /// Looks up a method and binds it to the given instance.
    pub fn method(&self, name: &str, this: Object) -> Option<Object> {
        self.methods.get(name).map(|method| Object::Function(method.bind(this)))
    }
}

impl Callable for Class {
    fn arity(&self) -> usize {
        match self.methods.get("init") {
            Some(init) => init.arity(),
            None => 0,
        }
    }

    fn call_unchecked(
        &self,
        interpreter: &mut Interpreter,
        args: Vec<Object>,
        span: &Span,
    ) -> Result<Object> {
        let instance = Object::Instance(Instance::new(self));
        if let Some(Object::Function(ref init)) = self.method("init", instance.clone()) {
            init.call(interpreter, args, span)?;
        }
        Ok(instance)
    }
}

impl Display for Class {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "<class {}>", self.name)
    }
}

impl Deref for Class {
    type Target = ClassImpl;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Eq for Class {}

impl PartialEq for Class {
    fn eq(&self, other: &Self) -> bool {
        Gc::ptr_eq(&self.0, &other.0)
    }
}

#[derive(Debug, Finalize, Trace)]
pub struct ClassImpl {
    pub name: String,
    pub methods: FxHashMap<String, Function>,
}
