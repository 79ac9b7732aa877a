use crate::object::Object;
use crate::Interpreter;

use skiff_common::error::{Error, Result, RuntimeError};
use skiff_common::types::Span;

pub trait Callable {
    fn arity(&self) -> usize;

    fn call_unchecked(
        &self,
        interpreter: &mut Interpreter,
        args: Vec<Object>,
        span: &Span,
    ) -> Result<Object>;

    fn call(
        &self,
        interpreter: &mut Interpreter,
        args: Vec<Object>,
        span: &Span,
    ) -> Result<Object> {
        let exp_args = self.arity();
        let got_args = args.len();
        if exp_args != got_args {
            return Err((
                Error::Runtime(RuntimeError::ArityMismatch { exp_args, got_args }),
                span.clone(),
            ));
        }
        self.call_unchecked(interpreter, args, span)
    }
}
