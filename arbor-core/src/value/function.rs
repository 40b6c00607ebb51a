//! Callable values.

use std::fmt;
use std::rc::Rc;

use super::{Object, Value};
use crate::error::Result;

/// Reads an accessor property; receives the object it was read on.
pub type Getter = Rc<dyn Fn(&Object) -> Value>;

/// Writes an accessor property; receives the object it was written on.
pub type Setter = Rc<dyn Fn(&Object, Value) -> Result<()>>;

type NativeFn = dyn Fn(&Object, &[Value]) -> Result<Value>;

/// A shared callable. Called with the receiver (`this`) and arguments.
#[derive(Clone)]
pub struct Function(Rc<NativeFn>);

impl Function {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&Object, &[Value]) -> Result<Value> + 'static,
    {
        Self(Rc::new(f))
    }

    pub fn call(&self, this: &Object, args: &[Value]) -> Result<Value> {
        (self.0)(this, args)
    }

    pub fn ptr_eq(&self, other: &Function) -> bool {
        std::ptr::addr_eq(Rc::as_ptr(&self.0), Rc::as_ptr(&other.0))
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[Function {:p}]", Rc::as_ptr(&self.0) as *const ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;

    #[test]
    fn call_receives_this_and_args() {
        let add = Function::new(|this, args| {
            let base = this.get("base").as_f64().unwrap_or_default();
            let arg = args.first().and_then(Value::as_f64).unwrap_or_default();
            Ok(Value::from(base + arg))
        });
        let this = Object::from_pairs([("base", Value::from(40))]);

        assert_eq!(add.call(&this, &[Value::from(2)]).unwrap(), Value::from(42));
    }

    #[test]
    fn errors_propagate() {
        let fail = Function::new(|_, _| Err(StoreError::callback("nope")));
        assert_eq!(
            fail.call(&Object::new(), &[]),
            Err(StoreError::callback("nope"))
        );
    }

    #[test]
    fn identity_equality() {
        let f = Function::new(|_, _| Ok(Value::Undefined));
        let g = Function::new(|_, _| Ok(Value::Undefined));
        assert!(f.ptr_eq(&f.clone()));
        assert!(!f.ptr_eq(&g));
    }
}
