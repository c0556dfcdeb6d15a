use std::fmt;
use std::fmt::{Debug, Formatter};
use std::rc::Rc;

use crate::compiler::Block;
use crate::error::Unwind;
use crate::value::Value;
use crate::vm::{FrameId, Vm};

/// Anything a call expression can invoke. `env` is the frame the call is made from.
pub trait Callable {
    fn name(&self) -> &str;
    fn call(&self, vm: &mut Vm, env: FrameId, args: Vec<Value>) -> Result<Value, Unwind>;
}

impl Debug for dyn Callable {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "<function {}>", self.name())
    }
}

/// Signature of functions implemented by the host.
pub type NativeFn = dyn Fn(&mut Vm, FrameId, &[Value]) -> Result<Value, Unwind>;

// Bridges host closures into the language. These live in the root frame.
pub struct Native {
    name: String,
    func: Box<NativeFn>,
}

impl Native {
    pub fn new(name: &str, func: Box<NativeFn>) -> Self {
        Native {
            name: String::from(name),
            func,
        }
    }
}

impl Callable for Native {
    fn name(&self) -> &str {
        &self.name
    }

    fn call(&self, vm: &mut Vm, env: FrameId, args: Vec<Value>) -> Result<Value, Unwind> {
        (self.func)(vm, env, &args)
    }
}

/// A user function. There's no frame of its own for the parameters: they are written into the
/// caller's frame, then the body runs as a block on top of it.
pub struct Function {
    name: Option<String>,
    params: Rc<[String]>,
    body: Block,
}

impl Function {
    pub(crate) fn new(name: Option<String>, params: Vec<String>, body: Block) -> Self {
        Function {
            name,
            params: params.into(),
            body,
        }
    }
}

impl Callable for Function {
    fn name(&self) -> &str {
        self.name.as_deref().unwrap_or("anonymous")
    }

    fn call(&self, vm: &mut Vm, env: FrameId, args: Vec<Value>) -> Result<Value, Unwind> {
        // Missing arguments are null, extra ones are dropped.
        let mut args = args.into_iter();
        for param in self.params.iter() {
            vm.define(env, param, args.next().unwrap_or(Value::Null));
        }

        vm.run_block(env, Rc::clone(&self.body))
    }
}

/// The value of a `{...}` literal. Each invocation runs the block in a new frame on top of the
/// invoking one, arguments are ignored.
pub struct DeferredBlock {
    block: Block,
}

impl DeferredBlock {
    pub(crate) fn new(block: Block) -> Self {
        DeferredBlock { block }
    }
}

impl Callable for DeferredBlock {
    fn name(&self) -> &str {
        "block"
    }

    fn call(&self, vm: &mut Vm, env: FrameId, _: Vec<Value>) -> Result<Value, Unwind> {
        vm.run_block(env, Rc::clone(&self.block))
    }
}
