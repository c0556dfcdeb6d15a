use std::cell::RefCell;
use std::io::Write;
use std::rc::Rc;

use tracing::trace;

use crate::error::Unwind;
use crate::value::Value;
use crate::vm::{FrameId, Vm};

// Writes every argument on a line of its own.
pub(crate) fn print(
    out: Rc<RefCell<dyn Write>>,
) -> impl Fn(&mut Vm, FrameId, &[Value]) -> Result<Value, Unwind> {
    move |vm: &mut Vm, _: FrameId, args: &[Value]| -> Result<Value, Unwind> {
        let mut out = out.borrow_mut();
        for arg in args {
            writeln!(out, "{}", arg).map_err(|err| vm.error(format_args!("print failed: {}", err)))?;
        }
        Ok(Value::Null)
    }
}

pub(crate) fn give(_: &mut Vm, _: FrameId, args: &[Value]) -> Result<Value, Unwind> {
    Ok(args.first().cloned().unwrap_or(Value::Null))
}

pub(crate) fn suspend(_: &mut Vm, env: FrameId, _: &[Value]) -> Result<Value, Unwind> {
    trace!(frame = env.0, "yield");
    Err(Unwind::Yield)
}

// The caller's own bindings, shared rather than copied.
pub(crate) fn defs(vm: &mut Vm, env: FrameId, _: &[Value]) -> Result<Value, Unwind> {
    Ok(Value::Defs(vm.bindings(env)))
}
