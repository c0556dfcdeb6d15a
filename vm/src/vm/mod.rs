use std::cell::RefCell;
use std::fmt;
use std::fmt::{Debug, Formatter};
use std::mem;
use std::rc::Rc;

use crash_core::SrcLoc;
use tracing::{debug, instrument, trace};

use crate::compiler::{Block, Program};
use crate::error::{Error, Unwind, VmResult};
use crate::limits::{DEFAULT_FILENAME, DEFAULT_FIRST_ROW, VM_MAX_FRAME_COUNT};
use crate::value::{Bindings, Value};

pub use frame::FrameId;
use frame::{Frame, Kind};

mod frame;
pub(crate) mod native;

/// How a run handed control back to the host.
#[derive(Debug)]
pub enum Outcome {
    Complete(Value),
    Suspended(Suspension),
}

impl Outcome {
    pub fn is_suspended(&self) -> bool {
        matches!(self, Outcome::Suspended(_))
    }

    pub fn into_value(self) -> Option<Value> {
        match self {
            Outcome::Complete(value) => Some(value),
            Outcome::Suspended(_) => None,
        }
    }
}

/// The frames that were live when `yield` was called, innermost last. Resuming consumes it, so a
/// suspension can only be continued once.
pub struct Suspension {
    frames: Vec<Frame>,
}

impl Suspension {
    pub fn depth(&self) -> usize {
        self.frames.len()
    }
}

impl Debug for Suspension {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "Suspension({} frames)", self.frames.len())
    }
}

/// The frame stack. Frame 0 is the root and holds the builtins, every other frame sits on top of
/// the frame that created it, so walking parents from the top is walking down the stack.
pub struct Vm {
    frames: Vec<Frame>,

    // Location of the most recent call, for errors raised by natives
    call_site: SrcLoc,
}

impl Default for Vm {
    fn default() -> Self {
        Self::new()
    }
}

impl Vm {
    pub fn new() -> Self {
        let mut frames = Vec::with_capacity(VM_MAX_FRAME_COUNT);
        frames.push(Frame::new(None, Vec::new().into(), Kind::Block));

        Vm {
            frames,
            call_site: SrcLoc::new(DEFAULT_FILENAME, DEFAULT_FIRST_ROW, 0),
        }
    }

    pub fn define(&mut self, env: FrameId, name: &str, value: Value) {
        self.frames[env.0]
            .bindings
            .borrow_mut()
            .insert(String::from(name), value);
    }

    /// Looks `name` up starting at `env` and walking towards the root.
    pub fn lookup(&self, env: FrameId, name: &str) -> Option<Value> {
        let mut cursor = Some(env);
        while let Some(id) = cursor {
            let frame = &self.frames[id.0];
            let value = frame.bindings.borrow().get(name).cloned();
            if value.is_some() {
                return value;
            }
            cursor = frame.parent;
        }
        None
    }

    /// The live binding table of a frame.
    pub fn bindings(&self, env: FrameId) -> Rc<RefCell<Bindings>> {
        Rc::clone(&self.frames[env.0].bindings)
    }

    /// A runtime error located at the call currently being made.
    pub fn error(&self, msg: fmt::Arguments) -> Unwind {
        Error::runtime(&self.call_site, msg).into()
    }

    /// Invokes `callee` from `env`. Values that aren't callable evaluate to themselves when called
    /// without arguments, which is how a bare variable reads its value.
    pub fn call(
        &mut self,
        env: FrameId,
        callee: Value,
        args: Vec<Value>,
        loc: &SrcLoc,
    ) -> Result<Value, Unwind> {
        match callee {
            Value::Callable(callable) => {
                trace!(%loc, name = callable.name(), args = args.len(), "call");
                self.call_site = loc.clone();
                callable.call(self, env, args)
            }
            value if args.is_empty() => Ok(value),
            value => Err(Error::runtime(loc, format_args!("value '{}' is not callable", value)).into()),
        }
    }

    // Arguments are evaluated in a frame of their own which remembers the callee, so a `yield`
    // inside an argument can later finish the call.
    pub(crate) fn call_with_args(
        &mut self,
        env: FrameId,
        callee: Value,
        args: Block,
        loc: &SrcLoc,
    ) -> Result<Value, Unwind> {
        if args.is_empty() {
            return self.call(env, callee, Vec::new(), loc);
        }

        let kind = Kind::Args {
            callee,
            values: Vec::with_capacity(args.len()),
            loc: loc.clone(),
        };
        let id = self.push_frame(env, args, kind)?;
        self.finish_args(id)
    }

    pub(crate) fn run_block(&mut self, parent: FrameId, block: Block) -> Result<Value, Unwind> {
        let id = self.push_frame(parent, block, Kind::Block)?;
        self.finish_block(id, Value::Null)
    }

    fn push_frame(&mut self, parent: FrameId, block: Block, kind: Kind) -> Result<FrameId, Unwind> {
        if self.frames.len() == VM_MAX_FRAME_COUNT {
            return Err(self.error(format_args!("stack overflow")));
        }

        self.frames.push(Frame::new(Some(parent), block, kind));
        Ok(FrameId(self.frames.len() - 1))
    }

    // Runs the remaining steps of the top frame and pops it. `last` is the result if there's no
    // step left to run.
    fn finish_block(&mut self, id: FrameId, mut last: Value) -> Result<Value, Unwind> {
        while let Some(step) = self.frames[id.0].current() {
            trace!(frame = id.0, ip = self.frames[id.0].ip, "step");
            last = step(self, id)?;
            self.frames[id.0].ip += 1;
        }

        self.frames.truncate(id.0);
        Ok(last)
    }

    // Evaluates the remaining arguments of the top frame, pops it and makes the pending call.
    fn finish_args(&mut self, id: FrameId) -> Result<Value, Unwind> {
        while let Some(step) = self.frames[id.0].current() {
            trace!(frame = id.0, ip = self.frames[id.0].ip, "argument");
            let value = step(self, id)?;

            let frame = &mut self.frames[id.0];
            if let Kind::Args { values, .. } = &mut frame.kind {
                values.push(value);
            }
            frame.ip += 1;
        }

        let frame = &mut self.frames[id.0];
        let env = frame.parent.unwrap_or(FrameId::ROOT);
        let kind = mem::replace(&mut frame.kind, Kind::Block);
        self.frames.truncate(id.0);

        match kind {
            Kind::Args { callee, values, loc } => self.call(env, callee, values, &loc),
            Kind::Block => Ok(Value::Null),
        }
    }

    /// Runs a compiled program on top of the root frame.
    #[instrument(level = "debug", skip_all, fields(loc = %program.loc()))]
    pub fn run(&mut self, program: &Program) -> VmResult<Outcome> {
        self.ensure_idle("run a program")?;
        let block = program.block();
        self.boundary(|vm| vm.run_block(FrameId::ROOT, block))
    }

    /// Calls a root binding by name, the way a host fires a callback.
    #[instrument(level = "debug", skip(self, args))]
    pub fn invoke(&mut self, name: &str, args: Vec<Value>) -> VmResult<Outcome> {
        self.ensure_idle("call a function")?;

        let loc = SrcLoc::new(DEFAULT_FILENAME, DEFAULT_FIRST_ROW, 0);
        let callee = self
            .lookup(FrameId::ROOT, name)
            .ok_or_else(|| Error::runtime(&loc, format_args!("undefined name '{}'", name)))?;
        self.boundary(|vm| vm.call(FrameId::ROOT, callee, args, &loc))
    }

    /// Continues a suspended run. Frames are finished innermost first, each one picking up after
    /// the step that was interrupted. The value the inner frame ended with stands in for the
    /// interrupted step, which matters for argument frames: it becomes the pending argument.
    #[instrument(level = "debug", skip_all, fields(depth = suspension.depth()))]
    pub fn resume(&mut self, suspension: Suspension) -> VmResult<Outcome> {
        self.ensure_idle("resume")?;
        self.frames.extend(suspension.frames);

        self.boundary(|vm| {
            let mut carried = Value::Null;
            while vm.frames.len() > 1 {
                let id = FrameId(vm.frames.len() - 1);
                let frame = &mut vm.frames[id.0];
                frame.ip += 1;

                let pending_call = match &mut frame.kind {
                    Kind::Args { values, .. } => {
                        values.push(carried.clone());
                        true
                    }
                    Kind::Block => false,
                };
                carried = if pending_call {
                    vm.finish_args(id)?
                } else {
                    vm.finish_block(id, carried)?
                };
            }
            Ok(carried)
        })
    }

    fn ensure_idle(&self, what: &str) -> VmResult<()> {
        if self.frames.len() == 1 {
            Ok(())
        } else {
            Err(Error::runtime(
                &self.call_site,
                format_args!("cannot {} while running", what),
            ))
        }
    }

    // Where a run meets the host. A yield leaves the live frames on the stack, they move into the
    // suspension. A fault throws them away.
    fn boundary<F>(&mut self, f: F) -> VmResult<Outcome>
    where
        F: FnOnce(&mut Vm) -> Result<Value, Unwind>,
    {
        match f(self) {
            Ok(value) => Ok(Outcome::Complete(value)),
            Err(Unwind::Yield) => {
                let frames = self.frames.split_off(1);
                debug!(depth = frames.len(), "suspended");
                Ok(Outcome::Suspended(Suspension { frames }))
            }
            Err(Unwind::Fault(err)) => {
                debug!(%err, "aborted");
                self.frames.truncate(1);
                Err(err)
            }
        }
    }
}
