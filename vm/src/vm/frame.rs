use std::cell::RefCell;
use std::rc::Rc;

use crash_core::SrcLoc;

use crate::compiler::{Block, Compiled};
use crate::value::{Bindings, Value};

/// Index of a frame on the VM's frame stack.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct FrameId(pub(crate) usize);

impl FrameId {
    pub const ROOT: FrameId = FrameId(0);
}

pub(crate) enum Kind {
    // Runs a list, the value of the last step is the result.
    Block,

    // Evaluates call arguments into `values`, then calls `callee` from the parent frame.
    Args {
        callee: Value,
        values: Vec<Value>,
        loc: SrcLoc,
    },
}

pub(crate) struct Frame {
    pub(crate) parent: Option<FrameId>,
    pub(crate) bindings: Rc<RefCell<Bindings>>,
    pub(crate) block: Block,

    // The step being run. It only moves once a step finished, so a suspended frame points at
    // the step that was interrupted.
    pub(crate) ip: usize,
    pub(crate) kind: Kind,
}

impl Frame {
    pub(crate) fn new(parent: Option<FrameId>, block: Block, kind: Kind) -> Self {
        Frame {
            parent,
            bindings: Rc::default(),
            block,
            ip: 0,
            kind,
        }
    }

    pub(crate) fn current(&self) -> Option<Compiled> {
        self.block.get(self.ip).cloned()
    }
}
