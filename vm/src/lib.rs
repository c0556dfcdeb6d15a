mod compiler;
mod engine;
mod error;
mod limits;
mod object;
mod value;
mod vm;

pub use compiler::*;
pub use engine::*;
pub use error::*;
pub use object::*;
pub use value::*;
pub use vm::{FrameId, Outcome, Suspension, Vm};
