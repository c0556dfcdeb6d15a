use std::fmt;

use crash_core::SrcLoc;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Clone)]
pub enum Error {
    #[error(transparent)]
    Parse(#[from] parser::Error),

    #[error("{loc}: compile error: {msg}")]
    Compile { loc: SrcLoc, msg: String },

    #[error("{loc}: runtime error: {msg}")]
    Runtime { loc: SrcLoc, msg: String },
}

impl Error {
    pub(crate) fn compile(loc: &SrcLoc, msg: fmt::Arguments) -> Error {
        Error::Compile {
            loc: loc.clone(),
            msg: format!("{}", msg),
        }
    }

    pub(crate) fn runtime(loc: &SrcLoc, msg: fmt::Arguments) -> Error {
        Error::Runtime {
            loc: loc.clone(),
            msg: format!("{}", msg),
        }
    }

    pub fn loc(&self) -> &SrcLoc {
        match self {
            Error::Parse(err) => err.loc(),
            Error::Compile { loc, .. } => loc,
            Error::Runtime { loc, .. } => loc,
        }
    }
}

/// Ways out of a running block other than finishing it. Both travel through the `Err` side so `?`
/// carries them up to the host boundary, which is the only place that tells them apart.
#[derive(Debug, PartialEq)]
pub enum Unwind {
    // `yield` was called. The frames stay on the stack for the boundary to capture.
    Yield,
    Fault(Error),
}

impl From<Error> for Unwind {
    fn from(err: Error) -> Self {
        Unwind::Fault(err)
    }
}

pub type VmResult<T> = Result<T, Error>;
