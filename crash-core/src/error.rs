use thiserror::Error;

use crate::loc::SrcLoc;

#[derive(Debug, Error, PartialEq, Clone)]
pub enum Error {
    #[error("{loc}: unterminated string: {rest:?}")]
    UnterminatedString { loc: SrcLoc, rest: String },

    #[error("{loc}: unknown token: {rest:?}")]
    UnknownToken { loc: SrcLoc, rest: String },
}

impl Error {
    pub fn loc(&self) -> &SrcLoc {
        match self {
            Error::UnterminatedString { loc, .. } => loc,
            Error::UnknownToken { loc, .. } => loc,
        }
    }

    /// Source text that was left unconsumed when scanning gave up.
    pub fn rest(&self) -> &str {
        match self {
            Error::UnterminatedString { rest, .. } => rest,
            Error::UnknownToken { rest, .. } => rest,
        }
    }
}
