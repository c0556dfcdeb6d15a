use crash_core::{SrcLoc, Token};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Clone)]
pub enum Error {
    #[error(transparent)]
    Lexical(#[from] crash_core::Error),

    #[error("{loc}: syntax error: {msg}, got {token}")]
    Syntax {
        token: Token,

        // loc is copied from token, thiserror can't reach into fields in error strings
        loc: SrcLoc,
        msg: String,
    },

    #[error("{loc}: invalid literal {text}")]
    InvalidLiteral { loc: SrcLoc, text: String },
}

impl Error {
    pub(crate) fn syntax(token: &Token, msg: &str) -> Self {
        Error::Syntax {
            token: token.clone(),
            loc: token.loc.clone(),
            msg: String::from(msg),
        }
    }

    pub fn loc(&self) -> &SrcLoc {
        match self {
            Error::Lexical(err) => err.loc(),
            Error::Syntax { loc, .. } => loc,
            Error::InvalidLiteral { loc, .. } => loc,
        }
    }
}
