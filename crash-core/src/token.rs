use std::fmt;
use std::fmt::{Display, Formatter};

use crate::loc::SrcLoc;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Type {
    LeftParen,
    RightParen,
    LeftBrace,
    RightBrace,
    Comma,
    Dot,
    SemiColon,
    Colon,
    Assign,

    Identifier,
    Str,
    Int,
    Float,

    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub loc: SrcLoc,
    pub ty: Type,

    // The exact text the token was scanned from, quotes and escapes included for strings.
    pub text: String,
}

impl Token {
    pub fn new(loc: SrcLoc, ty: Type, text: impl Into<String>) -> Self {
        Token {
            loc,
            ty,
            text: text.into(),
        }
    }

    pub fn is(&self, ty: Type) -> bool {
        self.ty == ty
    }

    pub fn is_ident(&self, text: &str) -> bool {
        self.ty == Type::Identifier && self.text == text
    }

    /// Tokens that close a list: end of input, `}` and `)`.
    pub fn is_terminator(&self) -> bool {
        matches!(self.ty, Type::Eof | Type::RightBrace | Type::RightParen)
    }
}

impl Display for Token {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self.ty {
            Type::Eof => write!(f, "<EOF>"),
            _ => write!(f, "{:?}", self.text),
        }
    }
}
