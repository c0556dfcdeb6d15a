use std::rc::Rc;

use phf::{phf_map, Map};
use tracing::trace;

use crate::error::Error;
use crate::loc::SrcLoc;
use crate::token::{Token, Type};

/// A forward-only cursor over source text. Each call to `next_token` consumes exactly the text of
/// the returned token (plus any whitespace and comments before it) and advances the row and
/// column accordingly. Backtracking is left to the parser.
pub struct Lexer<'a> {
    rest: &'a str,
    file: Rc<str>,
    row: usize,
    col: usize,

    // Set once the EOF token has been handed out by the iterator, so iteration stops after it.
    eof: bool,
    error: Option<Error>,
}

impl<'a> Lexer<'a> {
    const PUNCTUATION: Map<char, Type> = phf_map! {
        ';' => Type::SemiColon,
        '{' => Type::LeftBrace,
        '}' => Type::RightBrace,
        '(' => Type::LeftParen,
        ')' => Type::RightParen,
        ':' => Type::Colon,
        '=' => Type::Assign,
        ',' => Type::Comma,
        '.' => Type::Dot,
    };

    const RADIX_PREFIXES: [(&'static str, u32); 3] = [("0x", 16), ("0o", 8), ("0b", 2)];

    pub fn new(src: &'a str, file: impl Into<Rc<str>>, row: usize) -> Self {
        Lexer {
            rest: src,
            file: file.into(),
            row,
            col: 0,
            eof: false,
            error: None,
        }
    }

    /// Location of the next unconsumed character.
    pub fn loc(&self) -> SrcLoc {
        SrcLoc {
            file: Rc::clone(&self.file),
            row: self.row,
            col: self.col,
        }
    }

    pub fn error(&self) -> Option<&Error> {
        self.error.as_ref()
    }

    pub fn next_token(&mut self) -> Result<Token, Error> {
        self.skip_blanks();

        let loc = self.loc();
        let first = match self.rest.chars().next() {
            Some(c) => c,
            None => return Ok(Token::new(loc, Type::Eof, "")),
        };

        let (ty, len) = if first.is_ascii_alphabetic() || first == '_' {
            (Type::Identifier, self.span(0, |c| c.is_ascii_alphanumeric() || c == '_'))
        } else if let Some(ty) = Self::PUNCTUATION.get(&first) {
            (*ty, 1)
        } else if let Some(len) = self.radix_integer() {
            (Type::Int, len)
        } else if first.is_ascii_digit() {
            self.number()
        } else if first == '\'' {
            (Type::Str, self.string(&loc)?)
        } else {
            return Err(Error::UnknownToken {
                loc,
                rest: self.rest.to_string(),
            });
        };

        let token = Token::new(loc, ty, self.consume(len));
        trace!(loc = %token.loc, ty = ?token.ty, text = %token.text, "token");
        Ok(token)
    }

    // Consumes the first `len` bytes of the remaining text. Every newline in the consumed span
    // bumps the row and resets the column, whatever follows the last newline adds to the column.
    pub(crate) fn consume(&mut self, len: usize) -> &'a str {
        let (taken, rest) = self.rest.split_at(len);
        self.rest = rest;

        match taken.rfind('\n') {
            Some(last) => {
                self.row += taken.matches('\n').count();
                self.col = taken[last + 1..].chars().count();
            }
            None => self.col += taken.chars().count(),
        }

        taken
    }

    fn skip_blanks(&mut self) {
        loop {
            let trimmed = self.rest.trim_start();
            self.consume(self.rest.len() - trimmed.len());

            if !self.rest.starts_with('#') {
                break;
            }

            let end = self.rest.find('\n').unwrap_or(self.rest.len());
            self.consume(end);
        }
    }

    // Length in bytes of the run of characters matching `pred`, starting at byte `from`.
    fn span(&self, from: usize, pred: impl Fn(char) -> bool) -> usize {
        self.rest[from..]
            .find(|c: char| !pred(c))
            .unwrap_or(self.rest.len() - from)
    }

    fn radix_integer(&self) -> Option<usize> {
        Self::RADIX_PREFIXES.iter().find_map(|(prefix, radix)| {
            if !self.rest.starts_with(prefix) {
                return None;
            }

            match self.span(prefix.len(), |c| c.is_digit(*radix)) {
                0 => None,
                digits => Some(prefix.len() + digits),
            }
        })
    }

    // Decimal integers and floats. The literal is a float whenever a dot or an exponent marker
    // follows the leading digits, even if what comes after it isn't part of the number.
    fn number(&self) -> (Type, usize) {
        let bytes = self.rest.as_bytes();
        let mut len = self.span(0, |c| c.is_ascii_digit());
        let ty = match bytes.get(len) {
            Some(b'.') | Some(b'e') | Some(b'E') => Type::Float,
            _ => Type::Int,
        };

        if bytes.get(len) == Some(&b'.') && bytes.get(len + 1).map_or(false, u8::is_ascii_digit) {
            len += 1 + self.span(len + 1, |c| c.is_ascii_digit());
        }

        if matches!(bytes.get(len), Some(b'e') | Some(b'E')) {
            let sign = match bytes.get(len + 1) {
                Some(b'+') | Some(b'-') => 1,
                _ => 0,
            };

            let digits = self.span(len + 1 + sign, |c| c.is_ascii_digit());
            if digits > 0 {
                len += 1 + sign + digits;
            }
        }

        (ty, len)
    }

    // Single quoted strings. Backslash escapes any character, including the quote itself, and is
    // kept verbatim in the token text.
    fn string(&self, loc: &SrcLoc) -> Result<usize, Error> {
        let mut chars = self.rest.char_indices().skip(1);
        while let Some((idx, c)) = chars.next() {
            match c {
                '\'' => return Ok(idx + 1),
                '\\' => {
                    if chars.next().is_none() {
                        break;
                    }
                }
                _ => {}
            }
        }

        Err(Error::UnterminatedString {
            loc: loc.clone(),
            rest: self.rest.to_string(),
        })
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Token;

    fn next(&mut self) -> Option<Self::Item> {
        if self.eof || self.error.is_some() {
            return None;
        }

        match self.next_token() {
            Ok(token) => {
                self.eof = token.is(Type::Eof);
                Some(token)
            }
            Err(err) => {
                self.error = Some(err);
                None
            }
        }
    }
}
