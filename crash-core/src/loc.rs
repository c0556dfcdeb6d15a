use std::fmt;
use std::fmt::{Display, Formatter};
use std::rc::Rc;

/// A position in a source file. Rows start wherever the lexer was told to start (usually 1),
/// columns always start at 0.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SrcLoc {
    pub file: Rc<str>,
    pub row: usize,
    pub col: usize,
}

impl SrcLoc {
    pub fn new(file: impl Into<Rc<str>>, row: usize, col: usize) -> Self {
        SrcLoc {
            file: file.into(),
            row,
            col,
        }
    }
}

impl Display for SrcLoc {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.row, self.col)
    }
}

#[cfg(test)]
mod tests {
    use crate::loc::SrcLoc;

    #[test]
    fn test_display() {
        let loc = SrcLoc::new("foo", 1, 2);
        assert_eq!(&*loc.file, "foo");
        assert_eq!(loc.row, 1);
        assert_eq!(loc.col, 2);
        assert_eq!(loc.to_string(), "foo:1:2");
    }
}
