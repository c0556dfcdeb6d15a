mod ast;
mod error;
mod parser;

pub use ast::*;
pub use error::*;
pub use parser::*;
