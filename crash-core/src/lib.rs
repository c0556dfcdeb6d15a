mod error;
mod lexer;
mod loc;
mod token;

pub use error::*;
pub use lexer::*;
pub use loc::*;
pub use token::*;
