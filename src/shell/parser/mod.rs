pub mod ast;
pub mod lexer;
#[allow(clippy::module_inception)]
pub mod parser;

pub use ast::{Command, Pipeline};
pub use lexer::{ArgKind, Lexer, TokenSource};
pub use parser::Parser;
