pub mod builtin;
pub mod error;
pub mod executor;
pub mod parser;
mod readline;
#[allow(clippy::module_inception)]
mod shell;

pub use error::{ParseError, ShellError};
pub use shell::Shell;
