use std::ffi::NulError;
use std::io;

use nix::errno::Errno;
use rustyline::error::ReadlineError;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("no more input to parse")]
    EndOfInput,
    #[error("malformed argument near `{0}`")]
    Malformed(String),
    #[error("empty command")]
    EmptyCommand,
    #[error("missing command after `|`")]
    MissingPipeTarget,
}

#[derive(Debug, Error)]
pub enum ShellError {
    #[error("syntax error: {0}")]
    Parse(#[from] ParseError),
    #[error("cannot execute an empty pipeline")]
    EmptyPipeline,
    #[error("argument contains a NUL byte: {0}")]
    Nul(#[from] NulError),
    #[error("{op} failed: {source}")]
    Sys {
        op: &'static str,
        #[source]
        source: Errno,
    },
    #[error("cd: HOME not set")]
    HomeNotSet,
    #[error("cd: {dir}: {source}")]
    ChangeDir {
        dir: String,
        #[source]
        source: io::Error,
    },
    #[error("{0}: unknown internal command")]
    UnknownBuiltin(String),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Readline(#[from] ReadlineError),
}

impl ShellError {
    pub fn sys(op: &'static str, source: Errno) -> Self {
        ShellError::Sys { op, source }
    }
}
