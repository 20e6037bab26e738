use log::debug;
use std::env;
use std::io::{self, Write};

use crate::shell::error::ShellError;
use crate::shell::parser::ast::{Command, Pipeline};

/// 必须在 shell 进程内执行的内建命令
pub const INTERNAL_COMMANDS: [&str; 3] = ["cd", "exit", "help"];

const HELP_TEXT: &str = "\
Internal commands:
  cd [dir]     Change the current directory (defaults to $HOME)
  exit         Exit the shell
  help         Show this help
";

pub fn is_internal(command: &Command) -> bool {
    command
        .front()
        .is_some_and(|name| INTERNAL_COMMANDS.contains(&name))
}

/// 只有单级且为内建命令的管道才在进程内执行，内建命令不参与管道
pub fn is_internal_only(pipeline: &Pipeline) -> bool {
    pipeline.len() == 1 && pipeline.front().is_some_and(is_internal)
}

pub fn run(command: &Command) -> Result<(), ShellError> {
    run_with(command, &mut io::stdout())
}

pub fn run_with<W: Write>(command: &Command, out: &mut W) -> Result<(), ShellError> {
    debug!("执行内建命令: {}", command);
    match command.front() {
        Some("cd") => builtin_cd(command),
        Some("exit") => builtin_exit(),
        Some("help") => builtin_help(out),
        other => Err(ShellError::UnknownBuiltin(
            other.unwrap_or_default().to_string(),
        )),
    }
}

/// 从渲染后的命令文本中取程序名之后的第一个词，遇到第二个空格即截断
fn cd_argument(command: &Command) -> Option<String> {
    let rendered = command.to_string();
    let (_, rest) = rendered.split_once(' ')?;
    let argument = rest.split(' ').next().unwrap_or_default();
    if argument.is_empty() {
        None
    } else {
        Some(argument.to_string())
    }
}

fn cd_target(command: &Command, home: Option<String>) -> Option<String> {
    cd_argument(command).or(home)
}

fn builtin_cd(command: &Command) -> Result<(), ShellError> {
    let dir = cd_target(command, env::var("HOME").ok()).ok_or(ShellError::HomeNotSet)?;
    env::set_current_dir(&dir).map_err(|source| ShellError::ChangeDir {
        dir: dir.clone(),
        source,
    })?;
    debug!("切换目录: {}", dir);
    Ok(())
}

fn builtin_exit() -> Result<(), ShellError> {
    debug!("退出 pipesh...");
    std::process::exit(0);
}

fn builtin_help<W: Write>(out: &mut W) -> Result<(), ShellError> {
    out.write_all(HELP_TEXT.as_bytes())?;
    out.flush()?;
    Ok(())
}

// 修改工作目录的测试需要串行执行
#[cfg(test)]
pub(crate) static CWD_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());
