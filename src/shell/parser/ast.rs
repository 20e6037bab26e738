use std::collections::VecDeque;
use std::fmt;

/// 一条简单命令：参数列表（下标 0 为程序名）以及可选的输入/输出重定向。
///
/// 空参数列表是合法的中间状态，但永远不会交给执行器，构建器必须拒绝它。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Command {
    arguments: VecDeque<String>,
    redirect_in: Option<String>,
    redirect_out: Option<String>,
}

impl Command {
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加一个参数到末尾，参数所有权转移给命令。
    pub fn push_back(&mut self, argument: impl Into<String>) {
        self.arguments.push_back(argument.into());
    }

    /// 设置输入重定向，`None` 表示清除。
    pub fn set_redirect_in(&mut self, path: Option<String>) {
        self.redirect_in = path;
    }

    /// 设置输出重定向，`None` 表示清除。
    pub fn set_redirect_out(&mut self, path: Option<String>) {
        self.redirect_out = path;
    }

    pub fn redirect_in(&self) -> Option<&str> {
        self.redirect_in.as_deref()
    }

    pub fn redirect_out(&self) -> Option<&str> {
        self.redirect_out.as_deref()
    }

    pub fn len(&self) -> usize {
        self.arguments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arguments.is_empty()
    }

    /// 第一个参数（程序名），不移除。
    pub fn front(&self) -> Option<&str> {
        self.arguments.front().map(String::as_str)
    }

    /// 移除并返回第一个参数。
    pub fn pop_front(&mut self) -> Option<String> {
        self.arguments.pop_front()
    }

    pub fn arguments(&self) -> impl Iterator<Item = &str> {
        self.arguments.iter().map(String::as_str)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, argument) in self.arguments().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            f.write_str(argument)?;
        }
        if let Some(path) = &self.redirect_in {
            write!(f, " < {}", path)?;
        }
        if let Some(path) = &self.redirect_out {
            write!(f, " > {}", path)?;
        }
        Ok(())
    }
}

/// 由管道连接的命令序列。
///
/// 内部保存的标志含义是"是否等待"：默认为 `true`，后台运行是它的取反。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pipeline {
    stages: VecDeque<Command>,
    wait: bool,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self {
            stages: VecDeque::new(),
            wait: true,
        }
    }
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_back(&mut self, command: Command) {
        self.stages.push_back(command);
    }

    /// 移除第一级命令。调用方丢弃返回值即销毁该命令。
    pub fn pop_front(&mut self) -> Option<Command> {
        self.stages.pop_front()
    }

    pub fn set_wait(&mut self, wait: bool) {
        self.wait = wait;
    }

    pub fn should_wait(&self) -> bool {
        self.wait
    }

    pub fn is_background(&self) -> bool {
        !self.wait
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn front(&self) -> Option<&Command> {
        self.stages.front()
    }

    pub fn stages(&self) -> impl Iterator<Item = &Command> {
        self.stages.iter()
    }
}

impl fmt::Display for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, stage) in self.stages().enumerate() {
            if i > 0 {
                f.write_str(" | ")?;
            }
            write!(f, "{}", stage)?;
        }
        if !self.stages.is_empty() && !self.wait {
            f.write_str(" &")?;
        }
        Ok(())
    }
}
