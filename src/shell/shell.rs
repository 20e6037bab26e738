use log::{debug, error, warn};
use std::error::Error;
use std::io::Write;

use crate::shell::builtin;
use crate::shell::error::{ParseError, ShellError};
use crate::shell::executor::{ExecOutcome, Executor};
use crate::shell::parser::{Lexer, Parser, Pipeline, TokenSource};
use crate::shell::readline::{ReadlineError, ReadlineManager};
use crate::utils::config::Config;
use crate::utils::path;
use crate::utils::theme::Theme;

pub struct Shell<'a> {
    theme: Theme,
    readline: ReadlineManager<'a>,
    executor: Executor,
}

impl<'a> Shell<'a> {
    pub fn new(config: &'a Config) -> Result<Self, ShellError> {
        Ok(Self {
            theme: Theme::load_theme(&config.theme),
            readline: ReadlineManager::new(config)?,
            executor: Executor::new(),
        })
    }

    pub fn run(&mut self) -> Result<(), Box<dyn Error>> {
        debug!("初始化 pipesh...");
        self.readline.load_history();

        println!(
            "{}",
            (self.theme.success_style)(self.theme.get_message("welcome"))
        );
        debug!("pipesh 准备就绪...");

        self.run_loop()?;

        debug!("退出 pipesh...");
        Ok(())
    }

    fn run_loop(&mut self) -> Result<(), Box<dyn Error>> {
        loop {
            self.report_finished_background();
            std::io::stdout().flush()?;
            let prompt = (self.theme.prompt_style)(format!(
                "{}:{}> ",
                self.theme.get_message("prompt"),
                path::basename(&path::current_dir())
            ));

            match self.readline.readline(&prompt) {
                Ok(line) => self.handle_input(&line)?,
                Err(err) => match err {
                    ReadlineError::Eof => {
                        warn!("接收到 EOF 信号，退出 pipesh...");
                        let pending = self.executor.pending_background();
                        if pending > 0 {
                            warn!("仍有 {} 条后台管道未结束", pending);
                        }
                        println!(
                            "{}",
                            (self.theme.warning_style)(self.theme.get_message("eof_signal"))
                        );
                        break;
                    }
                    ReadlineError::Interrupted => {
                        debug!("接收到中断信号...");
                    }
                    err => {
                        error!("发生错误: {}", err);
                        report_error(&self.theme, &err);
                    }
                },
            }
        }
        Ok(())
    }

    fn handle_input(&mut self, line: &str) -> Result<(), Box<dyn Error>> {
        if line.trim().is_empty() {
            return Ok(());
        }
        self.readline.add_history(line)?;

        let theme = &self.theme;
        interpret(line, &mut self.executor, |handled, garbage| {
            report(theme, handled, garbage)
        });
        Ok(())
    }

    fn report_finished_background(&mut self) {
        for line in self.executor.reap_background() {
            println!(
                "{} {}",
                (self.theme.success_style)(self.theme.get_message("background_done")),
                line
            );
        }
    }
}

/// 一条管道的去向及结果
#[derive(Debug)]
enum Handled {
    /// 单级内建命令，在 shell 进程内执行
    Builtin(Result<(), ShellError>),
    Engine(Result<ExecOutcome, ShellError>),
    Rejected(ParseError),
    /// 解析失败且行尾带有无法识别的内容
    Unrecognized,
}

/// 逐条解析一行输入并交给内建命令或执行器，每条管道的结果交给 `report`
fn interpret<F>(line: &str, executor: &mut Executor, mut report: F)
where
    F: FnMut(Handled, bool),
{
    let mut lexer = Lexer::new(line);
    while !lexer.at_end_of_input() {
        let mut parser = Parser::new(&mut lexer);
        let parsed = parser.parse_pipeline();
        let garbage = parser.found_garbage();

        let handled = match parsed {
            Ok(pipeline) => dispatch(pipeline, executor),
            Err(_) if garbage => Handled::Unrecognized,
            Err(e) => Handled::Rejected(e),
        };
        report(handled, garbage);
    }
}

/// 管道的所有权在这里转交给内建命令或执行器，之后被销毁
fn dispatch(pipeline: Pipeline, executor: &mut Executor) -> Handled {
    if builtin::is_internal_only(&pipeline) {
        return Handled::Builtin(pipeline.front().map_or(Ok(()), builtin::run));
    }
    Handled::Engine(executor.execute(pipeline))
}

fn report(theme: &Theme, handled: Handled, garbage: bool) {
    if garbage && matches!(handled, Handled::Builtin(_) | Handled::Engine(_)) {
        report_warning(theme, theme.get_message("garbage"));
    }

    match handled {
        Handled::Builtin(Ok(())) => {}
        Handled::Engine(Ok(ExecOutcome::Completed(status))) => {
            debug!("前台管道退出码: {:?}", status);
        }
        Handled::Engine(Ok(ExecOutcome::Background(pids))) => {
            if let Some(pid) = pids.last() {
                println!("[{}]", pid);
            }
        }
        Handled::Builtin(Err(e)) => report_error(theme, &e),
        Handled::Engine(Err(e)) => {
            error!("执行失败: {}", e);
            report_error(theme, &e);
        }
        Handled::Rejected(e) => report_error(theme, &e),
        Handled::Unrecognized => report_warning(theme, theme.get_message("unrecognized")),
    }
}

fn report_warning(theme: &Theme, message: String) {
    eprintln!("{}", (theme.warning_style)(message));
}

fn report_error(theme: &Theme, err: &dyn std::fmt::Display) {
    eprintln!(
        "{} {}",
        (theme.error_style)(theme.get_message("error_symbol")),
        (theme.error_style)(format!("{}: {}", theme.get_message("error"), err))
    );
}
