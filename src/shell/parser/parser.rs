use log::debug;

use super::ast::{Command, Pipeline};
use super::lexer::{ArgKind, TokenSource};
use crate::shell::error::ParseError;

pub struct Parser<'s, S: TokenSource> {
    source: &'s mut S,
    garbage: bool,
}

impl<'s, S: TokenSource> Parser<'s, S> {
    pub fn new(source: &'s mut S) -> Self {
        Parser {
            source,
            garbage: false,
        }
    }

    /// 上一次解析结束时是否丢弃了行尾的非空白内容
    pub fn found_garbage(&self) -> bool {
        self.garbage
    }

    /// 解析一条管道直到行尾。
    ///
    /// 无论成功与否都会把词法源推进到下一行开头，失败时已经构建的部分直接丢弃。
    pub fn parse_pipeline(&mut self) -> Result<Pipeline, ParseError> {
        if self.source.at_end_of_input() {
            return Err(ParseError::EndOfInput);
        }

        let mut pipeline = Pipeline::new();
        let mut failure = None;

        match self.parse_command() {
            Ok(command) => {
                pipeline.push_back(command);
                while self.source.consume_pipe_operator() {
                    match self.parse_command() {
                        Ok(command) => pipeline.push_back(command),
                        Err(ParseError::EmptyCommand) => {
                            failure = Some(ParseError::MissingPipeTarget);
                            break;
                        }
                        Err(e) => {
                            failure = Some(e);
                            break;
                        }
                    }
                }
            }
            Err(e) => failure = Some(e),
        }

        // 检查末尾的后台运算符
        let background = self.source.consume_background_operator();
        pipeline.set_wait(!background);

        self.source.skip_blank_separators();
        self.garbage = self.source.drain_garbage();

        match failure {
            Some(e) => {
                debug!("解析失败: {} (garbage: {})", e, self.garbage);
                Err(e)
            }
            None => {
                debug!("解析结果: {}", pipeline);
                Ok(pipeline)
            }
        }
    }

    fn parse_command(&mut self) -> Result<Command, ParseError> {
        let mut command = Command::new();

        while let Some((text, kind)) = self.source.next_argument() {
            match kind {
                ArgKind::Normal => command.push_back(text),
                ArgKind::Input => command.set_redirect_in(Some(text)),
                ArgKind::Output => command.set_redirect_out(Some(text)),
                ArgKind::Malformed => return Err(ParseError::Malformed(text)),
            }
        }

        if command.is_empty() {
            return Err(ParseError::EmptyCommand);
        }
        Ok(command)
    }
}
