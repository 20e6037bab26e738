/// 参数类型
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ArgKind {
    Normal,
    Input,  // < file
    Output, // > file
    Malformed,
}

/// 构建器消费的词法接口。
pub trait TokenSource {
    /// 当前命令的下一个参数；遇到 `|`、`&`、换行或输入结束时返回 `None`。
    fn next_argument(&mut self) -> Option<(String, ArgKind)>;
    fn consume_pipe_operator(&mut self) -> bool;
    fn consume_background_operator(&mut self) -> bool;
    fn skip_blank_separators(&mut self);
    /// 丢弃到行尾（含换行）为止的内容，丢弃了非空白字符时返回 true。
    fn drain_garbage(&mut self) -> bool;
    fn at_end_of_input(&self) -> bool;
}

pub struct Lexer<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn peek_char(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn read_char(&mut self) -> Option<char> {
        let c = self.peek_char()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn is_blank(c: char) -> bool {
        c == ' ' || c == '\t'
    }

    fn is_operator(c: char) -> bool {
        "|&<>\n".contains(c)
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek_char() {
            if !Self::is_blank(c) {
                break;
            }
            self.read_char();
        }
    }

    fn read_word(&mut self) -> String {
        let start = self.pos;
        while let Some(c) = self.peek_char() {
            if Self::is_blank(c) || Self::is_operator(c) {
                break;
            }
            self.read_char();
        }
        self.input[start..self.pos].to_string()
    }

    fn read_redirect(&mut self, kind: ArgKind) -> (String, ArgKind) {
        let operator = self.read_char().unwrap_or_default();
        self.skip_whitespace();
        let target = self.read_word();
        if target.is_empty() {
            (operator.to_string(), ArgKind::Malformed)
        } else {
            (target, kind)
        }
    }

    fn consume_operator(&mut self, operator: char) -> bool {
        self.skip_whitespace();
        if self.peek_char() == Some(operator) {
            self.read_char();
            true
        } else {
            false
        }
    }
}

impl TokenSource for Lexer<'_> {
    fn next_argument(&mut self) -> Option<(String, ArgKind)> {
        self.skip_whitespace();

        match self.peek_char()? {
            '|' | '&' | '\n' => None,
            '<' => Some(self.read_redirect(ArgKind::Input)),
            '>' => Some(self.read_redirect(ArgKind::Output)),
            _ => Some((self.read_word(), ArgKind::Normal)),
        }
    }

    fn consume_pipe_operator(&mut self) -> bool {
        self.consume_operator('|')
    }

    fn consume_background_operator(&mut self) -> bool {
        self.consume_operator('&')
    }

    fn skip_blank_separators(&mut self) {
        self.skip_whitespace();
    }

    fn drain_garbage(&mut self) -> bool {
        let mut found = false;
        while let Some(c) = self.read_char() {
            if c == '\n' {
                break;
            }
            if !Self::is_blank(c) {
                found = true;
            }
        }
        found
    }

    fn at_end_of_input(&self) -> bool {
        self.pos >= self.input.len()
    }
}
