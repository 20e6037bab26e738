//! pipesh：一个小型的管道 shell。
//!
//! 词法器把一行输入切成参数和运算符，构建器据此生成 [`shell::parser::Pipeline`]，
//! 之后交给内建命令或执行器。执行器为每一级 fork 一个子进程并用匿名管道连接。

pub mod shell;
pub mod utils;
