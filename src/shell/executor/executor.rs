use std::ffi::{CStr, CString};
use std::io;
use std::os::fd::{AsFd, IntoRawFd, OwnedFd, RawFd};

use log::{debug, warn};
use nix::errno::Errno;
use nix::fcntl::{self, FcntlArg, FdFlag, OFlag};
use nix::sys::stat::Mode;
use nix::sys::wait::waitpid;
use nix::unistd::{self, ForkResult, Pid};

use super::reaper::{exit_code, BackgroundReaper};
use crate::shell::error::{ParseError, ShellError};
use crate::shell::parser::ast::{Command, Pipeline};

// 子进程在 exec 之前失败时的退出码
const EXIT_REDIRECT_FAILED: i32 = 1;
const EXIT_NOT_EXECUTABLE: i32 = 126;
const EXIT_NOT_FOUND: i32 = 127;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecOutcome {
    /// 前台管道结束，携带最后一级的退出码
    Completed(Option<i32>),
    /// 后台管道已启动，携带各级的 pid
    Background(Vec<Pid>),
}

/// fork 之前在父进程中准备好的一级命令，子进程里不再分配内存
struct Stage {
    program: CString,
    argv: Vec<CString>,
    redirect_in: Option<CString>,
    redirect_out: Option<CString>,
}

impl Stage {
    fn prepare(mut command: Command) -> Result<Self, ShellError> {
        let redirect_in = command.redirect_in().map(CString::new).transpose()?;
        let redirect_out = command.redirect_out().map(CString::new).transpose()?;

        let mut argv = Vec::with_capacity(command.len());
        while let Some(argument) = command.pop_front() {
            argv.push(CString::new(argument)?);
        }
        let program = argv.first().cloned().ok_or(ParseError::EmptyCommand)?;

        Ok(Stage {
            program,
            argv,
            redirect_in,
            redirect_out,
        })
    }
}

pub struct Executor {
    reaper: BackgroundReaper,
}

impl Default for Executor {
    fn default() -> Self {
        Self::new()
    }
}

impl Executor {
    pub fn new() -> Self {
        Self {
            reaper: BackgroundReaper::new(),
        }
    }

    /// 执行一条管道，管道在此被消费。
    ///
    /// 每一级对应一个子进程，相邻两级之间由匿名管道连接。等待标志为真时
    /// 阻塞到所有子进程结束；否则立即返回，子进程交给后台回收器。
    pub fn execute(&mut self, mut pipeline: Pipeline) -> Result<ExecOutcome, ShellError> {
        if pipeline.is_empty() {
            return Err(ShellError::EmptyPipeline);
        }

        let line = pipeline.to_string();
        let wait = pipeline.should_wait();
        let mut children = Vec::with_capacity(pipeline.len());
        debug!("执行管道: {}", line);

        // 中途失败时已经启动的子进程仍需等待或回收
        let spawned = Self::spawn_stages(&mut pipeline, &mut children);

        if wait {
            let status = Self::wait_all(&children);
            spawned?;
            debug!("管道结束: {} -> {:?}", line, status);
            Ok(ExecOutcome::Completed(status))
        } else {
            self.reaper.track(line, children.clone());
            spawned?;
            Ok(ExecOutcome::Background(children))
        }
    }

    /// 回收已经结束的后台管道，返回结束的管道文本
    pub fn reap_background(&mut self) -> Vec<String> {
        self.reaper.reap()
    }

    pub fn pending_background(&self) -> usize {
        self.reaper.pending()
    }

    fn spawn_stages(pipeline: &mut Pipeline, children: &mut Vec<Pid>) -> Result<(), ShellError> {
        let total = pipeline.len();
        // 上一级管道的读端，作为本级的标准输入
        let mut upstream: Option<OwnedFd> = None;
        let mut index = 0;

        while let Some(command) = pipeline.pop_front() {
            let stage = Stage::prepare(command)?;
            let is_last = pipeline.is_empty();
            let pipe = if is_last { None } else { Some(cloexec_pipe()?) };

            // SAFETY: 子进程只做 dup2/open/close/execvp/write/_exit
            match unsafe { unistd::fork() }.map_err(|e| ShellError::sys("fork", e))? {
                ForkResult::Child => {
                    let downstream = pipe.map(|(read, write)| {
                        drop(read);
                        write
                    });
                    exec_stage(&stage, upstream, downstream)
                }
                ForkResult::Parent { child } => {
                    debug!(
                        "启动第 {}/{} 级 pid={}: {:?}",
                        index + 1,
                        total,
                        child,
                        stage.program
                    );
                    children.push(child);
                    // 写端已交给子进程，旧的读端也已被复制，这里一并关闭
                    upstream = pipe.map(|(read, _write)| read);
                }
            }
            index += 1;
        }
        Ok(())
    }

    /// 逐个等待子进程，返回最后一级的退出码
    fn wait_all(children: &[Pid]) -> Option<i32> {
        let mut last_status = None;
        for (i, &pid) in children.iter().enumerate() {
            loop {
                match waitpid(pid, None) {
                    Ok(status) => {
                        if i + 1 == children.len() {
                            last_status = exit_code(status);
                        }
                        break;
                    }
                    Err(Errno::EINTR) => continue,
                    Err(e) => {
                        warn!("等待子进程 {} 失败: {}", pid, e);
                        break;
                    }
                }
            }
        }
        last_status
    }
}

fn cloexec_pipe() -> Result<(OwnedFd, OwnedFd), ShellError> {
    unistd::pipe2(OFlag::O_CLOEXEC).map_err(|e| ShellError::sys("pipe", e))
}

/// 子进程：接好管道和重定向后替换进程映像，永不返回
fn exec_stage(stage: &Stage, upstream: Option<OwnedFd>, downstream: Option<OwnedFd>) -> ! {
    if let Err(errno) = wire_pipes(upstream, downstream) {
        child_fail(b"dup2", errno, EXIT_REDIRECT_FAILED);
    }

    // 显式重定向在管道之后应用，因此优先于管道
    if let Some(path) = &stage.redirect_in {
        if let Err(errno) = redirect(path, OFlag::O_RDONLY, libc::STDIN_FILENO) {
            child_fail(path.to_bytes(), errno, EXIT_REDIRECT_FAILED);
        }
    }
    if let Some(path) = &stage.redirect_out {
        let flags = OFlag::O_WRONLY | OFlag::O_CREAT | OFlag::O_TRUNC;
        if let Err(errno) = redirect(path, flags, libc::STDOUT_FILENO) {
            child_fail(path.to_bytes(), errno, EXIT_REDIRECT_FAILED);
        }
    }

    let errno = match unistd::execvp(&stage.program, &stage.argv) {
        Ok(never) => match never {},
        Err(e) => e,
    };
    let code = if errno == Errno::ENOENT {
        EXIT_NOT_FOUND
    } else {
        EXIT_NOT_EXECUTABLE
    };
    child_fail(stage.program.to_bytes(), errno, code)
}

fn wire_pipes(upstream: Option<OwnedFd>, downstream: Option<OwnedFd>) -> nix::Result<()> {
    if let Some(fd) = upstream {
        install(fd.into_raw_fd(), libc::STDIN_FILENO)?;
    }
    if let Some(fd) = downstream {
        install(fd.into_raw_fd(), libc::STDOUT_FILENO)?;
    }
    Ok(())
}

fn redirect(path: &CStr, flags: OFlag, target: RawFd) -> nix::Result<()> {
    let fd = fcntl::open(path, flags | OFlag::O_CLOEXEC, Mode::from_bits_truncate(0o666))?;
    install(fd, target)
}

/// 把 fd 放到 target 上并关闭原 fd。
///
/// target 原本是关闭的时候 fd 可能恰好就是 target，此时不能关闭，只清掉 CLOEXEC。
fn install(fd: RawFd, target: RawFd) -> nix::Result<()> {
    if fd == target {
        return fcntl::fcntl(fd, FcntlArg::F_SETFD(FdFlag::empty())).map(drop);
    }
    let result = unistd::dup2(fd, target).map(drop);
    let _ = unistd::close(fd);
    result
}

fn child_fail(subject: &[u8], errno: Errno, code: i32) -> ! {
    let stderr = io::stderr();
    let parts: [&[u8]; 4] = [subject, b": ", errno.desc().as_bytes(), b"\n"];
    for part in parts {
        let _ = unistd::write(stderr.as_fd(), part);
    }
    // SAFETY: 不执行父进程注册的退出处理，也不刷新继承来的缓冲区
    unsafe { libc::_exit(code) }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path;
    use std::time::{Duration, Instant};

    use nix::sys::signal::{kill, Signal};

    use super::*;
    use crate::shell::parser::{Lexer, Parser};

    #[allow(clippy::unwrap_used)]
    fn parse(line: &str) -> Pipeline {
        let mut lexer = Lexer::new(line);
        Parser::new(&mut lexer).parse_pipeline().unwrap()
    }

    fn path_str(path: &Path) -> &str {
        path.to_str().unwrap_or_default()
    }

    #[allow(clippy::unwrap_used)]
    #[test]
    fn test_echo_pipe_wc() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("count.txt");
        let pipeline = parse(&format!("echo hello | wc -w > {}", path_str(&out)));
        assert_eq!(pipeline.len(), 2);
        assert!(pipeline.should_wait());

        let outcome = Executor::new().execute(pipeline).unwrap();
        assert_eq!(outcome, ExecOutcome::Completed(Some(0)));
        assert_eq!(fs::read_to_string(&out).unwrap().trim(), "1");
    }

    #[allow(clippy::unwrap_used)]
    #[test]
    fn test_cat_with_redirections() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.txt");
        let output = dir.path().join("out.txt");
        fs::write(&input, "line one\nline two\n").unwrap();

        let pipeline = parse(&format!(
            "cat < {} > {}",
            path_str(&input),
            path_str(&output)
        ));
        assert_eq!(pipeline.len(), 1);

        let outcome = Executor::new().execute(pipeline).unwrap();
        assert_eq!(outcome, ExecOutcome::Completed(Some(0)));
        assert_eq!(fs::read_to_string(&output).unwrap(), "line one\nline two\n");
    }

    #[allow(clippy::unwrap_used)]
    #[test]
    fn test_three_stage_pipeline() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("words.txt");
        let output = dir.path().join("sorted.txt");
        fs::write(&input, "pear\napple\npear\nfig\n").unwrap();

        let pipeline = parse(&format!(
            "cat {} | sort | uniq > {}",
            path_str(&input),
            path_str(&output)
        ));
        Executor::new().execute(pipeline).unwrap();
        assert_eq!(fs::read_to_string(&output).unwrap(), "apple\nfig\npear\n");
    }

    #[allow(clippy::unwrap_used)]
    #[test]
    fn test_file_redirect_overrides_pipe() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("first.txt");
        let second = dir.path().join("second.txt");

        let pipeline = parse(&format!(
            "echo hi > {} | cat > {}",
            path_str(&first),
            path_str(&second)
        ));
        Executor::new().execute(pipeline).unwrap();
        assert_eq!(fs::read_to_string(&first).unwrap(), "hi\n");
        assert_eq!(fs::read_to_string(&second).unwrap(), "");
    }

    #[allow(clippy::unwrap_used)]
    #[test]
    fn test_background_returns_immediately() {
        let mut executor = Executor::new();
        let start = Instant::now();
        let outcome = executor.execute(parse("sleep 5 &")).unwrap();
        assert!(start.elapsed() < Duration::from_secs(3));

        let pids = match outcome {
            ExecOutcome::Background(pids) => pids,
            other => panic!("expected background outcome, got {:?}", other),
        };
        assert_eq!(pids.len(), 1);
        assert_eq!(executor.pending_background(), 1);

        for pid in pids {
            kill(pid, Signal::SIGKILL).unwrap();
        }
        let mut finished = Vec::new();
        for _ in 0..200 {
            finished = executor.reap_background();
            if !finished.is_empty() {
                break;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(finished, vec!["sleep 5 &".to_string()]);
        assert_eq!(executor.pending_background(), 0);
    }

    #[allow(clippy::unwrap_used)]
    #[test]
    fn test_missing_program_fails_child_only() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out.txt");
        let pipeline = parse(&format!(
            "pipesh-no-such-program-42 | wc -l > {}",
            path_str(&out)
        ));

        let outcome = Executor::new().execute(pipeline).unwrap();
        // 后一级照常运行，只是读到空输入
        assert_eq!(outcome, ExecOutcome::Completed(Some(0)));
        assert_eq!(fs::read_to_string(&out).unwrap().trim(), "0");

        let outcome = Executor::new()
            .execute(parse("pipesh-no-such-program-42"))
            .unwrap();
        assert_eq!(outcome, ExecOutcome::Completed(Some(EXIT_NOT_FOUND)));
    }

    #[allow(clippy::unwrap_used)]
    #[test]
    fn test_missing_input_file_fails_child_only() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.txt");
        let pipeline = parse(&format!("cat < {}", path_str(&missing)));

        let outcome = Executor::new().execute(pipeline).unwrap();
        assert_eq!(outcome, ExecOutcome::Completed(Some(EXIT_REDIRECT_FAILED)));
    }

    #[allow(clippy::unwrap_used)]
    #[test]
    fn test_unwritable_output_fails_child_only() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing").join("dir").join("f");
        let count = dir.path().join("n");

        let outcome = Executor::new()
            .execute(parse(&format!("echo hi > {}", path_str(&missing))))
            .unwrap();
        assert_eq!(outcome, ExecOutcome::Completed(Some(EXIT_REDIRECT_FAILED)));

        let outcome = Executor::new()
            .execute(parse(&format!(
                "echo hi > {} | wc -l > {}",
                path_str(&missing),
                path_str(&count)
            )))
            .unwrap();
        assert_eq!(outcome, ExecOutcome::Completed(Some(0)));
        assert_eq!(fs::read_to_string(&count).unwrap().trim(), "0");
        assert!(!missing.exists());
    }

    /// 在关闭了 fd 的子进程里执行一行命令，返回其退出码
    #[allow(clippy::unwrap_used)]
    fn execute_with_closed_fd(fd: RawFd, line: &str) -> i32 {
        let pipeline = parse(line);
        match unsafe { unistd::fork() }.unwrap() {
            ForkResult::Child => {
                let _ = unistd::close(fd);
                let code = match Executor::new().execute(pipeline) {
                    Ok(ExecOutcome::Completed(Some(code))) => code,
                    _ => 99,
                };
                unsafe { libc::_exit(code) }
            }
            ForkResult::Parent { child } => match waitpid(child, None).unwrap() {
                nix::sys::wait::WaitStatus::Exited(_, code) => code,
                other => panic!("unexpected status {:?}", other),
            },
        }
    }

    #[allow(clippy::unwrap_used)]
    #[test]
    fn test_redirect_into_closed_stdout() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("o.txt");
        let piped = dir.path().join("p.txt");

        let code = execute_with_closed_fd(
            libc::STDOUT_FILENO,
            &format!("echo hi > {}", path_str(&out)),
        );
        assert_eq!(code, 0);
        assert_eq!(fs::read_to_string(&out).unwrap(), "hi\n");

        let code = execute_with_closed_fd(
            libc::STDOUT_FILENO,
            &format!("echo hi | cat > {}", path_str(&piped)),
        );
        assert_eq!(code, 0);
        assert_eq!(fs::read_to_string(&piped).unwrap(), "hi\n");
    }

    #[allow(clippy::unwrap_used)]
    #[test]
    fn test_pipe_and_redirect_with_closed_stdin() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.txt");
        let out = dir.path().join("out.txt");
        let piped = dir.path().join("piped.txt");
        fs::write(&input, "from file\n").unwrap();

        let code = execute_with_closed_fd(
            libc::STDIN_FILENO,
            &format!("cat < {} > {}", path_str(&input), path_str(&out)),
        );
        assert_eq!(code, 0);
        assert_eq!(fs::read_to_string(&out).unwrap(), "from file\n");

        let code = execute_with_closed_fd(
            libc::STDIN_FILENO,
            &format!("echo hi | cat > {}", path_str(&piped)),
        );
        assert_eq!(code, 0);
        assert_eq!(fs::read_to_string(&piped).unwrap(), "hi\n");
    }

    #[allow(clippy::unwrap_used)]
    #[test]
    fn test_last_stage_status_is_reported() {
        let outcome = Executor::new().execute(parse("true | false")).unwrap();
        assert_eq!(outcome, ExecOutcome::Completed(Some(1)));
    }

    #[test]
    fn test_empty_pipeline_is_rejected() {
        let result = Executor::new().execute(Pipeline::new());
        assert!(matches!(result, Err(ShellError::EmptyPipeline)));
    }

    #[test]
    fn test_nul_byte_is_rejected_before_fork() {
        let mut command = Command::new();
        command.push_back("echo");
        command.push_back("a\0b");
        let mut pipeline = Pipeline::new();
        pipeline.push_back(command);

        let result = Executor::new().execute(pipeline);
        assert!(matches!(result, Err(ShellError::Nul(_))));
    }
}
