use log::{debug, warn};
use nix::errno::Errno;
use nix::sys::wait::waitpid;
use nix::sys::wait::WaitPidFlag as WF;
use nix::sys::wait::WaitStatus as WS;
use nix::unistd::Pid;

/// 将终止状态转换为 shell 风格的退出码，被信号杀死时为 128 + 信号值
pub fn exit_code(status: WS) -> Option<i32> {
    match status {
        WS::Exited(_, code) => Some(code),
        WS::Signaled(_, sig, _core_dumped) => Some(128 + sig as i32),
        _ => None,
    }
}

#[derive(Debug)]
struct BackgroundPipeline {
    line: String,
    pids: Vec<Pid>,
}

/// 后台管道的回收器。
///
/// 只记录 pid 以便在提示符之前非阻塞地回收僵尸进程，不是作业表。
#[derive(Debug, Default)]
pub struct BackgroundReaper {
    pipelines: Vec<BackgroundPipeline>,
}

impl BackgroundReaper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn track(&mut self, line: String, pids: Vec<Pid>) {
        if pids.is_empty() {
            return;
        }
        debug!("记录后台管道: {} {:?}", line, pids);
        self.pipelines.push(BackgroundPipeline { line, pids });
    }

    /// 尚未回收的后台进程数
    pub fn pending(&self) -> usize {
        self.pipelines.iter().map(|p| p.pids.len()).sum()
    }

    /// 回收已经结束的后台进程，返回所有进程都已结束的管道文本。
    pub fn reap(&mut self) -> Vec<String> {
        for pipeline in self.pipelines.iter_mut() {
            pipeline.pids.retain(|&pid| !Self::try_collect(pid));
        }

        let mut finished = Vec::new();
        self.pipelines.retain_mut(|pipeline| {
            if pipeline.pids.is_empty() {
                debug!("后台管道结束: {}", pipeline.line);
                finished.push(std::mem::take(&mut pipeline.line));
                false
            } else {
                true
            }
        });
        finished
    }

    fn try_collect(pid: Pid) -> bool {
        match waitpid(pid, Some(WF::WNOHANG)) {
            Ok(WS::StillAlive) => false,
            Ok(status) => {
                debug!("回收后台进程 {}: {:?}", pid, exit_code(status));
                true
            }
            Err(Errno::EINTR) => false,
            Err(e) => {
                // ECHILD 等错误说明进程已不属于我们，不再追踪
                warn!("后台进程 {} waitpid 失败: {}", pid, e);
                true
            }
        }
    }
}
