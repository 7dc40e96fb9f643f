//! 求解器进程 - 基础设施层
//!
//! 持有唯一的子进程资源，只暴露"启动 / 读输出 / 终止 / 等待"的能力

use std::io;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use futures::stream::{self, BoxStream, StreamExt};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tracing::{debug, warn};

use crate::error::SchedulerError;
use crate::protocol::encoding;

/// 输出来源
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputChannel {
    Stdout,
    Stderr,
}

/// 求解器输出的一行（已按 Windows-1252 解码，去掉行尾）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLine {
    pub channel: OutputChannel,
    pub text: String,
}

pub type OutputStream = BoxStream<'static, io::Result<OutputLine>>;

const SPAWN_RETRIES: u32 = 5;

/// 求解器进程
///
/// 职责：
/// - 持有唯一的 Child
/// - 合并 stdout / stderr 为一个行流（同一通道内保持顺序）
/// - 不认识 Plan，不解释输出内容
pub struct SolverProcess {
    binary: PathBuf,
    child: Child,
    output: Option<OutputStream>,
}

impl SolverProcess {
    /// 启动 `<binary> -p <workdir> -PP`，把脚本写入 stdin 后关闭
    ///
    /// # 参数
    /// - `binary`: 求解器可执行文件
    /// - `workdir`: 已写好输入文件的工作目录
    /// - `script`: 交互脚本（不带换行）
    pub async fn spawn(binary: &Path, workdir: &Path, script: &str) -> Result<Self, SchedulerError> {
        debug!(
            "启动求解器: {} -p {} -PP",
            binary.display(),
            workdir.display()
        );

        let mut command = Command::new(binary);
        command
            .arg("-p")
            .arg(workdir)
            .arg("-PP")
            .current_dir(workdir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut attempt = 0;
        let mut child = loop {
            match command.spawn() {
                Ok(child) => break child,
                // 可执行文件刚被替换时可能短暂处于 ETXTBSY
                Err(e) if is_text_busy(&e) && attempt < SPAWN_RETRIES => {
                    attempt += 1;
                    tokio::time::sleep(Duration::from_millis(50)).await;
                }
                Err(source) => {
                    return Err(SchedulerError::Spawn {
                        binary: binary.to_path_buf(),
                        source,
                    })
                }
            }
        };

        if let Some(mut stdin) = child.stdin.take() {
            match stdin.write_all(script.as_bytes()).await {
                Ok(()) => {
                    let _ = stdin.shutdown().await;
                }
                // 进程已经退出时管道关闭，交给退出状态处理
                Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {
                    warn!("⚠️ 求解器未读取输入脚本: {}", e);
                }
                Err(e) => return Err(SchedulerError::Io(e)),
            }
        }

        let stdout = child.stdout.take().map(|r| line_stream(r, OutputChannel::Stdout));
        let stderr = child.stderr.take().map(|r| line_stream(r, OutputChannel::Stderr));
        let output = match (stdout, stderr) {
            (Some(out), Some(err)) => stream::select(out, err).boxed(),
            (Some(one), None) | (None, Some(one)) => one,
            (None, None) => stream::empty().boxed(),
        };

        Ok(Self {
            binary: binary.to_path_buf(),
            child,
            output: Some(output),
        })
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    /// 取出合并后的输出流，只能取一次
    pub fn take_output(&mut self) -> OutputStream {
        self.output.take().unwrap_or_else(|| stream::empty().boxed())
    }

    /// 请求进程正常退出（unix 上发送 SIGTERM）
    pub fn terminate(&mut self) {
        let Some(pid) = self.child.id() else {
            return;
        };
        debug!("向求解器 (pid {}) 发送终止信号", pid);

        #[cfg(unix)]
        {
            // SAFETY: pid 来自仍未被回收的子进程
            let rc = unsafe { libc::kill(pid as libc::pid_t, libc::SIGTERM) };
            if rc != 0 {
                warn!("⚠️ 发送 SIGTERM 失败: {}", io::Error::last_os_error());
            }
        }

        #[cfg(not(unix))]
        {
            self.kill();
        }
    }

    /// 强制结束进程，不等待
    pub fn kill(&mut self) {
        if let Err(e) = self.child.start_kill() {
            debug!("强制结束求解器失败: {}", e);
        }
    }

    /// 等待进程退出
    pub async fn wait(&mut self) -> io::Result<ExitStatus> {
        self.child.wait().await
    }
}

#[cfg(unix)]
fn is_text_busy(e: &io::Error) -> bool {
    e.raw_os_error() == Some(libc::ETXTBSY)
}

#[cfg(not(unix))]
fn is_text_busy(_e: &io::Error) -> bool {
    false
}

/// 把一个输出通道转换为行流；遇到读取错误时产出错误并结束
fn line_stream<R>(reader: R, channel: OutputChannel) -> OutputStream
where
    R: AsyncRead + Unpin + Send + 'static,
{
    stream::unfold(Some(BufReader::new(reader)), move |state| async move {
        let mut reader = state?;
        let mut buf = Vec::new();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => None,
            Ok(_) => {
                while matches!(buf.last(), Some(b'\n' | b'\r')) {
                    buf.pop();
                }
                let line = OutputLine {
                    channel,
                    text: encoding::decode(&buf),
                };
                Some((Ok(line), Some(reader)))
            }
            Err(e) => Some((Err(e), None)),
        }
    })
    .boxed()
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_spawn_missing_binary() {
        let dir = tempfile::tempdir().unwrap();
        let result = SolverProcess::spawn(Path::new("/nonexistent/solver"), dir.path(), "jn").await;
        assert!(matches!(result, Err(SchedulerError::Spawn { .. })));
    }

    #[tokio::test]
    async fn test_lines_from_both_channels() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("solver.sh");
        std::fs::write(
            &script,
            "#!/bin/sh\nread -r mode\necho \"out $mode\"\necho \"err $1\" >&2\n",
        )
        .unwrap();
        make_executable(&script);

        let mut process = SolverProcess::spawn(&script, dir.path(), "jjn\n").await.unwrap();
        let mut lines: Vec<OutputLine> = process
            .take_output()
            .map(|l| l.unwrap())
            .collect()
            .await;
        lines.sort_by_key(|l| l.channel == OutputChannel::Stderr);

        assert_eq!(lines[0].text, "out jjn");
        assert_eq!(lines[1].channel, OutputChannel::Stderr);
        assert_eq!(lines[1].text, "err -p");
        assert!(process.wait().await.unwrap().success());
    }

    fn make_executable(path: &Path) {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = std::fs::metadata(path).unwrap().permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(path, perms).unwrap();
    }

    #[tokio::test]
    async fn test_line_stream_decodes_windows_1252() {
        let data: &[u8] = b"Pr\xfcfung\r\nzweite Zeile";
        let lines: Vec<_> = line_stream(data, OutputChannel::Stdout)
            .map(|l| l.unwrap().text)
            .collect()
            .await;
        assert_eq!(lines, vec!["Prüfung", "zweite Zeile"]);
    }
}
