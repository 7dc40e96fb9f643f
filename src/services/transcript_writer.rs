//! 求解器日志写入服务 - 业务能力层
//!
//! 只负责"写 scheduler.log"能力，不关心流程

use std::io;
use std::path::{Path, PathBuf};

use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

/// 求解器日志文件名
pub const TRANSCRIPT_FILE: &str = "scheduler.log";

/// 求解器日志写入服务
///
/// 职责：
/// - 把求解器的每一行输出追加到工作目录下的 scheduler.log
/// - 首次写入时打开文件并写入带时间的表头
/// - 写入失败只记录一次警告，不影响调度
pub struct TranscriptWriter {
    path: PathBuf,
    file: Option<File>,
    broken: bool,
}

impl TranscriptWriter {
    /// 在工作目录下创建
    pub fn new(workdir: &Path) -> Self {
        Self::with_path(workdir.join(TRANSCRIPT_FILE))
    }

    /// 使用自定义文件路径创建
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            file: None,
            broken: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 追加一行
    pub async fn write(&mut self, line: &str) {
        if self.broken {
            return;
        }
        if let Err(e) = self.append(line).await {
            warn!("⚠️ 无法写入求解器日志 {}: {}", self.path.display(), e);
            self.broken = true;
            self.file = None;
        }
    }

    async fn append(&mut self, line: &str) -> io::Result<()> {
        if self.file.is_none() {
            self.file = Some(self.open().await?);
        }
        if let Some(file) = self.file.as_mut() {
            file.write_all(line.as_bytes()).await?;
            file.write_all(b"\n").await?;
        }
        Ok(())
    }

    async fn open(&self) -> io::Result<File> {
        debug!("打开求解器日志: {}", self.path.display());
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        let header = format!(
            "{}\n求解器日志 - {}\n{}\n",
            "=".repeat(60),
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
            "=".repeat(60)
        );
        file.write_all(header.as_bytes()).await?;
        Ok(file)
    }

    /// 把缓冲内容刷到磁盘
    pub async fn flush(&mut self) {
        if let Some(file) = self.file.as_mut() {
            if let Err(e) = file.flush().await {
                warn!("⚠️ 刷新求解器日志失败: {}", e);
            }
        }
    }
}
