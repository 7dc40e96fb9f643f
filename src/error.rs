use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// 应用程序错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// 计划模型错误
    #[error("计划错误: {0}")]
    Plan(#[from] PlanError),
    /// 文件协议错误
    #[error("协议错误: {0}")]
    Protocol(#[from] ProtocolError),
    /// 调度器错误
    #[error("调度错误: {0}")]
    Scheduler(#[from] SchedulerError),
    /// 配置错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
    /// 其他错误（用于包装第三方库错误）
    #[error("错误: {0}")]
    Other(String),
}

/// 计划模型错误（不变量被破坏）
#[derive(Debug, Error)]
pub enum PlanError {
    #[error("网格必须是 3 周 × 6 天 × 6 块")]
    InvalidGrid,
    #[error("学生组 {0} 已存在")]
    DuplicateGroup(String),
    #[error("约束组 {0} 已存在")]
    DuplicateConstraint(String),
    #[error("未知的学生组: {0}")]
    UnknownGroup(String),
    #[error("未知的约束组: {0}")]
    UnknownConstraint(String),
    #[error("考试 {0} {1} 已存在")]
    DuplicateModule(String, String),
    #[error("考试 {0} 至少要属于一个学生组")]
    ModuleWithoutGroup(String),
    #[error("未知的考试下标: {0}")]
    UnknownModule(usize),
    #[error("时间块越界: 周 {0}, 天 {1}, 块 {2}")]
    SlotOutOfRange(usize, usize, usize),
}

/// 文件协议错误
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// 工作目录不存在
    #[error("目录不存在: {}", .0.display())]
    DirectoryNotFound(PathBuf),
    /// 文件不存在
    #[error("文件不存在: {}", .0.display())]
    MissingFile(PathBuf),
    /// 读取文件失败
    #[error("读取文件失败 ({}): {source}", path.display())]
    ReadFailed { path: PathBuf, source: io::Error },
    /// 写入文件失败
    #[error("写入文件失败 ({}): {source}", path.display())]
    WriteFailed { path: PathBuf, source: io::Error },
    /// 行格式错误
    #[error("{file} 第 {line} 行格式错误: {reason}")]
    Malformed {
        file: &'static str,
        line: usize,
        reason: String,
    },
    /// 结果文件表头不正确
    #[error("结果文件表头不正确: {0:?}")]
    BadHeader(String),
    #[error("未知的学生组: {0}")]
    UnknownGroup(String),
    #[error("未知的约束组: {0}")]
    UnknownConstraint(String),
    #[error("结果中的考试不在计划中: {number} {name}")]
    UnknownModule { number: String, name: String },
    /// 结果中的天/块超出网格
    #[error("时间块超出范围: 第 {day} 天, 第 {slot} 块")]
    SlotOutOfRange { day: usize, slot: usize },
    /// 字段包含分隔符或换行
    #[error("字段包含非法字符: {0:?}")]
    InvalidField(String),
    /// 字符无法用 Windows-1252 表示
    #[error("字符无法编码为 Windows-1252: {0:?}")]
    Unencodable(char),
    #[error(transparent)]
    Plan(#[from] PlanError),
}

/// 调度器错误
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// 一个调度器实例只能运行一次
    #[error("调度已经启动过")]
    AlreadyStarted,
    /// 准备工作目录失败
    #[error("准备工作目录失败: {0}")]
    Prepare(#[from] ProtocolError),
    /// 启动求解器失败
    #[error("无法启动求解器 {}: {source}", binary.display())]
    Spawn { binary: PathBuf, source: io::Error },
    #[error("求解器 I/O 错误: {0}")]
    Io(#[from] io::Error),
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 读取配置文件失败
    #[error("读取配置文件失败 ({}): {source}", path.display())]
    ReadFailed { path: PathBuf, source: io::Error },
    /// TOML 解析失败
    #[error("TOML解析失败: {0}")]
    TomlParseFailed(#[from] toml::de::Error),
    /// 环境变量解析失败
    #[error("环境变量 {var_name} 解析失败: 值 '{value}' 无法转换为 {expected_type}")]
    EnvVarParseFailed {
        var_name: String,
        value: String,
        expected_type: String,
    },
    /// 配置值无效
    #[error("配置无效: {0}")]
    Invalid(String),
}

// ========== 便捷构造函数 ==========

impl ProtocolError {
    pub(crate) fn read_failed(path: impl Into<PathBuf>, source: io::Error) -> Self {
        ProtocolError::ReadFailed {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn write_failed(path: impl Into<PathBuf>, source: io::Error) -> Self {
        ProtocolError::WriteFailed {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn malformed(file: &'static str, line: usize, reason: impl Into<String>) -> Self {
        ProtocolError::Malformed {
            file,
            line,
            reason: reason.into(),
        }
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;
