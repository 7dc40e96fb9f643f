use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::Deserialize;
use tracing::debug;

use crate::error::ConfigError;
use crate::scheduler::{SchedulingMode, FAST_SCHEDULER};

/// 指向 TOML 配置文件的环境变量
pub const CONFIG_PATH_ENV: &str = "EXAM_SCHEDULER_CONFIG";

/// 程序配置文件
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// 求解器可执行文件
    pub solver_binary: PathBuf,
    /// 默认调度器（legacy-fast / legacy-good）
    pub default_scheduler: String,
    /// 是否以 info 级别输出求解器日志
    pub print_log: bool,
    /// SIGTERM 之后等待多少秒再强制结束
    pub grace_period_secs: u64,
    /// 停滞计数阈值
    pub stuck_threshold: u32,
    /// 临时工作目录的父目录
    pub working_root: Option<PathBuf>,
    /// 是否显示详细日志
    pub verbose_logging: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            solver_binary: PathBuf::from("/usr/bin/SPA-algorithmus"),
            default_scheduler: FAST_SCHEDULER.to_string(),
            print_log: false,
            grace_period_secs: 5,
            stuck_threshold: 100,
            working_root: None,
            verbose_logging: false,
        }
    }
}

impl Config {
    /// 只从环境变量读取，无法解析的值使用默认值
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            solver_binary: std::env::var("SOLVER_BINARY").map(PathBuf::from).unwrap_or(default.solver_binary),
            default_scheduler: std::env::var("DEFAULT_SCHEDULER").unwrap_or(default.default_scheduler),
            print_log: std::env::var("PRINT_LOG").ok().and_then(|v| v.parse().ok()).unwrap_or(default.print_log),
            grace_period_secs: std::env::var("GRACE_PERIOD_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.grace_period_secs),
            stuck_threshold: std::env::var("STUCK_THRESHOLD").ok().and_then(|v| v.parse().ok()).unwrap_or(default.stuck_threshold),
            working_root: std::env::var("WORKING_ROOT").ok().map(PathBuf::from).or(default.working_root),
            verbose_logging: std::env::var("VERBOSE_LOGGING").ok().and_then(|v| v.parse().ok()).unwrap_or(default.verbose_logging),
        }
    }

    /// 完整加载：可选的 TOML 文件 → 环境变量覆盖 → 校验
    ///
    /// 与 [`Config::from_env`] 不同，无法解析的环境变量会返回错误。
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) => Self::from_file(Path::new(&path))?,
            Err(_) => Self::default(),
        };
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    /// 从 TOML 文件读取，缺省项使用默认值
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        debug!("读取配置文件: {}", path.display());
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFailed {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    fn apply_env(&mut self) -> Result<(), ConfigError> {
        if let Ok(v) = std::env::var("SOLVER_BINARY") {
            self.solver_binary = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("DEFAULT_SCHEDULER") {
            self.default_scheduler = v;
        }
        if let Ok(v) = std::env::var("WORKING_ROOT") {
            self.working_root = Some(PathBuf::from(v));
        }
        if let Some(v) = env_parse("PRINT_LOG", "bool")? {
            self.print_log = v;
        }
        if let Some(v) = env_parse("GRACE_PERIOD_SECS", "u64")? {
            self.grace_period_secs = v;
        }
        if let Some(v) = env_parse("STUCK_THRESHOLD", "u32")? {
            self.stuck_threshold = v;
        }
        if let Some(v) = env_parse("VERBOSE_LOGGING", "bool")? {
            self.verbose_logging = v;
        }
        Ok(())
    }

    /// 检查配置值
    pub fn validate(&self) -> Result<(), ConfigError> {
        if SchedulingMode::from_scheduler_name(&self.default_scheduler).is_none() {
            return Err(ConfigError::Invalid(format!(
                "未知的调度器: {}（可选 legacy-fast / legacy-good）",
                self.default_scheduler
            )));
        }
        if self.solver_binary.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("solver_binary 不能为空".to_string()));
        }
        if self.stuck_threshold == 0 {
            return Err(ConfigError::Invalid("stuck_threshold 必须大于 0".to_string()));
        }
        Ok(())
    }

    /// 默认调度器对应的求解模式
    pub fn default_mode(&self) -> Option<SchedulingMode> {
        SchedulingMode::from_scheduler_name(&self.default_scheduler)
    }
}

fn env_parse<T: FromStr>(var_name: &str, expected_type: &str) -> Result<Option<T>, ConfigError> {
    match std::env::var(var_name) {
        Ok(value) => value
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::EnvVarParseFailed {
                var_name: var_name.to_string(),
                value,
                expected_type: expected_type.to_string(),
            }),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.default_mode(), Some(SchedulingMode::Fast));
        assert_eq!(config.grace_period_secs, 5);
        assert_eq!(config.stuck_threshold, 100);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = Config::from_toml_str(
            r#"
            default_scheduler = "legacy-good"
            print_log = true
            "#,
        )
        .unwrap();
        assert_eq!(config.default_mode(), Some(SchedulingMode::Quality));
        assert!(config.print_log);
        assert_eq!(config.solver_binary, PathBuf::from("/usr/bin/SPA-algorithmus"));
    }

    #[test]
    fn test_invalid_toml() {
        assert!(matches!(
            Config::from_toml_str("grace_period_secs = \"fünf\""),
            Err(ConfigError::TomlParseFailed(_))
        ));
    }

    #[test]
    fn test_unknown_scheduler_is_invalid() {
        let config = Config {
            default_scheduler: "greedy".to_string(),
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_missing_config_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            Config::from_file(&dir.path().join("fehlt.toml")),
            Err(ConfigError::ReadFailed { .. })
        ));
    }
}
