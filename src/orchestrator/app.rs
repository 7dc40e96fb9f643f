//! 命令行应用 - 编排层
//!
//! ## 职责
//!
//! 1. **应用初始化**：检查配置，输出启动信息
//! 2. **加载计划**：从 JSON 文件读取 Plan
//! 3. **排考**：用默认调度器运行外部求解器，Ctrl-C 时请求停止
//! 4. **保存结果**：成功时把排考后的计划写回 JSON

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::config::Config;
use crate::models::{load_plan, save_plan, share};
use crate::scheduler::{
    ChannelListener, ExternalScheduler, Scheduler, SchedulerEvent, SolverOptions,
};
use crate::utils::logging::{log_plan_loaded, log_startup, print_failure, print_final_stats};

/// 应用主结构
pub struct App {
    config: Config,
}

impl App {
    /// 初始化应用
    pub async fn initialize(config: Config) -> Result<Self> {
        log_startup(&config);
        config.validate().context("配置无效")?;

        if !config.solver_binary.exists() {
            warn!(
                "⚠️ 求解器不存在: {}，排考将会失败",
                config.solver_binary.display()
            );
        }

        Ok(Self { config })
    }

    /// 运行一次排考
    ///
    /// # 参数
    /// - `plan_path`: 计划 JSON 文件
    /// - `output_path`: 结果文件，默认是 `<plan>.scheduled.json`
    ///
    /// # 返回
    /// 排考成功返回 true
    pub async fn run(&self, plan_path: &Path, output_path: Option<&Path>) -> Result<bool> {
        info!("\n📁 正在加载计划...");
        let plan = load_plan(plan_path).await?;
        log_plan_loaded(&plan, plan_path);

        let mode = self
            .config
            .default_mode()
            .with_context(|| format!("未知的调度器: {}", self.config.default_scheduler))?;

        let scheduler = ExternalScheduler::new(
            share(plan),
            mode,
            SolverOptions::from_config(&self.config),
        );
        let (listener, mut events) = ChannelListener::new();
        scheduler.add_listener(listener);

        let stopper = scheduler.clone();
        let ctrl_c = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("⚠️ 收到 Ctrl-C，正在停止求解器");
                stopper.stop_scheduling();
            }
        });

        // 启动失败时终止通知同样会进入通道
        if let Err(e) = scheduler.start_scheduling().await {
            warn!("⚠️ 启动排考失败: {}", e);
        }

        let outcome = loop {
            match events.recv().await {
                Some(SchedulerEvent::Progress(progress)) => {
                    info!("⏳ 进度: {:.0}%", progress * 100.0);
                }
                Some(SchedulerEvent::Warning(message)) => {
                    warn!("⚠️ {}", message);
                }
                Some(SchedulerEvent::Finished(plan)) => break Ok(plan),
                Some(SchedulerEvent::Failed(reason)) => break Err(reason),
                None => break Err("调度通知通道已关闭".to_string()),
            }
        };
        ctrl_c.abort();

        match outcome {
            Ok(plan) => {
                let plan = plan.lock().await;
                let output = output_path
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| default_output_path(plan_path));
                save_plan(&plan, &output).await?;
                print_final_stats(&plan, &output);
                Ok(true)
            }
            Err(reason) => {
                print_failure(&reason);
                Ok(false)
            }
        }
    }
}

/// `plan.json` → `plan.scheduled.json`
pub fn default_output_path(plan_path: &Path) -> PathBuf {
    let stem = plan_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "plan".to_string());
    plan_path.with_file_name(format!("{}.scheduled.json", stem))
}
