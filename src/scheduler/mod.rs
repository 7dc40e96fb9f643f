//! 调度能力接口
//!
//! ## 职责
//!
//! 定义"一次排考尝试"对外暴露的能力：启动、停止、查询状态、等待结束、
//! 注册监听器。具体实现见 [`external::ExternalScheduler`]。
//!
//! ## 通知约定
//!
//! - `on_progress` 可以在任何时候触发
//! - 每次尝试最多触发一次终止通知（`on_finished` 或 `on_failed`），
//!   并且紧跟在 `on_progress(1.0)` 之后
//! - 成功通知交回调用方传入的同一个 [`SharedPlan`]

pub mod external;
pub mod notifier;

use std::sync::Arc;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::SchedulerError;
use crate::models::SharedPlan;

pub use external::{ExternalScheduler, SolverOptions};
pub use notifier::EventSupport;

/// 快速模式的调度器名称
pub const FAST_SCHEDULER: &str = "legacy-fast";
/// 质量模式的调度器名称
pub const QUALITY_SCHEDULER: &str = "legacy-good";

/// 求解模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchedulingMode {
    Fast,
    Quality,
}

impl SchedulingMode {
    /// 写入求解器 stdin 的交互脚本
    pub fn script(self) -> &'static str {
        match self {
            SchedulingMode::Fast => "jn",
            SchedulingMode::Quality => "jjn",
        }
    }

    pub fn scheduler_name(self) -> &'static str {
        match self {
            SchedulingMode::Fast => FAST_SCHEDULER,
            SchedulingMode::Quality => QUALITY_SCHEDULER,
        }
    }

    /// 由配置中的调度器名称得到模式
    pub fn from_scheduler_name(name: &str) -> Option<Self> {
        match name {
            FAST_SCHEDULER => Some(SchedulingMode::Fast),
            QUALITY_SCHEDULER => Some(SchedulingMode::Quality),
            _ => None,
        }
    }
}

/// 调度状态，只会向前推进
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SchedulingState {
    Idle,
    Preparing,
    Running,
    Succeeded,
    Failed,
}

impl SchedulingState {
    pub fn is_terminal(self) -> bool {
        matches!(self, SchedulingState::Succeeded | SchedulingState::Failed)
    }
}

/// 调度通知监听器，所有方法默认什么都不做
pub trait SchedulerListener: Send + Sync {
    /// 进度，范围 0.0 ~ 1.0
    fn on_progress(&self, _progress: f64) {}

    /// 求解器输出的警告或错误行
    fn on_warning(&self, _message: &str) {}

    /// 排考成功，计划中已写入分配结果
    fn on_finished(&self, _plan: &SharedPlan) {}

    /// 排考失败
    fn on_failed(&self, _reason: &str) {}
}

/// 一次排考尝试
pub trait Scheduler: Send + Sync {
    /// 启动排考，求解器启动后即返回
    fn start_scheduling(&self) -> BoxFuture<'_, Result<(), SchedulerError>>;

    /// 请求停止，可重复调用，不阻塞
    fn stop_scheduling(&self);

    fn state(&self) -> SchedulingState;

    /// 等待进入终止状态
    fn wait(&self) -> BoxFuture<'_, SchedulingState>;

    fn add_listener(&self, listener: Arc<dyn SchedulerListener>);
}

/// 通过通道转发的调度通知
#[derive(Debug, Clone)]
pub enum SchedulerEvent {
    Progress(f64),
    Warning(String),
    Finished(SharedPlan),
    Failed(String),
}

impl SchedulerEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SchedulerEvent::Finished(_) | SchedulerEvent::Failed(_))
    }
}

/// 把通知转发到 tokio 通道的监听器
pub struct ChannelListener {
    tx: mpsc::UnboundedSender<SchedulerEvent>,
}

impl ChannelListener {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<SchedulerEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(Self { tx }), rx)
    }

    fn send(&self, event: SchedulerEvent) {
        // 接收端已关闭时丢弃
        let _ = self.tx.send(event);
    }
}

impl SchedulerListener for ChannelListener {
    fn on_progress(&self, progress: f64) {
        self.send(SchedulerEvent::Progress(progress));
    }

    fn on_warning(&self, message: &str) {
        self.send(SchedulerEvent::Warning(message.to_string()));
    }

    fn on_finished(&self, plan: &SharedPlan) {
        self.send(SchedulerEvent::Finished(plan.clone()));
    }

    fn on_failed(&self, reason: &str) {
        self.send(SchedulerEvent::Failed(reason.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_scripts_and_names() {
        assert_eq!(SchedulingMode::Fast.script(), "jn");
        assert_eq!(SchedulingMode::Quality.script(), "jjn");
        assert_eq!(
            SchedulingMode::from_scheduler_name("legacy-good"),
            Some(SchedulingMode::Quality)
        );
        assert_eq!(
            SchedulingMode::from_scheduler_name(SchedulingMode::Fast.scheduler_name()),
            Some(SchedulingMode::Fast)
        );
        assert_eq!(SchedulingMode::from_scheduler_name("greedy"), None);
    }

    #[test]
    fn test_terminal_states() {
        assert!(!SchedulingState::Running.is_terminal());
        assert!(SchedulingState::Failed.is_terminal());
        assert!(SchedulingState::Succeeded.is_terminal());
    }

    #[tokio::test]
    async fn test_channel_listener_forwards_events() {
        let (listener, mut rx) = ChannelListener::new();
        listener.on_progress(0.5);
        listener.on_warning("WARNUNG x");
        listener.on_failed("kaputt");

        assert!(matches!(rx.recv().await, Some(SchedulerEvent::Progress(p)) if p == 0.5));
        assert!(matches!(rx.recv().await, Some(SchedulerEvent::Warning(w)) if w == "WARNUNG x"));
        let last = rx.recv().await.unwrap();
        assert!(last.is_terminal());
    }
}
