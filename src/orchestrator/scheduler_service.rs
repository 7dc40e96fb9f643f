//! 排考服务 - 编排层
//!
//! ## 职责
//!
//! 面向外部调用方的薄封装：最多持有一次排考尝试，
//! 以 JSON 接收计划，提供可轮询的进度和结果。

use std::sync::{Arc, Mutex, MutexGuard};

use serde_json::Value;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::error::{AppError, AppResult, ConfigError};
use crate::models::{share, Plan, SharedPlan};
use crate::scheduler::{
    ExternalScheduler, Scheduler, SchedulerListener, SchedulingState, SolverOptions,
};

/// 排考结果
#[derive(Debug, Clone, PartialEq)]
pub enum ScheduleResult {
    /// 尚未开始或仍在运行
    Pending,
    /// 成功，附带排考后的计划 JSON
    Scheduled(Value),
    /// 失败原因
    Failed(String),
}

#[derive(Clone)]
enum Outcome {
    Pending,
    Finished(SharedPlan),
    Failed(String),
}

/// 监听调度器通知并记录进度和结果
struct ServiceState {
    progress: Mutex<f64>,
    outcome: Mutex<Outcome>,
}

impl SchedulerListener for ServiceState {
    fn on_progress(&self, progress: f64) {
        *lock(&self.progress) = progress;
    }

    fn on_warning(&self, message: &str) {
        warn!("⚠️ 求解器警告: {}", message);
    }

    fn on_finished(&self, plan: &SharedPlan) {
        *lock(&self.outcome) = Outcome::Finished(plan.clone());
    }

    fn on_failed(&self, reason: &str) {
        *lock(&self.outcome) = Outcome::Failed(reason.to_string());
    }
}

/// 排考服务
pub struct SchedulerService {
    config: Config,
    state: Arc<ServiceState>,
    scheduler: Mutex<Option<Arc<dyn Scheduler>>>,
}

impl SchedulerService {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            state: Arc::new(ServiceState {
                progress: Mutex::new(0.0),
                outcome: Mutex::new(Outcome::Pending),
            }),
            scheduler: Mutex::new(None),
        }
    }

    /// 以配置中的默认调度器启动排考
    ///
    /// # 返回
    /// 已有尝试、JSON 不是有效计划、调度器名称未知或启动失败时返回 false
    pub async fn start_scheduling(&self, plan_json: Value) -> bool {
        let scheduler = {
            let mut slot = lock(&self.scheduler);
            if slot.is_some() {
                warn!("⚠️ 排考已经启动过，忽略新的请求");
                return false;
            }
            let scheduler: Arc<dyn Scheduler> = match self.build_scheduler(plan_json) {
                Ok(scheduler) => Arc::new(scheduler),
                Err(e) => {
                    error!("❌ 无法创建调度器: {}", e);
                    return false;
                }
            };
            scheduler.add_listener(self.state.clone());
            *slot = Some(scheduler.clone());
            scheduler
        };

        match scheduler.start_scheduling().await {
            Ok(()) => {
                info!("✓ 排考已启动 ({})", self.config.default_scheduler);
                true
            }
            Err(e) => {
                error!("❌ 启动排考失败: {}", e);
                false
            }
        }
    }

    fn build_scheduler(&self, plan_json: Value) -> AppResult<ExternalScheduler> {
        let mode = self.config.default_mode().ok_or_else(|| {
            ConfigError::Invalid(format!("未知的调度器: {}", self.config.default_scheduler))
        })?;
        let plan: Plan = serde_json::from_value(plan_json)
            .map_err(|e| AppError::Other(format!("计划 JSON 无效: {}", e)))?;

        Ok(ExternalScheduler::new(
            share(plan),
            mode,
            SolverOptions::from_config(&self.config),
        ))
    }

    /// 当前进度，终止后为 1.0
    pub fn progress(&self) -> f64 {
        *lock(&self.state.progress)
    }

    /// 当前结果
    pub async fn result(&self) -> ScheduleResult {
        let outcome = lock(&self.state.outcome).clone();
        match outcome {
            Outcome::Pending => ScheduleResult::Pending,
            Outcome::Failed(reason) => ScheduleResult::Failed(reason),
            Outcome::Finished(plan) => {
                let plan = plan.lock().await;
                match serde_json::to_value(&*plan) {
                    Ok(value) => ScheduleResult::Scheduled(value),
                    Err(e) => ScheduleResult::Failed(format!("无法序列化计划: {}", e)),
                }
            }
        }
    }

    /// 请求停止当前尝试
    pub fn stop(&self) {
        let scheduler = lock(&self.scheduler).clone();
        if let Some(scheduler) = scheduler {
            scheduler.stop_scheduling();
        }
    }

    /// 等待当前尝试结束；没有尝试时返回 None
    pub async fn wait(&self) -> Option<SchedulingState> {
        let scheduler = lock(&self.scheduler).clone();
        match scheduler {
            Some(scheduler) => Some(scheduler.wait().await),
            None => None,
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Config {
        Config {
            solver_binary: "/nonexistent/SPA-algorithmus".into(),
            ..Config::default()
        }
    }

    #[tokio::test]
    async fn test_invalid_json_is_rejected() {
        let service = SchedulerService::new(config());
        assert!(!service.start_scheduling(serde_json::json!({"name": 3})).await);
        assert_eq!(service.progress(), 0.0);
        assert_eq!(service.result().await, ScheduleResult::Pending);
        assert_eq!(service.wait().await, None);
    }

    #[tokio::test]
    async fn test_unknown_scheduler_is_rejected() {
        let service = SchedulerService::new(Config {
            default_scheduler: "greedy".to_string(),
            ..config()
        });
        let plan = serde_json::to_value(Plan::new("Sommer")).unwrap();
        assert!(!service.start_scheduling(plan).await);
    }

    #[tokio::test]
    async fn test_spawn_failure_is_reported_once() {
        let service = SchedulerService::new(config());
        let plan = serde_json::to_value(Plan::new("Sommer")).unwrap();

        assert!(!service.start_scheduling(plan.clone()).await);
        assert_eq!(service.wait().await, Some(SchedulingState::Failed));
        assert_eq!(service.progress(), 1.0);
        assert!(matches!(service.result().await, ScheduleResult::Failed(r) if !r.is_empty()));

        // 同一个服务只允许一次尝试
        assert!(!service.start_scheduling(plan).await);
    }
}
