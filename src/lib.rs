//! # Exam Scheduler
//!
//! 通过外部求解器（SPA-algorithmus）为考试排定时间的 Rust 应用程序
//!
//! ## 架构设计
//!
//! 本系统采用分层架构：
//!
//! ### ① 模型层（Models）
//! - `models/` - 3 周 × 6 天 × 6 块的考试计划，以及考试、学生组、约束组目录
//! - `Plan` - 只通过保持不变量的方法修改
//!
//! ### ② 文件协议层（Protocol）
//! - `protocol/` - Plan 与求解器 CSV 文件之间的双向转换（Windows-1252）
//! - `PlanCsv` - 绑定一个工作目录，写输入、读结果
//!
//! ### ③ 基础设施层（Infrastructure）
//! - `infrastructure/` - 持有稀缺资源（子进程），只暴露能力
//! - `SolverProcess` - 唯一的 Child owner，提供启动 / 读输出 / 终止 / 等待
//!
//! ### ④ 业务能力层（Services）
//! - `services/` - 描述"我能做什么"，只处理单行输出
//! - `LineClassifier` - 把一行求解器输出归类
//! - `TranscriptWriter` - 写 scheduler.log 能力
//!
//! ### ⑤ 调度层（Scheduler）
//! - `scheduler/` - 一次排考尝试的完整流程和通知约定
//! - `ExternalScheduler` - 准备 → 启动 → 监控 → 读结果 → 唯一一次终止通知
//!
//! ### ⑥ 编排层（Orchestration）
//! - `orchestrator/scheduler_service` - 面向调用方的排考服务（JSON 进出）
//! - `orchestrator/app` - 命令行入口
//!
//! ## 模块结构

pub mod config;
pub mod error;
pub mod infrastructure;
pub mod logger;
pub mod models;
pub mod orchestrator;
pub mod protocol;
pub mod scheduler;
pub mod services;
pub mod utils;

// 重新导出常用类型
pub use config::Config;
pub use error::{AppError, AppResult, ConfigError, PlanError, ProtocolError, SchedulerError};
pub use models::{share, Group, Module, ModuleId, Plan, SharedPlan, SlotRef};
pub use orchestrator::{App, ScheduleResult, SchedulerService};
pub use protocol::PlanCsv;
pub use scheduler::{
    ChannelListener, ExternalScheduler, Scheduler, SchedulerEvent, SchedulerListener,
    SchedulingMode, SchedulingState, SolverOptions,
};
