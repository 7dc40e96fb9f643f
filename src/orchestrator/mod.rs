//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层把调度能力包装成面向调用方的入口，不包含排考逻辑。
//!
//! ## 模块划分
//!
//! ### `scheduler_service` - 排考服务
//! - 最多持有一次排考尝试
//! - 以 JSON 接收计划和返回结果
//! - 提供可轮询的进度
//!
//! ### `app` - 命令行应用
//! - 加载配置和计划文件
//! - 运行一次排考，转发 Ctrl-C
//! - 输出统计并保存结果
//!
//! ## 层次关系
//!
//! ```text
//! app / scheduler_service
//!     ↓
//! scheduler::ExternalScheduler (一次排考尝试)
//!     ↓
//! services (能力层：输出分类 / 求解器日志)    protocol (文件协议)
//!     ↓
//! infrastructure (基础设施：SolverProcess)
//! ```

pub mod app;
pub mod scheduler_service;

// 重新导出主要类型
pub use app::App;
pub use scheduler_service::{ScheduleResult, SchedulerService};
