pub mod loaders;
pub mod module;
pub mod plan;

pub use loaders::{load_plan, save_plan};
pub use module::{Group, Module, EXCLUDED_ORIGIN};
pub use plan::{
    Day, ModuleId, Plan, SlotRef, Timeslot, Week, DAYS_PER_WEEK, SLOTS_PER_DAY, TOTAL_SLOTS,
    WEEKS,
};

use std::sync::Arc;
use tokio::sync::Mutex;

/// 调用方与调度器共享的计划
pub type SharedPlan = Arc<Mutex<Plan>>;

/// 包装为共享计划
pub fn share(plan: Plan) -> SharedPlan {
    Arc::new(Mutex::new(plan))
}
