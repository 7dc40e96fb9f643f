//! 日志工具模块
//!
//! 提供日志格式化和输出的辅助函数

use std::path::Path;

use tracing::info;

use crate::config::Config;
use crate::models::Plan;

/// 记录程序启动信息
///
/// # 参数
/// - `config`: 当前配置
pub fn log_startup(config: &Config) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - 外部求解器排考模式");
    info!("🔧 求解器: {}", config.solver_binary.display());
    info!("📋 默认调度器: {}", config.default_scheduler);
    info!("{}", "=".repeat(60));
}

/// 记录计划加载信息
///
/// # 参数
/// - `plan`: 已加载的计划
/// - `path`: 计划文件路径
pub fn log_plan_loaded(plan: &Plan, path: &Path) {
    let excluded = plan.modules().iter().filter(|m| m.is_excluded()).count();
    info!("✓ 已加载计划 {} ({})", plan.name(), path.display());
    info!(
        "📄 考试 {} 个（其中 {} 个不参与求解），学生组 {} 个，约束组 {} 个",
        plan.modules().len(),
        excluded,
        plan.groups().len(),
        plan.constraints().len()
    );
}

/// 打印最终统计信息
///
/// # 参数
/// - `plan`: 排考后的计划
/// - `output_path`: 结果文件路径
pub fn print_final_stats(plan: &Plan, output_path: &Path) {
    let scheduled = plan
        .module_ids()
        .filter(|id| plan.is_scheduled(*id))
        .count();
    let total = plan.modules().len();

    info!("\n{}", "=".repeat(60));
    info!("📊 排考完成统计");
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    info!("✅ 已安排: {}/{}", scheduled, total);
    info!("❌ 未安排: {}", total - scheduled);
    info!("{}", "=".repeat(60));
    info!("\n结果已保存至: {}", output_path.display());
}

/// 打印失败信息
pub fn print_failure(reason: &str) {
    info!("\n{}", "=".repeat(60));
    info!("❌ 排考失败: {}", reason);
    info!("{}", "=".repeat(60));
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大长度
///
/// # 返回
/// 返回截断后的文本
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_text_counts_chars() {
        assert_eq!(truncate_text("Prüfung", 3), "Prü...");
        assert_eq!(truncate_text("kurz", 10), "kurz");
    }
}
