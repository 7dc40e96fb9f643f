use crate::models::plan::Plan;
use anyhow::{Context, Result};
use std::path::Path;
use tokio::fs;

/// 从 JSON 文件加载计划
pub async fn load_plan(json_file_path: &Path) -> Result<Plan> {
    let content = fs::read_to_string(json_file_path)
        .await
        .with_context(|| format!("无法读取计划文件: {}", json_file_path.display()))?;

    let plan: Plan = serde_json::from_str(&content)
        .with_context(|| format!("无法解析计划文件: {}", json_file_path.display()))?;

    tracing::info!(
        "成功加载计划 {}: {} 个考试, {} 个学生组, {} 个约束组",
        plan.name(),
        plan.modules().len(),
        plan.groups().len(),
        plan.constraints().len()
    );

    Ok(plan)
}

/// 将计划写为 JSON 文件
pub async fn save_plan(plan: &Plan, json_file_path: &Path) -> Result<()> {
    let content = serde_json::to_string_pretty(plan).context("无法序列化计划")?;

    fs::write(json_file_path, content)
        .await
        .with_context(|| format!("无法写入计划文件: {}", json_file_path.display()))?;

    Ok(())
}
