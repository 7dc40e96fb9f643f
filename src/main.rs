use std::path::PathBuf;

use anyhow::{Context, Result};
use exam_scheduler::{logger, App, Config};

#[tokio::main]
async fn main() -> Result<()> {
    // 加载配置
    let config = Config::load().context("加载配置失败")?;

    // 初始化日志
    logger::init_with_verbose(config.verbose_logging);

    let mut args = std::env::args_os().skip(1);
    let plan_path = args
        .next()
        .map(PathBuf::from)
        .context("用法: exam-scheduler <plan.json> [output.json]")?;
    let output_path = args.next().map(PathBuf::from);

    // 初始化并运行应用
    let app = App::initialize(config).await?;
    let scheduled = app.run(&plan_path, output_path.as_deref()).await?;

    if !scheduled {
        std::process::exit(1);
    }
    Ok(())
}
