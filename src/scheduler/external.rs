//! 外部求解器调度
//!
//! ## 职责
//!
//! [`ExternalScheduler`] 负责一次完整的排考尝试：
//!
//! 1. 在工作目录中写出求解器输入
//! 2. 启动求解器并写入模式脚本
//! 3. 持续读取并分类输出（进度、警告、错误、停滞、结果目录）
//! 4. 进程退出后检查退出状态，必要时移动结果目录，再读回排考结果
//! 5. 发出且只发出一次终止通知
//!
//! 一个实例只对应一次尝试，状态不会回到 `Idle`。

use std::io;
use std::path::PathBuf;
use std::process::ExitStatus;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use futures::StreamExt;
use tokio::sync::Notify;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::error::{ProtocolError, SchedulerError};
use crate::infrastructure::{OutputLine, SolverProcess};
use crate::models::SharedPlan;
use crate::protocol::PlanCsv;
use crate::scheduler::{
    EventSupport, Scheduler, SchedulerListener, SchedulingMode, SchedulingState,
};
use crate::services::output_classifier::BASE_PROGRESS;
use crate::services::{progress_from_objective, LineClass, LineClassifier, TranscriptWriter};
use crate::utils::logging::truncate_text;

/// 进程退出后继续读取剩余输出的最长时间
const DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// 求解器运行参数
#[derive(Debug, Clone)]
pub struct SolverOptions {
    /// 求解器可执行文件
    pub binary: PathBuf,
    /// 是否以 info 级别输出求解器日志
    pub print_log: bool,
    /// SIGTERM 之后等待多久再强制结束
    pub grace_period: Duration,
    /// 停滞计数达到该值时终止求解器
    pub stuck_threshold: u32,
    /// 临时工作目录的父目录，None 表示系统临时目录
    pub working_root: Option<PathBuf>,
    /// 固定的工作目录（必须已存在，不会被删除）
    pub workdir: Option<PathBuf>,
}

impl SolverOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            binary: config.solver_binary.clone(),
            print_log: config.print_log,
            grace_period: Duration::from_secs(config.grace_period_secs),
            stuck_threshold: config.stuck_threshold,
            working_root: config.working_root.clone(),
            workdir: None,
        }
    }

    pub fn with_binary(mut self, binary: impl Into<PathBuf>) -> Self {
        self.binary = binary.into();
        self
    }

    pub fn with_workdir(mut self, workdir: impl Into<PathBuf>) -> Self {
        self.workdir = Some(workdir.into());
        self
    }

    pub fn with_grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = grace_period;
        self
    }
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// 调用外部求解器的调度器
#[derive(Clone)]
pub struct ExternalScheduler {
    inner: Arc<Inner>,
}

struct Inner {
    plan: SharedPlan,
    mode: SchedulingMode,
    options: SolverOptions,
    events: EventSupport,
    started: AtomicBool,
    stop_requested: AtomicBool,
    stop: Notify,
}

impl ExternalScheduler {
    pub fn new(plan: SharedPlan, mode: SchedulingMode, options: SolverOptions) -> Self {
        Self {
            inner: Arc::new(Inner {
                plan,
                mode,
                options,
                events: EventSupport::new(),
                started: AtomicBool::new(false),
                stop_requested: AtomicBool::new(false),
                stop: Notify::new(),
            }),
        }
    }

    pub fn plan(&self) -> &SharedPlan {
        &self.inner.plan
    }

    pub fn mode(&self) -> SchedulingMode {
        self.inner.mode
    }

    async fn start(&self) -> Result<(), SchedulerError> {
        let inner = &self.inner;
        if inner
            .started
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(SchedulerError::AlreadyStarted);
        }

        info!("🚀 开始排考 ({})", inner.mode.scheduler_name());
        inner.events.progress(0.0);
        inner.events.set_state(SchedulingState::Preparing);

        let csv = match inner.prepare().await {
            Ok(csv) => csv,
            Err(e) => {
                let e = SchedulerError::Prepare(e);
                error!("❌ {}", e);
                inner.events.fail(&e.to_string());
                return Err(e);
            }
        };

        let process =
            match SolverProcess::spawn(&inner.options.binary, csv.path(), inner.mode.script())
                .await
            {
                Ok(process) => process,
                Err(e) => {
                    error!("❌ {}", e);
                    inner.events.fail(&e.to_string());
                    return Err(e);
                }
            };

        info!(
            "⏳ 求解器已启动 (pid {}): {}",
            process.id().map(|p| p.to_string()).unwrap_or_default(),
            process.binary().display()
        );
        inner.events.set_state(SchedulingState::Running);
        inner.events.progress(BASE_PROGRESS);

        tokio::spawn(inner.clone().monitor(process, csv));
        Ok(())
    }

    fn stop(&self) {
        let inner = &self.inner;
        let state = inner.events.state();
        if !matches!(state, SchedulingState::Preparing | SchedulingState::Running) {
            debug!("调度器处于 {:?}，忽略停止请求", state);
            return;
        }
        if inner.stop_requested.swap(true, Ordering::AcqRel) {
            return;
        }
        info!("🛑 请求停止求解器");
        inner.stop.notify_one();
    }
}

impl Scheduler for ExternalScheduler {
    fn start_scheduling(&self) -> BoxFuture<'_, Result<(), SchedulerError>> {
        Box::pin(self.start())
    }

    fn stop_scheduling(&self) {
        self.stop();
    }

    fn state(&self) -> SchedulingState {
        self.inner.events.state()
    }

    fn wait(&self) -> BoxFuture<'_, SchedulingState> {
        Box::pin(self.inner.events.wait())
    }

    fn add_listener(&self, listener: Arc<dyn SchedulerListener>) {
        self.inner.events.add_listener(listener);
    }
}

/// 运行期间从输出中收集到的信息
#[derive(Debug, Default)]
struct RunObservation {
    cancelled: bool,
    stuck: Option<u32>,
    io_error: Option<String>,
    /// 第一条错误行，作为失败原因
    fatal: Option<String>,
    pending_relocation: Option<PendingRelocation>,
}

/// 求解器报告的结果目录，进程退出后才移动
#[derive(Debug)]
struct PendingRelocation {
    reported: PathBuf,
}

impl PendingRelocation {
    /// 把报告的目录移动到 `<workdir>/SPA-ERGEBNIS-PP`，覆盖已有目录
    async fn execute(&self, csv: &PlanCsv) -> io::Result<()> {
        let source = if self.reported.is_absolute() {
            self.reported.clone()
        } else {
            csv.path().join(&self.reported)
        };
        let target = csv.result_directory();
        if source == target {
            return Ok(());
        }

        if tokio::fs::metadata(&target).await.is_ok() {
            tokio::fs::remove_dir_all(&target).await?;
        }
        tokio::fs::rename(&source, &target).await?;
        info!(
            "📦 结果目录已移动: {} → {}",
            source.display(),
            target.display()
        );
        Ok(())
    }
}

impl Inner {
    async fn prepare(&self) -> Result<PlanCsv, ProtocolError> {
        let csv = match (&self.options.workdir, &self.options.working_root) {
            (Some(dir), _) => PlanCsv::new(dir.clone()),
            (None, Some(root)) => PlanCsv::temporary_in(root)?,
            (None, None) => PlanCsv::temporary()?,
        };
        // 文件写入放到阻塞线程池，计划锁在此期间保持
        let plan = self.plan.lock().await;
        let snapshot = plan.clone();
        let base = csv.path().to_path_buf();
        let written = tokio::task::spawn_blocking(move || {
            let result = csv.write_plan(&snapshot);
            (csv, result)
        })
        .await;
        drop(plan);

        match written {
            Ok((csv, result)) => result.map(|()| csv),
            Err(e) => Err(ProtocolError::write_failed(
                base,
                io::Error::new(io::ErrorKind::Other, e.to_string()),
            )),
        }
    }

    /// 监控求解器直到退出，然后发出终止通知
    async fn monitor(self: Arc<Self>, mut process: SolverProcess, csv: PlanCsv) {
        let classifier = LineClassifier::new(self.mode, self.options.stuck_threshold);
        let mut transcript = TranscriptWriter::new(csv.path());
        let mut output = process.take_output();
        let mut run = RunObservation::default();
        let mut output_open = true;
        let mut terminate_at: Option<Instant> = None;
        let mut killed = false;

        let status = loop {
            tokio::select! {
                status = process.wait() => break status,
                _ = self.stop.notified(), if terminate_at.is_none() => {
                    run.cancelled = true;
                    terminate_at = Some(self.begin_termination(&mut process));
                }
                item = output.next(), if output_open => match item {
                    Some(Ok(line)) => {
                        let should_stop = self
                            .observe(&line, &classifier, &mut run, &mut transcript)
                            .await;
                        if should_stop && terminate_at.is_none() {
                            terminate_at = Some(self.begin_termination(&mut process));
                        }
                    }
                    Some(Err(e)) => {
                        error!("❌ 读取求解器输出失败: {}", e);
                        run.io_error.get_or_insert_with(|| e.to_string());
                        if terminate_at.is_none() {
                            terminate_at = Some(self.begin_termination(&mut process));
                        }
                    }
                    None => output_open = false,
                },
                _ = sleep_until(terminate_at.unwrap_or_else(Instant::now)),
                    if terminate_at.is_some() && !killed =>
                {
                    warn!(
                        "⚠️ 求解器在 {:?} 内没有退出，强制结束",
                        self.options.grace_period
                    );
                    process.kill();
                    killed = true;
                }
            }
        };

        if output_open {
            let drained = tokio::time::timeout(DRAIN_TIMEOUT, async {
                while let Some(item) = output.next().await {
                    match item {
                        Ok(line) => {
                            self.observe(&line, &classifier, &mut run, &mut transcript)
                                .await;
                        }
                        Err(e) => {
                            run.io_error.get_or_insert_with(|| e.to_string());
                            break;
                        }
                    }
                }
            })
            .await;
            if drained.is_err() {
                debug!("求解器已退出，但输出通道仍未关闭，放弃剩余输出");
            }
        }
        drop(output);
        transcript.flush().await;

        match self.conclude(status, run, &csv).await {
            Ok(()) => {
                info!("✅ 排考完成: {}", csv.path().display());
                self.events.finish(&self.plan);
            }
            Err(reason) => {
                error!("❌ 排考失败: {}", reason);
                self.events.fail(&reason);
            }
        }
    }

    fn begin_termination(&self, process: &mut SolverProcess) -> Instant {
        process.terminate();
        Instant::now() + self.options.grace_period
    }

    /// 处理一行输出，返回是否需要终止求解器
    async fn observe(
        &self,
        line: &OutputLine,
        classifier: &LineClassifier,
        run: &mut RunObservation,
        transcript: &mut TranscriptWriter,
    ) -> bool {
        transcript.write(&line.text).await;
        if self.options.print_log {
            info!("[SPA] {}", line.text);
        } else {
            debug!("[SPA] {}", line.text);
        }

        match classifier.classify(&line.text) {
            LineClass::Fatal(message) => {
                warn!("⚠️ 求解器报告错误: {}", truncate_text(&message, 200));
                self.events.warning(&message);
                run.fatal.get_or_insert(message);
            }
            LineClass::Warning(message) => {
                debug!("求解器警告: {}", truncate_text(&message, 200));
                self.events.warning(&message);
            }
            LineClass::Stuck(count) => {
                warn!("⚠️ 求解器陷入停滞 (Stillstand {})，准备终止", count);
                run.stuck.get_or_insert(count);
                return true;
            }
            LineClass::Progress(value) => {
                self.events.progress(progress_from_objective(value));
            }
            LineClass::ResultRelocation(reported) => {
                debug!("求解器结果目录: {}", reported.display());
                run.pending_relocation = Some(PendingRelocation { reported });
            }
            LineClass::Unclassified => {}
        }
        false
    }

    /// 根据退出状态和收集到的信息决定最终结果
    async fn conclude(
        &self,
        status: io::Result<ExitStatus>,
        run: RunObservation,
        csv: &PlanCsv,
    ) -> Result<(), String> {
        if run.cancelled {
            return Err("排考已被停止".to_string());
        }
        if let Some(count) = run.stuck {
            return Err(format!("求解器陷入停滞 (Stillstand {})，已终止", count));
        }
        if let Some(e) = run.io_error {
            return Err(format!("读取求解器输出失败: {}", e));
        }

        let status = status.map_err(|e| format!("等待求解器退出失败: {}", e))?;
        let Some(code) = status.code() else {
            return Err(format!("求解器崩溃 ({})", status));
        };
        if code != 0 {
            return Err(run.fatal.unwrap_or_else(|| {
                format!(
                    "求解器以退出码 {} 结束且没有报告错误，可能没有找到排考方案",
                    code
                )
            }));
        }
        if let Some(fatal) = run.fatal {
            return Err(fatal);
        }

        if let Some(relocation) = &run.pending_relocation {
            relocation.execute(csv).await.map_err(|e| {
                format!(
                    "无法移动结果目录 {}: {}",
                    relocation.reported.display(),
                    e
                )
            })?;
        }

        // 在副本上读取结果，成功后整体替换，共享的 Arc 不变
        let mut plan = self.plan.lock().await;
        let mut updated = plan.clone();
        let workdir = PlanCsv::new(csv.path());
        let read = tokio::task::spawn_blocking(move || {
            workdir.read_schedule(&mut updated).map(|()| updated)
        })
        .await;

        match read {
            Ok(Ok(updated)) => {
                *plan = updated;
                Ok(())
            }
            Ok(Err(ProtocolError::MissingFile(path))) => Err(format!(
                "求解器正常结束但没有生成 {}，可能没有找到有效的排考方案",
                path.display()
            )),
            Ok(Err(e)) => Err(format!("无法读取排考结果: {}", e)),
            Err(e) => Err(format!("读取排考结果的任务失败: {}", e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{share, Plan};
    use std::path::Path;

    fn options() -> SolverOptions {
        SolverOptions::default().with_binary("/nonexistent/SPA-algorithmus")
    }

    #[tokio::test]
    async fn test_second_start_is_rejected() {
        let scheduler = ExternalScheduler::new(
            share(Plan::new("Sommer")),
            SchedulingMode::Fast,
            options(),
        );
        assert!(matches!(
            scheduler.start_scheduling().await,
            Err(SchedulerError::Spawn { .. })
        ));
        assert!(matches!(
            scheduler.start_scheduling().await,
            Err(SchedulerError::AlreadyStarted)
        ));
        assert_eq!(scheduler.state(), SchedulingState::Failed);
    }

    #[tokio::test]
    async fn test_missing_workdir_fails_before_spawn() {
        let root = tempfile::tempdir().unwrap();
        let scheduler = ExternalScheduler::new(
            share(Plan::new("Sommer")),
            SchedulingMode::Quality,
            options().with_workdir(root.path().join("fehlt")),
        );
        let err = scheduler.start_scheduling().await.unwrap_err();
        assert!(matches!(
            err,
            SchedulerError::Prepare(ProtocolError::DirectoryNotFound(_))
        ));
        assert_eq!(scheduler.wait().await, SchedulingState::Failed);
    }

    #[tokio::test]
    async fn test_inputs_are_written_before_spawn() {
        let workdir = tempfile::tempdir().unwrap();
        let scheduler = ExternalScheduler::new(
            share(Plan::new("Sommer")),
            SchedulingMode::Fast,
            options().with_workdir(workdir.path()),
        );
        assert!(matches!(
            scheduler.start_scheduling().await,
            Err(SchedulerError::Spawn { .. })
        ));
        assert!(PlanCsv::new(workdir.path()).is_written());
        // 失败后计划锁已释放
        assert!(scheduler.plan().try_lock().is_ok());
    }

    #[tokio::test]
    async fn test_stop_before_start_is_ignored() {
        let scheduler = ExternalScheduler::new(
            share(Plan::new("Sommer")),
            SchedulingMode::Fast,
            options(),
        );
        scheduler.stop_scheduling();
        scheduler.stop_scheduling();
        assert_eq!(scheduler.state(), SchedulingState::Idle);
    }

    #[tokio::test]
    async fn test_relative_relocation_is_resolved_against_workdir() {
        let csv = PlanCsv::temporary().unwrap();
        let reported = csv.path().join("lauf-2");
        tokio::fs::create_dir_all(&reported).await.unwrap();
        tokio::fs::write(reported.join("marker"), b"x").await.unwrap();
        // 旧结果会被覆盖
        tokio::fs::create_dir_all(csv.result_directory()).await.unwrap();

        PendingRelocation {
            reported: PathBuf::from("lauf-2"),
        }
        .execute(&csv)
        .await
        .unwrap();

        assert!(csv.result_directory().join("marker").is_file());
        assert!(!reported.exists());
    }

    #[test]
    fn test_options_from_config() {
        let config = Config {
            grace_period_secs: 9,
            print_log: true,
            ..Config::default()
        };
        let options = SolverOptions::from_config(&config);
        assert_eq!(options.grace_period, Duration::from_secs(9));
        assert!(options.print_log);
        assert!(options.workdir.is_none());
        assert_eq!(options.binary, Path::new("/usr/bin/SPA-algorithmus"));
    }
}
