//! 工作目录的读写入口
//!
//! [`PlanCsv`] 绑定一个工作目录，负责写出求解器输入、读回计划和排考结果。

use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::{debug, info};

use crate::error::ProtocolError;
use crate::models::Plan;
use crate::protocol::{
    reader, writer, EXAMS_FILE, EXAMS_INTERVALS_FILE, GROUPS_EXAMS_FILE, GROUPS_EXAMS_PREF_FILE,
    GROUPS_EXAMS_RESULT_FILE, PLANNING_EXAMS_RESULT_FILE, RESULT_DIRECTORY,
};

/// 求解器工作目录
#[derive(Debug)]
pub struct PlanCsv {
    base: PathBuf,
    /// 临时目录在 PlanCsv 释放时删除
    _temporary: Option<TempDir>,
}

impl PlanCsv {
    /// 使用已有目录
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            base: path.into(),
            _temporary: None,
        }
    }

    /// 在系统临时目录下创建一个新的工作目录
    pub fn temporary() -> Result<Self, ProtocolError> {
        let dir = tempfile::Builder::new()
            .prefix("exam-scheduler-")
            .tempdir()
            .map_err(|e| ProtocolError::write_failed(std::env::temp_dir(), e))?;
        Ok(Self::from_temp_dir(dir))
    }

    /// 在指定目录下创建一个新的工作目录
    pub fn temporary_in(root: &Path) -> Result<Self, ProtocolError> {
        let dir = tempfile::Builder::new()
            .prefix("exam-scheduler-")
            .tempdir_in(root)
            .map_err(|e| ProtocolError::write_failed(root, e))?;
        Ok(Self::from_temp_dir(dir))
    }

    fn from_temp_dir(dir: TempDir) -> Self {
        Self {
            base: dir.path().to_path_buf(),
            _temporary: Some(dir),
        }
    }

    pub fn path(&self) -> &Path {
        &self.base
    }

    pub fn result_directory(&self) -> PathBuf {
        self.base.join(RESULT_DIRECTORY)
    }

    fn input_files(&self) -> [PathBuf; 4] {
        [
            self.base.join(EXAMS_INTERVALS_FILE),
            self.base.join(EXAMS_FILE),
            self.base.join(GROUPS_EXAMS_FILE),
            self.base.join(GROUPS_EXAMS_PREF_FILE),
        ]
    }

    fn result_files(&self) -> [PathBuf; 2] {
        let results = self.result_directory();
        [
            results.join(PLANNING_EXAMS_RESULT_FILE),
            results.join(GROUPS_EXAMS_RESULT_FILE),
        ]
    }

    /// 写出求解器的四个输入文件
    ///
    /// 目录必须已经存在；所有内容先在内存中生成并校验，再落盘。
    pub fn write_plan(&self, plan: &Plan) -> Result<(), ProtocolError> {
        if !self.base.is_dir() {
            return Err(ProtocolError::DirectoryNotFound(self.base.clone()));
        }

        let intervals = writer::intervals_table(plan)?;
        let exams = writer::exams_table(plan)?;
        let groups = writer::groups_table(plan)?;
        let preferences = writer::preference_stub();

        let [intervals_path, exams_path, groups_path, pref_path] = self.input_files();
        writer::write_encoded(&intervals_path, &intervals)?;
        writer::write_encoded(&exams_path, &exams)?;
        writer::write_encoded(&groups_path, &groups)?;
        writer::write_encoded(&pref_path, &preferences)?;

        info!(
            "📝 已写入求解器输入: {} ({} 个考试, {} 个学生组, {} 个约束组)",
            self.base.display(),
            plan.modules().iter().filter(|m| !m.is_excluded()).count(),
            plan.groups().len(),
            plan.constraints().len()
        );
        Ok(())
    }

    /// 从输入文件重建计划
    pub fn read_plan(&self) -> Result<Plan, ProtocolError> {
        let [intervals_path, exams_path, groups_path, _] = self.input_files();

        let intervals = reader::read_decoded(&intervals_path)?;
        let groups = reader::read_decoded(&groups_path)?;
        let exams = reader::read_decoded(&exams_path)?;

        let mut plan = Plan::new(
            self.base
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
        );

        let table = reader::parse_availability(EXAMS_INTERVALS_FILE, &intervals)?;
        reader::apply_constraints(&mut plan, &table)?;
        let table = reader::parse_availability(GROUPS_EXAMS_FILE, &groups)?;
        reader::apply_groups(&mut plan, &table)?;
        reader::apply_exams(&mut plan, &exams)?;

        debug!("从 {} 读回 {} 个考试", self.base.display(), plan.modules().len());
        Ok(plan)
    }

    /// 读取排考结果并写入计划
    ///
    /// 整个文件解析成功后才修改计划，任何错误都不会留下部分结果。
    pub fn read_schedule(&self, plan: &mut Plan) -> Result<(), ProtocolError> {
        if let Some(missing) = self.result_files().iter().find(|p| !p.is_file()) {
            return Err(ProtocolError::MissingFile(missing.clone()));
        }
        let [planning_path, _] = self.result_files();

        let text = reader::read_decoded(&planning_path)?;
        let assignments = reader::parse_schedule(plan, &text)?;
        reader::apply_schedule(plan, &assignments)?;

        info!("📥 已读取排考结果: {} 条分配", assignments.len());
        Ok(())
    }

    /// 四个输入文件是否都存在
    pub fn is_written(&self) -> bool {
        self.input_files().iter().all(|p| p.is_file())
    }

    /// 两个结果文件是否都存在
    pub fn is_scheduled(&self) -> bool {
        self.result_files().iter().all(|p| p.is_file())
    }
}
