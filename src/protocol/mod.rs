//! 求解器文件协议
//!
//! ## 职责
//!
//! 在 [`Plan`](crate::models::Plan) 和外部求解器的定长 CSV 文件之间双向转换。
//! 所有文件以分号分隔、Windows-1252 编码，位于同一个工作目录下：
//!
//! ```text
//! <workdir>/
//!     pruef-intervalle.csv      约束组的开放时间
//!     pruefungen.csv            考试列表
//!     zuege-pruef.csv           学生组的开放时间
//!     zuege-pruef-pref2.csv     偏好占位文件
//!     SPA-ERGEBNIS-PP/
//!         SPA-planung-pruef.csv 排考结果
//!         SPA-zuege-pruef.csv   学生组结果（只检查是否存在）
//! ```

pub mod encoding;
pub mod plan_csv;
mod reader;
mod writer;

pub use plan_csv::PlanCsv;

pub const EXAMS_INTERVALS_FILE: &str = "pruef-intervalle.csv";
pub const EXAMS_FILE: &str = "pruefungen.csv";
pub const GROUPS_EXAMS_FILE: &str = "zuege-pruef.csv";
pub const GROUPS_EXAMS_PREF_FILE: &str = "zuege-pruef-pref2.csv";
pub const RESULT_DIRECTORY: &str = "SPA-ERGEBNIS-PP";
pub const PLANNING_EXAMS_RESULT_FILE: &str = "SPA-planung-pruef.csv";
pub const GROUPS_EXAMS_RESULT_FILE: &str = "SPA-zuege-pruef.csv";

/// 排考结果文件的固定表头
pub const RESULT_HEADER: &str = "BelegNr;Zug;Modul;Import;Prüfungsform;Zuordnung;Tag;Block;";

pub(crate) const END_MARKER: &str = "-ENDE-";
pub(crate) const OPEN: &str = "FREI";
pub(crate) const BLOCKED: &str = "BLOCKIERT";
pub(crate) const MAX_PER_DAY_LABEL: &str = "Maximale Prü/Tag";
pub(crate) const EXAM_FORM: &str = "K";

/// 约束组每天最多考试数
pub(crate) const CONSTRAINT_CAP_PER_DAY: u32 = 6;
/// 学生组每天最多考试数
pub(crate) const GROUP_CAP_PER_DAY: u32 = 2;

/// 结果文件中的"天"跨所有周连续编号，按 7 天一组折算周
pub(crate) const RESULT_DAYS_PER_WEEK: usize = 7;
