//! 求解器输出分类 - 业务能力层
//!
//! 只负责"把一行输出归类"，不关心进程和流程。
//! 规则以数据表的形式按顺序匹配，第一条命中的规则决定结果。

use std::path::PathBuf;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::scheduler::SchedulingMode;

/// 求解器汇总行（例如 "Warnungen insgesamt: 3"），不算真正的警告或错误
static SUMMARY_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)warnungen\s+insgesamt").expect("Invalid regex pattern"));

static PATTERNS: Lazy<Vec<LinePattern>> = Lazy::new(|| {
    vec![
        LinePattern::new(LineKind::Stuck, r"^\s*Stillstand\s*\(\s*(\d+)\s*\)"),
        LinePattern::new(LineKind::Fatal, r"^\s*FEHLER").skip_summary(),
        LinePattern::new(LineKind::Warning, r"^\s*WARNUNG").skip_summary(),
        LinePattern::new(
            LineKind::Progress,
            r"Bester Zielfunktionswert:\s*(-?\d+(?:[.,]\d+)?)",
        )
        .quality_only(),
        LinePattern::new(
            LineKind::ResultRelocation,
            r"Ergebnisse gespeichert in:?\s*(\S.*?)\s*$",
        )
        .quality_only(),
    ]
});

/// 目标函数值达到该值及以上时进度视为起点
const OBJECTIVE_CEILING: f64 = 150.0;
/// 求解器启动后的基础进度
pub const BASE_PROGRESS: f64 = 0.05;

/// 一行输出的分类结果
#[derive(Debug, Clone, PartialEq)]
pub enum LineClass {
    /// 求解器陷入停滞，附带停滞计数
    Stuck(u32),
    /// 致命错误行
    Fatal(String),
    /// 警告行
    Warning(String),
    /// 当前最优目标函数值
    Progress(f64),
    /// 求解器报告的结果目录
    ResultRelocation(PathBuf),
    Unclassified,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineKind {
    Stuck,
    Fatal,
    Warning,
    Progress,
    ResultRelocation,
}

/// 一条匹配规则
#[derive(Debug)]
struct LinePattern {
    kind: LineKind,
    regex: Regex,
    quality_only: bool,
    skip_summary: bool,
}

impl LinePattern {
    fn new(kind: LineKind, pattern: &str) -> Self {
        Self {
            kind,
            regex: Regex::new(pattern).expect("Invalid regex pattern"),
            quality_only: false,
            skip_summary: false,
        }
    }

    fn quality_only(mut self) -> Self {
        self.quality_only = true;
        self
    }

    fn skip_summary(mut self) -> Self {
        self.skip_summary = true;
        self
    }
}

/// 行分类器
///
/// 职责：
/// - 按顺序套用规则表
/// - 快速模式下不识别进度和结果目录
/// - 停滞计数低于阈值时视为普通输出
#[derive(Debug, Clone, Copy)]
pub struct LineClassifier {
    mode: SchedulingMode,
    stuck_threshold: u32,
}

impl LineClassifier {
    pub fn new(mode: SchedulingMode, stuck_threshold: u32) -> Self {
        Self {
            mode,
            stuck_threshold,
        }
    }

    /// 对一行输出分类
    pub fn classify(&self, line: &str) -> LineClass {
        for pattern in PATTERNS.iter() {
            if pattern.quality_only && self.mode != SchedulingMode::Quality {
                continue;
            }
            if pattern.skip_summary && SUMMARY_MARKER.is_match(line) {
                continue;
            }
            let Some(captures) = pattern.regex.captures(line) else {
                continue;
            };

            let capture = captures.get(1).map(|m| m.as_str()).unwrap_or("");
            match pattern.kind {
                LineKind::Stuck => {
                    // 数字太大时按阈值之上处理
                    let count = capture.parse::<u32>().unwrap_or(u32::MAX);
                    if count >= self.stuck_threshold {
                        return LineClass::Stuck(count);
                    }
                    return LineClass::Unclassified;
                }
                LineKind::Fatal => return LineClass::Fatal(line.trim().to_string()),
                LineKind::Warning => return LineClass::Warning(line.trim().to_string()),
                LineKind::Progress => {
                    if let Ok(value) = capture.replace(',', ".").parse::<f64>() {
                        return LineClass::Progress(value);
                    }
                }
                LineKind::ResultRelocation => {
                    return LineClass::ResultRelocation(PathBuf::from(capture));
                }
            }
        }
        LineClass::Unclassified
    }
}

/// 由目标函数值估算进度
///
/// 值越小越好：0 对应 1.0，150 及以上对应基础进度 0.05。
pub fn progress_from_objective(value: f64) -> f64 {
    let clamped = value.clamp(0.0, OBJECTIVE_CEILING);
    BASE_PROGRESS + (1.0 - BASE_PROGRESS) * (1.0 - clamped / OBJECTIVE_CEILING)
}
