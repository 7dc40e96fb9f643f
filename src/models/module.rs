use serde::{Deserialize, Serialize};

/// 不参与求解的来源标记（外部求解器的已知限制）
pub const EXCLUDED_ORIGIN: &str = "EIT";

/// 考试（模块）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Module {
    /// 显示名称
    pub name: String,
    /// 编号，可带一个以空格分隔的班级后缀，例如 `30.2342 B`
    pub number: String,
    /// 来源标记
    pub origin: String,
    /// 所属约束组（最多一个）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constraint: Option<String>,
    /// 所属学生组
    #[serde(default)]
    pub groups: Vec<String>,
}

impl Module {
    pub fn new(
        name: impl Into<String>,
        number: impl Into<String>,
        origin: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            number: number.into(),
            origin: origin.into(),
            constraint: None,
            groups: Vec::new(),
        }
    }

    pub fn with_constraint(mut self, constraint: impl Into<String>) -> Self {
        self.constraint = Some(constraint.into());
        self
    }

    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.groups.push(group.into());
        self
    }

    /// 是否不会写入求解器输入
    pub fn is_excluded(&self) -> bool {
        self.origin == EXCLUDED_ORIGIN
    }

    /// 主编号（去掉班级后缀）
    pub fn primary_number(&self) -> &str {
        self.split_number().0
    }

    /// 班级后缀，没有则为空串
    pub fn qualifier(&self) -> &str {
        self.split_number().1
    }

    fn split_number(&self) -> (&str, &str) {
        match self.number.split_once(' ') {
            Some((primary, qualifier)) => (primary, qualifier),
            None => (self.number.as_str(), ""),
        }
    }

    /// 由主编号和班级后缀拼出完整编号
    pub fn join_number(primary: &str, qualifier: &str) -> String {
        if qualifier.is_empty() {
            primary.to_string()
        } else {
            format!("{} {}", primary, qualifier)
        }
    }
}

/// 学生组，也用作约束组
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Group {
    pub name: String,
}

impl Group {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}
