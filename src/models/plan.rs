//! 考试计划模型
//!
//! 固定的 3 周 × 6 天 × 6 个时间块网格，以及考试、学生组和约束组目录。
//! 时间块只按 [`ModuleId`] 和组名引用目录中的条目，不持有它们。

use std::collections::{BTreeSet, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::PlanError;
use crate::models::module::{Group, Module};

pub const WEEKS: usize = 3;
pub const DAYS_PER_WEEK: usize = 6;
pub const SLOTS_PER_DAY: usize = 6;
pub const SLOTS_PER_WEEK: usize = DAYS_PER_WEEK * SLOTS_PER_DAY;
pub const TOTAL_SLOTS: usize = WEEKS * SLOTS_PER_WEEK;

const DAY_NAMES: [&str; DAYS_PER_WEEK] = [
    "Montag",
    "Dienstag",
    "Mittwoch",
    "Donnerstag",
    "Freitag",
    "Samstag",
];

/// 目录中考试的下标
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModuleId(usize);

impl ModuleId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// 网格坐标（均从 0 开始）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotRef {
    pub week: usize,
    pub day: usize,
    pub slot: usize,
}

impl SlotRef {
    /// 坐标越界时返回 None
    pub fn new(week: usize, day: usize, slot: usize) -> Option<Self> {
        if week < WEEKS && day < DAYS_PER_WEEK && slot < SLOTS_PER_DAY {
            Some(Self { week, day, slot })
        } else {
            None
        }
    }

    /// 扁平的块下标：`week*36 + day*6 + slot`
    pub fn block(self) -> usize {
        self.week * SLOTS_PER_WEEK + self.day * SLOTS_PER_DAY + self.slot
    }

    pub fn from_block(block: usize) -> Option<Self> {
        if block >= TOTAL_SLOTS {
            return None;
        }
        Some(Self {
            week: block / SLOTS_PER_WEEK,
            day: (block % SLOTS_PER_WEEK) / SLOTS_PER_DAY,
            slot: block % SLOTS_PER_DAY,
        })
    }

    /// 按周、天、块的顺序遍历整个网格
    pub fn all() -> impl Iterator<Item = SlotRef> {
        (0..TOTAL_SLOTS).filter_map(SlotRef::from_block)
    }
}

/// 时间块
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Timeslot {
    name: String,
    #[serde(default)]
    modules: BTreeSet<ModuleId>,
    #[serde(default)]
    open_groups: BTreeSet<String>,
    #[serde(default)]
    open_constraints: BTreeSet<String>,
}

impl Timeslot {
    fn new(name: String) -> Self {
        Self {
            name,
            ..Default::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn modules(&self) -> impl Iterator<Item = ModuleId> + '_ {
        self.modules.iter().copied()
    }

    pub fn contains(&self, id: ModuleId) -> bool {
        self.modules.contains(&id)
    }

    pub fn is_group_open(&self, group: &str) -> bool {
        self.open_groups.contains(group)
    }

    pub fn is_constraint_open(&self, constraint: &str) -> bool {
        self.open_constraints.contains(constraint)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Day {
    name: String,
    timeslots: Vec<Timeslot>,
}

impl Day {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn timeslots(&self) -> &[Timeslot] {
        &self.timeslots
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Week {
    name: String,
    days: Vec<Day>,
}

impl Week {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn days(&self) -> &[Day] {
        &self.days
    }
}

/// 考试计划
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawPlan")]
pub struct Plan {
    name: String,
    weeks: Vec<Week>,
    modules: Vec<Module>,
    groups: Vec<Group>,
    constraints: Vec<Group>,
}

impl Plan {
    /// 创建带标准网格的空计划
    pub fn new(name: impl Into<String>) -> Self {
        let weeks = (0..WEEKS)
            .map(|w| Week {
                name: format!("Woche {}", w + 1),
                days: DAY_NAMES
                    .iter()
                    .map(|day_name| Day {
                        name: day_name.to_string(),
                        timeslots: (0..SLOTS_PER_DAY)
                            .map(|s| Timeslot::new(format!("Block {}", s + 1)))
                            .collect(),
                    })
                    .collect(),
            })
            .collect();

        Self {
            name: name.into(),
            weeks,
            modules: Vec::new(),
            groups: Vec::new(),
            constraints: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn weeks(&self) -> &[Week] {
        &self.weeks
    }

    pub fn modules(&self) -> &[Module] {
        &self.modules
    }

    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    pub fn constraints(&self) -> &[Group] {
        &self.constraints
    }

    pub fn module(&self, id: ModuleId) -> Option<&Module> {
        self.modules.get(id.0)
    }

    pub fn module_ids(&self) -> impl Iterator<Item = ModuleId> {
        (0..self.modules.len()).map(ModuleId)
    }

    pub fn has_group(&self, name: &str) -> bool {
        self.groups.iter().any(|g| g.name == name)
    }

    pub fn has_constraint(&self, name: &str) -> bool {
        self.constraints.iter().any(|g| g.name == name)
    }

    pub fn add_group(&mut self, group: Group) -> Result<(), PlanError> {
        if self.has_group(&group.name) {
            return Err(PlanError::DuplicateGroup(group.name));
        }
        self.groups.push(group);
        Ok(())
    }

    pub fn add_constraint(&mut self, constraint: Group) -> Result<(), PlanError> {
        if self.has_constraint(&constraint.name) {
            return Err(PlanError::DuplicateConstraint(constraint.name));
        }
        self.constraints.push(constraint);
        Ok(())
    }

    /// 添加考试
    ///
    /// 引用的组必须已存在，至少属于一个学生组，编号加名称在目录中唯一。
    pub fn add_module(&mut self, module: Module) -> Result<ModuleId, PlanError> {
        self.check_module(&module)?;
        if self.find_module(&module.number, &module.name).is_some() {
            return Err(PlanError::DuplicateModule(module.number, module.name));
        }
        self.modules.push(module);
        Ok(ModuleId(self.modules.len() - 1))
    }

    fn check_module(&self, module: &Module) -> Result<(), PlanError> {
        if let Some(constraint) = &module.constraint {
            if !self.has_constraint(constraint) {
                return Err(PlanError::UnknownConstraint(constraint.clone()));
            }
        }
        if module.groups.is_empty() {
            return Err(PlanError::ModuleWithoutGroup(module.name.clone()));
        }
        if let Some(group) = module.groups.iter().find(|g| !self.has_group(g)) {
            return Err(PlanError::UnknownGroup(group.clone()));
        }
        Ok(())
    }

    /// 按编号和名称查找考试
    pub fn find_module(&self, number: &str, name: &str) -> Option<ModuleId> {
        self.modules
            .iter()
            .position(|m| m.number == number && m.name == name)
            .map(ModuleId)
    }

    pub fn timeslot(&self, at: SlotRef) -> Option<&Timeslot> {
        self.weeks
            .get(at.week)?
            .days
            .get(at.day)?
            .timeslots
            .get(at.slot)
    }

    fn timeslot_mut(&mut self, at: SlotRef) -> Option<&mut Timeslot> {
        self.weeks
            .get_mut(at.week)?
            .days
            .get_mut(at.day)?
            .timeslots
            .get_mut(at.slot)
    }

    /// 按块顺序遍历所有时间块
    pub fn timeslots(&self) -> impl Iterator<Item = (SlotRef, &Timeslot)> {
        SlotRef::all().filter_map(move |at| self.timeslot(at).map(|t| (at, t)))
    }

    pub fn assign(&mut self, id: ModuleId, at: SlotRef) -> Result<(), PlanError> {
        if self.module(id).is_none() {
            return Err(PlanError::UnknownModule(id.0));
        }
        let timeslot = self
            .timeslot_mut(at)
            .ok_or(PlanError::SlotOutOfRange(at.week, at.day, at.slot))?;
        timeslot.modules.insert(id);
        Ok(())
    }

    /// 从所有时间块中移除该考试
    pub fn unassign(&mut self, id: ModuleId) {
        for week in &mut self.weeks {
            for day in &mut week.days {
                for timeslot in &mut day.timeslots {
                    timeslot.modules.remove(&id);
                }
            }
        }
    }

    pub fn assignments_of(&self, id: ModuleId) -> Vec<SlotRef> {
        self.timeslots()
            .filter(|(_, t)| t.contains(id))
            .map(|(at, _)| at)
            .collect()
    }

    pub fn is_scheduled(&self, id: ModuleId) -> bool {
        self.timeslots().any(|(_, t)| t.contains(id))
    }

    pub fn set_group_open(&mut self, at: SlotRef, group: &str, open: bool) -> Result<(), PlanError> {
        if !self.has_group(group) {
            return Err(PlanError::UnknownGroup(group.to_string()));
        }
        let timeslot = self
            .timeslot_mut(at)
            .ok_or(PlanError::SlotOutOfRange(at.week, at.day, at.slot))?;
        if open {
            timeslot.open_groups.insert(group.to_string());
        } else {
            timeslot.open_groups.remove(group);
        }
        Ok(())
    }

    pub fn set_constraint_open(
        &mut self,
        at: SlotRef,
        constraint: &str,
        open: bool,
    ) -> Result<(), PlanError> {
        if !self.has_constraint(constraint) {
            return Err(PlanError::UnknownConstraint(constraint.to_string()));
        }
        let timeslot = self
            .timeslot_mut(at)
            .ok_or(PlanError::SlotOutOfRange(at.week, at.day, at.slot))?;
        if open {
            timeslot.open_constraints.insert(constraint.to_string());
        } else {
            timeslot.open_constraints.remove(constraint);
        }
        Ok(())
    }

    /// 在整个网格中开放该学生组
    pub fn open_group_everywhere(&mut self, group: &str) -> Result<(), PlanError> {
        for at in SlotRef::all() {
            self.set_group_open(at, group, true)?;
        }
        Ok(())
    }

    /// 在整个网格中开放该约束组
    pub fn open_constraint_everywhere(&mut self, constraint: &str) -> Result<(), PlanError> {
        for at in SlotRef::all() {
            self.set_constraint_open(at, constraint, true)?;
        }
        Ok(())
    }

    /// 检查网格形状以及所有引用
    fn validate(&self) -> Result<(), PlanError> {
        let shape_ok = self.weeks.len() == WEEKS
            && self.weeks.iter().all(|w| {
                w.days.len() == DAYS_PER_WEEK
                    && w.days.iter().all(|d| d.timeslots.len() == SLOTS_PER_DAY)
            });
        if !shape_ok {
            return Err(PlanError::InvalidGrid);
        }

        let mut keys = HashSet::new();
        for module in &self.modules {
            self.check_module(module)?;
            if !keys.insert((module.number.as_str(), module.name.as_str())) {
                return Err(PlanError::DuplicateModule(
                    module.number.clone(),
                    module.name.clone(),
                ));
            }
        }

        for (_, timeslot) in self.timeslots() {
            if let Some(id) = timeslot.modules().find(|id| id.0 >= self.modules.len()) {
                return Err(PlanError::UnknownModule(id.0));
            }
            if let Some(group) = timeslot.open_groups.iter().find(|g| !self.has_group(g)) {
                return Err(PlanError::UnknownGroup(group.clone()));
            }
            if let Some(constraint) = timeslot
                .open_constraints
                .iter()
                .find(|c| !self.has_constraint(c))
            {
                return Err(PlanError::UnknownConstraint(constraint.clone()));
            }
        }

        Ok(())
    }
}

/// 反序列化用的原始结构，转换时校验不变量
#[derive(Deserialize)]
struct RawPlan {
    name: String,
    weeks: Vec<Week>,
    #[serde(default)]
    modules: Vec<Module>,
    #[serde(default)]
    groups: Vec<Group>,
    #[serde(default)]
    constraints: Vec<Group>,
}

impl TryFrom<RawPlan> for Plan {
    type Error = PlanError;

    fn try_from(raw: RawPlan) -> Result<Self, Self::Error> {
        let plan = Plan {
            name: raw.name,
            weeks: raw.weeks,
            modules: raw.modules,
            groups: raw.groups,
            constraints: raw.constraints,
        };
        plan.validate()?;
        Ok(plan)
    }
}
