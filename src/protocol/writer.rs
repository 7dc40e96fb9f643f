use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use tracing::debug;

use crate::error::ProtocolError;
use crate::models::{Plan, Timeslot, TOTAL_SLOTS};
use crate::protocol::{
    encoding, BLOCKED, CONSTRAINT_CAP_PER_DAY, END_MARKER, EXAM_FORM, GROUP_CAP_PER_DAY,
    MAX_PER_DAY_LABEL, OPEN,
};

/// 约束组开放时间表（pruef-intervalle.csv）
pub(crate) fn intervals_table(plan: &Plan) -> Result<String, ProtocolError> {
    let names: Vec<&str> = plan.constraints().iter().map(|g| g.name.as_str()).collect();
    availability_table(plan, &names, CONSTRAINT_CAP_PER_DAY, |t, name| {
        t.is_constraint_open(name)
    })
}

/// 学生组开放时间表（zuege-pruef.csv）
pub(crate) fn groups_table(plan: &Plan) -> Result<String, ProtocolError> {
    let names: Vec<&str> = plan.groups().iter().map(|g| g.name.as_str()).collect();
    availability_table(plan, &names, GROUP_CAP_PER_DAY, |t, name| t.is_group_open(name))
}

fn availability_table(
    plan: &Plan,
    names: &[&str],
    cap_per_day: u32,
    is_open: impl Fn(&Timeslot, &str) -> bool,
) -> Result<String, ProtocolError> {
    for name in names {
        check_list_item(name)?;
    }

    let mut out = String::from("Block;");
    for name in names {
        let _ = write!(out, "{};", name);
    }
    out.push_str(END_MARKER);
    out.push('\n');

    let _ = write!(out, "{};", MAX_PER_DAY_LABEL);
    for _ in names {
        let _ = write!(out, "{};", cap_per_day);
    }
    out.push('\n');

    for (at, timeslot) in plan.timeslots() {
        let _ = write!(out, "{};", at.block() + 1);
        for name in names {
            let state = if is_open(timeslot, name) { OPEN } else { BLOCKED };
            let _ = write!(out, "{};", state);
        }
        out.push('\n');
    }

    Ok(out)
}

/// 考试列表（pruefungen.csv）
pub(crate) fn exams_table(plan: &Plan) -> Result<String, ProtocolError> {
    let mut out = String::new();
    let mut skipped = 0;

    for module in plan.modules() {
        // 求解器无法处理 EIT 考试
        if module.is_excluded() {
            skipped += 1;
            continue;
        }

        let constraint = module.constraint.as_deref().unwrap_or("");
        for group in &module.groups {
            check_list_item(group)?;
        }
        check_field(constraint)?;
        check_field(&module.name)?;
        check_field(&module.number)?;
        check_field(&module.origin)?;

        let _ = writeln!(
            out,
            "{};{};{};{};{};{};",
            constraint,
            module.groups.join(","),
            module.name,
            module.number,
            module.origin,
            EXAM_FORM
        );
    }
    out.push_str(END_MARKER);
    out.push_str(";;;;;;\n");

    if skipped > 0 {
        debug!("跳过 {} 个 EIT 考试", skipped);
    }
    Ok(out)
}

/// 偏好占位文件（zuege-pruef-pref2.csv），内容固定
pub(crate) fn preference_stub() -> String {
    let mut out = format!("Block;{}\n", END_MARKER);
    for block in 1..=TOTAL_SLOTS {
        let _ = writeln!(out, "{};", block);
    }
    out
}

/// 以 Windows-1252 编码写入文件
pub(crate) fn write_encoded(path: &Path, content: &str) -> Result<(), ProtocolError> {
    let bytes = encoding::encode(content)?;
    fs::write(path, bytes).map_err(|e| ProtocolError::write_failed(path, e))
}

fn check_field(value: &str) -> Result<(), ProtocolError> {
    if value.contains(&[';', '\n', '\r'][..]) {
        return Err(ProtocolError::InvalidField(value.to_string()));
    }
    Ok(())
}

/// 组名还会出现在逗号分隔的列表和表头里
fn check_list_item(value: &str) -> Result<(), ProtocolError> {
    if value.is_empty()
        || value.contains(',')
        || value == "Block"
        || value.starts_with(END_MARKER)
    {
        return Err(ProtocolError::InvalidField(value.to_string()));
    }
    check_field(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Group, Module, SlotRef};

    fn plan_with_groups() -> Plan {
        let mut plan = Plan::new("Sommer");
        plan.add_group(Group::new("INF1")).unwrap();
        plan.add_group(Group::new("INF2")).unwrap();
        plan.add_constraint(Group::new("Raum A")).unwrap();
        plan
    }

    #[test]
    fn test_intervals_table_layout() {
        let mut plan = plan_with_groups();
        let at = SlotRef::new(0, 0, 1).unwrap();
        plan.set_constraint_open(at, "Raum A", true).unwrap();

        let table = intervals_table(&plan).unwrap();
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 2 + TOTAL_SLOTS);
        assert_eq!(lines[0], "Block;Raum A;-ENDE-");
        assert_eq!(lines[1], "Maximale Prü/Tag;6;");
        assert_eq!(lines[2], "1;BLOCKIERT;");
        assert_eq!(lines[3], "2;FREI;");
        assert_eq!(lines[2 + TOTAL_SLOTS - 1], "108;BLOCKIERT;");
    }

    #[test]
    fn test_groups_table_uses_daily_cap_of_two() {
        let plan = plan_with_groups();
        let table = groups_table(&plan).unwrap();
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines[0], "Block;INF1;INF2;-ENDE-");
        assert_eq!(lines[1], "Maximale Prü/Tag;2;2;");
    }

    #[test]
    fn test_table_without_groups() {
        let plan = Plan::new("Leer");
        let table = groups_table(&plan).unwrap();
        assert!(table.starts_with("Block;-ENDE-\nMaximale Prü/Tag;\n1;\n"));
    }

    #[test]
    fn test_exams_table_skips_eit_modules() {
        let mut plan = plan_with_groups();
        plan.add_module(
            Module::new("Analysis", "30.2342", "DE")
                .with_constraint("Raum A")
                .with_group("INF1")
                .with_group("INF2"),
        )
        .unwrap();
        plan.add_module(Module::new("Elektrotechnik", "40.1000", "EIT").with_group("INF1"))
            .unwrap();
        plan.add_module(Module::new("Algebra", "30.2476", "DE").with_group("INF2"))
            .unwrap();

        let table = exams_table(&plan).unwrap();
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(
            lines,
            vec![
                "Raum A;INF1,INF2;Analysis;30.2342;DE;K;",
                ";INF2;Algebra;30.2476;DE;K;",
                "-ENDE-;;;;;;",
            ]
        );
    }

    #[test]
    fn test_exams_table_rejects_semicolon() {
        let mut plan = plan_with_groups();
        plan.add_module(Module::new("Analysis;I", "30.2342", "DE").with_group("INF1"))
            .unwrap();
        assert!(matches!(
            exams_table(&plan),
            Err(ProtocolError::InvalidField(_))
        ));
    }

    #[test]
    fn test_group_name_with_comma_is_rejected() {
        let mut plan = Plan::new("Sommer");
        plan.add_group(Group::new("INF1,INF2")).unwrap();
        assert!(matches!(
            groups_table(&plan),
            Err(ProtocolError::InvalidField(_))
        ));
    }

    #[test]
    fn test_preference_stub() {
        let stub = preference_stub();
        let lines: Vec<&str> = stub.lines().collect();
        assert_eq!(lines.len(), 1 + TOTAL_SLOTS);
        assert_eq!(lines[0], "Block;-ENDE-");
        assert_eq!(lines[1], "1;");
    }

    #[test]
    fn test_reserved_group_names_are_rejected() {
        for name in ["-ENDE-Raum", "-ENDE-", "Block"] {
            let mut plan = Plan::new("Sommer");
            plan.add_constraint(Group::new(name)).unwrap();
            assert!(
                matches!(intervals_table(&plan), Err(ProtocolError::InvalidField(n)) if n == name),
                "{} 应被拒绝",
                name
            );

            let mut plan = Plan::new("Sommer");
            plan.add_group(Group::new(name)).unwrap();
            assert!(matches!(groups_table(&plan), Err(ProtocolError::InvalidField(_))));
        }
    }
}
