use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use crate::error::ProtocolError;
use crate::models::{Group, Module, ModuleId, Plan, SlotRef, TOTAL_SLOTS};
use crate::protocol::{
    encoding, BLOCKED, END_MARKER, EXAMS_FILE, MAX_PER_DAY_LABEL, OPEN,
    PLANNING_EXAMS_RESULT_FILE, RESULT_DAYS_PER_WEEK, RESULT_HEADER,
};

/// 开放时间表的解析结果
#[derive(Debug)]
pub(crate) struct AvailabilityTable {
    pub names: Vec<String>,
    /// 每个块一行，每个组一列
    pub open: Vec<Vec<bool>>,
}

impl AvailabilityTable {
    pub fn blocks(&self) -> impl Iterator<Item = (SlotRef, &[bool])> + '_ {
        self.open
            .iter()
            .enumerate()
            .filter_map(|(block, row)| SlotRef::from_block(block).map(|at| (at, row.as_slice())))
    }
}

/// 读取并解码文件，文件不存在时返回 MissingFile
pub(crate) fn read_decoded(path: &Path) -> Result<String, ProtocolError> {
    if !path.is_file() {
        return Err(ProtocolError::MissingFile(path.to_path_buf()));
    }
    let bytes = fs::read(path).map_err(|e| ProtocolError::read_failed(path, e))?;
    Ok(encoding::decode(&bytes))
}

/// 解析 pruef-intervalle.csv / zuege-pruef.csv
pub(crate) fn parse_availability(
    file: &'static str,
    text: &str,
) -> Result<AvailabilityTable, ProtocolError> {
    let mut lines = text.lines().enumerate().map(|(i, l)| (i + 1, l));

    let (line_no, header) = lines
        .next()
        .ok_or_else(|| ProtocolError::malformed(file, 1, "文件为空"))?;
    let fields: Vec<&str> = header.split(';').collect();
    if fields.len() < 2 || fields[0] != "Block" || fields[fields.len() - 1] != END_MARKER {
        return Err(ProtocolError::malformed(file, line_no, "表头必须是 Block;...;-ENDE-"));
    }
    let names: Vec<String> = fields[1..fields.len() - 1]
        .iter()
        .map(|s| s.to_string())
        .collect();
    if names.iter().any(|n| n.is_empty()) {
        return Err(ProtocolError::malformed(file, line_no, "组名为空"));
    }
    let width = names.len() + 2;

    let (line_no, caps) = lines
        .next()
        .ok_or_else(|| ProtocolError::malformed(file, 2, "缺少每日上限行"))?;
    let fields: Vec<&str> = caps.split(';').collect();
    if fields.len() != width || fields[0] != MAX_PER_DAY_LABEL {
        return Err(ProtocolError::malformed(file, line_no, "每日上限行格式错误"));
    }
    if fields[1..width - 1].iter().any(|v| v.parse::<u32>().is_err()) {
        return Err(ProtocolError::malformed(file, line_no, "每日上限不是数字"));
    }

    let mut open = Vec::with_capacity(TOTAL_SLOTS);
    for (line_no, line) in lines {
        if line.is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split(';').collect();
        if fields.len() != width || !fields[width - 1].is_empty() {
            return Err(ProtocolError::malformed(
                file,
                line_no,
                format!("应有 {} 列，实际 {} 列", width, fields.len()),
            ));
        }
        let expected_block = open.len() + 1;
        if fields[0].parse::<usize>().ok() != Some(expected_block) {
            return Err(ProtocolError::malformed(
                file,
                line_no,
                format!("块编号应为 {}", expected_block),
            ));
        }
        let row = fields[1..width - 1]
            .iter()
            .map(|state| match *state {
                OPEN => Ok(true),
                BLOCKED => Ok(false),
                other => Err(ProtocolError::malformed(
                    file,
                    line_no,
                    format!("未知状态 {:?}", other),
                )),
            })
            .collect::<Result<Vec<bool>, _>>()?;
        open.push(row);
    }

    if open.len() != TOTAL_SLOTS {
        return Err(ProtocolError::malformed(
            file,
            open.len() + 2,
            format!("应有 {} 个块，实际 {} 个", TOTAL_SLOTS, open.len()),
        ));
    }

    Ok(AvailabilityTable { names, open })
}

/// 把约束组及其开放时间加入计划
pub(crate) fn apply_constraints(
    plan: &mut Plan,
    table: &AvailabilityTable,
) -> Result<(), ProtocolError> {
    for name in &table.names {
        plan.add_constraint(Group::new(name.clone()))?;
    }
    for (at, row) in table.blocks() {
        for (name, open) in table.names.iter().zip(row) {
            plan.set_constraint_open(at, name, *open)?;
        }
    }
    Ok(())
}

/// 把学生组及其开放时间加入计划
pub(crate) fn apply_groups(plan: &mut Plan, table: &AvailabilityTable) -> Result<(), ProtocolError> {
    for name in &table.names {
        plan.add_group(Group::new(name.clone()))?;
    }
    for (at, row) in table.blocks() {
        for (name, open) in table.names.iter().zip(row) {
            plan.set_group_open(at, name, *open)?;
        }
    }
    Ok(())
}

/// 解析 pruefungen.csv 并加入计划，组必须已经读入
pub(crate) fn apply_exams(plan: &mut Plan, text: &str) -> Result<(), ProtocolError> {
    for (index, line) in text.lines().enumerate() {
        let line_no = index + 1;
        if line.is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split(';').collect();
        if is_end_row(&fields) {
            return Ok(());
        }
        if fields.len() != 7 {
            return Err(ProtocolError::malformed(
                EXAMS_FILE,
                line_no,
                format!("应有 7 列，实际 {} 列", fields.len()),
            ));
        }

        let mut module = Module::new(fields[2], fields[3], fields[4]);
        if !fields[0].is_empty() {
            if !plan.has_constraint(fields[0]) {
                return Err(ProtocolError::UnknownConstraint(fields[0].to_string()));
            }
            module = module.with_constraint(fields[0]);
        }
        for group in fields[1].split(',').filter(|g| !g.is_empty()) {
            if !plan.has_group(group) {
                return Err(ProtocolError::UnknownGroup(group.to_string()));
            }
            module = module.with_group(group);
        }
        plan.add_module(module)?;
    }

    Err(ProtocolError::malformed(
        EXAMS_FILE,
        text.lines().count() + 1,
        "缺少 -ENDE- 结束行",
    ))
}

/// 结束行：第一列是 `-ENDE-`，其余列为空
fn is_end_row(fields: &[&str]) -> bool {
    fields.first() == Some(&END_MARKER) && fields[1..].iter().all(|f| f.is_empty())
}

/// 解析排考结果；不修改计划，只返回 (考试, 时间块) 列表
pub(crate) fn parse_schedule(
    plan: &Plan,
    text: &str,
) -> Result<Vec<(ModuleId, SlotRef)>, ProtocolError> {
    let mut lines = text.lines().enumerate().map(|(i, l)| (i + 1, l));

    let header = lines.next().map(|(_, l)| l).unwrap_or("");
    if header != RESULT_HEADER {
        return Err(ProtocolError::BadHeader(header.to_string()));
    }

    let mut assignments = Vec::new();
    for (line_no, line) in lines {
        if line.is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split(';').collect();
        if is_end_row(&fields) {
            break;
        }
        if fields.len() != 9 {
            return Err(ProtocolError::malformed(
                PLANNING_EXAMS_RESULT_FILE,
                line_no,
                format!("应有 9 列，实际 {} 列", fields.len()),
            ));
        }

        let number = Module::join_number(fields[0], fields[1]);
        let name = fields[2];
        let id = plan
            .find_module(&number, name)
            .ok_or_else(|| ProtocolError::UnknownModule {
                number: number.clone(),
                name: name.to_string(),
            })?;

        let day = parse_one_based(fields[6], line_no, "Tag")?;
        let slot = parse_one_based(fields[7], line_no, "Block")?;
        let at = result_slot(day, slot).ok_or(ProtocolError::SlotOutOfRange { day, slot })?;

        assignments.push((id, at));
    }

    Ok(assignments)
}

/// 结果中的天跨周连续编号：`day = Tag-1; week = day/7`
pub(crate) fn result_slot(day: usize, slot: usize) -> Option<SlotRef> {
    let day = day.checked_sub(1)?;
    let slot = slot.checked_sub(1)?;
    SlotRef::new(
        day / RESULT_DAYS_PER_WEEK,
        day % RESULT_DAYS_PER_WEEK,
        slot,
    )
}

fn parse_one_based(value: &str, line_no: usize, column: &str) -> Result<usize, ProtocolError> {
    match value.trim().parse::<usize>() {
        Ok(n) if n >= 1 => Ok(n),
        _ => Err(ProtocolError::malformed(
            PLANNING_EXAMS_RESULT_FILE,
            line_no,
            format!("{} 不是正整数: {:?}", column, value),
        )),
    }
}

/// 先清空涉及考试的旧分配，再写入新分配
pub(crate) fn apply_schedule(
    plan: &mut Plan,
    assignments: &[(ModuleId, SlotRef)],
) -> Result<(), ProtocolError> {
    let touched: BTreeSet<ModuleId> = assignments.iter().map(|(id, _)| *id).collect();
    for id in &touched {
        plan.unassign(*id);
    }
    for (id, at) in assignments {
        plan.assign(*id, *at)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan_with_modules() -> Plan {
        let mut plan = Plan::new("Sommer");
        plan.add_group(Group::new("INF1")).unwrap();
        plan.add_module(Module::new("Analysis", "30.2342", "DE").with_group("INF1"))
            .unwrap();
        plan.add_module(Module::new("Algebra", "30.2476 B", "DE").with_group("INF1"))
            .unwrap();
        plan
    }

    fn results(rows: &[&str]) -> String {
        let mut text = format!("{}\n", RESULT_HEADER);
        for row in rows {
            text.push_str(row);
            text.push('\n');
        }
        text
    }

    #[test]
    fn test_result_slot_mapping() {
        assert_eq!(result_slot(1, 1), SlotRef::new(0, 0, 0));
        assert_eq!(result_slot(8, 2), SlotRef::new(1, 0, 1));
        assert_eq!(result_slot(15, 6), SlotRef::new(2, 0, 5));
        // 第 7 天折算为 day_in_week = 6，网格里没有
        assert_eq!(result_slot(7, 1), None);
        // (22-1)/7 = 3，只有 3 周
        assert_eq!(result_slot(22, 1), None);
        assert_eq!(result_slot(0, 1), None);
        assert_eq!(result_slot(1, 7), None);
    }

    #[test]
    fn test_parse_schedule_resolves_qualifier() {
        let plan = plan_with_modules();
        let text = results(&[
            "30.2342;;Analysis;DE;K;;2;3;",
            "30.2476;B;Algebra;DE;K;;9;1;",
        ]);
        let parsed = parse_schedule(&plan, &text).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].1, SlotRef::new(0, 1, 2).unwrap());
        assert_eq!(parsed[1].0, plan.find_module("30.2476 B", "Algebra").unwrap());
        assert_eq!(parsed[1].1, SlotRef::new(1, 1, 0).unwrap());
    }

    #[test]
    fn test_bad_header_is_rejected() {
        let plan = plan_with_modules();
        let text = "BelegNr;Zug;Modul;Import;Pruefungsform;Zuordnung;Tag;Block;\nnonsense\n";
        assert!(matches!(
            parse_schedule(&plan, text),
            Err(ProtocolError::BadHeader(_))
        ));
    }

    #[test]
    fn test_wrong_column_count() {
        let plan = plan_with_modules();
        let text = results(&["30.2342;;Analysis;DE;K;;2;3"]);
        assert!(matches!(
            parse_schedule(&plan, &text),
            Err(ProtocolError::Malformed { line: 2, .. })
        ));
    }

    #[test]
    fn test_unknown_module() {
        let plan = plan_with_modules();
        let text = results(&["99.9999;;Unbekannt;DE;K;;2;3;"]);
        assert!(matches!(
            parse_schedule(&plan, &text),
            Err(ProtocolError::UnknownModule { .. })
        ));
    }

    #[test]
    fn test_day_out_of_range() {
        let plan = plan_with_modules();
        let text = results(&["30.2342;;Analysis;DE;K;;22;1;"]);
        assert!(matches!(
            parse_schedule(&plan, &text),
            Err(ProtocolError::SlotOutOfRange { day: 22, slot: 1 })
        ));
    }

    #[test]
    fn test_apply_schedule_replaces_previous_assignment() {
        let mut plan = plan_with_modules();
        let id = plan.find_module("30.2342", "Analysis").unwrap();
        plan.assign(id, SlotRef::new(2, 2, 2).unwrap()).unwrap();

        let new_slot = SlotRef::new(0, 0, 0).unwrap();
        apply_schedule(&mut plan, &[(id, new_slot)]).unwrap();
        assert_eq!(plan.assignments_of(id), vec![new_slot]);
    }

    #[test]
    fn test_parse_availability_rejects_short_table() {
        let text = "Block;INF1;-ENDE-\nMaximale Prü/Tag;2;\n1;FREI;\n";
        assert!(matches!(
            parse_availability("zuege-pruef.csv", text),
            Err(ProtocolError::Malformed { .. })
        ));
    }

    #[test]
    fn test_parse_availability_rejects_unknown_state() {
        let mut text = String::from("Block;INF1;-ENDE-\nMaximale Prü/Tag;2;\n");
        text.push_str("1;OFFEN;\n");
        assert!(matches!(
            parse_availability("zuege-pruef.csv", &text),
            Err(ProtocolError::Malformed { line: 3, .. })
        ));
    }

    #[test]
    fn test_apply_exams_requires_known_groups() {
        let mut plan = Plan::new("Sommer");
        let text = ";INF1;Analysis;30.2342;DE;K;\n-ENDE-;;;;;;\n";
        assert!(matches!(
            apply_exams(&mut plan, text),
            Err(ProtocolError::UnknownGroup(g)) if g == "INF1"
        ));
    }

    #[test]
    fn test_apply_exams_requires_end_marker() {
        let mut plan = Plan::new("Sommer");
        plan.add_group(Group::new("INF1")).unwrap();
        let text = ";INF1;Analysis;30.2342;DE;K;\n";
        assert!(apply_exams(&mut plan, text).is_err());
    }

    #[test]
    fn test_only_exact_end_row_stops_exams() {
        let mut plan = Plan::new("Sommer");
        plan.add_group(Group::new("INF1")).unwrap();
        plan.add_constraint(Group::new("-ENDE-Raum")).unwrap();
        let text = "-ENDE-Raum;INF1;Analysis;30.2342;DE;K;\n-ENDE-;;;;;;\n";

        apply_exams(&mut plan, text).unwrap();
        assert_eq!(plan.modules().len(), 1);
        assert_eq!(plan.modules()[0].constraint.as_deref(), Some("-ENDE-Raum"));
    }

    #[test]
    fn test_end_row_with_content_is_malformed() {
        let plan = plan_with_modules();
        let text = results(&["-ENDE-;;Analysis;DE;K;;2;3"]);
        assert!(matches!(
            parse_schedule(&plan, &text),
            Err(ProtocolError::Malformed { line: 2, .. })
        ));

        let text = results(&["30.2342;;Analysis;DE;K;;2;3;", "-ENDE-;;;;;;;;", "kaputt"]);
        assert_eq!(parse_schedule(&plan, &text).unwrap().len(), 1);
    }
}
