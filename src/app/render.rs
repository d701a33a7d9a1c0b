use chrono::Utc;

use crate::domain::model::{HierarchyNode, ImportReport, RecordId};
use crate::utils::error::Result;

/// Column layout mirrors the admin tables the reports were designed around,
/// including the per-section fallback notices.
pub fn render_import_text(report: &ImportReport) -> String {
    let mut out = String::new();

    out.push_str(&format!("Groups Added: {}\n", report.created.len()));
    if !report.failed.is_empty() {
        let lines: Vec<String> = report.failed.iter().map(|f| f.line.to_string()).collect();
        let reasons: Vec<&str> = report.failed.iter().map(|f| f.reason.as_str()).collect();
        out.push_str(&format!("Rows with issues: {}\n", lines.join(", ")));
        out.push_str(&format!("Issues reason: {}\n", reasons.join(", ")));
    }
    out.push('\n');

    out.push_str("New Groups\n");
    if report.created.is_empty() {
        out.push_str("No new groups created.\n");
    } else {
        let rows: Vec<Vec<String>> = report
            .created
            .iter()
            .map(|c| {
                vec![
                    c.line.to_string(),
                    c.name.clone(),
                    c.id.to_string(),
                    c.parent_identifier.clone(),
                ]
            })
            .collect();
        out.push_str(&format_table(&["Row", "Name", "ID", "Parent Group"], &rows));
    }
    out.push('\n');

    out.push_str("Existing Groups\n");
    if report.updated.is_empty() {
        out.push_str("No existing groups updated.\n");
    } else {
        let rows: Vec<Vec<String>> = report
            .updated
            .iter()
            .map(|u| vec![u.line.to_string(), u.name.clone(), u.parent_identifier.clone()])
            .collect();
        out.push_str(&format_table(&["Row", "Name", "Parent Group"], &rows));
    }
    out.push('\n');

    out.push_str("Upload Errors\n");
    if report.failed.is_empty() {
        out.push_str("No errors.\n");
    } else {
        let rows: Vec<Vec<String>> = report
            .failed
            .iter()
            .map(|f| vec![f.line.to_string(), f.reason.clone()])
            .collect();
        out.push_str(&format_table(&["Row", "Reason"], &rows));
    }

    out
}

/// One CSV line per input row, in input order, with the action column
/// telling the three report lists apart.
pub fn render_import_csv(report: &ImportReport) -> Result<Vec<u8>> {
    let mut rows: Vec<(u64, [String; 6])> = Vec::new();
    for c in &report.created {
        rows.push((
            c.line,
            [
                c.line.to_string(),
                "created".to_string(),
                c.name.clone(),
                c.id.to_string(),
                c.parent_identifier.clone(),
                String::new(),
            ],
        ));
    }
    for u in &report.updated {
        rows.push((
            u.line,
            [
                u.line.to_string(),
                "updated".to_string(),
                u.name.clone(),
                String::new(),
                u.parent_identifier.clone(),
                String::new(),
            ],
        ));
    }
    for f in &report.failed {
        rows.push((
            f.line,
            [
                f.line.to_string(),
                "failed".to_string(),
                String::new(),
                String::new(),
                String::new(),
                f.reason.clone(),
            ],
        ));
    }
    rows.sort_by_key(|(line, _)| *line);

    let mut buffer = Vec::new();
    {
        let mut writer = csv::Writer::from_writer(&mut buffer);
        writer.write_record(["row", "action", "name", "id", "parent_identifier", "reason"])?;
        for (_, row) in &rows {
            writer.write_record(row)?;
        }
        writer.flush()?;
    }
    Ok(buffer)
}

pub fn render_import_json(report: &ImportReport) -> Result<Vec<u8>> {
    let envelope = serde_json::json!({
        "generated_at": Utc::now().to_rfc3339(),
        "groups_added": report.created.len(),
        "success": report.is_success(),
        "report": report,
    });
    Ok(serde_json::to_vec_pretty(&envelope)?)
}

pub fn render_hierarchy_text(nodes: &[HierarchyNode]) -> String {
    let mut out = String::new();
    let missing = nodes.iter().filter(|n| !n.has_identifier()).count();

    out.push_str("Groups With Missing Identifiers\n");
    if missing == 0 {
        out.push_str("No groups found under this parent with a missing group identifier.\n");
    }
    out.push('\n');

    let rows: Vec<Vec<String>> = nodes
        .iter()
        .map(|n| {
            vec![
                n.name.clone(),
                n.id.to_string(),
                n.parent.map(|p| p.to_string()).unwrap_or_else(|| "0".to_string()),
                n.identifier.clone(),
            ]
        })
        .collect();
    out.push_str(&format_table(
        &["Group Name", "Group ID", "Group Parent ID", "Group Identifier"],
        &rows,
    ));

    out
}

pub fn render_hierarchy_csv(nodes: &[HierarchyNode]) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    {
        let mut writer = csv::Writer::from_writer(&mut buffer);
        writer.write_record(["group_name", "group_id", "group_parent", "group_identifier"])?;
        for node in nodes {
            let id = node.id.to_string();
            let parent = node.parent.map(|p| p.to_string()).unwrap_or_else(|| "0".to_string());
            writer.write_record([
                node.name.as_str(),
                id.as_str(),
                parent.as_str(),
                node.identifier.as_str(),
            ])?;
        }
        writer.flush()?;
    }
    Ok(buffer)
}

pub fn render_hierarchy_json(root: RecordId, nodes: &[HierarchyNode]) -> Result<Vec<u8>> {
    let missing: Vec<&HierarchyNode> = nodes.iter().filter(|n| !n.has_identifier()).collect();
    let envelope = serde_json::json!({
        "generated_at": Utc::now().to_rfc3339(),
        "root": root,
        "missing_identifier_count": missing.len(),
        "groups": nodes,
    });
    Ok(serde_json::to_vec_pretty(&envelope)?)
}

fn format_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            if cell.len() > widths[i] {
                widths[i] = cell.len();
            }
        }
    }

    let mut out = String::new();
    let header_line: Vec<String> = headers
        .iter()
        .enumerate()
        .map(|(i, h)| format!("{:<width$}", h, width = widths[i]))
        .collect();
    out.push_str(header_line.join("  ").trim_end());
    out.push('\n');
    let separator: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    out.push_str(&separator.join("  "));
    out.push('\n');
    for row in rows {
        let cells: Vec<String> = row
            .iter()
            .enumerate()
            .map(|(i, cell)| format!("{:<width$}", cell, width = widths[i]))
            .collect();
        out.push_str(cells.join("  ").trim_end());
        out.push('\n');
    }
    out
}
