//! Whole-workspace JSON export and import.
//!
//! Owner-keyed collections are written as `[owner, value]` pairs so the file
//! keeps the insertion order of the source workspace.

use crate::db;
use crate::entry::{AcademicEntry, BoardExamResult};
use anyhow::Context;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportType {
    AcademicEntries,
    FullExport,
}

impl ExportType {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "academic-entries" => Some(Self::AcademicEntries),
            "full-export" => Some(Self::FullExport),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::AcademicEntries => "academic-entries",
            Self::FullExport => "full-export",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcademicData {
    #[serde(default)]
    pub academic_entries: Vec<(String, Vec<AcademicEntry>)>,
    #[serde(default)]
    pub board_exam_results: Vec<(String, BoardExamResult)>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportData {
    #[serde(default)]
    pub academic_entries: AcademicData,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    pub owners: usize,
    pub entries_added: usize,
    pub entries_skipped: usize,
    pub board_results_written: usize,
}

/// Both export types carry the same data.
pub fn build_export(conn: &Connection, export_type: ExportType) -> anyhow::Result<ExportData> {
    let academic_entries = db::entries_all(conn).context("failed to read entries")?;
    let board_exam_results = db::board_results_all(conn).context("failed to read board results")?;
    tracing::info!(
        export_type = export_type.as_str(),
        owners = academic_entries.len(),
        boards = board_exam_results.len(),
        "export built"
    );
    Ok(ExportData {
        academic_entries: AcademicData {
            academic_entries,
            board_exam_results,
        },
    })
}

/// Same shape as `build_export`, restricted to a single owner.
pub fn build_owner_export(conn: &Connection, owner: &str) -> anyhow::Result<ExportData> {
    let entries = db::entries_for_owner(conn, owner).context("failed to read entries")?;
    let board = db::board_result_get(conn, owner).context("failed to read board result")?;
    Ok(ExportData {
        academic_entries: AcademicData {
            academic_entries: if entries.is_empty() {
                Vec::new()
            } else {
                vec![(owner.to_string(), entries)]
            },
            board_exam_results: board.map(|b| (owner.to_string(), b)).into_iter().collect(),
        },
    })
}

/// Appends every entry exactly as exported and overwrites board results.
/// Entries whose id already exists are skipped. All-or-nothing.
pub fn apply_import(conn: &Connection, data: &ExportData) -> anyhow::Result<ImportSummary> {
    let tx = conn
        .unchecked_transaction()
        .context("failed to start import transaction")?;
    let mut summary = ImportSummary::default();
    let mut owners: Vec<&str> = Vec::new();

    for (owner, entries) in &data.academic_entries.academic_entries {
        if !owners.contains(&owner.as_str()) {
            owners.push(owner);
        }
        for entry in entries {
            if db::entry_restore(&tx, owner, entry)
                .with_context(|| format!("failed to import entry {}", entry.id))?
            {
                summary.entries_added += 1;
            } else {
                tracing::warn!(entry_id = %entry.id, owner = %owner, "duplicate entry id skipped");
                summary.entries_skipped += 1;
            }
        }
    }
    for (owner, result) in &data.academic_entries.board_exam_results {
        if !owners.contains(&owner.as_str()) {
            owners.push(owner);
        }
        db::board_result_put(&tx, owner, result)
            .with_context(|| format!("failed to import board result for {owner}"))?;
        summary.board_results_written += 1;
    }

    tx.commit().context("failed to commit import")?;
    summary.owners = owners.len();
    tracing::info!(
        entries_added = summary.entries_added,
        entries_skipped = summary.entries_skipped,
        board_results = summary.board_results_written,
        "import applied"
    );
    Ok(summary)
}

pub fn write_export_file(path: &Path, data: &ExportData) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.to_string_lossy()))?;
    }
    let text = serde_json::to_string_pretty(data).context("failed to serialize export")?;
    std::fs::write(path, text)
        .with_context(|| format!("failed to write export {}", path.to_string_lossy()))
}

pub fn read_export_file(path: &Path) -> anyhow::Result<ExportData> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read export {}", path.to_string_lossy()))?;
    serde_json::from_str(&text).context("export file is not a valid academic export")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subjects::{Subject, SubjectMarks};
    use chrono::{TimeZone, Utc};
    use std::collections::BTreeMap;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_workspace(prefix: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!(
            "{}-{}",
            prefix,
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .expect("clock")
                .as_nanos()
        ))
    }

    fn legacy_entry(id: &str) -> AcademicEntry {
        AcademicEntry {
            id: id.into(),
            grade: 5,
            term: 1,
            stream: None,
            subgroup: None,
            subjects: SubjectMarks::new().with(Subject::Computer, 15),
            subjects9: BTreeMap::new(),
            term_max_marks: 20,
            max_marks_per_subject: 0,
            computer_max_marks: 0,
            ai_max_marks: 0,
            term_total_marks: 15,
            term_percentage: 75.0,
            grade_text: "B".into(),
            timestamp: Utc.with_ymd_and_hms(2023, 11, 5, 10, 0, 0).unwrap(),
        }
    }

    #[test]
    fn wire_shape_uses_owner_pairs() {
        let raw = serde_json::json!({
            "academicEntries": {
                "academicEntries": [["u1", [serde_json::to_value(legacy_entry("e1")).expect("entry")]]],
                "boardExamResults": [["u1", {"boardExamTotal": 335, "maxMarks": 500, "percentage": 67.0}]]
            }
        });
        let data: ExportData = serde_json::from_value(raw).expect("parse export");
        assert_eq!(data.academic_entries.academic_entries[0].0, "u1");
        assert_eq!(data.academic_entries.board_exam_results[0].1.board_exam_total, 335);

        let empty: ExportData = serde_json::from_value(serde_json::json!({})).expect("empty");
        assert!(empty.academic_entries.academic_entries.is_empty());
    }

    #[test]
    fn import_preserves_frozen_fields_and_skips_duplicates() {
        let ws = temp_workspace("marksd-exchange");
        let conn = db::open_db(&ws).expect("open db");
        let data = ExportData {
            academic_entries: AcademicData {
                academic_entries: vec![("u1".into(), vec![legacy_entry("e1"), legacy_entry("e1")])],
                board_exam_results: vec![(
                    "u2".into(),
                    BoardExamResult { board_exam_total: 400, max_marks: 500, percentage: 80.0 },
                )],
            },
        };
        let summary = apply_import(&conn, &data).expect("import");
        assert_eq!(summary.entries_added, 1);
        assert_eq!(summary.entries_skipped, 1);
        assert_eq!(summary.board_results_written, 1);
        assert_eq!(summary.owners, 2);

        let stored = db::entries_for_owner(&conn, "u1").expect("entries");
        assert_eq!(stored, vec![legacy_entry("e1")]);
        assert_eq!(stored[0].computer_max_marks, 0);

        let exported = build_export(&conn, ExportType::FullExport).expect("export");
        assert_eq!(exported.academic_entries.academic_entries.len(), 1);
        assert_eq!(exported.academic_entries.board_exam_results[0].0, "u2");
        let _ = std::fs::remove_dir_all(ws);
    }

    #[test]
    fn export_type_names() {
        assert_eq!(ExportType::parse("full-export"), Some(ExportType::FullExport));
        assert_eq!(ExportType::parse("csv"), None);
    }
}
