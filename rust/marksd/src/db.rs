use crate::entry::{AcademicEntry, BoardExamResult};
use crate::roles::Role;
use crate::subjects::{Subject, SubjectMarks};
use anyhow::{anyhow, Context};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension};
use std::collections::BTreeMap;
use std::path::Path;

pub const DB_FILE: &str = "marks.sqlite3";

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join(DB_FILE);
    let conn = Connection::open(db_path)?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS entries(
            id TEXT PRIMARY KEY,
            owner TEXT NOT NULL,
            grade INTEGER NOT NULL,
            term INTEGER NOT NULL,
            stream TEXT,
            subgroup TEXT,
            subjects_json TEXT NOT NULL,
            subjects9_json TEXT NOT NULL,
            term_max_marks INTEGER NOT NULL,
            max_marks_per_subject INTEGER NOT NULL,
            computer_max_marks INTEGER NOT NULL,
            ai_max_marks INTEGER NOT NULL,
            term_total_marks INTEGER NOT NULL,
            term_percentage REAL NOT NULL,
            grade_text TEXT NOT NULL,
            created_at TEXT NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_entries_owner ON entries(owner)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_entries_owner_grade_term ON entries(owner, grade, term)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS board_results(
            owner TEXT PRIMARY KEY,
            board_exam_total INTEGER NOT NULL,
            max_marks INTEGER NOT NULL,
            percentage REAL NOT NULL,
            updated_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS roles(
            identity TEXT PRIMARY KEY,
            role TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS settings(
            key TEXT PRIMARY KEY,
            value_json TEXT NOT NULL
        )",
        [],
    )?;

    Ok(conn)
}

const ENTRY_COLUMNS: &str = "id, grade, term, stream, subgroup, subjects_json, subjects9_json,
    term_max_marks, max_marks_per_subject, computer_max_marks, ai_max_marks,
    term_total_marks, term_percentage, grade_text, created_at";

struct EntryRow {
    id: String,
    grade: i64,
    term: i64,
    stream: Option<String>,
    subgroup: Option<String>,
    subjects_json: String,
    subjects9_json: String,
    term_max_marks: i64,
    max_marks_per_subject: i64,
    computer_max_marks: i64,
    ai_max_marks: i64,
    term_total_marks: i64,
    term_percentage: f64,
    grade_text: String,
    created_at: String,
}

/// Reads the entry columns starting at `base`.
fn read_entry_row(row: &rusqlite::Row<'_>, base: usize) -> rusqlite::Result<EntryRow> {
    Ok(EntryRow {
        id: row.get(base)?,
        grade: row.get(base + 1)?,
        term: row.get(base + 2)?,
        stream: row.get(base + 3)?,
        subgroup: row.get(base + 4)?,
        subjects_json: row.get(base + 5)?,
        subjects9_json: row.get(base + 6)?,
        term_max_marks: row.get(base + 7)?,
        max_marks_per_subject: row.get(base + 8)?,
        computer_max_marks: row.get(base + 9)?,
        ai_max_marks: row.get(base + 10)?,
        term_total_marks: row.get(base + 11)?,
        term_percentage: row.get(base + 12)?,
        grade_text: row.get(base + 13)?,
        created_at: row.get(base + 14)?,
    })
}

fn parse_timestamp(raw: &str) -> anyhow::Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(raw)
        .with_context(|| format!("invalid timestamp {raw}"))?
        .with_timezone(&Utc))
}

impl TryFrom<EntryRow> for AcademicEntry {
    type Error = anyhow::Error;

    fn try_from(r: EntryRow) -> anyhow::Result<Self> {
        let subjects: SubjectMarks = serde_json::from_str(&r.subjects_json)
            .with_context(|| format!("entry {} has invalid subjects_json", r.id))?;
        let subjects9: BTreeMap<Subject, u8> = serde_json::from_str(&r.subjects9_json)
            .with_context(|| format!("entry {} has invalid subjects9_json", r.id))?;
        Ok(AcademicEntry {
            timestamp: parse_timestamp(&r.created_at)?,
            id: r.id,
            grade: r.grade,
            term: r.term,
            stream: r.stream,
            subgroup: r.subgroup,
            subjects,
            subjects9,
            term_max_marks: r.term_max_marks,
            max_marks_per_subject: r.max_marks_per_subject,
            computer_max_marks: r.computer_max_marks,
            ai_max_marks: r.ai_max_marks,
            term_total_marks: r.term_total_marks,
            term_percentage: r.term_percentage,
            grade_text: r.grade_text,
        })
    }
}

fn query_entries(
    conn: &Connection,
    where_sql: &str,
    params: impl rusqlite::Params,
) -> anyhow::Result<Vec<AcademicEntry>> {
    let sql = format!("SELECT {ENTRY_COLUMNS} FROM entries {where_sql} ORDER BY rowid");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params, |row| read_entry_row(row, 0))?
        .collect::<Result<Vec<_>, _>>()?;
    rows.into_iter().map(AcademicEntry::try_from).collect()
}

/// Entries of one owner in insertion order.
pub fn entries_for_owner(conn: &Connection, owner: &str) -> anyhow::Result<Vec<AcademicEntry>> {
    query_entries(conn, "WHERE owner = ?", [owner])
}

/// Every owner's entries, owners in lexical order.
pub fn entries_all(conn: &Connection) -> anyhow::Result<Vec<(String, Vec<AcademicEntry>)>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT owner, {ENTRY_COLUMNS} FROM entries ORDER BY owner, rowid"
    ))?;
    let rows = stmt
        .query_map([], |row| {
            let owner: String = row.get(0)?;
            let entry = read_entry_row(row, 1)?;
            Ok((owner, entry))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let mut grouped: Vec<(String, Vec<AcademicEntry>)> = Vec::new();
    for (owner, row) in rows {
        let entry = AcademicEntry::try_from(row)?;
        match grouped.last_mut() {
            Some((o, list)) if *o == owner => list.push(entry),
            _ => grouped.push((owner, vec![entry])),
        }
    }
    Ok(grouped)
}

fn insert_entry(conn: &Connection, owner: &str, entry: &AcademicEntry) -> anyhow::Result<usize> {
    let subjects_json = serde_json::to_string(&entry.subjects)?;
    let subjects9_json = serde_json::to_string(&entry.subjects9)?;
    let n = conn.execute(
        "INSERT OR IGNORE INTO entries(
            id, owner, grade, term, stream, subgroup, subjects_json, subjects9_json,
            term_max_marks, max_marks_per_subject, computer_max_marks, ai_max_marks,
            term_total_marks, term_percentage, grade_text, created_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        rusqlite::params![
            entry.id,
            owner,
            entry.grade,
            entry.term,
            entry.stream,
            entry.subgroup,
            subjects_json,
            subjects9_json,
            entry.term_max_marks,
            entry.max_marks_per_subject,
            entry.computer_max_marks,
            entry.ai_max_marks,
            entry.term_total_marks,
            entry.term_percentage,
            entry.grade_text,
            entry.timestamp.to_rfc3339(),
        ],
    )?;
    Ok(n)
}

/// Appends a freshly built entry. The storage clock replaces the entry's
/// timestamp; the stored copy is returned.
pub fn entry_append(
    conn: &Connection,
    owner: &str,
    entry: &AcademicEntry,
) -> anyhow::Result<AcademicEntry> {
    let mut stored = entry.clone();
    stored.timestamp = Utc::now();
    let n = insert_entry(conn, owner, &stored)?;
    if n == 0 {
        return Err(anyhow!("entry id already exists: {}", stored.id));
    }
    Ok(stored)
}

/// Inserts an entry exactly as exported. Returns false when the id is
/// already present.
pub fn entry_restore(conn: &Connection, owner: &str, entry: &AcademicEntry) -> anyhow::Result<bool> {
    Ok(insert_entry(conn, owner, entry)? > 0)
}

pub fn board_result_get(conn: &Connection, owner: &str) -> anyhow::Result<Option<BoardExamResult>> {
    let row = conn
        .query_row(
            "SELECT board_exam_total, max_marks, percentage FROM board_results WHERE owner = ?",
            [owner],
            |r| {
                Ok(BoardExamResult {
                    board_exam_total: r.get(0)?,
                    max_marks: r.get(1)?,
                    percentage: r.get(2)?,
                })
            },
        )
        .optional()?;
    Ok(row)
}

/// One result per owner; a new submission overwrites the old one.
pub fn board_result_put(conn: &Connection, owner: &str, result: &BoardExamResult) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO board_results(owner, board_exam_total, max_marks, percentage, updated_at)
         VALUES (?, ?, ?, ?, ?)
         ON CONFLICT(owner) DO UPDATE SET
            board_exam_total = excluded.board_exam_total,
            max_marks = excluded.max_marks,
            percentage = excluded.percentage,
            updated_at = excluded.updated_at",
        rusqlite::params![
            owner,
            result.board_exam_total,
            result.max_marks,
            result.percentage,
            Utc::now().to_rfc3339(),
        ],
    )?;
    Ok(())
}

pub fn board_results_all(conn: &Connection) -> anyhow::Result<Vec<(String, BoardExamResult)>> {
    let mut stmt = conn.prepare(
        "SELECT owner, board_exam_total, max_marks, percentage FROM board_results ORDER BY owner",
    )?;
    let rows = stmt
        .query_map([], |r| {
            Ok((
                r.get::<_, String>(0)?,
                BoardExamResult {
                    board_exam_total: r.get(1)?,
                    max_marks: r.get(2)?,
                    percentage: r.get(3)?,
                },
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn role_assign(conn: &Connection, identity: &str, role: Role) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO roles(identity, role) VALUES (?, ?)
         ON CONFLICT(identity) DO UPDATE SET role = excluded.role",
        (identity, role.as_str()),
    )?;
    Ok(())
}

/// Unknown identities are guests.
pub fn role_get(conn: &Connection, identity: &str) -> anyhow::Result<Role> {
    let raw: Option<String> = conn
        .query_row("SELECT role FROM roles WHERE identity = ?", [identity], |r| r.get(0))
        .optional()?;
    match raw {
        None => Ok(Role::Guest),
        Some(s) => Role::parse(&s).ok_or_else(|| anyhow!("stored role is invalid: {s}")),
    }
}

pub fn admin_count(conn: &Connection) -> anyhow::Result<i64> {
    let n = conn.query_row(
        "SELECT COUNT(*) FROM roles WHERE role = ?",
        [Role::Admin.as_str()],
        |r| r.get(0),
    )?;
    Ok(n)
}

pub fn settings_get_json(conn: &Connection, key: &str) -> anyhow::Result<Option<serde_json::Value>> {
    let raw: Option<String> = conn
        .query_row("SELECT value_json FROM settings WHERE key = ?", [key], |r| r.get(0))
        .optional()?;
    match raw {
        None => Ok(None),
        Some(s) => Ok(Some(
            serde_json::from_str(&s).with_context(|| format!("setting {key} is not valid JSON"))?,
        )),
    }
}

pub fn settings_set_json(conn: &Connection, key: &str, value: &serde_json::Value) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO settings(key, value_json) VALUES (?, ?)
         ON CONFLICT(key) DO UPDATE SET value_json = excluded.value_json",
        (key, serde_json::to_string(value)?),
    )?;
    Ok(())
}
